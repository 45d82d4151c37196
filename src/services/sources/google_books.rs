use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::SourceBook;
use crate::services::sources::BookSource;
use crate::validate::clean_description;

const MAX_RESULTS_CAP: usize = 40;

/// Google Books volumes provider
pub struct GoogleBooksSource {
    http_client: HttpClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(default)]
    id: String,
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    image_links: Option<ImageLinks>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageLinks {
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    small_thumbnail: Option<String>,
}

impl GoogleBooksSource {
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url,
        }
    }
}

fn volume_to_source_book(volume: Volume) -> Option<SourceBook> {
    let info = volume.volume_info;

    let title = info.title.trim().to_string();
    if title.is_empty() {
        return None;
    }

    let author = if info.authors.is_empty() {
        "Unknown author".to_string()
    } else {
        info.authors.join(", ")
    };

    // publishedDate is "YYYY", "YYYY-MM" or "YYYY-MM-DD"
    let publication_year = info
        .published_date
        .as_deref()
        .and_then(|d| d.split('-').next())
        .and_then(|y| y.parse::<i32>().ok());

    let cover_url = info
        .image_links
        .and_then(|links| links.thumbnail.or(links.small_thumbnail));

    let description = info
        .description
        .map(|d| clean_description(&d))
        .filter(|d| !d.is_empty());

    Some(SourceBook {
        source: "googlebooks".to_string(),
        external_id: volume.id,
        title,
        author,
        genre: info.categories.into_iter().next(),
        description,
        cover_url,
        publication_year,
    })
}

#[async_trait::async_trait]
impl BookSource for GoogleBooksSource {
    fn id(&self) -> &'static str {
        "googlebooks"
    }

    fn display_name(&self) -> &'static str {
        "Google Books"
    }

    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<SourceBook>> {
        let url = format!("{}/volumes", self.base_url);
        let max_results = limit.min(MAX_RESULTS_CAP).to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("printType", "books"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Google Books returned status {}: {}",
                status, body
            )));
        }

        let volumes: VolumesResponse = response.json().await?;
        Ok(volumes
            .items
            .into_iter()
            .take(limit)
            .filter_map(volume_to_source_book)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(title: &str, description: Option<&str>, published: Option<&str>) -> Volume {
        Volume {
            id: "abc123".to_string(),
            volume_info: VolumeInfo {
                title: title.to_string(),
                authors: vec!["Ursula K. Le Guin".to_string()],
                categories: vec!["Fantasy".to_string()],
                description: description.map(str::to_string),
                published_date: published.map(str::to_string),
                image_links: None,
            },
        }
    }

    #[test]
    fn test_volume_conversion_parses_year() {
        let book =
            volume_to_source_book(volume("A Wizard of Earthsea", None, Some("1968-11-01"))).unwrap();
        assert_eq!(book.publication_year, Some(1968));
        assert_eq!(book.genre.as_deref(), Some("Fantasy"));
        assert_eq!(book.source, "googlebooks");
    }

    #[test]
    fn test_volume_conversion_cleans_description() {
        let book = volume_to_source_book(volume(
            "A Wizard of Earthsea",
            Some("<p>Ged grows   from goatherd</p> to <b>mage</b>"),
            None,
        ))
        .unwrap();
        assert_eq!(
            book.description.as_deref(),
            Some("Ged grows from goatherd to mage")
        );
    }

    #[test]
    fn test_volume_without_title_is_dropped() {
        assert!(volume_to_source_book(volume("", None, None)).is_none());
    }
}
