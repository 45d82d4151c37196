use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::SourceBook;
use crate::services::sources::BookSource;

/// Subjects promoted to a genre when present, checked in order
const KNOWN_GENRES: &[&str] = &[
    "Science Fiction",
    "Fantasy",
    "Mystery",
    "Romance",
    "Biography",
    "History",
    "Fiction",
];

/// Open Library search provider
///
/// Uses the /search.json endpoint. Search responses rarely carry a
/// description, so catalog entries from this source start without one.
pub struct OpenLibrarySource {
    http_client: HttpClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    #[serde(default)]
    key: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author_name: Vec<String>,
    #[serde(default)]
    first_publish_year: Option<i32>,
    #[serde(default)]
    subject: Vec<String>,
    #[serde(default)]
    cover_i: Option<u64>,
}

impl OpenLibrarySource {
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url,
        }
    }

    async fn search_once(&self, query: &str, limit: usize) -> AppResult<Vec<SourceBook>> {
        let url = format!("{}/search.json", self.base_url);
        let limit = limit.to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("q", query),
                ("limit", limit.as_str()),
                (
                    "fields",
                    "key,title,author_name,first_publish_year,subject,cover_i",
                ),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Open Library returned status {}: {}",
                status, body
            )));
        }

        let search: SearchResponse = response.json().await?;
        Ok(search
            .docs
            .into_iter()
            .filter_map(doc_to_source_book)
            .collect())
    }
}

fn doc_to_source_book(doc: SearchDoc) -> Option<SourceBook> {
    let title = doc.title.trim().to_string();
    if title.is_empty() {
        return None;
    }

    let author = if doc.author_name.is_empty() {
        "Unknown author".to_string()
    } else {
        doc.author_name.join(", ")
    };

    let cover_url = doc
        .cover_i
        .map(|id| format!("https://covers.openlibrary.org/b/id/{}-M.jpg", id));

    Some(SourceBook {
        source: "openlibrary".to_string(),
        external_id: doc.key,
        title,
        author,
        genre: extract_genre(&doc.subject),
        description: None,
        cover_url,
        publication_year: doc.first_publish_year,
    })
}

/// Picks a recognizable genre from the subject list, falling back to the
/// first subject
fn extract_genre(subjects: &[String]) -> Option<String> {
    for subject in subjects.iter().take(5) {
        for genre in KNOWN_GENRES {
            if subject.to_lowercase().contains(&genre.to_lowercase()) {
                return Some((*genre).to_string());
            }
        }
    }
    subjects.first().cloned()
}

#[async_trait::async_trait]
impl BookSource for OpenLibrarySource {
    fn id(&self) -> &'static str {
        "openlibrary"
    }

    fn display_name(&self) -> &'static str {
        "Open Library"
    }

    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<SourceBook>> {
        let hits = self.search_once(query, limit).await?;
        if !hits.is_empty() {
            return Ok(hits);
        }

        // Broad queries sometimes miss exact titles; retry title-scoped
        let scoped = format!("title:\"{}\"", query);
        self.search_once(&scoped, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, subjects: &[&str], cover: Option<u64>) -> SearchDoc {
        SearchDoc {
            key: "/works/OL1W".to_string(),
            title: title.to_string(),
            author_name: vec!["Frank Herbert".to_string()],
            first_publish_year: Some(1965),
            subject: subjects.iter().map(|s| s.to_string()).collect(),
            cover_i: cover,
        }
    }

    #[test]
    fn test_doc_conversion_builds_cover_url() {
        let book = doc_to_source_book(doc("Dune", &["American science fiction"], Some(99))).unwrap();
        assert_eq!(
            book.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/99-M.jpg")
        );
        assert_eq!(book.genre.as_deref(), Some("Science Fiction"));
        assert_eq!(book.publication_year, Some(1965));
    }

    #[test]
    fn test_doc_without_title_is_dropped() {
        assert!(doc_to_source_book(doc("   ", &[], None)).is_none());
    }

    #[test]
    fn test_genre_falls_back_to_first_subject() {
        assert_eq!(
            extract_genre(&["Beekeeping".to_string(), "Agriculture".to_string()]),
            Some("Beekeeping".to_string())
        );
        assert_eq!(extract_genre(&[]), None);
    }
}
