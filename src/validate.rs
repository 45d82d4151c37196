//! Input validation shared by the HTTP handlers.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{AppError, AppResult};

const RATING_MIN: i32 = 1;
const RATING_MAX: i32 = 10;
const QUERY_MIN_LEN: usize = 2;
const QUERY_MAX_LEN: usize = 100;
const DESCRIPTION_MAX_LEN: usize = 1000;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Validates a book rating on the 1-10 scale
pub fn validate_rating(rating: i32) -> AppResult<i32> {
    if (RATING_MIN..=RATING_MAX).contains(&rating) {
        Ok(rating)
    } else {
        Err(AppError::InvalidInput(format!(
            "Rating must be between {} and {}, got {}",
            RATING_MIN, RATING_MAX, rating
        )))
    }
}

/// Validates a free-text search query and returns the trimmed form
pub fn validate_search_query(query: &str) -> AppResult<&str> {
    let trimmed = query.trim();
    let len = trimmed.chars().count();

    if !(QUERY_MIN_LEN..=QUERY_MAX_LEN).contains(&len) {
        return Err(AppError::InvalidInput(format!(
            "Search query must be {} to {} characters",
            QUERY_MIN_LEN, QUERY_MAX_LEN
        )));
    }
    if !trimmed.chars().any(char::is_alphanumeric) {
        return Err(AppError::InvalidInput(
            "Search query must contain a letter or digit".to_string(),
        ));
    }

    Ok(trimmed)
}

/// Strips HTML tags, collapses whitespace and clips overly long descriptions
pub fn clean_description(description: &str) -> String {
    let stripped = HTML_TAG.replace_all(description, "");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    let cleaned = collapsed.trim();

    if cleaned.chars().count() > DESCRIPTION_MAX_LEN {
        let clipped: String = cleaned.chars().take(DESCRIPTION_MAX_LEN - 3).collect();
        format!("{}...", clipped)
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(10).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(11).is_err());
    }

    #[test]
    fn test_query_length_and_content() {
        assert_eq!(validate_search_query("  dune  ").unwrap(), "dune");
        assert!(validate_search_query("a").is_err());
        assert!(validate_search_query("!!").is_err());
        assert!(validate_search_query(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_clean_description_strips_tags_and_collapses_whitespace() {
        assert_eq!(
            clean_description("<p>Hello</p>\n\n  <b>world</b>"),
            "Hello world"
        );
    }

    #[test]
    fn test_clean_description_clips_long_text() {
        let cleaned = clean_description(&"word ".repeat(400));
        assert!(cleaned.chars().count() <= 1000);
        assert!(cleaned.ends_with("..."));
    }
}
