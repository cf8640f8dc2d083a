//! API request handlers

use std::sync::Arc;
use tracing::info;

use super::models::ScrapeRequest;
use crate::browser::SessionLauncher;
use crate::config::Config;
use crate::search::{search_with_launcher, SearchRequest};
use crate::ScraperError;

/// Error message for a missing, empty or unreadable search term
pub const MISSING_SEARCH_TERM: &str = "searchTerm is required";

/// Pull the search term out of a parsed body; `None` means the body was unreadable
pub fn validate_request(request: Option<ScrapeRequest>) -> Result<String, &'static str> {
    match request.and_then(|r| r.search_term) {
        Some(term) if !term.is_empty() => Ok(term),
        _ => Err(MISSING_SEARCH_TERM),
    }
}

/// Run a full scrape for `term` on a blocking worker and return the result links
pub async fn scrape_links<L: SessionLauncher>(
    launcher: Arc<L>,
    config: Arc<Config>,
    term: String,
) -> crate::Result<Vec<String>> {
    info!("📥 Scrape requested for '{}'", term);

    let records = tokio::task::spawn_blocking(move || {
        let request = SearchRequest::new(&term, &config);
        search_with_launcher(launcher.as_ref(), &config, &request)
    })
    .await
    .map_err(|e| ScraperError::Task(e.to_string()))??;

    Ok(records.into_iter().map(|record| record.url).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(term: Option<&str>) -> Option<ScrapeRequest> {
        Some(ScrapeRequest {
            search_term: term.map(str::to_string),
        })
    }

    #[test]
    fn test_validate_request() {
        assert_eq!(validate_request(request(Some("cats"))), Ok("cats".to_string()));
        assert_eq!(validate_request(request(Some(""))), Err(MISSING_SEARCH_TERM));
        assert_eq!(validate_request(request(None)), Err(MISSING_SEARCH_TERM));
        assert_eq!(validate_request(None), Err(MISSING_SEARCH_TERM));
    }
}
