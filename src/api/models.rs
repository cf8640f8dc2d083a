//! API data models

use serde::{Deserialize, Serialize};

/// Body of `POST /scrape`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ScrapeRequest {
    #[serde(rename = "searchTerm", default)]
    pub search_term: Option<String>,
}

/// Successful scrape response
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ScrapeResponse {
    pub links: Vec<String>,
}

/// Error body returned with any non-200 status
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
