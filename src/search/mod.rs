/// Search pipeline: URL building, pagination, extraction and orchestration
///
/// Everything here is written against the browser capability traits, never a
/// concrete driver.

pub mod extractor;
pub mod orchestrator;
pub mod pagination;
pub mod url_builder;

pub use extractor::ResultExtractor;
pub use orchestrator::{search_with_launcher, SearchOrchestrator, SearchRequest};
pub use pagination::{PaginationDriver, PaginationOutcome};
pub use url_builder::SearchUrlBuilder;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Rendered in place of an optional field that could not be scraped
pub const UNKNOWN: &str = "Unknown";

/// One term's search parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Term sent to the platform
    pub term: String,
    /// Term titles are matched against when filtering
    pub filter_term: String,
    pub title_filter_enabled: bool,
}

impl SearchQuery {
    pub fn new(term: &str, title_filter_enabled: bool) -> Self {
        Self {
            term: term.to_string(),
            filter_term: term.to_string(),
            title_filter_enabled,
        }
    }

    pub fn with_filter_term(mut self, filter_term: &str) -> Self {
        self.filter_term = filter_term.to_string();
        self
    }

    /// Case-insensitive substring check of the filter term against a title.
    /// Always true when filtering is disabled.
    pub fn title_matches(&self, title: &str) -> bool {
        !self.title_filter_enabled || title.to_lowercase().contains(&self.filter_term.to_lowercase())
    }
}

/// A validated search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub id: String,
    /// Always `<base>/watch?v=<id>`
    pub url: String,
    pub title: String,
    #[serde(serialize_with = "or_unknown")]
    pub channel: Option<String>,
    #[serde(serialize_with = "or_unknown")]
    pub duration: Option<String>,
    #[serde(serialize_with = "or_unknown")]
    pub views_text: Option<String>,
    #[serde(serialize_with = "or_unknown")]
    pub upload_time_text: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub search_term: String,
    pub filter_term: String,
}

fn or_unknown<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or(UNKNOWN))
}
