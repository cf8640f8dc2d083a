use chrono::NaiveDate;
use tracing::debug;

use crate::config::PlatformConfig;

/// Builds search result URLs for a term
#[derive(Debug, Clone)]
pub struct SearchUrlBuilder {
    base_url: String,
    search_path: String,
    recent_filter: String,
    date_formats: Vec<String>,
}

impl SearchUrlBuilder {
    pub fn new(platform: &PlatformConfig) -> Self {
        Self {
            base_url: platform.base_url.trim_end_matches('/').to_string(),
            search_path: platform.search_path.clone(),
            recent_filter: platform.recent_filter.clone(),
            date_formats: platform.date_formats.clone(),
        }
    }

    /// Search URL for `term`. Terms that name `today` get the plain URL so the
    /// recency filter does not over-constrain date-specific searches.
    pub fn build(&self, term: &str, today: NaiveDate) -> String {
        if self.names_date(term, today) {
            debug!("Term '{}' names today's date, skipping recency filter", term);
            self.plain_url(term)
        } else {
            self.recent_url(term)
        }
    }

    pub fn plain_url(&self, term: &str) -> String {
        format!(
            "{}{}?search_query={}",
            self.base_url,
            self.search_path,
            urlencoding::encode(term)
        )
    }

    /// The filter token is already in the platform's encoded form and is appended as-is.
    pub fn recent_url(&self, term: &str) -> String {
        format!("{}&sp={}", self.plain_url(term), self.recent_filter)
    }

    /// Whether the lowercased term contains `date` rendered in any supported format
    pub fn names_date(&self, term: &str, date: NaiveDate) -> bool {
        let term = term.to_lowercase();
        self.date_formats
            .iter()
            .map(|fmt| date.format(fmt).to_string().to_lowercase())
            .any(|rendered| term.contains(&rendered))
    }
}
