use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use super::{ResultRecord, SearchQuery};
use crate::browser::{BrowserError, PageElement};
use crate::config::{PlatformConfig, SelectorConfig};

/// Marker a result link must carry to be a video
const WATCH_MARKER: &str = "watch?v=";

static VIDEO_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Turns result elements into [`ResultRecord`]s
#[derive(Debug, Clone)]
pub struct ResultExtractor {
    selectors: SelectorConfig,
    base_url: Url,
}

impl ResultExtractor {
    pub fn new(platform: &PlatformConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            selectors: platform.selectors.clone(),
            base_url: Url::parse(&platform.base_url)?,
        })
    }

    /// Extract one result.
    ///
    /// `Ok(None)` means the element was rejected: no video link, a title that
    /// fails the filter, or no usable video id. Optional fields that cannot be
    /// resolved are left as `None` and never cause a rejection.
    pub fn extract<E: PageElement>(&self, element: &E, query: &SearchQuery) -> Result<Option<ResultRecord>, BrowserError> {
        let Some(title_link) = element.find_one(&self.selectors.title)? else {
            return Ok(None);
        };

        let href = match title_link.attribute("href")? {
            Some(href) if href.contains(WATCH_MARKER) => href,
            _ => return Ok(None),
        };

        let title = match title_link.attribute("title")? {
            Some(title) if !title.trim().is_empty() => title.trim().to_string(),
            _ => title_link.text()?.trim().to_string(),
        };

        if !query.title_matches(&title) {
            debug!("Skipping '{}': title does not mention '{}'", title, query.filter_term);
            return Ok(None);
        }

        let channel = optional_text(element.find_one(&self.selectors.channel)?)?;
        let duration = optional_text(element.find_one(&self.selectors.duration)?)?;

        let mut metadata = element.find_all(&self.selectors.metadata)?.into_iter();
        let views_text = optional_text(metadata.next())?;
        let upload_time_text = optional_text(metadata.next())?;

        let Some(id) = self.video_id(&href) else {
            debug!("Skipping result without a usable video id: {}", href);
            return Ok(None);
        };

        Ok(Some(ResultRecord {
            url: self.watch_url(&id),
            id,
            title,
            channel,
            duration,
            views_text,
            upload_time_text,
            scraped_at: Utc::now(),
            search_term: query.term.clone(),
            filter_term: query.filter_term.clone(),
        }))
    }

    /// The `v` query parameter of a possibly relative watch link
    pub fn video_id(&self, href: &str) -> Option<String> {
        let url = self.base_url.join(href).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .filter(|id| VIDEO_ID.is_match(id))
    }

    /// Canonical link for a video id, without any tracking parameters
    pub fn watch_url(&self, id: &str) -> String {
        format!("{}/watch?v={}", self.base_url.as_str().trim_end_matches('/'), id)
    }
}

/// Trimmed text of an optional element; empty text counts as absent
fn optional_text<E: PageElement>(element: Option<E>) -> Result<Option<String>, BrowserError> {
    let Some(element) = element else {
        return Ok(None);
    };
    let text = element.text()?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}
