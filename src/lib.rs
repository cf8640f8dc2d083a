/// YouTube Search Scraper - Rust Implementation
///
/// Searches YouTube through a real browser, scrolls through lazily loaded
/// results, extracts per-video metadata and returns deduplicated watch links.

pub mod api;
pub mod browser;
pub mod config;
pub mod search;

// Re-export main types for easy access
pub use crate::browser::{BrowserError, BrowserSession, PageElement, SessionGuard, SessionLauncher};
pub use crate::browser::{ChromeLauncher, SnapshotLauncher};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::search::{
    search_with_launcher, PaginationOutcome, ResultRecord, SearchOrchestrator, SearchQuery, SearchRequest,
};

/// Result type for scraper operations
pub type Result<T> = std::result::Result<T, ScraperError>;

/// Error types for scraper operations
#[derive(thiserror::Error, Debug)]
pub enum ScraperError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task error: {0}")]
    Task(String),
}
