//! API module for the YouTube search scraper
//!
//! Exposes `POST /scrape`, which runs a full search for the posted term and
//! returns the deduplicated watch links.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::browser::SessionLauncher;
use crate::config::Config;

pub mod handlers;
pub mod models;
pub mod server;

/// API Server for handling scrape requests
pub struct ApiServer<L: SessionLauncher> {
    launcher: Arc<L>,
    config: Arc<Config>,
}

impl<L: SessionLauncher> ApiServer<L> {
    /// Create a new API server
    pub fn new(launcher: L, config: Arc<Config>) -> Self {
        Self {
            launcher: Arc::new(launcher),
            config,
        }
    }

    /// Run the API server until shutdown
    pub async fn start(self) -> Result<()> {
        info!(
            "🚀 Starting API server on {}:{}",
            self.config.server.host, self.config.server.port
        );

        server::start_http_server(self.launcher, self.config).await
    }
}
