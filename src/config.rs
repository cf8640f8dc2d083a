use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the YouTube search scraper
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Pagination, limits and pacing
    pub scraper: ScraperConfig,

    /// Target platform URLs and selectors
    pub platform: PlatformConfig,

    /// Chrome launch settings
    pub browser: BrowserConfig,

    /// HTTP listener settings
    pub server: ServerConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Maximum results returned across all terms
    pub max_results: usize,

    /// Maximum results collected for a single term
    pub max_results_per_term: usize,

    /// Scroll iterations before pagination gives up
    pub max_scrolls: usize,

    /// Pause after each scroll so lazy content can arrive (seconds)
    pub scroll_pause_secs: f64,

    /// Delay between consecutive terms (seconds)
    pub term_delay_secs: f64,

    /// Bound on the wait for the first result element (seconds)
    pub initial_wait_secs: f64,

    /// Drop results whose title does not contain the filter term
    pub title_filter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Site root, also used to build canonical watch URLs
    pub base_url: String,

    /// Path of the search results page
    pub search_path: String,

    /// Already-encoded `sp` token restricting results to recent uploads
    pub recent_filter: String,

    /// chrono formats used to recognise a term naming today's date
    pub date_formats: Vec<String>,

    /// CSS selectors for result extraction
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// One search result
    pub video: String,

    /// Title link inside a result
    pub title: String,

    pub channel: String,

    pub duration: String,

    /// Metadata spans: views first, upload time second
    pub metadata: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run Chrome without a window
    pub headless: bool,

    /// Chrome sandbox; usually off inside containers
    pub sandbox: bool,

    /// Explicit Chrome binary, otherwise auto-detected
    pub chrome_path: Option<PathBuf>,

    pub window_width: u32,

    pub window_height: u32,

    pub user_agent: String,

    /// Navigation bound (seconds)
    pub page_load_timeout_secs: u64,

    /// Browser considered dead after this long without events (seconds)
    pub idle_timeout_secs: u64,

    /// Additional Chrome switches
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Scrapes allowed to run at the same time, each with its own browser
    pub max_concurrent_scrapes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is not set
    pub level: String,

    /// Force debug output for this crate
    pub debug: bool,
}

impl ScraperConfig {
    pub fn scroll_pause(&self) -> Duration {
        Duration::from_secs_f64(self.scroll_pause_secs.max(0.0))
    }

    pub fn term_delay(&self) -> Duration {
        Duration::from_secs_f64(self.term_delay_secs.max(0.0))
    }

    pub fn initial_wait(&self) -> Duration {
        Duration::from_secs_f64(self.initial_wait_secs.max(0.0))
    }
}

impl BrowserConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl LoggingConfig {
    /// Filter directive used when RUST_LOG is absent
    pub fn filter_directive(&self) -> String {
        let level = if self.debug { "debug" } else { self.level.as_str() };
        format!("yt_search_scraper={level},yt_search={level},tower_http=info,warn")
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_results: 100,
            max_results_per_term: 50,
            max_scrolls: 10,
            scroll_pause_secs: 2.0,
            term_delay_secs: 1.0,
            initial_wait_secs: 10.0,
            title_filter: true,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            search_path: "/results".to_string(),
            recent_filter: "CAISBAgBEAE%253D".to_string(),
            date_formats: vec![
                "%m/%d/%Y".to_string(),  // 10/19/2026
                "%m-%d-%Y".to_string(),  // 10-19-2026
                "%B %d, %Y".to_string(), // October 19, 2026
                "%b %d, %Y".to_string(), // Oct 19, 2026
                "%Y-%m-%d".to_string(),  // 2026-10-19
            ],
            selectors: SelectorConfig::default(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            video: "ytd-video-renderer,ytd-grid-video-renderer".to_string(),
            title: "#video-title".to_string(),
            channel: "#channel-name #text".to_string(),
            duration: "#text.ytd-thumbnail-overlay-time-status-renderer".to_string(),
            metadata: "#metadata-line span".to_string(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            chrome_path: None,
            window_width: 1920,
            window_height: 1080,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            page_load_timeout_secs: 30,
            idle_timeout_secs: 120,
            extra_args: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
            max_concurrent_scrapes: 2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            debug: false,
        }
    }
}

impl Config {
    /// Load configuration from the first file found in the default locations
    pub fn load() -> Result<Self> {
        let config_paths = [
            "yt-search.toml",
            "config/yt-search.toml",
            "/etc/yt-search/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Err(anyhow!("No configuration file found"))
    }

    /// Load configuration from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Override selected settings from environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("YT_SEARCH_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid YT_SEARCH_PORT: {}", port),
            }
        }

        if let Ok(host) = std::env::var("YT_SEARCH_HOST") {
            self.server.host = host;
        }

        if let Ok(headless) = std::env::var("YT_SEARCH_HEADLESS") {
            self.browser.headless = !matches!(headless.to_lowercase().as_str(), "0" | "false" | "no");
        }

        if let Ok(path) = std::env::var("YT_SEARCH_CHROME_PATH") {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }

        if let Ok(max) = std::env::var("YT_SEARCH_MAX_RESULTS") {
            match max.parse() {
                Ok(max) => self.scraper.max_results = max,
                Err(_) => tracing::warn!("Ignoring invalid YT_SEARCH_MAX_RESULTS: {}", max),
            }
        }

        if let Ok(log_level) = std::env::var("YT_SEARCH_LOG_LEVEL") {
            self.logging.level = log_level;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.scraper.max_results == 0 {
            return Err(anyhow!("max_results must be greater than 0"));
        }

        if self.scraper.max_results_per_term == 0 {
            return Err(anyhow!("max_results_per_term must be greater than 0"));
        }

        if !self.scraper.scroll_pause_secs.is_finite()
            || !self.scraper.term_delay_secs.is_finite()
            || !self.scraper.initial_wait_secs.is_finite()
        {
            return Err(anyhow!("scraper durations must be finite"));
        }

        url::Url::parse(&self.platform.base_url)
            .map_err(|e| anyhow!("Invalid base_url '{}': {}", self.platform.base_url, e))?;

        if self.platform.date_formats.is_empty() {
            return Err(anyhow!("at least one date format is required"));
        }

        let selectors = &self.platform.selectors;
        for (name, selector) in [
            ("video", &selectors.video),
            ("title", &selectors.title),
            ("channel", &selectors.channel),
            ("duration", &selectors.duration),
            ("metadata", &selectors.metadata),
        ] {
            scraper::Selector::parse(selector)
                .map_err(|e| anyhow!("Invalid {} selector '{}': {:?}", name, selector, e))?;
        }

        if self.server.max_concurrent_scrapes == 0 {
            return Err(anyhow!("max_concurrent_scrapes must be greater than 0"));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "YouTube Search Scraper Configuration:\n\
            - Max Results: {} ({} per term)\n\
            - Max Scrolls: {} (pause {:.1}s)\n\
            - Title Filter: {}\n\
            - Platform: {}{}\n\
            - Headless: {}\n\
            - Listen: {}:{}",
            self.scraper.max_results,
            self.scraper.max_results_per_term,
            self.scraper.max_scrolls,
            self.scraper.scroll_pause_secs,
            self.scraper.title_filter,
            self.platform.base_url,
            self.platform.search_path,
            self.browser.headless,
            self.server.host,
            self.server.port,
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.config.scraper.max_results = max;
        self
    }

    pub fn with_max_results_per_term(mut self, max: usize) -> Self {
        self.config.scraper.max_results_per_term = max;
        self
    }

    pub fn with_max_scrolls(mut self, scrolls: usize) -> Self {
        self.config.scraper.max_scrolls = scrolls;
        self
    }

    /// Zero every pause and delay, for replay runs and tests
    pub fn without_delays(mut self) -> Self {
        self.config.scraper.scroll_pause_secs = 0.0;
        self.config.scraper.term_delay_secs = 0.0;
        self.config.scraper.initial_wait_secs = 0.0;
        self
    }

    pub fn with_title_filter(mut self, enabled: bool) -> Self {
        self.config.scraper.title_filter = enabled;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.platform.base_url = base_url.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
