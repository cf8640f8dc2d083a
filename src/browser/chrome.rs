//! Chrome DevTools backend built on headless_chrome

use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::util::Timeout;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{scripts, BrowserError, BrowserSession, PageElement, SessionLauncher};
use crate::config::BrowserConfig;

/// Launch switches applied to every Chrome process
const CHROME_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-features=VizDisplayCompositor",
    "--disable-blink-features=AutomationControlled",
];

/// A navigation error counts as a timeout when headless_chrome reports one,
/// or when the page load bound has already elapsed.
fn is_navigation_timeout(error: &anyhow::Error, elapsed: Duration, bound: Duration) -> bool {
    error.is::<Timeout>() || elapsed >= bound
}

/// Starts a fresh Chrome process per session
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

impl SessionLauncher for ChromeLauncher {
    type Session = ChromeSession;

    fn launch(&self) -> Result<ChromeSession, BrowserError> {
        ChromeSession::launch(&self.config)
    }
}

/// One Chrome process driving a single tab
pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    page_load_timeout: Duration,
}

impl ChromeSession {
    pub fn launch(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let args: Vec<&OsStr> = CHROME_ARGS
            .iter()
            .map(OsStr::new)
            .chain(config.extra_args.iter().map(OsStr::new))
            .collect();

        let options = LaunchOptions {
            headless: config.headless,
            sandbox: config.sandbox,
            window_size: Some((config.window_width, config.window_height)),
            path: config.chrome_path.clone(),
            idle_browser_timeout: config.idle_timeout(),
            args,
            ..Default::default()
        };

        let browser = Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::Launch(format!("failed to open tab: {e}")))?;

        tab.set_default_timeout(config.page_load_timeout());
        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| BrowserError::Launch(format!("failed to set user agent: {e}")))?;

        info!("🌐 Chrome session started (headless: {})", config.headless);

        Ok(Self {
            browser: Some(browser),
            tab,
            page_load_timeout: config.page_load_timeout(),
        })
    }

    fn ensure_open(&self) -> Result<(), BrowserError> {
        if self.browser.is_some() {
            Ok(())
        } else {
            Err(BrowserError::Closed)
        }
    }
}

fn protocol_error(e: anyhow::Error) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

impl BrowserSession for ChromeSession {
    type Element<'a> = ChromeElement<'a>;

    fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.ensure_open()?;
        let started = Instant::now();

        let result = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated());

        if let Err(e) = result {
            if is_navigation_timeout(&e, started.elapsed(), self.page_load_timeout) {
                return Err(BrowserError::NavigationTimeout {
                    url: url.to_string(),
                    timeout: self.page_load_timeout,
                });
            }
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }

        if let Err(e) = self.tab.evaluate(scripts::MASK_WEBDRIVER, false) {
            debug!("Could not mask webdriver flag: {}", e);
        }

        Ok(())
    }

    fn wait_until_present(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|e| {
                debug!("Wait for '{}' failed: {}", selector, e);
                BrowserError::ElementTimeout {
                    selector: selector.to_string(),
                    timeout,
                }
            })
    }

    fn find_all(&self, selector: &str) -> Result<Vec<ChromeElement<'_>>, BrowserError> {
        self.ensure_open()?;
        match self.tab.find_elements(selector) {
            Ok(elements) => Ok(elements.into_iter().map(ChromeElement::new).collect()),
            Err(e) if e.is::<NoElementFound>() => Ok(Vec::new()),
            Err(e) => Err(protocol_error(e)),
        }
    }

    fn find_one(&self, selector: &str) -> Result<Option<ChromeElement<'_>>, BrowserError> {
        self.ensure_open()?;
        match self.tab.find_element(selector) {
            Ok(element) => Ok(Some(ChromeElement::new(element))),
            Err(e) if e.is::<NoElementFound>() => Ok(None),
            Err(e) => Err(protocol_error(e)),
        }
    }

    fn execute_script(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        self.ensure_open()?;
        let remote = self
            .tab
            .evaluate(script, false)
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(remote.value.unwrap_or(serde_json::Value::Null))
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        let Some(browser) = self.browser.take() else {
            return Ok(());
        };

        if let Err(e) = self.tab.close(true) {
            warn!("Error closing tab: {}", e);
        }
        drop(browser);
        info!("Browser closed successfully");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// DOM node inside the session's tab
pub struct ChromeElement<'a> {
    inner: Element<'a>,
}

impl<'a> ChromeElement<'a> {
    fn new(inner: Element<'a>) -> Self {
        Self { inner }
    }
}

impl<'a> PageElement for ChromeElement<'a> {
    fn attribute(&self, name: &str) -> Result<Option<String>, BrowserError> {
        self.inner.get_attribute_value(name).map_err(protocol_error)
    }

    fn text(&self) -> Result<String, BrowserError> {
        self.inner.get_inner_text().map_err(protocol_error)
    }

    fn find_one(&self, selector: &str) -> Result<Option<Self>, BrowserError> {
        match self.inner.find_element(selector) {
            Ok(element) => Ok(Some(ChromeElement::new(element))),
            Err(e) if e.is::<NoElementFound>() => Ok(None),
            Err(e) => Err(protocol_error(e)),
        }
    }

    fn find_all(&self, selector: &str) -> Result<Vec<Self>, BrowserError> {
        match self.inner.find_elements(selector) {
            Ok(elements) => Ok(elements.into_iter().map(ChromeElement::new).collect()),
            Err(e) if e.is::<NoElementFound>() => Ok(Vec::new()),
            Err(e) => Err(protocol_error(e)),
        }
    }
}
