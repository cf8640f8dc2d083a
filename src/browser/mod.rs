//! Browser capability layer
//!
//! The search pipeline only talks to these traits. Any automation backend that
//! can navigate, query the DOM and run a script can drive it: the Chrome
//! DevTools backend for live scraping, or the snapshot backend for replaying
//! saved result pages.

use std::ops::Deref;
use std::time::Duration;
use tracing::{debug, warn};

pub mod chrome;
pub mod snapshot;

pub use chrome::{ChromeLauncher, ChromeSession};
pub use snapshot::{SnapshotLauncher, SnapshotSession};

/// Scripts the pipeline sends through `execute_script`.
pub mod scripts {
    /// Scroll the viewport to the bottom to trigger lazy loading
    pub const SCROLL_TO_BOTTOM: &str =
        "window.scrollTo(0, document.documentElement.scrollHeight);";

    /// Current scrollable height of the document
    pub const CONTENT_HEIGHT: &str = "document.documentElement.scrollHeight";

    /// Hide the automation flag from page scripts
    pub const MASK_WEBDRIVER: &str =
        "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";
}

/// Errors raised by a browser backend
#[derive(thiserror::Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Timed out after {timeout:?} waiting for '{selector}'")]
    ElementTimeout { selector: String, timeout: Duration },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Browser session is closed")]
    Closed,

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

impl BrowserError {
    /// Whether this error is one of the bounded-wait timeouts
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BrowserError::NavigationTimeout { .. } | BrowserError::ElementTimeout { .. }
        )
    }
}

/// One DOM element returned by a session
pub trait PageElement: Sized {
    /// Attribute value, `None` when the attribute is not set
    fn attribute(&self, name: &str) -> Result<Option<String>, BrowserError>;

    /// Visible text content
    fn text(&self) -> Result<String, BrowserError>;

    /// First descendant matching `selector`
    fn find_one(&self, selector: &str) -> Result<Option<Self>, BrowserError>;

    /// All descendants matching `selector`, in document order
    fn find_all(&self, selector: &str) -> Result<Vec<Self>, BrowserError>;
}

/// A live page the pipeline can drive
pub trait BrowserSession {
    type Element<'a>: PageElement
    where
        Self: 'a;

    fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    fn wait_until_present(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    fn find_all(&self, selector: &str) -> Result<Vec<Self::Element<'_>>, BrowserError>;

    fn find_one(&self, selector: &str) -> Result<Option<Self::Element<'_>>, BrowserError>;

    fn execute_script(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Release the session. Calling it more than once is a no-op.
    fn close(&mut self) -> Result<(), BrowserError>;
}

/// Factory for browser sessions
///
/// Launchers are shared across request handlers, so they must be thread-safe.
/// The sessions they produce are not; each is used from a single thread.
pub trait SessionLauncher: Send + Sync + 'static {
    type Session: BrowserSession;

    fn launch(&self) -> Result<Self::Session, BrowserError>;
}

/// Owns a session for the duration of a scope and closes it on drop
pub struct SessionGuard<S: BrowserSession> {
    session: S,
}

impl<S: BrowserSession> SessionGuard<S> {
    /// Launch a session; a launch failure is returned to the caller
    pub fn acquire<L>(launcher: &L) -> Result<Self, BrowserError>
    where
        L: SessionLauncher<Session = S>,
    {
        let session = launcher.launch()?;
        debug!("Browser session acquired");
        Ok(Self { session })
    }
}

impl<S: BrowserSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: BrowserSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        match self.session.close() {
            Ok(()) => debug!("Browser session released"),
            Err(e) => warn!("Error closing browser session: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const PAGE: &str = r#"<html><body><div class="item">one</div></body></html>"#;

    struct CountingLauncher {
        inner: SnapshotLauncher,
        launches: Arc<AtomicUsize>,
    }

    impl SessionLauncher for CountingLauncher {
        type Session = SnapshotSession;

        fn launch(&self) -> Result<SnapshotSession, BrowserError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            self.inner.launch()
        }
    }

    #[test]
    fn test_guard_closes_session_on_drop() {
        let launcher = SnapshotLauncher::new().with_pages("", vec![PAGE.to_string()]);
        let guard = SessionGuard::acquire(&launcher).unwrap();
        assert_eq!(launcher.open_sessions(), 1);
        drop(guard);
        assert_eq!(launcher.open_sessions(), 0);
    }

    #[test]
    fn test_guard_closes_session_on_early_return() {
        fn scrape(launcher: &SnapshotLauncher) -> Result<usize, BrowserError> {
            let guard = SessionGuard::acquire(launcher)?;
            guard.navigate("https://example.test/")?;
            guard.wait_until_present(".missing", Duration::ZERO)?;
            Ok(1)
        }

        let launcher = SnapshotLauncher::new().with_pages("", vec![PAGE.to_string()]);
        let err = scrape(&launcher).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(launcher.open_sessions(), 0);
    }

    #[test]
    fn test_guard_propagates_launch_failure() {
        let launcher = SnapshotLauncher::failing("no browser available");
        let result = SessionGuard::acquire(&launcher);
        assert!(matches!(result, Err(BrowserError::Launch(_))));
    }

    #[test]
    fn test_launcher_called_once_per_guard() {
        let launches = Arc::new(AtomicUsize::new(0));
        let launcher = CountingLauncher {
            inner: SnapshotLauncher::new(),
            launches: launches.clone(),
        };
        {
            let _a = SessionGuard::acquire(&launcher).unwrap();
            let _b = SessionGuard::acquire(&launcher).unwrap();
        }
        assert_eq!(launches.load(Ordering::SeqCst), 2);
    }
}
