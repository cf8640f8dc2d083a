//! Replay backend over captured HTML pages
//!
//! Each route maps a URL fragment to an ordered list of pages. Navigating to a
//! matching URL reveals the first page; every scroll script reveals one more,
//! so the document grows the way an infinite-scroll result list does and stops
//! growing once the last page is shown.

use scraper::{ElementRef, Html, Selector};
use std::cell::Cell;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{scripts, BrowserError, BrowserSession, PageElement, SessionLauncher};

/// Height reported per revealed page
const DEFAULT_PAGE_HEIGHT: f64 = 1080.0;

#[derive(Debug, Clone)]
struct SnapshotRoute {
    pattern: String,
    pages: Vec<String>,
}

/// Builds [`SnapshotSession`]s from in-memory or on-disk HTML pages
#[derive(Debug, Clone)]
pub struct SnapshotLauncher {
    routes: Vec<SnapshotRoute>,
    page_height: f64,
    launch_failure: Option<String>,
    open: Arc<AtomicUsize>,
    visited: Arc<Mutex<Vec<String>>>,
}

impl SnapshotLauncher {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            page_height: DEFAULT_PAGE_HEIGHT,
            launch_failure: None,
            open: Arc::new(AtomicUsize::new(0)),
            visited: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A launcher whose every launch fails, for exercising setup errors
    pub fn failing(reason: &str) -> Self {
        Self {
            launch_failure: Some(reason.to_string()),
            ..Self::new()
        }
    }

    /// Serve `pages` for any URL containing `pattern`.
    /// Routes are matched in insertion order; an empty pattern matches everything.
    pub fn with_pages(mut self, pattern: &str, pages: Vec<String>) -> Self {
        self.routes.push(SnapshotRoute {
            pattern: pattern.to_string(),
            pages,
        });
        self
    }

    /// Load every `*.html` file under `dir`, sorted by path, as one catch-all route
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut files: Vec<_> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(anyhow::anyhow!("No HTML snapshots found in {}", dir.display()));
        }

        let mut pages = Vec::with_capacity(files.len());
        for file in &files {
            pages.push(std::fs::read_to_string(file)?);
        }

        info!("📂 Loaded {} snapshot pages from {}", pages.len(), dir.display());
        Ok(Self::new().with_pages("", pages))
    }

    /// Number of sessions launched and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// URLs navigated to by any session from this launcher, in order
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Default for SnapshotLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLauncher for SnapshotLauncher {
    type Session = SnapshotSession;

    fn launch(&self) -> Result<SnapshotSession, BrowserError> {
        if let Some(reason) = &self.launch_failure {
            return Err(BrowserError::Launch(reason.clone()));
        }

        let routes = self
            .routes
            .iter()
            .map(|route| {
                (
                    route.pattern.clone(),
                    route.pages.iter().map(|p| Html::parse_document(p)).collect(),
                )
            })
            .collect();

        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(SnapshotSession {
            routes,
            active: Cell::new(None),
            revealed: Cell::new(0),
            page_height: self.page_height,
            closed: false,
            open: self.open.clone(),
            visited: self.visited.clone(),
        })
    }
}

/// A session over parsed snapshot pages
pub struct SnapshotSession {
    routes: Vec<(String, Vec<Html>)>,
    active: Cell<Option<usize>>,
    revealed: Cell<usize>,
    page_height: f64,
    closed: bool,
    open: Arc<AtomicUsize>,
    visited: Arc<Mutex<Vec<String>>>,
}

impl SnapshotSession {
    fn ensure_open(&self) -> Result<(), BrowserError> {
        if self.closed {
            Err(BrowserError::Closed)
        } else {
            Ok(())
        }
    }

    fn visible_pages(&self) -> &[Html] {
        match self.active.get() {
            Some(idx) => {
                let pages = &self.routes[idx].1;
                &pages[..self.revealed.get().min(pages.len())]
            }
            None => &[],
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector).map_err(|e| BrowserError::InvalidSelector(format!("{selector}: {e:?}")))
}

impl BrowserSession for SnapshotSession {
    type Element<'a> = SnapshotElement<'a>;

    fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.ensure_open()?;

        let route = self
            .routes
            .iter()
            .position(|(pattern, _)| url.contains(pattern.as_str()));
        self.active.set(route);
        self.revealed.set(route.map(|idx| self.routes[idx].1.len().min(1)).unwrap_or(0));
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(url.to_string());
        }

        debug!("Snapshot navigate {} -> route {:?}", url, route);
        Ok(())
    }

    fn wait_until_present(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        if self.find_one(selector)?.is_some() {
            Ok(())
        } else {
            Err(BrowserError::ElementTimeout {
                selector: selector.to_string(),
                timeout,
            })
        }
    }

    fn find_all(&self, selector: &str) -> Result<Vec<SnapshotElement<'_>>, BrowserError> {
        self.ensure_open()?;
        let selector = parse_selector(selector)?;
        Ok(self
            .visible_pages()
            .iter()
            .flat_map(|page| page.select(&selector).map(SnapshotElement::new).collect::<Vec<_>>())
            .collect())
    }

    fn find_one(&self, selector: &str) -> Result<Option<SnapshotElement<'_>>, BrowserError> {
        self.ensure_open()?;
        let selector = parse_selector(selector)?;
        Ok(self
            .visible_pages()
            .iter()
            .find_map(|page| page.select(&selector).next())
            .map(SnapshotElement::new))
    }

    fn execute_script(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        self.ensure_open()?;
        match script {
            scripts::SCROLL_TO_BOTTOM => {
                if let Some(idx) = self.active.get() {
                    let total = self.routes[idx].1.len();
                    self.revealed.set((self.revealed.get() + 1).min(total));
                }
                Ok(serde_json::Value::Null)
            }
            scripts::CONTENT_HEIGHT => Ok(serde_json::json!(
                self.revealed.get() as f64 * self.page_height
            )),
            scripts::MASK_WEBDRIVER => Ok(serde_json::Value::Null),
            other => Err(BrowserError::Script(format!(
                "snapshot pages cannot evaluate: {other}"
            ))),
        }
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        if !self.closed {
            self.closed = true;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for SnapshotSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Element inside a snapshot page
#[derive(Debug, Clone, Copy)]
pub struct SnapshotElement<'a> {
    inner: ElementRef<'a>,
}

impl<'a> SnapshotElement<'a> {
    fn new(inner: ElementRef<'a>) -> Self {
        Self { inner }
    }
}

impl<'a> PageElement for SnapshotElement<'a> {
    fn attribute(&self, name: &str) -> Result<Option<String>, BrowserError> {
        Ok(self.inner.value().attr(name).map(str::to_string))
    }

    fn text(&self) -> Result<String, BrowserError> {
        let text = self.inner.text().collect::<Vec<_>>().join(" ");
        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    fn find_one(&self, selector: &str) -> Result<Option<Self>, BrowserError> {
        let selector = parse_selector(selector)?;
        Ok(self.inner.select(&selector).next().map(SnapshotElement::new))
    }

    fn find_all(&self, selector: &str) -> Result<Vec<Self>, BrowserError> {
        let selector = parse_selector(selector)?;
        Ok(self.inner.select(&selector).map(SnapshotElement::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn page(items: &[&str]) -> String {
        let body: String = items
            .iter()
            .map(|i| format!(r#"<div class="item" data-id="{i}"><span class="label">  {i}  </span></div>"#))
            .collect();
        format!("<html><body>{body}</body></html>")
    }

    fn height(session: &SnapshotSession) -> f64 {
        session
            .execute_script(scripts::CONTENT_HEIGHT)
            .unwrap()
            .as_f64()
            .unwrap()
    }

    #[test]
    fn test_nothing_visible_before_navigation() {
        let launcher = SnapshotLauncher::new().with_pages("", vec![page(&["a"])]);
        let session = launcher.launch().unwrap();
        assert!(session.find_all(".item").unwrap().is_empty());
        assert_eq!(height(&session), 0.0);
    }

    #[test]
    fn test_scroll_reveals_pages_until_exhausted() {
        let launcher = SnapshotLauncher::new().with_pages("", vec![page(&["a", "b"]), page(&["c"])]);
        let session = launcher.launch().unwrap();
        session.navigate("https://example.test/results").unwrap();

        assert_eq!(session.find_all(".item").unwrap().len(), 2);
        let first = height(&session);

        session.execute_script(scripts::SCROLL_TO_BOTTOM).unwrap();
        assert_eq!(session.find_all(".item").unwrap().len(), 3);
        let second = height(&session);
        assert!(second > first);

        session.execute_script(scripts::SCROLL_TO_BOTTOM).unwrap();
        assert_eq!(height(&session), second);
    }

    #[test]
    fn test_routes_select_pages_by_url() {
        let launcher = SnapshotLauncher::new()
            .with_pages("search_query=dogs", vec![page(&["dog"])])
            .with_pages("search_query=cats", vec![page(&["cat1", "cat2"])]);
        let session = launcher.launch().unwrap();

        session.navigate("https://example.test/results?search_query=cats").unwrap();
        assert_eq!(session.find_all(".item").unwrap().len(), 2);

        session.navigate("https://example.test/results?search_query=birds").unwrap();
        assert!(session.find_all(".item").unwrap().is_empty());
        assert!(session.wait_until_present(".item", Duration::ZERO).is_err());

        assert_eq!(launcher.visited().len(), 2);
    }

    #[test]
    fn test_element_text_and_attributes() {
        let launcher = SnapshotLauncher::new().with_pages("", vec![page(&["alpha"])]);
        let session = launcher.launch().unwrap();
        session.navigate("https://example.test/").unwrap();

        let item = session.find_one(".item").unwrap().unwrap();
        assert_eq!(item.attribute("data-id").unwrap().as_deref(), Some("alpha"));
        assert_eq!(item.attribute("missing").unwrap(), None);

        let label = item.find_one(".label").unwrap().unwrap();
        assert_eq!(label.text().unwrap(), "alpha");
        assert!(item.find_one(".nope").unwrap().is_none());
        assert_eq!(item.find_all("span").unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_selector_and_unknown_script() {
        let launcher = SnapshotLauncher::new().with_pages("", vec![page(&["a"])]);
        let session = launcher.launch().unwrap();
        session.navigate("https://example.test/").unwrap();

        assert!(matches!(session.find_all("[[["), Err(BrowserError::InvalidSelector(_))));
        assert!(matches!(session.execute_script("alert(1)"), Err(BrowserError::Script(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let launcher = SnapshotLauncher::new().with_pages("", vec![page(&["a"])]);
        let mut session = launcher.launch().unwrap();
        assert_eq!(launcher.open_sessions(), 1);

        session.close().unwrap();
        session.close().unwrap();
        assert_eq!(launcher.open_sessions(), 0);
        assert!(matches!(session.navigate("https://example.test/"), Err(BrowserError::Closed)));

        drop(session);
        assert_eq!(launcher.open_sessions(), 0);
    }

    #[test]
    fn test_from_dir_sorts_pages_by_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("02.html"), page(&["second"])).unwrap();
        std::fs::write(dir.path().join("01.html"), page(&["first"])).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let launcher = SnapshotLauncher::from_dir(dir.path()).unwrap();
        let session = launcher.launch().unwrap();
        session.navigate("https://example.test/").unwrap();

        let first = session.find_one(".item").unwrap().unwrap();
        assert_eq!(first.attribute("data-id").unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn test_from_dir_rejects_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(SnapshotLauncher::from_dir(dir.path()).is_err());
    }
}
