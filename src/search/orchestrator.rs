use chrono::{Local, NaiveDate};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{PaginationDriver, ResultExtractor, ResultRecord, SearchQuery, SearchUrlBuilder};
use crate::browser::{BrowserError, BrowserSession, SessionGuard, SessionLauncher};
use crate::config::Config;
use crate::{Result, ScraperError};

/// Parameters for one orchestrator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Terms searched in order
    pub terms: Vec<String>,
    /// Term result titles must mention when the title filter is on
    pub filter_term: String,
    pub title_filter: bool,
    /// Cap across all terms
    pub max_results: usize,
    /// Cap for a single term's scrape
    pub max_results_per_term: usize,
}

impl SearchRequest {
    /// A single-term request with limits taken from the config
    pub fn new(term: &str, config: &Config) -> Self {
        Self {
            terms: vec![term.to_string()],
            filter_term: term.to_string(),
            title_filter: config.scraper.title_filter,
            max_results: config.scraper.max_results,
            max_results_per_term: config.scraper.max_results_per_term,
        }
    }

    /// Search several terms, all filtered against `filter_term`
    pub fn with_terms(mut self, terms: Vec<String>) -> Self {
        if !terms.is_empty() {
            self.terms = terms;
        }
        self
    }

    pub fn with_filter_term(mut self, filter_term: &str) -> Self {
        self.filter_term = filter_term.to_string();
        self
    }

    pub fn with_title_filter(mut self, enabled: bool) -> Self {
        self.title_filter = enabled;
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn with_max_results_per_term(mut self, max: usize) -> Self {
        self.max_results_per_term = max;
        self
    }

    fn query_for(&self, term: &str) -> SearchQuery {
        SearchQuery::new(term, self.title_filter).with_filter_term(&self.filter_term)
    }
}

/// Drives search terms through URL building, pagination and extraction
#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    url_builder: SearchUrlBuilder,
    pagination: PaginationDriver,
    extractor: ResultExtractor,
    video_selector: String,
    initial_wait: Duration,
    term_delay: Duration,
    today: Option<NaiveDate>,
}

impl SearchOrchestrator {
    pub fn new(config: &Config) -> Result<Self> {
        let extractor = ResultExtractor::new(&config.platform)
            .map_err(|e| ScraperError::Config(format!("invalid base_url: {e}")))?;

        Ok(Self {
            url_builder: SearchUrlBuilder::new(&config.platform),
            pagination: PaginationDriver::new(config),
            extractor,
            video_selector: config.platform.selectors.video.clone(),
            initial_wait: config.scraper.initial_wait(),
            term_delay: config.scraper.term_delay(),
            today: None,
        })
    }

    /// Pin the date used for date-term detection instead of the local clock
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Run every term of `request` on `session`.
    ///
    /// Per-term failures are logged and contribute no results. The returned
    /// records are unique by URL and in first-seen order.
    pub fn run<S: BrowserSession>(&self, session: &S, request: &SearchRequest) -> Vec<ResultRecord> {
        let mut results: Vec<ResultRecord> = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        info!(
            "🔍 Starting scrape with search term: '{}', max {} videos total",
            request.filter_term, request.max_results
        );

        for (i, term) in request.terms.iter().enumerate() {
            if results.len() >= request.max_results {
                debug!("Global limit of {} reached, skipping remaining terms", request.max_results);
                break;
            }

            if i > 0 && !self.term_delay.is_zero() {
                std::thread::sleep(self.term_delay);
            }

            let query = request.query_for(term);
            let term_records = match self.scrape_term(session, &query, request.max_results_per_term) {
                Ok(records) => records,
                Err(e) if e.is_timeout() => {
                    warn!("Timeout loading search results for '{}': {}", term, e);
                    continue;
                }
                Err(e) => {
                    error!("Error scraping '{}': {}", term, e);
                    continue;
                }
            };

            let mut duplicates = 0;
            for record in term_records {
                if results.len() >= request.max_results {
                    break;
                }
                if seen_urls.insert(record.url.clone()) {
                    results.push(record);
                } else {
                    duplicates += 1;
                }
            }

            if duplicates > 0 {
                debug!("Dropped {} duplicate results for '{}'", duplicates, term);
            }
        }

        info!("✅ Scraping complete. Found {} unique videos", results.len());
        results
    }

    /// Scrape a single term; results are not yet deduplicated
    pub fn scrape_term<S: BrowserSession>(
        &self,
        session: &S,
        query: &SearchQuery,
        max_results: usize,
    ) -> std::result::Result<Vec<ResultRecord>, BrowserError> {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let search_url = self.url_builder.build(&query.term, today);

        info!("Searching: {}", query.term);
        session.navigate(&search_url)?;
        session.wait_until_present(&self.video_selector, self.initial_wait)?;

        let outcome = self.pagination.run(session, max_results)?;
        debug!("Pagination for '{}' ended with {:?}", query.term, outcome);

        let elements = session.find_all(&self.video_selector)?;
        let mut records = Vec::new();

        for element in elements.iter().take(max_results) {
            match self.extractor.extract(element, query) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => debug!("Error extracting video data: {}", e),
            }
        }

        info!("Found {} videos matching '{}'", records.len(), query.term);
        Ok(records)
    }
}

/// Acquire a session from `launcher`, run `request`, and release the session.
///
/// A launch failure is the only error; everything after that is recovered
/// per term. The session is closed on every exit path, unwinding included.
pub fn search_with_launcher<L: SessionLauncher>(
    launcher: &L,
    config: &Config,
    request: &SearchRequest,
) -> Result<Vec<ResultRecord>> {
    let orchestrator = SearchOrchestrator::new(config)?;
    let session = SessionGuard::acquire(launcher).map_err(|e| {
        error!("Failed to set up browser: {}", e);
        ScraperError::from(e)
    })?;
    Ok(orchestrator.run(&*session, request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::snapshot::SnapshotElement;
    use crate::browser::{scripts, PageElement, SnapshotLauncher, SnapshotSession};
    use crate::config::ConfigBuilder;
    use std::cell::RefCell;

    fn video(id: &str, title: &str) -> String {
        format!(
            r#"<ytd-video-renderer><a id="video-title" href="/watch?v={id}&amp;pp=x" title="{title}"></a></ytd-video-renderer>"#
        )
    }

    fn page(videos: &[(&str, &str)]) -> String {
        let body: String = videos.iter().map(|(id, title)| video(id, title)).collect();
        format!("<html><body>{body}</body></html>")
    }

    fn config() -> Config {
        ConfigBuilder::new().without_delays().build()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn run(launcher: &SnapshotLauncher, request: &SearchRequest) -> Vec<ResultRecord> {
        let config = config();
        let orchestrator = SearchOrchestrator::new(&config).unwrap().with_today(today());
        let session = SessionGuard::acquire(launcher).unwrap();
        orchestrator.run(&*session, request)
    }

    #[test]
    fn test_cats_scenario_converges_with_three_results() {
        let launcher = SnapshotLauncher::new().with_pages(
            "search_query=cats",
            vec![page(&[("c1", "Cats 1"), ("c2", "cats 2"), ("c3", "CATS 3")])],
        );
        let request = SearchRequest::new("cats", &config()).with_max_results_per_term(5);

        let records = run(&launcher, &request);
        let urls: Vec<_> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.youtube.com/watch?v=c1",
                "https://www.youtube.com/watch?v=c2",
                "https://www.youtube.com/watch?v=c3",
            ]
        );
        assert_eq!(
            launcher.visited(),
            vec!["https://www.youtube.com/results?search_query=cats&sp=CAISBAgBEAE%253D"]
        );
    }

    #[test]
    fn test_duplicates_removed_within_and_across_terms() {
        let launcher = SnapshotLauncher::new()
            .with_pages(
                "search_query=cats%20funny",
                vec![page(&[("b", "funny cats b"), ("c", "cats c")])],
            )
            .with_pages(
                "search_query=cats",
                vec![page(&[("a", "cats a"), ("b", "cats b"), ("a", "cats a again")])],
            );
        let request = SearchRequest::new("cats", &config())
            .with_terms(vec!["cats".to_string(), "cats funny".to_string()]);

        let records = run(&launcher, &request);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(records[1].title, "cats b");
        assert_eq!(records[2].search_term, "cats funny");
        assert_eq!(records[2].filter_term, "cats");
    }

    #[test]
    fn test_global_cap_stops_accumulation_and_skips_terms() {
        let launcher = SnapshotLauncher::new().with_pages(
            "",
            vec![page(&[("a", "x"), ("b", "x"), ("c", "x")])],
        );
        let request = SearchRequest::new("x", &config())
            .with_terms(vec!["x".to_string(), "y".to_string()])
            .with_max_results(2);

        let records = run(&launcher, &request);
        assert_eq!(records.len(), 2);
        assert_eq!(launcher.visited().len(), 1);
    }

    #[test]
    fn test_per_term_cap_limits_elements() {
        let launcher = SnapshotLauncher::new().with_pages(
            "",
            vec![page(&[("a", "x"), ("b", "x"), ("c", "x")])],
        );
        let request = SearchRequest::new("x", &config()).with_max_results_per_term(2);
        assert_eq!(run(&launcher, &request).len(), 2);
    }

    #[test]
    fn test_timeout_on_one_term_does_not_stop_the_run() {
        let launcher = SnapshotLauncher::new()
            .with_pages("search_query=empty", vec!["<html><body><p>No results</p></body></html>".to_string()])
            .with_pages("search_query=dogs", vec![page(&[("d1", "dogs")])]);
        let request = SearchRequest::new("dogs", &config())
            .with_terms(vec!["empty".to_string(), "dogs".to_string()]);

        let records = run(&launcher, &request);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "d1");
        assert_eq!(launcher.visited().len(), 2);
    }

    /// Snapshot session whose height script breaks on one term and whose
    /// `href` reads fail for ids starting with "broken".
    struct UnreliableSession {
        inner: SnapshotSession,
        stalled_term: &'static str,
        current_url: RefCell<String>,
    }

    struct UnreliableElement<'a> {
        inner: SnapshotElement<'a>,
    }

    impl PageElement for UnreliableElement<'_> {
        fn attribute(&self, name: &str) -> std::result::Result<Option<String>, BrowserError> {
            let value = self.inner.attribute(name)?;
            match value {
                Some(href) if name == "href" && href.contains("v=broken") => {
                    Err(BrowserError::Protocol("node detached from document".to_string()))
                }
                other => Ok(other),
            }
        }

        fn text(&self) -> std::result::Result<String, BrowserError> {
            self.inner.text()
        }

        fn find_one(&self, selector: &str) -> std::result::Result<Option<Self>, BrowserError> {
            Ok(self.inner.find_one(selector)?.map(|inner| UnreliableElement { inner }))
        }

        fn find_all(&self, selector: &str) -> std::result::Result<Vec<Self>, BrowserError> {
            Ok(self
                .inner
                .find_all(selector)?
                .into_iter()
                .map(|inner| UnreliableElement { inner })
                .collect())
        }
    }

    impl BrowserSession for UnreliableSession {
        type Element<'a> = UnreliableElement<'a>;

        fn navigate(&self, url: &str) -> std::result::Result<(), BrowserError> {
            *self.current_url.borrow_mut() = url.to_string();
            self.inner.navigate(url)
        }

        fn wait_until_present(&self, selector: &str, timeout: Duration) -> std::result::Result<(), BrowserError> {
            self.inner.wait_until_present(selector, timeout)
        }

        fn find_all(&self, selector: &str) -> std::result::Result<Vec<UnreliableElement<'_>>, BrowserError> {
            Ok(self
                .inner
                .find_all(selector)?
                .into_iter()
                .map(|inner| UnreliableElement { inner })
                .collect())
        }

        fn find_one(&self, selector: &str) -> std::result::Result<Option<UnreliableElement<'_>>, BrowserError> {
            Ok(self.inner.find_one(selector)?.map(|inner| UnreliableElement { inner }))
        }

        fn execute_script(&self, script: &str) -> std::result::Result<serde_json::Value, BrowserError> {
            if script == scripts::CONTENT_HEIGHT && self.current_url.borrow().contains(self.stalled_term) {
                return Ok(serde_json::Value::String("n/a".to_string()));
            }
            self.inner.execute_script(script)
        }

        fn close(&mut self) -> std::result::Result<(), BrowserError> {
            self.inner.close()
        }
    }

    #[test]
    fn test_element_and_term_errors_are_skipped() {
        let launcher = SnapshotLauncher::new()
            .with_pages("search_query=cats%20stalled", vec![page(&[("s1", "cats stalled")])])
            .with_pages(
                "search_query=cats",
                vec![page(&[("a1", "cats a"), ("broken1", "cats broken"), ("b2", "cats b")])],
            );
        let request = SearchRequest::new("cats", &config())
            .with_terms(vec!["cats stalled".to_string(), "cats".to_string()]);

        let config = config();
        let orchestrator = SearchOrchestrator::new(&config).unwrap().with_today(today());
        let mut session = UnreliableSession {
            inner: launcher.launch().unwrap(),
            stalled_term: "search_query=cats%20stalled",
            current_url: RefCell::new(String::new()),
        };

        let records = orchestrator.run(&session, &request);
        session.close().unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b2"]);
        assert_eq!(launcher.visited().len(), 2);
        assert_eq!(launcher.open_sessions(), 0);
    }

    #[test]
    fn test_title_filter_toggle() {
        let launcher = SnapshotLauncher::new().with_pages(
            "",
            vec![page(&[("a", "Breaking NEWS Today"), ("b", "Weather")])],
        );
        let filtered = run(&launcher, &SearchRequest::new("news", &config()));
        assert_eq!(filtered.len(), 1);

        let unfiltered = run(&launcher, &SearchRequest::new("news", &config()).with_title_filter(false));
        assert_eq!(unfiltered.len(), 2);
    }

    #[test]
    fn test_date_term_skips_recency_filter() {
        let launcher = SnapshotLauncher::new();
        let request = SearchRequest::new("10/19/2026", &config());
        assert!(run(&launcher, &request).is_empty());
        assert_eq!(
            launcher.visited(),
            vec!["https://www.youtube.com/results?search_query=10%2F19%2F2026"]
        );
    }

    #[test]
    fn test_search_with_launcher_releases_session() {
        let launcher = SnapshotLauncher::new().with_pages("", vec![page(&[("a", "cats")])]);
        let records = search_with_launcher(&launcher, &config(), &SearchRequest::new("cats", &config())).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(launcher.open_sessions(), 0);
    }

    #[test]
    fn test_search_with_launcher_surfaces_setup_failure() {
        let launcher = SnapshotLauncher::failing("chrome not found");
        let result = search_with_launcher(&launcher, &config(), &SearchRequest::new("cats", &config()));
        assert!(matches!(result, Err(ScraperError::Browser(BrowserError::Launch(_)))));
    }
}
