use std::time::Duration;
use tracing::{debug, info};

use crate::browser::{scripts, BrowserError, BrowserSession};
use crate::config::Config;

/// How a pagination run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationOutcome {
    /// At least the target number of results is loaded
    TargetReached { count: usize },
    /// Content height stopped growing; the result list is exhausted
    Converged { count: usize },
    /// Ran out of scroll iterations
    BudgetExhausted { count: usize },
}

impl PaginationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PaginationOutcome::TargetReached { .. })
    }

    /// Result count observed on the last iteration
    pub fn count(&self) -> usize {
        match *self {
            PaginationOutcome::TargetReached { count }
            | PaginationOutcome::Converged { count }
            | PaginationOutcome::BudgetExhausted { count } => count,
        }
    }
}

/// Per-call scroll state
#[derive(Debug, Clone, Copy)]
struct PaginationState {
    last_height: f64,
    iterations: usize,
}

/// Scrolls a result page until enough results are loaded or nothing more arrives
#[derive(Debug, Clone)]
pub struct PaginationDriver {
    video_selector: String,
    max_scrolls: usize,
    pause: Duration,
}

impl PaginationDriver {
    pub fn new(config: &Config) -> Self {
        Self {
            video_selector: config.platform.selectors.video.clone(),
            max_scrolls: config.scraper.max_scrolls,
            pause: config.scraper.scroll_pause(),
        }
    }

    pub fn with_max_scrolls(mut self, max_scrolls: usize) -> Self {
        self.max_scrolls = max_scrolls;
        self
    }

    /// Drive the session toward `target` visible results.
    ///
    /// Only the outcome is returned; callers re-query the element list afterwards
    /// since more results may have been appended after the last count.
    pub fn run<S: BrowserSession>(&self, session: &S, target: usize) -> Result<PaginationOutcome, BrowserError> {
        let mut state = PaginationState {
            last_height: content_height(session)?,
            iterations: 0,
        };
        let mut count = 0;

        while state.iterations < self.max_scrolls {
            session.execute_script(scripts::SCROLL_TO_BOTTOM)?;

            if !self.pause.is_zero() {
                std::thread::sleep(self.pause);
            }

            count = session.find_all(&self.video_selector)?.len();
            if count >= target {
                info!("Reached target video count: {}", count);
                return Ok(PaginationOutcome::TargetReached { count });
            }

            let new_height = content_height(session)?;
            if new_height == state.last_height {
                info!("No more content to load ({} results)", count);
                return Ok(PaginationOutcome::Converged { count });
            }

            state.last_height = new_height;
            state.iterations += 1;
            debug!("Scroll {}, videos found: {}", state.iterations, count);
        }

        debug!("Scroll budget of {} exhausted with {} results", self.max_scrolls, count);
        Ok(PaginationOutcome::BudgetExhausted { count })
    }
}

fn content_height<S: BrowserSession>(session: &S) -> Result<f64, BrowserError> {
    let value = session.execute_script(scripts::CONTENT_HEIGHT)?;
    value
        .as_f64()
        .ok_or_else(|| BrowserError::Script(format!("content height is not a number: {value}")))
}
