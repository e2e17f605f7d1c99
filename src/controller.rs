//! Search session controller
//!
//! Drives the single rendering session through the per-term protocol:
//!
//! ```text
//! AtEntryPage --submit--> Searching --+--> DetailRendered   (landed on a matching page)
//!                                     +--> ResultsRendered  (candidate links interactable)
//! ```
//!
//! Every wait is bounded. [`SearchController::reset`] is the one way back to
//! `AtEntryPage` and is safe to call from any state.

use tracing::{debug, info};

use crate::config::{DirectoryConfig, TimeoutConfig};
use crate::matcher::title_matches;
use crate::page::{DirectoryPage, ElementHandle, PageError, RenderedElement};
use crate::wait::poll_until;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing is known about the page (fresh session or after a failure)
    Unknown,
    AtEntryPage,
    Searching,
    ResultsRendered,
    DetailRendered,
}

/// Where a search ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Landing {
    /// The engine went straight to the matching detail page
    Detail { title: String },
    /// A results list rendered; candidates are in render order
    Results(Vec<RenderedElement>),
}

/// Owns the rendering session for the whole run.
pub struct SearchController<'c, P: DirectoryPage> {
    page: P,
    directory: &'c DirectoryConfig,
    timeouts: &'c TimeoutConfig,
    state: SessionState,
}

impl<'c, P: DirectoryPage> SearchController<'c, P> {
    pub fn new(page: P, directory: &'c DirectoryConfig, timeouts: &'c TimeoutConfig) -> Self {
        Self {
            page,
            directory,
            timeouts,
            state: SessionState::Unknown,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The session, for extraction on the current detail page.
    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    /// Give the session back, e.g. to close it.
    pub fn into_page(self) -> P {
        self.page
    }

    /// Re-establish `AtEntryPage`: entry URL loaded and search field present.
    ///
    /// A no-op when already there. Any failure leaves the state `Unknown`.
    pub fn reset(&mut self) -> Result<(), PageError> {
        if self.state == SessionState::AtEntryPage {
            return Ok(());
        }
        self.state = SessionState::Unknown;

        debug!("Resetting to entry page {}", self.directory.entry_url);
        self.page.navigate(&self.directory.entry_url)?;

        let search_field = &self.directory.search_field;
        let page = &mut self.page;
        poll_until(
            "search field",
            self.timeouts.entry_page(),
            self.timeouts.poll_interval(),
            || Ok(page.query(search_field)?.into_iter().next().map(|_| ())),
        )?;

        self.state = SessionState::AtEntryPage;
        Ok(())
    }

    /// Submit `term` from the entry page and wait for a landing.
    ///
    /// Returns [`PageError::Timeout`] when neither a matching detail page nor
    /// an interactable result link shows up in time.
    pub fn search(&mut self, term: &str) -> Result<Landing, PageError> {
        self.reset()?;

        self.state = SessionState::Searching;
        self.page.fill_and_submit(&self.directory.search_field, term)?;

        let directory = self.directory;
        let page = &mut self.page;
        let landing = poll_until(
            "search results",
            self.timeouts.results(),
            self.timeouts.poll_interval(),
            || {
                if let Some(title) = page.query(&directory.detail_title)?.into_iter().next() {
                    if title_matches(term, &title.text) {
                        return Ok(Some(Landing::Detail { title: title.text }));
                    }
                }
                let links = page.query(&directory.result_links)?;
                if links.iter().any(|l| l.visible) {
                    return Ok(Some(Landing::Results(links)));
                }
                Ok(None)
            },
        )?;

        match &landing {
            Landing::Detail { title } => {
                info!("Landed directly on detail page '{}'", title);
                self.state = SessionState::DetailRendered;
            }
            Landing::Results(links) => {
                debug!("{} result links rendered for '{}'", links.len(), term);
                self.state = SessionState::ResultsRendered;
            }
        }
        Ok(landing)
    }

    /// Click a result and wait for a detail page whose title names `term`.
    ///
    /// The click returns before navigation and the results page has a title
    /// too; any title that does not name `term` is still the old page.
    pub fn open_candidate(&mut self, term: &str, handle: &ElementHandle) -> Result<(), PageError> {
        self.page.click(handle)?;
        self.state = SessionState::Unknown;

        let detail_title = &self.directory.detail_title;
        let page = &mut self.page;
        poll_until("detail page", self.timeouts.detail(), self.timeouts.poll_interval(), || {
            Ok(page
                .query(detail_title)?
                .into_iter()
                .find(|title| title_matches(term, &title.text))
                .map(|_| ()))
        })?;

        self.state = SessionState::DetailRendered;
        Ok(())
    }

    /// Forget the current state so the next [`reset`](Self::reset) navigates.
    pub fn invalidate(&mut self) {
        self.state = SessionState::Unknown;
    }
}
