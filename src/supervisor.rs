//! Recovery supervisor
//!
//! Runs the per-term sequence (search, match or direct landing, extract) and
//! decides what each failure means for the batch:
//!
//! | Condition                               | Class       | Outcome                          |
//! |-----------------------------------------|-------------|----------------------------------|
//! | results/detail page not rendered in time| recoverable | Skipped("no search results")     |
//! | no candidate text matches               | recoverable | Skipped("no matching link")      |
//! | element invalidated mid-read            | recoverable | Skipped("page changed while reading") |
//! | no role yields a name                   | recoverable | Skipped("no contact data found") |
//! | other engine error                      | recoverable | Errored("page error: ...")       |
//! | session lost / entry page unreachable   | fatal       | batch aborted                    |
//!
//! Every recoverable path goes through one reset back to the entry page
//! before the next term starts.

use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::contact::{BatchResult, ContactRecord, ScrapeOutcome};
use crate::controller::{Landing, SearchController};
use crate::extractor::{ContactExtractor, Extraction};
use crate::logger::RunLogger;
use crate::matcher::select_candidate;
use crate::normalizer::SearchTerm;
use crate::page::{DirectoryPage, PageError};

/// Reason given for a term that was given up on without stopping the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoSearchResults,
    NoMatchingLink,
    NoContactData,
    StaleElement,
    /// Unclassified engine failure; reported as Errored
    PageError(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoSearchResults => f.write_str("no search results"),
            SkipReason::NoMatchingLink => f.write_str("no matching link"),
            SkipReason::NoContactData => f.write_str("no contact data found"),
            SkipReason::StaleElement => f.write_str("page changed while reading"),
            SkipReason::PageError(msg) => write!(f, "page error: {}", msg),
        }
    }
}

/// Failure of one step of the per-term sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// Scoped to the current term
    Skip(SkipReason),
    /// Ends the batch
    Fatal(String),
}

impl StepError {
    /// Classify an engine error. `on_timeout` names what a timeout means at this step.
    fn from_page(e: PageError, on_timeout: SkipReason) -> Self {
        match e {
            PageError::SessionLost(msg) => StepError::Fatal(format!("browser session lost: {}", msg)),
            PageError::Timeout { .. } => StepError::Skip(on_timeout),
            PageError::StaleElement(_) => StepError::Skip(SkipReason::StaleElement),
            PageError::Other(msg) => StepError::Skip(SkipReason::PageError(msg)),
        }
    }
}

/// Outcome for terms never attempted because the batch stopped.
pub const NOT_ATTEMPTED: &str = "not attempted: batch aborted";

/// Abort reason recorded when the interrupt check fires.
pub const ABORT_INTERRUPTED: &str = "interrupted";

/// Runs a batch of terms against one session, isolating per-term failures.
pub struct Supervisor<'r, 'c, P: DirectoryPage> {
    controller: SearchController<'c, P>,
    extractor: &'r ContactExtractor,
    logger: &'r RunLogger,
    request_delay: Duration,
    interrupted: Box<dyn Fn() -> bool + 'r>,
}

impl<'r, 'c, P: DirectoryPage> Supervisor<'r, 'c, P> {
    pub fn new(
        controller: SearchController<'c, P>,
        extractor: &'r ContactExtractor,
        logger: &'r RunLogger,
        request_delay: Duration,
    ) -> Self {
        Self {
            controller,
            extractor,
            logger,
            request_delay,
            interrupted: Box::new(|| false),
        }
    }

    /// Check `interrupted` before each term; when it returns true the batch
    /// is aborted as if the session had been lost.
    pub fn with_interrupt_check(mut self, interrupted: impl Fn() -> bool + 'r) -> Self {
        self.interrupted = Box::new(interrupted);
        self
    }

    /// Give the session back once the batch is over.
    pub fn into_page(self) -> P {
        self.controller.into_page()
    }

    /// Process every term in order.
    ///
    /// Always returns exactly one outcome per term, in input order. A fatal
    /// error marks the in-flight term and every later term as errored and
    /// keeps the records collected so far.
    pub fn run(&mut self, terms: &[SearchTerm]) -> BatchResult {
        let mut batch = BatchResult::default();
        let total = terms.len();

        for (i, term) in terms.iter().enumerate() {
            if batch.aborted.is_some() {
                batch.outcomes.push(ScrapeOutcome::errored(&term.raw, NOT_ATTEMPTED));
                continue;
            }
            if (self.interrupted)() {
                self.logger.info("Interrupted; stopping batch");
                batch.aborted = Some(ABORT_INTERRUPTED.to_string());
                batch.outcomes.push(ScrapeOutcome::errored(&term.raw, NOT_ATTEMPTED));
                continue;
            }

            if i > 0 && !self.request_delay.is_zero() {
                std::thread::sleep(self.request_delay);
            }

            self.logger.log_term_start(i + 1, total, term);
            let outcome = match self.process_term(term) {
                Ok(records) => {
                    batch.records.extend(records);
                    ScrapeOutcome::processed(&term.raw)
                }
                Err(StepError::Skip(reason)) => {
                    let outcome = match reason {
                        SkipReason::PageError(_) => ScrapeOutcome::errored(&term.raw, reason.to_string()),
                        _ => ScrapeOutcome::skipped(&term.raw, reason.to_string()),
                    };
                    if let Err(fatal) = self.recover() {
                        batch.aborted = Some(fatal.clone());
                        self.logger.error(&format!("Cannot return to the entry page: {}", fatal));
                    }
                    outcome
                }
                Err(StepError::Fatal(msg)) => {
                    self.logger.error(&format!("Fatal error on '{}': {}", term.raw, msg));
                    batch.aborted = Some(msg.clone());
                    ScrapeOutcome::errored(&term.raw, msg)
                }
            };
            self.logger.log_outcome(&outcome);
            batch.outcomes.push(outcome);
        }

        if batch.aborted.is_none() {
            // Leave the session on the entry page before shutdown.
            if let Err(e) = self.recover() {
                warn!("Final reset to entry page failed: {}", e);
            }
        }

        batch
    }

    /// Search, land on the detail page and extract one term.
    fn process_term(&mut self, term: &SearchTerm) -> Result<Vec<ContactRecord>, StepError> {
        self.controller
            .reset()
            .map_err(|e| StepError::Fatal(format!("entry page unavailable: {}", e)))?;

        self.logger.debug(&format!("Searching with normalized term: '{}'", term.normalized));
        let landing = self
            .controller
            .search(&term.normalized)
            .map_err(|e| StepError::from_page(e, SkipReason::NoSearchResults))?;

        match landing {
            Landing::Detail { .. } => self.logger.detail("Directly landed on a matching detail page"),
            Landing::Results(candidates) => {
                let chosen = select_candidate(&term.normalized, &candidates)
                    .ok_or(StepError::Skip(SkipReason::NoMatchingLink))?;
                self.logger.detail(&format!("Found matching link: '{}'", chosen.text));
                self.controller
                    .open_candidate(&term.normalized, &chosen.handle)
                    .map_err(|e| StepError::from_page(e, SkipReason::NoSearchResults))?;
            }
        }

        let extraction = self
            .extractor
            .extract(self.controller.page_mut(), &term.raw)
            .map_err(|e| StepError::from_page(e, SkipReason::NoContactData))?;
        self.logger.log_extraction(&extraction);

        check_extraction(extraction)
    }

    /// The single recovery path: go back to the entry page.
    fn recover(&mut self) -> Result<(), String> {
        debug!("Recovering to entry page");
        self.controller.invalidate();
        self.controller
            .reset()
            .map_err(|e| format!("entry page unavailable: {}", e))
    }
}

fn check_extraction(extraction: Extraction) -> Result<Vec<ContactRecord>, StepError> {
    if extraction.found_data() {
        Ok(extraction.records)
    } else {
        Err(StepError::Skip(SkipReason::NoContactData))
    }
}
