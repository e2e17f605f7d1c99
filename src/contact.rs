use serde::Serialize;
use std::fmt;

/// Marker for a field that was looked for but not found.
pub const NOT_AVAILABLE: &str = "N/A";

/// Contact details for one role on one organization's detail page.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContactRecord {
    /// Raw input term this record belongs to (the dataset join key)
    pub source_term: String,
    pub role: String,
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl ContactRecord {
    /// A record for `role` with every field set to [`NOT_AVAILABLE`].
    pub fn empty(source_term: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            source_term: source_term.into(),
            role: role.into(),
            name: NOT_AVAILABLE.to_string(),
            phone: NOT_AVAILABLE.to_string(),
            email: NOT_AVAILABLE.to_string(),
        }
    }

    pub fn has_name(&self) -> bool {
        self.name != NOT_AVAILABLE
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum OutcomeStatus {
    Processed,
    Skipped,
    Errored,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutcomeStatus::Processed => "processed",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::Errored => "errored",
        };
        f.write_str(label)
    }
}

/// What happened to one input term.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScrapeOutcome {
    pub term: String,
    pub status: OutcomeStatus,
    pub reason: Option<String>,
}

impl ScrapeOutcome {
    pub fn processed(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            status: OutcomeStatus::Processed,
            reason: None,
        }
    }

    pub fn skipped(term: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            status: OutcomeStatus::Skipped,
            reason: Some(reason.into()),
        }
    }

    pub fn errored(term: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            status: OutcomeStatus::Errored,
            reason: Some(reason.into()),
        }
    }

    /// Line written to the skip report: `<term> (<reason>)`.
    pub fn report_line(&self) -> String {
        match &self.reason {
            Some(reason) => format!("{} ({})", self.term, reason),
            None => self.term.clone(),
        }
    }
}

/// Everything a batch produced, handed once to the aggregator.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub records: Vec<ContactRecord>,
    pub outcomes: Vec<ScrapeOutcome>,
    /// Why the batch stopped early, if it did
    pub aborted: Option<String>,
}

impl BatchResult {
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}
