pub mod aggregate;
pub mod browser;
pub mod cli;
pub mod config;
pub mod contact;
pub mod controller;
pub mod dataset;
pub mod extractor;
pub mod logger;
pub mod matcher;
pub mod normalizer;
pub mod page;
pub mod supervisor;
pub mod wait;

pub use contact::{BatchResult, ContactRecord, OutcomeStatus, ScrapeOutcome};
pub use page::{DirectoryPage, Locator, PageError};
pub use supervisor::Supervisor;
