//! Detail page extraction
//!
//! Reads each configured role's block from a rendered detail page and splits
//! it into name / phone / email. A missing block or a failed read only
//! affects that role; the remaining roles are still extracted.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::RoleLocator;
use crate::contact::{ContactRecord, NOT_AVAILABLE};
use crate::page::{DirectoryPage, FieldBlock, PageError};

/// Ten-digit phone number with optional parentheses and separators,
/// e.g. `(209) 825-3200`, `209-825-3200`, `209.825.3200`, `2098253200`.
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("phone pattern is valid"));

/// Result of reading one role's block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleStatus {
    /// A name was found; the record may still lack phone or email
    Found,
    /// The block exists but yielded no name
    Incomplete,
    /// No block matched the role's locator
    SectionNotFound,
    /// Reading the block failed
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleReport {
    pub role: String,
    pub status: RoleStatus,
}

/// Everything read from one detail page.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// One record per role that yielded a name, in role order
    pub records: Vec<ContactRecord>,
    pub roles: Vec<RoleReport>,
}

impl Extraction {
    /// A term has data when at least one role yielded a name.
    pub fn found_data(&self) -> bool {
        !self.records.is_empty()
    }
}

/// Extracts contact blocks using the configured role locators.
#[derive(Debug, Clone)]
pub struct ContactExtractor {
    roles: Vec<RoleLocator>,
}

impl ContactExtractor {
    pub fn new(roles: Vec<RoleLocator>) -> Self {
        Self { roles }
    }

    /// Extract every role from the current detail page.
    ///
    /// Only a fatal [`PageError`] is returned; anything else degrades the
    /// affected role and extraction moves on to the next one.
    pub fn extract<P: DirectoryPage>(&self, page: &mut P, source_term: &str) -> Result<Extraction, PageError> {
        let mut extraction = Extraction::default();

        for role in &self.roles {
            let status = match page.field_block(&role.locator) {
                Ok(Some(block)) => {
                    let record = parse_contact_block(source_term, &role.name, &block);
                    if record.has_name() {
                        debug!("Found {} for '{}': {}", role.name, source_term, record.name);
                        extraction.records.push(record);
                        RoleStatus::Found
                    } else {
                        RoleStatus::Incomplete
                    }
                }
                Ok(None) => RoleStatus::SectionNotFound,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Reading {} for '{}' failed: {}", role.name, source_term, e);
                    RoleStatus::Failed(e.to_string())
                }
            };

            extraction.roles.push(RoleReport {
                role: role.name.clone(),
                status,
            });
        }

        Ok(extraction)
    }
}

/// Split a field block into a contact record.
///
/// - name: first non-empty line
/// - phone: first ten-digit phone number anywhere in the text
/// - email: target of the block's `mailto:` link
///
/// Anything missing is [`NOT_AVAILABLE`].
pub fn parse_contact_block(source_term: &str, role: &str, block: &FieldBlock) -> ContactRecord {
    let mut record = ContactRecord::empty(source_term, role);

    if let Some(first_line) = block.text.lines().map(str::trim).find(|l| !l.is_empty()) {
        record.name = first_line.to_string();
    }

    if let Some(m) = PHONE_PATTERN.find(&block.text) {
        record.phone = m.as_str().to_string();
    }

    if let Some(email) = block.mailto_href.as_deref().and_then(mailto_target) {
        record.email = email;
    }

    record
}

/// Address part of a `mailto:` URL, without any `?subject=...` query.
fn mailto_target(href: &str) -> Option<String> {
    let href = href.trim();
    let rest = href
        .get(..7)
        .filter(|scheme| scheme.eq_ignore_ascii_case("mailto:"))
        .map(|_| &href[7..])?;
    let address = rest.split('?').next().unwrap_or(rest).trim();
    if address.is_empty() || address == NOT_AVAILABLE {
        None
    } else {
        Some(address.to_string())
    }
}
