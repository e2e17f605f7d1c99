//! Interface to the browser-automation engine.
//!
//! The scraper never parses HTML itself. Everything it knows about a page
//! comes through [`DirectoryPage`], which the headless Chrome session in
//! [`crate::browser`] implements and which tests replace with a scripted fake.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// How to find an element on a rendered page.
///
/// Written in the config file as exactly one of `{ css = "..." }`,
/// `{ xpath = "..." }` or `{ id = "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    Xpath(String),
    Id(String),
}

impl Locator {
    /// The raw selector text, without the locator kind.
    pub fn expression(&self) -> &str {
        match self {
            Locator::Css(s) | Locator::Xpath(s) | Locator::Id(s) => s,
        }
    }

    /// CSS form of the locator, if it has one. XPath locators have none.
    pub fn as_css(&self) -> Option<String> {
        match self {
            Locator::Css(s) => Some(s.clone()),
            Locator::Id(id) => Some(format!("#{}", id)),
            Locator::Xpath(_) => None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{}`", s),
            Locator::Xpath(s) => write!(f, "xpath `{}`", s),
            Locator::Id(s) => write!(f, "id `{}`", s),
        }
    }
}

/// Failure reported by the rendering engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("timed out after {waited_ms}ms waiting for {what}")]
    Timeout { what: String, waited_ms: u64 },

    #[error("element reference is no longer valid: {0}")]
    StaleElement(String),

    #[error("browser session lost: {0}")]
    SessionLost(String),

    #[error("{0}")]
    Other(String),
}

impl PageError {
    /// Only a lost session ends the batch. Everything else is scoped to one term.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PageError::SessionLost(_))
    }
}

/// Transient reference to one element of the current render.
///
/// Resolved again by position when used. It is invalid after any navigation,
/// and using it against a page whose element list changed yields
/// [`PageError::StaleElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub locator: Locator,
    pub index: usize,
}

/// An element as it was rendered when queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedElement {
    /// Visible text of the element
    pub text: String,
    /// Whether the element is displayed and can be interacted with
    pub visible: bool,
    pub handle: ElementHandle,
}

/// Text content of a detail-page field block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldBlock {
    /// Rendered text of the block, line breaks preserved
    pub text: String,
    /// `href` of the first `mailto:` link inside the block
    pub mailto_href: Option<String>,
}

/// Query/wait/navigate primitives of one exclusively-owned rendering session.
///
/// Every method is a single non-blocking probe; bounded waiting is layered on
/// top by [`crate::wait::poll_until`].
pub trait DirectoryPage {
    /// Load `url` and wait for the navigation to finish.
    fn navigate(&mut self, url: &str) -> Result<(), PageError>;

    /// All elements currently matching `locator`, in render order.
    /// An empty vector means nothing matched.
    fn query(&mut self, locator: &Locator) -> Result<Vec<RenderedElement>, PageError>;

    /// Clear the input at `locator`, type `text` and submit it.
    fn fill_and_submit(&mut self, locator: &Locator, text: &str) -> Result<(), PageError>;

    /// Click a previously queried element.
    fn click(&mut self, handle: &ElementHandle) -> Result<(), PageError>;

    /// Read the first block matching `locator`, or `None` when there is none.
    fn field_block(&mut self, locator: &Locator) -> Result<Option<FieldBlock>, PageError>;
}

impl<P: DirectoryPage + ?Sized> DirectoryPage for &mut P {
    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        (**self).navigate(url)
    }

    fn query(&mut self, locator: &Locator) -> Result<Vec<RenderedElement>, PageError> {
        (**self).query(locator)
    }

    fn fill_and_submit(&mut self, locator: &Locator, text: &str) -> Result<(), PageError> {
        (**self).fill_and_submit(locator, text)
    }

    fn click(&mut self, handle: &ElementHandle) -> Result<(), PageError> {
        (**self).click(handle)
    }

    fn field_block(&mut self, locator: &Locator) -> Result<Option<FieldBlock>, PageError> {
        (**self).field_block(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        locator: Locator,
    }

    #[test]
    fn test_locator_deserializes_from_inline_table() {
        let w: Wrapper = toml::from_str(r#"locator = { xpath = "//th/following-sibling::td" }"#).unwrap();
        assert_eq!(w.locator, Locator::Xpath("//th/following-sibling::td".to_string()));

        let w: Wrapper = toml::from_str(r#"locator = { id = "AllSearchField" }"#).unwrap();
        assert_eq!(w.locator.as_css().as_deref(), Some("#AllSearchField"));
    }

    #[test]
    fn test_xpath_has_no_css_form() {
        assert!(Locator::Xpath("//a".to_string()).as_css().is_none());
        assert_eq!(Locator::Css("h1.page-title".to_string()).expression(), "h1.page-title");
    }

    #[test]
    fn test_only_session_loss_is_fatal() {
        assert!(PageError::SessionLost("closed".into()).is_fatal());
        assert!(!PageError::StaleElement("gone".into()).is_fatal());
        assert!(!PageError::Other("boom".into()).is_fatal());
        assert!(!PageError::Timeout { what: "x".into(), waited_ms: 10 }.is_fatal());
    }
}
