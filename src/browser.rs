//! Headless Chrome session backing [`DirectoryPage`].
//!
//! One Chrome process and one tab live for the whole run. The process is
//! killed when the [`ChromeSession`] is dropped, so the session is released
//! on every exit path, including panics and early returns.

use headless_chrome::browser::tab::{NoElementFound, Tab};
use headless_chrome::{Browser, Element, LaunchOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::page::{DirectoryPage, ElementHandle, FieldBlock, Locator, PageError, RenderedElement};

const IS_VISIBLE_JS: &str = "function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden' && style.display !== 'none';
}";

const CLEAR_INPUT_JS: &str = "function() { this.focus(); this.value = ''; }";

const HREF_JS: &str = "function() { return this.getAttribute('href'); }";

const MAILTO_SELECTOR: &str = "a[href^='mailto:']";

/// A Chrome process with the single tab used for the run.
pub struct ChromeSession {
    tab: Arc<Tab>,
    // Dropped last; killing the process invalidates the tab.
    _browser: Browser,
}

/// Launch Chrome for a run.
///
/// Automatically disables sandbox when running inside a container
/// (detected via /.dockerenv or DIRSCOUT_CONTAINER env var). The binary is
/// taken from `CHROME_PATH`, then `browser.chrome_path`, then auto-detected.
pub fn launch(config: &BrowserConfig, headless: bool) -> anyhow::Result<ChromeSession> {
    let is_container = std::env::var("DIRSCOUT_CONTAINER").is_ok()
        || std::path::Path::new("/.dockerenv").exists();

    let chrome_path: Option<PathBuf> = std::env::var("CHROME_PATH")
        .ok()
        .map(PathBuf::from)
        .or_else(|| config.chrome_path.clone());

    let options = LaunchOptions::default_builder()
        .headless(headless)
        .sandbox(!is_container)
        .path(chrome_path)
        .window_size(Some((config.window_width, config.window_height)))
        .idle_browser_timeout(Duration::from_secs(config.idle_timeout_secs))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build Chrome launch options: {}", e))?;

    let browser = Browser::new(options)
        .map_err(|e| anyhow::anyhow!("Failed to launch Chrome: {}", e))?;
    let tab = browser
        .new_tab()
        .map_err(|e| anyhow::anyhow!("Failed to open browser tab: {}", e))?;

    info!("Chrome session ready (headless: {}, container: {})", headless, is_container);
    Ok(ChromeSession { tab, _browser: browser })
}

impl ChromeSession {
    /// Close the tab and shut Chrome down.
    pub fn close(self) {
        debug!("Closing browser session");
        if let Err(e) = self.tab.close(false) {
            warn!("Failed to close browser tab cleanly: {}", e);
        }
    }

    fn find_all(&self, locator: &Locator) -> Result<Vec<Element<'_>>, PageError> {
        let found = match locator {
            Locator::Xpath(xpath) => self.tab.find_elements_by_xpath(xpath),
            _ => {
                let css = locator.as_css().unwrap_or_default();
                self.tab.find_elements(&css)
            }
        };
        match found {
            Ok(elements) => Ok(elements),
            Err(e) if is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(classify(e)),
        }
    }
}

impl DirectoryPage for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(classify)
    }

    fn query(&mut self, locator: &Locator) -> Result<Vec<RenderedElement>, PageError> {
        let elements = self.find_all(locator)?;
        let mut rendered = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let text = element.get_inner_text().map_err(classify)?;
            let visible = element
                .call_js_fn(IS_VISIBLE_JS, vec![], false)
                .map_err(classify)?
                .value
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            rendered.push(RenderedElement {
                text,
                visible,
                handle: ElementHandle {
                    locator: locator.clone(),
                    index,
                },
            });
        }
        Ok(rendered)
    }

    fn fill_and_submit(&mut self, locator: &Locator, text: &str) -> Result<(), PageError> {
        let elements = self.find_all(locator)?;
        let input = elements
            .first()
            .ok_or_else(|| PageError::StaleElement(format!("search field {} disappeared", locator)))?;
        input.call_js_fn(CLEAR_INPUT_JS, vec![], false).map_err(classify)?;
        input.type_into(text).map_err(classify)?;
        self.tab.press_key("Enter").map_err(classify)?;
        Ok(())
    }

    fn click(&mut self, handle: &ElementHandle) -> Result<(), PageError> {
        let elements = self.find_all(&handle.locator)?;
        let element = elements.get(handle.index).ok_or_else(|| {
            PageError::StaleElement(format!("{} no longer has element #{}", handle.locator, handle.index))
        })?;
        element.click().map_err(classify)?;
        Ok(())
    }

    fn field_block(&mut self, locator: &Locator) -> Result<Option<FieldBlock>, PageError> {
        let elements = self.find_all(locator)?;
        let Some(block) = elements.first() else {
            return Ok(None);
        };

        let text = block.get_inner_text().map_err(classify)?;
        let mailto_href = match block.find_element(MAILTO_SELECTOR) {
            Ok(link) => link
                .call_js_fn(HREF_JS, vec![], false)
                .map_err(classify)?
                .value
                .and_then(|v| v.as_str().map(str::to_string)),
            Err(e) if is_not_found(&e) => None,
            Err(e) => return Err(classify(e)),
        };

        Ok(Some(FieldBlock { text, mailto_href }))
    }
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<NoElementFound>().is_some()
        || e.to_string().to_lowercase().contains("couldn't find element")
}

/// Map a headless_chrome error onto the scraper's failure classes.
fn classify(e: anyhow::Error) -> PageError {
    let message = format!("{:#}", e);
    let lower = message.to_lowercase();

    if lower.contains("connection is closed")
        || lower.contains("channel closed")
        || lower.contains("browser has been closed")
        || lower.contains("target closed")
    {
        PageError::SessionLost(message)
    } else if lower.contains("no node with given id")
        || lower.contains("could not find node")
        || lower.contains("node is detached")
        || lower.contains("cannot find context with specified id")
    {
        PageError::StaleElement(message)
    } else {
        PageError::Other(message)
    }
}
