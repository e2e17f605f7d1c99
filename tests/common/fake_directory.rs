use std::collections::HashMap;

use dirscout::config::{AppConfig, DirectoryConfig, TimeoutConfig, DEFAULT_CONFIG};
use dirscout::page::{DirectoryPage, ElementHandle, FieldBlock, Locator, PageError, RenderedElement};

pub const ENTRY_URL: &str = "https://directory.test/search";
pub const RESULTS_TITLE: &str = "Search Results";

/// One organization listed in the fake directory.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub name: String,
    /// Role name -> contact block on the detail page
    pub blocks: HashMap<String, FieldBlock>,
    /// A search matching only this listing opens its detail page directly
    pub direct_landing: bool,
    /// Result link is rendered but not displayed
    pub hidden: bool,
    /// Clicking the link never renders a detail page
    pub detail_never_renders: bool,
    /// Clicking the link finds a different result list
    pub stale_link: bool,
    /// Extra text the site's search matches on without displaying it
    pub search_aliases: Vec<String>,
    /// Clicking the link fails with an unclassified engine error
    pub click_error: Option<String>,
    /// Roles whose block goes stale while being read
    pub stale_roles: Vec<String>,
}

impl Listing {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_contact(mut self, role: &str, text: &str, mailto: Option<&str>) -> Self {
        self.blocks.insert(
            role.to_string(),
            FieldBlock {
                text: text.to_string(),
                mailto_href: mailto.map(str::to_string),
            },
        );
        self
    }

    pub fn direct(mut self) -> Self {
        self.direct_landing = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn broken_detail(mut self) -> Self {
        self.detail_never_renders = true;
        self
    }

    pub fn stale(mut self) -> Self {
        self.stale_link = true;
        self
    }

    pub fn click_fails(mut self, message: &str) -> Self {
        self.click_error = Some(message.to_string());
        self
    }

    pub fn stale_role(mut self, role: &str) -> Self {
        self.stale_roles.push(role.to_string());
        self
    }

    pub fn also_matches(mut self, alias: &str) -> Self {
        self.search_aliases.push(alias.to_string());
        self
    }

    fn matches_search(&self, needle: &str) -> bool {
        std::iter::once(&self.name)
            .chain(self.search_aliases.iter())
            .any(|text| text.to_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum View {
    Blank,
    Entry,
    /// Listing indices in render order
    Results(Vec<usize>),
    Loading,
    Detail(usize),
}

/// Scripted in-memory directory site.
///
/// Searching does a case-insensitive substring match over listing names, the
/// way the real directory's search box does.
pub struct FakeDirectory {
    directory: DirectoryConfig,
    listings: Vec<Listing>,
    view: View,
    lose_session_after: Option<usize>,
    entry_unreachable: bool,
    clicks_ignored: bool,
    pub searches: Vec<String>,
    pub navigations: usize,
}

impl FakeDirectory {
    pub fn new(directory: &DirectoryConfig, listings: Vec<Listing>) -> Self {
        Self {
            directory: directory.clone(),
            listings,
            view: View::Blank,
            lose_session_after: None,
            entry_unreachable: false,
            clicks_ignored: false,
            searches: Vec::new(),
            navigations: 0,
        }
    }

    /// Every call fails with `SessionLost` once `n` searches have completed.
    pub fn lose_session_after(mut self, n: usize) -> Self {
        self.lose_session_after = Some(n);
        self
    }

    /// The entry page loads but the search field never appears.
    pub fn entry_unreachable(mut self) -> Self {
        self.entry_unreachable = true;
        self
    }

    /// Clicks succeed but the results page stays rendered, like a slow
    /// site that has not started navigating yet.
    pub fn clicks_ignored(mut self) -> Self {
        self.clicks_ignored = true;
        self
    }

    fn check_session(&self) -> Result<(), PageError> {
        match self.lose_session_after {
            Some(n) if self.searches.len() >= n => {
                Err(PageError::SessionLost("connection is closed".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn rendered(locator: &Locator, texts: Vec<(String, bool)>) -> Vec<RenderedElement> {
        texts
            .into_iter()
            .enumerate()
            .map(|(index, (text, visible))| RenderedElement {
                text,
                visible,
                handle: ElementHandle {
                    locator: locator.clone(),
                    index,
                },
            })
            .collect()
    }
}

impl DirectoryPage for FakeDirectory {
    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        self.check_session()?;
        self.navigations += 1;
        self.view = if url == self.directory.entry_url && !self.entry_unreachable {
            View::Entry
        } else {
            View::Blank
        };
        Ok(())
    }

    fn query(&mut self, locator: &Locator) -> Result<Vec<RenderedElement>, PageError> {
        self.check_session()?;
        let texts: Vec<(String, bool)> = match &self.view {
            View::Entry if *locator == self.directory.search_field => vec![(String::new(), true)],
            View::Results(_) if *locator == self.directory.detail_title => {
                vec![(RESULTS_TITLE.to_string(), true)]
            }
            View::Results(found) if *locator == self.directory.result_links => found
                .iter()
                .map(|&i| (self.listings[i].name.clone(), !self.listings[i].hidden))
                .collect(),
            View::Detail(i) if *locator == self.directory.detail_title => {
                vec![(self.listings[*i].name.clone(), true)]
            }
            _ => Vec::new(),
        };
        Ok(Self::rendered(locator, texts))
    }

    fn fill_and_submit(&mut self, locator: &Locator, text: &str) -> Result<(), PageError> {
        self.check_session()?;
        if self.view != View::Entry || *locator != self.directory.search_field {
            return Err(PageError::StaleElement("search field is gone".to_string()));
        }
        self.searches.push(text.to_string());

        let needle = text.to_lowercase();
        let found: Vec<usize> = self
            .listings
            .iter()
            .enumerate()
            .filter(|(_, l)| l.matches_search(&needle))
            .map(|(i, _)| i)
            .collect();

        self.view = if found.is_empty() {
            View::Loading
        } else if found.len() == 1 && self.listings[found[0]].direct_landing {
            View::Detail(found[0])
        } else {
            View::Results(found)
        };
        Ok(())
    }

    fn click(&mut self, handle: &ElementHandle) -> Result<(), PageError> {
        self.check_session()?;
        let View::Results(found) = &self.view else {
            return Err(PageError::StaleElement("no result list rendered".to_string()));
        };
        let listing = found
            .get(handle.index)
            .copied()
            .ok_or_else(|| PageError::StaleElement(format!("no element #{}", handle.index)))?;

        if self.listings[listing].stale_link {
            return Err(PageError::StaleElement("No node with given id found".to_string()));
        }
        if let Some(message) = &self.listings[listing].click_error {
            return Err(PageError::Other(message.clone()));
        }
        if self.clicks_ignored {
            return Ok(());
        }
        self.view = if self.listings[listing].detail_never_renders {
            View::Loading
        } else {
            View::Detail(listing)
        };
        Ok(())
    }

    fn field_block(&mut self, locator: &Locator) -> Result<Option<FieldBlock>, PageError> {
        self.check_session()?;
        let View::Detail(i) = self.view else {
            return Ok(None);
        };
        let Some(role) = self.directory.roles.iter().find(|r| r.locator == *locator) else {
            return Ok(None);
        };
        if self.listings[i].stale_roles.contains(&role.name) {
            return Err(PageError::StaleElement("Node is detached from document".to_string()));
        }
        Ok(self.listings[i].blocks.get(&role.name).cloned())
    }
}

/// Default config pointed at the fake directory, with short waits.
pub fn test_config() -> AppConfig {
    let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).expect("default config parses");
    config.directory.entry_url = ENTRY_URL.to_string();
    config.timeouts = TimeoutConfig {
        entry_page_ms: 60,
        results_ms: 60,
        detail_ms: 60,
        poll_interval_ms: 5,
        request_delay_ms: 0,
    };
    config
}

/// A listing with both default roles filled in.
pub fn full_listing(name: &str, superintendent: &str, cbo: &str) -> Listing {
    Listing::new(name)
        .with_contact(
            "Superintendent",
            &format!("{}\n(209) 825-3200", superintendent),
            Some(&format!("mailto:{}@example.org", superintendent.to_lowercase().replace(' ', "."))),
        )
        .with_contact("Chief Business Official", &format!("{}\n209-825-3201", cbo), None)
}
