//! Configuration management for dirscout
//!
//! All configuration is loaded from `./config/dirscout.toml` (or `--config`).
//! No hardcoded defaults exist in source code - all defaults are in the config template.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::page::Locator;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/dirscout.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/dirscout.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url} (expected http:// or https://)")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be greater than zero")]
    ZeroValue { field: String },

    #[error("Duplicate {kind} '{name}'")]
    Duplicate { kind: String, name: String },

    #[error("Invalid suffix pattern in normalizer.strip_suffixes: {0}")]
    InvalidSuffix(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub browser: BrowserConfig,
    pub directory: DirectoryConfig,
    pub normalizer: NormalizerConfig,
    pub dataset: DatasetConfig,
    pub timeouts: TimeoutConfig,
}

/// Headless Chrome launch settings
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub idle_timeout_secs: u64,
    /// Explicit Chrome binary; `CHROME_PATH` takes precedence
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,
}

/// The directory site being searched
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    pub entry_url: String,
    pub search_field: Locator,
    pub result_links: Locator,
    pub detail_title: Locator,
    pub roles: Vec<RoleLocator>,
}

/// One contact block on the detail page
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RoleLocator {
    /// Role label written to the output, e.g. "Superintendent"
    pub name: String,
    pub locator: Locator,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerConfig {
    pub strip_suffixes: Vec<String>,
}

/// Input/output dataset columns
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub key_column: String,
    pub output_columns: OutputColumns,
}

/// Names of the columns contact data is written to
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OutputColumns {
    pub name: String,
    pub role: String,
    pub email: String,
    pub phone: String,
}

impl OutputColumns {
    /// Column names in the order they are appended to the dataset
    pub fn ordered(&self) -> [&str; 4] {
        [
            self.name.as_str(),
            self.role.as_str(),
            self.email.as_str(),
            self.phone.as_str(),
        ]
    }
}

/// Bounded waits, in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    pub entry_page_ms: u64,
    pub results_ms: u64,
    pub detail_ms: u64,
    pub poll_interval_ms: u64,
    pub request_delay_ms: u64,
}

impl TimeoutConfig {
    pub fn entry_page(&self) -> Duration {
        Duration::from_millis(self.entry_page_ms)
    }

    pub fn results(&self) -> Duration {
        Duration::from_millis(self.results_ms)
    }

    pub fn detail(&self) -> Duration {
        Duration::from_millis(self.detail_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let entry_url = &self.directory.entry_url;
        if !(entry_url.starts_with("https://") || entry_url.starts_with("http://")) {
            return Err(ConfigError::InvalidUrl {
                field: "directory.entry_url".to_string(),
                url: entry_url.clone(),
            });
        }

        require_locator("directory.search_field", &self.directory.search_field)?;
        require_locator("directory.result_links", &self.directory.result_links)?;
        require_locator("directory.detail_title", &self.directory.detail_title)?;

        if self.directory.roles.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "directory.roles".to_string(),
            });
        }
        let mut role_names = HashSet::new();
        for (i, role) in self.directory.roles.iter().enumerate() {
            if role.name.trim().is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: format!("directory.roles[{}].name", i),
                });
            }
            require_locator(&format!("directory.roles[{}].locator", i), &role.locator)?;
            if !role_names.insert(role.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "role".to_string(),
                    name: role.name.clone(),
                });
            }
        }

        crate::normalizer::TermNormalizer::from_config(&self.normalizer)
            .map_err(|e| ConfigError::InvalidSuffix(e.to_string()))?;

        if self.dataset.key_column.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "dataset.key_column".to_string(),
            });
        }
        let columns = &self.dataset.output_columns;
        let mut seen = HashSet::new();
        for (field, column) in [
            ("name", &columns.name),
            ("role", &columns.role),
            ("email", &columns.email),
            ("phone", &columns.phone),
        ] {
            if column.trim().is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: format!("dataset.output_columns.{}", field),
                });
            }
            if column == &self.dataset.key_column || !seen.insert(column.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "output column".to_string(),
                    name: column.clone(),
                });
            }
        }

        for (field, value) in [
            ("timeouts.entry_page_ms", self.timeouts.entry_page_ms),
            ("timeouts.results_ms", self.timeouts.results_ms),
            ("timeouts.detail_ms", self.timeouts.detail_ms),
            ("timeouts.poll_interval_ms", self.timeouts.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroValue {
                    field: field.to_string(),
                });
            }
        }

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::ZeroValue {
                field: "browser.window_width/window_height".to_string(),
            });
        }

        Ok(())
    }

    /// Create default configuration file at `path`
    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config(path: &Path) -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config_at(path)?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

fn require_locator(field: &str, locator: &Locator) -> Result<(), ConfigError> {
    if locator.expression().trim().is_empty() {
        return Err(ConfigError::EmptyRequired {
            field: field.to_string(),
        });
    }
    Ok(())
}
