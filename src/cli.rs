use clap::Parser;
use std::path::{Path, PathBuf};

use crate::aggregate::default_skip_report_path;
use crate::dataset::InputFormat;

#[derive(Parser, Debug)]
#[command(name = "dirscout")]
#[command(about = "Looks up organizations in a web directory and adds their contacts to a dataset")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/dirscout.toml
    #[arg(long)]
    pub init: bool,

    /// Dataset to read and update in place (.csv, .tsv or .xlsx)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Configuration file (default: ./config/dirscout.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Column holding the organization names (overrides dataset.key_column)
    #[arg(short = 'k', long, value_name = "NAME")]
    pub key_column: Option<String>,

    /// Where to write skipped terms (default: skipped_items.txt beside the input)
    #[arg(long, value_name = "PATH")]
    pub skip_report: Option<PathBuf>,

    /// Also export the run summary as JSON
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Show the browser window (overrides browser.headless)
    #[arg(long)]
    pub headed: bool,

    /// Verbose logging (use -v for per-role detail, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Export the run log to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if self.init {
            return Ok(());
        }

        let input = self
            .input
            .as_deref()
            .ok_or("Input file is required (use --input <FILE>)")?;
        if InputFormat::from_path(input).is_none() {
            return Err(format!(
                "Input file must be .csv, .tsv or .xlsx: {}",
                input.display()
            ));
        }

        if let Some(key) = &self.key_column {
            if key.trim().is_empty() {
                return Err("Key column cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Skip report path: `--skip-report` or the default beside the input.
    pub fn skip_report_path(&self, input: &Path) -> PathBuf {
        self.skip_report
            .clone()
            .unwrap_or_else(|| default_skip_report_path(input))
    }
}
