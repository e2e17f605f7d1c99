use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::contact::{BatchResult, OutcomeStatus, ScrapeOutcome};
use crate::extractor::{Extraction, RoleStatus};
use crate::normalizer::SearchTerm;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,    // Only show progress bar and final summary
    Summary = 1,   // One line per term (default)
    Detailed = 2,  // Matching and per-role results, warnings
    Debug = 3,     // Everything, including normalized terms
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

/// User-facing run log: timestamped lines that stay above the progress bar,
/// an optional copy written to a log file, and the final summary.
#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<Mutex<Option<ProgressBar>>>,
    run_metadata: Arc<Mutex<RunMetadata>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<PathBuf>,
}

#[derive(Default, Clone)]
struct RunMetadata {
    start_time: Option<DateTime<Local>>,
    end_time: Option<DateTime<Local>>,
    input_file: String,
    output_files: Vec<String>,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(Mutex::new(None)),
            run_metadata: Arc::new(Mutex::new(RunMetadata::default())),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: impl Into<PathBuf>) -> Self {
        Self {
            log_file_path: Some(log_file_path.into()),
            ..Self::new(verbosity)
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    /// Shown from `-v` upward.
    pub fn detail(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    pub fn error(&self, message: &str) {
        // Errors are shown at every verbosity
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", Local::now().format("%H:%M:%S%.3f"), level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Route through the progress bar so the bar stays at the bottom
        if let Ok(guard) = self.progress_bar.try_lock() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    pub fn start_progress(&self, total_terms: u64) {
        let pb = ProgressBar::new(total_terms);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message("Opening directory...");

        if let Ok(mut guard) = self.progress_bar.lock() {
            *guard = Some(pb);
        }
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.start_time = Some(Local::now());
        }
    }

    fn with_progress(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    pub fn finish_progress(&self, final_message: &str) {
        if let Ok(mut guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.end_time = Some(Local::now());
        }
        self.info(final_message);
    }

    pub fn record_input_file(&self, path: &Path) {
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.input_file = path.display().to_string();
        }
    }

    pub fn record_output_file(&self, path: &Path) {
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.output_files.push(path.display().to_string());
        }
    }

    pub fn log_term_start(&self, index: usize, total: usize, term: &SearchTerm) {
        self.with_progress(|pb| pb.set_message(term.raw.clone()));
        self.info(&format!("({}/{}) Processing: '{}'", index, total, term.raw));
        if term.normalized != term.raw {
            self.debug(&format!("Normalized '{}' -> '{}'", term.raw, term.normalized));
        }
    }

    pub fn log_extraction(&self, extraction: &Extraction) {
        for report in &extraction.roles {
            match &report.status {
                RoleStatus::Found => self.detail(&format!("{}: found", report.role)),
                RoleStatus::Incomplete => self.detail(&format!("{}: section present but no name", report.role)),
                RoleStatus::SectionNotFound => self.detail(&format!("{}: section not found", report.role)),
                RoleStatus::Failed(e) => self.warn(&format!("{}: read failed: {}", report.role, e)),
            }
        }
    }

    pub fn log_outcome(&self, outcome: &ScrapeOutcome) {
        match outcome.status {
            OutcomeStatus::Processed => self.info(&format!("Processed '{}'", outcome.term)),
            OutcomeStatus::Skipped => self.info(&format!("Skipped {}", outcome.report_line())),
            OutcomeStatus::Errored => self.info(&format!("Errored {}", outcome.report_line())),
        }
        self.with_progress(|pb| pb.inc(1));
    }

    /// Final summary, printed at every verbosity.
    pub fn print_final_summary(&self, batch: &BatchResult) {
        let metadata = match self.run_metadata.lock() {
            Ok(m) => m.clone(),
            Err(_) => RunMetadata::default(),
        };

        print!("\x1b[2K\r");
        let _ = io::stdout().flush();

        println!("\n=== RUN SUMMARY ===");
        if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
            let secs = (end - start).num_milliseconds() as f64 / 1000.0;
            println!("Run Duration: {:.2}s", secs);
        }
        if !metadata.input_file.is_empty() {
            println!("Input: {}", metadata.input_file);
        }
        println!("Terms: {}", batch.outcomes.len());
        println!("Processed: {}", batch.count(OutcomeStatus::Processed));
        println!("Skipped: {}", batch.count(OutcomeStatus::Skipped));
        println!("Errored: {}", batch.count(OutcomeStatus::Errored));
        println!("Contact Records: {}", batch.records.len());
        for path in &metadata.output_files {
            println!("Written: {}", path);
        }
        println!("===================\n");

        match &batch.aborted {
            Some(reason) => println!("Batch aborted: {}", reason),
            None if batch.records.is_empty() => println!("Run completed. No contact data found."),
            None => println!("Run completed. Collected {} contact records.", batch.records.len()),
        }
    }

    /// Write every buffered line to the log file, if one was configured.
    pub fn export_logs(&self) -> io::Result<()> {
        let Some(log_file_path) = &self.log_file_path else {
            return Ok(());
        };
        let buffer = match self.log_buffer.lock() {
            Ok(b) => b.clone(),
            Err(_) => return Ok(()),
        };

        if let Some(parent) = log_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)?;
        for entry in &buffer {
            writeln!(file, "{}", entry)?;
        }
        file.flush()
    }

    #[cfg(test)]
    fn log_count(&self) -> usize {
        self.log_buffer.lock().map(|b| b.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_verbosity_from_count() {
        assert_eq!(VerbosityLevel::from_verbose_count(0), VerbosityLevel::Summary);
        assert_eq!(VerbosityLevel::from_verbose_count(1), VerbosityLevel::Detailed);
        assert_eq!(VerbosityLevel::from_verbose_count(5), VerbosityLevel::Debug);
    }

    #[test]
    fn test_buffer_respects_verbosity() {
        let logger = RunLogger::with_log_file(VerbosityLevel::Summary, "unused.log");
        logger.info("shown");
        logger.debug("hidden");
        logger.detail("hidden");
        logger.error("always");
        assert_eq!(logger.log_count(), 2);
    }

    #[test]
    fn test_every_outcome_is_logged_by_default() {
        let logger = RunLogger::with_log_file(VerbosityLevel::Summary, "unused.log");
        logger.log_outcome(&ScrapeOutcome::processed("Lodi Unified"));
        logger.log_outcome(&ScrapeOutcome::skipped("Nowhere Unified", "no search results"));
        logger.log_outcome(&ScrapeOutcome::errored("Ripon Unified", "page error: boom"));
        assert_eq!(logger.log_count(), 3);

        let silent = RunLogger::with_log_file(VerbosityLevel::Silent, "unused.log");
        silent.log_outcome(&ScrapeOutcome::errored("Ripon Unified", "page error: boom"));
        assert_eq!(silent.log_count(), 0);
    }

    #[test]
    fn test_export_logs_writes_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.log");
        let logger = RunLogger::with_log_file(VerbosityLevel::Debug, &path);
        logger.info("first");
        logger.debug("second");
        logger.export_logs().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("INFO: first"));
        assert!(content.contains("DEBUG: second"));
    }

    #[test]
    fn test_export_without_log_file_is_noop() {
        let logger = RunLogger::new(VerbosityLevel::Debug);
        logger.info("x");
        assert_eq!(logger.log_count(), 0);
        assert!(logger.export_logs().is_ok());
    }
}
