//! Merging batch results back into the dataset, plus the sidecar outputs:
//! the skip report and the optional JSON run summary.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::OutputColumns;
use crate::contact::{BatchResult, ContactRecord, OutcomeStatus, ScrapeOutcome};
use crate::dataset::{dataset_to_bytes, Dataset, DatasetError};

/// Default sidecar file name, placed beside the input dataset.
pub const SKIP_REPORT_FILE: &str = "skipped_items.txt";

/// Left-join contact records onto the dataset by key column.
///
/// Every original row is kept. A row whose trimmed key has N records becomes
/// N rows, one per record in extraction order; a row without records keeps
/// its values with blank output columns. Output columns already present in
/// the dataset are reused in place, the rest are appended in
/// name/role/email/phone order.
pub fn merge_contacts(
    dataset: &Dataset,
    key_column: &str,
    columns: &OutputColumns,
    records: &[ContactRecord],
) -> Result<Dataset, DatasetError> {
    let key = dataset.key_index(key_column)?;

    let mut headers = dataset.headers.clone();
    let mut targets = [0usize; 4];
    for (slot, name) in targets.iter_mut().zip(columns.ordered()) {
        *slot = match headers.iter().position(|h| h == name) {
            Some(i) => i,
            None => {
                headers.push(name.to_string());
                headers.len() - 1
            }
        };
    }

    let mut by_term: HashMap<&str, Vec<&ContactRecord>> = HashMap::new();
    for record in records {
        by_term.entry(record.source_term.trim()).or_default().push(record);
    }

    let mut merged = Dataset::new(dataset.format, headers);
    for row in &dataset.rows {
        let mut base = row.clone();
        base.resize(merged.headers.len(), String::new());

        let matches = row.get(key).and_then(|k| by_term.get(k.trim()));
        match matches {
            Some(found) => {
                for record in found {
                    let mut out = base.clone();
                    let values = [&record.name, &record.role, &record.email, &record.phone];
                    for (slot, value) in targets.iter().zip(values) {
                        out[*slot] = value.clone();
                    }
                    merged.rows.push(out);
                }
            }
            None => merged.rows.push(base),
        }
    }

    Ok(merged)
}

/// Write the skip report, one `<term> (<reason>)` line per skipped term.
///
/// Returns `Ok(false)` without touching the filesystem when nothing was skipped.
pub fn write_skip_report(outcomes: &[ScrapeOutcome], path: &Path) -> Result<bool> {
    let lines: Vec<String> = outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Skipped)
        .map(ScrapeOutcome::report_line)
        .collect();

    if lines.is_empty() {
        return Ok(false);
    }

    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content).with_context(|| format!("Failed to write skip report: {}", path.display()))?;
    info!("Wrote {} skipped terms to {}", lines.len(), path.display());
    Ok(true)
}

/// Default skip report location for an input file.
pub fn default_skip_report_path(input: &Path) -> PathBuf {
    match input.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(SKIP_REPORT_FILE),
        _ => PathBuf::from(SKIP_REPORT_FILE),
    }
}

/// Replace `path` with `bytes` via a sibling temp file and a rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, bytes).with_context(|| format!("Failed to write temporary file: {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to replace dataset: {}", path.display()));
    }
    Ok(())
}

/// What [`persist_batch`] wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub dataset: Option<PathBuf>,
    pub skip_report: Option<PathBuf>,
}

/// Persist a batch: merge and rewrite the dataset in place, then write the
/// skip report.
///
/// With zero records the dataset file is left untouched. Runs the same way
/// for aborted batches so that records collected before the abort are kept.
pub fn persist_batch(
    input: &Path,
    dataset: &Dataset,
    key_column: &str,
    columns: &OutputColumns,
    batch: &BatchResult,
    skip_report: &Path,
) -> Result<PersistReport> {
    let mut report = PersistReport::default();

    if batch.records.is_empty() {
        debug!("No contact records; leaving {} untouched", input.display());
    } else {
        let merged = merge_contacts(dataset, key_column, columns, &batch.records)?;
        let bytes = dataset_to_bytes(&merged)?;
        write_atomic(input, &bytes)?;
        info!(
            "Updated {} ({} rows -> {} rows)",
            input.display(),
            dataset.rows.len(),
            merged.rows.len()
        );
        report.dataset = Some(input.to_path_buf());
    }

    if write_skip_report(&batch.outcomes, skip_report)? {
        report.skip_report = Some(skip_report.to_path_buf());
    }

    Ok(report)
}

/// Summary of a run, exported with `--summary-json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input_file: String,
    pub total_terms: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub contact_records: usize,
    pub aborted: Option<String>,
    pub dataset_written: Option<String>,
    pub skip_report: Option<String>,
    pub outcomes: Vec<ScrapeOutcome>,
    pub duration_secs: f64,
    pub started_at: String,
    pub completed_at: String,
}

impl RunSummary {
    pub fn new(input: &Path, started: DateTime<Utc>, batch: &BatchResult, written: &PersistReport) -> Self {
        let completed = Utc::now();
        Self {
            input_file: input.display().to_string(),
            total_terms: batch.outcomes.len(),
            processed: batch.count(OutcomeStatus::Processed),
            skipped: batch.count(OutcomeStatus::Skipped),
            errored: batch.count(OutcomeStatus::Errored),
            contact_records: batch.records.len(),
            aborted: batch.aborted.clone(),
            dataset_written: written.dataset.as_ref().map(|p| p.display().to_string()),
            skip_report: written.skip_report.as_ref().map(|p| p.display().to_string()),
            outcomes: batch.outcomes.clone(),
            duration_secs: (completed - started).num_milliseconds() as f64 / 1000.0,
            started_at: started.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            completed_at: completed.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}

/// Export the run summary to a JSON file
pub fn export_run_summary(summary: &RunSummary, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write run summary to: {}", output_path.display()))?;

    Ok(())
}
