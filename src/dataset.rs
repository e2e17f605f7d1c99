//! Tabular input dataset and term loading.
//!
//! Supports:
//! - CSV (`.csv`) and tab-separated (`.tsv`) files with a header row
//! - Excel workbooks (`.xlsx`); the first worksheet is the dataset
//! - Any number of pass-through columns alongside the key column
//! - Rewriting the dataset in the format it was read in

use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, DataType, Reader};
use rust_xlsxwriter::Workbook;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::normalizer::{SearchTerm, TermNormalizer};

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Cannot determine input format from file extension (expected .csv, .tsv or .xlsx): {0}")]
    UnknownFormat(String),

    #[error("Key column '{column}' not found; available columns: {available}")]
    MissingKeyColumn { column: String, available: String },

    #[error("Row {row} has {found} fields but the header has {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },
}

/// Input format for dataset files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Tsv,
    Xlsx,
}

impl InputFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("csv") => Some(Self::Csv),
            Some("tsv") => Some(Self::Tsv),
            Some("xlsx") => Some(Self::Xlsx),
            _ => None,
        }
    }

    /// Field delimiter for the text formats.
    fn delimiter(self) -> Option<u8> {
        match self {
            Self::Csv => Some(b','),
            Self::Tsv => Some(b'\t'),
            Self::Xlsx => None,
        }
    }
}

/// A header row plus string rows, all the same width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub format: InputFormat,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(format: InputFormat, headers: Vec<String>) -> Self {
        Self {
            format,
            headers,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of `name`, or [`DatasetError::MissingKeyColumn`].
    pub fn key_index(&self, name: &str) -> Result<usize, DatasetError> {
        self.column_index(name).ok_or_else(|| DatasetError::MissingKeyColumn {
            column: name.to_string(),
            available: self.headers.join(", "),
        })
    }

    /// Append a data row. Short rows are padded with empty cells; a row
    /// wider than the header is rejected. `line` is 1-based and counts the
    /// header row.
    fn push_row(&mut self, line: usize, mut row: Vec<String>) -> Result<(), DatasetError> {
        if row.len() > self.headers.len() {
            return Err(DatasetError::RaggedRow {
                row: line,
                expected: self.headers.len(),
                found: row.len(),
            });
        }
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
        Ok(())
    }
}

/// Read a dataset, detecting the format from the extension.
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let format = InputFormat::from_path(path)
        .ok_or_else(|| DatasetError::UnknownFormat(path.display().to_string()))?;

    if format == InputFormat::Xlsx {
        if !path.exists() {
            bail!("Failed to read input file: {} does not exist", path.display());
        }
        return read_workbook(path).with_context(|| format!("Failed to parse input file: {}", path.display()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    parse_dataset(&content, format)
        .with_context(|| format!("Failed to parse input file: {}", path.display()))
}

/// Parse delimited dataset content. A leading UTF-8 BOM is ignored.
///
/// Every record is kept, including ones whose fields are all empty; only
/// empty lines are skipped.
pub fn parse_dataset(content: &str, format: InputFormat) -> Result<Dataset> {
    let delimiter = format
        .delimiter()
        .ok_or_else(|| anyhow!("Workbooks are read from a file, not from text"))?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut dataset = Dataset::new(format, headers);
    for result in reader.records() {
        let record = result.context("Failed to parse record")?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        dataset.push_row(line, record.iter().map(str::to_string).collect())?;
    }

    Ok(dataset)
}

/// First worksheet of a workbook; its first row is the header.
fn read_workbook(path: &Path) -> Result<Dataset> {
    let mut workbook = open_workbook_auto(path).map_err(|e| anyhow!("Unable to open the workbook: {}", e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("The workbook does not contain any worksheets"))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .ok_or_else(|| anyhow!("Unable to read the worksheet named '{}'", sheet_name))?
        .map_err(|e| anyhow!("Unable to read the worksheet data: {}", e))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| anyhow!("The worksheet is empty"))?
        .iter()
        .map(|cell| cell_to_string(cell).trim().to_string())
        .collect();

    let mut dataset = Dataset::new(InputFormat::Xlsx, headers);
    for (i, row) in rows.enumerate() {
        dataset.push_row(i + 2, row.iter().map(cell_to_string).collect())?;
    }

    Ok(dataset)
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        _ => cell.to_string(),
    }
}

/// Serialize a dataset in its own format.
pub fn dataset_to_bytes(dataset: &Dataset) -> Result<Vec<u8>> {
    let Some(delimiter) = dataset.format.delimiter() else {
        return workbook_to_bytes(dataset);
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(&dataset.headers).context("Failed to write header row")?;
    for row in &dataset.rows {
        writer.write_record(row).context("Failed to write record")?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush dataset: {}", e))
}

/// Single-sheet workbook with every cell written as a string.
fn workbook_to_bytes(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (row_index, row) in std::iter::once(&dataset.headers).chain(dataset.rows.iter()).enumerate() {
        let row_index = u32::try_from(row_index).context("Too many rows for a worksheet")?;
        for (col_index, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let col_index = u16::try_from(col_index).context("Too many columns for a worksheet")?;
            sheet
                .write_string(row_index, col_index, value)
                .map_err(|e| anyhow!("Unable to write cell ({}, {}): {}", row_index, col_index, e))?;
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| anyhow!("Unable to finalize the workbook: {}", e))
}

/// Unique search terms from the key column, in first-appearance order.
///
/// Values are trimmed; empty values and repeats are dropped.
pub fn load_terms(dataset: &Dataset, key_column: &str, normalizer: &TermNormalizer) -> Result<Vec<SearchTerm>, DatasetError> {
    let key = dataset.key_index(key_column)?;
    let mut seen = HashSet::new();

    Ok(dataset
        .rows
        .iter()
        .filter_map(|row| row.get(key))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .filter(|value| seen.insert(value.to_string()))
        .map(|value| normalizer.search_term(value))
        .collect())
}
