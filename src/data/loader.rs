//! Raw Table Loader Module
//! Reads delimited statistical exports into polars frames, tolerating legacy
//! encodings, metadata preambles, trailing columns and malformed rows.

use super::schema::{parse_number, DecimalSeparator};
use encoding_rs::WINDOWS_1252;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Input is not valid {0:?} text")]
    Encoding(TextEncoding),
    #[error("Delimiter {0:?} is not a single ASCII character")]
    InvalidDelimiter(char),
    #[error("No header row after skipping {0} lines")]
    MissingHeader(usize),
    #[error("Column name override has {found} names but the file has {expected} columns")]
    HeaderArity { expected: usize, found: usize },
    #[error("Column '{0}' declared numeric but not present")]
    MissingColumn(String),
    #[error("Failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Failed to build table: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Text encoding of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1 and its Windows-1252 superset, used by the federal
    /// statistics office exports.
    #[serde(alias = "cp1252", alias = "windows_1252", alias = "iso_8859_1")]
    Latin1,
}

/// What to do with the last column of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingColumn {
    #[default]
    Keep,
    /// Always drop the last column.
    Drop,
    /// Drop the last column only when its header is blank.
    DropBlank,
}

/// How a source file is laid out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub delimiter: char,
    pub encoding: TextEncoding,
    /// Metadata lines before the header row.
    pub skip_rows: usize,
    /// Records directly after the header that are not data.
    pub skip_data_rows: usize,
    /// Records at the end of the file that are not data.
    pub footer_rows: usize,
    pub column_names: Option<Vec<String>>,
    pub trailing_column: TrailingColumn,
    /// Columns coerced to `Float64`; everything else stays text.
    pub numeric_columns: Vec<String>,
    pub decimal: DecimalSeparator,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            encoding: TextEncoding::Utf8,
            skip_rows: 0,
            skip_data_rows: 0,
            footer_rows: 0,
            column_names: None,
            trailing_column: TrailingColumn::Keep,
            numeric_columns: Vec::new(),
            decimal: DecimalSeparator::Point,
        }
    }
}

/// Row-level diagnostics of a single load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Records after the header, before any filtering.
    pub records_read: usize,
    pub rows_kept: usize,
    pub leading_rows_skipped: usize,
    pub footer_rows_dropped: usize,
    pub blank_rows: usize,
    /// Records whose column count matches neither the header nor the
    /// header without its dropped trailing column.
    pub malformed_rows: usize,
    /// Non-blank cells of numeric columns that failed to parse.
    pub coerced_nulls: usize,
    pub dropped_trailing_column: bool,
}

/// A loaded frame together with its diagnostics.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub frame: DataFrame,
    pub report: LoadReport,
}

/// Load a file from disk.
pub fn load_table(path: &Path, options: &LoadOptions) -> Result<LoadedTable, LoaderError> {
    let bytes = fs::read(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let table = load_bytes(&bytes, options)?;
    let report = &table.report;
    info!(
        path = %path.display(),
        rows = report.rows_kept,
        columns = table.frame.width(),
        "loaded table"
    );
    if report.malformed_rows > 0 || report.coerced_nulls > 0 {
        warn!(
            path = %path.display(),
            malformed_rows = report.malformed_rows,
            coerced_nulls = report.coerced_nulls,
            "dropped malformed rows / unparsable cells"
        );
    }
    Ok(table)
}

/// Load an in-memory file.
pub fn load_bytes(bytes: &[u8], options: &LoadOptions) -> Result<LoadedTable, LoaderError> {
    let delimiter = delimiter_byte(options.delimiter)?;
    let text = decode(bytes, options.encoding)?;
    let body = skip_lines(&text, options.skip_rows)
        .ok_or(LoaderError::MissingHeader(options.skip_rows))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());
    let mut records = reader.records();

    let header = records
        .next()
        .ok_or(LoaderError::MissingHeader(options.skip_rows))??;
    let width = header.len();
    let mut names: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();

    let mut report = LoadReport::default();
    let drop_last = match options.trailing_column {
        TrailingColumn::Keep => false,
        TrailingColumn::Drop => width > 0,
        TrailingColumn::DropBlank => names.last().is_some_and(|n| n.is_empty()),
    };
    if drop_last {
        names.pop();
        report.dropped_trailing_column = true;
    }
    // Rows may or may not carry the dropped column.
    let kept_width = names.len();

    if let Some(overrides) = &options.column_names {
        if overrides.len() != names.len() {
            return Err(LoaderError::HeaderArity {
                expected: names.len(),
                found: overrides.len(),
            });
        }
        names = overrides.clone();
    }
    let names = unique_names(names);

    for numeric in &options.numeric_columns {
        if !names.contains(numeric) {
            return Err(LoaderError::MissingColumn(numeric.clone()));
        }
    }

    let mut raw: Vec<Result<csv::StringRecord, csv::Error>> = records.collect();
    report.records_read = raw.len();

    let leading = options.skip_data_rows.min(raw.len());
    raw.drain(..leading);
    report.leading_rows_skipped = leading;

    let footer = options.footer_rows.min(raw.len());
    raw.truncate(raw.len() - footer);
    report.footer_rows_dropped = footer;

    let mut rows = Vec::with_capacity(raw.len());
    for (idx, result) in raw.into_iter().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!(row = idx + leading, error = %e, "unreadable record");
                report.malformed_rows += 1;
                continue;
            }
        };
        if record.iter().all(|field| field.trim().is_empty()) {
            report.blank_rows += 1;
            continue;
        }
        if record.len() != width && record.len() != kept_width {
            debug!(
                row = idx + leading,
                expected = width,
                found = record.len(),
                "column count mismatch"
            );
            report.malformed_rows += 1;
            continue;
        }
        rows.push(record);
    }
    report.rows_kept = rows.len();

    let mut columns = Vec::with_capacity(names.len());
    for (j, name) in names.iter().enumerate() {
        let cells: Vec<Option<&str>> = rows
            .iter()
            .map(|r| r.get(j).map(str::trim).filter(|s| !s.is_empty()))
            .collect();

        if options.numeric_columns.contains(name) {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|cell| {
                    let value = cell.and_then(|s| parse_number(s, options.decimal));
                    if cell.is_some() && value.is_none() {
                        report.coerced_nulls += 1;
                    }
                    value
                })
                .collect();
            columns.push(Column::new(name.as_str().into(), values));
        } else {
            columns.push(Column::new(name.as_str().into(), cells));
        }
    }

    let frame = DataFrame::new(columns)?;
    Ok(LoadedTable { frame, report })
}

fn delimiter_byte(delimiter: char) -> Result<u8, LoaderError> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(LoaderError::InvalidDelimiter(delimiter))
    }
}

fn decode(bytes: &[u8], encoding: TextEncoding) -> Result<Cow<'_, str>, LoaderError> {
    match encoding {
        TextEncoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|_| LoaderError::Encoding(encoding))
        }
        TextEncoding::Latin1 => {
            // Every byte maps to a character in Windows-1252.
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            Ok(text)
        }
    }
}

fn skip_lines(text: &str, count: usize) -> Option<&str> {
    let mut rest = text;
    for _ in 0..count {
        let end = rest.find('\n')?;
        rest = &rest[end + 1..];
    }
    Some(rest)
}

/// Blank headers become `column_<idx>`, repeats get a `_<n>` suffix.
fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let base = if name.is_empty() {
                format!("column_{idx}")
            } else {
                name
            };
            let mut candidate = base.clone();
            let mut n = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}_{n}");
                n += 1;
            }
            candidate
        })
        .collect()
}
