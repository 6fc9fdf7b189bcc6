//! Joiner Module
//! Key normalization, region inner joins and the year-keyed analysis table.

use super::election::PartyShareTable;
use crate::data::schema::parse_integer;
use crate::data::series::YearSeries;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, PartialEq)]
pub enum JoinError {
    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),
    #[error("Column '{0}' not found")]
    MissingColumn(String),
}

/// Region codes compare as integers: "01001", "1001" and "1001.0" are the
/// same key.
pub fn normalize_key(raw: &str) -> Option<i64> {
    parse_integer(raw)
}

/// Row counts of a region join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinReport {
    pub left_rows: usize,
    pub right_rows: usize,
    pub left_key_failures: usize,
    pub right_key_failures: usize,
    /// Right rows whose key was already taken by an earlier row.
    pub right_duplicates: usize,
    pub left_unmatched: usize,
    pub right_unmatched: usize,
    pub matched: usize,
}

/// A left row and the right row that shares its key.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow<L, R> {
    pub key: i64,
    pub left: L,
    pub right: R,
}

/// Inner join of two region-keyed row sets on normalized keys, in left
/// order. Rows whose key does not normalize are excluded and counted per
/// side; a repeated right key keeps its first row.
pub fn inner_join_regions<'l, 'r, L, R>(
    left: impl IntoIterator<Item = (&'l str, L)>,
    right: impl IntoIterator<Item = (&'r str, R)>,
) -> (Vec<JoinedRow<L, R>>, JoinReport)
where
    R: Clone,
{
    let mut report = JoinReport::default();

    let mut index: HashMap<i64, (R, bool)> = HashMap::new();
    for (raw, row) in right {
        report.right_rows += 1;
        let Some(key) = normalize_key(raw) else {
            report.right_key_failures += 1;
            continue;
        };
        if index.contains_key(&key) {
            report.right_duplicates += 1;
            continue;
        }
        index.insert(key, (row, false));
    }

    let mut joined = Vec::new();
    for (raw, row) in left {
        report.left_rows += 1;
        let Some(key) = normalize_key(raw) else {
            report.left_key_failures += 1;
            continue;
        };
        match index.get_mut(&key) {
            Some((right, used)) => {
                *used = true;
                joined.push(JoinedRow {
                    key,
                    left: row,
                    right: right.clone(),
                });
            }
            None => report.left_unmatched += 1,
        }
    }
    report.right_unmatched = index.values().filter(|(_, used)| !used).count();
    report.matched = joined.len();

    debug!(
        left_rows = report.left_rows,
        right_rows = report.right_rows,
        matched = report.matched,
        "joined regions"
    );
    if report.left_key_failures + report.right_key_failures > 0 {
        warn!(
            left_key_failures = report.left_key_failures,
            right_key_failures = report.right_key_failures,
            "region keys failed to normalize"
        );
    }

    (joined, report)
}

/// The region-income lookup order: `target`, then up to `max_distance`
/// years back, then up to `max_distance` years forward.
pub fn nearest_available_year(target: i32, available: &[i32], max_distance: u32) -> Option<i32> {
    let max = max_distance as i32;
    std::iter::once(target)
        .chain((1..=max).map(|d| target - d))
        .chain((1..=max).map(|d| target + d))
        .find(|year| available.contains(year))
}

/// Columns of `Option<f64>` keyed by an ascending year column.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedAnalysisTable {
    key: String,
    years: Vec<i32>,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl MergedAnalysisTable {
    /// Start from the national shares: one row per election year, one
    /// column per party and composite.
    pub fn from_party_shares(shares: &PartyShareTable) -> Self {
        let years = shares.years();
        let columns = shares
            .names()
            .into_iter()
            .map(|party| {
                let values = years.iter().map(|&y| shares.share(&party, y)).collect();
                (party, values)
            })
            .collect();
        Self {
            key: "election_year".to_string(),
            years,
            columns,
        }
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    fn push(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<(), JoinError> {
        if name == self.key || self.column(name).is_some() {
            return Err(JoinError::DuplicateColumn(name.to_string()));
        }
        self.columns.push((name.to_string(), values));
        Ok(())
    }

    /// Add a series as a column named after it. Years the series lacks
    /// get nulls; series years outside the table are ignored.
    pub fn left_join_series(mut self, series: &YearSeries) -> Result<Self, JoinError> {
        let values: Vec<Option<f64>> = self.years.iter().map(|&y| series.get(y)).collect();
        let unmatched = self
            .years
            .iter()
            .filter(|&&y| !series.contains_year(y))
            .count();
        if unmatched > 0 {
            debug!(series = series.name(), unmatched, "years without a value");
        }
        self.push(series.name(), values)?;
        Ok(self)
    }

    /// Positional lag over the table rows: row `i` takes the value of row
    /// `i - k`, the first `k` rows are null. Added as `{column}_lag{k}`.
    pub fn shift(mut self, column: &str, k: usize) -> Result<Self, JoinError> {
        let source = self
            .column(column)
            .ok_or_else(|| JoinError::MissingColumn(column.to_string()))?;
        let shifted: Vec<Option<f64>> = (0..source.len())
            .map(|i| if i < k { None } else { source[i - k] })
            .collect();
        self.push(&format!("{column}_lag{k}"), shifted)?;
        Ok(self)
    }

    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let mut columns = vec![Column::new(self.key.as_str().into(), self.years.clone())];
        for (name, values) in &self.columns {
            columns.push(Column::new(name.as_str().into(), values.clone()));
        }
        DataFrame::new(columns)
    }
}
