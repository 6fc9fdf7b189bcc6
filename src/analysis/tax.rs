//! Tax/Income Normalizer Module
//! Per-unit regional indicators, summaries and quantile binning.

use crate::data::normalizer::parse_year_cell;
use crate::data::schema::{numeric_values, text_values, DecimalSeparator};
use crate::stats::{StatsCalculator, Summary};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const TAX_PER_TAXPAYER: &str = "tax_per_taxpayer";
pub const INCOME_PER_TAXPAYER: &str = "income_per_taxpayer";
pub const TAXPAYER_COUNT: &str = "taxpayer_count";

#[derive(Error, Debug)]
pub enum TaxError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' not found")]
    MissingColumn(String),
    #[error("No rows with a readable year")]
    NoYears,
}

#[derive(Error, Debug, PartialEq)]
pub enum BinningError {
    #[error("Number of bins must be positive")]
    ZeroBins,
    #[error("Value at row {0} is not finite")]
    NonFinite(usize),
    #[error("Column has {found} rows, bins were fitted on {expected}")]
    LengthMismatch { expected: usize, found: usize },
}

/// `total * scale / count`. A zero or missing count, a missing total or a
/// non-finite result has no value.
pub fn per_unit(total: Option<f64>, count: Option<f64>, scale: f64) -> Option<f64> {
    let count = count.filter(|c| *c != 0.0)?;
    let value = total? * scale / count;
    value.is_finite().then_some(value)
}

/// Column layout of the district income-tax statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeTaxColumns {
    pub year: String,
    pub region_code: String,
    pub region_name: String,
    pub taxpayer_count: String,
    pub total_income: String,
    pub total_tax: String,
    /// Factor from the reported unit to euros (amounts come in thousands).
    pub unit_scale: f64,
}

impl Default for IncomeTaxColumns {
    fn default() -> Self {
        Self {
            year: "year".to_string(),
            region_code: "region_code".to_string(),
            region_name: "region_name".to_string(),
            taxpayer_count: "taxpayer_count".to_string(),
            total_income: "total_income_keur".to_string(),
            total_tax: "total_tax_keur".to_string(),
            unit_scale: 1000.0,
        }
    }
}

/// Column layout of a table that already carries indicators per region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorColumns {
    pub year: String,
    pub region_code: String,
    pub region_name: Option<String>,
    pub indicators: Vec<String>,
}

impl Default for IndicatorColumns {
    fn default() -> Self {
        Self {
            year: "year".to_string(),
            region_code: "code".to_string(),
            region_name: Some("region".to_string()),
            indicators: vec!["income_per_capita".to_string()],
        }
    }
}

/// Rows left out while building a [`RegionIndicatorTable`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndicatorReport {
    pub rows_read: usize,
    pub unparsable_years: usize,
    pub other_years: usize,
    pub missing_codes: usize,
    pub duplicate_codes: usize,
    /// Indicator cells without a value, including guarded divisions.
    pub missing_values: usize,
}

/// One region's indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionIndicators {
    pub code: String,
    pub name: Option<String>,
    pub values: Vec<Option<f64>>,
}

/// A region's value of one indicator, for rankings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRegion {
    pub code: String,
    pub name: Option<String>,
    pub value: f64,
}

/// Named numeric indicators per region for one reporting year.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionIndicatorTable {
    pub year: i32,
    indicators: Vec<String>,
    rows: Vec<RegionIndicators>,
}

impl RegionIndicatorTable {
    /// Derive per-taxpayer indicators from the district tax statistics.
    /// Without a `year` the latest reporting year in the file is used.
    pub fn from_income_tax(
        df: &DataFrame,
        columns: &IncomeTaxColumns,
        year: Option<i32>,
    ) -> Result<(Self, IndicatorReport), TaxError> {
        let base = BaseRows::read(
            df,
            &columns.year,
            &columns.region_code,
            Some(&columns.region_name),
            year,
        )?;
        let count = numeric(df, &columns.taxpayer_count)?;
        let income = numeric(df, &columns.total_income)?;
        let tax = numeric(df, &columns.total_tax)?;

        let scale = columns.unit_scale;
        let mut report = base.report;
        let rows: Vec<RegionIndicators> = base
            .rows
            .into_iter()
            .map(|(row, code, name)| {
                let values = vec![
                    per_unit(tax[row], count[row], scale),
                    per_unit(income[row], count[row], scale),
                    count[row],
                ];
                report.missing_values += values.iter().filter(|v| v.is_none()).count();
                RegionIndicators { code, name, values }
            })
            .collect();

        let table = Self {
            year: base.year,
            indicators: vec![
                TAX_PER_TAXPAYER.to_string(),
                INCOME_PER_TAXPAYER.to_string(),
                TAXPAYER_COUNT.to_string(),
            ],
            rows,
        };
        table.log_built(&report);
        Ok((table, report))
    }

    /// Take indicator columns as they are.
    pub fn from_columns(
        df: &DataFrame,
        columns: &IndicatorColumns,
        year: i32,
    ) -> Result<(Self, IndicatorReport), TaxError> {
        let base = BaseRows::read(
            df,
            &columns.year,
            &columns.region_code,
            columns.region_name.as_deref(),
            Some(year),
        )?;
        let values: Vec<Vec<Option<f64>>> = columns
            .indicators
            .iter()
            .map(|name| numeric(df, name))
            .collect::<Result<_, _>>()?;

        let mut report = base.report;
        let rows: Vec<RegionIndicators> = base
            .rows
            .into_iter()
            .map(|(row, code, name)| {
                let values: Vec<Option<f64>> = values.iter().map(|col| col[row]).collect();
                report.missing_values += values.iter().filter(|v| v.is_none()).count();
                RegionIndicators { code, name, values }
            })
            .collect();

        let table = Self {
            year: base.year,
            indicators: columns.indicators.clone(),
            rows,
        };
        table.log_built(&report);
        Ok((table, report))
    }

    /// Distinct readable years of a year column, ascending.
    pub fn available_years(df: &DataFrame, year_column: &str) -> Result<Vec<i32>, TaxError> {
        let years: BTreeSet<i32> = text_values(
            df.column(year_column)
                .map_err(|_| TaxError::MissingColumn(year_column.to_string()))?,
        )?
        .iter()
        .filter_map(|cell| cell.as_deref().and_then(parse_year_cell))
        .collect();
        Ok(years.into_iter().collect())
    }

    fn log_built(&self, report: &IndicatorReport) {
        info!(
            year = self.year,
            regions = self.rows.len(),
            missing_values = report.missing_values,
            "built region indicators"
        );
        if report.unparsable_years + report.missing_codes + report.duplicate_codes > 0 {
            warn!(
                unparsable_years = report.unparsable_years,
                missing_codes = report.missing_codes,
                duplicate_codes = report.duplicate_codes,
                "skipped region rows"
            );
        }
    }

    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    pub fn rows(&self) -> &[RegionIndicators] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn index(&self, indicator: &str) -> Option<usize> {
        self.indicators.iter().position(|i| i == indicator)
    }

    /// All values of one indicator in row order.
    pub fn column(&self, indicator: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.index(indicator)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    pub fn value(&self, code: &str, indicator: &str) -> Option<f64> {
        let idx = self.index(indicator)?;
        self.rows.iter().find(|r| r.code == code)?.values[idx]
    }

    /// Descriptive statistics of the regions that have the indicator.
    pub fn summary(&self, indicator: &str) -> Option<Summary> {
        let present: Vec<f64> = self.column(indicator)?.into_iter().flatten().collect();
        Some(StatsCalculator::compute_descriptive_stats(&present))
    }

    /// The `n` regions with the highest value.
    pub fn top(&self, indicator: &str, n: usize) -> Vec<RankedRegion> {
        let mut ranked = self.ranked(indicator);
        ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
        ranked.truncate(n);
        ranked
    }

    /// The `n` regions with the lowest value.
    pub fn bottom(&self, indicator: &str, n: usize) -> Vec<RankedRegion> {
        let mut ranked = self.ranked(indicator);
        ranked.sort_by(|a, b| a.value.total_cmp(&b.value));
        ranked.truncate(n);
        ranked
    }

    fn ranked(&self, indicator: &str) -> Vec<RankedRegion> {
        let Some(idx) = self.index(indicator) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|r| {
                r.values[idx].map(|value| RankedRegion {
                    code: r.code.clone(),
                    name: r.name.clone(),
                    value,
                })
            })
            .collect()
    }

    /// `year`, `region_code`, `region_name` and one column per indicator.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let years = vec![self.year; self.rows.len()];
        let codes: Vec<&str> = self.rows.iter().map(|r| r.code.as_str()).collect();
        let names: Vec<Option<&str>> = self.rows.iter().map(|r| r.name.as_deref()).collect();
        let mut columns = vec![
            Column::new("year".into(), years),
            Column::new("region_code".into(), codes),
            Column::new("region_name".into(), names),
        ];
        for (idx, indicator) in self.indicators.iter().enumerate() {
            let values: Vec<Option<f64>> = self.rows.iter().map(|r| r.values[idx]).collect();
            columns.push(Column::new(indicator.as_str().into(), values));
        }
        DataFrame::new(columns)
    }
}

/// Rows of one year with a region code, first occurrence per code.
struct BaseRows {
    year: i32,
    rows: Vec<(usize, String, Option<String>)>,
    report: IndicatorReport,
}

impl BaseRows {
    fn read(
        df: &DataFrame,
        year_column: &str,
        code_column: &str,
        name_column: Option<&str>,
        year: Option<i32>,
    ) -> Result<Self, TaxError> {
        let years: Vec<Option<i32>> = text(df, year_column)?
            .iter()
            .map(|cell| cell.as_deref().and_then(parse_year_cell))
            .collect();
        let codes = text(df, code_column)?;
        let names = match name_column {
            Some(column) => text(df, column)?,
            None => vec![None; df.height()],
        };

        let year = match year {
            Some(year) => year,
            None => {
                let latest = years.iter().flatten().max().copied().ok_or(TaxError::NoYears)?;
                debug!(year = latest, "using latest reporting year");
                latest
            }
        };

        let mut report = IndicatorReport {
            rows_read: df.height(),
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut rows = Vec::new();
        for (row, row_year) in years.iter().enumerate() {
            match row_year {
                None => {
                    report.unparsable_years += 1;
                    continue;
                }
                Some(y) if *y != year => {
                    report.other_years += 1;
                    continue;
                }
                Some(_) => {}
            }
            let Some(code) = codes[row].clone() else {
                report.missing_codes += 1;
                continue;
            };
            if !seen.insert(code.clone()) {
                report.duplicate_codes += 1;
                continue;
            }
            rows.push((row, code, names[row].clone()));
        }

        Ok(Self { year, rows, report })
    }
}

fn text(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>, TaxError> {
    let column = df
        .column(column)
        .map_err(|_| TaxError::MissingColumn(column.to_string()))?;
    Ok(text_values(column)?)
}

fn numeric(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>, TaxError> {
    let column = df
        .column(column)
        .map_err(|_| TaxError::MissingColumn(column.to_string()))?;
    Ok(numeric_values(column, DecimalSeparator::Point)?)
}

/// Equal-population bins over a continuous column.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileBins {
    assignments: Vec<usize>,
    sizes: Vec<usize>,
    labels: Vec<Option<f64>>,
}

impl QuantileBins {
    /// Rank the values (ties broken by position) and cut the ranking into
    /// `bins` groups whose sizes differ by at most one. Each bin is labelled
    /// with the median of its values.
    pub fn fit(values: &[f64], bins: usize) -> Result<Self, BinningError> {
        if bins == 0 {
            return Err(BinningError::ZeroBins);
        }
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(BinningError::NonFinite(idx));
        }

        let n = values.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));

        let mut assignments = vec![0; n];
        let mut members: Vec<Vec<f64>> = vec![Vec::new(); bins];
        for (rank, &idx) in order.iter().enumerate() {
            let bin = rank * bins / n;
            assignments[idx] = bin;
            members[bin].push(values[idx]);
        }

        let sizes = members.iter().map(Vec::len).collect();
        let labels = members.iter().map(|m| StatsCalculator::median(m)).collect();

        Ok(Self {
            assignments,
            sizes,
            labels,
        })
    }

    pub fn bins(&self) -> usize {
        self.sizes.len()
    }

    /// Bin index of every input row, in input order.
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Median value per bin; `None` for an empty bin.
    pub fn labels(&self) -> &[Option<f64>] {
        &self.labels
    }

    /// Mean of another column per bin, skipping missing cells.
    pub fn mean_by_bin(&self, column: &[Option<f64>]) -> Result<Vec<Option<f64>>, BinningError> {
        if column.len() != self.assignments.len() {
            return Err(BinningError::LengthMismatch {
                expected: self.assignments.len(),
                found: column.len(),
            });
        }
        let mut grouped: Vec<Vec<Option<f64>>> = vec![Vec::new(); self.bins()];
        for (value, &bin) in column.iter().zip(&self.assignments) {
            grouped[bin].push(*value);
        }
        Ok(grouped
            .iter()
            .map(|values| StatsCalculator::mean_present(values))
            .collect())
    }
}
