//! Series Normalizer Module
//! Turns wide year-column tables and long year/value tables into tidy
//! [`YearSeries`].

use super::schema::{
    numeric_values, parse_integer, text_values, year_columns, ColumnRef, DecimalSeparator,
    YearRange,
};
use super::series::{SeriesError, YearSeries};
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' not found")]
    MissingColumn(String),
    #[error("No row with {column} = '{code}'")]
    EntityNotFound { column: String, code: String },
    #[error("Table has no year columns")]
    NoYearColumns,
    #[error(transparent)]
    SeriesError(#[from] SeriesError),
}

/// Rows dropped while building a series from long columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub rows_read: usize,
    pub unparsable_years: usize,
    pub outside_range: usize,
    pub duplicate_years: usize,
    pub missing_values: usize,
}

/// Where a wide table keeps its entity codes and which entity to select.
#[derive(Debug, Clone, Copy)]
pub struct EntitySelector<'a> {
    pub column: &'a str,
    pub code: &'a str,
}

/// Handles the wide-to-long and long-to-series transformations.
pub struct SeriesNormalizer;

impl SeriesNormalizer {
    /// Select one entity row of a wide table (one column per year) and
    /// transpose it into a series.
    ///
    /// Year columns are detected with [`super::schema::parse_year`]. A year
    /// whose cell is empty or unparsable stays in the series with a missing
    /// value.
    pub fn wide_row_to_series(
        df: &DataFrame,
        entity: EntitySelector<'_>,
        name: &str,
        range: YearRange,
        decimal: DecimalSeparator,
    ) -> Result<YearSeries, NormalizeError> {
        let codes = text_values(
            df.column(entity.column)
                .map_err(|_| NormalizeError::MissingColumn(entity.column.to_string()))?,
        )?;

        let mut matches = codes
            .iter()
            .enumerate()
            .filter(|(_, code)| code.as_deref() == Some(entity.code.trim()))
            .map(|(idx, _)| idx);
        let row = matches.next().ok_or_else(|| NormalizeError::EntityNotFound {
            column: entity.column.to_string(),
            code: entity.code.to_string(),
        })?;
        if matches.next().is_some() {
            warn!(
                column = entity.column,
                code = entity.code,
                "entity code is not unique, using first row"
            );
        }

        let years = year_columns(df);
        if years.is_empty() {
            return Err(NormalizeError::NoYearColumns);
        }

        let mut points = Vec::with_capacity(years.len());
        for (column, year) in years {
            if !range.contains(year) {
                continue;
            }
            let values = numeric_values(df.column(&column)?, decimal)?;
            points.push((year, values.get(row).copied().flatten()));
        }

        let series = YearSeries::new(name, points)?;
        let missing = series.points().iter().filter(|(_, v)| v.is_none()).count();
        debug!(
            series = name,
            years = series.len(),
            missing,
            "normalized wide row"
        );
        Ok(series)
    }

    /// Build a series from a year column and a value column.
    ///
    /// Rows whose year cannot be read or lies outside `range` are skipped;
    /// a repeated year keeps its first row. Both are counted in the report.
    pub fn long_columns_to_series(
        df: &DataFrame,
        year_column: &ColumnRef,
        value_column: &ColumnRef,
        name: &str,
        range: YearRange,
        decimal: DecimalSeparator,
    ) -> Result<(YearSeries, NormalizeReport), NormalizeError> {
        let years = text_values(
            year_column
                .resolve(df)
                .ok_or_else(|| NormalizeError::MissingColumn(year_column.to_string()))?,
        )?;
        let values = numeric_values(
            value_column
                .resolve(df)
                .ok_or_else(|| NormalizeError::MissingColumn(value_column.to_string()))?,
            decimal,
        )?;

        let mut report = NormalizeReport {
            rows_read: years.len(),
            ..Default::default()
        };
        let mut points: Vec<(i32, Option<f64>)> = Vec::with_capacity(years.len());

        for (year, value) in years.iter().zip(values) {
            let Some(year) = year.as_deref().and_then(parse_year_cell) else {
                report.unparsable_years += 1;
                continue;
            };
            if !range.contains(year) {
                report.outside_range += 1;
                continue;
            }
            if points.iter().any(|(y, _)| *y == year) {
                report.duplicate_years += 1;
                continue;
            }
            if value.is_none() {
                report.missing_values += 1;
            }
            points.push((year, value));
        }

        if report.unparsable_years > 0 || report.duplicate_years > 0 {
            warn!(
                series = name,
                unparsable_years = report.unparsable_years,
                duplicate_years = report.duplicate_years,
                "skipped rows while normalizing series"
            );
        }

        Ok((YearSeries::new(name, points)?, report))
    }
}

/// Year cells may come as "1991" or, from numeric columns, "1991.0".
pub(crate) fn parse_year_cell(cell: &str) -> Option<i32> {
    parse_integer(cell).and_then(|year| i32::try_from(year).ok())
}
