//! Party Correlation Module
//! Pearson correlation of every party column against one indicator.

use super::joiner::MergedAnalysisTable;
use crate::stats::{Correlation, StatsCalculator};
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq)]
pub enum CorrelationError {
    #[error("Column '{0}' not found")]
    MissingColumn(String),
    #[error("Column '{column}' has {found} rows, indicator has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// One party's correlation with the indicator; `None` when fewer than
/// three complete pairs exist or one side is constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyCorrelation {
    pub party: String,
    pub correlation: Option<Correlation>,
}

/// Correlations of several parties with one indicator, in party order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationTable {
    pub indicator: String,
    pub rows: Vec<PartyCorrelation>,
}

impl CorrelationTable {
    /// Correlate each `(party, values)` column with `values`.
    pub fn compute(
        indicator: &str,
        values: &[Option<f64>],
        parties: &[(String, Vec<Option<f64>>)],
    ) -> Result<Self, CorrelationError> {
        if let Some((party, column)) = parties.iter().find(|(_, c)| c.len() != values.len()) {
            return Err(CorrelationError::LengthMismatch {
                column: party.clone(),
                expected: values.len(),
                found: column.len(),
            });
        }

        let rows: Vec<PartyCorrelation> = parties
            .par_iter()
            .map(|(party, column)| PartyCorrelation {
                party: party.clone(),
                correlation: StatsCalculator::pearson(column, values),
            })
            .collect();

        debug!(
            indicator,
            parties = rows.len(),
            defined = rows.iter().filter(|r| r.correlation.is_some()).count(),
            "computed correlations"
        );
        Ok(Self {
            indicator: indicator.to_string(),
            rows,
        })
    }

    /// Correlate party columns of a merged table with one of its columns.
    pub fn from_table(
        table: &MergedAnalysisTable,
        indicator: &str,
        parties: &[String],
    ) -> Result<Self, CorrelationError> {
        let column = |name: &str| {
            table
                .column(name)
                .map(<[Option<f64>]>::to_vec)
                .ok_or_else(|| CorrelationError::MissingColumn(name.to_string()))
        };
        let values = column(indicator)?;
        let parties = parties
            .iter()
            .map(|party| Ok((party.clone(), column(party)?)))
            .collect::<Result<Vec<_>, CorrelationError>>()?;
        Self::compute(indicator, &values, &parties)
    }

    pub fn get(&self, party: &str) -> Option<&Correlation> {
        self.rows
            .iter()
            .find(|r| r.party == party)
            .and_then(|r| r.correlation.as_ref())
    }

    /// `party`, `indicator`, `coefficient`, `pairs`, `p_value`, `significant`.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let parties: Vec<&str> = self.rows.iter().map(|r| r.party.as_str()).collect();
        let indicator = vec![self.indicator.as_str(); self.rows.len()];
        let field = |f: fn(&Correlation) -> f64| -> Vec<Option<f64>> {
            self.rows
                .iter()
                .map(|r| r.correlation.as_ref().map(f))
                .collect()
        };
        let pairs: Vec<Option<u32>> = self
            .rows
            .iter()
            .map(|r| r.correlation.as_ref().map(|c| c.pairs as u32))
            .collect();
        let significant: Vec<Option<bool>> = self
            .rows
            .iter()
            .map(|r| r.correlation.as_ref().map(|c| c.is_significant))
            .collect();

        DataFrame::new(vec![
            Column::new("party".into(), parties),
            Column::new("indicator".into(), indicator),
            Column::new("coefficient".into(), field(|c| c.coefficient)),
            Column::new("pairs".into(), pairs),
            Column::new("p_value".into(), field(|c| c.p_value)),
            Column::new("significant".into(), significant),
        ])
    }
}
