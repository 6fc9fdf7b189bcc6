//! Economy Page
//! GDP growth, unemployment and national vote shares per election year.

use super::{PageError, PageTables};
use crate::analysis::correlation::CorrelationTable;
use crate::analysis::election::{
    AggregateReport, ElectionAggregator, PartyShareTable, Reconciliation,
};
use crate::analysis::joiner::MergedAnalysisTable;
use crate::data::normalizer::{EntitySelector, NormalizeReport, SeriesNormalizer};
use crate::data::series::YearSeries;
use crate::session::Session;
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

pub const GDP_GROWTH: &str = "gdp_growth";
pub const GDP_LAG2_AVG: &str = "gdp_lag2_avg";
pub const UNEMPLOYMENT: &str = "unemployment_percentage";
pub const UNEMPLOYMENT_LAG1: &str = "unemployment_lag1";

pub struct EconomyPage {
    pub gdp: YearSeries,
    pub unemployment: YearSeries,
    pub unemployment_report: NormalizeReport,
    pub shares: PartyShareTable,
    pub election_report: AggregateReport,
    pub reconciliation: Vec<Reconciliation>,
    /// One row per election year: party shares, `gdp_growth`,
    /// `gdp_growth_lag1` (previous election), `gdp_lag2_avg`,
    /// `unemployment_percentage` and `unemployment_lag1`.
    pub merged: MergedAnalysisTable,
    pub gdp_correlations: CorrelationTable,
    pub unemployment_correlations: CorrelationTable,
}

impl EconomyPage {
    pub fn build(session: &Session) -> Result<Self, PageError> {
        let config = session.config();
        let settings = &config.analysis;

        let gdp_source = &config.gdp;
        let gdp_table = session.load(&gdp_source.path, &gdp_source.load)?;
        let gdp = SeriesNormalizer::wide_row_to_series(
            &gdp_table.frame,
            EntitySelector {
                column: &gdp_source.entity_column,
                code: &gdp_source.entity_code,
            },
            GDP_GROWTH,
            settings.year_range,
            gdp_source.decimal,
        )?;

        let unemployment_source = &config.unemployment;
        let unemployment_table =
            session.load(&unemployment_source.path, &unemployment_source.load)?;
        let (unemployment, unemployment_report) = SeriesNormalizer::long_columns_to_series(
            &unemployment_table.frame,
            &unemployment_source.year_column,
            &unemployment_source.value_column,
            UNEMPLOYMENT,
            settings.year_range,
            unemployment_source.decimal,
        )?;

        let elections = &config.elections;
        let election_table = session.load(&elections.path, &elections.load)?;
        let (shares, election_report) =
            ElectionAggregator::aggregate_national(&election_table.frame, &elections.columns)?;
        let reconciliation = shares.reconcile(settings.share_tolerance);

        let gdp_average = gdp
            .trailing_mean(settings.gdp_average_window, settings.gdp_average_lag)
            .renamed(GDP_LAG2_AVG);
        let merged = MergedAnalysisTable::from_party_shares(&shares)
            .left_join_series(&gdp)?
            .shift(GDP_GROWTH, 1)?
            .left_join_series(&gdp_average)?
            .left_join_series(&unemployment)?
            .left_join_series(&unemployment.lag(1).renamed(UNEMPLOYMENT_LAG1))?;

        let gdp_correlations =
            CorrelationTable::from_table(&merged, GDP_LAG2_AVG, &settings.parties)?;
        let unemployment_correlations =
            CorrelationTable::from_table(&merged, UNEMPLOYMENT, &settings.parties)?;

        info!(
            gdp_years = gdp.len(),
            unemployment_years = unemployment.len(),
            election_years = merged.len(),
            unreconciled_years = reconciliation.len(),
            "built economy page"
        );

        Ok(Self {
            gdp,
            unemployment,
            unemployment_report,
            shares,
            election_report,
            reconciliation,
            merged,
            gdp_correlations,
            unemployment_correlations,
        })
    }
}

#[derive(Serialize)]
struct EconomyDiagnostics<'a> {
    unemployment: &'a NormalizeReport,
    elections: &'a AggregateReport,
    reconciliation: &'a [Reconciliation],
    gdp_correlations: &'a CorrelationTable,
    unemployment_correlations: &'a CorrelationTable,
}

impl PageTables for EconomyPage {
    fn tables(&self) -> PolarsResult<Vec<(String, DataFrame)>> {
        Ok(vec![
            ("gdp_growth".to_string(), self.gdp.to_frame("year")?),
            ("unemployment".to_string(), self.unemployment.to_frame("year")?),
            ("party_shares".to_string(), self.shares.to_frame()?),
            ("election_economy".to_string(), self.merged.to_frame()?),
            ("correlation_gdp".to_string(), self.gdp_correlations.to_frame()?),
            (
                "correlation_unemployment".to_string(),
                self.unemployment_correlations.to_frame()?,
            ),
        ])
    }

    fn diagnostics(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(EconomyDiagnostics {
            unemployment: &self.unemployment_report,
            elections: &self.election_report,
            reconciliation: &self.reconciliation,
            gdp_correlations: &self.gdp_correlations,
            unemployment_correlations: &self.unemployment_correlations,
        })
    }
}
