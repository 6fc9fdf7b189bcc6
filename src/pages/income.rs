//! Income Tax Page
//! District tax indicators joined with county vote shares of one election.

use super::{PageError, PageTables};
use crate::analysis::correlation::CorrelationTable;
use crate::analysis::election::{AggregateReport, ElectionAggregator, PartyShareTable};
use crate::analysis::joiner::{inner_join_regions, JoinReport};
use crate::analysis::tax::{
    IndicatorReport, QuantileBins, RankedRegion, RegionIndicatorTable, TAX_PER_TAXPAYER,
};
use crate::session::Session;
use crate::stats::Summary;
use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

/// A county with its tax indicator, party shares and income bin.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionAnalysisRow {
    pub key: i64,
    pub code: String,
    pub name: Option<String>,
    pub tax_per_taxpayer: f64,
    pub shares: Vec<f64>,
    pub bin: usize,
}

pub struct IncomePage {
    pub election_year: i32,
    pub tax: RegionIndicatorTable,
    pub tax_report: IndicatorReport,
    pub summary: Summary,
    pub top: Vec<RankedRegion>,
    pub bottom: Vec<RankedRegion>,
    pub election_report: AggregateReport,
    /// National aggregate of the election file, source of the vote totals.
    pub national: PartyShareTable,
    pub join_report: JoinReport,
    /// Joined rows dropped for a missing indicator or share.
    pub incomplete_rows: usize,
    pub parties: Vec<String>,
    pub rows: Vec<RegionAnalysisRow>,
    pub bins: QuantileBins,
    /// Mean share per bin, one vector per party.
    pub bin_shares: Vec<Vec<Option<f64>>>,
    pub correlations: CorrelationTable,
}

impl IncomePage {
    pub fn build(session: &Session, election_year: i32) -> Result<Self, PageError> {
        let config = session.config();
        let settings = &config.analysis;

        let tax_source = &config.income_tax;
        let tax_table = session.load(&tax_source.path, &tax_source.load)?;
        let (tax, tax_report) =
            RegionIndicatorTable::from_income_tax(&tax_table.frame, &tax_source.columns, None)?;
        let summary = tax.summary(TAX_PER_TAXPAYER).unwrap_or_default();
        let top = tax.top(TAX_PER_TAXPAYER, settings.top_n);
        let bottom = tax.bottom(TAX_PER_TAXPAYER, settings.top_n);

        let elections = &config.elections;
        let election_table = session.load(elections.path_for(election_year), &elections.load)?;
        let (regions, election_report) = ElectionAggregator::aggregate_regions(
            &election_table.frame,
            &elections.columns,
            election_year,
            &elections.region_column,
        )?;

        let (national, _) =
            ElectionAggregator::aggregate_national(&election_table.frame, &elections.columns)?;

        let names = regions.names();
        let party_idx: Vec<Option<usize>> = settings
            .parties
            .iter()
            .map(|p| names.iter().position(|n| n == p))
            .collect();
        let tax_idx = tax.indicators().iter().position(|i| i == TAX_PER_TAXPAYER);

        let (joined, join_report) = inner_join_regions(
            tax.rows().iter().map(|r| (r.code.as_str(), r)),
            regions.rows(),
        );

        let mut incomplete_rows = 0;
        let mut rows = Vec::with_capacity(joined.len());
        for row in joined {
            let indicator = tax_idx.and_then(|idx| row.left.values[idx]);
            let shares: Option<Vec<f64>> = party_idx
                .iter()
                .map(|idx| idx.and_then(|i| row.right.shares[i]))
                .collect();
            match (indicator, shares) {
                (Some(tax_per_taxpayer), Some(shares)) => rows.push(RegionAnalysisRow {
                    key: row.key,
                    code: row.left.code.clone(),
                    name: row.left.name.clone(),
                    tax_per_taxpayer,
                    shares,
                    bin: 0,
                }),
                _ => incomplete_rows += 1,
            }
        }
        if incomplete_rows > 0 {
            warn!(incomplete_rows, "dropped regions with missing values");
        }

        let taxes: Vec<f64> = rows.iter().map(|r| r.tax_per_taxpayer).collect();
        let bins = QuantileBins::fit(&taxes, settings.income_bins)?;
        for (row, bin) in rows.iter_mut().zip(bins.assignments()) {
            row.bin = *bin;
        }

        let party_columns: Vec<(String, Vec<Option<f64>>)> = settings
            .parties
            .iter()
            .enumerate()
            .map(|(p, party)| (party.clone(), rows.iter().map(|r| Some(r.shares[p])).collect()))
            .collect();
        let bin_shares = party_columns
            .iter()
            .map(|(_, column)| bins.mean_by_bin(column))
            .collect::<Result<Vec<_>, _>>()?;
        let indicator: Vec<Option<f64>> = taxes.iter().copied().map(Some).collect();
        let correlations = CorrelationTable::compute(TAX_PER_TAXPAYER, &indicator, &party_columns)?;

        info!(
            election_year,
            tax_year = tax.year,
            regions = rows.len(),
            unmatched = join_report.left_unmatched + join_report.right_unmatched,
            "built income page"
        );

        Ok(Self {
            election_year,
            tax,
            tax_report,
            summary,
            top,
            bottom,
            election_report,
            national,
            join_report,
            incomplete_rows,
            parties: settings.parties.clone(),
            rows,
            bins,
            bin_shares,
            correlations,
        })
    }

    fn summary_frame(&self) -> PolarsResult<DataFrame> {
        let s = &self.summary;
        DataFrame::new(vec![
            Column::new(
                "statistic".into(),
                ["count", "min", "mean", "median", "max", "std"],
            ),
            Column::new(
                TAX_PER_TAXPAYER.into(),
                [s.count as f64, s.min, s.mean, s.median, s.max, s.std],
            ),
        ])
    }

    fn analysis_frame(&self) -> PolarsResult<DataFrame> {
        let codes: Vec<&str> = self.rows.iter().map(|r| r.code.as_str()).collect();
        let names: Vec<Option<&str>> = self.rows.iter().map(|r| r.name.as_deref()).collect();
        let taxes: Vec<f64> = self.rows.iter().map(|r| r.tax_per_taxpayer).collect();
        let bins: Vec<u32> = self.rows.iter().map(|r| r.bin as u32).collect();

        let mut columns = vec![
            Column::new("region_code".into(), codes),
            Column::new("region_name".into(), names),
            Column::new(TAX_PER_TAXPAYER.into(), taxes),
        ];
        for (p, party) in self.parties.iter().enumerate() {
            let shares: Vec<f64> = self.rows.iter().map(|r| r.shares[p]).collect();
            columns.push(Column::new(party.as_str().into(), shares));
        }
        columns.push(Column::new("income_bin".into(), bins));
        DataFrame::new(columns)
    }

    fn bins_frame(&self) -> PolarsResult<DataFrame> {
        let index: Vec<u32> = (0..self.bins.bins() as u32).collect();
        let sizes: Vec<u32> = self.bins.sizes().iter().map(|&s| s as u32).collect();
        let mut columns = vec![
            Column::new("income_bin".into(), index),
            Column::new("regions".into(), sizes),
            Column::new("median_tax_per_taxpayer".into(), self.bins.labels().to_vec()),
        ];
        for (party, means) in self.parties.iter().zip(&self.bin_shares) {
            columns.push(Column::new(party.as_str().into(), means.clone()));
        }
        DataFrame::new(columns)
    }
}

fn ranked_frame(rows: &[RankedRegion]) -> PolarsResult<DataFrame> {
    let codes: Vec<&str> = rows.iter().map(|r| r.code.as_str()).collect();
    let names: Vec<Option<&str>> = rows.iter().map(|r| r.name.as_deref()).collect();
    let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
    DataFrame::new(vec![
        Column::new("region_code".into(), codes),
        Column::new("region_name".into(), names),
        Column::new(TAX_PER_TAXPAYER.into(), values),
    ])
}

#[derive(Serialize)]
struct IncomeDiagnostics<'a> {
    tax_year: i32,
    tax: &'a IndicatorReport,
    summary: &'a Summary,
    top: &'a [RankedRegion],
    bottom: &'a [RankedRegion],
    elections: &'a AggregateReport,
    join: &'a JoinReport,
    incomplete_rows: usize,
    bin_sizes: &'a [usize],
    correlations: &'a CorrelationTable,
}

impl PageTables for IncomePage {
    fn tables(&self) -> PolarsResult<Vec<(String, DataFrame)>> {
        let year = self.election_year;
        Ok(vec![
            ("income_tax".to_string(), self.tax.to_frame()?),
            ("income_tax_summary".to_string(), self.summary_frame()?),
            ("income_tax_top".to_string(), ranked_frame(&self.top)?),
            ("income_tax_bottom".to_string(), ranked_frame(&self.bottom)?),
            (format!("party_votes_{year}"), self.national.votes_frame(year, &self.parties)?),
            (format!("income_regions_{year}"), self.analysis_frame()?),
            (format!("income_bins_{year}"), self.bins_frame()?),
            (format!("correlation_income_{year}"), self.correlations.to_frame()?),
        ])
    }

    fn diagnostics(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(IncomeDiagnostics {
            tax_year: self.tax.year,
            tax: &self.tax_report,
            summary: &self.summary,
            top: &self.top,
            bottom: &self.bottom,
            elections: &self.election_report,
            join: &self.join_report,
            incomplete_rows: self.incomplete_rows,
            bin_sizes: self.bins.sizes(),
            correlations: &self.correlations,
        })
    }
}
