//! Regional Map Page
//! Per-county winners, bloc shares and income for one election year.

use super::{PageError, PageTables};
use crate::analysis::election::{AggregateReport, ElectionAggregator, RegionShareTable};
use crate::analysis::joiner::{inner_join_regions, nearest_available_year, JoinReport};
use crate::analysis::tax::RegionIndicatorTable;
use crate::session::Session;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// One county on the maps.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMapRow {
    pub region: String,
    pub winner: Option<String>,
    pub winner_share: Option<f64>,
    pub far_left: Option<f64>,
    pub far_right: Option<f64>,
    pub income: Option<f64>,
}

pub struct RegionMapPage {
    pub election_year: i32,
    pub shares: RegionShareTable,
    pub election_report: AggregateReport,
    /// Income year used, `None` when no year lies within the allowed distance.
    pub income_year: Option<i32>,
    pub income: Option<RegionIndicatorTable>,
    pub income_join: Option<JoinReport>,
    pub rows: Vec<RegionMapRow>,
}

impl RegionMapPage {
    pub fn build(session: &Session, election_year: i32) -> Result<Self, PageError> {
        let config = session.config();
        let settings = &config.analysis;

        let elections = &config.elections;
        let mut columns = elections.columns.clone();
        for bloc in [&settings.far_left, &settings.far_right] {
            if !columns.composites.iter().any(|c| c.name == bloc.name) {
                columns.composites.push(bloc.clone());
            }
        }
        let election_table = session.load(elections.path_for(election_year), &elections.load)?;
        let (shares, election_report) = ElectionAggregator::aggregate_regions(
            &election_table.frame,
            &columns,
            election_year,
            &elections.region_column,
        )?;

        let winners: HashMap<String, (String, f64)> = shares
            .winners(&settings.winner_candidates)
            .into_iter()
            .map(|w| (w.region, (w.party, w.share)))
            .collect();

        let income_source = &config.regional_income;
        let income_table = session.load(&income_source.path, &income_source.load)?;
        let available = RegionIndicatorTable::available_years(
            &income_table.frame,
            &income_source.columns.year,
        )?;
        let income_year = nearest_available_year(
            election_year,
            &available,
            income_source.max_year_distance,
        );

        let mut income_by_region: HashMap<String, f64> = HashMap::new();
        let (income, income_join) = match income_year {
            Some(year) => {
                let (table, _) = RegionIndicatorTable::from_columns(
                    &income_table.frame,
                    &income_source.columns,
                    year,
                )?;
                let (joined, report) = inner_join_regions(
                    shares.rows().map(|(region, _)| (region, region)),
                    table.rows().iter().map(|r| (r.code.as_str(), r)),
                );
                for row in joined {
                    if let Some(value) = row.right.values.first().copied().flatten() {
                        income_by_region.insert(row.left.to_string(), value);
                    }
                }
                (Some(table), Some(report))
            }
            None => {
                warn!(
                    election_year,
                    max_distance = income_source.max_year_distance,
                    "no income data near the election year"
                );
                (None, None)
            }
        };

        let rows: Vec<RegionMapRow> = shares
            .rows()
            .map(|(region, _)| {
                let winner = winners.get(region);
                RegionMapRow {
                    region: region.to_string(),
                    winner: winner.map(|(party, _)| party.clone()),
                    winner_share: winner.map(|(_, share)| *share),
                    far_left: shares.share(&settings.far_left.name, region),
                    far_right: shares.share(&settings.far_right.name, region),
                    income: income_by_region.get(region).copied(),
                }
            })
            .collect();

        info!(
            election_year,
            regions = rows.len(),
            income_year = income_year.unwrap_or_default(),
            "built map page"
        );

        Ok(Self {
            election_year,
            shares,
            election_report,
            income_year,
            income,
            income_join,
            rows,
        })
    }

    fn map_frame(&self) -> PolarsResult<DataFrame> {
        let regions: Vec<&str> = self.rows.iter().map(|r| r.region.as_str()).collect();
        let winners: Vec<Option<&str>> = self.rows.iter().map(|r| r.winner.as_deref()).collect();
        let pick = |f: fn(&RegionMapRow) -> Option<f64>| -> Vec<Option<f64>> {
            self.rows.iter().map(f).collect()
        };
        DataFrame::new(vec![
            Column::new(self.shares.region_column.as_str().into(), regions),
            Column::new("winner".into(), winners),
            Column::new("winner_share".into(), pick(|r| r.winner_share)),
            Column::new("far_left".into(), pick(|r| r.far_left)),
            Column::new("far_right".into(), pick(|r| r.far_right)),
            Column::new("income".into(), pick(|r| r.income)),
        ])
    }
}

#[derive(Serialize)]
struct MapDiagnostics<'a> {
    elections: &'a AggregateReport,
    regions: usize,
    regions_without_winner: usize,
    income_year: Option<i32>,
    income_join: Option<&'a JoinReport>,
}

impl PageTables for RegionMapPage {
    fn tables(&self) -> PolarsResult<Vec<(String, DataFrame)>> {
        let year = self.election_year;
        let mut tables = vec![
            (format!("region_shares_{year}"), self.shares.to_frame()?),
            (format!("region_map_{year}"), self.map_frame()?),
        ];
        if let (Some(income), Some(income_year)) = (&self.income, self.income_year) {
            tables.push((format!("region_income_{income_year}"), income.to_frame()?));
        }
        Ok(tables)
    }

    fn diagnostics(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(MapDiagnostics {
            elections: &self.election_report,
            regions: self.rows.len(),
            regions_without_winner: self.rows.iter().filter(|r| r.winner.is_none()).count(),
            income_year: self.income_year,
            income_join: self.income_join.as_ref(),
        })
    }
}
