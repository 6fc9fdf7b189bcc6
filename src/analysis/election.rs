//! Election Aggregator Module
//! Weighted party vote shares per election year or per region, composite
//! tickets and regional winners.

use crate::data::normalizer::parse_year_cell;
use crate::data::schema::{numeric_values, text_values, DecimalSeparator};
use crate::data::series::{SeriesError, YearSeries};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Allowed gap, in percentage points, between the summed base-party
/// shares of a year and 100.
pub const SHARE_SUM_TOLERANCE: f64 = 0.5;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' not found")]
    MissingColumn(String),
    #[error("Composite '{0}' has no members")]
    EmptyComposite(String),
    #[error("Composite '{composite}' refers to unknown party '{member}'")]
    UnknownMember { composite: String, member: String },
    #[error(transparent)]
    SeriesError(#[from] SeriesError),
}

/// Parties reported separately but analysed as one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Composite {
    pub name: String,
    pub members: Vec<String>,
}

impl Composite {
    pub fn new(name: &str, members: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Column layout of a municipal election results table. Party columns
/// hold the party's fraction of valid votes in the row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionColumns {
    pub year: String,
    pub valid_votes: String,
    /// Multiplier of the row share; the valid-vote column when unset.
    pub weight: Option<String>,
    pub parties: Vec<String>,
    pub composites: Vec<Composite>,
}

impl Default for ElectionColumns {
    fn default() -> Self {
        Self {
            year: "election_year".to_string(),
            valid_votes: "valid_votes".to_string(),
            weight: None,
            parties: ["cdu", "csu", "spd", "gruene", "fdp", "linke_pds", "afd"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            composites: vec![Composite::new("cdu_csu", &["cdu", "csu"])],
        }
    }
}

impl ElectionColumns {
    fn validate(&self) -> Result<(), AggregateError> {
        for composite in &self.composites {
            if composite.members.is_empty() {
                return Err(AggregateError::EmptyComposite(composite.name.clone()));
            }
            if let Some(member) = composite
                .members
                .iter()
                .find(|m| !self.parties.contains(m))
            {
                return Err(AggregateError::UnknownMember {
                    composite: composite.name.clone(),
                    member: member.clone(),
                });
            }
        }
        Ok(())
    }

    fn weight_column(&self) -> &str {
        self.weight.as_deref().unwrap_or(&self.valid_votes)
    }
}

/// Rows left out of an aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    pub rows_read: usize,
    /// Rows without a usable grouping key (year or region).
    pub missing_key: usize,
    /// Rows with zero, negative or missing valid votes or weight.
    pub excluded_rows: usize,
    /// Party cells that were empty in otherwise usable rows.
    pub missing_shares: usize,
}

/// Shares of all parties in one group, in percent. Base parties come
/// first in configured order, composites after them.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupShares {
    pub valid_votes: f64,
    pub rows: usize,
    pub shares: Vec<Option<f64>>,
    /// Absolute votes, `Σ(share × valid_votes)`, in the same order as
    /// `shares`. Independent of the weight column.
    pub votes: Vec<Option<f64>>,
}

/// Per-year national vote shares.
#[derive(Debug, Clone, PartialEq)]
pub struct PartyShareTable {
    parties: Vec<String>,
    composites: Vec<Composite>,
    years: BTreeMap<i32, GroupShares>,
}

/// A year whose base-party shares do not add up to 100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub year: i32,
    pub base_total: f64,
    pub deviation: f64,
}

impl PartyShareTable {
    pub fn base_parties(&self) -> &[String] {
        &self.parties
    }

    pub fn composites(&self) -> &[Composite] {
        &self.composites
    }

    /// Base parties followed by composites.
    pub fn names(&self) -> Vec<String> {
        column_names(&self.parties, &self.composites)
    }

    /// Election years, ascending.
    pub fn years(&self) -> Vec<i32> {
        self.years.keys().copied().collect()
    }

    pub fn group(&self, year: i32) -> Option<&GroupShares> {
        self.years.get(&year)
    }

    /// Share of a base party or composite in percent.
    pub fn share(&self, party: &str, year: i32) -> Option<f64> {
        let idx = self.names().iter().position(|p| p == party)?;
        self.years.get(&year)?.shares[idx]
    }

    /// Absolute votes of a base party or composite in a year.
    pub fn votes(&self, party: &str, year: i32) -> Option<f64> {
        let idx = self.names().iter().position(|p| p == party)?;
        self.years.get(&year)?.votes[idx]
    }

    /// Sum of the base-party shares of a year; composites are not counted.
    pub fn base_total(&self, year: i32) -> Option<f64> {
        let group = self.years.get(&year)?;
        Some(group.shares[..self.parties.len()].iter().flatten().sum())
    }

    /// Years whose base total is further than `tolerance` from 100.
    pub fn reconcile(&self, tolerance: f64) -> Vec<Reconciliation> {
        self.years
            .keys()
            .filter_map(|&year| {
                let base_total = self.base_total(year)?;
                let deviation = base_total - 100.0;
                (deviation.abs() > tolerance).then_some(Reconciliation {
                    year,
                    base_total,
                    deviation,
                })
            })
            .collect()
    }

    /// One party as a year series.
    pub fn series(&self, party: &str) -> Result<YearSeries, AggregateError> {
        let idx = self
            .names()
            .iter()
            .position(|p| p == party)
            .ok_or_else(|| AggregateError::MissingColumn(party.to_string()))?;
        let points = self
            .years
            .iter()
            .map(|(year, group)| (*year, group.shares[idx]));
        Ok(YearSeries::new(party, points)?)
    }

    /// `party`, `votes` and `votes_millions` of one year, in the given
    /// party order. Unknown parties are left out.
    pub fn votes_frame(&self, year: i32, parties: &[String]) -> PolarsResult<DataFrame> {
        let names = self.names();
        let (labels, votes): (Vec<&str>, Vec<Option<f64>>) = parties
            .iter()
            .filter(|p| names.contains(p))
            .map(|p| (p.as_str(), self.votes(p, year)))
            .unzip();
        let millions: Vec<Option<f64>> = votes
            .iter()
            .map(|v| v.map(|v| (v / 10_000.0).round() / 100.0))
            .collect();
        DataFrame::new(vec![
            Column::new("party".into(), labels),
            Column::new("votes".into(), votes),
            Column::new("votes_millions".into(), millions),
        ])
    }

    /// `election_year`, `valid_votes` and one column per party.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let years: Vec<i32> = self.years();
        let valid: Vec<f64> = self.years.values().map(|g| g.valid_votes).collect();
        let mut columns = vec![
            Column::new("election_year".into(), years),
            Column::new("valid_votes".into(), valid),
        ];
        for (idx, name) in self.names().iter().enumerate() {
            let values: Vec<Option<f64>> = self.years.values().map(|g| g.shares[idx]).collect();
            columns.push(Column::new(name.as_str().into(), values));
        }
        DataFrame::new(columns)
    }
}

/// Party shares per region for a single election year.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionShareTable {
    pub year: i32,
    pub region_column: String,
    parties: Vec<String>,
    composites: Vec<Composite>,
    regions: BTreeMap<String, GroupShares>,
}

/// The leading party of a region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionWinner {
    pub region: String,
    pub party: String,
    pub share: f64,
}

impl RegionShareTable {
    pub fn names(&self) -> Vec<String> {
        column_names(&self.parties, &self.composites)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Regions in code order with their shares.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &GroupShares)> {
        self.regions.iter().map(|(code, group)| (code.as_str(), group))
    }

    pub fn share(&self, party: &str, region: &str) -> Option<f64> {
        let idx = self.names().iter().position(|p| p == party)?;
        self.regions.get(region)?.shares[idx]
    }

    pub fn votes(&self, party: &str, region: &str) -> Option<f64> {
        let idx = self.names().iter().position(|p| p == party)?;
        self.regions.get(region)?.votes[idx]
    }

    /// The candidate with the highest share in each region. Ties go to the
    /// candidate listed first; regions where no candidate has a share are
    /// left out.
    pub fn winners(&self, candidates: &[String]) -> Vec<RegionWinner> {
        let names = self.names();
        let indices: Vec<(usize, &String)> = candidates
            .iter()
            .filter_map(|c| names.iter().position(|n| n == c).map(|idx| (idx, c)))
            .collect();

        self.regions
            .iter()
            .filter_map(|(region, group)| {
                let mut best: Option<(&String, f64)> = None;
                for (idx, party) in &indices {
                    if let Some(share) = group.shares[*idx] {
                        if best.map_or(true, |(_, top)| share > top) {
                            best = Some((party, share));
                        }
                    }
                }
                best.map(|(party, share)| RegionWinner {
                    region: region.clone(),
                    party: party.clone(),
                    share,
                })
            })
            .collect()
    }

    /// Region code, valid votes and one column per party.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let codes: Vec<&str> = self.regions.keys().map(String::as_str).collect();
        let valid: Vec<f64> = self.regions.values().map(|g| g.valid_votes).collect();
        let mut columns = vec![
            Column::new(self.region_column.as_str().into(), codes),
            Column::new("valid_votes".into(), valid),
        ];
        for (idx, name) in self.names().iter().enumerate() {
            let values: Vec<Option<f64>> =
                self.regions.values().map(|g| g.shares[idx]).collect();
            columns.push(Column::new(name.as_str().into(), values));
        }
        DataFrame::new(columns)
    }
}

/// Computes weighted vote shares from municipal result rows.
pub struct ElectionAggregator;

impl ElectionAggregator {
    /// National share of every party per election year:
    /// `Σ(share × weight) / Σ valid_votes × 100`.
    pub fn aggregate_national(
        df: &DataFrame,
        columns: &ElectionColumns,
    ) -> Result<(PartyShareTable, AggregateReport), AggregateError> {
        columns.validate()?;
        let inputs = Inputs::read(df, columns)?;
        let mut report = AggregateReport {
            rows_read: inputs.len(),
            ..Default::default()
        };

        let mut keyed = Vec::with_capacity(inputs.len());
        for (row, year) in inputs.years.iter().enumerate() {
            match year {
                Some(year) => keyed.push((row, *year)),
                None => report.missing_key += 1,
            }
        }

        let years = accumulate(&inputs, keyed, &mut report, columns);
        let table = PartyShareTable {
            parties: columns.parties.clone(),
            composites: columns.composites.clone(),
            years,
        };

        info!(
            years = table.years.len(),
            rows = report.rows_read,
            excluded = report.excluded_rows,
            missing_key = report.missing_key,
            "aggregated national vote shares"
        );
        for gap in table.reconcile(SHARE_SUM_TOLERANCE) {
            warn!(
                year = gap.year,
                base_total = gap.base_total,
                "base party shares do not reconcile with 100%"
            );
        }
        Ok((table, report))
    }

    /// Shares per region for one election year, using the same weighting
    /// as the national aggregate. Rows of other years are ignored.
    pub fn aggregate_regions(
        df: &DataFrame,
        columns: &ElectionColumns,
        year: i32,
        region_column: &str,
    ) -> Result<(RegionShareTable, AggregateReport), AggregateError> {
        columns.validate()?;
        let inputs = Inputs::read(df, columns)?;
        let regions = text_values(
            df.column(region_column)
                .map_err(|_| AggregateError::MissingColumn(region_column.to_string()))?,
        )?;

        let mut report = AggregateReport::default();
        let mut keyed = Vec::new();
        for (row, row_year) in inputs.years.iter().enumerate() {
            if *row_year != Some(year) {
                continue;
            }
            report.rows_read += 1;
            match &regions[row] {
                Some(code) => keyed.push((row, code.clone())),
                None => report.missing_key += 1,
            }
        }

        let regions = accumulate(&inputs, keyed, &mut report, columns);
        debug!(
            year,
            regions = regions.len(),
            rows = report.rows_read,
            excluded = report.excluded_rows,
            "aggregated regional vote shares"
        );

        Ok((
            RegionShareTable {
                year,
                region_column: region_column.to_string(),
                parties: columns.parties.clone(),
                composites: columns.composites.clone(),
                regions,
            },
            report,
        ))
    }
}

struct Inputs {
    years: Vec<Option<i32>>,
    valid: Vec<Option<f64>>,
    weight: Vec<Option<f64>>,
    shares: Vec<Vec<Option<f64>>>,
}

impl Inputs {
    fn read(df: &DataFrame, columns: &ElectionColumns) -> Result<Self, AggregateError> {
        let column = |name: &str| {
            df.column(name)
                .map_err(|_| AggregateError::MissingColumn(name.to_string()))
        };

        let years = text_values(column(&columns.year)?)?
            .into_iter()
            .map(|cell| cell.as_deref().and_then(parse_year_cell))
            .collect();
        let valid = numeric_values(column(&columns.valid_votes)?, DecimalSeparator::Point)?;
        let weight = numeric_values(column(columns.weight_column())?, DecimalSeparator::Point)?;
        let shares = columns
            .parties
            .iter()
            .map(|party| Ok(numeric_values(column(party)?, DecimalSeparator::Point)?))
            .collect::<Result<Vec<_>, AggregateError>>()?;

        Ok(Self {
            years,
            valid,
            weight,
            shares,
        })
    }

    fn len(&self) -> usize {
        self.years.len()
    }
}

fn accumulate<K: Ord>(
    inputs: &Inputs,
    rows: Vec<(usize, K)>,
    report: &mut AggregateReport,
    columns: &ElectionColumns,
) -> BTreeMap<K, GroupShares> {
    struct Acc {
        valid: f64,
        rows: usize,
        weighted: Vec<f64>,
        votes: Vec<f64>,
        contributed: Vec<bool>,
    }

    let n_parties = inputs.shares.len();
    let mut groups: BTreeMap<K, Acc> = BTreeMap::new();

    for (row, key) in rows {
        let (Some(valid), Some(weight)) = (inputs.valid[row], inputs.weight[row]) else {
            report.excluded_rows += 1;
            continue;
        };
        if valid <= 0.0 || weight < 0.0 {
            report.excluded_rows += 1;
            continue;
        }

        let acc = groups.entry(key).or_insert_with(|| Acc {
            valid: 0.0,
            rows: 0,
            weighted: vec![0.0; n_parties],
            votes: vec![0.0; n_parties],
            contributed: vec![false; n_parties],
        });
        acc.valid += valid;
        acc.rows += 1;
        for (p, shares) in inputs.shares.iter().enumerate() {
            match shares[row] {
                Some(share) => {
                    acc.weighted[p] += share * weight;
                    acc.votes[p] += share * valid;
                    acc.contributed[p] = true;
                }
                None => report.missing_shares += 1,
            }
        }
    }

    groups
        .into_iter()
        .map(|(key, acc)| {
            let mut shares: Vec<Option<f64>> = acc
                .weighted
                .iter()
                .zip(&acc.contributed)
                .map(|(sum, seen)| seen.then(|| sum / acc.valid * 100.0))
                .collect();
            let composite_shares: Vec<Option<f64>> = columns
                .composites
                .iter()
                .map(|c| composite_sum(c, &columns.parties, &shares))
                .collect();
            shares.extend(composite_shares);

            let mut votes: Vec<Option<f64>> = acc
                .votes
                .iter()
                .zip(&acc.contributed)
                .map(|(sum, seen)| seen.then_some(*sum))
                .collect();
            let composite_votes: Vec<Option<f64>> = columns
                .composites
                .iter()
                .map(|c| composite_sum(c, &columns.parties, &votes))
                .collect();
            votes.extend(composite_votes);

            (
                key,
                GroupShares {
                    valid_votes: acc.valid,
                    rows: acc.rows,
                    shares,
                    votes,
                },
            )
        })
        .collect()
}

/// Sum of the members' aggregated values. A member without a value counts
/// as zero unless no member has one.
fn composite_sum(
    composite: &Composite,
    parties: &[String],
    values: &[Option<f64>],
) -> Option<f64> {
    let members: Vec<f64> = composite
        .members
        .iter()
        .filter_map(|m| parties.iter().position(|p| p == m))
        .filter_map(|idx| values[idx])
        .collect();
    (!members.is_empty()).then(|| members.iter().sum())
}

fn column_names(parties: &[String], composites: &[Composite]) -> Vec<String> {
    parties
        .iter()
        .cloned()
        .chain(composites.iter().map(|c| c.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(parties: &[&str], composites: Vec<Composite>) -> ElectionColumns {
        ElectionColumns {
            parties: parties.iter().map(|p| p.to_string()).collect(),
            composites,
            ..Default::default()
        }
    }

    fn results() -> DataFrame {
        DataFrame::new(vec![
            Column::new(
                "election_year".into(),
                ["2017", "2017", "2021", "2021", "2021", "x"],
            ),
            Column::new(
                "county".into(),
                ["01001", "09162", "01001", "01001", "09162", "09162"],
            ),
            Column::new(
                "valid_votes".into(),
                [200.0, 800.0, 100.0, 0.0, 300.0, 50.0],
            ),
            Column::new(
                "total_votes".into(),
                [210.0, 820.0, 104.0, 5.0, 306.0, 51.0],
            ),
            Column::new("cdu".into(), [Some(0.4), None, Some(0.5), Some(0.9), None, Some(0.2)]),
            Column::new("csu".into(), [None, Some(0.5), None, None, Some(0.3), Some(0.2)]),
            Column::new(
                "spd".into(),
                [Some(0.6), Some(0.5), Some(0.5), Some(0.1), Some(0.7), Some(0.6)],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_national_share_worked_example() {
        let df = DataFrame::new(vec![
            Column::new("election_year".into(), [2021i32, 2021]),
            Column::new("valid_votes".into(), [100.0, 300.0]),
            Column::new("x".into(), [0.50, 0.30]),
            Column::new("y".into(), [0.50, 0.70]),
        ])
        .unwrap();

        let (table, report) =
            ElectionAggregator::aggregate_national(&df, &columns(&["x", "y"], vec![])).unwrap();

        assert!((table.share("x", 2021).unwrap() - 35.0).abs() < 1e-9);
        assert!((table.share("y", 2021).unwrap() - 65.0).abs() < 1e-9);
        assert_eq!(report.excluded_rows, 0);
    }

    #[test]
    fn test_zero_valid_votes_and_bad_years_are_excluded() {
        let (table, report) = ElectionAggregator::aggregate_national(
            &results(),
            &columns(&["cdu", "csu", "spd"], vec![]),
        )
        .unwrap();

        assert_eq!(table.years(), vec![2017, 2021]);
        assert_eq!(report.rows_read, 6);
        assert_eq!(report.missing_key, 1);
        assert_eq!(report.excluded_rows, 1);

        let group = table.group(2021).unwrap();
        assert_eq!(group.rows, 2);
        assert_eq!(group.valid_votes, 400.0);
        // (0.5 * 100) / 400 and (0.3 * 300) / 400
        assert!((table.share("cdu", 2021).unwrap() - 12.5).abs() < 1e-9);
        assert!((table.share("csu", 2021).unwrap() - 22.5).abs() < 1e-9);
        assert!((table.share("spd", 2021).unwrap() - 65.0).abs() < 1e-9);
    }

    #[test]
    fn test_base_shares_reconcile_and_composites_are_exact_sums() {
        let (table, _) = ElectionAggregator::aggregate_national(
            &results(),
            &columns(
                &["cdu", "csu", "spd"],
                vec![Composite::new("cdu_csu", &["cdu", "csu"])],
            ),
        )
        .unwrap();

        for year in table.years() {
            let total = table.base_total(year).unwrap();
            assert!((total - 100.0).abs() <= SHARE_SUM_TOLERANCE, "{year}: {total}");
            assert_eq!(
                table.share("cdu_csu", year).unwrap(),
                table.share("cdu", year).unwrap() + table.share("csu", year).unwrap()
            );
        }
        assert!(table.reconcile(SHARE_SUM_TOLERANCE).is_empty());
    }

    #[test]
    fn test_reconcile_flags_incomplete_party_lists() {
        let (table, _) =
            ElectionAggregator::aggregate_national(&results(), &columns(&["spd"], vec![]))
                .unwrap();

        let gaps = table.reconcile(SHARE_SUM_TOLERANCE);
        assert_eq!(gaps.iter().map(|g| g.year).collect::<Vec<_>>(), vec![2017, 2021]);
        assert!(gaps.iter().all(|g| g.deviation < 0.0));
    }

    #[test]
    fn test_weight_column_can_differ_from_valid_votes() {
        let df = DataFrame::new(vec![
            Column::new("election_year".into(), ["2021"]),
            Column::new("valid_votes".into(), [100.0]),
            Column::new("total_votes".into(), [110.0]),
            Column::new("x".into(), [0.5]),
        ])
        .unwrap();
        let mut cols = columns(&["x"], vec![]);
        cols.weight = Some("total_votes".to_string());

        let (table, _) = ElectionAggregator::aggregate_national(&df, &cols).unwrap();

        assert!((table.share("x", 2021).unwrap() - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_party_without_contributions_has_no_share() {
        let df = DataFrame::new(vec![
            Column::new("election_year".into(), ["2009", "2021"]),
            Column::new("valid_votes".into(), [100.0, 100.0]),
            Column::new("afd".into(), [None, Some(0.1)]),
        ])
        .unwrap();

        let (table, report) =
            ElectionAggregator::aggregate_national(&df, &columns(&["afd"], vec![])).unwrap();

        assert_eq!(table.share("afd", 2009), None);
        assert!((table.share("afd", 2021).unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(report.missing_shares, 1);

        let series = table.series("afd").unwrap();
        assert_eq!(series.points()[0], (2009, None));
    }

    #[test]
    fn test_invalid_composites_are_rejected() {
        let empty = ElectionAggregator::aggregate_national(
            &results(),
            &columns(&["cdu"], vec![Composite::new("none", &[])]),
        );
        assert!(matches!(empty, Err(AggregateError::EmptyComposite(_))));

        let unknown = ElectionAggregator::aggregate_national(
            &results(),
            &columns(&["cdu"], vec![Composite::new("cdu_csu", &["cdu", "csu"])]),
        );
        assert!(matches!(unknown, Err(AggregateError::UnknownMember { .. })));

        let missing =
            ElectionAggregator::aggregate_national(&results(), &columns(&["npd"], vec![]));
        assert!(matches!(missing, Err(AggregateError::MissingColumn(_))));
    }

    #[test]
    fn test_regional_shares_and_winners() {
        let cols = columns(
            &["cdu", "csu", "spd"],
            vec![Composite::new("cdu_csu", &["cdu", "csu"])],
        );
        let (table, report) =
            ElectionAggregator::aggregate_regions(&results(), &cols, 2021, "county").unwrap();

        assert_eq!(report.rows_read, 3);
        assert_eq!(report.excluded_rows, 1);
        assert_eq!(table.len(), 2);

        // CSU does not run in 01001, the ticket falls back to CDU alone.
        assert_eq!(table.share("csu", "01001"), None);
        assert!((table.share("cdu_csu", "01001").unwrap() - 50.0).abs() < 1e-9);
        assert!((table.share("cdu_csu", "09162").unwrap() - 30.0).abs() < 1e-9);

        let candidates = vec!["cdu_csu".to_string(), "spd".to_string()];
        let winners = table.winners(&candidates);
        assert_eq!(winners.len(), 2);
        // 50/50 tie in 01001 goes to the first candidate
        assert_eq!(winners[0].region, "01001");
        assert_eq!(winners[0].party, "cdu_csu");
        assert_eq!(winners[1].party, "spd");
        assert!((winners[1].share - 70.0).abs() < 1e-9);

        let frame = table.to_frame().unwrap();
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.width(), 2 + 4);
    }

    #[test]
    fn test_votes_are_share_times_valid_votes() {
        let cols = columns(
            &["cdu", "csu", "spd"],
            vec![Composite::new("cdu_csu", &["cdu", "csu"])],
        );
        let (table, _) = ElectionAggregator::aggregate_national(&results(), &cols).unwrap();

        // 2017: 0.4 * 200 for cdu, 0.5 * 800 for csu, 0.6 * 200 + 0.5 * 800 for spd
        assert!((table.votes("cdu", 2017).unwrap() - 80.0).abs() < 1e-9);
        assert!((table.votes("csu", 2017).unwrap() - 400.0).abs() < 1e-9);
        assert!((table.votes("spd", 2017).unwrap() - 520.0).abs() < 1e-9);
        // the zero-vote row of 2021 adds nothing
        assert!((table.votes("spd", 2021).unwrap() - 260.0).abs() < 1e-9);
        assert_eq!(table.votes("npd", 2021), None);

        for year in table.years() {
            let members = table.votes("cdu", year).unwrap() + table.votes("csu", year).unwrap();
            assert!((table.votes("cdu_csu", year).unwrap() - members).abs() < 1e-9);
        }

        let (regions, _) =
            ElectionAggregator::aggregate_regions(&results(), &cols, 2021, "county").unwrap();
        assert!((regions.votes("cdu_csu", "01001").unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(regions.votes("csu", "01001"), None);
    }

    #[test]
    fn test_votes_ignore_the_weight_column() {
        let df = DataFrame::new(vec![
            Column::new("election_year".into(), ["2021", "2021"]),
            Column::new("valid_votes".into(), [100.0, 300.0]),
            Column::new("total_votes".into(), [110.0, 330.0]),
            Column::new("x".into(), [0.5, 0.3]),
        ])
        .unwrap();
        let mut cols = columns(&["x"], vec![]);
        cols.weight = Some("total_votes".to_string());

        let (table, _) = ElectionAggregator::aggregate_national(&df, &cols).unwrap();

        assert!((table.votes("x", 2021).unwrap() - 140.0).abs() < 1e-9);

        let parties = vec!["x".to_string(), "y".to_string()];
        let frame = table.votes_frame(2021, &parties).unwrap();
        assert_eq!(frame.height(), 1);
        let millions = frame.column("votes_millions").unwrap().f64().unwrap().get(0);
        assert_eq!(millions, Some(0.0));
    }

    #[test]
    fn test_share_frame_is_sorted_by_year() {
        let (table, _) = ElectionAggregator::aggregate_national(
            &results(),
            &columns(&["cdu", "csu", "spd"], vec![]),
        )
        .unwrap();
        let frame = table.to_frame().unwrap();

        let years: Vec<Option<i32>> = frame
            .column("election_year")
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(years, vec![Some(2017), Some(2021)]);
    }
}
