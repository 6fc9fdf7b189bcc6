//! Analysis module - vote share aggregation, regional indicators, joins and
//! correlations

pub mod correlation;
pub mod election;
pub mod joiner;
pub mod tax;

pub use correlation::{CorrelationError, CorrelationTable, PartyCorrelation};
pub use election::{
    AggregateError, AggregateReport, Composite, ElectionAggregator, ElectionColumns,
    PartyShareTable, RegionShareTable, RegionWinner,
};
pub use joiner::{
    inner_join_regions, nearest_available_year, normalize_key, JoinError, JoinReport, JoinedRow,
    MergedAnalysisTable,
};
pub use tax::{
    per_unit, BinningError, IncomeTaxColumns, IndicatorColumns, IndicatorReport, QuantileBins,
    RankedRegion, RegionIndicatorTable, RegionIndicators, TaxError,
};
