//! Pages module - the tables behind each dashboard page

mod economy;
mod income;
mod maps;

pub use economy::EconomyPage;
pub use income::{IncomePage, RegionAnalysisRow};
pub use maps::{RegionMapPage, RegionMapRow};

use crate::analysis::{AggregateError, BinningError, CorrelationError, JoinError, TaxError};
use crate::data::{LoaderError, NormalizeError};
use polars::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error(transparent)]
    Load(#[from] LoaderError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Tax(#[from] TaxError),
    #[error(transparent)]
    Binning(#[from] BinningError),
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Correlation(#[from] CorrelationError),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// A page's output tables, each with a file-friendly name.
pub trait PageTables {
    fn tables(&self) -> PolarsResult<Vec<(String, DataFrame)>>;

    /// Drop counts and statistics of the build as JSON.
    fn diagnostics(&self) -> serde_json::Result<serde_json::Value>;
}
