//! Data module - loading, schema detection and series normalization

pub mod loader;
pub mod normalizer;
pub mod schema;
pub mod series;

pub use loader::{load_bytes, load_table, LoadOptions, LoadReport, LoadedTable, LoaderError};
pub use normalizer::{EntitySelector, NormalizeError, NormalizeReport, SeriesNormalizer};
pub use schema::{ColumnRef, DecimalSeparator, YearRange};
pub use series::{SeriesError, YearSeries};
