//! votescope - German election, economy and income-tax data preparation
//!
//! Loads the raw statistics exports, normalizes them into year series and
//! region tables, aggregates municipal election results into vote shares
//! and joins everything into the tables behind the dashboard pages.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod data;
pub mod pages;
pub mod session;
pub mod stats;

pub use config::{ConfigError, PipelineConfig};
pub use pages::{EconomyPage, IncomePage, PageError, PageTables, RegionMapPage};
pub use session::Session;
