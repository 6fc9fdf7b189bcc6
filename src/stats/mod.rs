//! Stats module - descriptive statistics and correlation tests

mod calculator;

pub use calculator::{Correlation, StatsCalculator, Summary, SIGNIFICANCE_THRESHOLD};
