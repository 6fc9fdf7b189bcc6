//! Pipeline Configuration Module
//! Source file locations, their layouts and analysis settings, read from
//! JSON. Every field has a default matching the dashboard's data folder.

use crate::analysis::election::{Composite, ElectionColumns, SHARE_SUM_TOLERANCE};
use crate::analysis::tax::{IncomeTaxColumns, IndicatorColumns};
use crate::data::loader::{LoadOptions, TextEncoding, TrailingColumn};
use crate::data::schema::{ColumnRef, DecimalSeparator, YearRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Municipal election results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionSource {
    pub path: PathBuf,
    /// Files to use instead of `path` for specific election years.
    pub year_paths: BTreeMap<i32, PathBuf>,
    pub load: LoadOptions,
    pub columns: ElectionColumns,
    pub region_column: String,
}

impl Default for ElectionSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from("federal_muni_harm_25.csv"),
            year_paths: BTreeMap::from([(2021, PathBuf::from("federal_muni_harm_21.csv"))]),
            load: LoadOptions::default(),
            columns: ElectionColumns::default(),
            region_column: "county".to_string(),
        }
    }
}

impl ElectionSource {
    pub fn path_for(&self, year: i32) -> &Path {
        self.year_paths.get(&year).unwrap_or(&self.path)
    }
}

/// Annual GDP growth, one row per country and one column per year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GdpSource {
    pub path: PathBuf,
    pub load: LoadOptions,
    pub entity_column: String,
    pub entity_code: String,
    pub decimal: DecimalSeparator,
}

impl Default for GdpSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from("gdp.csv"),
            load: LoadOptions {
                skip_rows: 3,
                trailing_column: TrailingColumn::DropBlank,
                ..Default::default()
            },
            entity_column: "Country Code".to_string(),
            entity_code: "DEU".to_string(),
            decimal: DecimalSeparator::Point,
        }
    }
}

/// Annual unemployment rate export of the federal statistics office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnemploymentSource {
    pub path: PathBuf,
    pub load: LoadOptions,
    pub year_column: ColumnRef,
    pub value_column: ColumnRef,
    pub decimal: DecimalSeparator,
}

impl Default for UnemploymentSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from("unemployment.csv"),
            load: LoadOptions {
                delimiter: ';',
                encoding: TextEncoding::Latin1,
                skip_rows: 1,
                skip_data_rows: 2,
                footer_rows: 132,
                ..Default::default()
            },
            year_column: ColumnRef::Index(0),
            value_column: ColumnRef::Index(5),
            decimal: DecimalSeparator::Comma,
        }
    }
}

/// Income tax statistics by district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeTaxSource {
    pub path: PathBuf,
    pub load: LoadOptions,
    pub columns: IncomeTaxColumns,
}

impl Default for IncomeTaxSource {
    fn default() -> Self {
        let columns = IncomeTaxColumns::default();
        Self {
            path: PathBuf::from("taxationbydistrict.csv"),
            load: LoadOptions {
                delimiter: ';',
                encoding: TextEncoding::Latin1,
                skip_rows: 7,
                column_names: Some(vec![
                    columns.year.clone(),
                    columns.region_code.clone(),
                    columns.region_name.clone(),
                    columns.taxpayer_count.clone(),
                    columns.total_income.clone(),
                    columns.total_tax.clone(),
                ]),
                numeric_columns: vec![
                    columns.taxpayer_count.clone(),
                    columns.total_income.clone(),
                    columns.total_tax.clone(),
                ],
                ..Default::default()
            },
            columns,
        }
    }
}

/// Income per capita by district and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionalIncomeSource {
    pub path: PathBuf,
    pub load: LoadOptions,
    pub columns: IndicatorColumns,
    /// How far the income year may be from the election year.
    pub max_year_distance: u32,
}

impl Default for RegionalIncomeSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sorted_incomes.csv"),
            load: LoadOptions::default(),
            columns: IndicatorColumns::default(),
            max_year_distance: 3,
        }
    }
}

/// Parameters of the page analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub year_range: YearRange,
    pub share_tolerance: f64,
    /// Parties shown and correlated on the economy and income pages.
    pub parties: Vec<String>,
    pub gdp_average_window: u32,
    pub gdp_average_lag: u32,
    pub income_bins: usize,
    pub top_n: usize,
    pub winner_candidates: Vec<String>,
    pub far_left: Composite,
    pub far_right: Composite,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            year_range: YearRange::default(),
            share_tolerance: SHARE_SUM_TOLERANCE,
            parties: strings(&["cdu_csu", "spd", "gruene", "fdp", "linke_pds", "afd"]),
            gdp_average_window: 2,
            gdp_average_lag: 1,
            income_bins: 5,
            top_n: 10,
            winner_candidates: strings(&["cdu_csu", "spd", "gruene", "fdp", "linke_pds", "afd"]),
            far_left: Composite::new("far_left", &["linke_pds"]),
            far_right: Composite::new("far_right", &["afd"]),
        }
    }
}

/// Everything the pipeline needs to find and read its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base directory of relative source paths.
    pub data_dir: PathBuf,
    pub elections: ElectionSource,
    pub gdp: GdpSource,
    pub unemployment: UnemploymentSource,
    pub income_tax: IncomeTaxSource,
    pub regional_income: RegionalIncomeSource,
    pub analysis: AnalysisSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            elections: ElectionSource::default(),
            gdp: GdpSource::default(),
            unemployment: UnemploymentSource::default(),
            income_tax: IncomeTaxSource::default(),
            regional_income: RegionalIncomeSource::default(),
            analysis: AnalysisSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config. Omitted fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The full config as pretty JSON, every default spelled out.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Resolve a source path against `data_dir`; absolute paths are kept.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let analysis = &self.analysis;
        if analysis.income_bins == 0 {
            return Err(ConfigError::Invalid("income_bins must be positive".to_string()));
        }
        if analysis.gdp_average_window == 0 {
            return Err(ConfigError::Invalid(
                "gdp_average_window must be positive".to_string(),
            ));
        }
        if analysis.year_range.min > analysis.year_range.max {
            return Err(ConfigError::Invalid(format!(
                "year range {}..={} is empty",
                analysis.year_range.min, analysis.year_range.max
            )));
        }
        for bloc in [&analysis.far_left, &analysis.far_right] {
            if bloc.members.is_empty() {
                return Err(ConfigError::Invalid(format!("bloc '{}' has no members", bloc.name)));
            }
        }
        Ok(())
    }
}
