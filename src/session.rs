//! Session Module
//! Owns the configuration and the memo of loaded source tables.

use crate::cache::Memo;
use crate::config::PipelineConfig;
use crate::data::loader::{load_table, LoadOptions, LoadReport, LoadedTable, LoaderError};
use crate::pages::{EconomyPage, IncomePage, PageError, RegionMapPage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point for the pages: every source file is read once per
/// `(path, options)` until [`Session::clear_cache`].
pub struct Session {
    config: PipelineConfig,
    tables: Memo<(PathBuf, LoadOptions), LoadedTable>,
}

impl Session {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            tables: Memo::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load a source relative to the data directory, or return the copy
    /// loaded earlier with the same options.
    pub fn load(
        &self,
        path: &Path,
        options: &LoadOptions,
    ) -> Result<Arc<LoadedTable>, LoaderError> {
        let path = self.config.resolve(path);
        let key = (path, options.clone());
        if let Some(table) = self.tables.get(&key) {
            debug!(path = %key.0.display(), "using cached table");
            return Ok(table);
        }
        self.tables
            .get_or_try_insert_with(&key, || load_table(&key.0, options))
    }

    pub fn cached_tables(&self) -> usize {
        self.tables.len()
    }

    /// Diagnostics of every cached load, sorted by path.
    pub fn load_reports(&self) -> Vec<(PathBuf, LoadReport)> {
        let mut reports: Vec<(PathBuf, LoadReport)> = self
            .tables
            .snapshot()
            .into_iter()
            .map(|((path, _), table)| (path, table.report.clone()))
            .collect();
        reports.sort_by(|a, b| a.0.cmp(&b.0));
        reports
    }

    pub fn clear_cache(&self) {
        info!(tables = self.tables.len(), "clearing table cache");
        self.tables.clear();
    }

    pub fn economy_page(&self) -> Result<EconomyPage, PageError> {
        EconomyPage::build(self)
    }

    pub fn income_page(&self, year: i32) -> Result<IncomePage, PageError> {
        IncomePage::build(self, year)
    }

    pub fn map_page(&self, year: i32) -> Result<RegionMapPage, PageError> {
        RegionMapPage::build(self, year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_tables_are_loaded_once_until_cleared() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a.csv"), "year,value\n2020,1\n")?;

        let session = Session::new(PipelineConfig::default().with_data_dir(dir.path()));
        let options = LoadOptions::default();

        let first = session.load(Path::new("a.csv"), &options)?;
        fs::write(dir.path().join("a.csv"), "year,value\n2020,1\n2021,2\n")?;
        let second = session.load(Path::new("a.csv"), &options)?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.frame.height(), 1);

        let semicolon = LoadOptions {
            delimiter: ';',
            ..Default::default()
        };
        session.load(Path::new("a.csv"), &semicolon)?;
        assert_eq!(session.cached_tables(), 2);

        session.clear_cache();
        assert_eq!(session.cached_tables(), 0);
        let reloaded = session.load(Path::new("a.csv"), &options)?;
        assert_eq!(reloaded.frame.height(), 2);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_not_cached() {
        let session = Session::new(PipelineConfig::default().with_data_dir("/nonexistent"));
        let result = session.load(Path::new("gdp.csv"), &LoadOptions::default());
        assert!(matches!(result, Err(LoaderError::Io { .. })));
        assert_eq!(session.cached_tables(), 0);
    }
}
