//! votescope - headless runner for the dashboard pages
//!
//! Builds the page tables from the raw data folder and prints them or
//! writes them as CSV files, optionally with a JSON run report.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polars::prelude::*;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use votescope::{PageTables, PipelineConfig, Session};

#[derive(Parser)]
#[command(name = "votescope")]
#[command(about = "German elections, economy and income-tax data preparation")]
#[command(version)]
struct Cli {
    /// JSON pipeline configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the source files
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Write every table as CSV here instead of printing it
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Write row diagnostics and statistics of the run as JSON
    #[arg(long)]
    report: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GDP growth, unemployment and national vote shares
    Economy,
    /// Income tax by district against county vote shares
    Income {
        #[arg(long, default_value_t = 2021)]
        year: i32,
    },
    /// County winners, bloc shares and income
    Maps {
        #[arg(long, default_value_t = 2021)]
        year: i32,
    },
    /// Every page for one election year
    All {
        #[arg(long, default_value_t = 2021)]
        year: i32,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config = config.with_data_dir(data_dir);
    }
    info!(data_dir = %config.data_dir.display(), "starting");

    if let Commands::Config = cli.command {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    let session = Session::new(config);
    let mut pages: Vec<(&str, Box<dyn PageTables>)> = Vec::new();
    match cli.command {
        Commands::Economy => pages.push(("economy", economy(&session)?)),
        Commands::Income { year } => pages.push(("income", income(&session, year)?)),
        Commands::Maps { year } => pages.push(("maps", maps(&session, year)?)),
        Commands::All { year } => {
            pages.push(("economy", economy(&session)?));
            pages.push(("income", income(&session, year)?));
            pages.push(("maps", maps(&session, year)?));
        }
        Commands::Config => {}
    }

    let mut tables = Vec::new();
    for (_, page) in &pages {
        tables.extend(page.tables()?);
    }

    match &cli.out_dir {
        Some(dir) => write_tables(dir, tables)?,
        None => {
            for (name, df) in tables {
                println!("── {name} ──");
                println!("{df}");
            }
        }
    }

    if let Some(path) = &cli.report {
        write_report(path, &session, &pages)?;
    }
    Ok(())
}

fn economy(session: &Session) -> Result<Box<dyn PageTables>> {
    Ok(Box::new(session.economy_page().context("Economy page failed")?))
}

fn income(session: &Session, year: i32) -> Result<Box<dyn PageTables>> {
    let page = session
        .income_page(year)
        .with_context(|| format!("Income page for {year} failed"))?;
    Ok(Box::new(page))
}

fn maps(session: &Session, year: i32) -> Result<Box<dyn PageTables>> {
    let page = session
        .map_page(year)
        .with_context(|| format!("Map page for {year} failed"))?;
    Ok(Box::new(page))
}

/// Load diagnostics of every source plus each page's own report.
fn write_report(
    path: &Path,
    session: &Session,
    pages: &[(&str, Box<dyn PageTables>)],
) -> Result<()> {
    let mut report = serde_json::Map::new();
    let loads: Vec<serde_json::Value> = session
        .load_reports()
        .into_iter()
        .map(|(source, load)| {
            serde_json::json!({ "path": source.display().to_string(), "report": load })
        })
        .collect();
    report.insert("loads".to_string(), serde_json::Value::Array(loads));
    for (name, page) in pages {
        report.insert(name.to_string(), page.diagnostics()?);
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create '{}'", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    info!(path = %path.display(), "wrote run report");
    Ok(())
}

fn write_tables(dir: &Path, tables: Vec<(String, DataFrame)>) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory '{}'", dir.display()))?;
    for (name, mut df) in tables {
        let path = dir.join(format!("{name}.csv"));
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        CsvWriter::new(&mut file)
            .finish(&mut df)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        info!(path = %path.display(), rows = df.height(), "wrote table");
    }
    Ok(())
}
