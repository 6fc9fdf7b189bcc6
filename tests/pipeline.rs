//! End-to-end runs of the three pages over a small data folder.

use anyhow::Result;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use votescope::analysis::tax::TAX_PER_TAXPAYER;
use votescope::{PageTables, PipelineConfig, Session};

const ELECTIONS: &str = "\
election_year,ags,county,valid_votes,total_votes,cdu,csu,spd,gruene,fdp,linke_pds,afd
2013,01001000,01001,1000,1010,0.40,,0.30,0.10,0.10,0.05,0.05
2013,09162000,09162,2000,2020,,0.50,0.20,0.10,0.10,0.05,0.05
2013,05315000,05315,1000,1010,0.38,,0.32,0.10,0.10,0.05,0.05
2017,01001000,01001,1000,1010,0.33,,0.25,0.12,0.10,0.08,0.12
2017,09162000,09162,2000,2020,,0.40,0.18,0.15,0.10,0.07,0.10
2017,05315000,05315,1000,1010,0.30,,0.28,0.14,0.10,0.08,0.10
2021,01001000,01001,1000,1010,0.25,,0.30,0.15,0.10,0.05,0.15
2021,09162000,09162,2000,2020,,0.30,0.20,0.25,0.10,0.05,0.10
2021,05315000,05315,1000,1010,0.20,,0.30,0.20,0.10,0.10,0.10
2021,03241001,03241,1000,1010,0.30,,0.35,0.10,0.10,0.05,0.10
2021,01002000,01002,0,0,0.30,,0.35,0.10,0.10,0.05,0.10
";

const GDP: &str = "\
\"Data Source\",\"World Development Indicators\",
,
\"Last Updated Date\",\"2024-06-28\",
\"Country Name\",\"Country Code\",\"Indicator Name\",\"Indicator Code\",\"2010\",\"2011\",\"2012\",\"2013\",\"2014\",\"2015\",\"2016\",\"2017\",\"2018\",\"2019\",\"2020\",\"2021\",
\"Germany\",\"DEU\",\"GDP growth (annual %)\",\"NY.GDP.MKTP.KD.ZG\",\"4.2\",\"3.9\",\"0.4\",\"0.4\",\"2.2\",\"1.5\",\"2.2\",\"2.7\",\"1.0\",\"1.1\",\"-3.8\",\"3.2\",
\"France\",\"FRA\",\"GDP growth (annual %)\",\"NY.GDP.MKTP.KD.ZG\",\"1.9\",\"2.2\",\"0.3\",\"0.6\",\"1.0\",\"1.1\",\"1.1\",\"2.3\",\"1.9\",\"1.8\",\"-7.5\",\"6.4\",
";

const INCOMES: &str = "\
code,region,year,income_per_capita
1001,Flensburg,2019,22.1
9162,München,2019,34.8
5315,Köln,2019,25.0
1001,Flensburg,2017,21.0
";

fn unemployment() -> Vec<u8> {
    let mut bytes = b"Arbeitslosenquote aller zivilen Erwerbspersonen\n".to_vec();
    bytes.extend_from_slice(b"Jahr;Monat;Gebiet;Merkmal;Einheit;Quote\n");
    bytes.extend_from_slice(b";;;;;%\n");
    bytes.extend_from_slice(b"Jahr;;Deutschland;Quote;Prozent;\n");
    for (year, rate) in [
        (2012, "6,8"),
        (2013, "6,9"),
        (2016, "6,1"),
        (2017, "5,7"),
        (2020, "5,9"),
        (2021, "5,7"),
    ] {
        bytes.extend_from_slice(
            format!("{year};Jahresdurchschnitt;Deutschland;Quote;Prozent;{rate}\n").as_bytes(),
        );
    }
    bytes.extend_from_slice(b"Ver\xe4nderung gegen\xfcber Vorjahr\n");
    bytes.extend_from_slice(b"\xa9 Statistisches Bundesamt\n");
    bytes
}

fn income_tax() -> Vec<u8> {
    let mut bytes = Vec::new();
    for line in 0..7 {
        bytes.extend_from_slice(format!("Lohn- und Einkommensteuerstatistik;{line}\n").as_bytes());
    }
    bytes.extend_from_slice(b"Jahr;Schl\xfcssel;Region;Steuerpflichtige;Eink\xfcnfte;Steuer\n");
    bytes.extend_from_slice(b"2019;01001;Flensburg, Stadt;40000;1600000;200000\n");
    bytes.extend_from_slice(b"2019;09162;M\xfcnchen, Landeshauptstadt;800000;48000000;8000000\n");
    bytes.extend_from_slice(b"2019;05315;K\xf6ln, Stadt;500000;22000000;3500000\n");
    bytes.extend_from_slice(b"2019;03241;Region Hannover;500000;20000000;3000000\n");
    bytes.extend_from_slice(b"2019;DG;Deutschland;1000;1000;1000\n");
    bytes.extend_from_slice(b"2018;01001;Flensburg, Stadt;39000;1500000;190000\n");
    bytes.extend_from_slice(b"__________\n");
    bytes
}

fn data_dir() -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("federal_muni_harm_25.csv"), ELECTIONS)?;
    fs::write(dir.path().join("gdp.csv"), GDP)?;
    fs::write(dir.path().join("unemployment.csv"), unemployment())?;
    fs::write(dir.path().join("taxationbydistrict.csv"), income_tax())?;
    fs::write(dir.path().join("sorted_incomes.csv"), INCOMES)?;
    Ok(dir)
}

fn config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default().with_data_dir(dir);
    config.elections.year_paths.clear();
    config.unemployment.load.footer_rows = 2;
    config.analysis.income_bins = 2;
    config
}

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn close(actual: Option<f64>, expected: f64) -> bool {
    actual.is_some_and(|v| (v - expected).abs() < 1e-9)
}

#[test]
fn economy_page_merges_series_onto_election_years() -> Result<()> {
    init_test_logging();
    let dir = data_dir()?;
    let session = Session::new(config(dir.path()));

    let page = session.economy_page()?;

    assert_eq!(page.gdp.len(), 12);
    assert_eq!(page.gdp.get(2020), Some(-3.8));
    assert_eq!(page.unemployment.len(), 6);
    assert_eq!(page.unemployment.get(2013), Some(6.9));
    assert_eq!(page.unemployment_report.unparsable_years, 0);

    assert_eq!(page.shares.years(), vec![2013, 2017, 2021]);
    assert_eq!(page.election_report.excluded_rows, 1);
    assert!(page.reconciliation.is_empty());
    assert!(close(page.shares.share("spd", 2021), 27.0));
    assert!(close(page.shares.share("cdu", 2021), 15.0));
    assert!(close(page.shares.share("csu", 2021), 12.0));
    assert!(close(page.shares.share("cdu_csu", 2021), 27.0));

    let merged = &page.merged;
    assert_eq!(merged.years(), &[2013, 2017, 2021]);
    assert_eq!(
        merged.column("gdp_growth").unwrap(),
        &[Some(0.4), Some(2.7), Some(3.2)]
    );
    assert_eq!(
        merged.column("gdp_growth_lag1").unwrap(),
        &[None, Some(0.4), Some(2.7)]
    );
    let average = merged.column("gdp_lag2_avg").unwrap();
    assert!(close(average[0], 2.15));
    assert!(close(average[1], 1.85));
    assert!(close(average[2], -1.35));
    assert_eq!(
        merged.column("unemployment_lag1").unwrap(),
        &[Some(6.8), Some(6.1), Some(5.9)]
    );

    assert_eq!(page.gdp_correlations.rows.len(), 6);
    let cdu_csu = page.gdp_correlations.get("cdu_csu").unwrap();
    assert_eq!(cdu_csu.pairs, 3);
    assert!(cdu_csu.coefficient.abs() <= 1.0);
    assert_eq!(page.unemployment_correlations.indicator, "unemployment_percentage");

    let tables = page.tables()?;
    assert_eq!(tables.len(), 6);
    assert_eq!(tables[3].1.height(), 3);
    Ok(())
}

#[test]
fn economy_page_can_weight_by_total_votes() -> Result<()> {
    init_test_logging();
    let dir = data_dir()?;
    let mut config = config(dir.path());
    config.elections.columns.weight = Some("total_votes".to_string());
    let session = Session::new(config);

    let page = session.economy_page()?;

    // every total_votes / valid_votes ratio in the fixture is 1.01
    assert!(close(page.shares.share("spd", 2021), 27.27));
    assert!(close(page.shares.share("cdu", 2021), 15.15));
    assert_eq!(page.reconciliation.len(), 3);
    assert!(page
        .reconciliation
        .iter()
        .all(|gap| (gap.deviation - 1.0).abs() < 1e-9));
    // absolute votes stay on valid votes
    assert!(close(page.shares.votes("spd", 2021), 1350.0));
    assert_eq!(page.merged.years(), &[2013, 2017, 2021]);
    Ok(())
}

#[test]
fn income_page_joins_tax_with_county_shares() -> Result<()> {
    init_test_logging();
    let dir = data_dir()?;
    let session = Session::new(config(dir.path()));

    let page = session.income_page(2021)?;

    assert_eq!(page.tax.year, 2019);
    assert_eq!(page.tax.len(), 5);
    assert_eq!(page.tax_report.other_years, 1);
    assert_eq!(page.tax.value("01001", TAX_PER_TAXPAYER), Some(5000.0));
    assert_eq!(page.tax.value("09162", TAX_PER_TAXPAYER), Some(10000.0));
    assert_eq!(page.tax.rows()[1].name.as_deref(), Some("München, Landeshauptstadt"));
    assert_eq!(page.top[0].code, "09162");
    assert_eq!(page.bottom[0].code, "DG");
    assert_eq!(page.bottom[1].code, "01001");
    assert_eq!(page.summary.count, 5);

    assert_eq!(page.join_report.left_key_failures, 1);
    assert_eq!(page.join_report.matched, 4);
    assert_eq!(page.incomplete_rows, 0);
    assert_eq!(page.rows.len(), 4);

    assert_eq!(page.bins.sizes(), &[2, 2]);
    assert_eq!(page.bins.labels(), &[Some(5500.0), Some(8500.0)]);
    let hannover = page.rows.iter().find(|r| r.code == "03241").unwrap();
    assert_eq!(hannover.bin, 0);

    let spd = page.parties.iter().position(|p| p == "spd").unwrap();
    assert!(close(page.bin_shares[spd][0], 32.5));
    assert!(close(page.bin_shares[spd][1], 25.0));

    assert_eq!(page.correlations.indicator, TAX_PER_TAXPAYER);
    assert_eq!(page.correlations.get("spd").unwrap().pairs, 4);

    // 0.30 * 1000 + 0.20 * 2000 + 0.30 * 1000 + 0.35 * 1000
    assert!(close(page.national.votes("spd", 2021), 1350.0));
    // cdu 750 + csu 600
    assert!(close(page.national.votes("cdu_csu", 2021), 1350.0));

    let tables = page.tables()?;
    assert_eq!(tables.len(), 8);
    let (name, votes) = &tables[4];
    assert_eq!(name, "party_votes_2021");
    assert_eq!(votes.height(), 6);
    Ok(())
}

#[test]
fn map_page_picks_winners_and_nearest_income_year() -> Result<()> {
    init_test_logging();
    let dir = data_dir()?;
    let session = Session::new(config(dir.path()));

    let page = session.map_page(2021)?;

    assert_eq!(page.income_year, Some(2019));
    assert_eq!(page.rows.len(), 4);
    let row = |code: &str| page.rows.iter().find(|r| r.region == code).unwrap();

    assert_eq!(row("01001").winner.as_deref(), Some("spd"));
    assert_eq!(row("09162").winner.as_deref(), Some("cdu_csu"));
    assert_eq!(row("03241").winner.as_deref(), Some("spd"));
    assert!(close(row("01001").far_right, 15.0));
    assert!(close(row("05315").far_left, 10.0));
    assert_eq!(row("09162").income, Some(34.8));
    assert_eq!(row("03241").income, None);

    let early = session.map_page(2013)?;
    assert_eq!(early.income_year, None);
    assert!(early.rows.iter().all(|r| r.income.is_none()));
    Ok(())
}

#[test]
fn session_reuses_loaded_sources_across_pages() -> Result<()> {
    init_test_logging();
    let dir = data_dir()?;
    let session = Session::new(config(dir.path()));

    session.economy_page()?;
    assert_eq!(session.cached_tables(), 3);
    session.income_page(2021)?;
    assert_eq!(session.cached_tables(), 4);
    session.map_page(2021)?;
    assert_eq!(session.cached_tables(), 5);

    session.clear_cache();
    assert_eq!(session.cached_tables(), 0);
    Ok(())
}

#[test]
fn pages_report_their_drop_counts_as_json() -> Result<()> {
    init_test_logging();
    let dir = data_dir()?;
    let session = Session::new(config(dir.path()));

    let income = session.income_page(2021)?.diagnostics()?;
    assert_eq!(income["tax_year"], 2019);
    assert_eq!(income["join"]["left_key_failures"], 1);
    assert_eq!(income["tax"]["other_years"], 1);
    assert_eq!(income["bin_sizes"], serde_json::json!([2, 2]));
    assert_eq!(income["correlations"]["rows"].as_array().map(Vec::len), Some(6));

    let maps = session.map_page(2013)?.diagnostics()?;
    assert!(maps["income_year"].is_null());
    assert!(maps["income_join"].is_null());

    let loads = session.load_reports();
    assert_eq!(loads.len(), 3);
    assert!(loads.iter().all(|(path, _)| path.starts_with(dir.path())));
    let (_, tax) = loads
        .iter()
        .find(|(path, _)| path.ends_with("taxationbydistrict.csv"))
        .unwrap();
    assert_eq!(tax.malformed_rows, 1);
    Ok(())
}

#[test]
fn missing_source_file_fails_the_page() -> Result<()> {
    let dir = data_dir()?;
    fs::remove_file(dir.path().join("gdp.csv"))?;
    let session = Session::new(config(dir.path()));

    let err = session.economy_page().err().unwrap();
    assert!(err.to_string().contains("gdp.csv"));
    Ok(())
}
