use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use form_forecast::fbref_import::{looks_like_xg, read_columns};
use form_forecast::observation_db;
use form_forecast::observation_store::ObservationStore;

/// Lists a CSV's columns and summarizes an observation store.
#[derive(Debug, Parser)]
struct Args {
    /// CSV to inspect (defaults to FF_DATA_PATH)
    path: Option<PathBuf>,

    /// summarize this SQLite store instead of the CSV rows
    #[arg(long)]
    db: Option<PathBuf>,

    /// only list columns, do not parse rows
    #[arg(long)]
    columns_only: bool,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = form_forecast::settings::Settings::from_env()?;
    let path = args.path.unwrap_or(settings.data_path);

    if args.db.is_none() {
        let columns =
            read_columns(&path).with_context(|| format!("read header of {}", path.display()))?;
        println!("Columns ({}):", columns.len());
        for col in &columns {
            println!("  {col}");
        }
        let xg: Vec<&String> = columns.iter().filter(|c| looks_like_xg(c)).collect();
        println!("xG-like columns: {xg:?}");
        if args.columns_only {
            return Ok(());
        }
    }

    let store = match &args.db {
        Some(db) => {
            let conn = observation_db::open_db(db).with_context(|| format!("open {}", db.display()))?;
            observation_db::load_store(&conn)?
        }
        None => ObservationStore::load_csv(&path)?,
    };
    let summary = store.summary();
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "n/a".into());
    println!("Rows: {}", summary.rows);
    println!("Players: {}", summary.players);
    println!("Teams: {}", summary.teams);
    println!("Zero-minute rows: {}", summary.zero_minute_rows);
    println!("Dates: {} .. {}", date(summary.first_date), date(summary.last_date));
    Ok(())
}
