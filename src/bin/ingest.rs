use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use form_forecast::fbref_import;
use form_forecast::observation_db;

/// Converts a flattened FBref player-match export into the observation CSV.
#[derive(Debug, Parser)]
struct Args {
    /// FBref export to read
    input: PathBuf,

    /// observation CSV to write (defaults to FF_DATA_PATH)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// also upsert the rows into this SQLite store
    #[arg(long)]
    db: Option<PathBuf>,
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
    let out = args.out.unwrap_or(settings.data_path);

    let (store, summary) = fbref_import::import_file(&args.input)
        .with_context(|| format!("import {}", args.input.display()))?;
    info!(?summary, "export converted");

    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    store
        .write_csv(&out)
        .with_context(|| format!("write {}", out.display()))?;

    if let Some(db_path) = args.db {
        let mut conn = observation_db::open_db(&db_path)
            .with_context(|| format!("open {}", db_path.display()))?;
        let written = observation_db::upsert_observations(&mut conn, store.observations())?;
        println!("SQLite: {} rows upserted into {}", written, db_path.display());
    }

    println!("Ingest complete");
    println!("Rows read: {}", summary.rows_read);
    println!("Dropped (no match date): {}", summary.dropped_bad_date);
    println!("Dropped (zero minutes): {}", summary.dropped_zero_minutes);
    println!("Kept: {} -> {}", summary.kept, out.display());
    Ok(())
}
