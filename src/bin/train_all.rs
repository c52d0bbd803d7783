use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use form_forecast::artifacts::ArtifactStore;
use form_forecast::features::FeatureSpec;
use form_forecast::forecast_context::{FileSource, ForecastSource};
use form_forecast::settings::{Settings, parse_windows};
use form_forecast::trainer::{Algorithm, train_all};
use form_forecast::training_set::assemble;

/// Trains one model per target metric and writes the artifacts.
#[derive(Debug, Parser)]
struct Args {
    /// observation CSV (overrides FF_DATA_PATH)
    #[arg(long)]
    data: Option<PathBuf>,

    /// SQLite store (overrides FF_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// artifact directory (overrides FF_MODELS_DIR)
    #[arg(long)]
    models: Option<PathBuf>,

    /// comma separated rolling windows, e.g. 3,10
    #[arg(long)]
    windows: Option<String>,

    #[arg(long)]
    min_periods: Option<usize>,

    /// share of the most recent rows held out for evaluation
    #[arg(long)]
    holdout: Option<f64>,

    /// boosted | ridge
    #[arg(long)]
    algorithm: Option<String>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    settings.override_sources(args.data, args.db);
    if let Some(models) = args.models {
        settings.models_dir = models;
    }
    if args.windows.is_some() || args.min_periods.is_some() {
        let windows = match &args.windows {
            Some(raw) => parse_windows(raw)?,
            None => settings.feature_spec.windows().to_vec(),
        };
        let min_periods = args
            .min_periods
            .unwrap_or(settings.feature_spec.min_periods());
        settings.feature_spec = FeatureSpec::new(windows, min_periods)?;
    }
    if let Some(holdout) = args.holdout {
        settings.holdout_fraction = holdout.clamp(0.0, form_forecast::trainer::MAX_HOLDOUT);
    }
    if let Some(name) = &args.algorithm {
        settings.algorithm = Algorithm::from_name(name)?;
    }
    settings.configure_threads();

    let source = FileSource::from_settings(&settings);
    let store = source
        .load_observations()
        .with_context(|| format!("load observations from {}", source.describe()))?;
    let spec = settings.feature_spec.clone();
    let set = assemble(&store, &spec)?;
    info!(
        rows = set.len(),
        players = set.players_used,
        features = ?set.schema().columns(),
        "training set ready"
    );

    let run = train_all(&set, &settings.trainer_config())?;

    println!(
        "Trained {} models ({}) on {} rows from {} players",
        run.reports.len(),
        settings.algorithm.name(),
        set.len(),
        set.players_used
    );
    println!(
        "{:<9} {:>7} {:>7} {:>10} {:>12}",
        "metric", "train", "holdout", "MAE", "baseline MAE"
    );
    for report in &run.reports {
        let fmt = |v: Option<f64>| v.map(|v| format!("{v:.4}")).unwrap_or_else(|| "n/a".into());
        println!(
            "{:<9} {:>7} {:>7} {:>10} {:>12}",
            report.target.name(),
            report.train_samples,
            report.holdout_samples,
            fmt(report.holdout_mae),
            fmt(report.baseline_mae)
        );
    }

    let artifacts = ArtifactStore::new(&settings.models_dir);
    let paths = artifacts
        .save_run(&run, &spec)
        .with_context(|| format!("write artifacts to {}", artifacts.dir().display()))?;
    for path in paths {
        println!("saved {}", path.display());
    }
    Ok(())
}
