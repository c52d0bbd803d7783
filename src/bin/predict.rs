use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;

use form_forecast::forecast_context::{FileSource, ForecastContext};
use form_forecast::observation::Target;
use form_forecast::predictor::PredictionRecord;
use form_forecast::settings::Settings;

/// Prints the next-match forecast for a player.
#[derive(Debug, Parser)]
struct Args {
    /// player id as it appears in the observation store
    player: String,

    /// second player for a head-to-head comparison
    #[arg(long)]
    vs: Option<String>,

    /// observation CSV (overrides FF_DATA_PATH)
    #[arg(long)]
    data: Option<PathBuf>,

    /// artifact directory (overrides FF_MODELS_DIR)
    #[arg(long)]
    models: Option<PathBuf>,

    /// print the record as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    settings.override_sources(args.data, None);
    if let Some(models) = args.models {
        settings.models_dir = models;
    }

    let ctx = ForecastContext::load(FileSource::from_settings(&settings))
        .context("load observations and models")?;

    let Some(second) = args.vs else {
        let record = ctx
            .predict_player(&args.player)?
            .ok_or_else(|| anyhow!("{} has no played matches to forecast from", args.player))?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&record)?);
        } else {
            print_record(&record);
        }
        return Ok(());
    };

    let h2h = ctx.compare(&args.player, &second)?;
    if args.json {
        let body = serde_json::json!({ "first": h2h.first, "second": h2h.second });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }
    println!("{:<9} {:>10} {:>10} {:>8}", "metric", args.player, second, "delta");
    for target in Target::ALL {
        let cell = |r: &Option<PredictionRecord>| {
            r.as_ref()
                .map(|r| format!("{:.2}", r.get(target)))
                .unwrap_or_else(|| "-".into())
        };
        let delta = h2h
            .delta(target)
            .map(|d| format!("{d:+.2}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<9} {:>10} {:>10} {:>8}",
            target.name(),
            cell(&h2h.first),
            cell(&h2h.second),
            delta
        );
    }
    Ok(())
}

fn print_record(record: &PredictionRecord) {
    println!(
        "{} | as of {} | {} matches in window",
        record.player_id, record.as_of, record.history_used
    );
    for target in Target::ALL {
        println!("  {:<9} {:.3}", target.name(), record.get(target));
    }
    println!("features:");
    for (name, value) in record.features.iter() {
        println!("  {name:<16} {value:.3}");
    }
}
