//! Load-once access to observations and models with explicit refresh.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::observation::{Metric, Observation, Target};
use crate::observation_db;
use crate::observation_store::ObservationStore;
use crate::predictor::{PredictionRecord, Predictor};
use crate::settings::Settings;

/// Where a [`ForecastContext`] gets its data and models from.
pub trait ForecastSource {
    fn load_observations(&self) -> Result<ObservationStore>;

    /// Called after [`ForecastSource::load_observations`] with its result.
    fn load_predictor(&self, store: &ObservationStore) -> Result<Predictor>;

    fn describe(&self) -> String;
}

/// Observations from CSV (or SQLite when `db_path` is set), models from an
/// artifact directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub data_path: PathBuf,
    pub db_path: Option<PathBuf>,
    pub models_dir: PathBuf,
}

impl FileSource {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            data_path: settings.data_path.clone(),
            db_path: settings.db_path.clone(),
            models_dir: settings.models_dir.clone(),
        }
    }
}

impl ForecastSource for FileSource {
    fn load_observations(&self) -> Result<ObservationStore> {
        match &self.db_path {
            Some(db) => {
                let conn = observation_db::open_db(db)?;
                observation_db::load_store(&conn)
            }
            None => ObservationStore::load_csv(&self.data_path),
        }
    }

    fn load_predictor(&self, _store: &ObservationStore) -> Result<Predictor> {
        Predictor::from_artifacts(&self.models_dir)
    }

    fn describe(&self) -> String {
        let data = self.db_path.as_ref().unwrap_or(&self.data_path);
        format!("{} + {}", data.display(), self.models_dir.display())
    }
}

/// Forecasts for two players side by side.
#[derive(Debug, Clone)]
pub struct HeadToHead {
    pub first: Option<PredictionRecord>,
    pub second: Option<PredictionRecord>,
}

impl HeadToHead {
    /// `second - first`; `None` unless both players have a forecast.
    pub fn delta(&self, target: Target) -> Option<f64> {
        let first = self.first.as_ref()?;
        let second = self.second.as_ref()?;
        Some(second.get(target) - first.get(target))
    }
}

pub struct ForecastContext<S> {
    source: S,
    store: ObservationStore,
    predictor: Predictor,
    loaded_at: DateTime<Utc>,
}

impl<S: ForecastSource> ForecastContext<S> {
    pub fn load(source: S) -> Result<Self> {
        let (store, predictor) = load_parts(&source)?;
        tracing::info!(source = %source.describe(), rows = store.len(), "forecast context loaded");
        Ok(Self {
            source,
            store,
            predictor,
            loaded_at: Utc::now(),
        })
    }

    /// Reloads from the source. On failure the previous data stays in place.
    pub fn refresh(&mut self) -> Result<()> {
        let (store, predictor) = load_parts(&self.source)?;
        self.store = store;
        self.predictor = predictor;
        self.loaded_at = Utc::now();
        Ok(())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &ObservationStore {
        &self.store
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn predict_player(&self, player_id: &str) -> Result<Option<PredictionRecord>> {
        self.predictor.predict(self.store.history(player_id))
    }

    pub fn compare(&self, first: &str, second: &str) -> Result<HeadToHead> {
        Ok(HeadToHead {
            first: self.predict_player(first)?,
            second: self.predict_player(second)?,
        })
    }

    /// The last `n` matches the player actually played, oldest first.
    pub fn recent_history(&self, player_id: &str, n: usize) -> Vec<&Observation> {
        let played: Vec<&Observation> = self
            .store
            .history(player_id)
            .into_iter()
            .filter(|obs| obs.is_eligible())
            .collect();
        let skip = played.len().saturating_sub(n);
        played.into_iter().skip(skip).collect()
    }
}

fn load_parts<S: ForecastSource>(source: &S) -> Result<(ObservationStore, Predictor)> {
    let store = source.load_observations()?;
    let predictor = source.load_predictor(&store)?;
    Ok((store, predictor))
}

/// Mean of `metric` over `rows`, `None` for an empty slice.
pub fn average(rows: &[&Observation], metric: Metric) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    Some(rows.iter().map(|obs| obs.value(metric)).sum::<f64>() / rows.len() as f64)
}
