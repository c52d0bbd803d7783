use std::env;
use std::path::PathBuf;

use crate::error::{ForecastError, Result};
use crate::features::{DEFAULT_MIN_PERIODS, DEFAULT_WINDOW, FeatureSpec};
use crate::trainer::{Algorithm, DEFAULT_HOLDOUT, MAX_HOLDOUT, TrainerConfig};

pub const DEFAULT_DATA_PATH: &str = "training_data.csv";
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Runtime configuration read from `FF_*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_path: PathBuf,
    /// When set, observations are read from this SQLite file instead of CSV.
    pub db_path: Option<PathBuf>,
    pub models_dir: PathBuf,
    pub feature_spec: FeatureSpec,
    pub holdout_fraction: f64,
    pub algorithm: Algorithm,
    pub threads: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            db_path: None,
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            feature_spec: FeatureSpec::default(),
            holdout_fraction: DEFAULT_HOLDOUT,
            algorithm: Algorithm::default(),
            threads: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same parsing as [`Settings::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let opt = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());

        let data_path = opt("FF_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));
        let db_path = opt("FF_DB_PATH").map(PathBuf::from);
        let models_dir = opt("FF_MODELS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR));

        let windows = match opt("FF_WINDOWS") {
            Some(raw) => parse_windows(&raw)?,
            None => vec![DEFAULT_WINDOW],
        };
        let min_periods = opt("FF_MIN_PERIODS")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_MIN_PERIODS)
            .max(1);
        let feature_spec = FeatureSpec::new(windows, min_periods)?;

        let holdout_fraction = opt("FF_HOLDOUT")
            .and_then(|val| val.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(DEFAULT_HOLDOUT)
            .clamp(0.0, MAX_HOLDOUT);
        let algorithm = match opt("FF_ALGORITHM") {
            Some(name) => Algorithm::from_name(&name)?,
            None => Algorithm::default(),
        };
        let threads = opt("FF_THREADS")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .filter(|n| *n > 0);

        Ok(Self {
            data_path,
            db_path,
            models_dir,
            feature_spec,
            holdout_fraction,
            algorithm,
            threads,
        })
    }

    /// Applies command-line data sources. An explicit CSV replaces any
    /// SQLite store from the environment unless a store is also given.
    pub fn override_sources(&mut self, data: Option<PathBuf>, db: Option<PathBuf>) {
        if let Some(data) = data {
            self.data_path = data;
            self.db_path = None;
        }
        if db.is_some() {
            self.db_path = db;
        }
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            holdout_fraction: self.holdout_fraction,
            algorithm: self.algorithm,
        }
    }

    /// Sizes rayon's global pool when `threads` is set. Only the first call
    /// in a process has an effect.
    pub fn configure_threads(&self) {
        let Some(n) = self.threads else {
            return;
        };
        if let Err(err) = rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
            tracing::warn!(%err, "rayon pool already configured");
        }
    }
}

pub fn parse_windows(raw: &str) -> Result<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>()
                .map_err(|_| ForecastError::InvalidConfig(format!("bad window width '{part}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.data_path, PathBuf::from("training_data.csv"));
        assert_eq!(s.feature_spec, FeatureSpec::default());
        assert_eq!(s.holdout_fraction, 0.2);
        assert_eq!(s.algorithm.name(), "boosted");
        assert!(s.db_path.is_none());
    }

    #[test]
    fn windows_and_holdout_are_parsed_and_clamped() {
        let s = settings(&[
            ("FF_WINDOWS", "10, 3"),
            ("FF_MIN_PERIODS", "2"),
            ("FF_HOLDOUT", "1.5"),
            ("FF_ALGORITHM", "ridge"),
            ("FF_THREADS", "0"),
        ])
        .unwrap();
        assert_eq!(s.feature_spec.windows(), &[3, 10]);
        assert_eq!(s.feature_spec.min_periods(), 2);
        assert_eq!(s.holdout_fraction, 0.9);
        assert_eq!(s.algorithm.name(), "ridge");
        assert_eq!(s.threads, None);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let s = settings(&[("FF_MODELS_DIR", "  "), ("FF_HOLDOUT", "abc")]).unwrap();
        assert_eq!(s.models_dir, PathBuf::from("models"));
        assert_eq!(s.holdout_fraction, 0.2);
    }

    #[test]
    fn explicit_csv_replaces_environment_store() {
        let mut s = settings(&[("FF_DB_PATH", "a.sqlite")]).unwrap();
        s.override_sources(Some(PathBuf::from("b.csv")), None);
        assert_eq!(s.data_path, PathBuf::from("b.csv"));
        assert!(s.db_path.is_none());

        s.override_sources(Some(PathBuf::from("c.csv")), Some(PathBuf::from("d.sqlite")));
        assert_eq!(s.db_path, Some(PathBuf::from("d.sqlite")));

        let mut untouched = settings(&[("FF_DB_PATH", "a.sqlite")]).unwrap();
        untouched.override_sources(None, None);
        assert_eq!(untouched.db_path, Some(PathBuf::from("a.sqlite")));
    }

    #[test]
    fn invalid_window_lists_are_errors() {
        assert!(settings(&[("FF_WINDOWS", "3,x")]).is_err());
        assert!(settings(&[("FF_WINDOWS", "2"), ("FF_MIN_PERIODS", "3")]).is_err());
        assert!(settings(&[("FF_ALGORITHM", "forest")]).is_err());
    }
}
