//! Per-target model fitting with a chronological holdout.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::boosted_trees::{BoostParams, BoostedTrees};
use crate::error::{ForecastError, Result};
use crate::linear_model::{LinearModel, RidgeParams};
use crate::model::{ModelSet, Regressor, TrainedModel};
use crate::observation::Target;
use crate::training_set::TrainingSet;

pub const DEFAULT_HOLDOUT: f64 = 0.2;
pub const MAX_HOLDOUT: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Algorithm {
    BoostedTrees(BoostParams),
    Ridge(RidgeParams),
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::BoostedTrees(BoostParams::default())
    }
}

impl Algorithm {
    /// `boosted` / `ridge` with default hyperparameters.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "boosted" | "boosted_trees" | "gbt" => Ok(Algorithm::BoostedTrees(BoostParams::default())),
            "ridge" | "linear" => Ok(Algorithm::Ridge(RidgeParams::default())),
            other => Err(ForecastError::InvalidConfig(format!(
                "unknown algorithm '{other}' (expected boosted or ridge)"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::BoostedTrees(_) => "boosted",
            Algorithm::Ridge(_) => "ridge",
        }
    }

    fn fit(&self, x: &[&[f64]], y: &[f64]) -> Regressor {
        match self {
            Algorithm::BoostedTrees(params) => Regressor::BoostedTrees(BoostedTrees::fit(x, y, params)),
            Algorithm::Ridge(params) => Regressor::Ridge(LinearModel::fit(x, y, params)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerConfig {
    /// Share of the most recent rows held out for evaluation.
    pub holdout_fraction: f64,
    pub algorithm: Algorithm,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: DEFAULT_HOLDOUT,
            algorithm: Algorithm::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    pub target: Target,
    pub algorithm: String,
    pub train_samples: usize,
    pub holdout_samples: usize,
    pub train_mae: f64,
    pub holdout_mae: Option<f64>,
    /// MAE of always predicting the training mean on the holdout.
    pub baseline_mae: Option<f64>,
    pub last_train_date: Option<NaiveDate>,
    pub first_holdout_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct MetricFit {
    pub model: TrainedModel,
    pub report: MetricReport,
}

#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub models: ModelSet,
    pub reports: Vec<MetricReport>,
}

/// Index of the first holdout row in chronologically sorted `dates`.
/// Rows sharing a date always land on the same side. Returns `dates.len()`
/// when no holdout can be carved out.
pub fn chronological_split_index(dates: &[NaiveDate], fraction: f64) -> usize {
    let n = dates.len();
    let fraction = fraction.clamp(0.0, MAX_HOLDOUT);
    let holdout = ((n as f64) * fraction).round() as usize;
    if n < 2 || holdout == 0 {
        return n;
    }
    let start = n.saturating_sub(holdout).max(1);

    let mut idx = start;
    while idx < n && dates[idx] == dates[idx - 1] {
        idx += 1;
    }
    if idx < n {
        return idx;
    }

    idx = start;
    while idx > 0 && dates[idx] == dates[idx - 1] {
        idx -= 1;
    }
    if idx == 0 { n } else { idx }
}

pub fn mean_absolute_error(predicted: &[f64], actual: &[f64]) -> f64 {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).abs())
        .sum::<f64>()
        / n as f64
}

pub fn train_metric(set: &TrainingSet, target: Target, cfg: &TrainerConfig) -> Result<MetricFit> {
    let dates: Vec<NaiveDate> = set.rows().iter().map(|row| row.match_date).collect();
    let split = chronological_split_index(&dates, cfg.holdout_fraction);
    if split == 0 || set.is_empty() {
        return Err(ForecastError::InsufficientTrainingData {
            target: target.to_string(),
            reason: format!("{} usable rows", set.len()),
        });
    }

    let (x, y): (Vec<&[f64]>, Vec<f64>) = set
        .examples(target)
        .map(|(fv, value)| (fv.values(), value))
        .unzip();
    let (x_train, x_hold) = x.split_at(split);
    let (y_train, y_hold) = y.split_at(split);

    let regressor = cfg.algorithm.fit(x_train, y_train);
    let train_pred: Vec<f64> = x_train.iter().map(|row| regressor.predict(row)).collect();
    let train_mae = mean_absolute_error(&train_pred, y_train);

    let (holdout_mae, baseline_mae) = if x_hold.is_empty() {
        (None, None)
    } else {
        let hold_pred: Vec<f64> = x_hold.iter().map(|row| regressor.predict(row)).collect();
        let train_mean = y_train.iter().sum::<f64>() / y_train.len() as f64;
        let baseline = vec![train_mean; y_hold.len()];
        (
            Some(mean_absolute_error(&hold_pred, y_hold)),
            Some(mean_absolute_error(&baseline, y_hold)),
        )
    };

    let report = MetricReport {
        target,
        algorithm: cfg.algorithm.name().to_string(),
        train_samples: y_train.len(),
        holdout_samples: y_hold.len(),
        train_mae,
        holdout_mae,
        baseline_mae,
        last_train_date: dates.get(split - 1).copied(),
        first_holdout_date: dates.get(split).copied(),
    };
    tracing::info!(
        metric = %target,
        train = report.train_samples,
        holdout = report.holdout_samples,
        holdout_mae = ?report.holdout_mae,
        baseline_mae = ?report.baseline_mae,
        "fitted model"
    );

    Ok(MetricFit {
        model: TrainedModel {
            target,
            schema: set.schema().clone(),
            regressor,
        },
        report,
    })
}

/// Fits all four targets in parallel. Output order follows [`Target::ALL`].
pub fn train_all(set: &TrainingSet, cfg: &TrainerConfig) -> Result<TrainingRun> {
    let fits: Vec<MetricFit> = Target::ALL
        .par_iter()
        .map(|target| train_metric(set, *target, cfg))
        .collect::<Result<_>>()?;
    let (models, reports): (Vec<TrainedModel>, Vec<MetricReport>) =
        fits.into_iter().map(|fit| (fit.model, fit.report)).unzip();
    Ok(TrainingRun {
        models: ModelSet::new(models)?,
        reports,
    })
}
