use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::artifacts::ArtifactStore;
use crate::error::{ForecastError, Result};
use crate::features::{FeatureSpec, FeatureVector, window_features};
use crate::model::ModelSet;
use crate::observation::{Observation, Target, order_history};

/// Next-match forecast for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub player_id: String,
    /// Date of the latest eligible observation.
    pub as_of: NaiveDate,
    /// Observations inside the widest window.
    pub history_used: usize,
    pub predictions: BTreeMap<Target, f64>,
    pub features: FeatureVector,
}

impl PredictionRecord {
    pub fn get(&self, target: Target) -> f64 {
        self.predictions.get(&target).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct Predictor {
    models: ModelSet,
    spec: FeatureSpec,
}

impl Predictor {
    pub fn new(models: ModelSet, spec: FeatureSpec) -> Result<Self> {
        let expected = spec.schema();
        if models.schema() != &expected {
            return Err(ForecastError::SchemaMismatch {
                model: "model set".to_string(),
                expected: expected.columns().to_vec(),
                actual: models.schema().columns().to_vec(),
            });
        }
        Ok(Self { models, spec })
    }

    pub fn from_artifacts(dir: &Path) -> Result<Self> {
        let loaded = ArtifactStore::new(dir).load_all()?;
        Self::new(loaded.models, loaded.spec)
    }

    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    /// Forecast from a single player's history, in any order, zero-minute
    /// rows allowed. `Ok(None)` when there is too little eligible history.
    pub fn predict<'a, I>(&self, history: I) -> Result<Option<PredictionRecord>>
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let ordered = order_history(history)?;
        let Some(features) = window_features(&ordered, &self.spec) else {
            return Ok(None);
        };
        let Some(latest) = ordered.last() else {
            return Ok(None);
        };

        let mut predictions = BTreeMap::new();
        for (target, model) in self.models.iter() {
            // Counts are non-negative; regressors may extrapolate below zero.
            let value = model.predict(&features)?.max(0.0);
            predictions.insert(target, value);
        }
        Ok(Some(PredictionRecord {
            player_id: latest.player_id.clone(),
            as_of: latest.match_date,
            history_used: ordered.len().min(self.spec.max_window()),
            predictions,
            features,
        }))
    }
}
