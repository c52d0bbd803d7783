//! Rolling-window form features.
//!
//! Training-time and serve-time features both go through [`window_features`]:
//! the vector for position `i` of a history is `window_features(&history[..i])`,
//! and the vector for the next, unplayed match is `window_features(&history)`.

use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ForecastError, Result};
use crate::observation::{Metric, Observation};

pub const DEFAULT_WINDOW: usize = 3;
pub const DEFAULT_MIN_PERIODS: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FeatureSpecDef")]
pub struct FeatureSpec {
    windows: Vec<usize>,
    min_periods: usize,
}

#[derive(Deserialize)]
struct FeatureSpecDef {
    windows: Vec<usize>,
    min_periods: usize,
}

impl TryFrom<FeatureSpecDef> for FeatureSpec {
    type Error = ForecastError;

    fn try_from(def: FeatureSpecDef) -> Result<Self> {
        FeatureSpec::new(def.windows, def.min_periods)
    }
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self {
            windows: vec![DEFAULT_WINDOW],
            min_periods: DEFAULT_MIN_PERIODS,
        }
    }
}

impl FeatureSpec {
    pub fn new(mut windows: Vec<usize>, min_periods: usize) -> Result<Self> {
        windows.sort_unstable();
        windows.dedup();
        let Some(&smallest) = windows.first() else {
            return Err(ForecastError::InvalidConfig(
                "at least one rolling window is required".to_string(),
            ));
        };
        if smallest == 0 {
            return Err(ForecastError::InvalidConfig(
                "rolling window width must be at least 1".to_string(),
            ));
        }
        if min_periods == 0 || min_periods > smallest {
            return Err(ForecastError::InvalidConfig(format!(
                "min_periods must be within 1..={smallest}, got {min_periods}"
            )));
        }
        Ok(Self {
            windows,
            min_periods,
        })
    }

    pub fn single(window: usize, min_periods: usize) -> Result<Self> {
        Self::new(vec![window], min_periods)
    }

    pub fn windows(&self) -> &[usize] {
        &self.windows
    }

    pub fn min_periods(&self) -> usize {
        self.min_periods
    }

    /// Widest window; the number of trailing observations a prediction looks at.
    pub fn max_window(&self) -> usize {
        self.windows.last().copied().unwrap_or(DEFAULT_WINDOW)
    }

    pub fn schema(&self) -> FeatureSchema {
        let columns: Vec<String> = self
            .windows
            .iter()
            .flat_map(|&k| Metric::FEATURES.iter().map(move |m| column_name(*m, k)))
            .collect();
        FeatureSchema {
            columns: columns.into(),
        }
    }
}

pub fn column_name(metric: Metric, window: usize) -> String {
    format!("{}_roll_{}", metric.label(), window)
}

/// Ordered column names of a feature vector. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    columns: Arc<[String]>,
}

impl FeatureSchema {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    schema: FeatureSchema,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(schema: FeatureSchema, values: Vec<f64>) -> Result<Self> {
        if schema.len() != values.len() {
            return Err(ForecastError::InvalidConfig(format!(
                "feature vector has {} values for {} columns",
                values.len(),
                schema.len()
            )));
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.schema.index_of(column).map(|idx| self.values[idx])
    }

    pub fn rolling(&self, metric: Metric, window: usize) -> Option<f64> {
        self.get(&column_name(metric, window))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.schema
            .columns()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Feature vector summarizing `prior`, which must be one player's eligible
/// observations in chronological order. `None` when fewer than
/// `min_periods` observations are available.
pub fn window_features(prior: &[Observation], spec: &FeatureSpec) -> Option<FeatureVector> {
    let values = window_values(prior, spec)?;
    Some(FeatureVector {
        schema: spec.schema(),
        values,
    })
}

/// One output per position of `history`, each computed from the
/// observations strictly before it.
pub fn build_features(history: &[Observation], spec: &FeatureSpec) -> Vec<Option<FeatureVector>> {
    let schema = spec.schema();
    (0..history.len())
        .map(|i| {
            window_values(&history[..i], spec).map(|values| FeatureVector {
                schema: schema.clone(),
                values,
            })
        })
        .collect()
}

fn window_values(prior: &[Observation], spec: &FeatureSpec) -> Option<Vec<f64>> {
    if prior.len() < spec.min_periods {
        return None;
    }
    let mut values = Vec::with_capacity(spec.windows.len() * Metric::FEATURES.len());
    for &k in &spec.windows {
        let tail = &prior[prior.len().saturating_sub(k)..];
        let n = tail.len() as f64;
        for metric in Metric::FEATURES {
            let sum: f64 = tail.iter().map(|obs| obs.value(metric)).sum();
            values.push(sum / n);
        }
    }
    Some(values)
}
