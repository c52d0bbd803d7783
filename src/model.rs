use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::boosted_trees::BoostedTrees;
use crate::error::{ForecastError, Result};
use crate::features::{FeatureSchema, FeatureVector};
use crate::linear_model::LinearModel;
use crate::observation::Target;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Regressor {
    Ridge(LinearModel),
    BoostedTrees(BoostedTrees),
}

impl Regressor {
    pub fn predict(&self, x: &[f64]) -> f64 {
        match self {
            Regressor::Ridge(model) => model.predict(x),
            Regressor::BoostedTrees(model) => model.predict(x),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Regressor::Ridge(_) => "ridge",
            Regressor::BoostedTrees(_) => "boosted_trees",
        }
    }

    /// Whether the fitted parameters line up with `width` feature columns.
    pub fn accepts_width(&self, width: usize) -> bool {
        match self {
            Regressor::Ridge(model) => model.width() == Some(width),
            Regressor::BoostedTrees(model) => model.accepts_width(width),
        }
    }
}

/// A fitted regressor for one target, bound to the feature schema it was
/// trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub target: Target,
    pub schema: FeatureSchema,
    pub regressor: Regressor,
}

impl TrainedModel {
    /// Checks that the regressor was fitted on as many columns as the schema
    /// names.
    pub fn validate(&self) -> Result<()> {
        if self.regressor.accepts_width(self.schema.len()) {
            return Ok(());
        }
        Err(ForecastError::SchemaMismatch {
            model: self.target.to_string(),
            expected: self.schema.columns().to_vec(),
            actual: vec![format!(
                "{} regressor not fitted on {} columns",
                self.regressor.kind(),
                self.schema.len()
            )],
        })
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        if features.schema() != &self.schema {
            return Err(ForecastError::SchemaMismatch {
                model: self.target.to_string(),
                expected: self.schema.columns().to_vec(),
                actual: features.schema().columns().to_vec(),
            });
        }
        Ok(self.regressor.predict(features.values()))
    }
}

/// Exactly one model per [`Target`], all sharing one schema.
#[derive(Debug, Clone)]
pub struct ModelSet {
    models: BTreeMap<Target, TrainedModel>,
    schema: FeatureSchema,
}

impl ModelSet {
    pub fn new(models: Vec<TrainedModel>) -> Result<Self> {
        let mut by_target = BTreeMap::new();
        let mut schema: Option<FeatureSchema> = None;
        for model in models {
            model.validate()?;
            match &schema {
                None => schema = Some(model.schema.clone()),
                Some(expected) if expected != &model.schema => {
                    return Err(ForecastError::SchemaMismatch {
                        model: model.target.to_string(),
                        expected: expected.columns().to_vec(),
                        actual: model.schema.columns().to_vec(),
                    });
                }
                Some(_) => {}
            }
            if by_target.insert(model.target, model).is_some() {
                return Err(ForecastError::InvalidConfig(
                    "duplicate model for one target".to_string(),
                ));
            }
        }
        let missing: Vec<&str> = Target::ALL
            .iter()
            .filter(|t| !by_target.contains_key(*t))
            .map(|t| t.name())
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::InvalidConfig(format!(
                "model set is missing targets: {}",
                missing.join(", ")
            )));
        }
        let Some(schema) = schema else {
            return Err(ForecastError::InvalidConfig("empty model set".to_string()));
        };
        Ok(Self {
            models: by_target,
            schema,
        })
    }

    pub fn get(&self, target: Target) -> Option<&TrainedModel> {
        self.models.get(&target)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn iter(&self) -> impl Iterator<Item = (Target, &TrainedModel)> {
        self.models.iter().map(|(t, m)| (*t, m))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::features::FeatureSpec;

    /// Ridge model that returns `intercept` regardless of input.
    pub(crate) fn constant_model(target: Target, schema: &FeatureSchema, intercept: f64) -> TrainedModel {
        TrainedModel {
            target,
            schema: schema.clone(),
            regressor: Regressor::Ridge(LinearModel {
                feature_means: vec![0.0; schema.len()],
                feature_stds: vec![1.0; schema.len()],
                intercept,
                coeffs: vec![0.0; schema.len()],
                iterations: 0,
            }),
        }
    }

    #[test]
    fn predict_rejects_a_foreign_schema() {
        let schema = FeatureSpec::default().schema();
        let model = constant_model(Target::Xg, &schema, 0.4);
        let other = FeatureSpec::single(5, 1).unwrap().schema();
        let fv = FeatureVector::new(other, vec![0.0; 5]).unwrap();
        assert!(matches!(
            model.predict(&fv),
            Err(ForecastError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn validate_rejects_a_narrow_regressor() {
        let schema = FeatureSpec::default().schema();
        let mut model = constant_model(Target::Xg, &schema, 0.4);
        assert!(model.validate().is_ok());
        if let Regressor::Ridge(linear) = &mut model.regressor {
            linear.coeffs.truncate(2);
            linear.feature_means.truncate(2);
            linear.feature_stds.truncate(2);
        }
        let err = model.validate().unwrap_err();
        assert!(err.to_string().contains("ridge regressor"));
        assert!(matches!(
            ModelSet::new(vec![model]),
            Err(ForecastError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn model_set_needs_every_target() {
        let schema = FeatureSpec::default().schema();
        let partial = vec![constant_model(Target::Xg, &schema, 0.1)];
        assert!(ModelSet::new(partial).is_err());

        let full = Target::ALL
            .iter()
            .map(|t| constant_model(*t, &schema, 0.1))
            .collect();
        let set = ModelSet::new(full).unwrap();
        assert_eq!(set.iter().count(), 4);
    }

    #[test]
    fn model_set_rejects_mixed_schemas() {
        let a = FeatureSpec::default().schema();
        let b = FeatureSpec::new(vec![3, 10], 1).unwrap().schema();
        let models = vec![
            constant_model(Target::Xg, &a, 0.1),
            constant_model(Target::Xa, &b, 0.1),
            constant_model(Target::Passes, &a, 0.1),
            constant_model(Target::Dribbles, &a, 0.1),
        ];
        assert!(matches!(
            ModelSet::new(models),
            Err(ForecastError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn regressor_serializes_with_kind_tag() {
        let schema = FeatureSpec::default().schema();
        let model = constant_model(Target::Xa, &schema, 0.2);
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["regressor"]["kind"], "ridge");
        assert_eq!(json["target"], "xA");
    }
}
