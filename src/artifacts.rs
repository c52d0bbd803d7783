//! One JSON file per target metric: `model_xG.json`, `model_xA.json`, ...

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::features::FeatureSpec;
use crate::model::{ModelSet, TrainedModel};
use crate::observation::Target;
use crate::trainer::{MetricReport, TrainingRun};

pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub generated_at: String,
    pub feature_spec: FeatureSpec,
    pub model: TrainedModel,
    #[serde(default)]
    pub evaluation: Option<MetricReport>,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

#[derive(Debug, Clone)]
pub struct LoadedModels {
    pub models: ModelSet,
    pub spec: FeatureSpec,
    pub reports: Vec<MetricReport>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, target: Target) -> PathBuf {
        self.dir.join(format!("model_{}.json", target.name()))
    }

    /// Writes to a sibling tmp file and renames it over the final path.
    pub fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|err| ForecastError::io(&self.dir, err))?;
        let path = self.path_for(artifact.model.target);
        let json = serde_json::to_string_pretty(artifact)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|err| ForecastError::io(&tmp, err))?;
        fs::rename(&tmp, &path).map_err(|err| ForecastError::io(&path, err))?;
        Ok(path)
    }

    pub fn save_run(&self, run: &TrainingRun, spec: &FeatureSpec) -> Result<Vec<PathBuf>> {
        let generated_at = chrono::Utc::now().to_rfc3339();
        let mut paths = Vec::with_capacity(Target::ALL.len());
        for (target, model) in run.models.iter() {
            let evaluation = run.reports.iter().find(|r| r.target == target).cloned();
            let path = self.save(&ModelArtifact {
                version: ARTIFACT_VERSION,
                generated_at: generated_at.clone(),
                feature_spec: spec.clone(),
                model: model.clone(),
                evaluation,
            })?;
            tracing::info!(path = %path.display(), "wrote model artifact");
            paths.push(path);
        }
        Ok(paths)
    }

    pub fn load(&self, target: Target) -> Result<ModelArtifact> {
        let path = self.path_for(target);
        if !path.exists() {
            return Err(ForecastError::MissingArtifact {
                target: target.to_string(),
                dir: self.dir.clone(),
            });
        }
        let raw = fs::read_to_string(&path).map_err(|err| ForecastError::io(&path, err))?;
        let header: VersionHeader = serde_json::from_str(&raw)?;
        if header.version != ARTIFACT_VERSION {
            return Err(ForecastError::ArtifactVersion {
                path,
                found: header.version,
                expected: ARTIFACT_VERSION,
            });
        }
        let artifact: ModelArtifact = serde_json::from_str(&raw)?;
        if artifact.model.target != target {
            return Err(ForecastError::InvalidConfig(format!(
                "{} holds a model for {}, not {target}",
                path.display(),
                artifact.model.target
            )));
        }
        if artifact.model.schema != artifact.feature_spec.schema() {
            return Err(ForecastError::SchemaMismatch {
                model: target.to_string(),
                expected: artifact.feature_spec.schema().columns().to_vec(),
                actual: artifact.model.schema.columns().to_vec(),
            });
        }
        artifact.model.validate()?;
        Ok(artifact)
    }

    /// Loads all four targets. Every artifact must carry the same feature spec.
    pub fn load_all(&self) -> Result<LoadedModels> {
        let mut spec: Option<FeatureSpec> = None;
        let mut models = Vec::with_capacity(Target::ALL.len());
        let mut reports = Vec::new();
        for target in Target::ALL {
            let artifact = self.load(target)?;
            match &spec {
                None => spec = Some(artifact.feature_spec.clone()),
                Some(existing) if existing != &artifact.feature_spec => {
                    return Err(ForecastError::SchemaMismatch {
                        model: target.to_string(),
                        expected: existing.schema().columns().to_vec(),
                        actual: artifact.feature_spec.schema().columns().to_vec(),
                    });
                }
                Some(_) => {}
            }
            reports.extend(artifact.evaluation);
            models.push(artifact.model);
        }
        let spec = spec.unwrap_or_default();
        Ok(LoadedModels {
            models: ModelSet::new(models)?,
            spec,
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::constant_model;

    fn run(spec: &FeatureSpec) -> TrainingRun {
        let schema = spec.schema();
        let models = Target::ALL
            .iter()
            .map(|t| constant_model(*t, &schema, 0.25))
            .collect();
        TrainingRun {
            models: ModelSet::new(models).unwrap(),
            reports: Vec::new(),
        }
    }

    #[test]
    fn save_then_load_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let spec = FeatureSpec::new(vec![3, 10], 2).unwrap();
        let paths = store.save_run(&run(&spec), &spec).unwrap();
        assert_eq!(paths.len(), 4);
        assert!(dir.path().join("model_xG.json").exists());
        assert!(!dir.path().join("model_xG.json.tmp").exists());

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.spec, spec);
        assert_eq!(loaded.models.schema(), &spec.schema());
    }

    #[test]
    fn missing_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(matches!(
            store.load(Target::Passes),
            Err(ForecastError::MissingArtifact { .. })
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let spec = FeatureSpec::default();
        store.save_run(&run(&spec), &spec).unwrap();

        let path = store.path_for(Target::Xa);
        let raw = fs::read_to_string(&path).unwrap();
        let mut json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        json["version"] = serde_json::json!(99);
        fs::write(&path, json.to_string()).unwrap();

        assert!(matches!(
            store.load(Target::Xa),
            Err(ForecastError::ArtifactVersion { found: 99, .. })
        ));
    }

    #[test]
    fn truncated_regressor_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let spec = FeatureSpec::default();
        store.save_run(&run(&spec), &spec).unwrap();

        let path = store.path_for(Target::Xg);
        let raw = fs::read_to_string(&path).unwrap();
        let mut json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for key in ["coeffs", "feature_means", "feature_stds"] {
            let cut: Vec<serde_json::Value> = json["model"]["regressor"][key]
                .as_array()
                .unwrap()
                .iter()
                .take(2)
                .cloned()
                .collect();
            json["model"]["regressor"][key] = serde_json::Value::Array(cut);
        }
        fs::write(&path, json.to_string()).unwrap();

        assert!(matches!(
            store.load(Target::Xg),
            Err(ForecastError::SchemaMismatch { .. })
        ));
        assert!(matches!(
            crate::predictor::Predictor::from_artifacts(dir.path()),
            Err(ForecastError::SchemaMismatch { .. })
        ));
    }
}
