use assert_float_eq::assert_float_absolute_eq;

use form_forecast::ForecastError;
use form_forecast::artifacts::ArtifactStore;
use form_forecast::features::{FeatureSpec, build_features};
use form_forecast::forecast_context::{FileSource, ForecastContext};
use form_forecast::observation::{Observation, Target, order_history};
use form_forecast::predictor::Predictor;
use form_forecast::synthetic::{SeasonConfig, season};
use form_forecast::trainer::{Algorithm, TrainerConfig, train_all};
use form_forecast::training_set::assemble;

fn trained(spec: &FeatureSpec) -> (form_forecast::observation_store::ObservationStore, Predictor) {
    let store = season(
        &SeasonConfig {
            teams: 2,
            players_per_team: 4,
            matches: 14,
            ..SeasonConfig::default()
        },
        5,
    );
    let set = assemble(&store, spec).unwrap();
    let cfg = TrainerConfig {
        holdout_fraction: 0.2,
        algorithm: Algorithm::from_name("ridge").unwrap(),
    };
    let run = train_all(&set, &cfg).unwrap();
    let predictor = Predictor::new(run.models, spec.clone()).unwrap();
    (store, predictor)
}

#[test]
fn serve_features_equal_training_features() {
    let spec = FeatureSpec::new(vec![3, 10], 2).unwrap();
    let (store, predictor) = trained(&spec);
    for player in store.player_ids() {
        let raw: Vec<Observation> = store.history(player).into_iter().cloned().collect();
        let ordered = order_history(&raw).unwrap();
        let train = build_features(&ordered, &spec);
        for i in 0..ordered.len() {
            let served = predictor.predict(&ordered[..i]).unwrap();
            match (&train[i], served) {
                (None, None) => {}
                (Some(fv), Some(record)) => assert_eq!(fv, &record.features),
                (a, b) => panic!("{player} position {i}: train {a:?} vs serve {b:?}"),
            }
        }
    }
}

#[test]
fn predictions_are_non_negative() {
    let spec = FeatureSpec::default();
    let (store, predictor) = trained(&spec);
    for player in store.player_ids() {
        if let Some(record) = predictor.predict(store.history(player)).unwrap() {
            assert!(Target::ALL.iter().all(|t| record.get(*t) >= 0.0));
        }
    }
}

#[test]
fn artifacts_reproduce_predictions() {
    let spec = FeatureSpec::default();
    let store = season(&SeasonConfig::default(), 3);
    let set = assemble(&store, &spec).unwrap();
    let mut cfg = TrainerConfig::default();
    if let Algorithm::BoostedTrees(params) = &mut cfg.algorithm {
        params.n_estimators = 30;
    }
    let run = train_all(&set, &cfg).unwrap();
    let in_memory = Predictor::new(run.models.clone(), spec.clone()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("observations.csv");
    store.write_csv(&data).unwrap();
    let models = dir.path().join("models");
    ArtifactStore::new(&models).save_run(&run, &spec).unwrap();

    let ctx = ForecastContext::load(FileSource {
        data_path: data,
        db_path: None,
        models_dir: models,
    })
    .unwrap();
    for player in store.player_ids() {
        let expected = in_memory.predict(store.history(player)).unwrap();
        let loaded = ctx.predict_player(player).unwrap();
        match (expected, loaded) {
            (None, None) => {}
            (Some(a), Some(b)) => {
                assert_eq!(a.features, b.features);
                for target in Target::ALL {
                    assert_float_absolute_eq!(a.get(target), b.get(target), 1e-9);
                }
            }
            (a, b) => panic!("{player}: {a:?} vs {b:?}"),
        }
    }
}

#[test]
fn artifacts_from_another_schema_are_rejected() {
    let spec = FeatureSpec::default();
    let (_, predictor) = trained(&spec);
    let wider = FeatureSpec::new(vec![3, 5], 1).unwrap();
    assert!(matches!(
        Predictor::new(predictor.models().clone(), wider),
        Err(ForecastError::SchemaMismatch { .. })
    ));
}

#[test]
fn mixed_player_history_is_rejected() {
    let spec = FeatureSpec::default();
    let (store, predictor) = trained(&spec);
    let ids = store.player_ids();
    let mixed: Vec<&Observation> = store
        .history(ids[0])
        .into_iter()
        .chain(store.history(ids[1]))
        .collect();
    assert!(matches!(
        predictor.predict(mixed),
        Err(ForecastError::MixedPlayers { .. })
    ));
}
