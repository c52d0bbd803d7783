use chrono::NaiveDate;
use rayon::prelude::*;

use crate::error::Result;
use crate::features::{FeatureSchema, FeatureSpec, FeatureVector, build_features};
use crate::observation::{Observation, Target, order_history};
use crate::observation_store::ObservationStore;

/// One eligible observation with the features computed from its past and
/// its realized target values.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub player_id: String,
    pub match_date: NaiveDate,
    pub seq: u64,
    pub features: FeatureVector,
    targets: [f64; 4],
}

impl TrainingRow {
    pub fn target(&self, target: Target) -> f64 {
        self.targets[target.index()]
    }
}

#[derive(Debug, Clone)]
pub struct TrainingSet {
    spec: FeatureSpec,
    schema: FeatureSchema,
    rows: Vec<TrainingRow>,
    pub players_seen: usize,
    pub players_used: usize,
    pub zero_minute_rows: usize,
}

impl TrainingSet {
    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Rows in chronological order: (`match_date`, `player_id`, `seq`).
    pub fn rows(&self) -> &[TrainingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// (features, target value) pairs for one predicted metric.
    pub fn examples(&self, target: Target) -> impl Iterator<Item = (&FeatureVector, f64)> {
        self.rows
            .iter()
            .map(move |row| (&row.features, row.target(target)))
    }
}

/// Training rows for a single player's observations. Players with too little
/// history produce an empty vector.
pub fn player_rows<'a, I>(observations: I, spec: &FeatureSpec) -> Result<Vec<TrainingRow>>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let history = order_history(observations)?;
    let features = build_features(&history, spec);
    Ok(history
        .into_iter()
        .zip(features)
        .filter_map(|(obs, fv)| {
            let features = fv?;
            let targets = Target::ALL.map(|t| obs.value(t.metric()));
            Some(TrainingRow {
                player_id: obs.player_id,
                match_date: obs.match_date,
                seq: obs.seq,
                features,
                targets,
            })
        })
        .collect())
}

/// Builds the training set for every player in `store`, one player per
/// rayon task. The result does not depend on scheduling.
pub fn assemble(store: &ObservationStore, spec: &FeatureSpec) -> Result<TrainingSet> {
    let groups: Vec<(&str, Vec<&Observation>)> = store.by_player().into_iter().collect();
    let per_player: Vec<Vec<TrainingRow>> = groups
        .par_iter()
        .map(|(_, rows)| player_rows(rows.iter().copied(), spec))
        .collect::<Result<_>>()?;

    let players_seen = per_player.len();
    let players_used = per_player.iter().filter(|rows| !rows.is_empty()).count();
    let mut rows: Vec<TrainingRow> = per_player.into_iter().flatten().collect();
    rows.sort_by(|a, b| {
        a.match_date
            .cmp(&b.match_date)
            .then_with(|| a.player_id.cmp(&b.player_id))
            .then(a.seq.cmp(&b.seq))
    });

    let zero_minute_rows = store
        .observations()
        .iter()
        .filter(|obs| !obs.is_eligible())
        .count();
    tracing::info!(
        rows = rows.len(),
        players_seen,
        players_used,
        zero_minute_rows,
        "assembled training set"
    );

    Ok(TrainingSet {
        schema: spec.schema(),
        spec: spec.clone(),
        rows,
        players_seen,
        players_used,
        zero_minute_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::tests::obs;

    fn store() -> ObservationStore {
        ObservationStore::new(vec![
            obs("saka", "2024-08-01", 0, 90.0, 0.3),
            obs("rice", "2024-08-01", 1, 90.0, 0.1),
            obs("saka", "2024-08-08", 2, 90.0, 0.5),
            obs("saka", "2024-08-15", 3, 0.0, 0.0),
            obs("saka", "2024-08-22", 4, 90.0, 0.9),
            obs("odegaard", "2024-08-22", 5, 0.0, 0.0),
        ])
    }

    #[test]
    fn one_row_per_observation_with_history() {
        let set = assemble(&store(), &FeatureSpec::default()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.players_seen, 3);
        assert_eq!(set.players_used, 1);
        assert_eq!(set.zero_minute_rows, 2);
        assert!(set.rows().iter().all(|r| r.player_id == "saka"));
    }

    #[test]
    fn zero_minute_rows_never_become_targets() {
        let set = assemble(&store(), &FeatureSpec::default()).unwrap();
        let dates: Vec<String> = set.rows().iter().map(|r| r.match_date.to_string()).collect();
        assert_eq!(dates, vec!["2024-08-08", "2024-08-22"]);
        let last = &set.rows()[1];
        assert_eq!(last.target(Target::Xg), 0.9);
        assert!((last.features.values()[0] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn examples_pair_features_with_current_target() {
        let set = assemble(&store(), &FeatureSpec::default()).unwrap();
        let (fv, y) = set.examples(Target::Xg).next().unwrap();
        assert_eq!(y, 0.5);
        assert!((fv.values()[0] - 0.3).abs() < 1e-12);
    }
}
