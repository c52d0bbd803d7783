//! Seeded synthetic league seasons for the demo dashboard, benches and tests.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ForecastError, Result};
use crate::features::FeatureSpec;
use crate::forecast_context::ForecastSource;
use crate::observation::Observation;
use crate::observation_store::ObservationStore;
use crate::predictor::Predictor;
use crate::trainer::{TrainerConfig, train_all};
use crate::training_set::assemble;

const TEAMS: [&str; 8] = [
    "Arsenal",
    "Aston Villa",
    "Brighton",
    "Chelsea",
    "Liverpool",
    "Man City",
    "Newcastle",
    "Tottenham",
];

#[derive(Debug, Clone)]
pub struct SeasonConfig {
    pub teams: usize,
    pub players_per_team: usize,
    pub matches: usize,
    pub start: NaiveDate,
    pub days_between: i64,
    /// Probability that a squad player does not get on the pitch.
    pub zero_minute_rate: f64,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            teams: 4,
            players_per_team: 6,
            matches: 24,
            start: NaiveDate::from_ymd_opt(2024, 8, 17).unwrap_or_default(),
            days_between: 7,
            zero_minute_rate: 0.08,
        }
    }
}

struct Profile {
    player_id: String,
    team_id: String,
    xg_per90: f64,
    xa_per90: f64,
    passes_per90: f64,
    dribbles_per90: f64,
}

/// Generates one observation per player per matchday. The same config and
/// seed always produce the same store.
pub fn season(config: &SeasonConfig, seed: u64) -> ObservationStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut profiles = Vec::new();
    for t in 0..config.teams {
        let team = TEAMS
            .get(t)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("Team {}", t + 1));
        for p in 0..config.players_per_team {
            profiles.push(Profile {
                player_id: format!("{team} #{}", p + 1),
                team_id: team.clone(),
                xg_per90: rng.gen_range(0.02..0.65),
                xa_per90: rng.gen_range(0.02..0.4),
                passes_per90: rng.gen_range(15.0..70.0),
                dribbles_per90: rng.gen_range(0.2..3.5),
            });
        }
    }

    let mut out = Vec::with_capacity(profiles.len() * config.matches);
    let mut seq = 0u64;
    for round in 0..config.matches {
        let match_date = config.start + Duration::days(config.days_between * round as i64);
        // Slow drift in form across the season.
        let phase = (round as f64 / 6.0).sin() * 0.15;
        for profile in &profiles {
            let minutes_played = if rng.gen_bool(config.zero_minute_rate.clamp(0.0, 1.0)) {
                0.0
            } else if rng.gen_bool(0.75) {
                90.0
            } else {
                rng.gen_range(15..=89) as f64
            };
            let share = minutes_played / 90.0;
            let form = 1.0 + phase + rng.gen_range(-0.35..0.35);
            let noisy = |rate: f64, rng: &mut StdRng| {
                if minutes_played == 0.0 {
                    0.0
                } else {
                    (rate * share * form * rng.gen_range(0.5..1.5)).max(0.0)
                }
            };
            let xg = noisy(profile.xg_per90, &mut rng);
            let xa = noisy(profile.xa_per90, &mut rng);
            let passes = noisy(profile.passes_per90, &mut rng).round();
            let dribbles = noisy(profile.dribbles_per90, &mut rng).round();
            let goals = if minutes_played > 0.0 && rng.gen_bool(xg.min(0.95)) { 1.0 } else { 0.0 };
            let assists = if minutes_played > 0.0 && rng.gen_bool(xa.min(0.95)) { 1.0 } else { 0.0 };
            out.push(Observation {
                player_id: profile.player_id.clone(),
                team_id: profile.team_id.clone(),
                match_date,
                seq,
                minutes_played,
                goals,
                assists,
                xg: (xg * 100.0).round() / 100.0,
                xa: (xa * 100.0).round() / 100.0,
                passes_completed: passes,
                dribbles_successful: dribbles,
            });
            seq += 1;
        }
    }
    ObservationStore::new(out)
}

/// Generates a season and trains fresh models on it at load time.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub config: SeasonConfig,
    pub seed: u64,
    pub spec: FeatureSpec,
    pub trainer: TrainerConfig,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self {
            config: SeasonConfig::default(),
            seed,
            spec: FeatureSpec::default(),
            trainer: TrainerConfig::default(),
        }
    }
}

impl ForecastSource for SyntheticSource {
    fn load_observations(&self) -> Result<ObservationStore> {
        if self.config.teams == 0 || self.config.players_per_team == 0 {
            return Err(ForecastError::InvalidConfig(
                "synthetic season needs at least one team and player".to_string(),
            ));
        }
        Ok(season(&self.config, self.seed))
    }

    fn load_predictor(&self, store: &ObservationStore) -> Result<Predictor> {
        let set = assemble(store, &self.spec)?;
        let run = train_all(&set, &self.trainer)?;
        Predictor::new(run.models, self.spec.clone())
    }

    fn describe(&self) -> String {
        format!("synthetic season (seed {})", self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_season() {
        let cfg = SeasonConfig::default();
        let a = season(&cfg, 7);
        let b = season(&cfg, 7);
        assert_eq!(a.observations(), b.observations());
        assert_ne!(a.observations(), season(&cfg, 8).observations());
    }

    #[test]
    fn season_shape_matches_config() {
        let cfg = SeasonConfig {
            teams: 2,
            players_per_team: 3,
            matches: 10,
            zero_minute_rate: 0.3,
            ..SeasonConfig::default()
        };
        let store = season(&cfg, 1);
        let summary = store.summary();
        assert_eq!(summary.rows, 60);
        assert_eq!(summary.players, 6);
        assert_eq!(summary.teams, 2);
        assert!(summary.zero_minute_rows > 0);
        assert!(
            store
                .observations()
                .iter()
                .filter(|o| !o.is_eligible())
                .all(|o| o.xg == 0.0 && o.passes_completed == 0.0)
        );
    }
}
