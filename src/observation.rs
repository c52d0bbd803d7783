use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// One player's involvement in one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub player_id: String,
    pub team_id: String,
    pub match_date: NaiveDate,
    /// Ingestion order. Breaks ties between two matches on the same date.
    pub seq: u64,
    pub minutes_played: f64,
    pub goals: f64,
    pub assists: f64,
    #[serde(rename = "xG")]
    pub xg: f64,
    #[serde(rename = "xA")]
    pub xa: f64,
    pub passes_completed: f64,
    pub dribbles_successful: f64,
}

impl Observation {
    /// Zero-minute rows are missing data, not zero performance.
    pub fn is_eligible(&self) -> bool {
        self.minutes_played > 0.0
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Goals => self.goals,
            Metric::Assists => self.assists,
            Metric::Xg => self.xg,
            Metric::Xa => self.xa,
            Metric::Passes => self.passes_completed,
            Metric::Dribbles => self.dribbles_successful,
            Metric::Minutes => self.minutes_played,
        }
    }

    /// Rejects non-finite values and negative minutes. `row` is only used
    /// in the error.
    pub fn validate(&self, row: usize) -> Result<()> {
        for metric in Metric::ALL {
            let v = self.value(metric);
            if !v.is_finite() {
                return Err(ForecastError::MalformedRow {
                    row,
                    reason: format!("non-finite {metric} {v}"),
                });
            }
        }
        if self.minutes_played < 0.0 {
            return Err(ForecastError::MalformedRow {
                row,
                reason: format!("negative minutes_played {}", self.minutes_played),
            });
        }
        Ok(())
    }

    pub fn chrono_cmp(&self, other: &Self) -> Ordering {
        self.match_date
            .cmp(&other.match_date)
            .then(self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Goals,
    Assists,
    Xg,
    Xa,
    Passes,
    Dribbles,
    Minutes,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Goals,
        Metric::Assists,
        Metric::Xg,
        Metric::Xa,
        Metric::Passes,
        Metric::Dribbles,
        Metric::Minutes,
    ];

    /// Metrics summarized by the rolling-window features, in column order.
    pub const FEATURES: [Metric; 5] = [
        Metric::Xg,
        Metric::Xa,
        Metric::Passes,
        Metric::Dribbles,
        Metric::Minutes,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::Goals => "Goals",
            Metric::Assists => "Assists",
            Metric::Xg => "xG",
            Metric::Xa => "xA",
            Metric::Passes => "Passes",
            Metric::Dribbles => "Dribbles",
            Metric::Minutes => "Minutes",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A predicted metric. Each one gets its own trained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Target {
    #[serde(rename = "xG")]
    Xg,
    #[serde(rename = "xA")]
    Xa,
    Passes,
    Dribbles,
}

impl Target {
    pub const ALL: [Target; 4] = [Target::Xg, Target::Xa, Target::Passes, Target::Dribbles];

    pub fn metric(self) -> Metric {
        match self {
            Target::Xg => Metric::Xg,
            Target::Xa => Metric::Xa,
            Target::Passes => Metric::Passes,
            Target::Dribbles => Metric::Dribbles,
        }
    }

    pub fn name(self) -> &'static str {
        self.metric().label()
    }

    pub fn index(self) -> usize {
        match self {
            Target::Xg => 0,
            Target::Xa => 1,
            Target::Passes => 2,
            Target::Dribbles => 3,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        Target::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ForecastError::InvalidConfig(format!("unknown target metric '{s}'")))
    }
}

/// Restricts `observations` to eligible rows and sorts them by
/// (`match_date`, `seq`). Fails when two rows of the same player cannot be
/// ordered.
pub fn order_history<'a, I>(observations: I) -> Result<Vec<Observation>>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut out: Vec<Observation> = observations
        .into_iter()
        .filter(|obs| obs.is_eligible())
        .cloned()
        .collect();
    if let Some(first) = out.first()
        && let Some(other) = out.iter().find(|obs| obs.player_id != first.player_id)
    {
        return Err(ForecastError::MixedPlayers {
            first: first.player_id.clone(),
            other: other.player_id.clone(),
        });
    }
    out.sort_by(Observation::chrono_cmp);
    for pair in out.windows(2) {
        if pair[0].chrono_cmp(&pair[1]) == Ordering::Equal {
            return Err(ForecastError::AmbiguousOrdering {
                player_id: pair[1].player_id.clone(),
                match_date: pair[1].match_date,
                seq: pair[1].seq,
            });
        }
    }
    Ok(out)
}
