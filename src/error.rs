use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T, E = ForecastError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("observation source is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("ambiguous ordering for player {player_id}: two observations on {match_date} share seq {seq}")]
    AmbiguousOrdering {
        player_id: String,
        match_date: NaiveDate,
        seq: u64,
    },

    #[error("history mixes players {first} and {other}")]
    MixedPlayers { first: String, other: String },

    #[error("feature schema mismatch for {model}: expected [{}], got [{}]", .expected.join(", "), .actual.join(", "))]
    SchemaMismatch {
        model: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("insufficient training data for {target}: {reason}")]
    InsufficientTrainingData { target: String, reason: String },

    #[error("no model artifact for {target} in {}", .dir.display())]
    MissingArtifact { target: String, dir: PathBuf },

    #[error("unsupported artifact version {found} in {} (expected {expected})", .path.display())]
    ArtifactVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForecastError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
