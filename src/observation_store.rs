use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::error::{ForecastError, Result};
use crate::observation::Observation;

// Accepted header names per field, compared case-insensitively. Short
// names such as `Player`, `Date` and `Minutes` are accepted too.
const PLAYER_COLS: &[&str] = &["player_id", "player"];
const TEAM_COLS: &[&str] = &["team_id", "team"];
const DATE_COLS: &[&str] = &["match_date", "date"];
const MINUTES_COLS: &[&str] = &["minutes_played", "minutes", "min"];
const GOALS_COLS: &[&str] = &["goals"];
const ASSISTS_COLS: &[&str] = &["assists"];
const XG_COLS: &[&str] = &["xg"];
const XA_COLS: &[&str] = &["xa"];
const PASSES_COLS: &[&str] = &["passes_completed", "passes"];
const DRIBBLES_COLS: &[&str] = &["dribbles_successful", "dribbles"];
const SEQ_COLS: &[&str] = &["seq"];

/// Immutable, in-memory collection of every observation in a dataset.
#[derive(Debug, Clone, Default)]
pub struct ObservationStore {
    observations: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSummary {
    pub rows: usize,
    pub players: usize,
    pub teams: usize,
    pub zero_minute_rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

struct ColumnMap {
    player: usize,
    team: usize,
    date: usize,
    minutes: usize,
    goals: usize,
    assists: usize,
    xg: usize,
    xa: usize,
    passes: usize,
    dribbles: usize,
    seq: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let mut missing = Vec::new();
        let mut find = |aliases: &[&str]| -> usize {
            match find_column(headers, aliases) {
                Some(idx) => idx,
                None => {
                    missing.push(aliases[0].to_string());
                    usize::MAX
                }
            }
        };
        let map = ColumnMap {
            player: find(PLAYER_COLS),
            team: find(TEAM_COLS),
            date: find(DATE_COLS),
            minutes: find(MINUTES_COLS),
            goals: find(GOALS_COLS),
            assists: find(ASSISTS_COLS),
            xg: find(XG_COLS),
            xa: find(XA_COLS),
            passes: find(PASSES_COLS),
            dribbles: find(DRIBBLES_COLS),
            seq: None,
        };
        if !missing.is_empty() {
            return Err(ForecastError::MissingColumns(missing));
        }
        Ok(ColumnMap {
            seq: find_column(headers, SEQ_COLS),
            ..map
        })
    }

    fn observation(&self, record: &StringRecord, row: usize) -> Result<Observation> {
        let player_id = text_field(record, self.player, row, "player_id")?;
        let team_id = text_field(record, self.team, row, "team_id")?;
        let raw_date = record.get(self.date).unwrap_or("");
        let match_date = parse_match_date(raw_date).ok_or_else(|| ForecastError::MalformedRow {
            row,
            reason: format!("unparseable match_date '{raw_date}'"),
        })?;
        let seq = match self.seq {
            Some(idx) => {
                let raw = record.get(idx).unwrap_or("").trim();
                raw.parse::<u64>().map_err(|_| ForecastError::MalformedRow {
                    row,
                    reason: format!("unparseable seq '{raw}'"),
                })?
            }
            None => row as u64,
        };
        let obs = Observation {
            player_id,
            team_id,
            match_date,
            seq,
            minutes_played: num_field(record, self.minutes, row, "minutes_played")?,
            goals: num_field(record, self.goals, row, "goals")?,
            assists: num_field(record, self.assists, row, "assists")?,
            xg: num_field(record, self.xg, row, "xG")?,
            xa: num_field(record, self.xa, row, "xA")?,
            passes_completed: num_field(record, self.passes, row, "passes_completed")?,
            dribbles_successful: num_field(record, self.dribbles, row, "dribbles_successful")?,
        };
        obs.validate(row)?;
        Ok(obs)
    }
}

impl ObservationStore {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| ForecastError::io(path, err))?;
        let store = Self::from_reader(file)?;
        tracing::info!(
            path = %path.display(),
            rows = store.len(),
            "loaded observation store"
        );
        Ok(store)
    }

    /// Reads a CSV with a header row. Missing required columns fail before
    /// any row is read.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = reader.headers()?.clone();
        let columns = ColumnMap::resolve(&headers)?;

        let mut observations = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            observations.push(columns.observation(&record, row)?);
        }
        Ok(Self { observations })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let mut writer = csv::Writer::from_path(path)?;
        for obs in &self.observations {
            writer.serialize(obs)?;
        }
        writer.flush().map_err(|err| ForecastError::io(path, err))?;
        Ok(())
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations grouped per player, each group in store order.
    pub fn by_player(&self) -> BTreeMap<&str, Vec<&Observation>> {
        let mut out: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
        for obs in &self.observations {
            out.entry(obs.player_id.as_str()).or_default().push(obs);
        }
        out
    }

    pub fn player_ids(&self) -> Vec<&str> {
        self.observations
            .iter()
            .map(|obs| obs.player_id.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every row of one player, zero-minute rows included, in chronological
    /// order.
    pub fn history(&self, player_id: &str) -> Vec<&Observation> {
        let mut rows: Vec<&Observation> = self
            .observations
            .iter()
            .filter(|obs| obs.player_id == player_id)
            .collect();
        rows.sort_by(|a, b| a.chrono_cmp(b));
        rows
    }

    pub fn teams(&self) -> Vec<&str> {
        self.observations
            .iter()
            .map(|obs| obs.team_id.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn players_for_team(&self, team_id: &str) -> Vec<&str> {
        self.observations
            .iter()
            .filter(|obs| obs.team_id == team_id)
            .map(|obs| obs.player_id.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn summary(&self) -> StoreSummary {
        let dates = self.observations.iter().map(|obs| obs.match_date);
        StoreSummary {
            rows: self.observations.len(),
            players: self.player_ids().len(),
            teams: self.teams().len(),
            zero_minute_rows: self
                .observations
                .iter()
                .filter(|obs| !obs.is_eligible())
                .count(),
            first_date: dates.clone().min(),
            last_date: dates.max(),
        }
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_match_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let head = trimmed.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn find_column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.iter().any(|a| h.trim().eq_ignore_ascii_case(a)))
}

fn text_field(record: &StringRecord, idx: usize, row: usize, name: &str) -> Result<String> {
    let raw = record.get(idx).unwrap_or("").trim();
    if raw.is_empty() {
        return Err(ForecastError::MalformedRow {
            row,
            reason: format!("empty {name}"),
        });
    }
    Ok(raw.to_string())
}

fn num_field(record: &StringRecord, idx: usize, row: usize, name: &str) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("").trim();
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ForecastError::MalformedRow {
            row,
            reason: format!("unparseable {name} '{raw}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "\
player_id,team_id,match_date,minutes_played,goals,assists,xG,xA,passes_completed,dribbles_successful
saka,arsenal,2024-08-17,90,1,0,0.6,0.2,31,3
saka,arsenal,2024-08-24,0,0,0,0,0,0,0
rice,arsenal,2024-08-17,88,0,1,0.1,0.4,55,1
";

    #[test]
    fn reads_canonical_headers() {
        let store = ObservationStore::from_reader(CANONICAL.as_bytes()).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.observations()[0].seq, 0);
        assert_eq!(store.observations()[2].seq, 2);
        assert_eq!(store.player_ids(), vec!["rice", "saka"]);
        assert_eq!(store.players_for_team("arsenal").len(), 2);
    }

    #[test]
    fn reads_short_headers_and_datetime_dates() {
        let raw = "\
Player,Team,Match,Goals,Assists,xG,xA,Passes,Dribbles,Minutes,Date
Bukayo Saka,Arsenal,2024-08-17 Arsenal 2-0 Wolves,1,0,0.6,0.2,31,3,90,2024-08-17 00:00:00
";
        let store = ObservationStore::from_reader(raw.as_bytes()).unwrap();
        let obs = &store.observations()[0];
        assert_eq!(obs.player_id, "Bukayo Saka");
        assert_eq!(obs.match_date, NaiveDate::from_ymd_opt(2024, 8, 17).unwrap());
        assert_eq!(obs.passes_completed, 31.0);
    }

    #[test]
    fn missing_metric_columns_are_fatal() {
        let raw = "player_id,team_id,match_date,minutes_played,goals,assists,xG\n";
        match ObservationStore::from_reader(raw.as_bytes()) {
            Err(ForecastError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["xa", "passes_completed", "dribbles_successful"]);
            }
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn malformed_numbers_are_fatal() {
        let raw = CANONICAL.replace("0.6", "n/a");
        assert!(matches!(
            ObservationStore::from_reader(raw.as_bytes()),
            Err(ForecastError::MalformedRow { row: 0, .. })
        ));
    }

    #[test]
    fn negative_minutes_are_fatal() {
        let raw = CANONICAL.replace(",88,", ",-88,");
        assert!(matches!(
            ObservationStore::from_reader(raw.as_bytes()),
            Err(ForecastError::MalformedRow { row: 2, .. })
        ));
    }

    #[test]
    fn summary_counts_zero_minute_rows() {
        let store = ObservationStore::from_reader(CANONICAL.as_bytes()).unwrap();
        let summary = store.summary();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.players, 2);
        assert_eq!(summary.zero_minute_rows, 1);
        assert_eq!(
            summary.last_date,
            NaiveDate::from_ymd_opt(2024, 8, 24)
        );
    }
}
