//! Conversion of a flattened FBref player-match "summary" export into the
//! canonical observation layout.

use std::fs::File;
use std::io;
use std::path::Path;

use csv::StringRecord;

use crate::error::{ForecastError, Result};
use crate::observation::Observation;
use crate::observation_store::{ObservationStore, parse_match_date};

/// (field, export header). Headers are compared after trimming the trailing
/// `_` left behind by flattening two-level column labels.
const RENAME_MAP: [(&str, &str); 10] = [
    ("player_id", "player"),
    ("team_id", "team"),
    ("match", "game"),
    ("goals", "Performance_Gls"),
    ("assists", "Performance_Ast"),
    ("xG", "Expected_xG"),
    ("xA", "Expected_xAG"),
    ("passes_completed", "Passes_Cmp"),
    ("dribbles_successful", "Take-Ons_Succ"),
    ("minutes_played", "min"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub dropped_bad_date: usize,
    pub dropped_zero_minutes: usize,
    pub kept: usize,
}

pub fn import_file(path: &Path) -> Result<(ObservationStore, ImportSummary)> {
    let file = File::open(path).map_err(|err| ForecastError::io(path, err))?;
    import_reader(file)
}

/// Rows whose match label does not start with a `YYYY-MM-DD` date and rows
/// with no minutes played are dropped. The result is sorted by player, then
/// date; `seq` keeps the export row index.
pub fn import_reader<R: io::Read>(reader: R) -> Result<(ObservationStore, ImportSummary)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut idx = [0usize; RENAME_MAP.len()];
    let mut missing = Vec::new();
    for (slot, (field, header)) in RENAME_MAP.iter().enumerate() {
        match export_column(&headers, header) {
            Some(pos) => idx[slot] = pos,
            None => missing.push(format!("{header} ({field})")),
        }
    }
    if !missing.is_empty() {
        return Err(ForecastError::MissingColumns(missing));
    }

    let mut summary = ImportSummary::default();
    let mut out = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        summary.rows_read += 1;

        let game = record.get(idx[2]).unwrap_or("");
        let Some(match_date) = parse_match_date(game) else {
            summary.dropped_bad_date += 1;
            tracing::debug!(row, game, "skipping row without a leading match date");
            continue;
        };
        let minutes_played = number(&record, idx[9], row, "min")?;
        if minutes_played <= 0.0 {
            summary.dropped_zero_minutes += 1;
            continue;
        }
        let player_id = record.get(idx[0]).unwrap_or("").trim().to_string();
        let team_id = record.get(idx[1]).unwrap_or("").trim().to_string();
        if player_id.is_empty() || team_id.is_empty() {
            return Err(ForecastError::MalformedRow {
                row,
                reason: "empty player or team".to_string(),
            });
        }

        out.push(Observation {
            player_id,
            team_id,
            match_date,
            seq: row as u64,
            minutes_played,
            goals: number(&record, idx[3], row, "Performance_Gls")?,
            assists: number(&record, idx[4], row, "Performance_Ast")?,
            xg: number(&record, idx[5], row, "Expected_xG")?,
            xa: number(&record, idx[6], row, "Expected_xAG")?,
            passes_completed: number(&record, idx[7], row, "Passes_Cmp")?,
            dribbles_successful: number(&record, idx[8], row, "Take-Ons_Succ")?,
        });
    }

    out.sort_by(|a, b| a.player_id.cmp(&b.player_id).then(a.chrono_cmp(b)));
    summary.kept = out.len();
    if summary.dropped_bad_date > 0 {
        tracing::warn!(
            dropped = summary.dropped_bad_date,
            "rows without a parseable match date were dropped"
        );
    }
    Ok((ObservationStore::new(out), summary))
}

/// Header names of a CSV file, in file order.
pub fn read_columns(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

pub fn looks_like_xg(column: &str) -> bool {
    column.to_ascii_lowercase().contains("xg")
}

fn export_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().trim_end_matches('_').eq_ignore_ascii_case(name))
}

/// Empty cells count as zero, as the export leaves them blank for players
/// without the event.
fn number(record: &StringRecord, idx: usize, row: usize, name: &str) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ForecastError::MalformedRow {
            row,
            reason: format!("unparseable {name} '{raw}'"),
        })
}
