use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};

use crate::error::{ForecastError, Result};
use crate::observation::Observation;
use crate::observation_store::ObservationStore;

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS observations (
            player_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            match_date TEXT NOT NULL,
            seq INTEGER NOT NULL,
            minutes_played REAL NOT NULL,
            goals REAL NOT NULL,
            assists REAL NOT NULL,
            xg REAL NOT NULL,
            xa REAL NOT NULL,
            passes_completed REAL NOT NULL,
            dribbles_successful REAL NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (player_id, match_date, seq)
        );
        CREATE INDEX IF NOT EXISTS idx_observations_team ON observations(team_id);
        CREATE INDEX IF NOT EXISTS idx_observations_date ON observations(match_date);
        "#,
    )?;
    Ok(())
}

/// Inserts or replaces rows keyed by (`player_id`, `match_date`, `seq`).
/// Returns the number of rows written.
pub fn upsert_observations(conn: &mut Connection, rows: &[Observation]) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO observations (
                player_id, team_id, match_date, seq, minutes_played, goals, assists,
                xg, xa, passes_completed, dribbles_successful, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(player_id, match_date, seq) DO UPDATE SET
                team_id = excluded.team_id,
                minutes_played = excluded.minutes_played,
                goals = excluded.goals,
                assists = excluded.assists,
                xg = excluded.xg,
                xa = excluded.xa,
                passes_completed = excluded.passes_completed,
                dribbles_successful = excluded.dribbles_successful,
                updated_at = excluded.updated_at
            "#,
        )?;
        for obs in rows {
            stmt.execute(params![
                obs.player_id,
                obs.team_id,
                obs.match_date.format("%Y-%m-%d").to_string(),
                obs.seq as i64,
                obs.minutes_played,
                obs.goals,
                obs.assists,
                obs.xg,
                obs.xa,
                obs.passes_completed,
                obs.dribbles_successful,
                now,
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

pub fn load_store(conn: &Connection) -> Result<ObservationStore> {
    let mut stmt = conn.prepare(
        r#"
        SELECT player_id, team_id, match_date, seq, minutes_played, goals, assists,
               xg, xa, passes_completed, dribbles_successful
        FROM observations
        ORDER BY player_id, match_date, seq
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            [
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, f64>(7)?,
                row.get::<_, f64>(8)?,
                row.get::<_, f64>(9)?,
                row.get::<_, f64>(10)?,
            ],
        ))
    })?;

    let mut out = Vec::new();
    for (row_idx, row) in rows.enumerate() {
        let (player_id, team_id, raw_date, seq, nums) = row?;
        let match_date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|_| {
            ForecastError::MalformedRow {
                row: row_idx,
                reason: format!("unparseable match_date '{raw_date}'"),
            }
        })?;
        let seq = u64::try_from(seq).map_err(|_| ForecastError::MalformedRow {
            row: row_idx,
            reason: format!("negative seq {seq}"),
        })?;
        let [minutes_played, goals, assists, xg, xa, passes_completed, dribbles_successful] = nums;
        let obs = Observation {
            player_id,
            team_id,
            match_date,
            seq,
            minutes_played,
            goals,
            assists,
            xg,
            xa,
            passes_completed,
            dribbles_successful,
        };
        obs.validate(row_idx)?;
        out.push(obs);
    }
    Ok(ObservationStore::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::tests::obs;

    #[test]
    fn upsert_then_load_keeps_rows_and_replaces_duplicates() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let mut rows = vec![
            obs("saka", "2024-08-17", 0, 90.0, 0.6),
            obs("saka", "2024-08-24", 1, 85.0, 0.2),
        ];
        upsert_observations(&mut conn, &rows).unwrap();
        rows[1].xg = 0.4;
        upsert_observations(&mut conn, &rows[1..]).unwrap();

        let store = load_store(&conn).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.observations()[1].xg, 0.4);
        assert_eq!(store.observations()[1].seq, 1);
    }

    fn insert_raw(conn: &Connection, seq: i64, minutes: f64) {
        conn.execute(
            "INSERT INTO observations VALUES ('saka', 'arsenal', '2024-08-17', ?1, ?2, 0, 0, 0.1, 0, 20, 1, 'now')",
            params![seq, minutes],
        )
        .unwrap();
    }

    #[test]
    fn negative_seq_is_malformed() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        insert_raw(&conn, -1, 90.0);
        assert!(matches!(
            load_store(&conn),
            Err(ForecastError::MalformedRow { .. })
        ));
    }

    #[test]
    fn negative_minutes_are_malformed() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        insert_raw(&conn, 0, -5.0);
        let err = load_store(&conn).unwrap_err();
        assert!(err.to_string().contains("negative minutes_played"));
    }
}
