use std::path::PathBuf;

use form_forecast::ForecastError;
use form_forecast::fbref_import::import_file;
use form_forecast::observation_db;
use form_forecast::observation_store::ObservationStore;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn loads_short_header_names() {
    let store = ObservationStore::load_csv(&fixture("observations.csv")).unwrap();
    let summary = store.summary();
    assert_eq!(summary.rows, 17);
    assert_eq!(summary.players, 3);
    assert_eq!(summary.teams, 2);
    assert_eq!(summary.zero_minute_rows, 2);
    assert_eq!(summary.first_date.unwrap().to_string(), "2024-08-17");
    assert_eq!(summary.last_date.unwrap().to_string(), "2024-09-28");
    assert_eq!(store.players_for_team("Chelsea"), vec!["Cole Palmer"]);
}

#[test]
fn seq_defaults_to_the_data_row_index() {
    let store = ObservationStore::load_csv(&fixture("observations.csv")).unwrap();
    let seqs: Vec<u64> = store.observations().iter().map(|o| o.seq).collect();
    assert_eq!(seqs, (0..17).collect::<Vec<u64>>());
}

#[test]
fn missing_columns_fail_before_any_row() {
    let raw = "player_id,team_id,match_date,minutes_played,goals\nsaka,ars,2024-08-01,90,1\n";
    match ObservationStore::from_reader(raw.as_bytes()) {
        Err(ForecastError::MissingColumns(cols)) => {
            assert_eq!(cols, vec!["assists", "xg", "xa", "passes_completed", "dribbles_successful"]);
        }
        other => panic!("expected missing columns, got {other:?}"),
    }
}

#[test]
fn bad_dates_in_the_canonical_store_are_fatal() {
    let raw = "player,team,date,minutes,goals,assists,xg,xa,passes,dribbles\n\
               saka,ars,last week,90,0,0,0.1,0.1,20,1\n";
    assert!(matches!(
        ObservationStore::from_reader(raw.as_bytes()),
        Err(ForecastError::MalformedRow { row: 0, .. })
    ));
}

#[test]
fn written_csv_reads_back_identically() {
    let store = ObservationStore::load_csv(&fixture("observations.csv")).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("canonical.csv");
    store.write_csv(&out).unwrap();

    let back = ObservationStore::load_csv(&out).unwrap();
    assert_eq!(back.observations(), store.observations());
}

#[test]
fn fbref_export_is_converted() {
    let (store, summary) = import_file(&fixture("fbref_export.csv")).unwrap();
    assert_eq!(summary.rows_read, 7);
    assert_eq!(summary.dropped_bad_date, 1);
    assert_eq!(summary.dropped_zero_minutes, 1);
    assert_eq!(summary.kept, 5);

    let players: Vec<&str> = store
        .observations()
        .iter()
        .map(|o| o.player_id.as_str())
        .collect();
    assert_eq!(
        players,
        vec!["Bukayo Saka", "Bukayo Saka", "Bukayo Saka", "Cole Palmer", "Kai Havertz"]
    );
    let havertz = &store.observations()[4];
    assert_eq!(havertz.dribbles_successful, 0.0);
    assert_eq!(havertz.match_date.to_string(), "2024-08-24");
}

#[test]
fn sqlite_store_round_trips_the_fixture() {
    let store = ObservationStore::load_csv(&fixture("observations.csv")).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut conn = observation_db::open_db(&dir.path().join("obs.sqlite")).unwrap();
    assert_eq!(
        observation_db::upsert_observations(&mut conn, store.observations()).unwrap(),
        17
    );
    let loaded = observation_db::load_store(&conn).unwrap();
    assert_eq!(loaded.len(), 17);
    assert_eq!(loaded.summary(), store.summary());
}
