//! Tests for the script replay driver and the command line binary
//!
//! Scripts refer to earlier commits by position, so these tests focus on
//! failed steps under `--keep-going` and on the final report.

mod fixtures;

use rating_ledger::replay::{Replay, Script};
use rating_ledger::Outcome;
use serde_json::Value;
use std::process::Command;

use fixtures::create_test_ledger;

async fn replay_of(json: &str) -> (Replay, Script) {
    let script = Script::from_json(json).unwrap();
    let (ledger, _store) = create_test_ledger();
    let replay = Replay::new(ledger, &script.players).await.unwrap();
    (replay, script)
}

/// A failed commit, then a reverse of the commit after it
const SHIFTED_SCRIPT: &str = r#"{
    "players": ["ann", "bob", "cat", "dan"],
    "steps": [
        {"op": "commit", "a": "ann", "b": "bob", "outcome": "A_WIN"},
        {"op": "commit", "a": "ann", "b": "ann", "outcome": "DRAW"},
        {"op": "commit", "a": "cat", "b": "dan", "outcome": "B_WIN"},
        {"op": "reverse", "game": 1}
    ]
}"#;

fn named<'a>(report: &'a Value, name: &str) -> &'a Value {
    report["players"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == name)
        .unwrap()
}

#[tokio::test]
async fn test_failed_commit_keeps_game_indexes_aligned() {
    let (mut replay, script) = replay_of(SHIFTED_SCRIPT).await;

    // The same-player commit fails, and so does the reverse of its slot
    let failed = replay.run_all(&script.steps, true).await.unwrap();
    assert_eq!(failed, 2);

    let report = replay.report().await.unwrap();
    assert_eq!(report.matches.len(), 2);
    for entry in &report.players {
        assert_eq!(entry.player.games_played, 1, "{} lost a game", entry.name);
    }

    println!("✅ Keep-going index alignment test passed");
}

#[tokio::test]
async fn test_without_keep_going_first_failure_stops_replay() {
    let (mut replay, script) = replay_of(SHIFTED_SCRIPT).await;

    let err = replay.run_all(&script.steps, false).await.unwrap_err();
    assert!(format!("{:#}", err).contains("Step 1 failed"));

    let report = replay.report().await.unwrap();
    assert_eq!(report.matches.len(), 1);
}

#[tokio::test]
async fn test_amend_and_reverse_follow_the_amended_match() {
    let (mut replay, script) = replay_of(
        r#"{
            "players": ["ann", "bob"],
            "steps": [
                {"op": "commit", "a": "ann", "b": "bob", "outcome": "A_WIN", "at": "2024-03-09T19:30:00Z"},
                {"op": "amend", "game": 0, "outcome": "B_WIN"}
            ]
        }"#,
    )
    .await;
    replay.run_all(&script.steps, false).await.unwrap();

    let report = replay.report().await.unwrap();
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].outcome(), Outcome::BWin);
    assert_eq!(
        report.matches[0].timestamp().to_rfc3339(),
        "2024-03-09T19:30:00+00:00"
    );

    // The game slot now points at the replacement match
    replay
        .run_all(
            &Script::from_json(r#"{"players": [], "steps": [{"op": "reverse", "game": 0}]}"#)
                .unwrap()
                .steps,
            false,
        )
        .await
        .unwrap();
    assert!(replay.ledger().matches().await.unwrap().is_empty());
    for entry in replay.report().await.unwrap().players {
        assert_eq!(entry.player.rating, 1200);
        assert_eq!(entry.player.games_played, 0);
    }
}

#[tokio::test]
async fn test_report_drops_removed_players_but_keeps_matches() {
    let (mut replay, script) = replay_of(
        r#"{
            "players": ["ann", "bob", "cat"],
            "steps": [
                {"op": "commit", "a": "ann", "b": "bob", "outcome": "DRAW"},
                {"op": "commit", "a": "bob", "b": "cat", "outcome": "A_WIN"},
                {"op": "correct", "player": "cat", "rating": 1000, "wins": 0, "draws": 0, "losses": 5},
                {"op": "remove", "player": "bob"}
            ]
        }"#,
    )
    .await;
    replay.run_all(&script.steps, false).await.unwrap();

    let report = replay.report().await.unwrap();
    let names: Vec<&str> = report.players.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["ann", "cat"]);
    assert_eq!(report.players[1].player.losses, 5);

    let ids: Vec<u64> = report.matches.iter().map(|m| m.id()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids, sorted);
}

#[tokio::test]
async fn test_duplicate_player_names_are_rejected() {
    let (ledger, _store) = create_test_ledger();
    let names = vec!["ann".to_string(), "ann".to_string()];
    assert!(Replay::new(ledger, &names).await.is_err());
}

#[test]
fn test_binary_replays_script_with_keep_going() {
    let path = std::env::temp_dir().join(format!("rating-ledger-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, SHIFTED_SCRIPT).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_rating-ledger"))
        .arg("--script")
        .arg(&path)
        .arg("--keep-going")
        .env_remove("RATING_INITIAL_RATING")
        .env_remove("LOG_LEVEL")
        .env_remove("SERVICE_NAME")
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    let _ = std::fs::remove_file(&path);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(report["matches"].as_array().unwrap().len(), 2);
    assert_eq!(named(&report, "ann")["rating"], 1216);
    assert_eq!(named(&report, "bob")["rating"], 1184);
    assert_eq!(named(&report, "cat")["games_played"], 1);
    assert_eq!(named(&report, "dan")["wins"], 1);
}

#[test]
fn test_binary_stops_on_failure_without_keep_going() {
    let path = std::env::temp_dir().join(format!("rating-ledger-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, SHIFTED_SCRIPT).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_rating-ledger"))
        .arg("--script")
        .arg(&path)
        .env_remove("RATING_INITIAL_RATING")
        .env_remove("LOG_LEVEL")
        .env_remove("SERVICE_NAME")
        .output()
        .unwrap();
    let _ = std::fs::remove_file(&path);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
