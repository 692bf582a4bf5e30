#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

// single line, it is embedded in JSONL replay files
const GOLD_NEWS: &str = concat!(
    r#"{"sentiment_scores":{"bullish":0.8,"bearish":0.1,"neutral":0.1},"#,
    r#""confidence_score":0.9,"severity":"high","keywords":["opec"],"commodity":"gold"}"#,
);

const MARKET_MOVE: &str =
    r#"{"type":"market_outcome","commodity":"gold","price_change_percent":2.8}"#;

fn warnlern() -> Command {
    Command::cargo_bin("warnlern").expect("binary exists")
}

#[test]
fn recommend_without_checkpoint_prints_json() {
    let output = warnlern()
        .args(["recommend", "--user", "u1", "--news", GOLD_NEWS])
        .output()
        .expect("run");
    assert!(output.status.success());
    let rec: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json on stdout");
    assert_eq!(rec["user_id"], "u1");
    // untrained weights tie, lowest action wins
    assert_eq!(rec["send_alert"], false);
    assert_eq!(rec["explored"], false);
}

#[test]
fn recommend_rejects_bad_news_json() {
    warnlern()
        .args(["recommend", "--user", "u1", "--news", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --news JSON"));
}

#[test]
fn replay_writes_checkpoint_that_inspect_reads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let events = dir.path().join("events.jsonl");
    let config = dir.path().join("config.json");
    let ckpt = dir.path().join("ckpt.json");

    fs::write(&config, r#"{"batch_size": 1, "seed": 3, "track_suppressed": true}"#)
        .expect("write config");
    let mut lines = vec![
        r#"{"type":"preferences","user":"u1","commodities":["gold"]}"#.to_string(),
        concat!(
            r#"{"type":"market_context","volatility_index":0.7,"#,
            r#""trading_hours":true,"day_of_week":2}"#
        )
        .to_string(),
    ];
    for i in 0..5 {
        let day = i + 1;
        lines.push(format!(
            r#"{{"type":"news","at":"2026-02-0{day}T09:00:00Z","user":"u1","ref":"n{i}","#
        ) + &format!(r#""news":{GOLD_NEWS}}}"#));
        lines.push(format!(r#"{{"type":"feedback","ref":"n{i}","feedback_type":"helpful"}}"#));
        lines.push(MARKET_MOVE.to_string());
    }
    lines.push(r#"{"type":"sweep","at":"2026-03-01T00:00:00Z"}"#.to_string());
    fs::write(&events, lines.join("\n")).expect("write events");

    let output = warnlern()
        .arg("replay")
        .arg("--path")
        .arg(&events)
        .arg("--config")
        .arg(&config)
        .arg("--checkpoint")
        .arg(&ckpt)
        .output()
        .expect("run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("summary json");
    assert_eq!(summary["events"], 18);
    assert_eq!(summary["recommendations"], 5);
    assert_eq!(summary["stats"]["pending"], 0);
    assert!(ckpt.exists());

    warnlern()
        .arg("inspect")
        .arg("--checkpoint")
        .arg(&ckpt)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\": 1"))
        .stdout(predicate::str::contains("\"value_function\": \"linear\""));
}

#[test]
fn inspect_missing_checkpoint_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    warnlern()
        .arg("inspect")
        .arg("--checkpoint")
        .arg(dir.path().join("nope.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No checkpoint found"));
}

#[test]
fn replay_reports_invalid_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let events = dir.path().join("bad.jsonl");
    let lines = [
        r#"{"type":"preferences","user":"u","commodities":[]}"#,
        r#"{"type":"bogus"}"#,
    ];
    fs::write(&events, lines.join("\n")).expect("write");
    warnlern()
        .arg("replay")
        .arg("--path")
        .arg(&events)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}
