//! CLI E2E tests for the `hvac` binary.
//!
//! Validates:
//! - Ingested batches are queryable, exportable, and dumpable
//! - Partially rejected batches exit 3 and still persist the valid records
//! - Non-array payloads exit 12 and leave the store untouched
//! - Duplicate times are reported, not treated as failures
//! - Invalid config exits 10; usage errors exit 2
//! - The diagnostic log records rejected records
//! - Non-finite readings never reach the store
//! - `--warmup` anchors the first window on history before the range

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

/// Command pinned to an isolated config, data dir, and database.
fn hvac(dir: &Path) -> Command {
    let config = dir.join("config.json");
    if !config.exists() {
        fs::write(&config, "{}").unwrap();
    }
    let mut cmd = cargo_bin_cmd!("hvac");
    cmd.timeout(Duration::from_secs(60))
        .env_remove("HVAC_CONFIG")
        .env_remove("HVAC_DB")
        .env_remove("HVAC_DEBUG")
        .env_remove("HVAC_DATA_DIR")
        .arg("--config")
        .arg(&config)
        .arg("--data-dir")
        .arg(dir);
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("run hvac");
    serde_json::from_slice(&output.stdout).expect("parse JSON")
}

fn payload(base: i64, count: i64) -> String {
    let records: Vec<String> = (0..count)
        .map(|k| format!("[{}, {}, {:.1}, {:.1}]", base + k * 600, k % 4, 68.0 + k as f64 * 0.5, 40.0))
        .collect();
    format!("[{}]", records.join(", "))
}

// ============================================================================
// Ingest
// ============================================================================

#[test]
fn test_ingest_clean_batch() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("batch.json");
    fs::write(&file, payload(1_700_000_000, 5)).unwrap();

    let json = json_stdout(hvac(dir.path()).arg("ingest").arg(&file));
    assert_eq!(json["status"], "ok");
    assert_eq!(json["report"]["total"], 5);
    assert_eq!(json["report"]["persisted"], 5);
    assert!(dir.path().join("hvac.db").exists());
}

#[test]
fn test_ingest_from_stdin() {
    let dir = TempDir::new().unwrap();
    hvac(dir.path())
        .arg("ingest")
        .write_stdin(payload(1_700_000_000, 3))
        .assert()
        .success()
        .code(0)
        .stdout(predicate::str::contains("\"persisted\": 3"));
}

#[test]
fn test_partial_batch_exits_3() {
    let dir = TempDir::new().unwrap();
    let body = r#"[[100, 1, 70.0, 40.0], [200, 1, 70, 40.0], [300, 2, 71.5, 41.0], [400, 9, 70.0, 40.0]]"#;

    let output = hvac(dir.path())
        .arg("ingest")
        .write_stdin(body)
        .assert()
        .code(3)
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["status"], "partial");
    assert_eq!(json["report"]["persisted"], 2);
    assert_eq!(json["report"]["skipped"].as_array().unwrap().len(), 2);
    assert_eq!(json["report"]["skipped"][0]["index"], 1);

    let log = fs::read_to_string(dir.path().join("hvac.log")).unwrap();
    assert!(log.contains("record 1 skipped"), "log was: {log}");
    assert!(log.contains(" - "));
}

#[test]
fn test_duplicates_are_not_failures() {
    let dir = TempDir::new().unwrap();
    let body = payload(1_700_000_000, 2);
    hvac(dir.path()).arg("ingest").write_stdin(body.clone()).assert().code(0);

    let json = json_stdout(hvac(dir.path()).arg("ingest").write_stdin(body));
    assert_eq!(json["status"], "ok");
    assert_eq!(json["report"]["persisted"], 0);
    assert_eq!(json["report"]["duplicates"], 2);
}

#[test]
fn test_non_array_payload_exits_12() {
    let dir = TempDir::new().unwrap();
    hvac(dir.path())
        .arg("ingest")
        .write_stdin(r#"{"time": 1}"#)
        .assert()
        .code(12)
        .stdout(predicate::str::contains("\"status\":\"error\""));

    let json = json_stdout(hvac(dir.path()).arg("dump"));
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[test]
fn test_missing_payload_file_exits_13() {
    let dir = TempDir::new().unwrap();
    hvac(dir.path())
        .args(["ingest", "does-not-exist.json"])
        .assert()
        .code(13);
}

// ============================================================================
// Round trip: record, export, dump, query
// ============================================================================

#[test]
fn test_export_round_trips_into_a_fresh_store() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let base = 1_700_000_000;
    hvac(src.path()).arg("ingest").write_stdin(payload(base, 6)).assert().code(0);

    let exported = hvac(src.path())
        .args(["export", "--since", &(base + 600).to_string()])
        .output()
        .unwrap()
        .stdout;
    let tuples: Value = serde_json::from_slice(&exported).unwrap();
    // Strictly after `since`: the first two records are excluded.
    assert_eq!(tuples.as_array().unwrap().len(), 4);
    assert_eq!(tuples[0][0], base + 1_200);

    hvac(dst.path()).arg("ingest").write_stdin(exported).assert().code(0);
    let original = json_stdout(hvac(src.path()).args(["export", "--since", &(base + 600).to_string()]));
    let copied = json_stdout(hvac(dst.path()).arg("export"));
    assert_eq!(original, copied);
}

#[test]
fn test_record_then_dump() {
    let dir = TempDir::new().unwrap();
    let json = json_stdout(hvac(dir.path()).args([
        "record",
        "--stage",
        "2",
        "--temperature",
        "-1.5",
        "--humidity",
        "38.25",
    ]));
    assert_eq!(json["status"], "ok");
    assert_eq!(json["outcome"], "inserted");

    hvac(dir.path())
        .args(["--format", "summary", "dump"])
        .assert()
        .success()
        .stdout(predicate::str::contains("time stage temperature humidity"))
        .stdout(predicate::str::contains(", 2, -1.5, 38.25)"));
}

#[test]
fn test_query_reports_duty_cycles() {
    let dir = TempDir::new().unwrap();
    let base = 1_700_000_000;
    // Stage 1 for an hour, then stage 0 for an hour, sampled every 30 minutes.
    let body = format!(
        "[[{}, 1, 70.0, 40.0], [{}, 1, 70.0, 40.0], [{}, 0, 71.0, 41.0], [{}, 0, 72.0, 42.0], [{}, 0, 72.5, 42.5]]",
        base,
        base + 1_800,
        base + 3_600,
        base + 5_400,
        base + 7_200
    );
    hvac(dir.path()).arg("ingest").write_stdin(body).assert().code(0);

    let json = json_stdout(hvac(dir.path()).args([
        "query",
        "--hours",
        "3",
        "--end",
        &(base + 7_200).to_string(),
    ]));
    assert_eq!(json["count"], 5);
    assert_eq!(json["hours"], 3);
    assert_eq!(json["window_secs"], 7200);
    assert_eq!(json["latest"][0], base + 7_200);

    let points = json["points"].as_array().unwrap();
    assert_eq!(points[0]["insufficient_history"], true);
    let last = &points[4];
    assert_eq!(last["insufficient_history"], false);
    assert_eq!(last["stage_percent"]["stage1"].as_f64().unwrap(), 50.0);
    assert_eq!(last["stage_percent"]["stage2"].as_f64().unwrap(), 0.0);
}

#[test]
fn test_query_clamps_hours() {
    let dir = TempDir::new().unwrap();
    let json = json_stdout(hvac(dir.path()).args(["query", "--hours", "0"]));
    assert_eq!(json["hours"], 1);
    let json = json_stdout(hvac(dir.path()).args(["query", "--hours", "99999"]));
    assert_eq!(json["hours"], 8760);
}

#[test]
fn test_query_summary_on_empty_store() {
    let dir = TempDir::new().unwrap();
    hvac(dir.path())
        .args(["--format", "summary", "query"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Data points: 0"));
}

// ============================================================================
// Config and usage errors
// ============================================================================

#[test]
fn test_config_show_reports_paths() {
    let dir = TempDir::new().unwrap();
    let json = json_stdout(hvac(dir.path()).args(["config", "show"]));
    assert_eq!(json["source"]["kind"], "cli");
    assert!(json["db_path"].as_str().unwrap().ends_with("hvac.db"));
    assert_eq!(json["config"]["window_secs"], 7200);
}

#[test]
fn test_invalid_config_exits_10() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.json"), r#"{"window_secs": 0}"#).unwrap();
    hvac(dir.path())
        .args(["config", "validate"])
        .assert()
        .code(10);

    fs::write(dir.path().join("config.json"), "not json").unwrap();
    hvac(dir.path()).args(["query"]).assert().code(10);
}

#[test]
fn test_unknown_subcommand_exits_2() {
    let dir = TempDir::new().unwrap();
    hvac(dir.path())
        .arg("frobnicate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_record_rejects_out_of_range_stage() {
    let dir = TempDir::new().unwrap();
    hvac(dir.path())
        .args(["record", "--stage", "4", "--temperature", "70", "--humidity", "40"])
        .assert()
        .code(2);
}

#[test]
fn test_record_rejects_non_finite_reading_and_store_stays_readable() {
    let dir = TempDir::new().unwrap();
    hvac(dir.path()).arg("ingest").write_stdin(payload(1_700_000_000, 2)).assert().code(0);

    hvac(dir.path())
        .args(["record", "--stage", "1", "--temperature", "NaN", "--humidity", "40"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not a finite number"));
    hvac(dir.path())
        .args(["record", "--stage", "1", "--temperature", "70", "--humidity", "inf"])
        .assert()
        .code(2);

    let json = json_stdout(hvac(dir.path()).arg("dump"));
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[test]
fn test_out_of_range_number_skips_only_its_record() {
    let dir = TempDir::new().unwrap();
    let json = json_stdout(
        hvac(dir.path())
            .arg("ingest")
            .write_stdin("[[100, 1, 1e400, 40.0], [200, 1, 70.0, 40.0]]"),
    );
    assert_eq!(json["status"], "partial");
    assert_eq!(json["report"]["persisted"], 1);
    assert_eq!(json["report"]["skipped"][0]["reason"]["kind"], "undecodable");
}

#[test]
fn test_warmup_uses_history_before_the_range() {
    let dir = TempDir::new().unwrap();
    let base = 1_700_000_000;
    // The only sample old enough to anchor the first window sits 100s before
    // start - W.
    let body = format!(
        "[[{}, 1, 70.0, 40.0], [{}, 1, 70.0, 40.0], [{}, 0, 70.0, 40.0]]",
        base - 100,
        base + 3_600,
        base + 7_200
    );
    hvac(dir.path()).arg("ingest").write_stdin(body).assert().code(0);

    let end = (base + 10_800).to_string();
    let cold = json_stdout(hvac(dir.path()).args(["query", "--hours", "1", "--end", &end]));
    assert_eq!(cold["points"][0]["insufficient_history"], true);

    let warm = json_stdout(hvac(dir.path()).args(["query", "--hours", "1", "--end", &end, "--warmup"]));
    assert_eq!(warm["count"], 1);
    assert_eq!(warm["points"][0]["time"], base + 7_200);
    assert_eq!(warm["points"][0]["insufficient_history"], false);
    assert_eq!(warm["points"][0]["stage_percent"]["stage1"].as_f64().unwrap(), 100.0);
}
