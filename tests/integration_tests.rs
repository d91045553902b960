//! Integration tests: CLI smoke tests and full-pipeline scenarios over a
//! synthetic user profile.

mod common;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tempfile::TempDir;

use dropbox_trace::blackboard::jsonl::{JsonlBlackboard, read_records, search_index};
use dropbox_trace::ingest::{JobSettings, ModuleFactory, ScanJob, ToggleId};
use dropbox_trace::logger::activity::{ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger};
use dropbox_trace::logger::jsonl::JsonlConfig;
use dropbox_trace::scanner::walker::WalkerConfig;

fn json_stdout(result: &common::CmdResult) -> Value {
    serde_json::from_str(result.stdout.trim()).unwrap_or_else(|e| {
        panic!(
            "stdout is not one JSON document ({e}); log: {}",
            result.log_path.display()
        )
    })
}

fn walker_for(root: &Path) -> WalkerConfig {
    WalkerConfig {
        root_paths: vec![root.to_path_buf()],
        max_depth: 32,
        follow_symlinks: false,
        parallelism: 4,
        excluded_paths: HashSet::new(),
    }
}

// ──────────────────── CLI ────────────────────

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: dbxtrace [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_reports_module() {
    let result = common::run_cli_case("version_command_reports_module", &["version", "--json"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_stdout(&result);
    assert_eq!(payload["binary"], "dbxtrace");
    assert_eq!(payload["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(payload["module"]["name"], "Dropbox Ingest Module");
    assert_eq!(payload["module"]["version"], "1.0");
}

#[test]
fn scan_tags_appdata_files_with_default_settings() {
    let image = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    common::build_image(image.path());

    let result = common::run_cli_case_with_env(
        "scan_tags_appdata_files_with_default_settings",
        &[
            "scan",
            image.path().to_str().unwrap(),
            "--out-dir",
            out.path().to_str().unwrap(),
            "--json",
        ],
        &[("DBX_SCANNER_PARALLELISM", "2")],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let payload = json_stdout(&result);
    assert_eq!(payload["command"], "scan");
    assert_eq!(payload["summary"]["entries"], 15);
    assert_eq!(payload["summary"]["artifacts"], 4);
    assert_eq!(payload["summary"]["index_failures"], 0);

    let mut names: Vec<String> = payload["hits"]
        .as_array()
        .expect("hits array")
        .iter()
        .map(|hit| {
            let target = hit["target"].as_str().unwrap();
            target.rsplit('/').next().unwrap().to_string()
        })
        .collect();
    names.sort();
    assert_eq!(names, ["config.dbx", "deleted.dbx", "filecache.dbx", "info.json"]);

    let records = read_records(&out.path().join("artifacts.jsonl")).unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.set_name() == Some("Dropbox")));
    assert!(
        !records
            .iter()
            .any(|r| r.target.contains("/Documents/")),
        "decoy info.json outside AppData must not be tagged"
    );

    let activity = fs::read_to_string(out.path().join("activity.jsonl")).unwrap();
    assert!(activity.contains("Dropbox file flag is set; Dropbox directory flag is set"));
    assert!(activity.contains("Found Dropbox-related File: info.json"));
    assert!(activity.contains("\"event\":\"scan_complete\""));
}

#[test]
fn scan_without_file_rules_tags_cache_and_sync_folder() {
    let image = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    common::build_image(image.path());

    let result = common::run_cli_case(
        "scan_without_file_rules_tags_cache_and_sync_folder",
        &[
            "scan",
            image.path().to_str().unwrap(),
            "--no-files",
            "--out-dir",
            out.path().to_str().unwrap(),
            "--json",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let payload = json_stdout(&result);
    assert_eq!(payload["summary"]["artifacts"], 2);
    assert_eq!(payload["summary"]["file_rules_enabled"], false);

    let mut targets: Vec<String> = payload["hits"]
        .as_array()
        .unwrap()
        .iter()
        .map(|hit| hit["target"].as_str().unwrap().to_string())
        .collect();
    targets.sort();
    assert!(targets[0].ends_with("/Users/alice/Dropbox"));
    assert!(targets[1].ends_with("/Users/alice/Dropbox/.dropbox.cache"));

    let activity = fs::read_to_string(out.path().join("activity.jsonl")).unwrap();
    assert!(activity.contains("Found Dropbox Sync Folder: Dropbox"));
}

#[test]
fn scan_with_both_families_off_tags_nothing() {
    let image = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    common::build_image(image.path());

    let result = common::run_cli_case(
        "scan_with_both_families_off_tags_nothing",
        &[
            "scan",
            image.path().to_str().unwrap(),
            "--no-files",
            "--no-dirs",
            "--out-dir",
            out.path().to_str().unwrap(),
            "--json",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert_eq!(json_stdout(&result)["summary"]["artifacts"], 0);
}

#[test]
fn search_finds_scanned_artifacts() {
    let image = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    common::build_image(image.path());
    let out_dir = out.path().to_str().unwrap();

    let scan = common::run_cli_case(
        "search_finds_scanned_artifacts_scan",
        &["scan", image.path().to_str().unwrap(), "--out-dir", out_dir, "--json"],
    );
    assert!(scan.status.success(), "log: {}", scan.log_path.display());

    let hit = common::run_cli_case(
        "search_finds_scanned_artifacts_hit",
        &["search", "CONFIG.DBX", "--out-dir", out_dir, "--json"],
    );
    assert!(hit.status.success(), "log: {}", hit.log_path.display());
    let payload = json_stdout(&hit);
    assert_eq!(payload["count"], 1);
    assert!(
        payload["hits"][0]["target"]
            .as_str()
            .unwrap()
            .ends_with("/config.dbx")
    );

    let by_set = common::run_cli_case(
        "search_finds_scanned_artifacts_set",
        &["search", "dropbox", "--out-dir", out_dir, "--json"],
    );
    assert_eq!(json_stdout(&by_set)["count"], 4);

    let miss = common::run_cli_case(
        "search_finds_scanned_artifacts_miss",
        &["search", "documents", "--out-dir", out_dir, "--json"],
    );
    assert_eq!(json_stdout(&miss)["count"], 0);
}

#[test]
fn scan_of_missing_path_is_a_user_error() {
    let out = TempDir::new().unwrap();
    let result = common::run_cli_case(
        "scan_of_missing_path_is_a_user_error",
        &[
            "scan",
            "/definitely/not/an/image",
            "--out-dir",
            out.path().to_str().unwrap(),
        ],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("scan path does not exist"));
}

#[test]
fn rules_lists_catalogue_with_active_family() {
    let result = common::run_cli_case("rules_lists_catalogue", &["rules", "--json"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let payload = json_stdout(&result);
    let rules = payload["rules"].as_array().unwrap();
    let ids: Vec<&str> = rules
        .iter()
        .map(|r| r["rule"]["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["info-json", "config-dbx", "cache-dir"]);
    // File rules are on by default, which masks the directory family.
    assert_eq!(rules[0]["active"], true);
    assert_eq!(rules[2]["active"], false);
}

#[test]
fn rules_respect_detection_env_override() {
    let result = common::run_cli_case_with_env(
        "rules_respect_detection_env_override",
        &["rules", "--json"],
        &[("DBX_DETECTION_FILE_RULES_ENABLED", "false")],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_stdout(&result);
    assert_eq!(payload["rules"][0]["active"], false);
    assert_eq!(payload["rules"][2]["active"], true);
}

#[test]
fn config_validate_reports_invalid_env() {
    let result = common::run_cli_case_with_env(
        "config_validate_reports_invalid_env",
        &["config", "validate", "--json"],
        &[("DBX_SCANNER_PARALLELISM", "0")],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    let payload = json_stdout(&result);
    assert_eq!(payload["valid"], false);
    assert_eq!(payload["code"], "DBX-1001");
}

#[test]
fn explicit_missing_config_is_rejected() {
    let result = common::run_cli_case(
        "explicit_missing_config_is_rejected",
        &["--config", "/nonexistent/dbxtrace.toml", "config", "show"],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("DBX-1002"));
}

#[test]
fn config_show_reads_explicit_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[detection]\ndir_rules_enabled = false\n").unwrap();

    let result = common::run_cli_case(
        "config_show_reads_explicit_file",
        &["--config", path.to_str().unwrap(), "config", "show", "--json"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_stdout(&result);
    assert_eq!(payload["config"]["detection"]["dir_rules_enabled"], false);
    assert_eq!(payload["config"]["detection"]["file_rules_enabled"], true);
}

// ──────────────────── library pipeline ────────────────────

#[test]
fn panel_settings_drive_a_scan_end_to_end() {
    let image = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    common::build_image(image.path());

    let factory = ModuleFactory::default();
    let stored = factory.default_settings().to_value().unwrap();
    let mut panel = factory.settings_panel(&stored).unwrap();
    panel.set(ToggleId::LookForFiles, false);

    let board = JsonlBlackboard::open(out.path().join("a.jsonl"), out.path().join("i.jsonl"))
        .unwrap()
        .into_shared();
    let (logger, join) = spawn_logger(ActivityLoggerConfig {
        jsonl_config: JsonlConfig::at(out.path().join("activity.jsonl")),
        channel_capacity: 1024,
        echo_errors: false,
    })
    .unwrap();

    let job = ScanJob::new(panel.settings(), walker_for(image.path()));
    let summary = job.run(&board, &logger).unwrap();
    board.with(|b| b.flush()).unwrap();
    logger.shutdown();
    join.join().unwrap();

    assert_eq!(summary.artifacts, 2);
    assert_eq!(summary.workers, 4);

    let activity = fs::read_to_string(out.path().join("activity.jsonl")).unwrap();
    let starts = activity
        .lines()
        .filter(|l| l.contains("\"event\":\"module_start\""))
        .count();
    assert_eq!(starts, 4, "one module per worker");
    assert!(activity.contains("Dropbox file flag is not set; Dropbox directory flag is set"));
}

#[test]
fn artifact_ids_continue_across_scans() {
    let image = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    common::build_image(image.path());
    let artifacts = out.path().join("a.jsonl");
    let index = out.path().join("i.jsonl");
    let (logger, _rx) = ActivityLoggerHandle::capture(4096);

    for settings in [
        JobSettings::default(),
        JobSettings {
            file_rules_enabled: false,
            ..JobSettings::default()
        },
    ] {
        let board = JsonlBlackboard::open(&artifacts, &index).unwrap().into_shared();
        ScanJob::new(settings, walker_for(image.path()))
            .run(&board, &logger)
            .unwrap();
        board.with(|b| b.flush()).unwrap();
    }

    let records = read_records(&artifacts).unwrap();
    let ids: Vec<u64> = records.iter().map(|r| r.id.0).collect();
    assert_eq!(ids.len(), 6);
    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), 6);
    assert_eq!(ids.iter().max(), Some(&6));

    // The sync folder is reachable through its own name.
    let hits = search_index(&index, ".dropbox.cache").unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn fresh_scan_discards_earlier_artifacts() {
    let image = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    common::build_image(image.path());
    let image_arg = image.path().to_str().unwrap();
    let out_dir = out.path().to_str().unwrap();

    for (case, fresh) in [("first", false), ("again", false), ("fresh", true)] {
        let mut args = vec!["scan", image_arg, "--out-dir", out_dir, "--json"];
        if fresh {
            args.push("--fresh");
        }
        let result = common::run_cli_case(&format!("fresh_scan_{case}"), &args);
        assert!(result.status.success(), "log: {}", result.log_path.display());
        let records = read_records(&out.path().join("artifacts.jsonl")).unwrap();
        let expected = if case == "again" { 8 } else { 4 };
        assert_eq!(records.len(), expected, "after {case} scan");
    }

    let records = read_records(&out.path().join("artifacts.jsonl")).unwrap();
    assert_eq!(records.iter().map(|r| r.id.0).max(), Some(4));
}
