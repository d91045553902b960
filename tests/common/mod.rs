#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_dbxtrace") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "dbxtrace.exe"
    } else {
        "dbxtrace"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve dbxtrace binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_case_with_env(case_name, args, &[])
}

/// Run the binary with extra environment variables. `HOME` always points at
/// a scratch directory so default paths never touch the real profile.
pub fn run_cli_case_with_env(case_name: &str, args: &[&str], env: &[(&str, &str)]) -> CmdResult {
    let root = std::env::temp_dir().join("dbxtrace-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let home = root.join(format!("home-{}-{}", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .env("HOME", &home)
        .env("RUST_BACKTRACE", "1")
        .env_remove("DBX_OUTPUT_FORMAT");
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().expect("execute dbxtrace command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("env={env:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Lay out a small Windows-style user profile with a Dropbox install:
///
/// ```text
/// Users/alice/AppData/Local/Dropbox/{info.json,config.dbx,filecache.dbx,deleted.dbx,other.dbx}
/// Users/alice/Dropbox/.dropbox.cache/
/// Users/alice/Dropbox/report.docx
/// Users/alice/Documents/info.json
/// ```
pub fn build_image(root: &Path) {
    let appdata = root.join("Users/alice/AppData/Local/Dropbox");
    fs::create_dir_all(&appdata).expect("create appdata");
    for name in [
        "info.json",
        "config.dbx",
        "filecache.dbx",
        "deleted.dbx",
        "other.dbx",
    ] {
        fs::write(appdata.join(name), b"{}").expect("write appdata file");
    }
    let sync = root.join("Users/alice/Dropbox");
    fs::create_dir_all(sync.join(".dropbox.cache")).expect("create cache dir");
    fs::write(sync.join("report.docx"), b"doc").expect("write synced file");
    let documents = root.join("Users/alice/Documents");
    fs::create_dir_all(&documents).expect("create documents");
    fs::write(documents.join("info.json"), b"{}").expect("write decoy");
}
