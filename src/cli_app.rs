//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use dropbox_trace::blackboard::ArtifactRecord;
use dropbox_trace::blackboard::jsonl::{JsonlBlackboard, read_records, reset, search_index};
use dropbox_trace::core::config::Config;
use dropbox_trace::core::errors::DbxError;
use dropbox_trace::core::paths::resolve_absolute_path;
use dropbox_trace::ingest::{
    JobSettings, MODULE_DESCRIPTION, MODULE_NAME, MODULE_VERSION, ScanJob, ScanSummary,
};
use dropbox_trace::logger::activity::{ActivityLoggerConfig, spawn_logger};
use dropbox_trace::logger::jsonl::JsonlConfig;
use dropbox_trace::scanner::rules::{Rule, RuleSet};
use dropbox_trace::scanner::walker::WalkerConfig;

/// dbxtrace: find traces of Dropbox installations in a file system image.
#[derive(Debug, Parser)]
#[command(
    name = "dbxtrace",
    author,
    version,
    about = "Dropbox artifact detector for file system images",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Walk paths and tag Dropbox artifacts.
    Scan(ScanArgs),
    /// List the built-in detection rules.
    Rules,
    /// Search tagged artifacts by keyword.
    Search(SearchArgs),
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Show version information.
    Version,
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ScanArgs {
    /// Paths to scan (defaults to configured root paths).
    paths: Vec<PathBuf>,
    /// Do not look for files relating to Dropbox.
    #[arg(long)]
    no_files: bool,
    /// Do not look for directories relating to Dropbox.
    #[arg(long)]
    no_dirs: bool,
    /// Write artifacts, index, and activity log under this directory.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
    /// Discard artifacts and index entries from earlier scans.
    #[arg(long)]
    fresh: bool,
}

#[derive(Debug, Clone, Args, Serialize)]
struct SearchArgs {
    /// Keyword to look up (case-insensitive, whole term).
    term: String,
    /// Read artifacts and index from this directory.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand, Serialize)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Operation partially succeeded.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<DbxError> for CliError {
    fn from(err: DbxError) -> Self {
        match err {
            DbxError::InvalidConfig { .. }
            | DbxError::MissingConfig { .. }
            | DbxError::ConfigParse { .. }
            | DbxError::InvalidSettings { .. } => Self::User(err.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Scan(args) => run_scan(cli, args),
        Command::Rules => run_rules(cli),
        Command::Search(args) => run_search(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version => emit_version(cli),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── scan ────────────────────

/// Artifact, index, and activity-log locations for one run.
struct OutputPaths {
    artifacts: PathBuf,
    index: PathBuf,
    activity_log: PathBuf,
}

impl OutputPaths {
    fn resolve(config: &Config, out_dir: Option<&Path>) -> Self {
        match out_dir {
            Some(dir) => Self {
                artifacts: dir.join("artifacts.jsonl"),
                index: dir.join("index.jsonl"),
                activity_log: dir.join("activity.jsonl"),
            },
            None => Self {
                artifacts: config.paths.artifacts_file.clone(),
                index: config.paths.index_file.clone(),
                activity_log: config.paths.activity_log.clone(),
            },
        }
    }
}

fn scan_settings(config: &Config, args: &ScanArgs) -> JobSettings {
    let mut settings = JobSettings::from(config.job_settings());
    if args.no_files {
        settings.file_rules_enabled = false;
    }
    if args.no_dirs {
        settings.dir_rules_enabled = false;
    }
    settings
}

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let mode = output_mode(cli);

    let requested = if args.paths.is_empty() {
        &config.scanner.root_paths
    } else {
        &args.paths
    };
    let root_paths: Vec<PathBuf> = requested.iter().map(|p| resolve_absolute_path(p)).collect();
    if root_paths.is_empty() {
        return Err(CliError::User(
            "no paths to scan: pass PATHS or set scanner.root_paths".to_string(),
        ));
    }
    if let Some(missing) = root_paths.iter().find(|p| !p.exists()) {
        return Err(CliError::User(format!(
            "scan path does not exist: {}",
            missing.display()
        )));
    }

    let settings = scan_settings(&config, args);
    let outputs = OutputPaths::resolve(&config, args.out_dir.as_deref());
    let job = ScanJob::new(
        settings,
        WalkerConfig::from_scanner(&config.scanner, root_paths),
    );

    if args.fresh {
        reset(&outputs.artifacts, &outputs.index)?;
    }
    let board = JsonlBlackboard::open(&outputs.artifacts, &outputs.index)?.into_shared();

    let mut jsonl_config = JsonlConfig::at(&outputs.activity_log);
    jsonl_config.fallback_path = Some(JsonlConfig::default().path);
    let (logger, logger_thread) = spawn_logger(ActivityLoggerConfig {
        jsonl_config,
        echo_errors: mode == OutputMode::Human,
        ..ActivityLoggerConfig::default()
    })?;

    let result = job.run(&board, &logger);
    let flushed = board.with(|b| {
        b.flush()?;
        b.close_index()?;
        Ok::<Vec<ArtifactRecord>, DbxError>(b.records().cloned().collect())
    });
    logger.shutdown();
    let _ = logger_thread.join();

    let summary = result?;
    let hits = flushed?;

    match mode {
        OutputMode::Human => print_scan_human(&summary, &hits, &outputs),
        OutputMode::Json => {
            let payload = json!({
                "command": "scan",
                "module": MODULE_NAME,
                "summary": summary,
                "artifacts_file": outputs.artifacts.to_string_lossy(),
                "index_file": outputs.index.to_string_lossy(),
                "activity_log": outputs.activity_log.to_string_lossy(),
                "hits": hits,
            });
            write_json_line(&payload)?;
        }
    }

    if summary.index_failures > 0 {
        return Err(CliError::Partial(format!(
            "{} of {} artifacts could not be indexed; see {}",
            summary.index_failures,
            summary.artifacts,
            outputs.activity_log.display()
        )));
    }
    Ok(())
}

fn print_scan_human(summary: &ScanSummary, hits: &[ArtifactRecord], outputs: &OutputPaths) {
    println!("{}", "Dropbox Artifact Scan".bold());
    println!(
        "  Scanned: {} entries in {:.1}s ({} workers)",
        summary.entries,
        std::time::Duration::from_millis(summary.duration_ms).as_secs_f64(),
        summary.workers
    );
    println!(
        "  Rules: files {}, directories {}",
        flag_label(summary.file_rules_enabled),
        flag_label(summary.dir_rules_enabled)
    );
    if summary.file_rules_enabled && summary.dir_rules_enabled {
        println!(
            "  {}",
            "note: directory rules do not run while file rules are enabled".yellow()
        );
    }
    let count = summary.artifacts.to_string();
    println!(
        "  Artifacts: {}",
        if summary.artifacts > 0 {
            count.green().bold()
        } else {
            count.normal()
        }
    );
    if summary.index_failures > 0 {
        println!(
            "  Index failures: {}",
            summary.index_failures.to_string().red().bold()
        );
    }

    if !hits.is_empty() {
        println!();
        println!("  {:>6}  {:<10}  Path", "ID", "Set");
        println!("  {}", "-".repeat(72));
        for hit in hits {
            println!(
                "  {:>6}  {:<10}  {}",
                hit.id.to_string(),
                hit.set_name().unwrap_or(hit.category.as_str()),
                hit.target
            );
        }
    }
    println!();
    println!("  Artifacts: {}", outputs.artifacts.display());
    println!("  Index:     {}", outputs.index.display());
}

const fn flag_label(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

// ──────────────────── rules ────────────────────

fn run_rules(cli: &Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let settings = config.job_settings();
    let active = settings.active_family();
    let rules = RuleSet::default();

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{} {}", MODULE_NAME.bold(), MODULE_VERSION);
            println!("  {MODULE_DESCRIPTION}");
            println!();
            for rule in rules.iter() {
                let marker = if Some(rule.family()) == active {
                    "active".green()
                } else {
                    "inactive".dimmed()
                };
                println!("  {:<12} [{marker}] {}", rule.id, describe_rule(rule));
            }
        }
        OutputMode::Json => {
            let entries: Vec<Value> = rules
                .iter()
                .map(|rule| {
                    json!({
                        "rule": rule,
                        "family": rule.family(),
                        "active": Some(rule.family()) == active,
                    })
                })
                .collect();
            let payload = json!({
                "command": "rules",
                "module": MODULE_NAME,
                "version": MODULE_VERSION,
                "rules": entries,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn describe_rule(rule: &Rule) -> String {
    let conditions: Vec<String> = rule
        .conditions
        .iter()
        .map(|c| format!("{c:?}"))
        .collect();
    let targets: Vec<String> = rule.targets.iter().map(|t| format!("{t:?}")).collect();
    format!(
        "{} where {} -> {} ({})",
        rule.applies_to.label(),
        conditions.join(" && "),
        targets.join(", "),
        rule.category
    )
}

// ──────────────────── search ────────────────────

fn run_search(cli: &Cli, args: &SearchArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let outputs = OutputPaths::resolve(&config, args.out_dir.as_deref());

    let ids = search_index(&outputs.index, &args.term)?;
    let hits: Vec<ArtifactRecord> = read_records(&outputs.artifacts)?
        .into_iter()
        .filter(|r| ids.binary_search(&r.id).is_ok())
        .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            if hits.is_empty() {
                println!("No artifacts match {:?}.", args.term);
            } else {
                println!("{} artifact(s) match {:?}:", hits.len(), args.term);
                for hit in &hits {
                    println!("  {:>6}  {}  {}", hit.id.to_string(), hit.created_at, hit.target);
                }
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "search",
                "term": args.term,
                "count": hits.len(),
                "hits": hits,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── version / output ────────────────────

fn emit_version(cli: &Cli) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("dbxtrace {version}");
            println!("module: {MODULE_NAME} {MODULE_VERSION}");
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "dbxtrace",
                "version": version,
                "package": package,
                "module": {
                    "name": MODULE_NAME,
                    "version": MODULE_VERSION,
                    "description": MODULE_DESCRIPTION,
                },
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("DBX_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
