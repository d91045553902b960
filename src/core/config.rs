//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{DbxError, Result};
use crate::core::paths::resolve_absolute_path;
use crate::scanner::classifier::ClassificationSettings;

/// Full dbxtrace configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub scanner: ScannerConfig,
    pub paths: PathsConfig,
}

/// Which rule families a scan job enables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DetectionConfig {
    pub file_rules_enabled: bool,
    pub dir_rules_enabled: bool,
}

/// Walker behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    pub root_paths: Vec<PathBuf>,
    pub excluded_paths: Vec<PathBuf>,
    pub max_depth: usize,
    pub parallelism: usize,
    pub follow_symlinks: bool,
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub artifacts_file: PathBuf,
    pub index_file: PathBuf,
    pub activity_log: PathBuf,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let settings = ClassificationSettings::default();
        Self {
            file_rules_enabled: settings.file_rules_enabled,
            dir_rules_enabled: settings.dir_rules_enabled,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            root_paths: Vec::new(),
            excluded_paths: vec![
                PathBuf::from("/proc"),
                PathBuf::from("/sys"),
                PathBuf::from("/dev"),
            ],
            max_depth: 64,
            parallelism: std::thread::available_parallelism()
                .map_or(4, std::num::NonZeroUsize::get)
                .min(8),
            follow_symlinks: false,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[DBX-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let data = home_dir.join(".local").join("share").join("dbxtrace");
        Self {
            config_file: home_dir.join(".config").join("dbxtrace").join("config.toml"),
            artifacts_file: data.join("artifacts.jsonl"),
            index_file: data.join("index.jsonl"),
            activity_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| DbxError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(DbxError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Frozen classification settings for a scan job.
    #[must_use]
    pub const fn job_settings(&self) -> ClassificationSettings {
        ClassificationSettings::new(
            self.detection.file_rules_enabled,
            self.detection.dir_rules_enabled,
        )
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a, so the value is stable across processes and toolchains.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // detection
        set_bool(
            &mut lookup,
            "DBX_DETECTION_FILE_RULES_ENABLED",
            &mut self.detection.file_rules_enabled,
        )?;
        set_bool(
            &mut lookup,
            "DBX_DETECTION_DIR_RULES_ENABLED",
            &mut self.detection.dir_rules_enabled,
        )?;

        // scanner
        set_usize(&mut lookup, "DBX_SCANNER_MAX_DEPTH", &mut self.scanner.max_depth)?;
        set_usize(
            &mut lookup,
            "DBX_SCANNER_PARALLELISM",
            &mut self.scanner.parallelism,
        )?;
        set_bool(
            &mut lookup,
            "DBX_SCANNER_FOLLOW_SYMLINKS",
            &mut self.scanner.follow_symlinks,
        )?;

        // paths
        if let Some(raw) = lookup("DBX_PATHS_ARTIFACTS_FILE") {
            self.paths.artifacts_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("DBX_PATHS_INDEX_FILE") {
            self.paths.index_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("DBX_PATHS_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn normalize_paths(&mut self) {
        // The walker compares exclusions against child paths of resolved roots.
        for path in &mut self.scanner.excluded_paths {
            *path = resolve_absolute_path(path);
        }
        for path in self
            .scanner
            .root_paths
            .iter_mut()
            .chain(self.scanner.excluded_paths.iter_mut())
        {
            let s = path.to_string_lossy();
            if s.len() > 1
                && let Some(stripped) = s.strip_suffix('/')
            {
                *path = PathBuf::from(stripped);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.scanner.parallelism == 0 {
            return Err(DbxError::InvalidConfig {
                details: "scanner.parallelism must be >= 1".to_string(),
            });
        }
        if self.scanner.max_depth == 0 {
            return Err(DbxError::InvalidConfig {
                details: "scanner.max_depth must be >= 1".to_string(),
            });
        }
        if self.paths.artifacts_file == self.paths.index_file {
            return Err(DbxError::InvalidConfig {
                details: format!(
                    "paths.artifacts_file and paths.index_file must differ (both {})",
                    self.paths.artifacts_file.display()
                ),
            });
        }
        for (name, path) in [
            ("artifacts_file", &self.paths.artifacts_file),
            ("index_file", &self.paths.index_file),
        ] {
            if *path == self.paths.activity_log {
                return Err(DbxError::InvalidConfig {
                    details: format!("paths.{name} must not be the activity log"),
                });
            }
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_usize<F>(lookup: &mut F, name: &str, slot: &mut usize) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw
            .trim()
            .parse::<usize>()
            .map_err(|error| DbxError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn set_bool<F>(lookup: &mut F, name: &str, slot: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env_bool(name, &raw)?;
    }
    Ok(())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| DbxError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
