//! DBX-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, DbxError>;

/// Top-level error type for dropbox_trace.
#[derive(Debug, Error)]
pub enum DbxError {
    #[error("[DBX-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[DBX-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[DBX-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[DBX-1101] invalid ingest job settings: {details}")]
    InvalidSettings { details: String },

    #[error("[DBX-1201] ingest module failed to start: {details}")]
    StartupFailed { details: String },

    #[error("[DBX-1202] ingest module lifecycle violation: cannot {action} while {state}")]
    Lifecycle {
        action: &'static str,
        state: &'static str,
    },

    #[error("[DBX-2001] artifact store failure in {context}: {details}")]
    ArtifactStore {
        context: &'static str,
        details: String,
    },

    #[error("[DBX-2002] failed to index artifact {artifact}: {details}")]
    Indexing { artifact: String, details: String },

    #[error("[DBX-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[DBX-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[DBX-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl DbxError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "DBX-1001",
            Self::MissingConfig { .. } => "DBX-1002",
            Self::ConfigParse { .. } => "DBX-1003",
            Self::InvalidSettings { .. } => "DBX-1101",
            Self::StartupFailed { .. } => "DBX-1201",
            Self::Lifecycle { .. } => "DBX-1202",
            Self::ArtifactStore { .. } => "DBX-2001",
            Self::Indexing { .. } => "DBX-2002",
            Self::Serialization { .. } => "DBX-2101",
            Self::Io { .. } => "DBX-3002",
            Self::Runtime { .. } => "DBX-3900",
        }
    }

    /// Whether the failure must abort the ingest job for the worker that hit it.
    ///
    /// Indexing failures are the only recoverable class: they are logged and
    /// the worker moves on to the next emission.
    #[must_use]
    pub const fn is_job_fatal(&self) -> bool {
        !matches!(self, Self::Indexing { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for DbxError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for DbxError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<DbxError> {
        vec![
            DbxError::InvalidConfig {
                details: String::new(),
            },
            DbxError::MissingConfig {
                path: PathBuf::new(),
            },
            DbxError::ConfigParse {
                context: "",
                details: String::new(),
            },
            DbxError::InvalidSettings {
                details: String::new(),
            },
            DbxError::StartupFailed {
                details: String::new(),
            },
            DbxError::Lifecycle {
                action: "process",
                state: "created",
            },
            DbxError::ArtifactStore {
                context: "",
                details: String::new(),
            },
            DbxError::Indexing {
                artifact: String::new(),
                details: String::new(),
            },
            DbxError::Serialization {
                context: "",
                details: String::new(),
            },
            DbxError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            DbxError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(DbxError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_dbx_prefix() {
        for err in &all_variants() {
            assert!(
                err.code().starts_with("DBX-"),
                "code {} must start with DBX-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = DbxError::InvalidSettings {
            details: "expected an object".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DBX-1101"), "missing code: {msg}");
        assert!(msg.contains("expected an object"), "missing details: {msg}");
    }

    #[test]
    fn only_indexing_failures_are_recoverable() {
        for err in all_variants() {
            let recoverable = matches!(err, DbxError::Indexing { .. });
            assert_eq!(err.is_job_fatal(), !recoverable, "{}", err.code());
        }
    }

    #[test]
    fn io_convenience_constructor() {
        let err = DbxError::io(
            "/tmp/artifacts.jsonl",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "DBX-3002");
        assert!(err.to_string().contains("/tmp/artifacts.jsonl"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: DbxError = json_err.into();
        assert_eq!(err.code(), "DBX-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: DbxError = toml_err.into();
        assert_eq!(err.code(), "DBX-1003");
    }
}
