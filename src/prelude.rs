//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use dropbox_trace::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{DbxError, Result};

// Scanner
pub use crate::scanner::classifier::{ArtifactEmission, ClassificationSettings, Classifier};
pub use crate::scanner::entry::{Entry, EntryKind};
pub use crate::scanner::rules::{Rule, RuleFamily, RuleSet, Target};
pub use crate::scanner::walker::{DirectoryWalker, WalkerConfig};

// Ingest
pub use crate::ingest::{
    IngestModule, JobSettings, ModuleFactory, ProcessReport, ScanJob, ScanSummary, SettingsPanel,
};

// Blackboard
pub use crate::blackboard::jsonl::{JsonlBlackboard, SharedBlackboard};
pub use crate::blackboard::{ArtifactId, ArtifactRecord, ArtifactSink, Attribute, IndexError};

// Logger
pub use crate::logger::activity::{
    ActivityEvent, ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger,
};
