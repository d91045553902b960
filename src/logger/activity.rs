//! Activity logger: a dedicated thread owns the JSONL writer; every ingest
//! worker sends `ActivityEvent`s to it over a crossbeam channel.
//!
//! The channel has a soft capacity. Info and warning events past it are
//! dropped and counted, so classification is never blocked by logging.
//! Error-severity events (`IndexFailed`, `Error`) are always queued.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::core::errors::{DbxError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default soft capacity for queued info and warning events.
const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── public event type ────────────────────

/// Events emitted by ingest modules and the scan pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    ModuleStarted {
        module: String,
        file_rules_enabled: bool,
        dir_rules_enabled: bool,
    },
    ArtifactFound {
        module: String,
        rule: String,
        category: String,
        path: String,
        note: String,
    },
    IndexFailed {
        module: String,
        artifact: String,
        error_code: String,
        error_message: String,
    },
    ModuleStopped {
        module: String,
        entries: u64,
        artifacts: u64,
        index_failures: u64,
    },
    ScanCompleted {
        entries: u64,
        artifacts: u64,
        index_failures: u64,
        duration_ms: u64,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

impl ActivityEvent {
    /// Events that must reach the log even under back-pressure.
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::IndexFailed { .. } | Self::Error { .. })
    }
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending log events.
#[derive(Debug, Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    capacity: usize,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Send an event to the logger thread. Never blocks.
    ///
    /// Once `capacity` events are queued, further non-error events are
    /// dropped and counted. Error events are queued regardless.
    pub fn send(&self, event: ActivityEvent) {
        if !event.is_error() && self.tx.len() >= self.capacity {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            return;
        }
        // Disconnected: the logger already shut down.
        let _ = self.tx.send(event);
    }

    /// Number of events dropped due to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// Handle whose events are delivered to the returned receiver instead of
    /// a logger thread. Lets an embedding host route events itself.
    pub fn capture(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = unbounded();
        let handle = Self {
            tx,
            capacity: capacity.max(1),
            dropped_events: Arc::new(AtomicU64::new(0)),
        };
        (handle, rx)
    }
}

// ──────────────────── configuration ────────────────────

/// Options for the logger thread.
#[derive(Debug, Clone)]
pub struct ActivityLoggerConfig {
    pub jsonl_config: JsonlConfig,
    pub channel_capacity: usize,
    /// Mirror error-severity events to stderr.
    pub echo_errors: bool,
}

impl Default for ActivityLoggerConfig {
    fn default() -> Self {
        Self {
            jsonl_config: JsonlConfig::default(),
            channel_capacity: CHANNEL_CAPACITY,
            echo_errors: true,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread and return a handle.
///
/// The thread runs until `handle.shutdown()` is called or every sender is dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (handle, rx) = ActivityLoggerHandle::capture(config.channel_capacity);
    let dropped = Arc::clone(&handle.dropped_events);

    let join = thread::Builder::new()
        .name("dbx-logger".to_string())
        .spawn(move || {
            logger_thread_main(&rx, config.jsonl_config, config.echo_errors, &dropped);
        })
        .map_err(|e| DbxError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(
    rx: &Receiver<ActivityEvent>,
    jsonl_config: JsonlConfig,
    echo_errors: bool,
    dropped: &AtomicU64,
) {
    let mut jsonl = JsonlWriter::open(jsonl_config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }

        let entry = event_to_log_entry(&event);
        if echo_errors && entry.severity == Severity::Error {
            eprintln!(
                "[DBX] {}",
                entry.details.as_deref().unwrap_or("unspecified error")
            );
        }
        jsonl.write_entry(&entry);
    }

    jsonl.sync();
}

// ──────────────────── event conversion ────────────────────

pub(crate) fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::ModuleStarted {
            module,
            file_rules_enabled,
            dir_rules_enabled,
        } => {
            let mut e = LogEntry::new(EventType::ModuleStart, Severity::Info);
            e.module = Some(module.clone());
            e.details = Some(format!(
                "Dropbox file flag is {}; Dropbox directory flag is {}",
                flag_word(*file_rules_enabled),
                flag_word(*dir_rules_enabled)
            ));
            e.ok = Some(true);
            e
        }
        ActivityEvent::ArtifactFound {
            module,
            rule,
            category,
            path,
            note,
        } => {
            let mut e = LogEntry::new(EventType::ArtifactFound, Severity::Info);
            e.module = Some(module.clone());
            e.rule = Some(rule.clone());
            e.category = Some(category.clone());
            e.path = Some(path.clone());
            e.details = Some(note.clone());
            e
        }
        ActivityEvent::IndexFailed {
            module,
            artifact,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::IndexFailure, Severity::Error);
            e.module = Some(module.clone());
            e.artifact = Some(artifact.clone());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e.details = Some(format!("Error indexing artifact {artifact}"));
            e
        }
        ActivityEvent::ModuleStopped {
            module,
            entries,
            artifacts,
            index_failures,
        } => {
            let mut e = LogEntry::new(EventType::ModuleStop, Severity::Info);
            e.module = Some(module.clone());
            e.entries = Some(*entries);
            e.artifacts = Some(*artifacts);
            e.index_failures = Some(*index_failures);
            e.ok = Some(true);
            e
        }
        ActivityEvent::ScanCompleted {
            entries,
            artifacts,
            index_failures,
            duration_ms,
        } => {
            let severity = if *index_failures > 0 {
                Severity::Warning
            } else {
                Severity::Info
            };
            let mut e = LogEntry::new(EventType::ScanComplete, severity);
            e.entries = Some(*entries);
            e.artifacts = Some(*artifacts);
            e.index_failures = Some(*index_failures);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Error);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.details = Some(format!("[{code}] {message}"));
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::ModuleStop, Severity::Info),
    }
}

const fn flag_word(enabled: bool) -> &'static str {
    if enabled { "set" } else { "not set" }
}
