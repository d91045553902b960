//! Scan job: walker feeding a pool of ingest workers, one module per worker.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde::Serialize;

use crate::blackboard::ArtifactSink;
use crate::core::errors::{DbxError, Result};
use crate::ingest::factory::ModuleFactory;
use crate::ingest::module::ProcessReport;
use crate::ingest::settings::JobSettings;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scanner::entry::Entry;
use crate::scanner::walker::{DirectoryWalker, WalkerConfig};

/// Outcome of a completed scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub entries: u64,
    pub artifacts: u64,
    pub index_failures: u64,
    pub workers: usize,
    pub duration_ms: u64,
    pub file_rules_enabled: bool,
    pub dir_rules_enabled: bool,
}

/// One scan over local paths.
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub factory: ModuleFactory,
    pub settings: JobSettings,
    pub walker: WalkerConfig,
}

impl ScanJob {
    pub fn new(settings: JobSettings, walker: WalkerConfig) -> Self {
        Self {
            factory: ModuleFactory::default(),
            settings,
            walker,
        }
    }

    /// Walk the roots and feed every entry to the worker pool.
    ///
    /// Each worker gets a clone of `sink`. The first job-fatal error stops
    /// every worker and is returned; nothing is rolled back.
    pub fn run<S>(&self, sink: &S, logger: &ActivityLoggerHandle) -> Result<ScanSummary>
    where
        S: ArtifactSink<PathBuf> + Clone + Send,
    {
        let started = Instant::now();
        let entries = DirectoryWalker::new(self.walker.clone()).stream()?;
        let workers = self.walker.parallelism.max(1);

        let totals = self.drive(&entries, workers, sink, logger)?;

        let summary = ScanSummary {
            entries: totals.entries,
            artifacts: totals.artifacts,
            index_failures: totals.index_failures,
            workers,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            file_rules_enabled: self.settings.file_rules_enabled,
            dir_rules_enabled: self.settings.dir_rules_enabled,
        };
        logger.send(ActivityEvent::ScanCompleted {
            entries: summary.entries,
            artifacts: summary.artifacts,
            index_failures: summary.index_failures,
            duration_ms: summary.duration_ms,
        });
        Ok(summary)
    }

    /// Run `workers` modules over an entry stream until it disconnects.
    pub fn drive<S>(
        &self,
        entries: &Receiver<Entry<PathBuf>>,
        workers: usize,
        sink: &S,
        logger: &ActivityLoggerHandle,
    ) -> Result<ProcessReport>
    where
        S: ArtifactSink<PathBuf> + Clone + Send,
    {
        let abort = AtomicBool::new(false);
        let first_error: Mutex<Option<DbxError>> = Mutex::new(None);
        let totals = Mutex::new(ProcessReport::default());

        thread::scope(|scope| -> Result<()> {
            for idx in 0..workers.max(1) {
                let worker_sink = sink.clone();
                let worker_logger = logger.clone();
                let (abort, first_error, totals) = (&abort, &first_error, &totals);
                thread::Builder::new()
                    .name(format!("dbx-ingest-{idx}"))
                    .spawn_scoped(scope, move || {
                        match self.worker(entries, worker_sink, worker_logger, abort) {
                            Ok(report) => *totals.lock() += report,
                            Err(err) => {
                                abort.store(true, Ordering::Release);
                                let mut slot = first_error.lock();
                                if slot.is_none() {
                                    *slot = Some(err);
                                }
                            }
                        }
                    })
                    .map_err(|e| DbxError::Runtime {
                        details: format!("failed to spawn ingest worker: {e}"),
                    })?;
            }
            Ok(())
        })?;

        if let Some(err) = first_error.into_inner() {
            logger.send(ActivityEvent::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            });
            return Err(err);
        }
        Ok(totals.into_inner())
    }

    fn worker<S>(
        &self,
        entries: &Receiver<Entry<PathBuf>>,
        sink: S,
        logger: ActivityLoggerHandle,
        abort: &AtomicBool,
    ) -> Result<ProcessReport>
    where
        S: ArtifactSink<PathBuf>,
    {
        let mut module = self.factory.create_module(&self.settings, sink, logger);
        module.start_up()?;
        for entry in entries {
            if abort.load(Ordering::Acquire) {
                break;
            }
            module.process(&entry)?;
        }
        module.shut_down()
    }
}
