//! File-level ingest module: classifies entries and records artifacts.

#![allow(missing_docs)]

use std::fmt;
use std::marker::PhantomData;
use std::ops::AddAssign;

use serde::Serialize;

use crate::blackboard::{ArtifactSink, Attribute};
use crate::core::errors::{DbxError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scanner::classifier::{ArtifactEmission, Classifier};
use crate::scanner::entry::Entry;
use crate::scanner::rules::Target;

// ──────────────────── lifecycle ────────────────────

/// Lifecycle position of one module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Created,
    StartedUp,
    Processing,
    ShutDown,
}

impl ModuleState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::StartedUp => "started_up",
            Self::Processing => "processing",
            Self::ShutDown => "shut_down",
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────── report ────────────────────

/// Counters for one `process` call, or summed over a module's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub entries: u64,
    pub artifacts: u64,
    pub index_failures: u64,
}

impl AddAssign for ProcessReport {
    fn add_assign(&mut self, rhs: Self) {
        self.entries += rhs.entries;
        self.artifacts += rhs.artifacts;
        self.index_failures += rhs.index_failures;
    }
}

// ──────────────────── module ────────────────────

/// One worker's ingest module.
///
/// Created by [`crate::ingest::ModuleFactory::create_module`]; drives a
/// [`Classifier`] and writes every emission through the sink.
pub struct IngestModule<H, S> {
    name: &'static str,
    classifier: Classifier,
    sink: S,
    logger: ActivityLoggerHandle,
    state: ModuleState,
    totals: ProcessReport,
    _handle: PhantomData<fn(&H)>,
}

impl<H, S> IngestModule<H, S>
where
    H: Clone,
    S: ArtifactSink<H>,
{
    pub(crate) fn new(
        name: &'static str,
        classifier: Classifier,
        sink: S,
        logger: ActivityLoggerHandle,
    ) -> Self {
        Self {
            name,
            classifier,
            sink,
            logger,
            state: ModuleState::Created,
            totals: ProcessReport::default(),
            _handle: PhantomData,
        }
    }

    pub const fn state(&self) -> ModuleState {
        self.state
    }

    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Running totals since start-up.
    pub const fn totals(&self) -> ProcessReport {
        self.totals
    }

    /// Log the effective flags and accept entries from now on.
    pub fn start_up(&mut self) -> Result<()> {
        self.require("start up", &[ModuleState::Created])?;
        let settings = self.classifier.settings();
        self.logger.send(ActivityEvent::ModuleStarted {
            module: self.name.to_string(),
            file_rules_enabled: settings.file_rules_enabled,
            dir_rules_enabled: settings.dir_rules_enabled,
        });
        self.state = ModuleState::StartedUp;
        Ok(())
    }

    /// Classify one entry and record every emission.
    ///
    /// Indexing failures are logged and counted; any other sink failure is
    /// returned and should end the job.
    pub fn process(&mut self, entry: &Entry<H>) -> Result<ProcessReport> {
        self.require("process", &[ModuleState::StartedUp, ModuleState::Processing])?;
        self.state = ModuleState::Processing;

        let mut report = ProcessReport {
            entries: 1,
            ..ProcessReport::default()
        };
        for emission in self.classifier.classify(entry) {
            let indexed = self.record(&emission)?;
            report.artifacts += 1;
            if !indexed {
                report.index_failures += 1;
            }
        }
        self.totals += report;
        Ok(report)
    }

    /// Log the module's totals and refuse further entries.
    pub fn shut_down(&mut self) -> Result<ProcessReport> {
        self.require(
            "shut down",
            &[ModuleState::StartedUp, ModuleState::Processing],
        )?;
        self.logger.send(ActivityEvent::ModuleStopped {
            module: self.name.to_string(),
            entries: self.totals.entries,
            artifacts: self.totals.artifacts,
            index_failures: self.totals.index_failures,
        });
        self.state = ModuleState::ShutDown;
        Ok(self.totals)
    }

    /// Give the sink back to the host.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Returns whether the artifact made it into the search index.
    fn record(&mut self, emission: &ArtifactEmission<H>) -> Result<bool> {
        let target = match emission.target {
            Target::Itself => emission.source.clone(),
            Target::Parent => self.sink.parent_of(&emission.source)?,
        };

        self.logger.send(ActivityEvent::ArtifactFound {
            module: self.name.to_string(),
            rule: emission.rule_id.to_string(),
            category: emission.category.to_string(),
            path: self.sink.describe(&target),
            note: emission.display_note.clone(),
        });

        let artifact = self.sink.create_artifact(&target, emission.category)?;
        self.sink
            .attach_attribute(artifact, Attribute::set_name(self.name, emission.category))?;

        match self.sink.index_for_search(artifact) {
            Ok(()) => Ok(true),
            Err(index_err) => {
                let display = self.sink.artifact_display_name(artifact);
                let err = index_err.into_error(display.clone());
                self.logger.send(ActivityEvent::IndexFailed {
                    module: self.name.to_string(),
                    artifact: display,
                    error_code: err.code().to_string(),
                    error_message: err.to_string(),
                });
                Ok(false)
            }
        }
    }

    fn require(&self, action: &'static str, allowed: &[ModuleState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(DbxError::Lifecycle {
                action,
                state: self.state.as_str(),
            })
        }
    }
}
