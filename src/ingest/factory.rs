//! Module factory: identity, default settings, panel, and per-worker modules.

#![allow(missing_docs)]

use std::sync::Arc;

use serde_json::Value;

use crate::blackboard::ArtifactSink;
use crate::core::errors::Result;
use crate::ingest::module::IngestModule;
use crate::ingest::settings::{JobSettings, SettingsPanel};
use crate::logger::activity::ActivityLoggerHandle;
use crate::scanner::classifier::Classifier;
use crate::scanner::rules::RuleSet;

/// Display name of the module; also the source of every attribute it sets.
pub const MODULE_NAME: &str = "Dropbox Ingest Module";

pub const MODULE_DESCRIPTION: &str =
    "Module that attempts to identify current or previous Dropbox cloud storage installations";

pub const MODULE_VERSION: &str = "1.0";

/// Creates ingest modules sharing one rule set.
#[derive(Debug, Clone)]
pub struct ModuleFactory {
    rules: Arc<RuleSet>,
}

impl Default for ModuleFactory {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}

impl ModuleFactory {
    #[must_use]
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    pub const fn name(&self) -> &'static str {
        MODULE_NAME
    }

    pub const fn description(&self) -> &'static str {
        MODULE_DESCRIPTION
    }

    pub const fn version(&self) -> &'static str {
        MODULE_VERSION
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn default_settings(&self) -> JobSettings {
        JobSettings::default()
    }

    pub const fn has_settings_panel(&self) -> bool {
        true
    }

    /// Panel prepopulated from a stored settings object.
    ///
    /// A value that is not a valid settings object is rejected here, before
    /// any module is built from it.
    pub fn settings_panel(&self, stored: &Value) -> Result<SettingsPanel> {
        JobSettings::from_value(stored).map(SettingsPanel::new)
    }

    /// Build one module for one worker. Modules never share mutable state;
    /// the sink decides how artifacts from several workers are combined.
    pub fn create_module<H, S>(
        &self,
        settings: &JobSettings,
        sink: S,
        logger: ActivityLoggerHandle,
    ) -> IngestModule<H, S>
    where
        H: Clone,
        S: ArtifactSink<H>,
    {
        let classifier = Classifier::new(Arc::clone(&self.rules), settings.classification());
        IngestModule::new(MODULE_NAME, classifier, sink, logger)
    }
}
