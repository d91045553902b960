//! Per-job settings and the two-toggle configuration panel bound to them.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::{DbxError, Result};
use crate::scanner::classifier::ClassificationSettings;

/// Settings schema version written by this crate.
pub const SETTINGS_VERSION: u32 = 1;

// ──────────────────── job settings ────────────────────

/// Serializable job settings as kept by a host's settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobSettings {
    pub version: u32,
    pub file_rules_enabled: bool,
    pub dir_rules_enabled: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self::from(ClassificationSettings::default())
    }
}

impl From<ClassificationSettings> for JobSettings {
    fn from(settings: ClassificationSettings) -> Self {
        Self {
            version: SETTINGS_VERSION,
            file_rules_enabled: settings.file_rules_enabled,
            dir_rules_enabled: settings.dir_rules_enabled,
        }
    }
}

impl JobSettings {
    /// Parse a stored settings object.
    ///
    /// Anything other than a JSON object with boolean flags, or a version this
    /// crate does not understand, is rejected with `InvalidSettings`.
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(DbxError::InvalidSettings {
                details: format!("expected a settings object, got {}", json_kind(value)),
            });
        }
        let settings = Self::deserialize(value).map_err(|e| DbxError::InvalidSettings {
            details: e.to_string(),
        })?;
        settings.check_version()?;
        Ok(settings)
    }

    /// Parse settings from their stored JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).map_err(|e| DbxError::InvalidSettings {
            details: e.to_string(),
        })?;
        Self::from_value(&value)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Frozen classification settings for a module.
    #[must_use]
    pub const fn classification(&self) -> ClassificationSettings {
        ClassificationSettings::new(self.file_rules_enabled, self.dir_rules_enabled)
    }

    fn check_version(&self) -> Result<()> {
        if self.version == 0 || self.version > SETTINGS_VERSION {
            return Err(DbxError::InvalidSettings {
                details: format!(
                    "unsupported settings version {} (supported: 1..={SETTINGS_VERSION})",
                    self.version
                ),
            });
        }
        Ok(())
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ──────────────────── settings panel ────────────────────

/// The two checkboxes of the configuration panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleId {
    LookForFiles,
    LookForDirectories,
}

impl ToggleId {
    pub const ALL: [Self; 2] = [Self::LookForFiles, Self::LookForDirectories];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LookForFiles => "Look for Files relating to Dropbox",
            Self::LookForDirectories => "Look for Directories relating to Dropbox",
        }
    }
}

/// Snapshot of one toggle for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Toggle {
    pub id: ToggleId,
    pub label: &'static str,
    pub checked: bool,
}

/// Panel model: two toggles bound one-to-one to the job settings.
///
/// The panel edits its own copy; the job only sees the value returned by
/// [`SettingsPanel::settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsPanel {
    settings: JobSettings,
}

impl SettingsPanel {
    /// Panel prepopulated from previously stored settings.
    pub fn new(settings: JobSettings) -> Self {
        Self { settings }
    }

    pub fn get(&self, toggle: ToggleId) -> bool {
        match toggle {
            ToggleId::LookForFiles => self.settings.file_rules_enabled,
            ToggleId::LookForDirectories => self.settings.dir_rules_enabled,
        }
    }

    pub fn set(&mut self, toggle: ToggleId, checked: bool) {
        match toggle {
            ToggleId::LookForFiles => self.settings.file_rules_enabled = checked,
            ToggleId::LookForDirectories => self.settings.dir_rules_enabled = checked,
        }
    }

    pub fn toggles(&self) -> [Toggle; 2] {
        ToggleId::ALL.map(|id| Toggle {
            id,
            label: id.label(),
            checked: self.get(id),
        })
    }

    /// Settings as currently shown, stamped with the current version.
    pub fn settings(&self) -> JobSettings {
        JobSettings {
            version: SETTINGS_VERSION,
            ..self.settings
        }
    }
}
