//! Per-entry classification: which rule family runs, and what each match emits.

#![allow(missing_docs)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::paths::last_component;
use crate::scanner::entry::{Entry, EntryKind};
use crate::scanner::rules::{Rule, RuleFamily, RuleSet, Target};

/// Which rule families a job has switched on. Frozen for the job's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationSettings {
    /// Look for files relating to Dropbox.
    pub file_rules_enabled: bool,
    /// Look for directories relating to Dropbox.
    pub dir_rules_enabled: bool,
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            file_rules_enabled: true,
            dir_rules_enabled: true,
        }
    }
}

impl ClassificationSettings {
    #[must_use]
    pub const fn new(file_rules_enabled: bool, dir_rules_enabled: bool) -> Self {
        Self {
            file_rules_enabled,
            dir_rules_enabled,
        }
    }

    /// The single family evaluated for every entry under these settings.
    ///
    /// The file family takes precedence: while it is enabled the directory
    /// family never runs, whatever `dir_rules_enabled` says. Directory rules
    /// run only when file rules are off.
    #[must_use]
    pub const fn active_family(&self) -> Option<RuleFamily> {
        if self.file_rules_enabled {
            Some(RuleFamily::File)
        } else if self.dir_rules_enabled {
            Some(RuleFamily::Directory)
        } else {
            None
        }
    }
}

/// Instruction to create one artifact.
///
/// `source` is the handle of the classified entry. When `target` is
/// [`Target::Parent`] the artifact belongs on the directory containing that
/// entry; the host resolves it from `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEmission<H> {
    pub source: H,
    pub target: Target,
    pub rule_id: &'static str,
    pub category: &'static str,
    pub display_note: String,
}

impl<H> ArtifactEmission<H> {
    pub const fn targets_parent(&self) -> bool {
        matches!(self.target, Target::Parent)
    }
}

impl RuleSet {
    /// Evaluate the family selected by `settings` against one entry.
    pub fn evaluate<H: Clone>(
        &self,
        entry: &Entry<H>,
        settings: &ClassificationSettings,
    ) -> Vec<ArtifactEmission<H>> {
        let Some(family) = settings.active_family() else {
            return Vec::new();
        };

        let mut emissions = Vec::new();
        for rule in self.family(family) {
            if rule.applies_to != entry.kind() || !rule.matches(entry) {
                continue;
            }
            emissions.extend(
                rule.targets
                    .iter()
                    .map(|target| emission_for(rule, *target, entry)),
            );
        }
        emissions
    }
}

fn emission_for<H: Clone>(rule: &Rule, target: Target, entry: &Entry<H>) -> ArtifactEmission<H> {
    let display_note = match (target, entry.kind()) {
        (Target::Itself, EntryKind::File) => {
            format!("Found {}-related File: {}", rule.category, entry.name())
        }
        (Target::Itself, EntryKind::Directory) => {
            format!("Found {}-related Folder: {}", rule.category, entry.name())
        }
        (Target::Parent, _) => format!(
            "Found {} Sync Folder: {}",
            rule.category,
            last_component(entry.parent_path())
        ),
    };
    ArtifactEmission {
        source: entry.handle().clone(),
        target,
        rule_id: rule.id,
        category: rule.category,
        display_note,
    }
}

/// Stateless classifier bound to one job's settings.
///
/// Workers each own one; the rule set behind it is shared.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Arc<RuleSet>,
    settings: ClassificationSettings,
}

impl Classifier {
    pub fn new(rules: Arc<RuleSet>, settings: ClassificationSettings) -> Self {
        Self { rules, settings }
    }

    /// Classifier over the built-in rules.
    pub fn with_builtin_rules(settings: ClassificationSettings) -> Self {
        Self::new(Arc::new(RuleSet::default()), settings)
    }

    pub const fn settings(&self) -> &ClassificationSettings {
        &self.settings
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Emissions for one entry, in rule order, self target before parent.
    pub fn classify<H: Clone>(&self, entry: &Entry<H>) -> Vec<ArtifactEmission<H>> {
        self.rules.evaluate(entry, &self.settings)
    }
}
