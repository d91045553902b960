//! Rule registry: path/name signatures left behind by the Dropbox client.
//!
//! Every rule is plain data (an entry kind, a list of conditions, the targets
//! that receive an artifact, and a category label). Rules carry no state and
//! a single [`RuleSet`] is shared by every worker of a job.

#![allow(missing_docs)]

use serde::Serialize;

use crate::scanner::entry::{Entry, EntryKind};

/// Category label attached to every artifact the built-in rules produce.
pub const DROPBOX_CATEGORY: &str = "Dropbox";

/// Parent-path fragment of the Dropbox client's per-user data directory.
pub const DROPBOX_APPDATA_FRAGMENT: &str = "AppData/Local/Dropbox";

/// Databases the client keeps in its per-user data directory.
const DROPBOX_DATABASES: &[&str] = &["config.dbx", "filecache.dbx", "deleted.dbx"];

/// Which of the two independently toggleable rule groups a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFamily {
    File,
    Directory,
}

/// A single predicate over entry metadata.
///
/// All comparisons are exact and case-sensitive except the extension, which
/// is already lower-cased on the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "test", content = "value")]
pub enum Condition {
    ExtensionIs(&'static str),
    ParentContains(&'static str),
    NameIs(&'static str),
    NameIn(&'static [&'static str]),
}

impl Condition {
    fn holds<H>(self, entry: &Entry<H>) -> bool {
        match self {
            Self::ExtensionIs(ext) => entry.extension() == ext,
            Self::ParentContains(fragment) => entry.parent_path().contains(fragment),
            Self::NameIs(name) => entry.name() == name,
            Self::NameIn(names) => names.iter().any(|name| *name == entry.name()),
        }
    }
}

/// Entry that receives an artifact when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// The matched entry itself.
    Itself,
    /// The directory containing the matched entry.
    Parent,
}

/// One artifact signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub id: &'static str,
    pub applies_to: EntryKind,
    pub conditions: &'static [Condition],
    pub targets: &'static [Target],
    pub category: &'static str,
}

impl Rule {
    /// True when the entry kind matches and every condition holds.
    pub fn matches<H>(&self, entry: &Entry<H>) -> bool {
        entry.kind() == self.applies_to && self.conditions.iter().all(|c| c.holds(entry))
    }

    /// Family this rule is toggled with.
    pub const fn family(&self) -> RuleFamily {
        match self.applies_to {
            EntryKind::File => RuleFamily::File,
            EntryKind::Directory => RuleFamily::Directory,
        }
    }
}

/// Ordered file and directory rule groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    file_rules: Vec<Rule>,
    dir_rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            file_rules: builtin_file_rules(),
            dir_rules: builtin_dir_rules(),
        }
    }
}

impl RuleSet {
    /// Build a rule set from explicit groups. Rules are filed into the group
    /// matching their `applies_to`, preserving the given order.
    #[must_use]
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let (file_rules, dir_rules) = rules
            .into_iter()
            .partition(|rule| rule.family() == RuleFamily::File);
        Self {
            file_rules,
            dir_rules,
        }
    }

    pub fn file_rules(&self) -> &[Rule] {
        &self.file_rules
    }

    pub fn dir_rules(&self) -> &[Rule] {
        &self.dir_rules
    }

    /// Rules of one family, in evaluation order.
    pub fn family(&self, family: RuleFamily) -> &[Rule] {
        match family {
            RuleFamily::File => &self.file_rules,
            RuleFamily::Directory => &self.dir_rules,
        }
    }

    /// All rules, file group first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Rule> {
        self.file_rules.iter().chain(self.dir_rules.iter())
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.iter().find(|rule| rule.id == id)
    }
}

fn builtin_file_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "info-json",
            applies_to: EntryKind::File,
            conditions: &[
                Condition::ExtensionIs("json"),
                Condition::ParentContains(DROPBOX_APPDATA_FRAGMENT),
                Condition::NameIs("info.json"),
            ],
            targets: &[Target::Itself],
            category: DROPBOX_CATEGORY,
        },
        Rule {
            id: "config-dbx",
            applies_to: EntryKind::File,
            conditions: &[
                Condition::ExtensionIs("dbx"),
                Condition::ParentContains(DROPBOX_APPDATA_FRAGMENT),
                Condition::NameIn(DROPBOX_DATABASES),
            ],
            targets: &[Target::Itself],
            category: DROPBOX_CATEGORY,
        },
    ]
}

fn builtin_dir_rules() -> Vec<Rule> {
    // The cache directory lives inside the sync folder, so its parent is the
    // sync folder itself.
    vec![Rule {
        id: "cache-dir",
        applies_to: EntryKind::Directory,
        conditions: &[Condition::NameIs(".dropbox.cache")],
        targets: &[Target::Itself, Target::Parent],
        category: DROPBOX_CATEGORY,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPDATA: &str = "/img/Users/alice/AppData/Local/Dropbox/";

    fn file(name: &str, parent: &str) -> Entry<()> {
        Entry::file(name, parent, ())
    }

    #[test]
    fn builtin_catalogue_is_stable() {
        let rules = RuleSet::default();
        let ids: Vec<&str> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, ["info-json", "config-dbx", "cache-dir"]);
        assert!(rules.iter().all(|r| r.category == DROPBOX_CATEGORY));
    }

    #[test]
    fn info_json_requires_all_three_conditions() {
        let rules = RuleSet::default();
        let rule = rules.get("info-json").unwrap();
        assert!(rule.matches(&file("info.json", APPDATA)));
        assert!(!rule.matches(&file("info.json", "/img/Users/alice/Documents/")));
        assert!(!rule.matches(&file("host.json", APPDATA)));
        assert!(!rule.matches(&Entry::directory("info.json", APPDATA, ())));
    }

    #[test]
    fn each_known_database_matches_config_dbx() {
        let rules = RuleSet::default();
        let rule = rules.get("config-dbx").unwrap();
        for name in ["config.dbx", "filecache.dbx", "deleted.dbx"] {
            assert!(rule.matches(&file(name, APPDATA)), "{name} should match");
        }
        assert!(!rule.matches(&file("other.dbx", APPDATA)));
    }

    #[test]
    fn parent_containment_is_case_sensitive() {
        let rules = RuleSet::default();
        let rule = rules.get("info-json").unwrap();
        assert!(!rule.matches(&file("info.json", "/img/Users/alice/appdata/local/dropbox/")));
    }

    #[test]
    fn extension_is_checked_independently_of_name() {
        // "info.JSON" lower-cases to the right extension but the name test is exact.
        let rules = RuleSet::default();
        let rule = rules.get("info-json").unwrap();
        assert!(!rule.matches(&file("info.JSON", APPDATA)));
    }

    #[test]
    fn cache_dir_targets_self_then_parent() {
        let rules = RuleSet::default();
        let rule = rules.get("cache-dir").unwrap();
        assert_eq!(rule.targets, &[Target::Itself, Target::Parent]);
        assert!(rule.matches(&Entry::directory(".dropbox.cache", "/any/where/", ())));
        assert!(!rule.matches(&file(".dropbox.cache", "/any/where/")));
    }

    #[test]
    fn from_rules_files_rules_by_kind() {
        let defaults = RuleSet::default();
        let rebuilt = RuleSet::from_rules(defaults.iter().rev().cloned());
        assert_eq!(rebuilt.dir_rules().len(), 1);
        assert_eq!(rebuilt.file_rules()[0].id, "config-dbx");
        assert_eq!(rebuilt.family(RuleFamily::File).len(), 2);
    }
}
