//! Artifact persistence boundary.
//!
//! Ingest modules never store artifacts themselves. They call an
//! [`ArtifactSink`] to create an artifact on an entry, tag it with its set
//! name, and submit it to the search index. [`jsonl::JsonlBlackboard`] is the
//! on-disk implementation used by the `dbxtrace` CLI.

#![allow(missing_docs)]

pub mod jsonl;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::errors::{DbxError, Result};

/// Attribute key carrying the artifact's category.
pub const SET_NAME_ATTRIBUTE: &str = "SET_NAME";

/// Identifier of an artifact within one blackboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub u64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of blackboard artifact. Every hit this crate produces is an
/// "interesting file" hit, whether the target is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    InterestingFileHit,
}

impl ArtifactType {
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::InterestingFileHit => "Interesting File Hit",
        }
    }
}

/// Key/value pair attached to an artifact, with the module that set it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
    pub source: String,
}

impl Attribute {
    /// The `SET_NAME` attribute tagging an artifact with its category.
    pub fn set_name(source: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            key: SET_NAME_ATTRIBUTE.to_string(),
            value: category.into(),
            source: source.into(),
        }
    }
}

/// The search index rejected an artifact.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{details}")]
pub struct IndexError {
    pub details: String,
}

impl IndexError {
    pub fn new(details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
        }
    }

    /// Lift into the crate error, naming the artifact that failed.
    pub fn into_error(self, artifact: impl Into<String>) -> DbxError {
        DbxError::Indexing {
            artifact: artifact.into(),
            details: self.details,
        }
    }
}

/// Host-side operations an ingest module needs to record its findings.
///
/// `H` is the host's entry handle. Failures of `parent_of`, `create_artifact`
/// and `attach_attribute` are job-fatal; `index_for_search` failures are
/// reported separately so the caller can log them and carry on.
pub trait ArtifactSink<H> {
    /// Handle of the directory containing `entry`.
    fn parent_of(&mut self, entry: &H) -> Result<H>;

    /// Human-readable location of `entry` for logs.
    fn describe(&self, entry: &H) -> String;

    /// Create an interesting-item artifact on `target`.
    fn create_artifact(&mut self, target: &H, category: &str) -> Result<ArtifactId>;

    fn attach_attribute(&mut self, artifact: ArtifactId, attribute: Attribute) -> Result<()>;

    /// Submit the artifact to keyword search.
    fn index_for_search(&mut self, artifact: ArtifactId) -> std::result::Result<(), IndexError>;

    /// Display name of an artifact, used in log lines.
    fn artifact_display_name(&self, artifact: ArtifactId) -> String {
        format!("{} {artifact}", ArtifactType::InterestingFileHit.display_name())
    }
}

impl<H, S: ArtifactSink<H> + ?Sized> ArtifactSink<H> for &mut S {
    fn parent_of(&mut self, entry: &H) -> Result<H> {
        (**self).parent_of(entry)
    }

    fn describe(&self, entry: &H) -> String {
        (**self).describe(entry)
    }

    fn create_artifact(&mut self, target: &H, category: &str) -> Result<ArtifactId> {
        (**self).create_artifact(target, category)
    }

    fn attach_attribute(&mut self, artifact: ArtifactId, attribute: Attribute) -> Result<()> {
        (**self).attach_attribute(artifact, attribute)
    }

    fn index_for_search(&mut self, artifact: ArtifactId) -> std::result::Result<(), IndexError> {
        (**self).index_for_search(artifact)
    }

    fn artifact_display_name(&self, artifact: ArtifactId) -> String {
        (**self).artifact_display_name(artifact)
    }
}

/// One persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: ArtifactId,
    pub artifact_type: ArtifactType,
    /// Forward-slash path of the entry carrying the artifact.
    pub target: String,
    pub category: String,
    pub attributes: Vec<Attribute>,
    /// RFC 3339 UTC creation time.
    pub created_at: String,
}

impl ArtifactRecord {
    pub fn set_name(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key == SET_NAME_ATTRIBUTE)
            .map(|attr| attr.value.as_str())
    }

    /// Lower-cased search terms: attribute values plus the target's path components.
    pub fn search_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self
            .attributes
            .iter()
            .map(|attr| attr.value.to_lowercase())
            .chain(
                self.target
                    .split('/')
                    .filter(|part| !part.is_empty())
                    .map(str::to_lowercase),
            )
            .collect();
        terms.sort();
        terms.dedup();
        terms
    }
}
