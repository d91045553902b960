//! On-disk blackboard: artifacts and their keyword index as two JSONL files.
//!
//! Artifact records are kept in memory while attributes are attached and are
//! appended to the artifacts file on [`JsonlBlackboard::flush`]. Index
//! postings (`{"term": .., "artifact": ..}`) are appended as soon as an
//! artifact is indexed, so a failed index write affects only that artifact.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::blackboard::{
    ArtifactId, ArtifactRecord, ArtifactSink, ArtifactType, Attribute, IndexError,
};
use crate::core::errors::{DbxError, Result};
use crate::core::paths::to_forward_slashes;
use crate::logger::jsonl::{format_utc_now, open_append};

/// One line of the index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPosting {
    pub term: String,
    pub artifact: ArtifactId,
}

/// Blackboard backed by an artifacts JSONL file and an index JSONL file.
pub struct JsonlBlackboard {
    artifacts_path: PathBuf,
    index_path: PathBuf,
    index_writer: Option<BufWriter<File>>,
    records: BTreeMap<ArtifactId, ArtifactRecord>,
    /// Records with an id at or above this mark have not been written yet.
    unflushed_from: u64,
    next_id: u64,
}

impl JsonlBlackboard {
    /// Open (or create) the two files. Ids continue after the highest id
    /// already present in the artifacts file.
    pub fn open(artifacts_path: impl Into<PathBuf>, index_path: impl Into<PathBuf>) -> Result<Self> {
        let artifacts_path = artifacts_path.into();
        let index_path = index_path.into();
        if artifacts_path == index_path {
            return Err(DbxError::ArtifactStore {
                context: "open",
                details: format!(
                    "artifacts and index must be different files: {}",
                    artifacts_path.display()
                ),
            });
        }

        // Create the artifacts file up front so an unwritable location fails here.
        drop(open_append(&artifacts_path)?);
        let next_id = read_records(&artifacts_path)?
            .iter()
            .map(|r| r.id.0)
            .max()
            .map_or(1, |max| max + 1);
        let (index_file, _) = open_append(&index_path)?;

        Ok(Self {
            artifacts_path,
            index_path,
            index_writer: Some(BufWriter::new(index_file)),
            records: BTreeMap::new(),
            unflushed_from: next_id,
            next_id,
        })
    }

    pub fn artifacts_path(&self) -> &Path {
        &self.artifacts_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Artifacts created through this handle, in id order.
    pub fn records(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.records.values()
    }

    pub fn record(&self, id: ArtifactId) -> Option<&ArtifactRecord> {
        self.records.get(&id)
    }

    /// Stop accepting index postings; later `index_for_search` calls fail.
    pub fn close_index(&mut self) -> Result<()> {
        if let Some(mut writer) = self.index_writer.take() {
            writer
                .flush()
                .map_err(|source| DbxError::io(&self.index_path, source))?;
        }
        Ok(())
    }

    /// Append every record not yet written to the artifacts file and flush the index.
    pub fn flush(&mut self) -> Result<()> {
        let (file, _) = open_append(&self.artifacts_path)?;
        let mut out = BufWriter::new(file);
        for record in self.records.range(ArtifactId(self.unflushed_from)..).map(|(_, r)| r) {
            let line = serde_json::to_string(record)?;
            writeln!(out, "{line}").map_err(|source| DbxError::io(&self.artifacts_path, source))?;
        }
        out.flush()
            .map_err(|source| DbxError::io(&self.artifacts_path, source))?;
        self.unflushed_from = self.next_id;

        if let Some(writer) = self.index_writer.as_mut() {
            writer
                .flush()
                .map_err(|source| DbxError::io(&self.index_path, source))?;
        }
        Ok(())
    }

    /// Wrap for sharing across ingest workers.
    pub fn into_shared(self) -> SharedBlackboard {
        SharedBlackboard(Arc::new(Mutex::new(self)))
    }

    fn record_mut(&mut self, id: ArtifactId, context: &'static str) -> Result<&mut ArtifactRecord> {
        self.records
            .get_mut(&id)
            .ok_or_else(|| DbxError::ArtifactStore {
                context,
                details: format!("unknown artifact {id}"),
            })
    }
}

impl ArtifactSink<PathBuf> for JsonlBlackboard {
    fn parent_of(&mut self, entry: &PathBuf) -> Result<PathBuf> {
        entry
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .ok_or_else(|| DbxError::ArtifactStore {
                context: "parent_of",
                details: format!("{} has no parent directory", entry.display()),
            })
    }

    fn describe(&self, entry: &PathBuf) -> String {
        to_forward_slashes(&entry.to_string_lossy())
    }

    fn create_artifact(&mut self, target: &PathBuf, category: &str) -> Result<ArtifactId> {
        let id = ArtifactId(self.next_id);
        self.next_id += 1;
        self.records.insert(
            id,
            ArtifactRecord {
                id,
                artifact_type: ArtifactType::InterestingFileHit,
                target: self.describe(target),
                category: category.to_string(),
                attributes: Vec::new(),
                created_at: format_utc_now(),
            },
        );
        Ok(id)
    }

    fn attach_attribute(&mut self, artifact: ArtifactId, attribute: Attribute) -> Result<()> {
        self.record_mut(artifact, "attach_attribute")?
            .attributes
            .push(attribute);
        Ok(())
    }

    fn index_for_search(&mut self, artifact: ArtifactId) -> std::result::Result<(), IndexError> {
        let terms = self
            .records
            .get(&artifact)
            .ok_or_else(|| IndexError::new(format!("unknown artifact {artifact}")))?
            .search_terms();
        let writer = self
            .index_writer
            .as_mut()
            .ok_or_else(|| IndexError::new("search index is closed"))?;

        let mut buf = String::new();
        for term in terms {
            let posting = IndexPosting { term, artifact };
            let line = serde_json::to_string(&posting)
                .map_err(|e| IndexError::new(format!("posting serialization failed: {e}")))?;
            buf.push_str(&line);
            buf.push('\n');
        }
        writer
            .write_all(buf.as_bytes())
            .map_err(|e| IndexError::new(format!("{}: {e}", self.index_path.display())))
    }
}

/// Cloneable blackboard handle shared by every worker of a scan.
#[derive(Clone)]
pub struct SharedBlackboard(Arc<Mutex<JsonlBlackboard>>);

impl SharedBlackboard {
    /// Run `f` with exclusive access to the blackboard.
    pub fn with<T>(&self, f: impl FnOnce(&mut JsonlBlackboard) -> T) -> T {
        f(&mut self.0.lock())
    }
}

impl ArtifactSink<PathBuf> for SharedBlackboard {
    fn parent_of(&mut self, entry: &PathBuf) -> Result<PathBuf> {
        self.0.lock().parent_of(entry)
    }

    fn describe(&self, entry: &PathBuf) -> String {
        self.0.lock().describe(entry)
    }

    fn create_artifact(&mut self, target: &PathBuf, category: &str) -> Result<ArtifactId> {
        self.0.lock().create_artifact(target, category)
    }

    fn attach_attribute(&mut self, artifact: ArtifactId, attribute: Attribute) -> Result<()> {
        self.0.lock().attach_attribute(artifact, attribute)
    }

    fn index_for_search(&mut self, artifact: ArtifactId) -> std::result::Result<(), IndexError> {
        self.0.lock().index_for_search(artifact)
    }
}

/// Read every artifact record from an artifacts file. A missing file reads as empty.
pub fn read_records(path: &Path) -> Result<Vec<ArtifactRecord>> {
    read_lines(path)?
        .iter()
        .map(|line| serde_json::from_str(line).map_err(DbxError::from))
        .collect()
}

/// Artifact ids whose postings match `term` (case-insensitive, exact term).
pub fn search_index(index_path: &Path, term: &str) -> Result<Vec<ArtifactId>> {
    let needle = term.to_lowercase();
    let mut hits = Vec::new();
    for line in read_lines(index_path)? {
        let posting: IndexPosting = serde_json::from_str(&line)?;
        if posting.term == needle {
            hits.push(posting.artifact);
        }
    }
    hits.sort();
    hits.dedup();
    Ok(hits)
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(DbxError::io(path, source)),
    };
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| DbxError::io(path, source))?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Remove both files of a blackboard, ignoring ones that do not exist.
pub fn reset(artifacts_path: &Path, index_path: &Path) -> Result<()> {
    for path in [artifacts_path, index_path] {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(DbxError::io(path, source)),
        }
    }
    Ok(())
}
