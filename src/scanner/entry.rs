//! Filesystem entries as seen by the classifier.

#![allow(missing_docs)]

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::paths::{parent_path_string, to_forward_slashes};

/// Whether an entry is a regular file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    #[serde(rename = "dir")]
    Directory,
}

impl EntryKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "dir",
        }
    }
}

/// One file or directory discovered during a scan.
///
/// `H` is the host's opaque handle: whatever it needs to attach artifacts to
/// this entry and to find the entry's parent directory later on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<H> {
    kind: EntryKind,
    name: String,
    parent_path: String,
    extension: String,
    handle: H,
}

impl<H> Entry<H> {
    /// Build an entry. The parent path is normalized to forward slashes and
    /// the extension is derived from `name`.
    pub fn new(
        kind: EntryKind,
        name: impl Into<String>,
        parent_path: impl AsRef<str>,
        handle: H,
    ) -> Self {
        let name = name.into();
        let extension = name_extension(&name);
        Self {
            kind,
            name,
            parent_path: to_forward_slashes(parent_path.as_ref()),
            extension,
            handle,
        }
    }

    #[must_use]
    pub fn file(name: impl Into<String>, parent_path: impl AsRef<str>, handle: H) -> Self {
        Self::new(EntryKind::File, name, parent_path, handle)
    }

    #[must_use]
    pub fn directory(name: impl Into<String>, parent_path: impl AsRef<str>, handle: H) -> Self {
        Self::new(EntryKind::Directory, name, parent_path, handle)
    }

    pub const fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    /// Lower-cased extension, empty when the name has none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub const fn handle(&self) -> &H {
        &self.handle
    }

    pub const fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}

impl<H: AsRef<Path>> Entry<H> {
    /// Build an entry for a path on the local filesystem, using the path
    /// itself as the handle.
    ///
    /// Returns `None` for paths without a final component (`/`, `..`).
    pub fn from_path(kind: EntryKind, handle: H) -> Option<Self> {
        let path = handle.as_ref();
        let name = path.file_name()?.to_string_lossy().into_owned();
        let parent = parent_path_string(path);
        Some(Self::new(kind, name, parent, handle))
    }
}

/// Extension of `name`: the text after the last dot, lower-cased.
///
/// A leading dot (`.bashrc`) or a trailing dot (`notes.`) does not introduce
/// an extension.
pub fn name_extension(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => name[idx + 1..].to_lowercase(),
        _ => String::new(),
    }
}
