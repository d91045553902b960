//! Parallel directory walker producing classifier entries.
//!
//! Worker threads pull directories from a shared work queue, list them, emit
//! one [`Entry`] per child file or directory, and queue child directories for
//! further listing. Roots themselves are not emitted unless they are files.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;

use crate::core::config::ScannerConfig;
use crate::core::errors::{DbxError, Result};
use crate::scanner::entry::{Entry, EntryKind};

/// Walker configuration derived from `ScannerConfig`.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub root_paths: Vec<PathBuf>,
    /// Deepest level emitted; children of a root are at depth 1.
    pub max_depth: usize,
    pub follow_symlinks: bool,
    pub parallelism: usize,
    pub excluded_paths: HashSet<PathBuf>,
}

impl WalkerConfig {
    /// Walker settings from the scanner section, with explicit roots.
    pub fn from_scanner(scanner: &ScannerConfig, root_paths: Vec<PathBuf>) -> Self {
        Self {
            root_paths,
            max_depth: scanner.max_depth,
            follow_symlinks: scanner.follow_symlinks,
            parallelism: scanner.parallelism,
            excluded_paths: scanner.excluded_paths.iter().cloned().collect(),
        }
    }
}

/// (directory, depth of the directory itself)
type WorkItem = (PathBuf, usize);

/// Parallel walker over local paths.
///
/// - Skips excluded paths and everything below them
/// - Skips symlinks unless `follow_symlinks` is set
/// - Unreadable directories are skipped, not reported
pub struct DirectoryWalker {
    config: WalkerConfig,
}

impl DirectoryWalker {
    pub fn new(config: WalkerConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &WalkerConfig {
        &self.config
    }

    /// Walk every root and collect all entries.
    pub fn walk(&self) -> Result<Vec<Entry<PathBuf>>> {
        Ok(self.stream()?.into_iter().collect())
    }

    /// Stream entries as they are discovered.
    ///
    /// The walk runs in background threads; the receiver disconnects once
    /// every directory has been listed.
    pub fn stream(&self) -> Result<channel::Receiver<Entry<PathBuf>>> {
        let parallelism = self.config.parallelism.max(1);

        // Unbounded: a directory that cannot be queued would silently vanish
        // from the walk.
        let (work_tx, work_rx) = channel::unbounded::<WorkItem>();
        let (result_tx, result_rx) = channel::unbounded::<Entry<PathBuf>>();

        let in_flight = Arc::new(AtomicUsize::new(0));

        for root in &self.config.root_paths {
            if self.config.excluded_paths.contains(root) {
                continue;
            }
            let meta = match metadata_for_path(root, self.config.follow_symlinks) {
                Ok(m) => m,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) if err.kind() == ErrorKind::PermissionDenied => continue,
                Err(err) => return Err(DbxError::io(root, err)),
            };
            if meta.is_dir() {
                in_flight.fetch_add(1, Ordering::Release);
                let _ = work_tx.send((root.clone(), 0));
            } else if meta.is_file()
                && let Some(entry) = Entry::from_path(EntryKind::File, root.clone())
            {
                let _ = result_tx.send(entry);
            }
        }

        for idx in 0..parallelism {
            let work_rx = work_rx.clone();
            let work_tx = work_tx.clone();
            let result_tx = result_tx.clone();
            let in_flight = Arc::clone(&in_flight);
            let config = self.config.clone();

            thread::Builder::new()
                .name(format!("dbx-walker-{idx}"))
                .spawn(move || {
                    walker_thread(&work_rx, &work_tx, &result_tx, &in_flight, &config);
                })
                .map_err(|e| DbxError::Runtime {
                    details: format!("failed to spawn walker thread: {e}"),
                })?;
        }

        Ok(result_rx)
    }
}

/// Pull directories until the queue is drained and nothing is in flight.
fn walker_thread(
    work_rx: &channel::Receiver<WorkItem>,
    work_tx: &channel::Sender<WorkItem>,
    result_tx: &channel::Sender<Entry<PathBuf>>,
    in_flight: &AtomicUsize,
    config: &WalkerConfig,
) {
    loop {
        match work_rx.recv_timeout(Duration::from_millis(50)) {
            Ok((dir_path, depth)) => {
                process_directory(&dir_path, depth, work_tx, result_tx, in_flight, config);
                in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            Err(channel::RecvTimeoutError::Timeout) => {
                if in_flight.load(Ordering::Acquire) == 0 {
                    return;
                }
            }
            Err(channel::RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// List one directory: emit each child, queue child directories.
fn process_directory(
    dir_path: &Path,
    depth: usize,
    work_tx: &channel::Sender<WorkItem>,
    result_tx: &channel::Sender<Entry<PathBuf>>,
    in_flight: &AtomicUsize,
    config: &WalkerConfig,
) {
    if depth >= config.max_depth {
        return;
    }
    let Ok(entries) = fs::read_dir(dir_path) else {
        return;
    };
    let child_depth = depth + 1;

    for entry_result in entries {
        let Ok(dir_entry) = entry_result else {
            continue;
        };
        let child_path = dir_entry.path();
        if config.excluded_paths.contains(&child_path) {
            continue;
        }

        let Ok(ft) = dir_entry.file_type() else {
            continue;
        };
        let is_dir = if ft.is_symlink() {
            if !config.follow_symlinks {
                continue;
            }
            match fs::metadata(&child_path) {
                Ok(m) => m.is_dir(),
                // Dangling link.
                Err(_) => continue,
            }
        } else {
            ft.is_dir()
        };

        let kind = if is_dir {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        if is_dir && child_depth < config.max_depth {
            in_flight.fetch_add(1, Ordering::Release);
            if work_tx.send((child_path.clone(), child_depth)).is_err() {
                in_flight.fetch_sub(1, Ordering::Release);
            }
        }
        if let Some(entry) = Entry::from_path(kind, child_path) {
            // The consumer hung up; the remaining work is still drained so
            // the in-flight count reaches zero.
            let _ = result_tx.send(entry);
        }
    }
}

fn metadata_for_path(path: &Path, follow_symlinks: bool) -> std::io::Result<fs::Metadata> {
    if follow_symlinks {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
}
