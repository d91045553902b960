#![forbid(unsafe_code)]

//! dropbox_trace: find traces of current or past Dropbox installations in a
//! file system image.
//!
//! Three layers:
//! 1. **Classifier**: pure per-entry rule evaluation (`scanner`)
//! 2. **Ingest modules**: lifecycle, artifact creation, indexing (`ingest`)
//! 3. **Filesystem host**: parallel walker and JSONL blackboard (`scanner::walker`, `blackboard`)
//!
//! # Library usage
//!
//! ```rust,no_run
//! use dropbox_trace::prelude::*;
//!
//! let classifier = Classifier::with_builtin_rules(ClassificationSettings::default());
//! let entry = Entry::file("info.json", "/img/Users/a/AppData/Local/Dropbox/", ());
//! assert_eq!(classifier.classify(&entry).len(), 1);
//! ```

pub mod prelude;

pub mod blackboard;
pub mod core;
pub mod ingest;
pub mod logger;
pub mod scanner;
