//! Host adapter: module factory, per-worker ingest modules, job settings,
//! and the scan pipeline that drives them over a directory walk.
//!
//! Classification itself lives in [`crate::scanner::classifier`]; this layer
//! owns the lifecycle, turns emissions into blackboard artifacts, and logs.

pub mod factory;
pub mod module;
pub mod pipeline;
pub mod settings;

pub use factory::{MODULE_DESCRIPTION, MODULE_NAME, MODULE_VERSION, ModuleFactory};
pub use module::{IngestModule, ModuleState, ProcessReport};
pub use pipeline::{ScanJob, ScanSummary};
pub use settings::{JobSettings, SettingsPanel, Toggle, ToggleId};
