//! Activity logging: append-only JSONL writer fed by a dedicated logger thread.

pub mod activity;
pub mod jsonl;
