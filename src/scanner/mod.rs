//! Detection core: entry model, rule catalogue, classifier, directory walker.

pub mod classifier;
pub mod entry;
pub mod rules;
pub mod walker;
