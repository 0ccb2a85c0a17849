//! Fatal configuration errors. Everything per-item is logged and counted
//! instead of surfacing here.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no repository registered; at least one is required")]
    NoRepositories,

    #[error("write target '{0}' is not a registered repository label")]
    UnknownWriteTarget(String),

    #[error("document store {path} could not be opened: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },
}
