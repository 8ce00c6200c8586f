//! Error types for the merge crate.

use arbor_store::StoreError;

/// Errors that end a merge.
///
/// Every conflict class funnels into [`MergeError::UnresolvableConflict`]
/// once a resolver gives up, so callers have one failure path to handle.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// A conflict was abandoned, or a manual resolution was not confirmed.
    #[error("unresolved conflict at '{path}': {reason}")]
    UnresolvableConflict { path: String, reason: String },

    /// The automatic content-merge tool itself failed.
    #[error("{tool} failed while merging '{path}': {reason}")]
    ToolExecution {
        tool: String,
        path: String,
        reason: String,
    },

    /// Reading an answer from the terminal failed.
    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("invalid merge configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MergeError {
    pub(crate) fn unresolved(path: &str, reason: impl Into<String>) -> Self {
        Self::UnresolvableConflict {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
