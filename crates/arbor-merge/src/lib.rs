//! Merge engine for arbor.
//!
//! Merges two divergent trees against their common base without building an
//! index. Only entries whose ids differ between the three sides are visited;
//! an unchanged subtree is carried over by id and never loaded.
//!
//! # Key Types
//!
//! - [`MergeEngine`] -- `merge_trees` / `merge_entry` / `merge_blob` / `rebase`
//! - [`ConflictResolver`] -- decides structural conflicts
//!   ([`PromptResolver`] interactively, [`PolicyResolver`] in batch)
//! - [`ContentMerger`] -- file content merge: a [`MergeTool`] first, then an
//!   optional [`InteractiveTool`] with human confirmation
//! - [`MergeConfig`] -- TOML-loadable tool and tie-break settings

pub mod config;
pub mod content;
pub mod diff3;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod tool;
pub mod types;

pub use config::{FallbackConfig, FileModeTieBreak, MergeConfig, PrimaryTool};
pub use content::ContentMerger;
pub use diff3::{merge_lines, LineMergeOutput};
pub use engine::MergeEngine;
pub use error::{MergeError, MergeResult};
pub use resolver::{
    Conflict, ConflictKind, ConflictRecord, ConflictResolver, PolicyResolver, PromptResolver,
    Resolution, ResolutionPolicy,
};
pub use tool::{
    ExternalTool, FileLabels, GitMergeFile, InteractiveTool, LineMerge, MergeFiles, MergeTool,
    ToolOutcome,
};
pub use types::{join_path, MergeLabels};
