//! Deciding conflicts the merge rules cannot settle on their own.
//!
//! The engine never talks to a terminal directly. Every structural conflict
//! (deletion vs. modification, type changes, symlink and submodule
//! divergence) and every manual content resolution goes through a
//! [`ConflictResolver`], so batch and test callers can swap in a
//! deterministic policy.

use std::fmt;
use std::str::FromStr;

use dialoguer::{Confirm, Select};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MergeError, MergeResult};
use crate::types::MergeLabels;

/// Which kind of disagreement a conflict is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// One side deleted the entry, the other modified it.
    Deletion,
    /// The sides disagree on what the entry is (file, directory, ...).
    EntryType,
    /// Both sides retargeted a symlink differently.
    Symlink,
    /// Both sides moved a submodule pointer differently.
    Submodule,
    /// Both sides changed the executable bit differently.
    FileMode,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deletion => "Deletion",
            Self::EntryType => "Entry type",
            Self::Symlink => "Symlink",
            Self::Submodule => "Submodule",
            Self::FileMode => "File mode",
        })
    }
}

/// A conflict awaiting a decision. `current` and `other` describe the two
/// candidates (e.g. "deleted" / "modified", or two symlink targets).
#[derive(Clone, Copy, Debug)]
pub struct Conflict<'a> {
    pub path: &'a str,
    pub kind: ConflictKind,
    pub labels: &'a MergeLabels,
    pub current: &'a str,
    pub other: &'a str,
}

/// The answer to a [`Conflict`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Current,
    Other,
    Abort,
}

/// Strategy for settling conflicts.
pub trait ConflictResolver {
    /// Pick one of the two candidates, or abort the merge.
    fn resolve(&mut self, conflict: &Conflict<'_>) -> MergeResult<Resolution>;

    /// Ask whether a manual content merge of `path` was completed
    /// successfully. `false` abandons the merge.
    fn confirm_resolved(&mut self, path: &str) -> MergeResult<bool>;
}

// ---------------------------------------------------------------------------
// Interactive
// ---------------------------------------------------------------------------

/// Asks on the terminal.
#[derive(Debug, Default)]
pub struct PromptResolver;

impl PromptResolver {
    pub fn new() -> Self {
        Self
    }
}

impl ConflictResolver for PromptResolver {
    fn resolve(&mut self, conflict: &Conflict<'_>) -> MergeResult<Resolution> {
        let items = [
            format!("{}: {}", conflict.labels.current, conflict.current),
            format!("{}: {}", conflict.labels.other, conflict.other),
            "Abort".to_string(),
        ];
        let choice = Select::new()
            .with_prompt(format!("{} conflict for '{}'", conflict.kind, conflict.path))
            .items(&items)
            .default(0)
            .interact_opt()
            .map_err(|e| MergeError::Prompt(e.to_string()))?;

        Ok(match choice {
            Some(0) => Resolution::Current,
            Some(1) => Resolution::Other,
            _ => Resolution::Abort,
        })
    }

    fn confirm_resolved(&mut self, path: &str) -> MergeResult<bool> {
        let answer = Confirm::new()
            .with_prompt(format!("Have conflicts in '{path}' been resolved successfully?"))
            .default(false)
            .interact_opt()
            .map_err(|e| MergeError::Prompt(e.to_string()))?;
        Ok(answer == Some(true))
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Fixed answer for every conflict.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPolicy {
    TakeCurrent,
    TakeOther,
    #[default]
    Abort,
}

impl ResolutionPolicy {
    fn resolution(&self) -> Resolution {
        match self {
            Self::TakeCurrent => Resolution::Current,
            Self::TakeOther => Resolution::Other,
            Self::Abort => Resolution::Abort,
        }
    }
}

impl FromStr for ResolutionPolicy {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "take-current" => Ok(Self::TakeCurrent),
            "take-other" => Ok(Self::TakeOther),
            "abort" => Ok(Self::Abort),
            other => Err(MergeError::Config(format!("unknown resolution policy: {other}"))),
        }
    }
}

/// A conflict seen by a [`PolicyResolver`] and what it decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictRecord {
    pub path: String,
    pub kind: ConflictKind,
    pub resolution: Resolution,
}

/// Non-interactive resolver applying one [`ResolutionPolicy`].
///
/// Manual content resolutions are confirmed only if `accept_manual` is set.
#[derive(Debug, Default)]
pub struct PolicyResolver {
    policy: ResolutionPolicy,
    accept_manual: bool,
    records: Vec<ConflictRecord>,
}

impl PolicyResolver {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            policy,
            accept_manual: false,
            records: Vec::new(),
        }
    }

    pub fn accept_manual(mut self, accept: bool) -> Self {
        self.accept_manual = accept;
        self
    }

    /// Conflicts decided so far, in the order they were met.
    pub fn records(&self) -> &[ConflictRecord] {
        &self.records
    }
}

impl ConflictResolver for PolicyResolver {
    fn resolve(&mut self, conflict: &Conflict<'_>) -> MergeResult<Resolution> {
        let resolution = self.policy.resolution();
        info!(path = conflict.path, kind = %conflict.kind, ?resolution, "conflict settled by policy");
        self.records.push(ConflictRecord {
            path: conflict.path.to_string(),
            kind: conflict.kind,
            resolution,
        });
        Ok(resolution)
    }

    fn confirm_resolved(&mut self, _path: &str) -> MergeResult<bool> {
        Ok(self.accept_manual)
    }
}
