//! Recursive three-way merge over trees, entries, and blobs.

use std::collections::BTreeSet;

use arbor_store::{Blob, Commit, Entry, EntryMode, ObjectStore, Tree};
use arbor_types::{ObjectId, Signature};
use tracing::{debug, info, warn};

use crate::config::{FileModeTieBreak, MergeConfig};
use crate::content::ContentMerger;
use crate::error::{MergeError, MergeResult};
use crate::resolver::{Conflict, ConflictKind, ConflictResolver, Resolution};
use crate::types::{join_path, MergeLabels};

/// Three-way merge over objects in an [`ObjectStore`].
///
/// Merged trees and blobs are written to the store as they are produced;
/// inputs are never modified. A failed merge returns an error and no root
/// tree, though objects for already-merged children may remain in the store.
pub struct MergeEngine<'a> {
    store: &'a dyn ObjectStore,
    resolver: &'a mut dyn ConflictResolver,
    content: ContentMerger,
    tie_break: FileModeTieBreak,
    committer: Signature,
}

impl<'a> MergeEngine<'a> {
    /// Engine with the built-in line merge, no interactive fallback, and the
    /// committer taken from the environment.
    pub fn new(store: &'a dyn ObjectStore, resolver: &'a mut dyn ConflictResolver) -> Self {
        Self {
            store,
            resolver,
            content: ContentMerger::builtin(),
            tie_break: FileModeTieBreak::default(),
            committer: Signature::committer_from_env(),
        }
    }

    pub fn from_config(
        store: &'a dyn ObjectStore,
        resolver: &'a mut dyn ConflictResolver,
        config: &MergeConfig,
        interactive: bool,
    ) -> Self {
        Self::new(store, resolver)
            .with_content_merger(config.content_merger(interactive))
            .with_tie_break(config.file_mode_tie_break)
    }

    pub fn with_content_merger(mut self, content: ContentMerger) -> Self {
        self.content = content;
        self
    }

    pub fn with_tie_break(mut self, tie_break: FileModeTieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_committer(mut self, committer: Signature) -> Self {
        self.committer = committer;
        self
    }

    // -----------------------------------------------------------------------
    // Trees
    // -----------------------------------------------------------------------

    /// Merge three root trees by id and return the merged tree's id.
    ///
    /// Nothing is read from the store when two of the ids already agree.
    pub fn merge_trees(
        &mut self,
        labels: &MergeLabels,
        current: &ObjectId,
        base: &ObjectId,
        other: &ObjectId,
    ) -> MergeResult<ObjectId> {
        info!(
            current = %current.short_hex(),
            base = %base.short_hex(),
            other = %other.short_hex(),
            "merging trees"
        );
        self.merge_subtrees("", labels, current, Some(base), other)
    }

    /// Merge three loaded trees. Every name present on any side is visited
    /// once; names that resolve to nothing are dropped.
    pub fn merge_tree(
        &mut self,
        path: &str,
        labels: &MergeLabels,
        current: &Tree,
        base: &Tree,
        other: &Tree,
    ) -> MergeResult<Tree> {
        let names: BTreeSet<&[u8]> = current
            .names()
            .chain(base.names())
            .chain(other.names())
            .collect();

        let mut merged = Tree::empty();
        for name in names {
            let child = join_path(path, name);
            if let Some(entry) = self.merge_entry(
                &child,
                labels,
                current.get(name),
                base.get(name),
                other.get(name),
            )? {
                merged.insert(name, entry);
            }
        }
        Ok(merged)
    }

    /// Subtree merge by id. An absent base is treated as an empty tree.
    fn merge_subtrees(
        &mut self,
        path: &str,
        labels: &MergeLabels,
        current: &ObjectId,
        base: Option<&ObjectId>,
        other: &ObjectId,
    ) -> MergeResult<ObjectId> {
        if base == Some(current) {
            return Ok(*other);
        }
        if base == Some(other) || current == other {
            return Ok(*current);
        }

        let current_tree = self.store.read_tree(current)?;
        let other_tree = self.store.read_tree(other)?;
        let base_tree = match base {
            Some(id) => self.store.read_tree(id)?,
            None => Tree::empty(),
        };

        let merged = self.merge_tree(path, labels, &current_tree, &base_tree, &other_tree)?;
        let id = self.store.write_tree(&merged)?;
        debug!(path, id = %id.short_hex(), entries = merged.len(), "wrote merged tree");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Entries
    // -----------------------------------------------------------------------

    /// Merge one named entry. `None` on input means the name is absent on
    /// that side; `None` on output means it is deleted in the result.
    pub fn merge_entry(
        &mut self,
        path: &str,
        labels: &MergeLabels,
        current: Option<&Entry>,
        base: Option<&Entry>,
        other: Option<&Entry>,
    ) -> MergeResult<Option<Entry>> {
        if base == current {
            return Ok(other.copied());
        }
        if base == other || current == other {
            return Ok(current.copied());
        }

        let (current, other) = match (current, other) {
            (Some(c), Some(o)) => (c, o),
            (None, Some(o)) => {
                return self.choose(
                    path,
                    labels,
                    ConflictKind::Deletion,
                    ("deleted", None),
                    ("modified", Some(*o)),
                );
            }
            (Some(c), None) => {
                return self.choose(
                    path,
                    labels,
                    ConflictKind::Deletion,
                    ("modified", Some(*c)),
                    ("deleted", None),
                );
            }
            (None, None) => return Ok(None),
        };

        let mode = if current.mode == other.mode {
            current.mode
        } else if current.mode.is_file() && other.mode.is_file() {
            self.resolve_file_mode(path, labels, base, current.mode, other.mode)?
        } else {
            return self.choose(
                path,
                labels,
                ConflictKind::EntryType,
                (current.mode.describe(), Some(*current)),
                (other.mode.describe(), Some(*other)),
            );
        };
        debug!(path, %mode, "merging entry contents");

        match mode {
            EntryMode::Regular | EntryMode::Executable => {
                let base_id = base.filter(|b| b.mode.is_file()).map(|b| &b.id);
                let id = self.merge_blobs(path, labels, &current.id, base_id, &other.id)?;
                Ok(Some(Entry::new(mode, id)))
            }
            EntryMode::Directory => {
                let base_id = base
                    .filter(|b| b.mode == EntryMode::Directory)
                    .map(|b| &b.id);
                let id = self.merge_subtrees(path, labels, &current.id, base_id, &other.id)?;
                Ok(Some(Entry::new(mode, id)))
            }
            EntryMode::Symlink => {
                let current_target = self.store.read_blob(&current.id)?.symlink_target();
                let other_target = self.store.read_blob(&other.id)?.symlink_target();
                self.choose(
                    path,
                    labels,
                    ConflictKind::Symlink,
                    (current_target.as_str(), Some(*current)),
                    (other_target.as_str(), Some(*other)),
                )
            }
            EntryMode::Gitlink => {
                let current_hex = current.id.to_hex();
                let other_hex = other.id.to_hex();
                self.choose(
                    path,
                    labels,
                    ConflictKind::Submodule,
                    (current_hex.as_str(), Some(*current)),
                    (other_hex.as_str(), Some(*other)),
                )
            }
        }
    }

    /// Settle a permission-bit divergence between two file modes.
    fn resolve_file_mode(
        &mut self,
        path: &str,
        labels: &MergeLabels,
        base: Option<&Entry>,
        current: EntryMode,
        other: EntryMode,
    ) -> MergeResult<EntryMode> {
        let base_mode = base.map(|b| b.mode);
        if base_mode == Some(current) {
            return Ok(other);
        }
        if base_mode == Some(other) {
            return Ok(current);
        }
        match self.tie_break {
            FileModeTieBreak::Executable => Ok(EntryMode::Executable),
            FileModeTieBreak::Regular => Ok(EntryMode::Regular),
            FileModeTieBreak::Prompt => self.choose(
                path,
                labels,
                ConflictKind::FileMode,
                (current.describe(), current),
                (other.describe(), other),
            ),
        }
    }

    /// Ask the resolver to pick between two candidates.
    fn choose<T>(
        &mut self,
        path: &str,
        labels: &MergeLabels,
        kind: ConflictKind,
        current: (&str, T),
        other: (&str, T),
    ) -> MergeResult<T> {
        warn!(path, %kind, current = current.0, other = other.0, "merge conflict");
        let conflict = Conflict {
            path,
            kind,
            labels,
            current: current.0,
            other: other.0,
        };
        match self.resolver.resolve(&conflict)? {
            Resolution::Current => Ok(current.1),
            Resolution::Other => Ok(other.1),
            Resolution::Abort => Err(MergeError::unresolved(
                path,
                format!("{kind} conflict abandoned"),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Blobs
    // -----------------------------------------------------------------------

    fn merge_blobs(
        &mut self,
        path: &str,
        labels: &MergeLabels,
        current: &ObjectId,
        base: Option<&ObjectId>,
        other: &ObjectId,
    ) -> MergeResult<ObjectId> {
        if base == Some(current) {
            return Ok(*other);
        }
        if base == Some(other) || current == other {
            return Ok(*current);
        }

        let current_blob = self.store.read_blob(current)?;
        let other_blob = self.store.read_blob(other)?;
        let base_blob = base.map(|id| self.store.read_blob(id)).transpose()?;

        let merged = self.merge_blob(path, labels, &current_blob, base_blob.as_ref(), &other_blob)?;
        Ok(self.store.write_blob(&merged)?)
    }

    /// Merge file contents through the configured [`ContentMerger`].
    pub fn merge_blob(
        &mut self,
        path: &str,
        labels: &MergeLabels,
        current: &Blob,
        base: Option<&Blob>,
        other: &Blob,
    ) -> MergeResult<Blob> {
        if base == Some(current) {
            return Ok(other.clone());
        }
        if base == Some(other) || current == other {
            return Ok(current.clone());
        }
        info!(path, tool = self.content.primary_name(), "merging file contents");
        self.content
            .merge(path, labels, current, base, other, &mut *self.resolver)
    }

    // -----------------------------------------------------------------------
    // Rebase
    // -----------------------------------------------------------------------

    /// Replay `commit` on top of `new_parent`, returning the new commit's id.
    ///
    /// If `new_parent` already is the commit's first parent the commit is
    /// returned as is. Otherwise the commit's changes relative to its old
    /// parent are merged into the new parent's tree; message and author are
    /// kept, the committer is this engine's.
    pub fn rebase(&mut self, commit: &ObjectId, new_parent: &ObjectId) -> MergeResult<ObjectId> {
        let original = self.store.read_commit(commit)?;
        if original.parent() == Some(new_parent) {
            debug!(commit = %commit.short_hex(), "already on new parent");
            return Ok(*commit);
        }

        let onto = self.store.read_commit(new_parent)?;
        let old_base = match original.parent() {
            Some(parent) => Some(self.store.read_commit(parent)?.tree),
            None => None,
        };

        let labels = MergeLabels::rebase();
        let tree = self.merge_subtrees("", &labels, &onto.tree, old_base.as_ref(), &original.tree)?;

        let rebased = Commit {
            tree,
            parents: vec![*new_parent],
            message: original.message,
            author: original.author,
            committer: self.committer.clone(),
        };
        let id = self.store.write_commit(&rebased)?;
        info!(
            commit = %commit.short_hex(),
            onto = %new_parent.short_hex(),
            rebased = %id.short_hex(),
            "rebased commit"
        );
        Ok(id)
    }

    /// Rebase a run of commits, oldest first, each onto the previous result.
    /// Returns the id of the last rebased commit (`onto` if `commits` is
    /// empty).
    pub fn rebase_stack(&mut self, commits: &[ObjectId], onto: &ObjectId) -> MergeResult<ObjectId> {
        let mut tip = *onto;
        for commit in commits {
            tip = self.rebase(commit, &tip)?;
        }
        Ok(tip)
    }
}
