//! Blob content merge: automatic tool first, human second.

use std::fs;
use std::io;

use arbor_store::Blob;
use tracing::{debug, info, warn};

use crate::error::{MergeError, MergeResult};
use crate::resolver::ConflictResolver;
use crate::tool::{FileLabels, InteractiveTool, LineMerge, MergeFiles, MergeTool, ToolOutcome};
use crate::types::MergeLabels;

/// Chains a primary [`MergeTool`] with an optional [`InteractiveTool`].
///
/// The three inputs are written to a fresh temporary directory per merge,
/// which is removed when the merge returns, whatever the outcome.
pub struct ContentMerger {
    primary: Box<dyn MergeTool>,
    fallback: Option<Box<dyn InteractiveTool>>,
}

impl ContentMerger {
    pub fn new(primary: Box<dyn MergeTool>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    /// Built-in line merge with no fallback.
    pub fn builtin() -> Self {
        Self::new(Box::new(LineMerge))
    }

    pub fn with_fallback(mut self, fallback: Box<dyn InteractiveTool>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Merge `current` and `other` against `base` (empty when absent).
    pub fn merge(
        &self,
        path: &str,
        labels: &MergeLabels,
        current: &Blob,
        base: Option<&Blob>,
        other: &Blob,
        resolver: &mut dyn ConflictResolver,
    ) -> MergeResult<Blob> {
        let dir = tempfile::Builder::new().prefix("arbor-merge-").tempdir()?;
        let current_path = dir.path().join("current");
        let base_path = dir.path().join("base");
        let other_path = dir.path().join("other");
        fs::write(&current_path, &current.data)?;
        fs::write(&base_path, base.map(|b| b.data.as_slice()).unwrap_or_default())?;
        fs::write(&other_path, &other.data)?;

        let files = MergeFiles {
            current: &current_path,
            base: &base_path,
            other: &other_path,
        };
        let file_labels = FileLabels::new(path, labels);

        let conflicts = match self.primary.merge(&files, &file_labels)? {
            ToolOutcome::Clean(bytes) => {
                debug!(path, tool = self.primary.name(), "content merged cleanly");
                return Ok(Blob::new(bytes));
            }
            ToolOutcome::Failed(reason) => {
                return Err(MergeError::ToolExecution {
                    tool: self.primary.name().to_string(),
                    path: path.to_string(),
                    reason,
                });
            }
            ToolOutcome::Conflicted(n) => n,
        };

        warn!(path, conflicts, "content merge left conflicts");
        let Some(fallback) = &self.fallback else {
            return Err(MergeError::unresolved(
                path,
                format!("{conflicts} conflicting region(s) and no interactive tool"),
            ));
        };

        let merged_path = dir.path().join("merged");
        info!(path, tool = fallback.name(), "handing conflicts to interactive tool");
        fallback.run(&files, &file_labels, &merged_path)?;

        if !resolver.confirm_resolved(path)? {
            return Err(MergeError::unresolved(path, "manual resolution not confirmed"));
        }

        match fs::read(&merged_path) {
            Ok(bytes) => Ok(Blob::new(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(MergeError::unresolved(
                path,
                "interactive tool produced no merged file",
            )),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    use super::*;
    use crate::resolver::{Conflict, Resolution};

    struct Confirming(bool);

    impl ConflictResolver for Confirming {
        fn resolve(&mut self, _conflict: &Conflict<'_>) -> MergeResult<Resolution> {
            panic!("structural resolver should not be consulted");
        }

        fn confirm_resolved(&mut self, _path: &str) -> MergeResult<bool> {
            Ok(self.0)
        }
    }

    struct Fixed(ToolOutcome);

    impl MergeTool for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn merge(&self, _files: &MergeFiles<'_>, _labels: &FileLabels) -> MergeResult<ToolOutcome> {
            Ok(self.0.clone())
        }
    }

    /// Writes `output` (if any) to the merged path and remembers the
    /// directory it was given.
    struct Scripted {
        output: Option<&'static [u8]>,
        seen_dir: Rc<RefCell<Option<PathBuf>>>,
    }

    impl InteractiveTool for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn run(&self, files: &MergeFiles<'_>, _labels: &FileLabels, merged: &Path) -> MergeResult<()> {
            *self.seen_dir.borrow_mut() = files.base.parent().map(Path::to_path_buf);
            if let Some(output) = self.output {
                fs::write(merged, output)?;
            }
            Ok(())
        }
    }

    fn blob(s: &str) -> Blob {
        Blob::new(s.as_bytes().to_vec())
    }

    fn scripted(output: Option<&'static [u8]>) -> (Box<Scripted>, Rc<RefCell<Option<PathBuf>>>) {
        let seen = Rc::new(RefCell::new(None));
        (
            Box::new(Scripted {
                output,
                seen_dir: Rc::clone(&seen),
            }),
            seen,
        )
    }

    fn run(merger: &ContentMerger, confirm: bool) -> MergeResult<Blob> {
        merger.merge(
            "f.txt",
            &MergeLabels::default(),
            &blob("mine\n"),
            Some(&blob("orig\n")),
            &blob("theirs\n"),
            &mut Confirming(confirm),
        )
    }

    #[test]
    fn builtin_clean_merge() {
        let merged = ContentMerger::builtin()
            .merge(
                "f.txt",
                &MergeLabels::default(),
                &blob("A\nB2\n"),
                Some(&blob("A\nB\n")),
                &blob("X\nB\n"),
                &mut Confirming(false),
            )
            .unwrap();
        assert_eq!(merged, blob("X\nB2\n"));
    }

    #[test]
    fn absent_base_is_empty() {
        let merged = ContentMerger::builtin()
            .merge(
                "new.txt",
                &MergeLabels::default(),
                &blob("same\n"),
                None,
                &blob("same\n"),
                &mut Confirming(false),
            )
            .unwrap();
        assert_eq!(merged, blob("same\n"));
    }

    #[test]
    fn conflict_without_fallback_is_unresolvable() {
        let err = run(&ContentMerger::builtin(), true).unwrap_err();
        assert!(matches!(err, MergeError::UnresolvableConflict { .. }));
    }

    #[test]
    fn tool_failure_skips_fallback() {
        let (fallback, seen) = scripted(Some(b"never"));
        let merger = ContentMerger::new(Box::new(Fixed(ToolOutcome::Failed("boom".into()))))
            .with_fallback(fallback);

        let err = run(&merger, true).unwrap_err();
        assert!(matches!(err, MergeError::ToolExecution { ref tool, .. } if tool == "fixed"));
        assert!(seen.borrow().is_none());
    }

    #[test]
    fn confirmed_fallback_result_is_used() {
        let (fallback, _) = scripted(Some(b"resolved\n"));
        let merger = ContentMerger::builtin().with_fallback(fallback);
        assert_eq!(run(&merger, true).unwrap(), blob("resolved\n"));
    }

    #[test]
    fn declined_confirmation_abandons_and_cleans_up() {
        let (fallback, seen) = scripted(Some(b"half done\n"));
        let merger = ContentMerger::builtin().with_fallback(fallback);

        let err = run(&merger, false).unwrap_err();
        assert!(matches!(err, MergeError::UnresolvableConflict { .. }));

        let dir = seen.borrow().clone().unwrap();
        assert!(!dir.exists(), "temporary directory should be removed");
    }

    #[test]
    fn missing_merged_file_is_unresolvable() {
        let (fallback, _) = scripted(None);
        let merger = ContentMerger::builtin().with_fallback(fallback);
        let err = run(&merger, true).unwrap_err();
        assert!(matches!(err, MergeError::UnresolvableConflict { .. }));
    }
}
