//! Content merge tools.
//!
//! A [`MergeTool`] does the automatic three-way merge and reports a tagged
//! [`ToolOutcome`] instead of a raw exit code. An [`InteractiveTool`] hands
//! the leftovers to a human and writes whatever they produce to a file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use tracing::{debug, info};

use crate::diff3::merge_lines;
use crate::error::{MergeError, MergeResult};
use crate::types::MergeLabels;

/// The three input files of one content merge.
#[derive(Clone, Copy, Debug)]
pub struct MergeFiles<'a> {
    pub current: &'a Path,
    pub base: &'a Path,
    pub other: &'a Path,
}

/// Display labels for the three inputs, `"{path} ({label})"`, plus the
/// undecorated path for error reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileLabels {
    pub path: String,
    pub current: String,
    pub base: String,
    pub other: String,
}

impl FileLabels {
    pub fn new(path: &str, labels: &MergeLabels) -> Self {
        Self {
            path: path.to_string(),
            current: format!("{path} ({})", labels.current),
            base: format!("{path} ({})", labels.base),
            other: format!("{path} ({})", labels.other),
        }
    }
}

/// Result of an automatic merge attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Merged without conflicts; holds the merged bytes.
    Clean(Vec<u8>),
    /// This many conflict regions remain.
    Conflicted(usize),
    /// The tool itself broke. Not a content conflict.
    Failed(String),
}

/// Automatic three-way content merge.
pub trait MergeTool {
    fn name(&self) -> &str;

    fn merge(&self, files: &MergeFiles<'_>, labels: &FileLabels) -> MergeResult<ToolOutcome>;
}

/// Human-driven merge that writes its result to `merged`.
///
/// Success is not reported by the tool; the caller asks the user afterwards.
pub trait InteractiveTool {
    fn name(&self) -> &str;

    fn run(&self, files: &MergeFiles<'_>, labels: &FileLabels, merged: &Path) -> MergeResult<()>;
}

// ---------------------------------------------------------------------------
// Built-in
// ---------------------------------------------------------------------------

/// In-process line merge, see [`merge_lines`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LineMerge;

impl MergeTool for LineMerge {
    fn name(&self) -> &str {
        "builtin"
    }

    fn merge(&self, files: &MergeFiles<'_>, labels: &FileLabels) -> MergeResult<ToolOutcome> {
        let base = fs::read(files.base)?;
        let current = fs::read(files.current)?;
        let other = fs::read(files.other)?;

        let out = merge_lines(&base, &current, &other, &labels.current, &labels.other);
        if out.is_clean() {
            Ok(ToolOutcome::Clean(out.merged))
        } else {
            Ok(ToolOutcome::Conflicted(out.conflicts))
        }
    }
}

// ---------------------------------------------------------------------------
// git merge-file
// ---------------------------------------------------------------------------

/// `git merge-file -p`, with stdout taken as the merged content.
#[derive(Clone, Debug)]
pub struct GitMergeFile {
    program: PathBuf,
}

impl GitMergeFile {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitMergeFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Exit status 0 is clean, 1..=127 counts conflicts, anything else
/// (including -1 reported as 255, and signals) means the tool failed.
fn classify_status(status: ExitStatus, stdout: Vec<u8>, stderr: &[u8]) -> ToolOutcome {
    match status.code() {
        Some(0) => ToolOutcome::Clean(stdout),
        Some(n @ 1..=127) => ToolOutcome::Conflicted(n as usize),
        Some(n) => ToolOutcome::Failed(format!(
            "exited with status {n}: {}",
            String::from_utf8_lossy(stderr).trim()
        )),
        None => ToolOutcome::Failed("terminated by signal".into()),
    }
}

impl MergeTool for GitMergeFile {
    fn name(&self) -> &str {
        "git merge-file"
    }

    fn merge(&self, files: &MergeFiles<'_>, labels: &FileLabels) -> MergeResult<ToolOutcome> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("merge-file")
            .args(["-q", "-p"])
            .arg("-L")
            .arg(&labels.current)
            .arg("-L")
            .arg(&labels.base)
            .arg("-L")
            .arg(&labels.other)
            .arg(files.current)
            .arg(files.base)
            .arg(files.other)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(program = %self.program.display(), "running git merge-file");
        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) => return Ok(ToolOutcome::Failed(format!("could not run: {e}"))),
        };
        Ok(classify_status(output.status, output.stdout, &output.stderr))
    }
}

// ---------------------------------------------------------------------------
// External interactive tool
// ---------------------------------------------------------------------------

/// Interactive merge program with placeholder arguments.
///
/// Placeholders: `{base}`, `{current}`, `{other}`, `{merged}`,
/// `{base_label}`, `{current_label}`, `{other_label}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalTool {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn kdiff3() -> Self {
        Self::new(
            "kdiff3",
            [
                "--merge",
                "--auto",
                "-o",
                "{merged}",
                "--L1",
                "{base_label}",
                "--L2",
                "{current_label}",
                "--L3",
                "{other_label}",
                "{base}",
                "{current}",
                "{other}",
            ]
            .map(String::from)
            .to_vec(),
        )
    }

    fn expand(&self, files: &MergeFiles<'_>, labels: &FileLabels, merged: &Path) -> Vec<String> {
        let substitutions = [
            ("{base}", files.base.display().to_string()),
            ("{current}", files.current.display().to_string()),
            ("{other}", files.other.display().to_string()),
            ("{merged}", merged.display().to_string()),
            ("{base_label}", labels.base.clone()),
            ("{current_label}", labels.current.clone()),
            ("{other_label}", labels.other.clone()),
        ];
        self.args
            .iter()
            .map(|arg| {
                substitutions
                    .iter()
                    .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
            })
            .collect()
    }
}

impl InteractiveTool for ExternalTool {
    fn name(&self) -> &str {
        &self.program
    }

    fn run(&self, files: &MergeFiles<'_>, labels: &FileLabels, merged: &Path) -> MergeResult<()> {
        let args = self.expand(files, labels, merged);
        info!(program = %self.program, "launching interactive merge tool");

        let status = Command::new(&self.program)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| MergeError::ToolExecution {
                tool: self.program.clone(),
                path: labels.path.clone(),
                reason: e.to_string(),
            })?;

        debug!(program = %self.program, ?status, "interactive merge tool exited");
        Ok(())
    }
}
