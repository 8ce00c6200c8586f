use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::content::ContentMerger;
use crate::error::{MergeError, MergeResult};
use crate::tool::{ExternalTool, GitMergeFile, LineMerge, MergeTool};

/// What to do when both sides changed a file's executable bit differently.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileModeTieBreak {
    #[default]
    Executable,
    Regular,
    /// Ask the resolver (a `FileMode` conflict).
    Prompt,
}

/// Automatic content merge tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimaryTool {
    #[default]
    Builtin,
    Git,
}

/// Interactive tool run when the primary tool leaves conflicts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub program: String,
    pub args: Vec<String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        let kdiff3 = ExternalTool::kdiff3();
        Self {
            enabled: true,
            program: kdiff3.program,
            args: kdiff3.args,
        }
    }
}

/// The `[merge]` table of the config file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub tool: PrimaryTool,
    pub file_mode_tie_break: FileModeTieBreak,
    /// Overrides the `git` executable used by `tool = "git"`.
    pub git_program: Option<PathBuf>,
    pub fallback: FallbackConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    merge: MergeConfig,
}

impl MergeConfig {
    pub fn from_toml_str(s: &str) -> MergeResult<Self> {
        let file: ConfigFile = toml::from_str(s).map_err(|e| MergeError::Config(e.to_string()))?;
        Ok(file.merge)
    }

    pub fn load(path: &Path) -> MergeResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| MergeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> MergeResult<String> {
        let file = ConfigFile {
            merge: self.clone(),
        };
        toml::to_string_pretty(&file).map_err(|e| MergeError::Config(e.to_string()))
    }

    /// Build the content merge chain. The fallback tool is attached only
    /// when `interactive` is set and the config enables it.
    pub fn content_merger(&self, interactive: bool) -> ContentMerger {
        let primary: Box<dyn MergeTool> = match self.tool {
            PrimaryTool::Builtin => Box::new(LineMerge),
            PrimaryTool::Git => Box::new(match &self.git_program {
                Some(program) => GitMergeFile::with_program(program),
                None => GitMergeFile::new(),
            }),
        };
        let merger = ContentMerger::new(primary);
        if interactive && self.fallback.enabled {
            merger.with_fallback(Box::new(ExternalTool::new(
                self.fallback.program.clone(),
                self.fallback.args.clone(),
            )))
        } else {
            merger
        }
    }
}
