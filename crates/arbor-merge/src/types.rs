use serde::{Deserialize, Serialize};

/// Names for the three sides of a merge, shown in prompts and conflict
/// markers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeLabels {
    pub current: String,
    pub base: String,
    pub other: String,
}

impl MergeLabels {
    pub fn new(
        current: impl Into<String>,
        base: impl Into<String>,
        other: impl Into<String>,
    ) -> Self {
        Self {
            current: current.into(),
            base: base.into(),
            other: other.into(),
        }
    }

    /// Labels used when replaying a commit onto a new parent.
    pub fn rebase() -> Self {
        Self::new("new parent", "old parent", "incoming")
    }
}

impl Default for MergeLabels {
    fn default() -> Self {
        Self::new("current", "base", "other")
    }
}

/// Display path of child `name` below `parent`. The merge root is the empty
/// string. Names that are not UTF-8 are decoded lossily; the path is only
/// used in prompts, logs, and errors.
pub fn join_path(parent: &str, name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    if parent.is_empty() {
        name.into_owned()
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_from_root_has_no_leading_slash() {
        assert_eq!(join_path("", b"src"), "src");
        assert_eq!(join_path("src", b"main.rs"), "src/main.rs");
        assert_eq!(join_path(&join_path("a", b"b"), b"c"), "a/b/c");
    }

    #[test]
    fn non_utf8_names_are_replaced_for_display() {
        assert_eq!(join_path("docs", b"caf\xe9.txt"), "docs/caf\u{fffd}.txt");
    }

    #[test]
    fn rebase_labels() {
        let labels = MergeLabels::rebase();
        assert_eq!(labels.current, "new parent");
        assert_eq!(labels.base, "old parent");
        assert_eq!(labels.other, "incoming");
    }
}
