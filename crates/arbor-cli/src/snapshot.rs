//! Import a directory into the object store.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use arbor_store::{Blob, Entry, EntryMode, ObjectStore, Tree};
use arbor_types::ObjectId;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

const SKIPPED: &[&str] = &[".arbor", ".git"];

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0 && SKIPPED.iter().any(|name| entry.file_name() == *name)
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> EntryMode {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        EntryMode::Executable
    } else {
        EntryMode::Regular
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> EntryMode {
    EntryMode::Regular
}

#[cfg(unix)]
fn os_bytes(name: &OsStr) -> anyhow::Result<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    Ok(name.as_bytes().to_vec())
}

#[cfg(not(unix))]
fn os_bytes(name: &OsStr) -> anyhow::Result<Vec<u8>> {
    match name.to_str() {
        Some(name) => Ok(name.as_bytes().to_vec()),
        None => bail!("name is not valid Unicode: {}", name.to_string_lossy()),
    }
}

/// Write every file, symlink and non-empty directory under `root` to the
/// store and return the id of the root tree.
///
/// The walk is pre-order so skipped directories are pruned before they are
/// entered. Entries are then replayed in reverse, which puts every directory
/// after its contents, so each subtree is complete by the time it is written.
/// Empty directories are left out.
pub fn import_dir(store: &dyn ObjectStore, root: &Path) -> anyhow::Result<ObjectId> {
    let entries = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("walking {}", root.display()))?;

    let mut pending: HashMap<PathBuf, Tree> = HashMap::new();
    for entry in entries.iter().rev() {
        let path = entry.path();
        let file_type = entry.file_type();

        let (mode, id) = if file_type.is_dir() {
            let tree = pending.remove(path).unwrap_or_default();
            if entry.depth() == 0 {
                let id = store.write_tree(&tree)?;
                debug!(id = %id.short_hex(), entries = tree.len(), "imported root tree");
                return Ok(id);
            }
            if tree.is_empty() {
                continue;
            }
            (EntryMode::Directory, store.write_tree(&tree)?)
        } else if file_type.is_symlink() {
            let target = fs::read_link(path)
                .with_context(|| format!("reading link {}", path.display()))?;
            let target = os_bytes(target.as_os_str())?;
            (EntryMode::Symlink, store.write_blob(&Blob::new(target))?)
        } else {
            let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let metadata = entry.metadata()?;
            (file_mode(&metadata), store.write_blob(&Blob::new(data))?)
        };

        let parent = path
            .parent()
            .with_context(|| format!("{} has no parent", path.display()))?;
        pending
            .entry(parent.to_path_buf())
            .or_default()
            .insert(os_bytes(entry.file_name())?, Entry::new(mode, id));
    }

    bail!("{} is not a directory", root.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_store::InMemoryObjectStore;

    fn names(tree: &Tree) -> Vec<String> {
        tree.names()
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect()
    }

    #[test]
    fn imports_nested_layout() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/bin")).unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        fs::create_dir_all(dir.path().join(".arbor/objects")).unwrap();
        fs::write(dir.path().join("README"), "hello\n").unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}\n").unwrap();
        fs::write(dir.path().join("src/bin/tool.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join(".arbor/objects/junk"), "x").unwrap();

        let store = InMemoryObjectStore::new();
        let root = import_dir(&store, dir.path()).unwrap();

        let tree = store.read_tree(&root).unwrap();
        assert_eq!(names(&tree), vec!["README", "src"]);

        let src = store.read_tree(&tree.get("src").unwrap().id).unwrap();
        assert_eq!(names(&src), vec!["bin", "lib.rs"]);
        assert_eq!(src.get("bin").unwrap().mode, EntryMode::Directory);

        let readme = store.read_blob(&tree.get("README").unwrap().id).unwrap();
        assert_eq!(readme.data, b"hello\n");
    }

    #[test]
    fn skipped_directories_keep_later_siblings() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git/refs")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref\n").unwrap();
        fs::create_dir_all(dir.path().join("lib/.arbor")).unwrap();
        fs::write(dir.path().join("lib/.arbor/x"), "x").unwrap();
        fs::write(dir.path().join("lib/z.rs"), "z\n").unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        fs::write(dir.path().join("zzz"), "last\n").unwrap();

        let store = InMemoryObjectStore::new();
        let tree = store.read_tree(&import_dir(&store, dir.path()).unwrap()).unwrap();
        assert_eq!(names(&tree), vec!["Cargo.toml", "lib", "zzz"]);

        let lib = store.read_tree(&tree.get("lib").unwrap().id).unwrap();
        assert_eq!(names(&lib), vec!["z.rs"]);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_file_names_are_imported() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let name = OsStr::from_bytes(b"caf\xe9.txt");
        fs::write(dir.path().join(name), "bytes\n").unwrap();

        let store = InMemoryObjectStore::new();
        let tree = store.read_tree(&import_dir(&store, dir.path()).unwrap()).unwrap();
        let entry = tree.get(b"caf\xe9.txt").unwrap();
        assert_eq!(store.read_blob(&entry.id).unwrap().data, b"bytes\n");
    }

    #[test]
    fn same_content_same_id() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        for dir in [&a, &b] {
            fs::write(dir.path().join("f"), "same\n").unwrap();
        }
        let store = InMemoryObjectStore::new();
        assert_eq!(
            import_dir(&store, a.path()).unwrap(),
            import_dir(&store, b.path()).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn keeps_executable_bit_and_symlinks() {
        use std::os::unix::fs::{symlink, PermissionsExt};

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        symlink("run.sh", dir.path().join("latest")).unwrap();

        let store = InMemoryObjectStore::new();
        let tree = store.read_tree(&import_dir(&store, dir.path()).unwrap()).unwrap();

        assert_eq!(tree.get("run.sh").unwrap().mode, EntryMode::Executable);
        let link = tree.get("latest").unwrap();
        assert_eq!(link.mode, EntryMode::Symlink);
        assert_eq!(store.read_blob(&link.id).unwrap().symlink_target(), "run.sh");
    }

    #[test]
    fn file_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, "x").unwrap();
        assert!(import_dir(&InMemoryObjectStore::new(), &file).is_err());
    }
}
