use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use arbor_types::{ObjectId, Signature};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// File contents or a symlink target.
    Blob,
    /// Directory listing mapping names to entries.
    Tree,
    /// Snapshot of a tree with parents and metadata.
    Commit,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(Self::Blob),
            "tree" => Ok(Self::Tree),
            "commit" => Ok(Self::Commit),
            other => Err(StoreError::Serialization(format!("unknown object kind: {other}"))),
        }
    }
}

/// A stored object: kind tag + serialized data + cached size.
///
/// `StoredObject` is the unit of storage. Stores never interpret the data;
/// they key it by the hash `compute_id` returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
    pub size: u64,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Content-addressed ID, domain-separated by kind.
    pub fn compute_id(&self) -> ObjectId {
        ContentHasher::for_kind(self.kind).hash(&self.data)
    }

    fn expect_kind(&self, id: &ObjectId, expected: ObjectKind) -> StoreResult<()> {
        if self.kind != expected {
            return Err(StoreError::WrongKind {
                id: *id,
                expected,
                actual: self.kind,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Raw content object. Holds file bytes, or the target path of a symlink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.data.clone())
    }

    pub fn from_stored_object(id: &ObjectId, obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(id, ObjectKind::Blob)?;
        Ok(Self {
            data: obj.data.clone(),
        })
    }

    /// The blob read as a symlink target, lossily decoded for display.
    pub fn symlink_target(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// Kind of item a tree entry names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    /// Normal file (0o100644).
    Regular,
    /// Executable file (0o100755).
    Executable,
    /// Symbolic link (0o120000).
    Symlink,
    /// Subtree / directory (0o040000).
    Directory,
    /// Commit of an embedded repository (0o160000).
    Gitlink,
}

impl EntryMode {
    pub fn mode_bits(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Directory => 0o040000,
            Self::Gitlink => 0o160000,
        }
    }

    /// `true` for regular and executable files.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::Regular | Self::Executable)
    }

    /// Human-readable kind, used when presenting type conflicts.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Regular => "regular file",
            Self::Executable => "executable file",
            Self::Symlink => "symlink",
            Self::Directory => "directory",
            Self::Gitlink => "submodule",
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.mode_bits())
    }
}

/// One named item in a tree: what it is and which object holds it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub mode: EntryMode,
    pub id: ObjectId,
}

impl Entry {
    pub fn new(mode: EntryMode, id: ObjectId) -> Self {
        Self { mode, id }
    }
}

/// Directory listing object.
///
/// Names are raw bytes, as the filesystem hands them out. Entries are keyed
/// in a `BTreeMap`, which keeps serialization (and therefore the tree's id)
/// independent of insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    #[serde(with = "entry_list")]
    pub entries: BTreeMap<Vec<u8>, Entry>,
}

/// Trees serialize as a sorted list of `[name, entry]` pairs, since JSON
/// object keys cannot hold arbitrary bytes.
mod entry_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::Entry;

    pub fn serialize<S: Serializer>(
        entries: &BTreeMap<Vec<u8>, Entry>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(entries)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Vec<u8>, Entry>, D::Error> {
        let list = Vec::<(Vec<u8>, Entry)>::deserialize(deserializer)?;
        let len = list.len();
        let entries: BTreeMap<_, _> = list.into_iter().collect();
        if entries.len() != len {
            return Err(serde::de::Error::custom("duplicate tree entry name"));
        }
        Ok(entries)
    }
}

impl Tree {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data = serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Tree, data))
    }

    pub fn from_stored_object(id: &ObjectId, obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(id, ObjectKind::Tree)?;
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::CorruptObject {
            id: *id,
            reason: e.to_string(),
        })
    }

    pub fn get(&self, name: impl AsRef<[u8]>) -> Option<&Entry> {
        self.entries.get(name.as_ref())
    }

    pub fn insert(&mut self, name: impl Into<Vec<u8>>, entry: Entry) -> Option<Entry> {
        self.entries.insert(name.into(), entry)
    }

    pub fn names(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.keys().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<Vec<u8>>> FromIterator<(N, Entry)> for Tree {
    fn from_iter<I: IntoIterator<Item = (N, Entry)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, entry)| (name.into(), entry))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// A snapshot: root tree, parent commits, and who made it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub message: String,
    pub author: Signature,
    pub committer: Signature,
}

impl Commit {
    /// The first parent, if this is not a root commit.
    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data = serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Commit, data))
    }

    pub fn from_stored_object(id: &ObjectId, obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(id, ObjectKind::Commit)?;
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::CorruptObject {
            id: *id,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig() -> Signature {
        Signature::new("Ada", "ada@example.com", 1_700_000_000, 0)
    }

    #[test]
    fn blob_roundtrip() {
        let blob = Blob::new(b"hello world".to_vec());
        let stored = blob.to_stored_object();
        let id = stored.compute_id();
        assert_eq!(Blob::from_stored_object(&id, &stored).unwrap(), blob);
    }

    #[test]
    fn blob_kind_mismatch() {
        let stored = StoredObject::new(ObjectKind::Tree, b"{}".to_vec());
        let err = Blob::from_stored_object(&stored.compute_id(), &stored).unwrap_err();
        assert!(matches!(
            err,
            StoreError::WrongKind {
                expected: ObjectKind::Blob,
                actual: ObjectKind::Tree,
                ..
            }
        ));
    }

    #[test]
    fn tree_id_ignores_insertion_order() {
        let a = Entry::new(EntryMode::Regular, ObjectId::from_bytes(b"a"));
        let b = Entry::new(EntryMode::Directory, ObjectId::from_bytes(b"b"));

        let mut first = Tree::empty();
        first.insert("zebra", a);
        first.insert("alpha", b);
        let mut second = Tree::empty();
        second.insert("alpha", b);
        second.insert("zebra", a);

        assert_eq!(
            first.to_stored_object().unwrap().compute_id(),
            second.to_stored_object().unwrap().compute_id()
        );
        assert_eq!(first.names().collect::<Vec<_>>(), vec![&b"alpha"[..], b"zebra"]);
    }

    #[test]
    fn tree_roundtrip() {
        let tree: Tree = [
            (
                "file.txt".to_string(),
                Entry::new(EntryMode::Regular, ObjectId::from_bytes(b"content")),
            ),
            (
                "sub".to_string(),
                Entry::new(EntryMode::Directory, ObjectId::from_bytes(b"tree")),
            ),
        ]
        .into_iter()
        .collect();
        let stored = tree.to_stored_object().unwrap();
        let decoded = Tree::from_stored_object(&stored.compute_id(), &stored).unwrap();
        assert_eq!(decoded, tree);
        assert_eq!(decoded.len(), 2);
        assert!(decoded.get("missing").is_none());
    }

    #[test]
    fn tree_names_are_arbitrary_bytes() {
        let mut tree = Tree::empty();
        tree.insert(&b"caf\xe9.txt"[..], Entry::new(EntryMode::Regular, ObjectId::from_bytes(b"x")));
        tree.insert("plain", Entry::new(EntryMode::Regular, ObjectId::from_bytes(b"y")));

        let stored = tree.to_stored_object().unwrap();
        let decoded = Tree::from_stored_object(&stored.compute_id(), &stored).unwrap();
        assert_eq!(decoded, tree);
        assert!(decoded.get(b"caf\xe9.txt").is_some());
        assert!(decoded.get("caf\u{e9}.txt").is_none());
    }

    #[test]
    fn duplicate_tree_names_are_corrupt() {
        let entry = serde_json::to_string(&Entry::new(EntryMode::Regular, ObjectId::from_bytes(b"x"))).unwrap();
        let data = format!(r#"{{"entries":[[[97],{entry}],[[97],{entry}]]}}"#);
        let stored = StoredObject::new(ObjectKind::Tree, data.into_bytes());
        let err = Tree::from_stored_object(&stored.compute_id(), &stored).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn corrupt_tree_is_reported() {
        let stored = StoredObject::new(ObjectKind::Tree, b"not json".to_vec());
        let err = Tree::from_stored_object(&stored.compute_id(), &stored).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn commit_roundtrip_and_parent() {
        let commit = Commit {
            tree: ObjectId::from_bytes(b"tree"),
            parents: vec![ObjectId::from_bytes(b"p1"), ObjectId::from_bytes(b"p2")],
            message: "Fix the thing\n\nLonger body.".into(),
            author: sig(),
            committer: sig(),
        };
        let stored = commit.to_stored_object().unwrap();
        let decoded = Commit::from_stored_object(&stored.compute_id(), &stored).unwrap();
        assert_eq!(decoded, commit);
        assert_eq!(decoded.parent(), Some(&ObjectId::from_bytes(b"p1")));
        assert_eq!(decoded.summary(), "Fix the thing");
    }

    #[test]
    fn root_commit_has_no_parent() {
        let commit = Commit {
            tree: ObjectId::from_bytes(b"tree"),
            parents: vec![],
            message: String::new(),
            author: sig(),
            committer: sig(),
        };
        assert!(commit.parent().is_none());
        assert_eq!(commit.summary(), "");
    }

    #[test]
    fn only_regular_and_executable_are_files() {
        assert!(EntryMode::Regular.is_file());
        assert!(EntryMode::Executable.is_file());
        assert!(!EntryMode::Symlink.is_file());
        assert!(!EntryMode::Directory.is_file());
        assert!(!EntryMode::Gitlink.is_file());
    }

    #[test]
    fn mode_display_is_octal() {
        assert_eq!(EntryMode::Directory.to_string(), "040000");
        assert_eq!(EntryMode::Executable.to_string(), "100755");
    }

    #[test]
    fn object_kind_parse() {
        assert_eq!("commit".parse::<ObjectKind>().unwrap(), ObjectKind::Commit);
        assert!("pack".parse::<ObjectKind>().is_err());
    }
}
