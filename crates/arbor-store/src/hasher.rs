use arbor_types::ObjectId;

use crate::object::ObjectKind;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"arbor-blob-v1"`) that is
/// prepended to every hash computation, so a blob and a tree with identical
/// bytes never share an id.
#[derive(Debug)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    pub const BLOB: Self = Self {
        domain: "arbor-blob-v1",
    };
    pub const TREE: Self = Self {
        domain: "arbor-tree-v1",
    };
    pub const COMMIT: Self = Self {
        domain: "arbor-commit-v1",
    };

    /// The hasher used for objects of `kind`.
    pub const fn for_kind(kind: ObjectKind) -> &'static Self {
        match kind {
            ObjectKind::Blob => &Self::BLOB,
            ObjectKind::Tree => &Self::TREE,
            ObjectKind::Commit => &Self::COMMIT,
        }
    }

    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected object ID.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
