//! Content-addressed object model and storage for arbor.
//!
//! Blobs, trees, and commits are immutable objects identified by the BLAKE3
//! hash of their contents (domain-separated by object kind). Equal ids mean
//! equal objects, which is what lets merges skip untouched subtrees.
//!
//! # Object Types
//!
//! - [`Blob`] -- file contents or a symlink target
//! - [`Tree`] -- mapping from names to [`Entry`] values (mode + id)
//! - [`Commit`] -- root tree, parents, message, author and committer
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`LooseObjectStore`] -- one zstd-compressed file per object on disk

pub mod error;
pub mod hasher;
pub mod loose;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use hasher::ContentHasher;
pub use loose::LooseObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{Blob, Commit, Entry, EntryMode, ObjectKind, StoredObject, Tree};
pub use traits::ObjectStore;
