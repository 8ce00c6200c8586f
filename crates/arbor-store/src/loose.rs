//! On-disk store holding one compressed file per object.
//!
//! Layout: `<root>/objects/<first 2 hex chars>/<remaining 62 hex chars>`.
//! Each file is a `"<kind> <size>\n"` header followed by the zstd-compressed
//! object data.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use arbor_types::ObjectId;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

const COMPRESSION_LEVEL: i32 = 3;

/// Loose-object store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LooseObjectStore {
    root: PathBuf,
}

impl LooseObjectStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("objects"))?;
        Ok(Self { root })
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        let (dir, file) = hex.split_at(2);
        self.root.join("objects").join(dir).join(file)
    }

    fn encode(object: &StoredObject) -> StoreResult<Vec<u8>> {
        let mut out = format!("{} {}\n", object.kind, object.size).into_bytes();
        let compressed = zstd::encode_all(object.data.as_slice(), COMPRESSION_LEVEL)?;
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    fn decode(id: &ObjectId, raw: &[u8]) -> StoreResult<StoredObject> {
        let corrupt = |reason: String| StoreError::CorruptObject { id: *id, reason };

        let newline = raw
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| corrupt("missing header".into()))?;
        let header = std::str::from_utf8(&raw[..newline])
            .map_err(|_| corrupt("header is not UTF-8".into()))?;
        let (kind, size) = header
            .split_once(' ')
            .ok_or_else(|| corrupt(format!("malformed header: {header}")))?;
        let kind: ObjectKind = kind.parse()?;
        let size: u64 = size
            .parse()
            .map_err(|_| corrupt(format!("bad size in header: {size}")))?;

        let data = zstd::decode_all(&raw[newline + 1..])
            .map_err(|e| corrupt(format!("decompression failed: {e}")))?;
        if data.len() as u64 != size {
            return Err(corrupt(format!(
                "size mismatch: header says {size}, got {}",
                data.len()
            )));
        }

        let object = StoredObject::new(kind, data);
        let computed = object.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(object)
    }
}

impl ObjectStore for LooseObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let raw = match fs::read(self.object_path(id)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::decode(id, &raw).map(Some)
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }

        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Io(io::Error::other("object path has no parent")))?;
        fs::create_dir_all(dir)?;

        // Write beside the final location, then rename into place.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&Self::encode(object)?)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(id = %id.short_hex(), kind = %object.kind, size = object.size, "wrote loose object");
        Ok(id)
    }
}
