use std::sync::Arc;

use tracing::debug;
use vdb_chunks::{ChunkStore, FORMAT_VERSION};
use vdb_types::{invariant_violation, Hash, HashSet};

use crate::codec::{decode_value, encode_value};
use crate::commit::Commit;
use crate::error::{DatasError, DatasResult};
use crate::value::{Ref, TypeDesc, Value};

/// Typed access to a chunk store.
///
/// Cloning a `Database` shares the underlying store view (and therefore its
/// write buffer).
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn ChunkStore>,
}

impl Database {
    /// Wrap a store, refusing stores written in another format.
    pub fn new(store: Arc<dyn ChunkStore>) -> DatasResult<Self> {
        let found = store.version();
        if found != FORMAT_VERSION {
            return Err(DatasError::IncompatibleVersion {
                expected: FORMAT_VERSION.to_string(),
                found: found.to_string(),
            });
        }
        Ok(Self { store })
    }

    /// The underlying chunk store, for bulk chunk transfer.
    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// The root the store view last observed.
    pub fn root(&self) -> Hash {
        self.store.root()
    }

    pub fn rebase(&self) -> DatasResult<()> {
        Ok(self.store.rebase()?)
    }

    /// Compare-and-swap the store root. `Ok(false)` means the root moved.
    pub fn commit_root(&self, new_root: &Hash, old_root: &Hash) -> DatasResult<bool> {
        Ok(self.store.commit(new_root, old_root)?)
    }

    /// Read and decode the value stored under `hash`.
    pub fn read_value(&self, hash: &Hash) -> DatasResult<Option<Value>> {
        let chunk = self.store.get(hash)?;
        if chunk.is_empty() {
            return Ok(None);
        }
        decode_value(&chunk).map(Some)
    }

    /// Encode `value`, buffer it in the store and return a ref to it.
    ///
    /// Every ref inside `value` must already resolve in this store (durable
    /// or buffered), so no chunk is ever written ahead of its children.
    pub fn write_value(&self, value: &Value) -> DatasResult<Ref> {
        let children: HashSet = value.child_refs().into_iter().map(|r| r.target).collect();
        let absent = self.store.has_many(&children)?;
        if let Some(missing) = absent.into_iter().min() {
            return Err(DatasError::DanglingRef(missing));
        }

        let chunk = encode_value(value)?;
        let hash = chunk.hash();
        self.store.put(chunk)?;
        debug!(hash = %hash.short_hex(), kind = %value.type_desc(), "value written");
        Ok(Ref::to_value(value, hash))
    }

    /// Resolve a ref that must point at a commit.
    ///
    /// A ref typed as anything else, or pointing at a value that is not a
    /// commit, or at nothing at all, is a corrupted history and aborts.
    pub fn validate_ref_as_commit(&self, r: &Ref) -> DatasResult<Commit> {
        if r.target_type != TypeDesc::commit() {
            invariant_violation(format!(
                "ref {} has type {}, expected {}",
                r.target,
                r.target_type,
                TypeDesc::commit()
            ));
        }
        let Some(value) = self.read_value(&r.target)? else {
            invariant_violation(format!("commit ref {} does not resolve", r.target));
        };
        match Commit::from_value(&value) {
            Ok(commit) => Ok(commit),
            Err(e) => invariant_violation(format!("value at {} is {e}", r.target)),
        }
    }

    /// Read the commit stored under `hash`, if any. A value that exists but
    /// is not a commit aborts.
    pub fn read_commit(&self, hash: &Hash) -> DatasResult<Option<Commit>> {
        if hash.is_empty() {
            return Ok(None);
        }
        match self.read_value(hash)? {
            None => Ok(None),
            Some(value) => match Commit::from_value(&value) {
                Ok(commit) => Ok(Some(commit)),
                Err(e) => invariant_violation(format!("value at {hash} is {e}")),
            },
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("root", &self.root())
            .field("version", &self.store.version())
            .finish()
    }
}
