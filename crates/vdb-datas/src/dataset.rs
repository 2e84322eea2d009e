//! Named handles onto a store's commit history.
//!
//! Dataset ids follow a narrow alphabet so they can be embedded in paths
//! and database spec strings:
//! - Must be non-empty
//! - Only ASCII letters, digits, `_`, `/` and `-`

use tracing::{debug, warn};
use vdb_types::Hash;

use crate::commit::Commit;
use crate::database::Database;
use crate::error::{DatasError, DatasResult};
use crate::value::{Ref, TypeDesc, Value};

/// Validate a dataset id, returning `Ok(())` if valid.
///
/// ```
/// use vdb_datas::validate_dataset_id;
///
/// assert!(validate_dataset_id("main").is_ok());
/// assert!(validate_dataset_id("team/raw-data_2").is_ok());
/// assert!(validate_dataset_id("").is_err());
/// assert!(validate_dataset_id("has space").is_err());
/// ```
pub fn validate_dataset_id(id: &str) -> DatasResult<()> {
    if id.is_empty() {
        return Err(DatasError::InvalidDatasetId {
            id: id.to_string(),
            reason: "dataset id must not be empty".into(),
        });
    }
    if let Some(ch) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '-')))
    {
        return Err(DatasError::InvalidDatasetId {
            id: id.to_string(),
            reason: format!("contains forbidden character: {ch:?}"),
        });
    }
    Ok(())
}

fn head_ref_at(root: Hash) -> Option<Ref> {
    if root.is_empty() {
        None
    } else {
        Some(Ref::new(root, TypeDesc::commit()))
    }
}

/// A named view of the history rooted at a database's root.
///
/// The head is not cached: every read resolves it from the root the
/// database's store view currently observes.
#[derive(Clone, Debug)]
pub struct Dataset {
    id: String,
    db: Database,
}

impl Dataset {
    pub fn new(db: Database, id: impl Into<String>) -> DatasResult<Self> {
        let id = id.into();
        validate_dataset_id(&id)?;
        Ok(Self { id, db })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Ref to the head commit, or `None` while the root is uninitialized.
    pub fn head_ref(&self) -> Option<Ref> {
        head_ref_at(self.db.root())
    }

    /// The head commit, if any. A root that is not a commit aborts.
    pub fn maybe_head(&self) -> DatasResult<Option<Commit>> {
        match self.head_ref() {
            None => Ok(None),
            Some(r) => self.db.validate_ref_as_commit(&r).map(Some),
        }
    }

    /// The head commit; [`DatasError::EmptyDataset`] if there is none.
    pub fn head(&self) -> DatasResult<Commit> {
        self.maybe_head()?
            .ok_or_else(|| DatasError::EmptyDataset(self.id.clone()))
    }

    /// The value held by the head commit.
    pub fn head_value(&self) -> DatasResult<Value> {
        Ok(self.head()?.value().clone())
    }

    /// Commit `value` on top of the current head.
    pub fn commit(&self, value: Value) -> DatasResult<Dataset> {
        let old_root = self.db.root();
        let parents: Vec<Ref> = head_ref_at(old_root).into_iter().collect();
        for parent in &parents {
            self.db.validate_ref_as_commit(parent)?;
        }
        self.commit_onto(value, parents, old_root)
    }

    /// Commit `value` with an explicit parent set.
    ///
    /// Every parent must resolve to a commit. The root moves from the one
    /// this view observes; if another writer moved it first the commit is
    /// rejected with [`DatasError::ConcurrentModification`] and the caller
    /// rebases and retries.
    pub fn commit_with_parents(&self, value: Value, parents: Vec<Ref>) -> DatasResult<Dataset> {
        for parent in &parents {
            self.db.validate_ref_as_commit(parent)?;
        }
        let old_root = self.db.root();
        self.commit_onto(value, parents, old_root)
    }

    /// Write the commit and swap it in for `old_root`, the single root
    /// observation the parents were chosen against.
    fn commit_onto(&self, value: Value, parents: Vec<Ref>, old_root: Hash) -> DatasResult<Dataset> {
        let commit = Commit::new(value, parents);
        let new_ref = self.db.write_value(&commit.to_value())?;

        if !self.db.commit_root(&new_ref.target, &old_root)? {
            warn!(dataset = %self.id, expected = %old_root.short_hex(), "dataset head moved");
            return Err(DatasError::ConcurrentModification {
                dataset: self.id.clone(),
                expected: old_root,
            });
        }
        debug!(
            dataset = %self.id,
            head = %new_ref.target.short_hex(),
            parents = commit.parents().len(),
            "dataset committed"
        );
        Ok(self.clone())
    }

    /// Hash of the head commit, or the empty hash.
    pub fn head_hash(&self) -> Hash {
        self.db.root()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::codec::encode_value;
    use vdb_chunks::{Chunk, ChunkResult, ChunkStore, MemoryStorage, MemoryStoreView};

    fn dataset_on(storage: &MemoryStorage) -> Dataset {
        let db = Database::new(Arc::new(storage.new_view())).unwrap();
        Dataset::new(db, "main").unwrap()
    }

    /// View whose first root read returns `stale` instead of the root it
    /// holds.
    struct StaleFirstRoot {
        inner: MemoryStoreView,
        stale: Hash,
        served: AtomicBool,
    }

    impl ChunkStore for StaleFirstRoot {
        fn get(&self, hash: &Hash) -> ChunkResult<Chunk> {
            self.inner.get(hash)
        }
        fn put(&self, chunk: Chunk) -> ChunkResult<()> {
            self.inner.put(chunk)
        }
        fn root(&self) -> Hash {
            if self.served.swap(true, Ordering::SeqCst) {
                self.inner.root()
            } else {
                self.stale
            }
        }
        fn commit(&self, new_root: &Hash, old_root: &Hash) -> ChunkResult<bool> {
            self.inner.commit(new_root, old_root)
        }
        fn rebase(&self) -> ChunkResult<()> {
            self.inner.rebase()
        }
        fn version(&self) -> &str {
            self.inner.version()
        }
    }

    // -----------------------------------------------------------------------
    // Id validation
    // -----------------------------------------------------------------------

    #[test]
    fn valid_ids() {
        for id in ["main", "a/b/c", "x_1-y", "ABC"] {
            assert!(validate_dataset_id(id).is_ok(), "{id}");
        }
    }

    #[test]
    fn invalid_ids() {
        for id in ["", "a b", "dots.", "tab\t", "colon:x"] {
            let err = validate_dataset_id(id).unwrap_err();
            assert!(matches!(err, DatasError::InvalidDatasetId { .. }), "{id}");
        }
    }

    #[test]
    fn new_rejects_invalid_id() {
        let db = Database::new(Arc::new(MemoryStorage::new().new_view())).unwrap();
        assert!(Dataset::new(db, "no spaces").is_err());
    }

    // -----------------------------------------------------------------------
    // Head resolution
    // -----------------------------------------------------------------------

    #[test]
    fn fresh_dataset_has_no_head() {
        let ds = dataset_on(&MemoryStorage::new());
        assert!(ds.head_ref().is_none());
        assert!(ds.maybe_head().unwrap().is_none());
        assert!(matches!(ds.head(), Err(DatasError::EmptyDataset(ref id)) if id == "main"));
        assert!(ds.head_hash().is_empty());
    }

    #[test]
    #[should_panic(expected = "not a commit")]
    fn root_that_is_not_a_commit_aborts() {
        let storage = MemoryStorage::new();
        let view = storage.new_view();
        let chunk = encode_value(&Value::from(true)).unwrap();
        let hash = chunk.hash();
        view.put(chunk).unwrap();
        assert!(view.commit(&hash, &Hash::empty()).unwrap());

        let ds = dataset_on(&storage);
        let _ = ds.head();
    }

    // -----------------------------------------------------------------------
    // Commits
    // -----------------------------------------------------------------------

    #[test]
    fn commits_chain_through_parents() {
        let storage = MemoryStorage::new();
        let ds = dataset_on(&storage);

        let ds = ds.commit(Value::from(1.0)).unwrap();
        let first = ds.head_ref().unwrap();
        assert!(ds.head().unwrap().is_root());

        let ds = ds.commit(Value::from(2.0)).unwrap();
        let head = ds.head().unwrap();
        assert_eq!(head.value(), &Value::from(2.0));
        assert_eq!(head.parents(), &[first]);
        assert_eq!(ds.head_value().unwrap(), Value::from(2.0));
        assert_eq!(storage.root(), ds.head_hash());
    }

    #[test]
    fn commit_is_visible_to_new_views() {
        let storage = MemoryStorage::new();
        dataset_on(&storage).commit(Value::from("shared")).unwrap();
        assert_eq!(dataset_on(&storage).head_value().unwrap(), Value::from("shared"));
    }

    #[test]
    fn concurrent_commit_is_rejected() {
        let storage = MemoryStorage::new();
        let a = dataset_on(&storage);
        let b = dataset_on(&storage);

        a.commit(Value::from("a")).unwrap();
        let err = b.commit(Value::from("b")).unwrap_err();
        assert!(matches!(
            err,
            DatasError::ConcurrentModification { ref dataset, expected }
                if dataset == "main" && expected.is_empty()
        ));

        b.database().rebase().unwrap();
        let b = b.commit(Value::from("b")).unwrap();
        let head = b.head().unwrap();
        assert_eq!(head.value(), &Value::from("b"));
        assert_eq!(head.parents().len(), 1);
    }

    #[test]
    fn commit_swaps_against_the_root_its_parent_came_from() {
        let storage = MemoryStorage::new();
        let first = dataset_on(&storage).commit(Value::from(1.0)).unwrap().head_hash();
        let second = dataset_on(&storage).commit(Value::from(2.0)).unwrap().head_hash();

        let store = StaleFirstRoot {
            inner: storage.new_view(),
            stale: first,
            served: AtomicBool::new(false),
        };
        let ds = Dataset::new(Database::new(Arc::new(store)).unwrap(), "main").unwrap();
        let err = ds.commit(Value::from(3.0)).unwrap_err();
        assert!(matches!(
            err,
            DatasError::ConcurrentModification { expected, .. } if expected == first
        ));
        assert_eq!(storage.root(), second);
    }

    #[test]
    fn commit_with_explicit_parents_merges() {
        let storage = MemoryStorage::new();
        let ds = dataset_on(&storage);
        let ds = ds.commit(Value::from(1.0)).unwrap();
        let left = ds.head_ref().unwrap();
        let ds = ds.commit(Value::from(2.0)).unwrap();
        let right = ds.head_ref().unwrap();

        let ds = ds
            .commit_with_parents(Value::from(3.0), vec![left.clone(), right.clone()])
            .unwrap();
        let head = ds.head().unwrap();
        assert_eq!(head.parents().len(), 2);
        assert!(head.parent_hashes().contains(&left.target));
        assert!(head.parent_hashes().contains(&right.target));
    }

    #[test]
    #[should_panic(expected = "expected Struct<Commit>")]
    fn commit_with_non_commit_parent_aborts() {
        let ds = dataset_on(&MemoryStorage::new());
        let list = ds.database().write_value(&Value::list([])).unwrap();
        let _ = ds.commit_with_parents(Value::from(1.0), vec![list]);
    }
}
