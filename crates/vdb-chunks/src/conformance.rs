//! Behavioral checks every [`ChunkStore`] backend must pass.
//!
//! Each check takes a [`StoreFactory`], creates the views it needs and
//! panics on the first violated expectation, so backends call these from
//! their own `#[test]` functions (or all of them at once via [`run_all`]).
//! Every check uses a namespace of its own.

use vdb_types::{Hash, HashSet};

use crate::chunk::Chunk;
use crate::traits::{ChunkStore, StoreFactory};
use crate::FORMAT_VERSION;

/// Assert that `store` returns `input` for `hash`.
pub fn assert_input_in_store(input: &str, hash: &Hash, store: &dyn ChunkStore) {
    let chunk = store.get(hash).expect("get should not fail");
    assert!(!chunk.is_empty(), "shouldn't get empty chunk for {hash}");
    assert_eq!(chunk.data().as_ref(), input.as_bytes());
}

/// Assert that `store` has nothing for `hash`.
pub fn assert_input_not_in_store(hash: &Hash, store: &dyn ChunkStore) {
    let chunk = store.get(hash).expect("get should not fail");
    assert!(chunk.is_empty(), "shouldn't get non-empty chunk for {hash}: {chunk:?}");
}

/// A put is readable from the same view before any commit.
pub fn put_is_readable(factory: &dyn StoreFactory) {
    let store = factory.create_store("conformance-put");
    let input = "abc";
    let chunk = Chunk::new(input.as_bytes().to_vec());
    store.put(chunk.clone()).expect("put");
    assert_input_in_store(input, &chunk.hash(), store.as_ref());
    assert!(store.has(&chunk.hash()).expect("has"));
}

/// Commit succeeds only against the current durable root.
pub fn root_compare_and_swap(factory: &dyn StoreFactory) {
    let store = factory.create_store("conformance-root");
    let old_root = store.root();
    assert!(old_root.is_empty(), "fresh store must have an empty root");

    let bogus_root = Hash::of(b"bogus root");
    let new_root = Hash::of(b"new root");

    assert!(!store.commit(&new_root, &bogus_root).expect("commit"));
    assert_eq!(store.root(), old_root);

    assert!(store.commit(&new_root, &old_root).expect("commit"));
    assert_eq!(store.root(), new_root);

    // The old root is now stale.
    assert!(!store.commit(&Hash::of(b"newer"), &old_root).expect("commit"));
    let fresh = factory.create_store("conformance-root");
    assert_eq!(fresh.root(), new_root);
}

/// Puts stay private to their view until a commit persists them.
pub fn commit_persists_puts(factory: &dyn StoreFactory) {
    let name = "conformance-commit-put";
    let store = factory.create_store(name);
    let input = "abc";
    let chunk = Chunk::new(input.as_bytes().to_vec());
    store.put(chunk.clone()).expect("put");

    assert_input_in_store(input, &chunk.hash(), store.as_ref());
    assert_input_not_in_store(&chunk.hash(), factory.create_store(name).as_ref());

    assert!(store
        .commit(&chunk.hash(), &store.root())
        .expect("commit"));
    assert_input_in_store(input, &chunk.hash(), store.as_ref());
    assert_input_in_store(input, &chunk.hash(), factory.create_store(name).as_ref());
}

/// Unknown and empty hashes are plain misses.
pub fn get_missing_is_empty(factory: &dyn StoreFactory) {
    let store = factory.create_store("conformance-missing");
    let hash = Hash::of(b"never written");
    assert_input_not_in_store(&hash, store.as_ref());
    assert!(!store.has(&hash).expect("has"));
    assert_input_not_in_store(&Hash::empty(), store.as_ref());
    assert!(!store.has(&Hash::empty()).expect("has"));
}

/// Stores report the expected format version after a commit.
pub fn reports_format_version(factory: &dyn StoreFactory) {
    let store = factory.create_store("conformance-version");
    let old_root = store.root();
    assert!(old_root.is_empty());
    assert!(store
        .commit(&Hash::of(b"version root"), &old_root)
        .expect("commit"));
    assert_eq!(store.version(), FORMAT_VERSION);
}

/// Committing an unchanged root still flushes puts; rebase reveals them.
pub fn commit_unchanged_root_then_rebase(factory: &dyn StoreFactory) {
    let name = "conformance-unchanged-root";
    let store1 = factory.create_store(name);
    let store2 = factory.create_store(name);
    let input = "abc";
    let chunk = Chunk::new(input.as_bytes().to_vec());
    store1.put(chunk.clone()).expect("put");

    assert_input_in_store(input, &chunk.hash(), store1.as_ref());
    assert_input_not_in_store(&chunk.hash(), store2.as_ref());

    assert!(store1
        .commit(&store1.root(), &store1.root())
        .expect("commit"));
    store2.rebase().expect("rebase");
    assert_input_in_store(input, &chunk.hash(), store2.as_ref());
}

/// A committed root becomes visible to another view after rebase.
pub fn rebase_observes_commit(factory: &dyn StoreFactory) {
    let name = "conformance-rebase";
    let a = factory.create_store(name);
    let b = factory.create_store(name);

    let chunk = Chunk::new(b"rebase me".to_vec());
    a.put(chunk.clone()).expect("put");
    assert!(a.commit(&chunk.hash(), &a.root()).expect("commit"));

    assert!(b.root().is_empty());
    b.rebase().expect("rebase");
    assert_eq!(b.root(), chunk.hash());
    assert_input_in_store("rebase me", &chunk.hash(), b.as_ref());
}

/// Batched reads deliver found chunks and skip misses.
pub fn get_many_skips_misses(factory: &dyn StoreFactory) {
    let store = factory.create_store("conformance-get-many");
    let present: Vec<Chunk> = ["one", "two", "three"]
        .iter()
        .map(|s| Chunk::new(s.as_bytes().to_vec()))
        .collect();
    for chunk in &present {
        store.put(chunk.clone()).expect("put");
    }

    let mut wanted: HashSet = present.iter().map(Chunk::hash).collect();
    wanted.insert(Hash::of(b"absent"));

    let (tx, rx) = crossbeam_channel::unbounded();
    store.get_many(&wanted, &tx).expect("get_many");
    drop(tx);
    let delivered: HashSet = rx.into_iter().map(|c| c.hash()).collect();
    let expected: HashSet = present.iter().map(Chunk::hash).collect();
    assert_eq!(delivered, expected);
}

/// Batched existence checks return exactly the absent subset.
pub fn has_many_returns_absent(factory: &dyn StoreFactory) {
    let store = factory.create_store("conformance-has-many");
    let present = Chunk::new(b"present".to_vec());
    store.put(present.clone()).expect("put");
    let missing = Hash::of(b"missing");

    let wanted: HashSet = [present.hash(), missing].into_iter().collect();
    let absent = store.has_many(&wanted).expect("has_many");
    assert_eq!(absent, [missing].into_iter().collect::<HashSet>());

    assert!(store.has_many(&HashSet::new()).expect("has_many").is_empty());
}

/// Run every check against `factory`.
pub fn run_all(factory: &dyn StoreFactory) {
    put_is_readable(factory);
    root_compare_and_swap(factory);
    commit_persists_puts(factory);
    get_missing_is_empty(factory);
    reports_format_version(factory);
    commit_unchanged_root_then_rebase(factory);
    rebase_observes_commit(factory);
    get_many_skips_misses(factory);
    has_many_returns_absent(factory);
}
