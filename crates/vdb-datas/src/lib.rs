//! Commit history, datasets, and the database layer.
//!
//! A [`Database`] reads and writes [`Value`]s as chunks of a
//! [`ChunkStore`](vdb_chunks::ChunkStore). A store's root names a
//! [`Commit`]: a value plus the set of parent commits it descends from. A
//! [`Dataset`] is a named handle that resolves its head from that root and
//! advances it through compare-and-swap.
//!
//! # Modules
//!
//! - [`value`]: the value graph walked by sync: containers, structs, [`Ref`]s
//! - [`codec`]: value ⇄ chunk encoding
//! - [`commit`]: the [`Commit`] shape and its validation
//! - [`database`]: [`Database`] over a chunk store
//! - [`dataset`]: [`Dataset`] head resolution and commits
//! - [`error`]: [`DatasError`]

pub mod codec;
pub mod commit;
pub mod database;
pub mod dataset;
pub mod error;
pub mod value;

pub use codec::{decode_value, encode_value};
pub use commit::{Commit, COMMIT_STRUCT_NAME};
pub use database::Database;
pub use dataset::{validate_dataset_id, Dataset};
pub use error::{DatasError, DatasResult};
pub use value::{Ref, Struct, TypeDesc, Value};
