//! Naming and opening databases.
//!
//! A database is named by a spec string `<protocol>:<location>`, for
//! example `mem:scratch`. The bare spec `mem` names a fresh ephemeral
//! store. A [`ProtocolRegistry`] maps each protocol to a constructor that
//! builds a [`ChunkStore`](vdb_chunks::ChunkStore) from a spec and that
//! protocol's configuration table.

pub mod error;
pub mod registry;
pub mod spec;

pub use error::{SpecError, SpecResult};
pub use registry::{ProtocolRegistry, StoreConstructor, MEM_PROTOCOL};
pub use spec::{validate_protocol, DatabaseSpec};
