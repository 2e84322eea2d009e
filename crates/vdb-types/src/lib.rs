//! Foundation types for the versioned database.
//!
//! Every other `vdb` crate depends on `vdb-types`. It owns the content
//! digest used to name chunks and roots, and the helper used to abort on
//! structural invariant violations.
//!
//! # Key Types
//!
//! - [`Hash`]: Content-addressed chunk identifier (BLAKE3 digest)
//! - [`HashSet`]: Unordered set of hashes, the unit of batched queries
//! - [`TypeError`]: Parse failures for textual hashes

pub mod error;
pub mod fatal;
pub mod hash;

pub use error::TypeError;
pub use fatal::invariant_violation;
pub use hash::{Hash, HashSet, HASH_LEN};
