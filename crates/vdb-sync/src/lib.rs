//! History replication between databases.
//!
//! [`pull`] copies every chunk reachable from a source commit that the sink
//! does not already hold, then moves the sink's root to that commit with a
//! single compare-and-swap. The sink never observes a partial pull: chunks
//! sit in its view's write buffer until the root moves.
//!
//! Two [`PullStrategy`]s decide what to skip. Both rely on the store rule
//! that a chunk is only ever written after everything it refers to, so a
//! chunk present in the sink implies its whole closure is present.

pub mod error;
pub mod pull;
pub mod types;

pub use error::{SyncError, SyncResult};
pub use pull::pull;
pub use types::{PullOptions, PullOutcome, PullReport, PullStrategy};
