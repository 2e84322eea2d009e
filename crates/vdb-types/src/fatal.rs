//! Abort path for structural invariant violations.
//!
//! Some failures are not recoverable errors: a root that does not decode as
//! a commit, a ref typed as something it is not, or a store created from a
//! factory that has already been shut down. These indicate a bug or a
//! corrupted store, so the operation aborts instead of returning an error.

use std::fmt::Display;

use tracing::error;

/// Log and abort on a violated structural invariant.
#[track_caller]
pub fn invariant_violation(message: impl Display) -> ! {
    let message = message.to_string();
    error!(%message, "invariant violation");
    panic!("invariant violation: {message}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "invariant violation: bad shape")]
    fn panics_with_message() {
        invariant_violation("bad shape");
    }
}
