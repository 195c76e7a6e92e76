use displaydoc::Display;
use thiserror::Error;

/// Errors that may be raised while creating a [`DedupEngine`](crate::engine::DedupEngine)
///
/// Every other operation on an already-created engine is infallible by design: the engine
/// is meant to run unattended over tens of millions of reads, so a bad record degrades the
/// statistics rather than aborting the run (see [`DedupStats`](crate::engine::DedupStats)).
#[derive(Debug, Error, Display, PartialEq)]
#[non_exhaustive]
pub enum DedupError {
    /// Invalid engine parameters: {reason}
    InvalidParams {
        /// Human-readable explanation of which parameter failed validation
        reason: String,
    },
    /// Arena or table allocation failed while creating the engine ({requested} bytes requested)
    OutOfMemory {
        /// Number of bytes the failed allocation attempted to reserve
        requested: usize,
    },
}
