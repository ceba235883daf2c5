//! Failure taxonomy of the reconstruction engine.
//!
//! Every variant is recovered locally: the public entry point never surfaces
//! an error, it leaves the output identical to the input (or partially
//! processed) and records what happened in the report.

use thiserror::Error;

/// Internally recovered failure classes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveryError {
    /// Scratch or segment-table allocation failed; the invocation is
    /// abandoned and the output stays untouched.
    #[error("failed to allocate {bytes} bytes for {what}")]
    AllocationFailure { what: &'static str, bytes: usize },

    /// Invalid runtime input (white balance, clip level, region) replaced by
    /// a safe fallback.
    #[error("degenerate input: {0}")]
    DegenerateInput(&'static str),

    /// The segment id budget ran out; overflow pixels use the local-average
    /// fallback instead.
    #[error("segment cap of {cap} reached")]
    SegmentCapReached { cap: usize },

    /// Nothing in the processed region exceeds the clip threshold.
    #[error("no clipped data in region")]
    NoClippedData,
}
