//! Helios - segmentation-guided highlight reconstruction for raw mosaics.
//!
//! When a sensor clips, the affected photosites lose true color and render
//! as flat magenta or white blotches. This crate rebuilds plausible values
//! for clipped pixels from their unclipped neighborhood:
//!
//! - per-channel planes are extracted from the mosaic and companded,
//! - clipped regions are segmented per color plane,
//! - each segment picks its best unclipped reference candidate,
//! - partially clipped pixels are rebuilt from the local chroma reference
//!   plus the candidate's chrominance offset,
//! - fully clipped regions are inpainted by propagating border gradients
//!   inward along an exact Euclidean distance field.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use helios::{Buffer2, CfaPattern, RecoveryConfig, RecoveryParams, reconstruct};
//!
//! let input: Buffer2<f32> = load_mosaic();
//! let mut output = input.clone();
//!
//! let mut params = RecoveryParams::new(CfaPattern::default(), [2.1, 1.0, 1.6]);
//! params.config = RecoveryConfig::balanced();
//!
//! let report = reconstruct(&input, &mut output, &params, None);
//! println!("max correction: {}", report.max_correction);
//! ```
//!
//! The engine is a pure function over explicit buffers: no global state, no
//! I/O, no panics across the API boundary for degenerate runtime inputs.

mod candidates;
pub mod cfa;
pub mod config;
mod constants;
mod error;
mod inpaint;
mod math;
mod planes;
pub mod recovery;
mod region;
mod segmentation;
mod synthesis;

#[cfg(test)]
pub(crate) mod testing;

pub use cfa::{BayerPattern, CfaColor, CfaPattern, XTRANS_STANDARD};
pub use common::Buffer2;
pub use config::{RecoveryConfig, RecoveryMode};
pub use error::RecoveryError;
pub use recovery::{
    RecoveryParams, RecoveryReport, RecoveryStatus, VisualizeMode, reconstruct,
};
pub use region::Region;

/// Benchmark entry points for internal stages.
#[cfg(feature = "bench")]
pub mod bench {
    use common::Buffer2;

    /// Wrapper around the exact Euclidean distance transform.
    pub fn distance_transform(field: &mut Buffer2<f32>) -> f32 {
        crate::inpaint::distance::distance_transform(field)
    }

    /// Marker for non-seed cells in the transform input.
    pub const DISTANCE_INFINITY: f32 = f32::INFINITY;
}
