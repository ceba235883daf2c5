//! Tuning constants for the reconstruction engine.
//!
//! These are empirically tuned policy values carried over from the reference
//! pipeline, not algorithmic invariants.

/// Border margin around every plane, in super-pixels. Wide enough for the
/// largest morphological closing radius plus the 5x5 scan windows.
pub(crate) const PLANE_BORDER: usize = 8;

/// Fewer clipped photosites than this and the whole invocation is a no-op.
pub(crate) const MIN_CLIPPED_PHOTOSITES: usize = 20;

/// Fraction of the white point treated as the effective clip level,
/// compensating for sensor response flattening just below saturation.
pub(crate) const DEFAULT_CLIP_FRACTION: f32 = 0.987;

/// Segment id budget per megapixel of mosaic area.
pub(crate) const SEGMENTS_PER_MEGAPIXEL: usize = 250;

/// Lower and upper bounds for the derived segment id cap.
pub(crate) const MIN_SEGMENT_CAP: usize = 256;
pub(crate) const MAX_SEGMENT_CAP: usize = 16384;

/// Candidate magnitude below this fraction of the clip level is rejected as
/// degenerate (a reference drawn from deep shadow noise).
pub(crate) const CANDIDATE_FLOOR_FRACTION: f32 = 0.125;

/// Distance-ring spacing for gradient propagation. 1.5 rather than 1.0 so a
/// ring always reaches its diagonal neighbors in the previous ring.
pub(crate) const RING_SPACING: f32 = 1.5;

/// Propagated gradients are capped here to keep deep interiors bounded.
pub(crate) const GRADIENT_CEILING: f32 = 1.5;

/// Upper bound on the per-segment ridge-removal blur radius.
pub(crate) const MAX_BLUR_RADIUS: usize = 15;

/// Segments with a maximum interior distance at or below this have no
/// meaningful interior and are skipped by the inpainter.
pub(crate) const MIN_INPAINT_DISTANCE: f32 = 3.0;

/// Fallback white balance multipliers substituted for degenerate inputs.
pub(crate) const FALLBACK_WHITE_BALANCE: [f32; 3] = [2.0, 1.0, 1.5];
