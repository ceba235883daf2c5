//! Configuration for highlight reconstruction.
//!
//! A single flat [`RecoveryConfig`] plus the [`RecoveryMode`] selector for
//! the fully-clipped inpainter. Use the preset constructors for common
//! scenarios and customize individual fields as needed.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CLIP_FRACTION;

// ============================================================================
// Recovery mode
// ============================================================================

/// Attenuation curve used when propagating gradients into fully-clipped
/// regions.
///
/// The `Flat` variants additionally close small gaps in the all-clipped mask
/// (radius 2) before segmentation, merging speckled regions into one, and
/// shift the sigmoid blend accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecoveryMode {
    /// No reconstruction of fully-clipped regions.
    #[default]
    Off,
    /// Steep attenuation tuned for small clipped areas.
    Small,
    /// Gentle attenuation tuned for large blown regions (skies).
    Large,
    /// [`RecoveryMode::Small`] with mask closing for speckled regions.
    SmallFlat,
    /// [`RecoveryMode::Large`] with mask closing for speckled regions.
    LargeFlat,
    /// Attenuation adapted per segment from its interior extent.
    Adaptive,
    /// [`RecoveryMode::Adaptive`] with mask closing.
    AdaptiveFlat,
}

impl RecoveryMode {
    #[inline]
    pub const fn is_off(self) -> bool {
        matches!(self, RecoveryMode::Off)
    }

    /// Exponent of the `1 + 1/d^a` ring attenuation for a segment whose
    /// interior reaches `max_distance`.
    #[inline]
    pub fn attenuation(self, max_distance: f32) -> f32 {
        match self {
            RecoveryMode::Off => 0.0,
            RecoveryMode::Small | RecoveryMode::SmallFlat => 1.7,
            RecoveryMode::Large | RecoveryMode::LargeFlat => 1.0,
            RecoveryMode::Adaptive | RecoveryMode::AdaptiveFlat => {
                (0.9 + 3.0 / max_distance.max(1.0)).min(1.7)
            }
        }
    }

    /// Morphological closing radius applied to the all-clipped mask.
    #[inline]
    pub const fn closing_radius(self) -> usize {
        match self {
            RecoveryMode::SmallFlat | RecoveryMode::LargeFlat | RecoveryMode::AdaptiveFlat => 2,
            _ => 0,
        }
    }

    /// Per-segment gradient scale: the attenuation value lowered slightly
    /// when closing widened the mask.
    #[inline]
    pub fn correction(self, max_distance: f32) -> f32 {
        self.attenuation(max_distance) - 0.1 * self.closing_radius() as f32
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for one reconstruction invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    // -- Clip detection --
    /// User clip multiplier on the sensor white point. Range: (0, 2].
    pub clip: f32,
    /// Headroom fraction applied below the white point. Range: (0, 1].
    pub clip_fraction: f32,

    // -- Segmentation --
    /// Morphological closing steps bridging noise-separated clipped islands.
    /// Range: 0..=8. Dilation runs `combine` steps, erosion `combine - 1`.
    pub combine: usize,
    /// Override for the segment id cap; `None` derives it from image area.
    pub segment_cap: Option<usize>,

    // -- Candidate selection --
    /// Candidate acceptance latitude in (0, 1]; the winning weight must
    /// exceed `1 - candidating^2`.
    pub candidating: f32,

    // -- Fully-clipped recovery --
    /// Attenuation curve for the distance-field inpainter.
    pub mode: RecoveryMode,
    /// Inpainter strength in [0, 1]; 0 disables the inpainter entirely.
    pub strength: f32,
    /// Synthetic noise level in [0, 0.5]; 0 disables noise.
    pub noise_level: f32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            clip: 1.0,
            clip_fraction: DEFAULT_CLIP_FRACTION,
            combine: 2,
            segment_cap: None,
            candidating: 0.3,
            mode: RecoveryMode::Off,
            strength: 0.0,
            noise_level: 0.0,
        }
    }
}

impl RecoveryConfig {
    /// Validate the configuration, panicking if invalid.
    pub fn validate(&self) {
        assert!(
            self.clip > 0.0 && self.clip <= 2.0,
            "clip must be in (0, 2], got {}",
            self.clip
        );
        assert!(
            self.clip_fraction > 0.0 && self.clip_fraction <= 1.0,
            "clip_fraction must be in (0, 1], got {}",
            self.clip_fraction
        );
        assert!(
            self.combine <= 8,
            "combine must be <= 8, got {}",
            self.combine
        );
        if let Some(cap) = self.segment_cap {
            assert!(
                cap >= 16,
                "segment_cap must be at least 16, got {}",
                cap
            );
        }
        assert!(
            self.candidating > 0.0 && self.candidating <= 1.0,
            "candidating must be in (0, 1], got {}",
            self.candidating
        );
        assert!(
            (0.0..=1.0).contains(&self.strength),
            "strength must be in [0, 1], got {}",
            self.strength
        );
        assert!(
            (0.0..=0.5).contains(&self.noise_level),
            "noise_level must be in [0, 0.5], got {}",
            self.noise_level
        );
    }

    // =========================================================================
    // Preset constructors
    // =========================================================================

    /// Candidate-based reconstruction only, no inpainting of fully-clipped
    /// regions. The cheapest useful setting.
    pub fn candidates_only() -> Self {
        Self::default()
    }

    /// Balanced full reconstruction: adaptive attenuation at half strength.
    pub fn balanced() -> Self {
        Self {
            mode: RecoveryMode::Adaptive,
            strength: 0.5,
            ..Self::default()
        }
    }

    /// Aggressive recovery of large blown regions (skies, speculars):
    /// closed mask, full strength, a touch of synthetic noise so the
    /// rebuilt interior does not look sterile.
    pub fn strong_recovery() -> Self {
        Self {
            combine: 3,
            mode: RecoveryMode::AdaptiveFlat,
            strength: 1.0,
            noise_level: 0.1,
            ..Self::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
