//! Top-level highlight reconstruction entry point.
//!
//! A pure function over explicit buffers and a configuration struct: no
//! global state, no I/O. Failures are recovered locally; the worst case
//! leaves the output identical to the input and notes why in the report.


use std::sync::atomic::{AtomicBool, Ordering};

use common::Buffer2;
use rayon::prelude::*;

use crate::candidates::select_candidates;
use crate::cfa::CfaPattern;
use crate::config::RecoveryConfig;
use crate::constants::{FALLBACK_WHITE_BALANCE, MIN_CLIPPED_PHOTOSITES};
use crate::error::RecoveryError;
use crate::inpaint::{InpaintOutcome, InpaintResult, inpaint_all_clipped};
use crate::math::compand;
use crate::planes::extract_planes;
use crate::region::Region;
use crate::segmentation::{SegmentMap, derive_segment_cap};
use crate::synthesis::synthesize;

/// Observational mask overlays for debugging and tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualizeMode {
    #[default]
    Off,
    /// Segment membership: border ring bright, interior dimmer.
    Combine,
    /// Segments that found a usable candidate.
    Candidating,
    /// Blended gradient magnitude of the inpainter.
    Strength,
}

/// How the invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryStatus {
    Completed,
    /// Nothing in the region exceeded the clip threshold.
    NothingToDo,
    /// Recovered failure; output left identical to input.
    Skipped(RecoveryError),
    /// Cooperative shutdown tripped; output holds best-effort partial work.
    Cancelled,
}

/// Inputs besides the mosaic buffers.
#[derive(Debug, Clone)]
pub struct RecoveryParams<'a> {
    pub pattern: CfaPattern,
    /// White balance multipliers per color, as applied to the mosaic.
    pub white_balance: [f32; 3],
    pub config: RecoveryConfig,
    /// Sub-rectangle to process; `None` means the full frame.
    pub region: Option<Region>,
    /// Cooperative shutdown flag, checked between pipeline stages.
    pub cancel: Option<&'a AtomicBool>,
    pub visualize: VisualizeMode,
}

impl<'a> RecoveryParams<'a> {
    pub fn new(pattern: CfaPattern, white_balance: [f32; 3]) -> Self {
        Self {
            pattern,
            white_balance,
            config: RecoveryConfig::default(),
            region: None,
            cancel: None,
            visualize: VisualizeMode::Off,
        }
    }
}

/// Statistics of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryReport {
    pub status: RecoveryStatus,
    /// Largest `new / old` exposure ratio, forwarded to pipeline
    /// bookkeeping. 1.0 when nothing was raised.
    pub max_correction: f32,
    /// Clipped plane entries found in the region.
    pub clipped_count: usize,
    /// Photosites rewritten by value synthesis.
    pub rewritten: usize,
    /// Segment count per color plane.
    pub plane_segments: Vec<usize>,
    /// Segment count of the all-channels-clipped mask.
    pub all_clipped_segments: usize,
}

impl RecoveryReport {
    fn empty(status: RecoveryStatus) -> Self {
        Self {
            status,
            max_correction: 1.0,
            clipped_count: 0,
            rewritten: 0,
            plane_segments: Vec::new(),
            all_clipped_segments: 0,
        }
    }
}

/// Reconstruct clipped highlights of `input` into `output`.
///
/// `output` must have the same dimensions as `input`; it is overwritten with
/// the input first, then only reconstructed pixels change. The optional
/// `mask_out` buffer receives the [`VisualizeMode`] overlay when requested.
pub fn reconstruct(
    input: &Buffer2<f32>,
    output: &mut Buffer2<f32>,
    params: &RecoveryParams,
    mask_out: Option<&mut Buffer2<f32>>,
) -> RecoveryReport {
    assert_eq!(input.width(), output.width(), "output width mismatch");
    assert_eq!(input.height(), output.height(), "output height mismatch");
    params.config.validate();

    output.copy_from(input);

    let white_balance = sanitize_white_balance(params.white_balance);
    let config = &params.config;

    let clip_level = (config.clip_fraction * config.clip).max(0.1);
    let clips = [
        clip_level * white_balance[0],
        clip_level * white_balance[1],
        clip_level * white_balance[2],
    ];
    let cube_clips = [compand(clips[0]), compand(clips[1]), compand(clips[2])];

    let region = params
        .region
        .unwrap_or_else(|| Region::full(input.width(), input.height()))
        .clamped(input.width(), input.height());
    if region.is_empty() {
        tracing::warn!(region = ?params.region, "degenerate region, nothing to process");
        return RecoveryReport::empty(RecoveryStatus::Skipped(RecoveryError::DegenerateInput(
            "empty region",
        )));
    }

    // plane extraction and clip detection
    let (mut set, clip_data) = extract_planes(input, region, params.pattern, cube_clips);
    tracing::debug!(
        clipped = clip_data.clipped_count,
        all_clipped = clip_data.has_all_clipped,
        "clip detection complete"
    );

    if clip_data.clipped_count < MIN_CLIPPED_PHOTOSITES
        && params.visualize == VisualizeMode::Off
    {
        tracing::debug!(reason = %RecoveryError::NoClippedData, "early exit");
        return RecoveryReport {
            clipped_count: clip_data.clipped_count,
            ..RecoveryReport::empty(RecoveryStatus::NothingToDo)
        };
    }
    if cancelled(params.cancel) {
        return RecoveryReport {
            clipped_count: clip_data.clipped_count,
            ..RecoveryReport::empty(RecoveryStatus::Cancelled)
        };
    }

    // segmentation, one independent run per color plane
    let cap = config
        .segment_cap
        .unwrap_or_else(|| derive_segment_cap(region.width * region.height));
    let maps: Result<Vec<SegmentMap>, RecoveryError> = clip_data
        .masks
        .par_iter()
        .map(|mask| {
            let mut map = SegmentMap::from_mask(mask, set.border, cap)?;
            map.close(config.combine);
            map.segmentize();
            Ok(map)
        })
        .collect();
    let mut maps = match maps {
        Ok(maps) => maps,
        Err(error) => {
            tracing::warn!(%error, "segmentation failed, returning input unchanged");
            output.copy_from(input);
            return RecoveryReport {
                clipped_count: clip_data.clipped_count,
                ..RecoveryReport::empty(RecoveryStatus::Skipped(error))
            };
        }
    };

    // candidate selection per plane
    for (plane, map) in maps.iter_mut().enumerate() {
        select_candidates(
            map,
            &set.planes[plane],
            &set.refavg[plane],
            cube_clips[set.colors[plane].index()],
            config.candidating,
        );
    }
    if cancelled(params.cancel) {
        return RecoveryReport {
            clipped_count: clip_data.clipped_count,
            ..RecoveryReport::empty(RecoveryStatus::Cancelled)
        };
    }

    // rebuild partially clipped photosites
    let outcome = synthesize(input, output, &mut set, &maps, clips, cube_clips);
    tracing::debug!(
        rewritten = outcome.rewritten,
        max_correction = outcome.max_correction,
        "value synthesis complete"
    );

    // reconstruct fully clipped regions
    let mut status = RecoveryStatus::Completed;
    let mut inpaint_outcome: Option<Box<InpaintOutcome>> = None;
    if !config.mode.is_off() && config.strength > 0.0 && clip_data.has_all_clipped {
        match inpaint_all_clipped(
            input,
            output,
            &set,
            &clip_data.all_clipped,
            white_balance,
            clips,
            config,
            cap,
            outcome.max_correction,
            params.cancel,
        ) {
            Ok(InpaintResult::Completed(done)) => inpaint_outcome = Some(done),
            Ok(InpaintResult::Skipped) => {}
            Ok(InpaintResult::Cancelled) => status = RecoveryStatus::Cancelled,
            Err(error) => {
                // partial results from synthesis stay in place
                tracing::warn!(%error, "inpainter failed, keeping synthesis results");
            }
        }
    }

    if let Some(mask) = mask_out {
        render_mask(mask, params.visualize, &set, &maps, inpaint_outcome.as_deref(), config);
    }

    let segment_report = RecoveryReport {
        status,
        max_correction: outcome.max_correction,
        clipped_count: clip_data.clipped_count,
        rewritten: outcome.rewritten,
        plane_segments: maps.iter().map(SegmentMap::num_segments).collect(),
        all_clipped_segments: inpaint_outcome
            .as_deref()
            .map_or(0, |o| o.segall.num_segments()),
    };
    tracing::debug!(
        segments = ?segment_report.plane_segments,
        all_clipped_segments = segment_report.all_clipped_segments,
        "highlight reconstruction finished"
    );
    segment_report
}

#[inline]
fn cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Replace degenerate white balance coefficients with a fixed fallback.
fn sanitize_white_balance(white_balance: [f32; 3]) -> [f32; 3] {
    let degenerate = white_balance
        .iter()
        .any(|coeff| !coeff.is_finite() || *coeff < 0.1);
    if degenerate {
        tracing::warn!(
            ?white_balance,
            fallback = ?FALLBACK_WHITE_BALANCE,
            "degenerate white balance, using fallback"
        );
        FALLBACK_WHITE_BALANCE
    } else {
        white_balance
    }
}

/// Render the observational overlay into `mask`.
fn render_mask(
    mask: &mut Buffer2<f32>,
    mode: VisualizeMode,
    set: &crate::planes::PlaneSet,
    maps: &[SegmentMap],
    inpaint: Option<&InpaintOutcome>,
    config: &RecoveryConfig,
) {
    mask.fill(0.0);
    if mode == VisualizeMode::Off {
        return;
    }

    let region = set.region;
    for row in region.y..region.bottom() {
        for col in region.x..region.right() {
            let plane = set.plane_index(row, col);
            let o = set.plane_pos(row, col);
            let value = match mode {
                VisualizeMode::Off => 0.0,
                VisualizeMode::Combine => {
                    let id = maps[plane].id_at(o);
                    if id == 0 {
                        0.0
                    } else if maps[plane].is_border(o) {
                        1.0
                    } else {
                        0.6
                    }
                }
                VisualizeMode::Candidating => {
                    let id = maps[plane].id_at(o);
                    if id > 0 && maps[plane].segment(id).has_candidate() {
                        1.0
                    } else {
                        0.0
                    }
                }
                VisualizeMode::Strength => match inpaint {
                    Some(outcome) if outcome.segall.id_at(o) > 0 => {
                        config.strength * outcome.gradient.data()[o]
                    }
                    _ => 0.0,
                },
            };
            mask[(col, row)] = value;
        }
    }
}
