//! Best-candidate selection for clipped segments.
//!
//! Every segment gets scanned for the unclipped pixel that best represents
//! what the clipped interior probably looked like: smooth surroundings and
//! brightness close to the clip level. The winner's binomially weighted
//! magnitude and its chroma reference drive the value synthesis stage.


use common::Buffer2;
use rayon::prelude::*;

use crate::constants::CANDIDATE_FLOOR_FRACTION;
use crate::math::sq;
use crate::segmentation::SegmentMap;

/// 5x5 binomial kernel (outer product of 1-4-6-4-1).
const BINOMIAL_5X5: [[f32; 5]; 5] = [
    [1.0, 4.0, 6.0, 4.0, 1.0],
    [4.0, 16.0, 24.0, 16.0, 4.0],
    [6.0, 24.0, 36.0, 24.0, 6.0],
    [4.0, 16.0, 24.0, 16.0, 4.0],
    [1.0, 4.0, 6.0, 4.0, 1.0],
];

struct CandidateChoice {
    id: u32,
    pos: usize,
    val1: f32,
    val2: f32,
}

/// Select the best reference for every searchable segment of `map`.
///
/// Segments run in parallel; the scan within one segment is sequential in
/// row-major order with a strictly-greater comparison, so ties resolve to
/// the first-found location under any thread count.
pub(crate) fn select_candidates(
    map: &mut SegmentMap,
    plane: &Buffer2<f32>,
    refavg: &Buffer2<f32>,
    clip: f32,
    candidating: f32,
) {
    let threshold = 1.0 - sq(candidating);

    let choices: Vec<Option<CandidateChoice>> = {
        let shared: &SegmentMap = map;
        (0..shared.num_segments())
            .into_par_iter()
            .map(|index| {
                let segment = &shared.segments[index];
                if !segment.searchable() {
                    return None;
                }
                search_segment(shared, plane, refavg, index, clip, threshold)
            })
            .collect()
    };

    for choice in choices.into_iter().flatten() {
        map.set_reference(choice.id, choice.pos, choice.val1, choice.val2);
    }
}

fn search_segment(
    map: &SegmentMap,
    plane: &Buffer2<f32>,
    refavg: &Buffer2<f32>,
    index: usize,
    clip: f32,
    threshold: f32,
) -> Option<CandidateChoice> {
    let segment = &map.segments[index];
    let width = plane.width();
    let height = plane.height();
    // keep the 5x5 windows inside real (non-mirrored) data
    let margin = map.border + 2;
    if width <= 2 * margin || height <= 2 * margin {
        return None;
    }

    let x0 = segment.bbox.x_min.saturating_sub(2).max(margin);
    let x1 = (segment.bbox.x_max + 2).min(width - margin - 1);
    let y0 = segment.bbox.y_min.saturating_sub(2).max(margin);
    let y1 = (segment.bbox.y_max + 2).min(height - margin - 1);

    let ids = map.ids.data();
    let values = plane.data();

    let mut best_weight = 0.0f32;
    let mut best = None;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let pos = y * width + x;
            if ids[pos] != segment.id || values[pos] >= clip {
                continue;
            }
            let weight = candidate_weight(values, pos, width, clip);
            if weight > best_weight {
                best_weight = weight;
                best = Some(pos);
            }
        }
    }

    let pos = best?;
    if best_weight <= threshold {
        return None;
    }

    let magnitude = binomial_unclipped_average(values, pos, width, clip)?;
    if magnitude <= CANDIDATE_FLOOR_FRACTION * clip {
        // reference drawn from deep shadow, useless for reconstruction
        return None;
    }

    Some(CandidateChoice {
        id: segment.id,
        pos,
        val1: magnitude.min(clip),
        val2: refavg.data()[pos],
    })
}

/// `w(p) = smoothness(p) * min(1, avg3x3(p) / clip)` with
/// `smoothness(p) = (1 - clamp(2 * stddev5x5(p), 0, 1))^2`.
#[inline]
fn candidate_weight(values: &[f32], pos: usize, width: usize, clip: f32) -> f32 {
    let smoothness = sq(1.0 - (2.0 * local_std_deviation(values, pos, width)).clamp(0.0, 1.0));
    let brightness = (local_mean_3x3(values, pos, width) / clip).min(1.0);
    smoothness * brightness
}

/// Standard deviation over the 5x5 neighborhood.
fn local_std_deviation(values: &[f32], pos: usize, width: usize) -> f32 {
    let mut mean = 0.0f32;
    for dy in -2isize..=2 {
        for dx in -2isize..=2 {
            mean += values[(pos as isize + dy * width as isize + dx) as usize];
        }
    }
    mean *= 0.04;

    let mut variance = 0.0f32;
    for dy in -2isize..=2 {
        for dx in -2isize..=2 {
            variance += sq(values[(pos as isize + dy * width as isize + dx) as usize] - mean);
        }
    }
    (0.04 * variance).sqrt()
}

fn local_mean_3x3(values: &[f32], pos: usize, width: usize) -> f32 {
    let mut sum = 0.0f32;
    for dy in -1isize..=1 {
        for dx in -1isize..=1 {
            sum += values[(pos as isize + dy * width as isize + dx) as usize];
        }
    }
    sum / 9.0
}

/// Binomially weighted mean of the unclipped pixels in the 5x5 around `pos`.
fn binomial_unclipped_average(
    values: &[f32],
    pos: usize,
    width: usize,
    clip: f32,
) -> Option<f32> {
    let mut sum = 0.0f32;
    let mut total = 0.0f32;
    for dy in -2isize..=2 {
        for dx in -2isize..=2 {
            let value = values[(pos as isize + dy * width as isize + dx) as usize];
            if value < clip {
                let weight = BINOMIAL_5X5[(dy + 2) as usize][(dx + 2) as usize];
                sum += value * weight;
                total += weight;
            }
        }
    }
    (total > 0.0).then(|| sum / total)
}
