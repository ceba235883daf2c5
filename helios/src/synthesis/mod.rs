//! Value synthesis for partially clipped photosites.
//!
//! Where a segment carries a candidate, the clipped value is rebuilt from
//! the local chroma reference plus the candidate's chrominance offset
//! (`refavg_here + val1 - val2`, decompanded). Inpainting the color
//! difference rather than raw luminance keeps local texture cues intact.
//! Segments without a candidate, and pixels left over from a segment-cap
//! overflow, fall back to a local unclipped mean clamped to the clip floor.


use common::Buffer2;
use common::parallel::rows_per_chunk;
use rayon::prelude::*;

use crate::math::{compand, decompand};
use crate::planes::{PlaneSet, refavg_at};
use crate::segmentation::SegmentMap;

/// Result of the synthesis pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SynthesisOutcome {
    /// Largest `new / old` ratio over all rewritten photosites, at least 1.
    /// Forwarded to pipeline exposure bookkeeping.
    pub max_correction: f32,
    pub rewritten: usize,
}

struct Rewrite {
    mosaic_idx: usize,
    plane: usize,
    plane_pos: usize,
    value: f32,
}

/// Rebuild all clipped photosites in the region, writing the decompanded
/// results into `output` and keeping the planes coherent for the inpainter.
pub(crate) fn synthesize(
    input: &Buffer2<f32>,
    output: &mut Buffer2<f32>,
    set: &mut PlaneSet,
    maps: &[SegmentMap],
    clips: [f32; 3],
    cube_clips: [f32; 3],
) -> SynthesisOutcome {
    let region = set.region;
    let pattern = set.pattern;
    let mosaic_width = input.width();

    let shared: &PlaneSet = set;
    let chunk_rows = rows_per_chunk(region.height);
    let chunk_count = region.height.div_ceil(chunk_rows);
    let per_chunk: Vec<(Vec<Rewrite>, f32)> = (0..chunk_count)
        .into_par_iter()
        .map(|chunk| {
            let row_start = region.y + chunk * chunk_rows;
            let row_end = (row_start + chunk_rows).min(region.bottom());
            let mut rewrites = Vec::new();
            let mut max_ratio = 1.0f32;

            for row in row_start..row_end {
                for col in region.x..region.right() {
                    let inval = input[(col, row)].max(0.0);
                    let color = pattern.color_at(row, col);
                    if inval < clips[color.index()] {
                        continue;
                    }

                    let plane = shared.plane_index(row, col);
                    let plane_pos = shared.plane_pos(row, col);

                    let new_value =
                        match candidate_offset(shared, maps, plane, plane_pos, cube_clips) {
                            Some(offset) => {
                                let reference = refavg_at(input, &pattern, region, row, col);
                                inval.max(decompand(reference + offset))
                            }
                            None => match local_unclipped_mean(
                                &shared.planes[plane],
                                plane_pos,
                                cube_clips[color.index()],
                            ) {
                                Some(mean) => decompand(mean).max(clips[color.index()]),
                                None => continue,
                            },
                        };

                    if new_value != inval {
                        max_ratio = max_ratio.max(new_value / inval);
                        rewrites.push(Rewrite {
                            mosaic_idx: row * mosaic_width + col,
                            plane,
                            plane_pos,
                            value: new_value,
                        });
                    }
                }
            }

            (rewrites, max_ratio)
        })
        .collect();

    let mut max_correction = 1.0f32;
    let mut rewritten = 0usize;
    for (rewrites, chunk_max) in per_chunk {
        max_correction = max_correction.max(chunk_max);
        for rewrite in rewrites {
            output.data_mut()[rewrite.mosaic_idx] = rewrite.value;
            set.planes[rewrite.plane].data_mut()[rewrite.plane_pos] = compand(rewrite.value);
            rewritten += 1;
        }
    }

    SynthesisOutcome {
        max_correction,
        rewritten,
    }
}

/// Chrominance offset for a clipped photosite, averaging the two green
/// planes' candidates when both greens of a Bayer super-pixel are clipped.
fn candidate_offset(
    set: &PlaneSet,
    maps: &[SegmentMap],
    plane: usize,
    plane_pos: usize,
    cube_clips: [f32; 3],
) -> Option<f32> {
    let own = plane_candidate_offset(&maps[plane], plane_pos)?;

    if let Some(sibling) = set.sibling_green(plane) {
        let sibling_clipped = set.planes[sibling].data()[plane_pos]
            >= cube_clips[set.colors[sibling].index()];
        if sibling_clipped {
            if let Some(other) = plane_candidate_offset(&maps[sibling], plane_pos) {
                // both greens clipped with independent candidates: average
                // them to reduce directional bias
                return Some(0.5 * (own + other));
            }
        }
    }

    Some(own)
}

#[inline]
fn plane_candidate_offset(map: &SegmentMap, plane_pos: usize) -> Option<f32> {
    let id = map.id_at(plane_pos);
    if id == 0 {
        return None;
    }
    let segment = map.segment(id);
    segment
        .has_candidate()
        .then(|| segment.val1 - segment.val2)
}

/// Mean of unclipped plane values in the 3x3 around `pos`, widened to 5x5
/// when the inner window is fully clipped.
fn local_unclipped_mean(plane: &Buffer2<f32>, pos: usize, cube_clip: f32) -> Option<f32> {
    for radius in [1isize, 2] {
        let width = plane.width() as isize;
        let values = plane.data();
        let mut sum = 0.0f32;
        let mut count = 0.0f32;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let neighbor = pos as isize + dy * width + dx;
                if neighbor < 0 || neighbor >= values.len() as isize {
                    continue;
                }
                let value = values[neighbor as usize];
                if value < cube_clip {
                    sum += value;
                    count += 1.0;
                }
            }
        }
        if count > 0.0 {
            return Some(sum / count);
        }
    }
    None
}
