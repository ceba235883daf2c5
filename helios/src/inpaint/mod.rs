//! Distance-field inpainting of fully-clipped regions.
//!
//! Where every channel saturated there is no chrominance left to work with;
//! instead, the unclipped border's luminance gradients are propagated inward
//! along rings of an exact Euclidean distance transform, attenuated with
//! depth, smoothed per segment, optionally roughened with synthetic noise,
//! and finally blended into the mosaic with a sigmoid in distance so the
//! correction fades out at the segment border.

pub(crate) mod distance;

use std::sync::atomic::{AtomicBool, Ordering};

use common::Buffer2;
use common::box_filters::box_mean;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::RecoveryConfig;
use crate::constants::{
    GRADIENT_CEILING, MAX_BLUR_RADIUS, MIN_INPAINT_DISTANCE, RING_SPACING,
};
use crate::error::RecoveryError;
use crate::math::{Aabb, sq};
use crate::planes::{PlaneSet, extend_border};
use crate::segmentation::{SegmentMap, UNLABELED};

use distance::{DISTANCE_INFINITY, distance_transform};

/// Why the inpainter finished the way it did.
pub(crate) enum InpaintResult {
    Completed(Box<InpaintOutcome>),
    /// Nothing deep enough to reconstruct.
    Skipped,
    Cancelled,
}

/// Fields kept alive for visualization and reporting.
pub(crate) struct InpaintOutcome {
    pub segall: SegmentMap,
    pub distance: Buffer2<f32>,
    pub gradient: Buffer2<f32>,
}

/// Reconstruct all-clipped regions and add the blended correction to
/// `output`. `max_correction` is the exposure ratio from value synthesis and
/// scales the scattered correction.
#[allow(clippy::too_many_arguments)]
pub(crate) fn inpaint_all_clipped(
    input: &Buffer2<f32>,
    output: &mut Buffer2<f32>,
    set: &PlaneSet,
    all_clipped: &Buffer2<u8>,
    white_balance: [f32; 3],
    clips: [f32; 3],
    config: &RecoveryConfig,
    segment_cap: usize,
    max_correction: f32,
    cancel: Option<&AtomicBool>,
) -> Result<InpaintResult, RecoveryError> {
    let width = set.width;
    let height = set.height;
    let border = set.border;
    let closing = config.mode.closing_radius();

    let mut segall = SegmentMap::from_mask(all_clipped, border, segment_cap)?;
    segall.close(closing);

    // luminance proxy, lightly blurred
    let mut luminance = set.luminance_proxy(white_balance);
    extend_border(&mut luminance, border);
    box_mean(luminance.data_mut(), width, height, 1, 2);

    // exact distance to the nearest unclipped cell, infinite inside the mask
    let mut dist = Buffer2::new_filled(width, height, 0.0f32);
    for (d, id) in dist.data_mut().iter_mut().zip(segall.ids.data().iter()) {
        if *id == UNLABELED {
            *d = DISTANCE_INFINITY;
        }
    }
    let max_distance = distance_transform(&mut dist);
    if max_distance <= MIN_INPAINT_DISTANCE {
        return Ok(InpaintResult::Skipped);
    }
    if cancelled(cancel) {
        return Ok(InpaintResult::Cancelled);
    }

    segall.segmentize();

    // seed gradients just inside the border from real unclipped data
    let mut recout = Buffer2::new_filled(width, height, 0.0f32);
    initial_gradients(&luminance, &dist, &mut recout, border);
    extend_border(&mut recout, border);

    // propagate border gradients inward, segment by segment
    let patches: Vec<(u32, f32, Option<Patch>)> = segall
        .segments
        .par_iter()
        .map(|segment| {
            let max_dist = segment_max_distance(&dist, &segall, segment.id, &segment.bbox);
            if max_dist <= MIN_INPAINT_DISTANCE {
                // too small to have a meaningful interior
                return (segment.id, max_dist, None);
            }
            let patch = propagate_segment(
                &recout,
                &dist,
                &segall,
                segment.id,
                &segment.bbox,
                config,
                max_dist,
                cancel,
            );
            (segment.id, max_dist, patch)
        })
        .collect();

    if cancelled(cancel) {
        return Ok(InpaintResult::Cancelled);
    }

    for (id, max_dist, patch) in patches {
        segall.segment_mut(id).val1 = max_dist;
        if let Some(patch) = patch {
            patch.apply(&mut recout, &segall, id);
        }
    }

    // blur the propagated gradients to remove ring discontinuities
    let mut gradient = recout;
    box_mean(gradient.data_mut(), width, height, 1, 2);

    if config.noise_level > 0.0 {
        for index in 0..segall.num_segments() {
            let segment = segall.segments[index].clone();
            if segment.val1 > MIN_INPAINT_DISTANCE {
                add_poisson_noise(&mut gradient, &segall, segment.id, &segment.bbox, config.noise_level);
            }
        }
    }

    if cancelled(cancel) {
        return Ok(InpaintResult::Cancelled);
    }

    // sigmoid blend in distance, scaled by the synthesis exposure ratio
    let region = set.region;
    let shift = 2.0 + closing as f32;
    let strength = config.strength;
    let pattern = set.pattern;
    let mosaic_width = input.width();
    let dist_ref = &dist;
    let gradient_ref = &gradient;

    output
        .data_mut()
        .par_chunks_mut(mosaic_width)
        .enumerate()
        .for_each(|(row, out_row)| {
            if row < region.y || row >= region.bottom() {
                return;
            }
            for col in region.x..region.right() {
                let inval = input[(col, row)].max(0.0);
                let color = pattern.color_at(row, col);
                if inval < clips[color.index()] {
                    continue;
                }
                let o = set.plane_pos(row, col);
                let effect = strength / (1.0 + (-(dist_ref.data()[o] - shift)).exp());
                let correction = max_correction * gradient_ref.data()[o].max(0.0) * effect;
                out_row[col] += correction;
            }
        });

    Ok(InpaintResult::Completed(Box::new(InpaintOutcome {
        segall,
        distance: dist,
        gradient,
    })))
}

#[inline]
fn cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Scharr gradient magnitude of the luminance at a cell, weights 47/162/47
/// over 256.
#[inline]
fn scharr_magnitude(lum: &[f32], pos: usize, width: usize) -> f32 {
    let above = pos - width;
    let below = pos + width;
    let gx = 47.0 * (lum[above - 1] - lum[above + 1])
        + 162.0 * (lum[pos - 1] - lum[pos + 1])
        + 47.0 * (lum[below - 1] - lum[below + 1]);
    let gy = 47.0 * (lum[above - 1] - lum[below - 1])
        + 162.0 * (lum[above] - lum[below])
        + 47.0 * (lum[above + 1] - lum[below + 1]);
    (sq(gx / 256.0) + sq(gy / 256.0)).sqrt()
}

/// Seed gradients where the distance is in (0, 2): just inside the clipped
/// border, where the Scharr estimate still sees real data.
fn initial_gradients(
    luminance: &Buffer2<f32>,
    dist: &Buffer2<f32>,
    recout: &mut Buffer2<f32>,
    border: usize,
) {
    let width = luminance.width();
    let height = luminance.height();
    let lum = luminance.data();
    let dist_data = dist.data();

    recout
        .data_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            if y < border + 2 || y >= height - border - 2 {
                return;
            }
            for x in border + 2..width - border - 2 {
                let pos = y * width + x;
                let d = dist_data[pos];
                if d > 0.0 && d < 2.0 {
                    row[x] = 4.0 * scharr_magnitude(lum, pos, width);
                }
            }
        });
}

/// Largest distance value over the segment's members.
fn segment_max_distance(
    dist: &Buffer2<f32>,
    segall: &SegmentMap,
    id: u32,
    bbox: &Aabb,
) -> f32 {
    let width = dist.width();
    let height = dist.height();
    let border = segall.border;
    let rect = bbox.expanded_clamped(2, border, width - border - 1, border, height - border - 1);

    let mut max_dist = 0.0f32;
    for y in rect.y_min..=rect.y_max {
        for x in rect.x_min..=rect.x_max {
            let pos = y * width + x;
            if segall.is_member(pos, id) {
                max_dist = max_dist.max(dist.data()[pos]);
            }
        }
    }
    max_dist
}

/// Private gradient copy of a segment's surroundings, computed in parallel
/// and written back under the member guard, so segments stay independent
/// and the result is identical under any thread count.
struct Patch {
    rect: Aabb,
    values: Vec<f32>,
}

impl Patch {
    fn apply(&self, recout: &mut Buffer2<f32>, segall: &SegmentMap, id: u32) {
        let width = recout.width();
        let rect_width = self.rect.width();
        for y in self.rect.y_min..=self.rect.y_max {
            for x in self.rect.x_min..=self.rect.x_max {
                let pos = y * width + x;
                if segall.is_member(pos, id) {
                    let local = (y - self.rect.y_min) * rect_width + (x - self.rect.x_min);
                    recout.data_mut()[pos] = self.values[local];
                }
            }
        }
    }
}

/// Ring propagation, ridge-removal blur and strength scaling for one
/// segment.
#[allow(clippy::too_many_arguments)]
fn propagate_segment(
    recout: &Buffer2<f32>,
    dist: &Buffer2<f32>,
    segall: &SegmentMap,
    id: u32,
    bbox: &Aabb,
    config: &RecoveryConfig,
    max_dist: f32,
    cancel: Option<&AtomicBool>,
) -> Option<Patch> {
    let width = recout.width();
    let height = recout.height();
    let border = segall.border;

    // write region plus a 2-cell read margin for the 5x5 ring neighborhoods
    let write = bbox.expanded_clamped(1, border, width - border - 1, border, height - border - 1);
    let read = write.expanded_clamped(2, 0, width - 1, 0, height - 1);
    let read_width = read.width();

    let mut local = vec![0.0f32; read_width * read.height()];
    for y in read.y_min..=read.y_max {
        let src = &recout.data()[y * width + read.x_min..y * width + read.x_max + 1];
        let dst_start = (y - read.y_min) * read_width;
        local[dst_start..dst_start + read_width].copy_from_slice(src);
    }

    let attenuation = config.mode.attenuation(max_dist);
    let dist_data = dist.data();

    // rings spaced 1.5 apart, each averaging gradients of the previous ring
    let mut ring = RING_SPACING;
    while ring < max_dist {
        if cancelled(cancel) {
            return None;
        }
        for y in write.y_min..=write.y_max {
            for x in write.x_min..=write.x_max {
                let pos = y * width + x;
                let d = dist_data[pos];
                if d < ring || d >= ring + RING_SPACING || !segall.is_member(pos, id) {
                    continue;
                }

                let mut sum = 0.0f32;
                let mut count = 0.0f32;
                for dy in -2isize..=2 {
                    for dx in -2isize..=2 {
                        let ny = y as isize + dy;
                        let nx = x as isize + dx;
                        if ny < read.y_min as isize
                            || ny > read.y_max as isize
                            || nx < read.x_min as isize
                            || nx > read.x_max as isize
                        {
                            continue;
                        }
                        let npos = ny as usize * width + nx as usize;
                        let nd = dist_data[npos];
                        if nd >= ring - RING_SPACING && nd < ring {
                            let nlocal = (ny as usize - read.y_min) * read_width
                                + (nx as usize - read.x_min);
                            sum += local[nlocal];
                            count += 1.0;
                        }
                    }
                }

                if count > 0.0 {
                    let lpos = (y - read.y_min) * read_width + (x - read.x_min);
                    local[lpos] = GRADIENT_CEILING
                        .min((sum / count) * (1.0 + 1.0 / d.powf(attenuation)));
                }
            }
        }
        ring += RING_SPACING;
    }

    // large interiors get a box blur to remove directional ridges
    if max_dist > 4.0 {
        let write_width = write.width();
        let write_height = write.height();
        let mut blurred = vec![0.0f32; write_width * write_height];
        for y in write.y_min..=write.y_max {
            for x in write.x_min..=write.x_max {
                let lpos = (y - read.y_min) * read_width + (x - read.x_min);
                blurred[(y - write.y_min) * write_width + (x - write.x_min)] = local[lpos];
            }
        }
        let radius = (max_dist as usize).min(MAX_BLUR_RADIUS);
        box_mean(&mut blurred, write_width, write_height, radius, 2);

        for y in write.y_min..=write.y_max {
            for x in write.x_min..=write.x_max {
                let pos = y * width + x;
                if segall.is_member(pos, id) {
                    let lpos = (y - read.y_min) * read_width + (x - read.x_min);
                    local[lpos] = blurred[(y - write.y_min) * write_width + (x - write.x_min)];
                }
            }
        }
    }

    // scale by the mode's strength factor
    let correction = config.mode.correction(max_dist);
    let write_width = write.width();
    let mut values = vec![0.0f32; write_width * write.height()];
    for y in write.y_min..=write.y_max {
        for x in write.x_min..=write.x_max {
            let lpos = (y - read.y_min) * read_width + (x - read.x_min);
            values[(y - write.y_min) * write_width + (x - write.x_min)] =
                local[lpos] * correction;
        }
    }

    Some(Patch {
        rect: write,
        values,
    })
}

/// Deterministic Poisson-like noise: a seeded normal approximation with
/// variance proportional to the local gradient amplitude.
fn add_poisson_noise(
    gradient: &mut Buffer2<f32>,
    segall: &SegmentMap,
    id: u32,
    bbox: &Aabb,
    noise_level: f32,
) {
    let width = gradient.width();
    let height = gradient.height();
    let border = segall.border;
    let rect = bbox.expanded_clamped(0, border, width - border - 1, border, height - border - 1);

    let seed = ((rect.y_min as u64) << 32) ^ rect.x_min as u64 ^ 0x9E37_79B9_7F4A_7C15;
    let mut rng = SmallRng::seed_from_u64(seed);

    for y in rect.y_min..=rect.y_max {
        for x in rect.x_min..=rect.x_max {
            let pos = y * width + x;
            if !segall.is_member(pos, id) {
                continue;
            }
            let value = gradient.data()[pos];
            let lambda = (value * noise_level).max(0.0);
            // Box-Muller from two uniforms
            let u1: f32 = rng.random::<f32>().max(1.0e-7);
            let u2: f32 = rng.random::<f32>();
            let gauss = (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos();
            gradient.data_mut()[pos] = value + lambda.sqrt() * noise_level * gauss;
        }
    }
}
