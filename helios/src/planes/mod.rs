//! Plane extraction and clip detection.
//!
//! Folds the interleaved mosaic into per-channel 2-D planes sized one entry
//! per super-pixel plus a mirrored border margin. Bayer mosaics produce four
//! planes (one per photosite position, R/G1/G2/B), X-Trans mosaics three
//! super-pixel-averaged planes. Values are cube-root companded, and every
//! plane carries a companion "refavg" plane: the opponent-channel mean used
//! as a chrominance proxy during reconstruction.
//!
//! Clip detection happens in the same pass: per-plane clip masks (byte
//! grids) and the all-channels-clipped mask that feeds the inpainter.

#[cfg(test)]
mod tests;

use common::Buffer2;
use common::parallel::UnsafeSendPtr;
use rayon::prelude::*;

use crate::cfa::{CfaColor, CfaPattern};
use crate::constants::PLANE_BORDER;
use crate::math::compand;
use crate::region::Region;

/// Per-channel companded planes plus chroma-reference planes.
#[derive(Debug)]
pub(crate) struct PlaneSet {
    pub pattern: CfaPattern,
    pub region: Region,
    /// Super-pixel edge length on the mosaic (2 Bayer, 3 X-Trans).
    pub cell: usize,
    pub border: usize,
    /// Plane dimensions including the border margin.
    pub width: usize,
    pub height: usize,
    pub planes: Vec<Buffer2<f32>>,
    pub refavg: Vec<Buffer2<f32>>,
    /// Sensor color fed by each plane.
    pub colors: Vec<CfaColor>,
}

/// Clip-detection output for one extraction pass.
#[derive(Debug)]
pub(crate) struct ClipData {
    /// Per-plane clip masks, 1 = clipped.
    pub masks: Vec<Buffer2<u8>>,
    /// 1 where every channel at a super-pixel location is clipped.
    pub all_clipped: Buffer2<u8>,
    /// Total clipped plane entries in the region.
    pub clipped_count: usize,
    pub has_all_clipped: bool,
}

impl PlaneSet {
    /// Which plane the photosite at `(row, col)` feeds.
    #[inline]
    pub fn plane_index(&self, row: usize, col: usize) -> usize {
        match self.pattern {
            CfaPattern::Bayer(_) => ((row - self.region.y) % 2) * 2 + (col - self.region.x) % 2,
            CfaPattern::XTrans(_) => self.pattern.color_at(row, col).index(),
        }
    }

    /// Linear plane position of the super-pixel containing `(row, col)`.
    #[inline]
    pub fn plane_pos(&self, row: usize, col: usize) -> usize {
        let px = (col - self.region.x) / self.cell + self.border;
        let py = (row - self.region.y) / self.cell + self.border;
        py * self.width + px
    }

    /// The other green plane of a Bayer cell, if `plane` is a green one.
    pub fn sibling_green(&self, plane: usize) -> Option<usize> {
        if self.colors[plane] != CfaColor::Green {
            return None;
        }
        (0..self.colors.len()).find(|&p| p != plane && self.colors[p] == CfaColor::Green)
    }

    /// White-balance-weighted companded luminance proxy over all planes.
    pub fn luminance_proxy(&self, white_balance: [f32; 3]) -> Buffer2<f32> {
        let mut lum = Buffer2::new_filled(self.width, self.height, 0.0f32);
        let width = self.width;

        lum.data_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let idx = y * width + x;
                    let mut sums = [0.0f32; 3];
                    let mut counts = [0.0f32; 3];
                    for (plane, color) in self.planes.iter().zip(self.colors.iter()) {
                        sums[color.index()] += plane.data()[idx];
                        counts[color.index()] += 1.0;
                    }
                    let mut value = 0.0;
                    for c in 0..3 {
                        if counts[c] > 0.0 {
                            value += white_balance[c] * sums[c] / counts[c];
                        }
                    }
                    *out = value / 3.0;
                }
            });

        lum
    }
}

/// Opponent-channel mean: the chroma reference for `color` given the three
/// companded per-color means.
#[inline]
pub(crate) fn opponent_mean(companded: &[f32; 3], color: CfaColor) -> f32 {
    match color {
        CfaColor::Red => 0.5 * (companded[1] + companded[2]),
        CfaColor::Green => 0.5 * (companded[0] + companded[2]),
        CfaColor::Blue => 0.5 * (companded[0] + companded[1]),
    }
}

/// Chroma reference at a photosite, computed from the raw mosaic: companded
/// per-color means over the 3x3 window (clamped to the region), combined as
/// the opponent mean for the photosite's own color.
pub(crate) fn refavg_at(
    mosaic: &Buffer2<f32>,
    pattern: &CfaPattern,
    region: Region,
    row: usize,
    col: usize,
) -> f32 {
    let color = pattern.color_at(row, col);
    let y0 = row.saturating_sub(1).max(region.y);
    let y1 = (row + 1).min(region.bottom() - 1);
    let x0 = col.saturating_sub(1).max(region.x);
    let x1 = (col + 1).min(region.right() - 1);

    let mut sums = [0.0f32; 3];
    let mut counts = [0.0f32; 3];
    for y in y0..=y1 {
        for x in x0..=x1 {
            let c = pattern.color_at(y, x).index();
            sums[c] += mosaic[(x, y)].max(0.0);
            counts[c] += 1.0;
        }
    }

    let mut companded = [0.0f32; 3];
    for c in 0..3 {
        if counts[c] > 0.0 {
            companded[c] = compand(sums[c] / counts[c]);
        }
    }
    opponent_mean(&companded, color)
}

/// Extract companded planes, refavg planes and clip masks in one pass over
/// the region. `cube_clips` are the companded per-color clip thresholds.
pub(crate) fn extract_planes(
    mosaic: &Buffer2<f32>,
    region: Region,
    pattern: CfaPattern,
    cube_clips: [f32; 3],
) -> (PlaneSet, ClipData) {
    let cell = pattern.cell_size();
    let plane_count = pattern.plane_count();
    let border = PLANE_BORDER;

    let sp_width = region.width.div_ceil(cell);
    let sp_height = region.height.div_ceil(cell);
    let width = sp_width + 2 * border;
    let height = sp_height + 2 * border;

    let colors: Vec<CfaColor> = match pattern {
        CfaPattern::Bayer(_) => (0..4)
            .map(|p| pattern.color_at(region.y + p / 2, region.x + p % 2))
            .collect(),
        CfaPattern::XTrans(_) => vec![CfaColor::Red, CfaColor::Green, CfaColor::Blue],
    };

    let mut planes = vec![Buffer2::new_filled(width, height, 0.0f32); plane_count];
    let mut refavg = vec![Buffer2::new_filled(width, height, 0.0f32); plane_count];
    let mut masks = vec![Buffer2::new_filled(width, height, 0u8); plane_count];
    let mut all_clipped = Buffer2::new_filled(width, height, 0u8);

    let plane_ptrs: Vec<_> = planes
        .iter_mut()
        .map(|p| UnsafeSendPtr::new(p.data_mut().as_mut_ptr()))
        .collect();
    let refavg_ptrs: Vec<_> = refavg
        .iter_mut()
        .map(|p| UnsafeSendPtr::new(p.data_mut().as_mut_ptr()))
        .collect();
    let mask_ptrs: Vec<_> = masks
        .iter_mut()
        .map(|p| UnsafeSendPtr::new(p.data_mut().as_mut_ptr()))
        .collect();
    let all_ptr = UnsafeSendPtr::new(all_clipped.data_mut().as_mut_ptr());
    let len = width * height;

    let (clipped_count, all_count) = (0..sp_height)
        .into_par_iter()
        .map(|sy| {
            // SAFETY: Each thread writes only plane row `sy + border`, and
            // rows are disjoint across threads.
            let row_base = (sy + border) * width + border;
            let mut row_clipped = 0usize;
            let mut row_all = 0usize;

            for sx in 0..sp_width {
                let o = row_base + sx;
                let mut clipped_here = 0usize;

                match pattern {
                    CfaPattern::Bayer(_) => {
                        for p in 0..plane_count {
                            let row = region.y + sy * cell + p / 2;
                            let col = region.x + sx * cell + p % 2;
                            if row >= region.bottom() || col >= region.right() {
                                continue;
                            }
                            let value = compand(mosaic[(col, row)]);
                            let reference = refavg_at(mosaic, &pattern, region, row, col);
                            let clipped = value >= cube_clips[colors[p].index()];

                            unsafe {
                                *std::slice::from_raw_parts_mut(plane_ptrs[p].get(), len)
                                    .get_unchecked_mut(o) = value;
                                *std::slice::from_raw_parts_mut(refavg_ptrs[p].get(), len)
                                    .get_unchecked_mut(o) = reference;
                                *std::slice::from_raw_parts_mut(mask_ptrs[p].get(), len)
                                    .get_unchecked_mut(o) = clipped as u8;
                            }
                            clipped_here += clipped as usize;
                        }
                    }
                    CfaPattern::XTrans(_) => {
                        let mut sums = [0.0f32; 3];
                        let mut counts = [0.0f32; 3];
                        for dy in 0..cell {
                            for dx in 0..cell {
                                let row = region.y + sy * cell + dy;
                                let col = region.x + sx * cell + dx;
                                if row >= region.bottom() || col >= region.right() {
                                    continue;
                                }
                                let c = pattern.color_at(row, col).index();
                                sums[c] += mosaic[(col, row)].max(0.0);
                                counts[c] += 1.0;
                            }
                        }
                        let mut companded = [0.0f32; 3];
                        for c in 0..3 {
                            if counts[c] > 0.0 {
                                companded[c] = compand(sums[c] / counts[c]);
                            }
                        }
                        for p in 0..plane_count {
                            let value = companded[p];
                            let reference = opponent_mean(&companded, colors[p]);
                            let clipped =
                                counts[p] > 0.0 && value >= cube_clips[colors[p].index()];

                            unsafe {
                                *std::slice::from_raw_parts_mut(plane_ptrs[p].get(), len)
                                    .get_unchecked_mut(o) = value;
                                *std::slice::from_raw_parts_mut(refavg_ptrs[p].get(), len)
                                    .get_unchecked_mut(o) = reference;
                                *std::slice::from_raw_parts_mut(mask_ptrs[p].get(), len)
                                    .get_unchecked_mut(o) = clipped as u8;
                            }
                            clipped_here += clipped as usize;
                        }
                    }
                }

                row_clipped += clipped_here;
                if clipped_here == plane_count {
                    unsafe {
                        *std::slice::from_raw_parts_mut(all_ptr.get(), len).get_unchecked_mut(o) =
                            1;
                    }
                    row_all += 1;
                }
            }

            (row_clipped, row_all)
        })
        .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    for plane in planes.iter_mut().chain(refavg.iter_mut()) {
        extend_border(plane, border);
    }

    let set = PlaneSet {
        pattern,
        region,
        cell,
        border,
        width,
        height,
        planes,
        refavg,
        colors,
    };
    let clip = ClipData {
        masks,
        all_clipped,
        clipped_count,
        has_all_clipped: all_count > 0,
    };
    (set, clip)
}

/// Fill the border margin by mirroring interior pixels.
pub(crate) fn extend_border(buf: &mut Buffer2<f32>, border: usize) {
    let width = buf.width();
    let height = buf.height();
    if border == 0 || width <= 2 * border || height <= 2 * border {
        return;
    }

    for y in border..height - border {
        let row = buf.row_mut(y);
        for i in 0..border {
            row[border - 1 - i] = row[(border + i).min(width - border - 1)];
            row[width - border + i] = row[(width - border - 1 - i).max(border)];
        }
    }

    for i in 0..border {
        let src_top = (border + i).min(height - border - 1);
        let dst_top = border - 1 - i;
        let src_bottom = (height - border - 1 - i).max(border);
        let dst_bottom = height - border + i;
        buf.data_mut()
            .copy_within(src_top * width..(src_top + 1) * width, dst_top * width);
        buf.data_mut().copy_within(
            src_bottom * width..(src_bottom + 1) * width,
            dst_bottom * width,
        );
    }
}
