//! Morphological closing on unlabeled clip masks.
//!
//! Operates on the id grid while it still holds only the 0/1 sentinels,
//! before flood filling. Dilation and erosion use disc-shaped neighborhoods
//! (radius up to 8, bounded by the plane border margin) so closing has no
//! directional preference.

use common::Buffer2;
use rayon::prelude::*;

use super::{BACKGROUND, UNLABELED};

/// Close gaps in the mask: dilate by `radius`, erode by `radius - 1`.
pub(super) fn close(ids: &mut Buffer2<u32>, border: usize, radius: usize) {
    if radius == 0 {
        return;
    }
    debug_assert!(radius <= border, "closing radius exceeds border margin");

    fill_border(ids, border, BACKGROUND);
    let mut tmp = ids.clone();
    morph::<false>(ids, &mut tmp, border, radius);

    if radius > 1 {
        // erosion needs a solid frame so it cannot eat inward from the edge
        fill_border(&mut tmp, border, UNLABELED);
        morph::<true>(&tmp, ids, border, radius - 1);
    } else {
        ids.copy_from(&tmp);
    }
    fill_border(ids, border, BACKGROUND);
}

/// Disc offsets for a given radius; radius 1 degenerates to the 3x3 square.
fn disc_offsets(radius: usize) -> Vec<(isize, isize)> {
    let r = radius as isize;
    let limit = (radius as f32 + 0.5) * (radius as f32 + 0.5);
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if (dy * dy + dx * dx) as f32 <= limit {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

/// Dilate (`ERODE = false`) or erode (`ERODE = true`) `src` into `dst` over
/// the interior region.
fn morph<const ERODE: bool>(
    src: &Buffer2<u32>,
    dst: &mut Buffer2<u32>,
    border: usize,
    radius: usize,
) {
    let width = src.width();
    let height = src.height();
    let offsets = disc_offsets(radius);
    let src_data = src.data();

    dst.data_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            if y < border || y >= height - border {
                return;
            }
            for x in border..width - border {
                let hit = if ERODE {
                    offsets.iter().all(|(dx, dy)| {
                        let pos = (y as isize + dy) * width as isize + x as isize + dx;
                        src_data[pos as usize] != 0
                    })
                } else {
                    offsets.iter().any(|(dx, dy)| {
                        let pos = (y as isize + dy) * width as isize + x as isize + dx;
                        src_data[pos as usize] != 0
                    })
                };
                row[x] = u32::from(hit);
            }
        });
}

/// Fill the border frame of the grid with `value`.
fn fill_border(ids: &mut Buffer2<u32>, border: usize, value: u32) {
    let width = ids.width();
    let height = ids.height();
    if width <= 2 * border || height <= 2 * border {
        ids.fill(value);
        return;
    }

    for y in 0..height {
        if y < border || y >= height - border {
            ids.row_mut(y).fill(value);
        } else {
            let row = ids.row_mut(y);
            row[..border].fill(value);
            row[width - border..].fill(value);
        }
    }
}
