//! Exact 2-D Euclidean distance transform.
//!
//! Felzenszwalb-Huttenlocher in two 1-D passes: a two-sweep scan along rows
//! (exact for binary input), then a lower-envelope-of-parabolas pass along
//! columns over the squared row distances. The envelope runs in f64 so the
//! result matches a brute-force reference to well below 1e-4.

use common::Buffer2;
use common::parallel::UnsafeSendPtr;
use rayon::prelude::*;

/// Marker for "not a seed" cells in the input field.
pub(crate) const DISTANCE_INFINITY: f32 = f32::INFINITY;

/// Cap on 1-D distances, large enough to dominate any real image span.
const FAR: f32 = 1.0e7;

/// In-place exact Euclidean distance transform.
///
/// On input, `field` holds `0.0` at seed cells and [`DISTANCE_INFINITY`]
/// everywhere else. On return every cell holds its Euclidean distance to the
/// nearest seed. Returns the maximum distance in the field.
pub(crate) fn distance_transform(field: &mut Buffer2<f32>) -> f32 {
    let width = field.width();
    let height = field.height();
    if field.is_empty() {
        return 0.0;
    }

    // Pass 1: per-row squared distance to the nearest seed in the same row.
    field.data_mut().par_chunks_mut(width).for_each(|row| {
        let mut run = FAR;
        for value in row.iter_mut() {
            run = if *value == 0.0 { 0.0 } else { (run + 1.0).min(FAR) };
            *value = run;
        }
        run = FAR;
        for value in row.iter_mut().rev() {
            run = if *value == 0.0 { 0.0 } else { (run + 1.0).min(FAR) };
            *value = value.min(run);
        }
        for value in row.iter_mut() {
            *value *= *value;
        }
    });

    // Pass 2: per-column lower envelope of parabolas over the squared
    // row distances.
    let len = field.len();
    let ptr = UnsafeSendPtr::new(field.data_mut().as_mut_ptr());

    let max_distance = (0..width)
        .into_par_iter()
        .map(|x| {
            // SAFETY: Each thread reads and writes only column `x`.
            let data = unsafe { std::slice::from_raw_parts_mut(ptr.get(), len) };

            let f: Vec<f64> = (0..height).map(|y| data[y * width + x] as f64).collect();
            let mut hull_vertices = vec![0usize; height];
            let mut hull_breaks = vec![0.0f64; height + 1];

            let mut k = 0usize;
            hull_vertices[0] = 0;
            hull_breaks[0] = f64::NEG_INFINITY;
            hull_breaks[1] = f64::INFINITY;

            for q in 1..height {
                let fq = f[q] + (q * q) as f64;
                loop {
                    let v = hull_vertices[k];
                    let intersection =
                        (fq - f[v] - (v * v) as f64) / (2.0 * q as f64 - 2.0 * v as f64);
                    if intersection <= hull_breaks[k] {
                        if k == 0 {
                            break;
                        }
                        k -= 1;
                    } else {
                        k += 1;
                        hull_vertices[k] = q;
                        hull_breaks[k] = intersection;
                        hull_breaks[k + 1] = f64::INFINITY;
                        break;
                    }
                }
            }

            let mut column_max = 0.0f32;
            k = 0;
            for q in 0..height {
                while hull_breaks[k + 1] < q as f64 {
                    k += 1;
                }
                let v = hull_vertices[k];
                let dq = q as f64 - v as f64;
                let distance = (dq * dq + f[v]).sqrt() as f32;
                data[q * width + x] = distance;
                column_max = column_max.max(distance);
            }
            column_max
        })
        .reduce(|| 0.0f32, f32::max);

    max_distance
}
