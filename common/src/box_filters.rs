//! Sliding-window box filters.
//!
//! In-place separable windowed means over single-channel f32 buffers. The
//! window is clipped to the buffer bounds, so it shrinks near the edges and
//! every output stays a true arithmetic mean of the covered pixels. Cost is
//! O(1) per pixel regardless of radius thanks to running sums.

use rayon::prelude::*;

use crate::parallel::UnsafeSendPtr;

/// In-place box mean over `buf` (`width` x `height`), repeated `iterations`
/// times. Each output pixel is the mean of the `(2*radius+1)^2` window
/// clipped to the buffer bounds.
pub fn box_mean(buf: &mut [f32], width: usize, height: usize, radius: usize, iterations: usize) {
    box_mean_impl::<false>(buf, width, height, radius, iterations);
}

/// Kahan-compensated variant of [`box_mean`].
///
/// The running sums accumulate a correction term, keeping results stable
/// when many iterations are stacked on large windows.
pub fn box_mean_compensated(
    buf: &mut [f32],
    width: usize,
    height: usize,
    radius: usize,
    iterations: usize,
) {
    box_mean_impl::<true>(buf, width, height, radius, iterations);
}

fn box_mean_impl<const COMPENSATED: bool>(
    buf: &mut [f32],
    width: usize,
    height: usize,
    radius: usize,
    iterations: usize,
) {
    assert_eq!(
        buf.len(),
        width * height,
        "buffer length must equal width * height"
    );
    if radius == 0 || iterations == 0 || buf.is_empty() {
        return;
    }

    for _ in 0..iterations {
        blur_horizontal::<COMPENSATED>(buf, width, radius);
        blur_vertical::<COMPENSATED>(buf, width, height, radius);
    }
}

/// Running-sum accumulator, optionally Kahan-compensated.
struct RunningSum<const COMPENSATED: bool> {
    sum: f32,
    correction: f32,
    hits: f32,
}

impl<const COMPENSATED: bool> RunningSum<COMPENSATED> {
    #[inline]
    fn new() -> Self {
        Self {
            sum: 0.0,
            correction: 0.0,
            hits: 0.0,
        }
    }

    #[inline]
    fn add(&mut self, value: f32) {
        if COMPENSATED {
            let y = value - self.correction;
            let t = self.sum + y;
            self.correction = (t - self.sum) - y;
            self.sum = t;
        } else {
            self.sum += value;
        }
        self.hits += 1.0;
    }

    #[inline]
    fn remove(&mut self, value: f32) {
        if COMPENSATED {
            let y = -value - self.correction;
            let t = self.sum + y;
            self.correction = (t - self.sum) - y;
            self.sum = t;
        } else {
            self.sum -= value;
        }
        self.hits -= 1.0;
    }

    #[inline]
    fn mean(&self) -> f32 {
        self.sum / self.hits
    }
}

fn blur_horizontal<const COMPENSATED: bool>(buf: &mut [f32], width: usize, radius: usize) {
    buf.par_chunks_mut(width).for_each(|row| {
        let mut scanline = vec![0.0f32; width];
        let mut acc = RunningSum::<COMPENSATED>::new();
        let r = radius as isize;
        let w = width as isize;

        for x in -r..w {
            let trailing = x - r - 1;
            let leading = x + r;
            if trailing >= 0 {
                acc.remove(row[trailing as usize]);
            }
            if leading < w {
                acc.add(row[leading as usize]);
            }
            if x >= 0 {
                scanline[x as usize] = acc.mean();
            }
        }

        row.copy_from_slice(&scanline);
    });
}

fn blur_vertical<const COMPENSATED: bool>(
    buf: &mut [f32],
    width: usize,
    height: usize,
    radius: usize,
) {
    let len = buf.len();
    let ptr = UnsafeSendPtr::new(buf.as_mut_ptr());

    (0..width).into_par_iter().for_each(|x| {
        // SAFETY: Each thread reads and writes only column `x`.
        let data = unsafe { std::slice::from_raw_parts_mut(ptr.get(), len) };

        let mut scanline = vec![0.0f32; height];
        let mut acc = RunningSum::<COMPENSATED>::new();
        let r = radius as isize;
        let h = height as isize;

        for y in -r..h {
            let trailing = y - r - 1;
            let leading = y + r;
            if trailing >= 0 {
                acc.remove(data[trailing as usize * width + x]);
            }
            if leading < h {
                acc.add(data[leading as usize * width + x]);
            }
            if y >= 0 {
                scanline[y as usize] = acc.mean();
            }
        }

        for (y, value) in scanline.iter().enumerate() {
            data[y * width + x] = *value;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    /// Brute-force reference: mean over the clipped window.
    fn reference_box_mean(buf: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
        let r = radius as isize;
        let mut out = vec![0.0f32; buf.len()];
        for y in 0..height as isize {
            for x in 0..width as isize {
                let mut sum = 0.0;
                let mut hits = 0.0;
                for dy in -r..=r {
                    for dx in -r..=r {
                        let (sx, sy) = (x + dx, y + dy);
                        if sx >= 0 && sx < width as isize && sy >= 0 && sy < height as isize {
                            sum += buf[sy as usize * width + sx as usize];
                            hits += 1.0;
                        }
                    }
                }
                out[y as usize * width + x as usize] = sum / hits;
            }
        }
        out
    }

    fn random_buffer(width: usize, height: usize, seed: u64) -> Vec<f32> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..width * height).map(|_| rng.random::<f32>()).collect()
    }

    #[test]
    fn test_box_mean_matches_reference() {
        let (w, h) = (17, 13);
        let src = random_buffer(w, h, 7);
        for radius in [1, 2, 4] {
            let mut buf = src.clone();
            box_mean(&mut buf, w, h, radius, 1);
            let expected = reference_box_mean(&src, w, h, radius);
            for (got, want) in buf.iter().zip(expected.iter()) {
                assert!(
                    (got - want).abs() < 1e-4,
                    "radius {}: got {} want {}",
                    radius,
                    got,
                    want
                );
            }
        }
    }

    #[test]
    fn test_box_mean_radius_zero_is_identity() {
        let (w, h) = (8, 6);
        let src = random_buffer(w, h, 11);
        let mut buf = src.clone();
        box_mean(&mut buf, w, h, 0, 3);
        assert_eq!(buf, src);
    }

    #[test]
    fn test_box_mean_constant_stays_constant() {
        let (w, h) = (32, 32);
        let mut buf = vec![0.75f32; w * h];
        box_mean(&mut buf, w, h, 5, 3);
        for v in &buf {
            assert!((v - 0.75).abs() < 1e-5);
        }
    }

    #[test]
    fn test_box_mean_radius_larger_than_image() {
        let (w, h) = (4, 3);
        let src = random_buffer(w, h, 3);
        let mut buf = src.clone();
        box_mean(&mut buf, w, h, 10, 1);
        // every window covers the full image: all outputs equal the global mean
        let global: f32 = src.iter().sum::<f32>() / src.len() as f32;
        for v in &buf {
            assert!((v - global).abs() < 1e-4);
        }
    }

    #[test]
    fn test_compensated_matches_plain() {
        let (w, h) = (21, 19);
        let src = random_buffer(w, h, 23);
        let mut plain = src.clone();
        let mut comp = src;
        box_mean(&mut plain, w, h, 3, 4);
        box_mean_compensated(&mut comp, w, h, 3, 4);
        for (a, b) in plain.iter().zip(comp.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    #[should_panic(expected = "buffer length must equal width * height")]
    fn test_box_mean_bad_dimensions() {
        let mut buf = vec![0.0f32; 10];
        box_mean(&mut buf, 3, 4, 1, 1);
    }
}
