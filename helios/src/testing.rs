//! Synthetic test data for the reconstruction pipeline.

#![allow(dead_code)]

use common::Buffer2;

use crate::cfa::{CfaColor, CfaPattern};

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub(crate) fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Build a mosaic by sampling a per-photosite scene function.
pub(crate) fn mosaic_from_scene(
    width: usize,
    height: usize,
    pattern: &CfaPattern,
    scene: impl Fn(usize, usize, CfaColor) -> f32,
) -> Buffer2<f32> {
    let mut mosaic = Buffer2::new_filled(width, height, 0.0f32);
    for row in 0..height {
        for col in 0..width {
            mosaic[(col, row)] = scene(row, col, pattern.color_at(row, col));
        }
    }
    mosaic
}

/// Flat gray mosaic.
pub(crate) fn flat_mosaic(width: usize, height: usize, value: f32) -> Buffer2<f32> {
    Buffer2::new_filled(width, height, value)
}

/// A smooth linear gradient with a fully saturated axis-aligned block.
pub(crate) fn block_over_gradient(
    width: usize,
    height: usize,
    pattern: &CfaPattern,
    block: (usize, usize, usize, usize),
    base: f32,
    slope: f32,
    saturated: f32,
) -> Buffer2<f32> {
    let (bx, by, bw, bh) = block;
    mosaic_from_scene(width, height, pattern, |row, col, _| {
        if col >= bx && col < bx + bw && row >= by && row < by + bh {
            saturated
        } else {
            base + slope * (row + col) as f32
        }
    })
}

/// A smooth linear gradient with a fully saturated centered disc.
pub(crate) fn disc_over_gradient(
    width: usize,
    height: usize,
    pattern: &CfaPattern,
    radius: f32,
    base: f32,
    slope: f32,
    saturated: f32,
) -> Buffer2<f32> {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    mosaic_from_scene(width, height, pattern, |row, col, _| {
        let dx = col as f32 + 0.5 - cx;
        let dy = row as f32 + 0.5 - cy;
        if dx * dx + dy * dy <= radius * radius {
            saturated
        } else {
            base + slope * (row + col) as f32
        }
    })
}
