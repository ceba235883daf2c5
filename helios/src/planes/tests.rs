use common::Buffer2;

use super::*;
use crate::cfa::{BayerPattern, CfaColor, CfaPattern};
use crate::math::compand;
use crate::region::Region;

fn cube_clips(clip: f32, wb: [f32; 3]) -> [f32; 3] {
    [
        compand(clip * wb[0]),
        compand(clip * wb[1]),
        compand(clip * wb[2]),
    ]
}

fn flat_mosaic(width: usize, height: usize, value: f32) -> Buffer2<f32> {
    Buffer2::new_filled(width, height, value)
}

#[test]
fn test_bayer_plane_geometry() {
    let mosaic = flat_mosaic(16, 12, 0.25);
    let region = Region::full(16, 12);
    let (set, _) = extract_planes(
        &mosaic,
        region,
        CfaPattern::Bayer(BayerPattern::Rggb),
        cube_clips(1.0, [1.0; 3]),
    );

    assert_eq!(set.planes.len(), 4);
    assert_eq!(set.width, 8 + 2 * set.border);
    assert_eq!(set.height, 6 + 2 * set.border);
    assert_eq!(
        set.colors,
        vec![
            CfaColor::Red,
            CfaColor::Green,
            CfaColor::Green,
            CfaColor::Blue
        ]
    );

    // photosite (0,0) is red and feeds plane 0; (0,1) feeds plane 1
    assert_eq!(set.plane_index(0, 0), 0);
    assert_eq!(set.plane_index(0, 1), 1);
    assert_eq!(set.plane_index(1, 0), 2);
    assert_eq!(set.plane_index(1, 1), 3);
    // photosites of one 2x2 cell share a plane position
    assert_eq!(set.plane_pos(0, 0), set.plane_pos(1, 1));
    assert_ne!(set.plane_pos(0, 0), set.plane_pos(0, 2));
}

#[test]
fn test_bayer_flat_field_values_and_refavg() {
    let value = 0.2f32;
    let mosaic = flat_mosaic(16, 16, value);
    let region = Region::full(16, 16);
    let (set, clip) = extract_planes(
        &mosaic,
        region,
        CfaPattern::Bayer(BayerPattern::Rggb),
        cube_clips(1.0, [1.0; 3]),
    );

    let expected = compand(value);
    let o = set.plane_pos(4, 4);
    for p in 0..4 {
        assert!(
            (set.planes[p].data()[o] - expected).abs() < 1e-6,
            "plane {}",
            p
        );
        // flat gray field: opponent-channel mean equals the value itself
        assert!(
            (set.refavg[p].data()[o] - expected).abs() < 1e-6,
            "refavg {}",
            p
        );
    }
    assert_eq!(clip.clipped_count, 0);
    assert!(!clip.has_all_clipped);
}

#[test]
fn test_clip_masks_and_all_clipped() {
    let mut mosaic = flat_mosaic(16, 16, 0.2);
    // saturate one full 2x2 cell and the red of another
    for (col, row) in [(4, 4), (5, 4), (4, 5), (5, 5)] {
        mosaic[(col, row)] = 1.0;
    }
    mosaic[(8, 4)] = 1.0; // red photosite of cell (4,2)

    let region = Region::full(16, 16);
    let (set, clip) = extract_planes(
        &mosaic,
        region,
        CfaPattern::Bayer(BayerPattern::Rggb),
        cube_clips(0.9, [1.0; 3]),
    );

    let full_cell = set.plane_pos(4, 4);
    for p in 0..4 {
        assert_eq!(clip.masks[p].data()[full_cell], 1, "plane {}", p);
    }
    assert_eq!(clip.all_clipped.data()[full_cell], 1);
    assert!(clip.has_all_clipped);

    let partial_cell = set.plane_pos(4, 8);
    assert_eq!(clip.masks[0].data()[partial_cell], 1);
    assert_eq!(clip.masks[1].data()[partial_cell], 0);
    assert_eq!(clip.all_clipped.data()[partial_cell], 0);

    assert_eq!(clip.clipped_count, 5);
}

#[test]
fn test_xtrans_flat_field() {
    let value = 0.3f32;
    let mosaic = flat_mosaic(18, 18, value);
    let region = Region::full(18, 18);
    let (set, clip) = extract_planes(
        &mosaic,
        region,
        CfaPattern::xtrans(),
        cube_clips(1.0, [1.0; 3]),
    );

    assert_eq!(set.planes.len(), 3);
    assert_eq!(set.cell, 3);
    let o = set.plane_pos(4, 4);
    let expected = compand(value);
    for p in 0..3 {
        assert!((set.planes[p].data()[o] - expected).abs() < 1e-6);
    }
    assert_eq!(clip.clipped_count, 0);
}

#[test]
fn test_sibling_green() {
    let mosaic = flat_mosaic(8, 8, 0.1);
    let (set, _) = extract_planes(
        &mosaic,
        Region::full(8, 8),
        CfaPattern::Bayer(BayerPattern::Rggb),
        cube_clips(1.0, [1.0; 3]),
    );
    assert_eq!(set.sibling_green(1), Some(2));
    assert_eq!(set.sibling_green(2), Some(1));
    assert_eq!(set.sibling_green(0), None);
    assert_eq!(set.sibling_green(3), None);
}

#[test]
fn test_luminance_proxy_flat_field() {
    let value = 0.4f32;
    let mosaic = flat_mosaic(16, 16, value);
    let (set, _) = extract_planes(
        &mosaic,
        Region::full(16, 16),
        CfaPattern::Bayer(BayerPattern::Rggb),
        cube_clips(1.0, [1.0; 3]),
    );

    let lum = set.luminance_proxy([1.0, 1.0, 1.0]);
    let o = set.plane_pos(8, 8);
    assert!((lum.data()[o] - compand(value)).abs() < 1e-5);
}

#[test]
fn test_refavg_at_uses_opponent_channels() {
    // red photosites bright, greens/blues dim: a red location's reference
    // must reflect only green/blue
    let mut mosaic = flat_mosaic(12, 12, 0.1);
    let pattern = CfaPattern::Bayer(BayerPattern::Rggb);
    for row in 0..12 {
        for col in 0..12 {
            if pattern.color_at(row, col) == CfaColor::Red {
                mosaic[(col, row)] = 0.9;
            }
        }
    }

    let region = Region::full(12, 12);
    let reference = refavg_at(&mosaic, &pattern, region, 4, 4);
    assert!(
        (reference - compand(0.1)).abs() < 1e-6,
        "red reference {} should ignore red values",
        reference
    );
}

#[test]
fn test_extend_border_mirrors_interior() {
    let border = 3;
    let width = 10 + 2 * border;
    let height = 8 + 2 * border;
    let mut buf = Buffer2::new_filled(width, height, 0.0f32);
    for y in border..height - border {
        for x in border..width - border {
            buf[(x, y)] = (y * width + x) as f32;
        }
    }

    extend_border(&mut buf, border);

    // horizontal mirror: first border column reflects first interior columns
    assert_eq!(buf[(border - 1, border)], buf[(border, border)]);
    assert_eq!(buf[(border - 2, border)], buf[(border + 1, border)]);
    assert_eq!(buf[(width - border, border)], buf[(width - border - 1, border)]);
    // vertical mirror
    assert_eq!(buf[(border, border - 1)], buf[(border, border)]);
    assert_eq!(buf[(border, height - border)], buf[(border, height - border - 1)]);
    // corners are filled too (no zeros left anywhere)
    assert!(buf.data().iter().all(|v| *v > 0.0));
}
