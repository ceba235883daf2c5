use common::Buffer2;

use super::*;

const BORDER: usize = 4;

/// Build a mask with the given interior pixels set, surrounded by the
/// standard border margin.
fn mask_with(interior_w: usize, interior_h: usize, points: &[(usize, usize)]) -> Buffer2<u8> {
    let width = interior_w + 2 * BORDER;
    let height = interior_h + 2 * BORDER;
    let mut mask = Buffer2::new_filled(width, height, 0u8);
    for (x, y) in points {
        mask[(x + BORDER, y + BORDER)] = 1;
    }
    mask
}

fn segmentized(mask: &Buffer2<u8>, cap: usize) -> SegmentMap {
    let mut map = SegmentMap::from_mask(mask, BORDER, cap).unwrap();
    map.segmentize();
    map
}

#[test]
fn test_single_blob() {
    let mask = mask_with(12, 12, &[(5, 5), (6, 5), (5, 6)]);
    let map = segmentized(&mask, 64);

    assert_eq!(map.num_segments(), 1);
    let segment = map.segment(FIRST_ID);
    assert_eq!(segment.pixel_count, 3);
    assert_eq!(map.id_at(mask.index_of(5 + BORDER, 5 + BORDER)), FIRST_ID);
    assert_eq!(map.id_at(mask.index_of(6 + BORDER, 5 + BORDER)), FIRST_ID);
}

#[test]
fn test_scan_order_assigns_ids_deterministically() {
    let mask = mask_with(16, 16, &[(10, 2), (2, 5), (2, 6)]);
    let map = segmentized(&mask, 64);

    assert_eq!(map.num_segments(), 2);
    // row-major scan meets (10, 2) first
    assert_eq!(map.id_at(mask.index_of(10 + BORDER, 2 + BORDER)), FIRST_ID);
    assert_eq!(map.id_at(mask.index_of(2 + BORDER, 5 + BORDER)), FIRST_ID + 1);
}

#[test]
fn test_partition_covers_all_clipped_pixels() {
    // sparse deterministic speckle
    let mut points = Vec::new();
    for y in 0..20 {
        for x in 0..20 {
            if (x * 7 + y * 13) % 5 == 0 {
                points.push((x, y));
            }
        }
    }
    let mask = mask_with(20, 20, &points);
    let map = segmentized(&mask, 1024);

    let mut member_count = 0usize;
    for pos in 0..mask.len() {
        let clipped = mask.data()[pos] != 0;
        let id = map.id_at(pos);
        if clipped {
            // every clipped pixel belongs to exactly one segment
            assert!(id >= FIRST_ID, "clipped pixel {} unassigned", pos);
            assert!(!map.is_border(pos));
            member_count += 1;
        } else if id >= FIRST_ID {
            // unclipped pixels may only carry an id as a border mark
            assert!(map.is_border(pos));
        }
    }
    assert_eq!(member_count, points.len());
    let total: usize = map.segments.iter().map(|s| s.pixel_count).sum();
    assert_eq!(total, points.len());
}

#[test]
fn test_border_ring_marked_and_in_bbox() {
    let mask = mask_with(12, 12, &[(5, 5)]);
    let map = segmentized(&mask, 64);

    let segment = map.segment(FIRST_ID);
    assert_eq!(segment.pixel_count, 1);

    for (nx, ny) in [(4, 5), (6, 5), (5, 4), (5, 6)] {
        let pos = mask.index_of(nx + BORDER, ny + BORDER);
        assert_eq!(map.id_at(pos), FIRST_ID);
        assert!(map.is_border(pos));
        assert!(segment.bbox.contains(nx + BORDER, ny + BORDER));
    }
    // ring of a single pixel spans 3 columns: extent 2, too small to search
    assert!(!segment.searchable());
}

#[test]
fn test_searchable_for_compact_blob() {
    let points: Vec<_> = (0..3)
        .flat_map(|y| (0..3).map(move |x| (5 + x, 5 + y)))
        .collect();
    let mask = mask_with(12, 12, &points);
    let map = segmentized(&mask, 64);
    assert_eq!(map.num_segments(), 1);
    assert!(map.segment(FIRST_ID).searchable());
}

#[test]
fn test_segment_cap_leaves_overflow_unlabeled() {
    let mask = mask_with(16, 16, &[(2, 2), (10, 10)]);
    let map = segmentized(&mask, 1);

    assert_eq!(map.num_segments(), 1);
    assert!(map.cap_reached);
    let overflow = mask.index_of(10 + BORDER, 10 + BORDER);
    assert_eq!(map.ids.data()[overflow], UNLABELED);
    assert_eq!(map.id_at(overflow), 0);
}

#[test]
fn test_closing_bridges_nearby_blobs() {
    let left: Vec<_> = (0..3).flat_map(|y| (0..3).map(move |x| (2 + x, 5 + y))).collect();
    let right: Vec<_> = (0..3).flat_map(|y| (0..3).map(move |x| (7 + x, 5 + y))).collect();
    let points: Vec<_> = left.iter().chain(right.iter()).copied().collect();

    // without closing: two segments
    let mask = mask_with(14, 14, &points);
    let map = segmentized(&mask, 64);
    assert_eq!(map.num_segments(), 2);

    // closing with radius 2 bridges the 2-pixel gap
    let mut closed = SegmentMap::from_mask(&mask, BORDER, 64).unwrap();
    closed.close(2);
    closed.segmentize();
    assert_eq!(closed.num_segments(), 1);
}

#[test]
fn test_closing_erosion_restores_extent() {
    // an isolated blob must not keep growing from a close operation
    let points: Vec<_> = (0..3)
        .flat_map(|y| (0..3).map(move |x| (6 + x, 6 + y)))
        .collect();
    let mask = mask_with(15, 15, &points);
    let mut map = SegmentMap::from_mask(&mask, BORDER, 64).unwrap();
    map.close(3);
    map.segmentize();

    assert_eq!(map.num_segments(), 1);
    let segment = map.segment(FIRST_ID);
    // dilate 3 / erode 2 leaves at most one extra pixel per side, plus the
    // border ring in the bbox
    assert!(segment.bbox.width() <= 3 + 2 + 2 + 2);
    assert!(segment.pixel_count >= 9);
}

#[test]
fn test_set_reference() {
    let points: Vec<_> = (0..4)
        .flat_map(|y| (0..4).map(move |x| (4 + x, 4 + y)))
        .collect();
    let mask = mask_with(12, 12, &points);
    let mut map = segmentized(&mask, 64);

    let ref_pos = mask.index_of(3 + BORDER, 4 + BORDER);
    map.set_reference(FIRST_ID, ref_pos, 0.8, 0.6);

    let segment = map.segment(FIRST_ID);
    assert!(segment.has_candidate());
    assert_eq!(segment.reference, Some(ref_pos));
    assert_eq!(map.flags.data()[ref_pos] & FLAG_REFERENCE, FLAG_REFERENCE);
}

#[test]
fn test_derive_segment_cap_bounds() {
    assert_eq!(derive_segment_cap(0), 256);
    assert_eq!(derive_segment_cap(1_000_000), 256);
    assert_eq!(derive_segment_cap(4_000_000), 1000);
    assert_eq!(derive_segment_cap(1_000_000_000), 16384);
}
