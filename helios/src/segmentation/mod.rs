//! Connected-component segmentation of clipped regions.
//!
//! Partitions a plane's clip mask into maximal 4-connected segments, each
//! with a unique id starting at 2 (0 and 1 are reserved sentinels: background
//! and clipped-but-unlabeled). The flood fill is queue-based with an explicit
//! frontier stack, never recursive, so a fully blown sky cannot overflow the
//! call stack. While filling it tracks each segment's bounding rectangle and
//! pixel count, and marks the unclipped ring around the segment as border
//! pixels; those are where candidate search later finds its references.

mod closing;
#[cfg(test)]
mod tests;

use common::Buffer2;

use crate::error::RecoveryError;
use crate::math::Aabb;

/// Unclipped pixel, not part of any segment.
pub(crate) const BACKGROUND: u32 = 0;
/// Clipped pixel not (yet) assigned to a segment; after a cap overflow some
/// pixels keep this value permanently and take the local-average fallback.
pub(crate) const UNLABELED: u32 = 1;
/// First real segment id.
pub(crate) const FIRST_ID: u32 = 2;

/// The pixel is the unclipped border ring of its segment.
pub(crate) const FLAG_BORDER: u8 = 1 << 0;
/// The pixel is the chosen candidate reference of its segment.
pub(crate) const FLAG_REFERENCE: u8 = 1 << 1;

/// One maximal 4-connected clipped region.
#[derive(Debug, Clone)]
pub(crate) struct Segment {
    pub id: u32,
    /// Covers all member pixels plus the marked border ring.
    pub bbox: Aabb,
    /// Clipped member pixels (the border ring is not counted).
    pub pixel_count: usize,
    /// Linear position of the candidate reference, once selected.
    pub reference: Option<usize>,
    /// Magnitude candidate (companded); 0 while unset.
    pub val1: f32,
    /// Chroma candidate at the reference location.
    pub val2: f32,
}

impl Segment {
    #[inline]
    pub fn has_candidate(&self) -> bool {
        self.val1 != 0.0
    }

    /// Segments with a bbox extent of 2 or less in either axis are too small
    /// for a meaningful candidate search and skip it.
    #[inline]
    pub fn searchable(&self) -> bool {
        self.bbox.x_max - self.bbox.x_min > 2 && self.bbox.y_max - self.bbox.y_min > 2
    }
}

/// Per-plane segment labeling: id grid, flag grid, and the segment table.
#[derive(Debug)]
pub(crate) struct SegmentMap {
    pub ids: Buffer2<u32>,
    pub flags: Buffer2<u8>,
    pub segments: Vec<Segment>,
    pub border: usize,
    /// Maximum number of segment ids to assign.
    pub cap: usize,
    pub cap_reached: bool,
}

impl SegmentMap {
    /// Build an unlabeled map from a clip mask (1 = clipped). Fails only on
    /// allocation; the caller treats that as "skip this invocation".
    pub fn from_mask(
        mask: &Buffer2<u8>,
        border: usize,
        cap: usize,
    ) -> Result<Self, RecoveryError> {
        let len = mask.len();

        let mut id_data: Vec<u32> = Vec::new();
        id_data
            .try_reserve_exact(len)
            .map_err(|_| RecoveryError::AllocationFailure {
                what: "segment id map",
                bytes: len * size_of::<u32>(),
            })?;
        id_data.extend(mask.data().iter().map(|m| u32::from(*m != 0)));

        let mut flag_data: Vec<u8> = Vec::new();
        flag_data
            .try_reserve_exact(len)
            .map_err(|_| RecoveryError::AllocationFailure {
                what: "segment flag map",
                bytes: len,
            })?;
        flag_data.resize(len, 0);

        let mut segments = Vec::new();
        segments
            .try_reserve(cap.min(1024))
            .map_err(|_| RecoveryError::AllocationFailure {
                what: "segment table",
                bytes: cap.min(1024) * size_of::<Segment>(),
            })?;

        Ok(Self {
            ids: Buffer2::from_vec(mask.width(), mask.height(), id_data),
            flags: Buffer2::from_vec(mask.width(), mask.height(), flag_data),
            segments,
            border,
            cap,
            cap_reached: false,
        })
    }

    /// Morphological closing: dilate `radius` steps, erode `radius - 1`.
    /// Bridges clipped islands separated by a few pixels of sensor noise.
    /// Must run before [`SegmentMap::segmentize`].
    pub fn close(&mut self, radius: usize) {
        debug_assert!(self.segments.is_empty(), "close after segmentize");
        closing::close(&mut self.ids, self.border, radius);
    }

    /// Label all 4-connected clipped regions in row-major scan order.
    pub fn segmentize(&mut self) {
        let width = self.ids.width();
        let height = self.ids.height();
        let border = self.border;
        if width <= 2 * border || height <= 2 * border {
            return;
        }

        let mut stack: Vec<u32> = Vec::with_capacity(((width * height) / 16).max(64));

        for y in border..height - border {
            for x in border..width - border {
                let pos = y * width + x;
                if self.ids.data()[pos] != UNLABELED {
                    continue;
                }
                if self.segments.len() >= self.cap {
                    self.cap_reached = true;
                    tracing::debug!(
                        error = %RecoveryError::SegmentCapReached { cap: self.cap },
                        "remaining clipped pixels use the local-average fallback"
                    );
                    return;
                }
                let id = FIRST_ID + self.segments.len() as u32;
                let segment = self.flood(pos, id, &mut stack);
                self.segments.push(segment);
            }
        }
    }

    /// Grow one segment from `seed`, marking members and the unclipped
    /// border ring.
    fn flood(&mut self, seed: usize, id: u32, stack: &mut Vec<u32>) -> Segment {
        let width = self.ids.width();
        let height = self.ids.height();
        let border = self.border;
        let ids = self.ids.data_mut();
        let flags = self.flags.data_mut();

        let mut bbox = Aabb::empty();
        let mut pixel_count = 0usize;

        stack.clear();
        stack.push(seed as u32);

        while let Some(pos) = stack.pop() {
            let pos = pos as usize;
            if ids[pos] != UNLABELED {
                continue;
            }
            ids[pos] = id;
            pixel_count += 1;
            let x = pos % width;
            let y = pos / width;
            bbox.include(x, y);

            let neighbors = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbors {
                if nx < border || nx >= width - border || ny < border || ny >= height - border {
                    continue;
                }
                let npos = ny * width + nx;
                match ids[npos] {
                    UNLABELED => stack.push(npos as u32),
                    BACKGROUND => {
                        // unclipped neighbor: claim it as this segment's border
                        ids[npos] = id;
                        flags[npos] |= FLAG_BORDER;
                        bbox.include(nx, ny);
                    }
                    _ => {}
                }
            }
        }

        Segment {
            id,
            bbox,
            pixel_count,
            reference: None,
            val1: 0.0,
            val2: 0.0,
        }
    }

    /// Segment id at a linear position; 0 for background, unlabeled
    /// overflow, and out-of-table values.
    #[inline]
    pub fn id_at(&self, pos: usize) -> u32 {
        let id = self.ids.data()[pos];
        if id >= FIRST_ID && ((id - FIRST_ID) as usize) < self.segments.len() {
            id
        } else {
            0
        }
    }

    #[inline]
    pub fn segment(&self, id: u32) -> &Segment {
        &self.segments[(id - FIRST_ID) as usize]
    }

    #[inline]
    pub fn segment_mut(&mut self, id: u32) -> &mut Segment {
        &mut self.segments[(id - FIRST_ID) as usize]
    }

    #[inline]
    pub fn is_border(&self, pos: usize) -> bool {
        self.flags.data()[pos] & FLAG_BORDER != 0
    }

    /// True when `pos` is a clipped member of segment `id` (the unclipped
    /// border ring carries the id too, but is not a member).
    #[inline]
    pub fn is_member(&self, pos: usize, id: u32) -> bool {
        self.ids.data()[pos] == id && self.flags.data()[pos] & FLAG_BORDER == 0
    }

    /// Record the candidate reference chosen for `id`.
    pub fn set_reference(&mut self, id: u32, pos: usize, val1: f32, val2: f32) {
        self.flags.data_mut()[pos] |= FLAG_REFERENCE;
        let segment = self.segment_mut(id);
        segment.reference = Some(pos);
        segment.val1 = val1;
        segment.val2 = val2;
    }

    #[inline]
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }
}

/// Derive the segment id cap from mosaic area: 250 ids per megapixel,
/// clamped into `[256, 16384]`.
pub(crate) fn derive_segment_cap(mosaic_pixels: usize) -> usize {
    use crate::constants::{MAX_SEGMENT_CAP, MIN_SEGMENT_CAP, SEGMENTS_PER_MEGAPIXEL};
    (mosaic_pixels * SEGMENTS_PER_MEGAPIXEL / 1_000_000).clamp(MIN_SEGMENT_CAP, MAX_SEGMENT_CAP)
}
