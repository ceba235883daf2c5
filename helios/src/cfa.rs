//! Color filter array descriptors.
//!
//! Maps photosite coordinates to sensor colors for the two supported mosaic
//! families: 2x2 Bayer patterns and the 6x6 X-Trans pattern. The super-pixel
//! geometry (2x2 for Bayer, 3x3 for X-Trans) drives how photosites fold into
//! the per-channel reconstruction planes.

use serde::{Deserialize, Serialize};

/// Sensor color of a single photosite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfaColor {
    Red,
    Green,
    Blue,
}

impl CfaColor {
    /// Index into `[f32; 3]` coefficient triples (white balance, clips).
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            CfaColor::Red => 0,
            CfaColor::Green => 1,
            CfaColor::Blue => 2,
        }
    }
}

/// The four 2x2 Bayer orderings, named by their top-left cell reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BayerPattern {
    #[default]
    Rggb,
    Bggr,
    Grbg,
    Gbrg,
}

impl BayerPattern {
    /// The 2x2 cell as rows of colors.
    #[inline]
    pub const fn cell(self) -> [[CfaColor; 2]; 2] {
        use CfaColor::{Blue as B, Green as G, Red as R};
        match self {
            BayerPattern::Rggb => [[R, G], [G, B]],
            BayerPattern::Bggr => [[B, G], [G, R]],
            BayerPattern::Grbg => [[G, R], [B, G]],
            BayerPattern::Gbrg => [[G, B], [R, G]],
        }
    }

    #[inline]
    pub const fn color_at(self, row: usize, col: usize) -> CfaColor {
        self.cell()[row % 2][col % 2]
    }
}

/// Canonical Fuji X-Trans 6x6 layout (20 green, 8 red, 8 blue photosites).
pub const XTRANS_STANDARD: [[CfaColor; 6]; 6] = {
    use CfaColor::{Blue as B, Green as G, Red as R};
    [
        [G, B, G, G, R, G],
        [R, G, R, B, G, B],
        [G, B, G, G, R, G],
        [G, R, G, G, B, G],
        [B, G, B, R, G, R],
        [G, R, G, G, B, G],
    ]
};

/// Mosaic pattern descriptor consumed by the reconstruction engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfaPattern {
    Bayer(BayerPattern),
    XTrans([[CfaColor; 6]; 6]),
}

impl CfaPattern {
    /// The standard X-Trans layout.
    pub const fn xtrans() -> Self {
        CfaPattern::XTrans(XTRANS_STANDARD)
    }

    /// Sensor color of the photosite at `(row, col)`.
    #[inline]
    pub fn color_at(&self, row: usize, col: usize) -> CfaColor {
        match self {
            CfaPattern::Bayer(pattern) => pattern.color_at(row, col),
            CfaPattern::XTrans(matrix) => matrix[row % 6][col % 6],
        }
    }

    /// Super-pixel edge length: 2 for Bayer, 3 for X-Trans.
    #[inline]
    pub const fn cell_size(&self) -> usize {
        match self {
            CfaPattern::Bayer(_) => 2,
            CfaPattern::XTrans(_) => 3,
        }
    }

    /// Number of reconstruction planes: one per photosite position for Bayer
    /// (R/G1/G2/B), one per color for super-pixel-averaged X-Trans.
    #[inline]
    pub const fn plane_count(&self) -> usize {
        match self {
            CfaPattern::Bayer(_) => 4,
            CfaPattern::XTrans(_) => 3,
        }
    }
}

impl Default for CfaPattern {
    fn default() -> Self {
        CfaPattern::Bayer(BayerPattern::Rggb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bayer_rggb_layout() {
        let p = BayerPattern::Rggb;
        assert_eq!(p.color_at(0, 0), CfaColor::Red);
        assert_eq!(p.color_at(0, 1), CfaColor::Green);
        assert_eq!(p.color_at(1, 0), CfaColor::Green);
        assert_eq!(p.color_at(1, 1), CfaColor::Blue);
        // pattern repeats with period 2
        assert_eq!(p.color_at(2, 2), CfaColor::Red);
        assert_eq!(p.color_at(3, 3), CfaColor::Blue);
    }

    #[test]
    fn test_bayer_orderings_differ() {
        assert_eq!(BayerPattern::Bggr.color_at(0, 0), CfaColor::Blue);
        assert_eq!(BayerPattern::Grbg.color_at(0, 1), CfaColor::Red);
        assert_eq!(BayerPattern::Gbrg.color_at(1, 0), CfaColor::Red);
    }

    #[test]
    fn test_every_bayer_cell_has_two_greens() {
        for pattern in [
            BayerPattern::Rggb,
            BayerPattern::Bggr,
            BayerPattern::Grbg,
            BayerPattern::Gbrg,
        ] {
            let greens = pattern
                .cell()
                .iter()
                .flatten()
                .filter(|c| **c == CfaColor::Green)
                .count();
            assert_eq!(greens, 2, "{:?}", pattern);
        }
    }

    #[test]
    fn test_xtrans_color_counts() {
        let mut counts = [0usize; 3];
        for row in 0..6 {
            for col in 0..6 {
                counts[XTRANS_STANDARD[row][col].index()] += 1;
            }
        }
        assert_eq!(counts, [8, 20, 8]);
    }

    #[test]
    fn test_pattern_geometry() {
        let bayer = CfaPattern::default();
        assert_eq!(bayer.cell_size(), 2);
        assert_eq!(bayer.plane_count(), 4);

        let xtrans = CfaPattern::xtrans();
        assert_eq!(xtrans.cell_size(), 3);
        assert_eq!(xtrans.plane_count(), 3);
        assert_eq!(xtrans.color_at(6, 6), xtrans.color_at(0, 0));
    }
}
