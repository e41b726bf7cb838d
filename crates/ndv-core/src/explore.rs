//! Keeping an explore-mode view on top of acquired data.
//!
//! Explore datasets have no fixed extent, so panning and zooming can drift the
//! view into empty space. After such a move, [`recenter_offset`] checks whether
//! the visible region still overlaps the central 80% of any tile that holds
//! data. If none does, the view is pulled back until its nearest edge touches
//! the margin band of the closest tile.
//!
//! ```text
//!   tile (col,row)                     visible region
//!   +-------------------+
//!   |  10% margin       |
//!   |   +-----------+   |
//!   |   |  central  |   |
//!   |   |    80%    |   |  <- corner-to-corner distance ->  +--------+
//!   |   +-----------+   |                                   |        |
//!   +-------------------+                                   +--------+
//! ```
//!
//! Four corner pairings are scored per tile with squared distances:
//!
//! | pairing      | tile corner | visible corner | view moves so that...            |
//! |--------------|-------------|----------------|----------------------------------|
//! | top-left     | (x1, y1)    | (x2, y2)       | its bottom-right sits at (x1, y1) |
//! | top-right    | (x2, y1)    | (x1, y2)       | its bottom-left sits at (x2, y1)  |
//! | bottom-left  | (x1, y2)    | (x2, y1)       | its top-right sits at (x1, y2)    |
//! | bottom-right | (x2, y2)    | (x1, y1)       | its top-left sits at (x2, y2)     |
//!
//! Ties keep the earliest candidate: tiles are scanned in row-major order and
//! pairings in the order listed.

use std::collections::BTreeSet;

use crate::tile::TileIndex;

/// Fraction of tile size excluded on each side when testing for overlap.
pub const TILE_MARGIN: f64 = 0.1;

/// Tiles known to contain data at the current z position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExploredTiles {
    /// Tile width in full-resolution pixels
    pub tile_width: u32,
    /// Tile height in full-resolution pixels
    pub tile_height: u32,
    /// Tiles with data, kept sorted
    pub tiles: BTreeSet<TileIndex>,
}

impl ExploredTiles {
    /// Creates a tile set.
    pub fn new(tile_width: u32, tile_height: u32, tiles: impl IntoIterator<Item = TileIndex>) -> Self {
        Self {
            tile_width,
            tile_height,
            tiles: tiles.into_iter().collect(),
        }
    }

    /// Returns `true` if no tile holds data yet.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Margin band `(x1, y1, x2, y2)` of a tile in full-resolution pixels.
    pub fn margin_band(&self, tile: TileIndex) -> [f64; 4] {
        let w = f64::from(self.tile_width);
        let h = f64::from(self.tile_height);
        [
            (TILE_MARGIN + tile.col as f64) * w,
            (TILE_MARGIN + tile.row as f64) * h,
            (1.0 - TILE_MARGIN + tile.col as f64) * w,
            (1.0 - TILE_MARGIN + tile.row as f64) * h,
        ]
    }
}

#[derive(Clone, Copy)]
enum Pairing {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Computes where the view must move to touch explored data.
///
/// `offset` and `size` describe the visible region in full-resolution pixels.
/// Returns `None` when the region already overlaps a tile's central band or
/// when no tile holds data.
pub fn recenter_offset(offset: [f64; 2], size: [f64; 2], explored: &ExploredTiles) -> Option<[f64; 2]> {
    let fov = [offset[0], offset[1], offset[0] + size[0], offset[1] + size[1]];

    let overlaps_x = |band: &[f64; 4]| fov[0] < band[2] && fov[2] > band[0];
    let overlaps_y = |band: &[f64; 4]| fov[1] < band[3] && fov[3] > band[1];

    if explored
        .tiles
        .iter()
        .map(|t| explored.margin_band(*t))
        .any(|band| overlaps_x(&band) && overlaps_y(&band))
    {
        return None;
    }

    let sq = |dx: f64, dy: f64| dx * dx + dy * dy;
    let mut best: Option<(f64, Pairing, [f64; 4])> = None;

    for tile in &explored.tiles {
        let band = explored.margin_band(*tile);
        let [x1, y1, x2, y2] = band;
        let candidates = [
            (sq(x1 - fov[2], y1 - fov[3]), Pairing::TopLeft),
            (sq(x2 - fov[0], y1 - fov[3]), Pairing::TopRight),
            (sq(x1 - fov[2], y2 - fov[1]), Pairing::BottomLeft),
            (sq(x2 - fov[0], y2 - fov[1]), Pairing::BottomRight),
        ];
        for (dist, pairing) in candidates {
            if best.is_none_or(|(d, _, _)| dist < d) {
                best = Some((dist, pairing, band));
            }
        }
    }

    let (_, pairing, band) = best?;
    let [x1, y1, x2, y2] = band;
    let (mut x, mut y) = match pairing {
        Pairing::TopLeft => (x1 - size[0], y1 - size[1]),
        Pairing::TopRight => (x2, y1 - size[1]),
        Pairing::BottomLeft => (x1 - size[0], y2),
        Pairing::BottomRight => (x2, y2),
    };
    if overlaps_x(&band) {
        x = offset[0];
    }
    if overlaps_y(&band) {
        y = offset[1];
    }
    Some([x, y])
}
