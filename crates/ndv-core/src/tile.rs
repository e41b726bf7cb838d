//! Tile grid addressing.

use std::cmp::Ordering;

/// Column/row address of a tile in the full-resolution grid.
///
/// Indices are signed: explore-mode datasets place tiles on both sides of the
/// origin. Ordering is row-major (row first, then column), which gives a
/// stable iteration order for anything that scans tile sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileIndex {
    /// Column (x direction)
    pub col: i64,
    /// Row (y direction)
    pub row: i64,
}

impl TileIndex {
    /// Creates a tile index.
    #[inline]
    pub const fn new(col: i64, row: i64) -> Self {
        Self { col, row }
    }

    /// Tile containing the full-resolution pixel `(x, y)`.
    ///
    /// Uses floor division, so pixel `-1` lands in tile `-1`, not tile `0`.
    ///
    /// ```rust
    /// use ndv_core::TileIndex;
    ///
    /// assert_eq!(TileIndex::containing(-1, -1, 256, 256), TileIndex::new(-1, -1));
    /// assert_eq!(TileIndex::containing(256, 255, 256, 256), TileIndex::new(1, 0));
    /// ```
    #[inline]
    pub fn containing(x: i64, y: i64, tile_width: u32, tile_height: u32) -> Self {
        Self {
            col: x.div_euclid(i64::from(tile_width)),
            row: y.div_euclid(i64::from(tile_height)),
        }
    }

    /// Full-resolution pixel origin of this tile.
    #[inline]
    pub const fn origin(&self, tile_width: u32, tile_height: u32) -> (i64, i64) {
        (self.col * tile_width as i64, self.row * tile_height as i64)
    }
}

impl Ord for TileIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row.cmp(&other.row).then(self.col.cmp(&other.col))
    }
}

impl PartialOrd for TileIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for TileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_division_both_sides() {
        assert_eq!(TileIndex::containing(0, 0, 512, 512), TileIndex::new(0, 0));
        assert_eq!(TileIndex::containing(511, 511, 512, 512), TileIndex::new(0, 0));
        assert_eq!(TileIndex::containing(-512, -513, 512, 512), TileIndex::new(-1, -2));
    }

    #[test]
    fn row_major_order() {
        let mut tiles = vec![
            TileIndex::new(1, 1),
            TileIndex::new(5, 0),
            TileIndex::new(-3, 1),
        ];
        tiles.sort();
        assert_eq!(
            tiles,
            vec![TileIndex::new(5, 0), TileIndex::new(-3, 1), TileIndex::new(1, 1)]
        );
    }

    #[test]
    fn origin_scales_by_tile_size() {
        assert_eq!(TileIndex::new(-2, 3).origin(256, 128), (-512, 384));
    }
}
