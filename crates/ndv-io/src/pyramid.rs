//! Pyramid construction and region assembly helpers.
//!
//! Each new full-resolution tile is folded into its ancestors one level at a
//! time: a 2x box filter halves the child, and the result fills one quadrant
//! of the parent tile.
//!
//! ```text
//!   level l-1: child (c, r)        level l: parent (c div 2, r div 2)
//!   +-------+                      +---+---+
//!   |       |  -- 2x box -->       | q | q |   quadrant = (c mod 2, r mod 2)
//!   |       |                      +---+---+
//!   +-------+                      | q | q |
//!                                  +---+---+
//! ```

use rayon::prelude::*;

use ndv_core::{Rect, TileIndex};

/// Halves an image with a 2x2 box filter (rounded mean).
///
/// `width` and `height` must be even.
pub fn downsample_2x(src: &[u16], width: u32, height: u32) -> Vec<u16> {
    let (w, h) = (width as usize, height as usize);
    let (dw, dh) = (w / 2, h / 2);
    let mut dst = vec![0u16; dw * dh];
    if dw == 0 || dh == 0 {
        return dst;
    }

    dst.par_chunks_mut(dw).enumerate().for_each(|(y, row)| {
        let top = &src[(2 * y) * w..(2 * y + 1) * w];
        let bottom = &src[(2 * y + 1) * w..(2 * y + 2) * w];
        for (x, out) in row.iter_mut().enumerate() {
            let sum = u32::from(top[2 * x])
                + u32::from(top[2 * x + 1])
                + u32::from(bottom[2 * x])
                + u32::from(bottom[2 * x + 1]);
            *out = ((sum + 2) / 4) as u16;
        }
    });
    dst
}

/// Parent tile one level up and the child's quadrant within it.
#[inline]
pub fn parent_of(tile: TileIndex) -> (TileIndex, (u32, u32)) {
    (
        TileIndex::new(tile.col.div_euclid(2), tile.row.div_euclid(2)),
        (tile.col.rem_euclid(2) as u32, tile.row.rem_euclid(2) as u32),
    )
}

/// Tile at `level` that contains full-resolution tile `tile`.
#[inline]
pub fn ancestor_at(tile: TileIndex, level: u32) -> TileIndex {
    let n = 1i64 << level;
    TileIndex::new(tile.col.div_euclid(n), tile.row.div_euclid(n))
}

/// Writes `src` (`src_w` x `src_h`) into `dst` (`dst_w` wide) at `(x, y)`.
pub fn blit(dst: &mut [u16], dst_w: u32, src: &[u16], src_w: u32, src_h: u32, x: u32, y: u32) {
    let (dw, sw) = (dst_w as usize, src_w as usize);
    for row in 0..src_h as usize {
        let d = (y as usize + row) * dw + x as usize;
        dst[d..d + sw].copy_from_slice(&src[row * sw..(row + 1) * sw]);
    }
}

/// Copies the part of a tile that overlaps `out_rect` into `out`.
///
/// `tile_rect` and `out_rect` are in the same level's pixel space; `out` is
/// row-major over `out_rect`. Returns `false` if they do not overlap.
pub fn copy_overlap(tile: &[u16], tile_rect: Rect, out: &mut [u16], out_rect: Rect) -> bool {
    let Some(overlap) = tile_rect.intersect(&out_rect) else {
        return false;
    };
    let tw = tile_rect.width as usize;
    let ow = out_rect.width as usize;
    let len = overlap.width as usize;
    for y in overlap.y..overlap.bottom() {
        let src = (y - tile_rect.y) as usize * tw + (overlap.x - tile_rect.x) as usize;
        let dst = (y - out_rect.y) as usize * ow + (overlap.x - out_rect.x) as usize;
        out[dst..dst + len].copy_from_slice(&tile[src..src + len]);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsample_box_mean() {
        #[rustfmt::skip]
        let data = vec![
            1, 2, 3, 4,
            5, 6, 7, 8,
            9, 10, 11, 12,
            13, 14, 15, 16,
        ];
        let half = downsample_2x(&data, 4, 4);
        // (1+2+5+6)/4 = 3.5 rounds up.
        assert_eq!(half, vec![4, 6, 12, 14]);
    }

    #[test]
    fn downsample_saturated_stays_saturated() {
        let data = vec![u16::MAX; 16];
        assert_eq!(downsample_2x(&data, 4, 4), vec![u16::MAX; 4]);
    }

    #[test]
    fn parents_floor_toward_negative() {
        assert_eq!(parent_of(TileIndex::new(-1, 3)), (TileIndex::new(-1, 1), (1, 1)));
        assert_eq!(parent_of(TileIndex::new(4, -4)), (TileIndex::new(2, -2), (0, 0)));
        assert_eq!(ancestor_at(TileIndex::new(-5, 9), 2), TileIndex::new(-2, 2));
        assert_eq!(ancestor_at(TileIndex::new(7, 7), 0), TileIndex::new(7, 7));
    }

    #[test]
    fn blit_into_quadrant() {
        let mut dst = vec![0u16; 16];
        blit(&mut dst, 4, &[1, 2, 3, 4], 2, 2, 2, 2);
        assert_eq!(&dst[10..12], &[1, 2]);
        assert_eq!(&dst[14..16], &[3, 4]);
        assert_eq!(dst.iter().filter(|v| **v != 0).count(), 4);
    }

    #[test]
    fn copy_overlap_partial() {
        let tile: Vec<u16> = (0..16).collect();
        let tile_rect = Rect::new(0, 0, 4, 4);
        let out_rect = Rect::new(2, -1, 4, 2);
        let mut out = vec![0u16; 8];
        assert!(copy_overlap(&tile, tile_rect, &mut out, out_rect));
        // Row y=-1 is outside the tile, row y=0 gets tile[2..4].
        assert_eq!(out, vec![0, 0, 0, 0, 2, 3, 0, 0]);
        assert!(!copy_overlap(&tile, tile_rect, &mut out, Rect::new(10, 10, 1, 1)));
    }
}
