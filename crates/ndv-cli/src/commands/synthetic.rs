//! Deterministic synthetic tile data.
//!
//! Each channel is a field of gaussian "cells" on a jittered grid plus a
//! little background noise. Values depend only on the global pixel position,
//! so neighbouring tiles line up and repeated runs produce identical output.

use rayon::prelude::*;

use ndv_core::TileIndex;

/// Spacing of the cell grid in full-resolution pixels.
const CELL_PITCH: i64 = 48;

/// SplitMix64 finalizer.
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn hash(channel: usize, a: i64, b: i64) -> u64 {
    mix(mix(mix(channel as u64) ^ a as u64) ^ b as u64)
}

/// Uniform value in `[0, 1)`.
fn unit(h: u64) -> f64 {
    (h >> 11) as f64 / (1u64 << 53) as f64
}

/// Intensity in `[0, 1]` at a global pixel position.
fn sample(channel: usize, x: i64, y: i64) -> f64 {
    let cx = x.div_euclid(CELL_PITCH);
    let cy = y.div_euclid(CELL_PITCH);
    let sigma = 6.0 + 2.0 * channel as f64;
    let mut peak = 0.0f64;
    for ny in cy - 1..=cy + 1 {
        for nx in cx - 1..=cx + 1 {
            let h = hash(channel, nx, ny);
            // Not every grid cell holds a cell.
            if unit(h) < 0.3 {
                continue;
            }
            let jx = unit(mix(h ^ 1)) * CELL_PITCH as f64;
            let jy = unit(mix(h ^ 2)) * CELL_PITCH as f64;
            let dx = x as f64 - (nx * CELL_PITCH) as f64 - jx;
            let dy = y as f64 - (ny * CELL_PITCH) as f64 - jy;
            let brightness = 0.5 + 0.5 * unit(mix(h ^ 3));
            peak = peak.max(brightness * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp());
        }
    }
    let noise = 0.04 * unit(hash(channel + 17, x, y));
    (peak + noise).min(1.0)
}

/// Row-major samples of one full-resolution tile.
pub fn tile_pixels(channel: usize, tile: TileIndex, tile_width: u32, tile_height: u32, bit_depth: u8) -> Vec<u16> {
    let max = ((1u32 << bit_depth.clamp(1, 16)) - 1) as f64;
    let (x0, y0) = tile.origin(tile_width, tile_height);
    let mut data = vec![0u16; tile_width as usize * tile_height as usize];
    data.par_chunks_mut(tile_width as usize)
        .enumerate()
        .for_each(|(row, line)| {
            let y = y0 + row as i64;
            for (col, px) in line.iter_mut().enumerate() {
                *px = (sample(channel, x0 + col as i64, y) * max).round() as u16;
            }
        });
    data
}

/// Tile positions in acquisition order: an outward square spiral from the origin.
pub fn spiral(count: usize) -> Vec<TileIndex> {
    let mut out = Vec::with_capacity(count);
    let (mut x, mut y) = (0i64, 0i64);
    let (mut dx, mut dy) = (1i64, 0i64);
    let mut leg = 1;
    'outer: loop {
        for _ in 0..2 {
            for _ in 0..leg {
                if out.len() == count {
                    break 'outer;
                }
                out.push(TileIndex::new(x, y));
                x += dx;
                y += dy;
            }
            (dx, dy) = (-dy, dx);
        }
        leg += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn values_fit_bit_depth() {
        for depth in [8u8, 12] {
            let max = (1u16 << depth) - 1;
            let data = tile_pixels(1, TileIndex::new(-1, 2), 32, 16, depth);
            assert_eq!(data.len(), 32 * 16);
            assert!(data.iter().all(|&v| v <= max));
            assert!(data.iter().any(|&v| v > 0));
        }
    }

    #[test]
    fn deterministic_and_channel_specific() {
        let a = tile_pixels(0, TileIndex::new(3, 4), 16, 16, 8);
        assert_eq!(a, tile_pixels(0, TileIndex::new(3, 4), 16, 16, 8));
        assert_ne!(a, tile_pixels(1, TileIndex::new(3, 4), 16, 16, 8));
    }

    #[test]
    fn spiral_is_compact_and_unique() {
        let tiles = spiral(9);
        assert_eq!(tiles[0], TileIndex::new(0, 0));
        assert_eq!(tiles[1], TileIndex::new(1, 0));
        let unique: HashSet<_> = tiles.iter().copied().collect();
        assert_eq!(unique.len(), 9);
        assert!(tiles.iter().all(|t| t.col.abs() <= 1 && t.row.abs() <= 1));
    }
}
