//! Overlay shapes drawn on top of the composite.
//!
//! Shapes are in screen pixels of the frame they belong to, so the
//! presentation layer can draw them without knowing the viewport math.

use ndv_core::{ExploredTiles, TileIndex, Viewport};

/// Screen distance of the scale bar from the bottom-left corner.
pub const SCALE_BAR_MARGIN: f64 = 20.0;

/// Largest fraction of the canvas width a scale bar may span.
pub const SCALE_BAR_MAX_FRACTION: f64 = 0.2;

/// A shape in screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayShape {
    /// Horizontal bar of a round physical length.
    ScaleBar {
        /// Left end, screen x
        x: f64,
        /// Baseline, screen y
        y: f64,
        /// Length in screen pixels
        length_px: f64,
        /// Physical length, e.g. `"50 µm"`
        label: String,
    },
    /// Border of a tile that holds data.
    TileOutline {
        /// Grid position
        tile: TileIndex,
        /// Left edge, screen x
        x: f64,
        /// Top edge, screen y
        y: f64,
        /// Width in screen pixels
        width: f64,
        /// Height in screen pixels
        height: f64,
    },
}

/// Builds the overlay for one frame.
///
/// The scale bar needs a positive `pixel_size_um`. Tile outlines are drawn
/// only for tiles that intersect the view.
pub fn build_overlay(
    viewport: &Viewport,
    pixel_size_um: f64,
    explored: Option<&ExploredTiles>,
    show_scale_bar: bool,
) -> Vec<OverlayShape> {
    let mut shapes = Vec::new();

    if show_scale_bar {
        shapes.extend(scale_bar(viewport, pixel_size_um));
    }

    if let Some(explored) = explored {
        let [vx, vy, vw, vh] = viewport.visible_region();
        let [sx, sy] = viewport.display_to_full_scale();
        let (tw, th) = (f64::from(explored.tile_width), f64::from(explored.tile_height));
        for &tile in &explored.tiles {
            let (ox, oy) = tile.origin(explored.tile_width, explored.tile_height);
            let (ox, oy) = (ox as f64, oy as f64);
            if ox >= vx + vw || oy >= vy + vh || ox + tw <= vx || oy + th <= vy {
                continue;
            }
            shapes.push(OverlayShape::TileOutline {
                tile,
                x: (ox - vx) * sx,
                y: (oy - vy) * sy,
                width: tw * sx,
                height: th * sy,
            });
        }
    }
    shapes
}

fn scale_bar(viewport: &Viewport, pixel_size_um: f64) -> Option<OverlayShape> {
    if !(pixel_size_um.is_finite() && pixel_size_um > 0.0) {
        return None;
    }
    let [width, height] = viewport.display_size();
    let px_per_um = viewport.display_to_full_scale()[0] / pixel_size_um;
    let max_um = f64::from(width) * SCALE_BAR_MAX_FRACTION / px_per_um;
    let um = nice_length(max_um)?;
    Some(OverlayShape::ScaleBar {
        x: SCALE_BAR_MARGIN,
        y: f64::from(height) - SCALE_BAR_MARGIN,
        length_px: um * px_per_um,
        label: length_label(um),
    })
}

/// Largest value of the 1-2-5 series not above `max`.
fn nice_length(max: f64) -> Option<f64> {
    if !(max.is_finite() && max > 0.0) {
        return None;
    }
    let decade = 10f64.powi(max.log10().floor() as i32);
    [5.0, 2.0, 1.0]
        .into_iter()
        .map(|m| m * decade)
        .find(|v| *v <= max * (1.0 + 1e-9))
        .or(Some(decade))
}

fn length_label(um: f64) -> String {
    if um >= 1000.0 {
        format!("{} mm", um / 1000.0)
    } else {
        format!("{um} µm")
    }
}
