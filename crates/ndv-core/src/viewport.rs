//! Viewport coordinate model.
//!
//! All pan and zoom math happens in full-resolution dataset pixels. The
//! pyramid level is then a pure function of how many dataset pixels land on
//! each screen pixel, so switching levels never disturbs the pan offset.
//!
//! # Coordinate Spaces
//!
//! ```text
//!   full-res pixels          level-r pixels              screen pixels
//!   (pan_offset, size)  --/ 2^r -->  (region)  --* display_scale -->  canvas
//!
//!   display_to_full_scale = display_size / source_size
//!   display_scale         = display_size / (source_size / 2^r)
//! ```
//!
//! # Boundary Policy
//!
//! Requests that would shrink the visible region below [`MIN_ZOOM_EXTENT`] are
//! ignored. For bounded datasets the visible region is kept inside the bounds:
//! pans are clamped and an over-zoom is scaled back by the worse of the two
//! axis ratios. For explore datasets, callers pass the explored tiles and the
//! view is pulled back onto data after each move (see [`crate::explore`]).
//!
//! # Example
//!
//! ```rust
//! use ndv_core::{Rect, Viewport};
//!
//! let bounds = Rect::new(0, 0, 2000, 2000);
//! let mut vp = Viewport::new(1000, 1000, Some(bounds), 4).unwrap();
//! vp.set_source_region([0.0, 0.0], [1000.0, 1000.0]);
//! vp.zoom(0.5, None, None);
//! assert_eq!(vp.source_size(), [500.0, 500.0]);
//! assert_eq!(vp.pan_offset(), [250.0, 250.0]);
//! ```

use std::collections::BTreeMap;

use tracing::trace;

use crate::axis::AxisPositions;
use crate::error::{CoreError, CoreResult};
use crate::explore::{self, ExploredTiles};
use crate::rect::Rect;
use crate::tile::TileIndex;

/// Smallest allowed visible extent, in full-resolution pixels.
pub const MIN_ZOOM_EXTENT: f64 = 5.0;

/// How far an explore view may zoom out past the coarsest pyramid level,
/// in coarsest-level pixels per screen pixel.
pub const MAX_OVERVIEW_RATIO: f64 = 4.0;

/// Deepest pyramid level a viewport addresses.
pub const MAX_RESOLUTION_INDEX: u32 = 30;

/// The region of a dataset mapped onto the display canvas.
///
/// Cloning is the snapshot mechanism: a clone is an independent value the
/// compositor can read while the live model keeps changing.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    resolution_index: u32,
    max_resolution_index: u32,
    pan_offset: [f64; 2],
    source_size: [f64; 2],
    display_size: [u32; 2],
    bounds: Option<Rect>,
    axes: AxisPositions,
    active_channels: BTreeMap<String, bool>,
}

impl Viewport {
    /// Creates a viewport with the standard axes.
    ///
    /// Bounded datasets start fully visible (fit to the display aspect);
    /// unbounded ones start at the origin with one dataset pixel per screen
    /// pixel.
    pub fn new(
        display_width: u32,
        display_height: u32,
        bounds: Option<Rect>,
        max_resolution_index: u32,
    ) -> CoreResult<Self> {
        Self::with_axes(
            display_width,
            display_height,
            bounds,
            max_resolution_index,
            AxisPositions::standard(),
        )
    }

    /// Creates a viewport with a custom axis set.
    pub fn with_axes(
        display_width: u32,
        display_height: u32,
        bounds: Option<Rect>,
        max_resolution_index: u32,
        axes: AxisPositions,
    ) -> CoreResult<Self> {
        if display_width == 0 || display_height == 0 {
            return Err(CoreError::InvalidDimensions {
                width: display_width,
                height: display_height,
            });
        }
        if let Some(b) = bounds.filter(Rect::is_empty) {
            return Err(CoreError::InvalidBounds {
                x_min: b.x,
                y_min: b.y,
                x_max: b.right(),
                y_max: b.bottom(),
            });
        }

        let mut vp = Self {
            resolution_index: 0,
            max_resolution_index: max_resolution_index.min(MAX_RESOLUTION_INDEX),
            pan_offset: [0.0, 0.0],
            source_size: [f64::from(display_width), f64::from(display_height)],
            display_size: [0, 0],
            bounds,
            axes,
            active_channels: BTreeMap::new(),
        };
        match bounds {
            Some(b) => {
                vp.pan_offset = [b.x as f64, b.y as f64];
                vp.source_size = [f64::from(b.width), f64::from(b.height)];
                vp.resize(display_width, display_height);
            }
            None => {
                vp.display_size = [display_width, display_height];
                vp.update_resolution();
            }
        }
        Ok(vp)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Selected pyramid level.
    #[inline]
    pub fn resolution_index(&self) -> u32 {
        self.resolution_index
    }

    /// Coarsest pyramid level available.
    #[inline]
    pub fn max_resolution_index(&self) -> u32 {
        self.max_resolution_index
    }

    /// `2^resolution_index`.
    #[inline]
    pub fn downsample_factor(&self) -> f64 {
        f64::from(1u32 << self.resolution_index.min(MAX_RESOLUTION_INDEX))
    }

    /// Top-left of the visible region in full-resolution pixels.
    #[inline]
    pub fn pan_offset(&self) -> [f64; 2] {
        self.pan_offset
    }

    /// Size of the visible region in full-resolution pixels.
    #[inline]
    pub fn source_size(&self) -> [f64; 2] {
        self.source_size
    }

    /// Canvas size in screen pixels.
    #[inline]
    pub fn display_size(&self) -> [u32; 2] {
        self.display_size
    }

    /// Dataset bounds, `None` for explore datasets.
    #[inline]
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    /// Returns `true` if the dataset has a fixed extent.
    #[inline]
    pub fn is_bounded(&self) -> bool {
        self.bounds.is_some()
    }

    /// Screen pixels per full-resolution pixel, per axis.
    pub fn display_to_full_scale(&self) -> [f64; 2] {
        [
            f64::from(self.display_size[0]) / self.source_size[0],
            f64::from(self.display_size[1]) / self.source_size[1],
        ]
    }

    /// Screen pixels per pixel of the selected pyramid level, per axis.
    pub fn display_scale(&self) -> [f64; 2] {
        let ds = self.downsample_factor();
        let [sx, sy] = self.display_to_full_scale();
        [sx * ds, sy * ds]
    }

    /// Visible region in full-resolution pixels as `[x, y, width, height]`.
    #[inline]
    pub fn visible_region(&self) -> [f64; 4] {
        [
            self.pan_offset[0],
            self.pan_offset[1],
            self.source_size[0],
            self.source_size[1],
        ]
    }

    /// Region to request at the selected pyramid level.
    ///
    /// Origin is floored and size is rounded up so the region always covers
    /// the visible area.
    pub fn resolution_region(&self) -> Rect {
        let ds = self.downsample_factor();
        let x0 = (self.pan_offset[0] / ds).floor();
        let y0 = (self.pan_offset[1] / ds).floor();
        let x1 = ((self.pan_offset[0] + self.source_size[0]) / ds).ceil();
        let y1 = ((self.pan_offset[1] + self.source_size[1]) / ds).ceil();
        Rect::new(
            x0 as i64,
            y0 as i64,
            (x1 - x0).max(1.0) as u32,
            (y1 - y0).max(1.0) as u32,
        )
    }

    // ========================================================================
    // Axes and channels
    // ========================================================================

    /// All axis positions.
    pub fn axes(&self) -> &AxisPositions {
        &self.axes
    }

    /// Position along `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis` is not registered.
    pub fn axis_position(&self, axis: &str) -> i32 {
        self.axes.get(axis)
    }

    /// Moves along `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis` is not registered.
    pub fn set_axis_position(&mut self, axis: &str, value: i32) {
        self.axes.set(axis, value);
    }

    /// Enables or disables a channel in the composite.
    pub fn set_channel_active(&mut self, channel: &str, active: bool) {
        self.active_channels.insert(channel.to_owned(), active);
    }

    /// Channels default to active until switched off.
    pub fn is_channel_active(&self, channel: &str) -> bool {
        self.active_channels.get(channel).copied().unwrap_or(true)
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Moves the view by a screen-pixel delta.
    ///
    /// `explored` is consulted only for unbounded datasets.
    pub fn pan(&mut self, dx: f64, dy: f64, explored: Option<&ExploredTiles>) {
        let [sx, sy] = self.display_to_full_scale();
        self.pan_offset[0] += dx / sx;
        self.pan_offset[1] += dy / sy;
        self.settle(explored);
    }

    /// Scales the visible region by `factor` (< 1 zooms in).
    ///
    /// `anchor` is a screen point that stays fixed; `None` zooms about the
    /// center. Zooms below [`MIN_ZOOM_EXTENT`] are ignored, as are explore
    /// zoom-outs past [`MAX_OVERVIEW_RATIO`] at the coarsest level.
    pub fn zoom(&mut self, factor: f64, anchor: Option<[f64; 2]>, explored: Option<&ExploredTiles>) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let old = self.source_size;
        let center = match anchor {
            None => [
                self.pan_offset[0] + old[0] / 2.0,
                self.pan_offset[1] + old[1] / 2.0,
            ],
            Some([ax, ay]) => {
                let [sx, sy] = self.display_to_full_scale();
                [self.pan_offset[0] + ax / sx, self.pan_offset[1] + ay / sy]
            }
        };

        let mut new = [old[0] * factor, old[1] * factor];
        if new[0] < MIN_ZOOM_EXTENT || new[1] < MIN_ZOOM_EXTENT {
            trace!(factor, "zoom rejected below minimum extent");
            return;
        }
        if let Some(limit) = self.zoom_out_limit() {
            if (0..2).any(|i| new[i] > old[i] && new[i] > limit[i]) {
                trace!(factor, "zoom rejected past coarsest level");
                return;
            }
        }
        self.limit_overzoom(&mut new);

        for i in 0..2 {
            self.pan_offset[i] = center[i] - (center[i] - self.pan_offset[i]) * new[i] / old[i];
        }
        self.source_size = new;
        self.settle(explored);
    }

    /// Adapts the visible region to a new canvas size.
    ///
    /// Bounded datasets widen the region along the axis the canvas grew in
    /// (never cropping content), capped by the bounds. Explore datasets keep
    /// the current screen-to-dataset scale. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let canvas_aspect = f64::from(width) / f64::from(height);
        let [sw, sh] = self.source_size;
        let source_aspect = sw / sh;
        let mut new = self.source_size;

        if self.bounds.is_some() {
            if canvas_aspect > source_aspect {
                new[0] = canvas_aspect / source_aspect * sw;
            } else {
                new[1] = sh / (canvas_aspect / source_aspect);
            }
            self.limit_overzoom(&mut new);
        } else if self.display_size[0] > 0 && self.display_size[1] > 0 {
            new[0] = sw * f64::from(width) / f64::from(self.display_size[0]);
            new[1] = sh * f64::from(height) / f64::from(self.display_size[1]);
        } else {
            new[0] = sw / source_aspect * canvas_aspect;
        }
        self.display_size = [width, height];
        if let Some(limit) = self.zoom_out_limit() {
            new[0] = new[0].min(limit[0]);
            new[1] = new[1].min(limit[1]);
        }
        new[0] = new[0].max(MIN_ZOOM_EXTENT);
        new[1] = new[1].max(MIN_ZOOM_EXTENT);

        self.source_size = new;
        self.clamp_to_bounds();
        self.update_resolution();
    }

    /// Sets the visible region directly, subject to the usual limits.
    ///
    /// Used to restore a saved view or jump to a region of interest.
    pub fn set_source_region(&mut self, offset: [f64; 2], size: [f64; 2]) {
        let mut size = size;
        if let Some(limit) = self.zoom_out_limit() {
            size = [size[0].min(limit[0]), size[1].min(limit[1])];
        }
        let mut size = [size[0].max(MIN_ZOOM_EXTENT), size[1].max(MIN_ZOOM_EXTENT)];
        self.limit_overzoom(&mut size);
        self.pan_offset = offset;
        self.source_size = size;
        self.clamp_to_bounds();
        self.update_resolution();
    }

    /// Pulls an explore-mode view back onto acquired data.
    ///
    /// Returns `true` if the view moved. Does nothing for bounded datasets.
    pub fn keep_explored_area_visible(&mut self, explored: &ExploredTiles) -> bool {
        if self.bounds.is_some() {
            return false;
        }
        match explore::recenter_offset(self.pan_offset, self.source_size, explored) {
            Some(offset) => {
                trace!(?offset, "view pulled back onto explored tiles");
                self.pan_offset = offset;
                true
            }
            None => false,
        }
    }

    /// Tile under a screen pixel.
    ///
    /// ```rust
    /// use ndv_core::{TileIndex, Viewport};
    ///
    /// let vp = Viewport::new(800, 600, None, 0).unwrap();
    /// assert_eq!(vp.tile_index_at_display_pixel(-1.0, -1.0, 256, 256), TileIndex::new(-1, -1));
    /// ```
    pub fn tile_index_at_display_pixel(&self, x: f64, y: f64, tile_width: u32, tile_height: u32) -> TileIndex {
        let [sx, sy] = self.display_to_full_scale();
        let full_x = (x / sx + self.pan_offset[0]).floor() as i64;
        let full_y = (y / sy + self.pan_offset[1]).floor() as i64;
        TileIndex::containing(full_x, full_y, tile_width, tile_height)
    }

    /// Independent copy for handing to worker threads.
    #[inline]
    pub fn snapshot(&self) -> Viewport {
        self.clone()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn settle(&mut self, explored: Option<&ExploredTiles>) {
        if self.bounds.is_some() {
            self.clamp_to_bounds();
        } else if let Some(explored) = explored {
            self.keep_explored_area_visible(explored);
        }
        self.update_resolution();
    }

    /// Largest visible extent of an explore view, `None` when bounded.
    fn zoom_out_limit(&self) -> Option<[f64; 2]> {
        if self.bounds.is_some() {
            return None;
        }
        let coarsest = f64::from(1u32 << self.max_resolution_index) * MAX_OVERVIEW_RATIO;
        Some([
            f64::from(self.display_size[0]) * coarsest,
            f64::from(self.display_size[1]) * coarsest,
        ])
    }

    fn limit_overzoom(&self, size: &mut [f64; 2]) {
        if let Some(b) = self.bounds {
            let extent = [f64::from(b.width), f64::from(b.height)];
            let over = [size[0] / extent[0], size[1] / extent[1]];
            let worst = over[0].max(over[1]);
            if worst > 1.0 {
                // The limiting axis snaps to the extent exactly so repeated
                // over-zooms leave the state bit-identical.
                for i in 0..2 {
                    size[i] = if over[i] == worst { extent[i] } else { size[i] / worst };
                }
            }
        }
    }

    fn clamp_to_bounds(&mut self) {
        if let Some(b) = self.bounds {
            let min = [b.x as f64, b.y as f64];
            let max = [b.right() as f64, b.bottom() as f64];
            for i in 0..2 {
                self.pan_offset[i] = min[i].max(self.pan_offset[i].min(max[i] - self.source_size[i]));
            }
        }
    }

    fn update_resolution(&mut self) {
        let [dw, dh] = self.display_size;
        if dw == 0 || dh == 0 {
            self.resolution_index = 0;
            return;
        }
        let ratio = (self.source_size[0] / f64::from(dw)).min(self.source_size[1] / f64::from(dh));
        let level = if ratio >= 2.0 { ratio.log2().floor() as u32 } else { 0 };
        self.resolution_index = level.min(self.max_resolution_index);
    }
}
