//! Viewport snapshot to RGB composite.
//!
//! # Pipeline
//!
//! ```text
//! for each drawn channel:
//!     cancelled? -> abandon
//!     TileSource::fetch_region(channel, axes, level, region)
//!         error / no data -> channel contributes nothing
//!     stats over raw samples
//!     raw -> contrast stretch -> (color, gamma) LUT -> saturating add
//! cancelled? -> abandon
//! ```
//!
//! A channel is drawn when it is active both in the viewport and in its
//! display settings. In single-channel mode only the channel whose
//! registration index equals the `channel` axis position is drawn.

use tracing::{debug, trace, warn};

use ndv_core::axis::CHANNEL;
use ndv_core::{CancelFlag, Viewport};
use ndv_io::TileSource;
use ndv_lut::{DisplaySnapshot, LutCache};

use crate::raster::RgbRaster;
use crate::stats::ChannelStats;

/// A finished composite.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    /// Blended image at the viewport's pyramid level
    pub raster: RgbRaster,
    /// Statistics of every drawn channel, in registration order
    pub stats: Vec<ChannelStats>,
}

/// Builds composites. Holds the LUT cache shared across frames.
#[derive(Debug, Default)]
pub struct Compositor {
    luts: LutCache,
}

impl Compositor {
    /// Creates a compositor with an empty LUT cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (color, gamma) tables currently cached.
    pub fn cached_luts(&self) -> usize {
        self.luts.len()
    }

    /// Renders `viewport` with `display` settings from `source`.
    ///
    /// Returns `None` if `cancel` fires before the composite is complete.
    /// Missing or unreadable channel data is not an error; that channel is
    /// left black and reported with `has_data == false`.
    pub fn composite(
        &self,
        viewport: &Viewport,
        display: &DisplaySnapshot,
        source: &dyn TileSource,
        cancel: &CancelFlag,
    ) -> Option<Composite> {
        let rect = viewport.resolution_region();
        let level = viewport.resolution_index();
        let mut raster = RgbRaster::new(rect.width, rect.height);
        let mut stats = Vec::new();

        let selected = viewport
            .axes()
            .contains(CHANNEL)
            .then(|| viewport.axis_position(CHANNEL));

        for (index, (name, settings)) in display.channels.iter().enumerate() {
            if !settings.is_active() || !viewport.is_channel_active(name) {
                continue;
            }
            if !display.composite && selected.is_some_and(|s| s != index as i32) {
                continue;
            }
            if cancel.is_cancelled() {
                trace!(channel = %name, "composite cancelled");
                return None;
            }

            let mut axes = viewport.axes().clone();
            if axes.contains(CHANNEL) {
                axes.set(CHANNEL, index as i32);
            }
            let region = match source.fetch_region(name, &axes, level, rect) {
                Ok(region) if region.rect == rect => region,
                Ok(region) => {
                    warn!(channel = %name, got = %region.rect, want = %rect, "source returned wrong region");
                    stats.push(ChannelStats::empty(name, settings.bit_depth()));
                    continue;
                }
                Err(e) => {
                    debug!(channel = %name, error = %e, "channel drawn empty");
                    stats.push(ChannelStats::empty(name, settings.bit_depth()));
                    continue;
                }
            };

            let lut = match self.luts.get(settings.color(), settings.gamma()) {
                Ok(lut) => lut,
                Err(e) => {
                    warn!(channel = %name, error = %e, "unusable LUT");
                    stats.push(ChannelStats::empty(name, settings.bit_depth()));
                    continue;
                }
            };

            stats.push(ChannelStats::compute(name, &region, settings.bit_depth()));
            raster.add_channel(&region, &lut, settings.contrast_min(), settings.contrast_max());
        }

        if cancel.is_cancelled() {
            return None;
        }
        trace!(level, %rect, channels = stats.len(), "composite ready");
        Some(Composite { raster, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndv_core::axis::Z;
    use ndv_core::{AxisPositions, Rect, TileIndex};
    use ndv_io::MemoryTileSource;
    use ndv_lut::{DisplaySettings, Rgb8};

    fn setup() -> (Viewport, DisplaySettings, MemoryTileSource) {
        let source = MemoryTileSource::bounded(4, 4, Rect::new(0, 0, 4, 4), 0, 8).unwrap();
        let axes = AxisPositions::standard();
        source.insert_tile("red", &axes, TileIndex::new(0, 0), vec![200; 16]).unwrap();
        source.insert_tile("also-red", &axes, TileIndex::new(0, 0), vec![200; 16]).unwrap();

        let settings = DisplaySettings::new();
        settings.register("red", Rgb8::RED, 8).unwrap();
        settings.register("also-red", Rgb8::RED, 8).unwrap();

        let vp = Viewport::new(4, 4, source.bounds(), 0).unwrap();
        (vp, settings, source)
    }

    #[test]
    fn two_channels_saturate() {
        let (vp, settings, source) = setup();
        let out = Compositor::new()
            .composite(&vp, &settings.snapshot(), &source, &CancelFlag::new())
            .unwrap();
        assert_eq!(out.raster.width, 4);
        assert_eq!(out.raster.pixel(2, 2), [255, 0, 0]);
        assert_eq!(out.stats.len(), 2);
        assert_eq!(out.stats[0].max, 200);
    }

    #[test]
    fn single_channel_mode_draws_selected() {
        let (mut vp, settings, source) = setup();
        settings.set_composite(false);
        vp.set_axis_position(CHANNEL, 1);
        let out = Compositor::new()
            .composite(&vp, &settings.snapshot(), &source, &CancelFlag::new())
            .unwrap();
        assert_eq!(out.stats.len(), 1);
        assert_eq!(out.stats[0].channel, "also-red");
        assert_eq!(out.raster.pixel(0, 0), [200, 0, 0]);
    }

    #[test]
    fn inactive_channels_skipped() {
        let (mut vp, settings, source) = setup();
        vp.set_channel_active("red", false);
        settings.set_active("also-red", false).unwrap();
        let out = Compositor::new()
            .composite(&vp, &settings.snapshot(), &source, &CancelFlag::new())
            .unwrap();
        assert!(out.stats.is_empty());
        assert_eq!(out.raster.pixel(0, 0), [0, 0, 0]);
    }

    #[test]
    fn missing_data_is_black_not_error() {
        let (mut vp, settings, source) = setup();
        settings.register("late", Rgb8::GREEN, 8).unwrap();
        vp.set_axis_position(Z, 3);
        let out = Compositor::new()
            .composite(&vp, &settings.snapshot(), &source, &CancelFlag::new())
            .unwrap();
        assert_eq!(out.stats.len(), 3);
        assert!(out.stats.iter().all(|s| !s.has_data));
        assert!(out.raster.data.iter().all(|v| *v == 0));
    }

    #[test]
    fn contrast_window_applies() {
        let (vp, settings, source) = setup();
        settings.set_contrast("red", 0, 400, 1.0).unwrap();
        settings.set_active("also-red", false).unwrap();
        let out = Compositor::new()
            .composite(&vp, &settings.snapshot(), &source, &CancelFlag::new())
            .unwrap();
        // 200 of [0, 400] -> 127.5 -> 128
        assert_eq!(out.raster.pixel(1, 1), [128, 0, 0]);
    }

    #[test]
    fn cancelled_returns_nothing() {
        let (vp, settings, source) = setup();
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(
            Compositor::new()
                .composite(&vp, &settings.snapshot(), &source, &cancel)
                .is_none()
        );
    }

    #[test]
    fn luts_reused_across_frames() {
        let (vp, settings, source) = setup();
        let compositor = Compositor::new();
        for _ in 0..3 {
            compositor.composite(&vp, &settings.snapshot(), &source, &CancelFlag::new());
        }
        assert_eq!(compositor.cached_luts(), 1);
    }
}
