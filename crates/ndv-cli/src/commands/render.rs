//! `ndv render`: stream a bounded synthetic mosaic and write one view.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use ndv_core::axis::CHANNEL;
use ndv_core::{AxisPositions, Rect, TileIndex};
use ndv_io::{MemoryTileSource, TileArrival};
use ndv_lut::DisplaySettings;
use ndv_view::RedrawPipeline;

use super::synthetic::tile_pixels;
use super::{CHANNELS, apply_display, check_channels, finish, load_config, with_channel_colors};
use crate::RenderArgs;

const BIT_DEPTH: u8 = 12;

pub fn run(args: RenderArgs, config: Option<&Path>) -> Result<()> {
    check_channels(args.channels)?;
    if args.size == 0 {
        bail!("dataset size must be positive");
    }
    if args.zoom <= 0.0 || !args.zoom.is_finite() {
        bail!("zoom must be a positive number, got {}", args.zoom);
    }
    let mut config = with_channel_colors(load_config(config)?, args.channels);
    apply_display(&mut config, args.display.as_deref());

    let source = Arc::new(
        MemoryTileSource::bounded(
            args.tile,
            args.tile,
            Rect::new(0, 0, args.size, args.size),
            args.levels,
            BIT_DEPTH,
        )
        .with_context(|| format!("{} px tiles cannot hold {} pyramid levels", args.tile, args.levels))?
        .with_pixel_size(args.pixel_size),
    );
    let display = Arc::new(DisplaySettings::new());
    let (pipeline, mut pump) = RedrawPipeline::new(source.clone(), display.clone(), config)?;

    // Acquire every tile, channel by channel, notifying the viewer as we go.
    let grid = args.size.div_ceil(args.tile) as i64;
    let start = Instant::now();
    for (c, (name, _)) in CHANNELS.iter().take(args.channels).enumerate() {
        let axes = AxisPositions::standard().with(CHANNEL, c as i32);
        for row in 0..grid {
            for col in 0..grid {
                let tile = TileIndex::new(col, row);
                source.insert_tile(name, &axes, tile, tile_pixels(c, tile, args.tile, args.tile, BIT_DEPTH))?;
                pipeline.new_tile_arrived(TileArrival {
                    channel: (*name).to_owned(),
                    axes: axes.clone(),
                    tile: Some(tile),
                    bit_depth: BIT_DEPTH,
                })?;
            }
        }
        debug!(channel = *name, tiles = grid * grid, "channel acquired");
    }
    info!(
        tiles = source.tile_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "acquisition finished"
    );

    // Contrast: stretch each channel over the generated range.
    for name in display.names() {
        let gamma = args.gamma.unwrap_or_else(|| display.get(&name).map_or(1.0, |d| d.gamma()));
        pipeline.set_contrast(&name, 0, (1 << BIT_DEPTH) - 1, gamma)?;
    }
    if let Some(index) = args.single {
        if index < 0 || index as usize >= args.channels {
            bail!("--single {index} is out of range (0-{})", args.channels - 1);
        }
        pipeline.set_composite_mode(false)?;
        pipeline.set_axis_position(CHANNEL, index)?;
    }
    if args.zoom != 1.0 {
        pipeline.zoom(args.zoom, None)?;
    }
    if let Some(&[dx, dy]) = args.pan.as_deref() {
        pipeline.pan(dx, dy)?;
    }

    finish(&pipeline, &mut pump, &args.output)?;
    Ok(())
}
