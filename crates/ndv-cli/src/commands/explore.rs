//! `ndv explore`: simulate an open-ended stage scan and render the result.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::info;

use ndv_core::axis::CHANNEL;
use ndv_core::AxisPositions;
use ndv_io::{MemoryTileSource, TileArrival};
use ndv_lut::DisplaySettings;
use ndv_view::{OverlayShape, RedrawPipeline};

use super::synthetic::{spiral, tile_pixels};
use super::{CHANNELS, apply_display, check_channels, finish, load_config, with_channel_colors};
use crate::ExploreArgs;

const BIT_DEPTH: u8 = 8;
const LEVELS: u32 = 2;

pub fn run(args: ExploreArgs, config: Option<&Path>) -> Result<()> {
    check_channels(args.channels)?;
    if args.tiles == 0 {
        bail!("at least one tile is needed");
    }
    let mut config = with_channel_colors(load_config(config)?, args.channels);
    apply_display(&mut config, args.display.as_deref());

    let source = Arc::new(MemoryTileSource::explore(args.tile, args.tile, LEVELS, BIT_DEPTH)?);
    let (pipeline, mut pump) = RedrawPipeline::new(source.clone(), Arc::new(DisplaySettings::new()), config)?;

    // The stage visits one position at a time and images every channel there.
    for tile in spiral(args.tiles) {
        for (c, (name, _)) in CHANNELS.iter().take(args.channels).enumerate() {
            let axes = AxisPositions::standard().with(CHANNEL, c as i32);
            source.insert_tile(name, &axes, tile, tile_pixels(c, tile, args.tile, args.tile, BIT_DEPTH))?;
            pipeline.new_tile_arrived(TileArrival {
                channel: (*name).to_owned(),
                axes,
                tile: Some(tile),
                bit_depth: BIT_DEPTH,
            })?;
        }
    }
    info!(tiles = args.tiles, channels = args.channels, "scan finished");

    if let Some(&[dx, dy]) = args.pan.as_deref() {
        pipeline.pan(dx, dy)?;
    }

    let collector = finish(&pipeline, &mut pump, &args.output)?;
    let outlines = collector
        .overlay
        .iter()
        .filter(|s| matches!(s, OverlayShape::TileOutline { .. }))
        .count();
    println!("  Tiles:      {outlines} of {} visible", args.tiles);
    Ok(())
}
