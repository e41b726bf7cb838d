//! CLI command implementations

pub mod config;
pub mod explore;
pub mod render;
pub mod synthetic;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use ndv_compose::RgbRaster;
use ndv_lut::Rgb8;
use ndv_view::{EventPump, Frame, Generation, OverlayShape, Presentation, RedrawPipeline, ViewerConfig};

/// How long a command waits for the pipeline to settle.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Channel names and fallback colors of the synthetic datasets.
pub const CHANNELS: [(&str, Rgb8); 4] = [
    ("DAPI", Rgb8::BLUE),
    ("GFP", Rgb8::GREEN),
    ("mCherry", Rgb8::RED),
    ("Cy5", Rgb8::MAGENTA),
];

/// Load the viewer config from `path` or the default location.
pub fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    match path {
        Some(p) => ViewerConfig::load(p).with_context(|| format!("Failed to load config: {}", p.display())),
        None => ViewerConfig::load_default().context("Failed to load default config"),
    }
}

/// Fill in colors for the synthetic channels the config does not mention.
pub fn with_channel_colors(mut config: ViewerConfig, channels: usize) -> ViewerConfig {
    for (name, color) in CHANNELS.iter().take(channels) {
        config.channel_colors.entry((*name).to_owned()).or_insert(*color);
    }
    config
}

/// Validate a requested channel count.
pub fn check_channels(channels: usize) -> Result<()> {
    if !(1..=CHANNELS.len()).contains(&channels) {
        bail!("channel count must be 1-{}, got {channels}", CHANNELS.len());
    }
    Ok(())
}

/// Apply a `[W, H]` canvas override.
pub fn apply_display(config: &mut ViewerConfig, display: Option<&[u32]>) {
    if let Some(&[w, h]) = display {
        config.display_size = [w, h];
    }
}

/// Save an RGB raster as 8-bit PNG
pub fn write_png(path: &Path, raster: &RgbRaster) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create: {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), raster.width, raster.height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .with_context(|| format!("Failed to save: {}", path.display()))?;
    writer
        .write_image_data(&raster.data)
        .with_context(|| format!("Failed to save: {}", path.display()))?;
    writer.finish().context("Failed to finish PNG stream")?;
    Ok(())
}

/// Presentation that keeps the newest frame and overlay.
#[derive(Default)]
pub struct FrameCollector {
    /// Newest frame
    pub frame: Option<Frame>,
    /// Overlay of the newest frame
    pub overlay: Vec<OverlayShape>,
    /// Frames delivered
    pub frames_seen: usize,
    /// Final axis ranges, in arrival order
    pub ranges: Vec<(String, i32, i32)>,
}

impl Presentation for FrameCollector {
    fn on_raster_ready(&mut self, frame: Frame) {
        self.frames_seen += 1;
        self.frame = Some(frame);
        self.overlay.clear();
    }

    fn on_axis_range_expanded(&mut self, axis: &str, min: i32, max: i32) {
        match self.ranges.iter_mut().find(|(a, ..)| a == axis) {
            Some(entry) => *entry = (axis.to_owned(), min, max),
            None => self.ranges.push((axis.to_owned(), min, max)),
        }
    }

    fn on_overlay_ready(&mut self, generation: Generation, shapes: Vec<OverlayShape>) {
        if self.frame.as_ref().is_some_and(|f| f.generation == generation) {
            self.overlay = shapes;
        }
    }
}

/// Wait for the pipeline to go idle, drain events, write the newest frame.
pub fn finish(pipeline: &RedrawPipeline, pump: &mut EventPump, output: &Path) -> Result<FrameCollector> {
    if !pipeline.wait_idle(SETTLE_TIMEOUT) {
        bail!("pipeline did not settle within {}s", SETTLE_TIMEOUT.as_secs());
    }
    let mut collector = FrameCollector::default();
    pump.dispatch(&mut collector);
    pipeline.close();
    pump.dispatch(&mut collector);

    let Some(frame) = &collector.frame else {
        bail!("no frame was rendered");
    };
    write_png(output, &frame.raster)?;

    let [x, y, w, h] = frame.viewport.visible_region();
    info!(
        output = %output.display(),
        width = frame.raster.width,
        height = frame.raster.height,
        level = frame.viewport.resolution_index(),
        generation = frame.generation,
        "wrote frame"
    );
    println!("{}", output.display());
    println!("  Raster:     {}x{}", frame.raster.width, frame.raster.height);
    println!("  Level:      {}", frame.viewport.resolution_index());
    println!("  View:       ({x:.1}, {y:.1}) {w:.1}x{h:.1}");
    println!("  Generation: {} ({} frame(s) delivered)", frame.generation, collector.frames_seen);
    for stats in &frame.stats {
        if stats.has_data {
            println!(
                "  {:<10}  min {:>5}  max {:>5}  mean {:>9.2}",
                stats.channel, stats.min, stats.max, stats.mean
            );
        } else {
            println!("  {:<10}  (no data)", stats.channel);
        }
    }
    for shape in &collector.overlay {
        if let OverlayShape::ScaleBar { length_px, label, .. } = shape {
            println!("  Scale bar:  {label} ({length_px:.0} px)");
        }
    }
    if collector.overlay.is_empty() {
        warn!("frame has no overlay");
    }
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    #[test]
    fn png_has_raster_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let mut raster = RgbRaster::new(5, 3);
        raster.data[0] = 255;
        write_png(&path, &raster).unwrap();

        let decoder = png::Decoder::new(BufReader::new(File::open(&path).unwrap()));
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, 5);
        assert_eq!(reader.info().height, 3);
        assert_eq!(reader.info().color_type, png::ColorType::Rgb);
    }

    #[test]
    fn config_colors_win_over_fallbacks() {
        let config = ViewerConfig::default().with_channel_color("GFP", Rgb8::YELLOW);
        let config = with_channel_colors(config, 2);
        assert_eq!(config.color_for("GFP"), Rgb8::YELLOW);
        assert_eq!(config.color_for("DAPI"), Rgb8::BLUE);
        assert_eq!(config.color_for("mCherry"), Rgb8::WHITE);
    }

    #[test]
    fn channel_count_checked() {
        assert!(check_channels(0).is_err());
        assert!(check_channels(4).is_ok());
        assert!(check_channels(5).is_err());
    }
}
