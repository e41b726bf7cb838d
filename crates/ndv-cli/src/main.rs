//! ndv - drive the tile viewer core from the command line
//!
//! Builds synthetic multi-channel mosaics, streams their tiles through the
//! redraw pipeline as an acquisition would, and writes the resulting frames
//! as PNG.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "ndv")]
#[command(author, version, about = "Live multi-resolution tile viewer core")]
#[command(long_about = "
Renders synthetic microscopy mosaics through the ndv redraw pipeline.

Examples:
  ndv render -o frame.png                       # Fit a 3-channel 2048px mosaic
  ndv render -o zoom.png --zoom 0.25 --pan 100 40
  ndv render -o gfp.png --single 1              # Only the second channel
  ndv explore -o explore.png --tiles 30 --pan 5000 0
  ndv config --init                             # Write default viewer.ron
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (debug logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Viewer config file (default: <config dir>/ndv/viewer.ron)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a view of a bounded synthetic mosaic
    #[command(visible_alias = "r")]
    Render(RenderArgs),

    /// Simulate an open-ended acquisition and render the explored area
    #[command(visible_alias = "e")]
    Explore(ExploreArgs),

    /// Show or initialize the viewer configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// Output PNG
    #[arg(short, long)]
    output: PathBuf,

    /// Dataset width and height in pixels
    #[arg(long, default_value = "2048")]
    size: u32,

    /// Tile size in pixels
    #[arg(long, default_value = "256")]
    tile: u32,

    /// Number of coarser pyramid levels
    #[arg(long, default_value = "3")]
    levels: u32,

    /// Number of channels (1-4)
    #[arg(short, long, default_value = "3")]
    channels: usize,

    /// Canvas width and height (default from config)
    #[arg(long, num_args = 2, value_names = ["W", "H"])]
    display: Option<Vec<u32>>,

    /// Zoom factor about the center (< 1 zooms in)
    #[arg(short, long, default_value = "1.0")]
    zoom: f64,

    /// Pan by a screen-pixel delta after zooming
    #[arg(long, num_args = 2, value_names = ["DX", "DY"], allow_negative_numbers = true)]
    pan: Option<Vec<f64>>,

    /// Draw only this channel index
    #[arg(long)]
    single: Option<i32>,

    /// Gamma for every channel
    #[arg(short, long)]
    gamma: Option<f64>,

    /// Physical pixel size in micrometres
    #[arg(long, default_value = "0.65")]
    pixel_size: f64,
}

#[derive(Args)]
struct ExploreArgs {
    /// Output PNG
    #[arg(short, long)]
    output: PathBuf,

    /// Number of tiles the simulated stage acquires
    #[arg(short, long, default_value = "25")]
    tiles: usize,

    /// Tile size in pixels
    #[arg(long, default_value = "128")]
    tile: u32,

    /// Number of channels (1-4)
    #[arg(short, long, default_value = "2")]
    channels: usize,

    /// Canvas width and height (default from config)
    #[arg(long, num_args = 2, value_names = ["W", "H"])]
    display: Option<Vec<u32>>,

    /// Pan by a screen-pixel delta once acquisition finished
    #[arg(long, num_args = 2, value_names = ["DX", "DY"], allow_negative_numbers = true)]
    pan: Option<Vec<f64>>,
}

#[derive(Args)]
struct ConfigArgs {
    /// Print the config file path only
    #[arg(long)]
    path: bool,

    /// Write the default configuration (refuses to overwrite)
    #[arg(long)]
    init: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Render(args) => commands::render::run(args, cli.config.as_deref()),
        Commands::Explore(args) => commands::explore::run(args, cli.config.as_deref()),
        Commands::Config(args) => commands::config::run(args, cli.config.as_deref()),
    }
}
