//! # ndv-view
//!
//! Redraw pipeline of a live tile viewer.
//!
//! Sits between user input plus acquisition events and the expensive work
//! of compositing frames:
//!
//! - [`RedrawPipeline`] - Owns the live viewport, turns triggers into work
//! - [`CoalescingScheduler`] - One worker per task kind, newest input wins
//! - [`EventPump`], [`Presentation`] - Coalesced handoff to the display thread
//! - [`OverlayShape`] - Scale bar and tile outlines
//! - [`ViewerConfig`] - Persistent settings (RON)
//!
//! # Data Flow
//!
//! ```text
//! gesture / new tile
//!        |
//!        v
//! RedrawPipeline ──Display(snapshot)──► CoalescingScheduler ──► Compositor ──► TileSource
//!        ^                                      |
//!        |                                      v
//! Presentation ◄──── EventPump ◄──── RasterReady / OverlayReady / AxisRangeExpanded
//! ```
//!
//! # Configuration
//!
//! [`ViewerConfig::load_default`] reads `<config dir>/ndv/viewer.ron`.
//! Missing files yield defaults.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod messages;
pub mod overlay;
pub mod pipeline;
pub mod scheduler;
pub mod task;

pub use config::ViewerConfig;
pub use error::{ViewError, ViewResult};
pub use messages::{EventPump, Frame, Presentation, ViewerEvent};
pub use overlay::{OverlayShape, build_overlay};
pub use pipeline::{PipelineState, RedrawPipeline};
pub use scheduler::{Coalesce, CoalescingScheduler, LaneStatus};
pub use task::{Generation, TaskKind, ViewerTask};
