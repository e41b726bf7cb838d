//! The redraw pipeline.
//!
//! Owns the live [`Viewport`] and turns every trigger into coalesced work:
//!
//! ```text
//! caller thread                       workers (one per TaskKind)
//! ─────────────                       ──────────────────────────
//! pan / zoom / resize / ...
//!   mutate live viewport
//!   generation += 1
//!   submit Display(snapshot) ───────► composite ──► RasterReady
//!                                         └── submit Overlay ──► OverlayReady
//! new_tile_arrived
//!   register channel, notify source
//!   submit ExpandAxisRange ─────────► grow ranges ──► AxisRangeExpanded
//!   submit Display(snapshot) ───────► ...
//! ```
//!
//! The viewport is only mutated on caller threads; workers see snapshots.
//! State is derived from the display lane:
//!
//! ```text
//! Idle ──submit──► Scheduled ──worker picks up──► Compositing ──done──► Idle
//!   any ──close()──► Closed
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use tracing::{debug, trace};

use ndv_compose::Compositor;
use ndv_core::axis::Z;
use ndv_core::{AxisPositions, CancelFlag, ExploredTiles, Viewport};
use ndv_io::{CachedTileSource, TileArrival, TileSource};
use ndv_lut::DisplaySettings;

use crate::config::ViewerConfig;
use crate::messages::{EventPump, Frame, ViewerEvent};
use crate::overlay::build_overlay;
use crate::scheduler::{CoalescingScheduler, LaneStatus};
use crate::task::{Generation, TaskKind, ViewerTask};
use crate::{ViewError, ViewResult};

/// Coarse pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing to draw.
    Idle,
    /// A display task is queued.
    Scheduled,
    /// A composite is in progress.
    Compositing,
    /// Closed for good.
    Closed,
}

/// Drives compositing for one viewer.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use ndv_core::{AxisPositions, Rect, TileIndex};
/// use ndv_io::{MemoryTileSource, TileArrival};
/// use ndv_lut::DisplaySettings;
/// use ndv_view::{RedrawPipeline, ViewerConfig};
///
/// let source = Arc::new(MemoryTileSource::bounded(16, 16, Rect::new(0, 0, 64, 64), 2, 8).unwrap());
/// let config = ViewerConfig { display_size: [64, 64], ..ViewerConfig::default() };
/// let (pipeline, _pump) =
///     RedrawPipeline::new(source.clone(), Arc::new(DisplaySettings::new()), config).unwrap();
///
/// let axes = AxisPositions::standard();
/// source.insert_tile("DAPI", &axes, TileIndex::new(0, 0), vec![100; 256]).unwrap();
/// pipeline
///     .new_tile_arrived(TileArrival { channel: "DAPI".into(), axes, tile: Some(TileIndex::new(0, 0)), bit_depth: 8 })
///     .unwrap();
/// assert!(pipeline.wait_idle(Duration::from_secs(5)));
/// pipeline.close();
/// ```
pub struct RedrawPipeline {
    shared: Arc<Shared>,
}

struct Shared {
    scheduler: CoalescingScheduler<ViewerTask>,
    viewport: Mutex<Viewport>,
    display: Arc<DisplaySettings>,
    source: RwLock<Option<Arc<dyn TileSource>>>,
    compositor: Compositor,
    generation: AtomicU64,
    axis_ranges: Mutex<BTreeMap<String, (i32, i32)>>,
    locked_axes: Mutex<BTreeSet<String>>,
    config: ViewerConfig,
    events: Sender<ViewerEvent>,
    closed: AtomicBool,
}

impl RedrawPipeline {
    /// Creates a pipeline and the pump its presentation layer drains.
    ///
    /// The source is wrapped in a tile cache of `config.tile_cache_bytes`
    /// (none when zero). The viewport starts at `config.display_size`.
    pub fn new(
        source: Arc<dyn TileSource>,
        display: Arc<DisplaySettings>,
        config: ViewerConfig,
    ) -> ViewResult<(Self, EventPump)> {
        config.validate()?;
        let [width, height] = config.display_size;
        let viewport = Viewport::new(width, height, source.bounds(), source.max_resolution_index())?;
        let source: Arc<dyn TileSource> = if config.tile_cache_bytes > 0 {
            Arc::new(CachedTileSource::new(source, config.tile_cache_bytes))
        } else {
            source
        };
        let (tx, rx) = mpsc::channel();
        let grace = config.shutdown_grace();

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let weak = weak.clone();
            Shared {
                scheduler: CoalescingScheduler::new("ndv", grace, move |task: ViewerTask, cancel: &CancelFlag| {
                    if let Some(shared) = weak.upgrade() {
                        shared.run(task, cancel);
                    }
                }),
                viewport: Mutex::new(viewport),
                display,
                source: RwLock::new(Some(source)),
                compositor: Compositor::new(),
                generation: AtomicU64::new(0),
                axis_ranges: Mutex::new(BTreeMap::new()),
                locked_axes: Mutex::new(BTreeSet::new()),
                config,
                events: tx,
                closed: AtomicBool::new(false),
            }
        });
        debug!(width, height, "redraw pipeline created");
        Ok((Self { shared }, EventPump::new(rx)))
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    /// Pans by a screen-pixel delta.
    pub fn pan(&self, dx: f64, dy: f64) -> ViewResult<()> {
        self.update_view(|vp, explored| vp.pan(dx, dy, explored))
    }

    /// Zooms by `factor` about a screen point (the center when `None`).
    pub fn zoom(&self, factor: f64, anchor: Option<[f64; 2]>) -> ViewResult<()> {
        self.update_view(|vp, explored| vp.zoom(factor, anchor, explored))
    }

    /// Adapts to a new canvas size.
    pub fn resize(&self, width: u32, height: u32) -> ViewResult<()> {
        self.update_view(|vp, _| vp.resize(width, height))
    }

    /// Moves along a non-spatial axis.
    ///
    /// # Panics
    ///
    /// Panics if the viewport has no axis named `axis`.
    pub fn set_axis_position(&self, axis: &str, value: i32) -> ViewResult<()> {
        self.update_view(|vp, _| vp.set_axis_position(axis, value))
    }

    /// Shows or hides a channel in this viewer.
    pub fn set_channel_active(&self, channel: &str, active: bool) -> ViewResult<()> {
        self.update_view(|vp, _| vp.set_channel_active(channel, active))
    }

    /// Updates a channel's contrast window and gamma.
    pub fn set_contrast(&self, channel: &str, min: i32, max: i32, gamma: f64) -> ViewResult<()> {
        self.ensure_open()?;
        self.shared.display.set_contrast(channel, min, max, gamma)?;
        self.redraw()
    }

    /// Draws all active channels (`true`) or only the selected one.
    pub fn set_composite_mode(&self, composite: bool) -> ViewResult<()> {
        self.ensure_open()?;
        self.shared.display.set_composite(composite);
        self.redraw()
    }

    /// Stops (or resumes) following new data along `axis`.
    pub fn set_axis_locked(&self, axis: &str, locked: bool) {
        let mut locked_axes = self.shared.lock_locked_axes();
        if locked {
            locked_axes.insert(axis.to_owned());
        } else {
            locked_axes.remove(axis);
        }
    }

    /// Handles a tile written by the acquisition.
    ///
    /// Registers the channel on first sight, lets the source drop stale
    /// cache entries, follows the new position on every unlocked axis
    /// (`channel` included), grows the axis ranges and redraws.
    pub fn new_tile_arrived(&self, arrival: TileArrival) -> ViewResult<()> {
        self.ensure_open()?;
        let shared = &self.shared;

        let color = shared.config.color_for(&arrival.channel);
        if shared.display.register(&arrival.channel, color, arrival.bit_depth)? {
            let gamma = shared.config.default_gamma;
            shared.display.update(&arrival.channel, |d| d.set_gamma(gamma))??;
        }
        if let Some(source) = shared.source() {
            source.tile_written(&arrival);
        }

        let task = {
            let locked = shared.lock_locked_axes();
            let mut vp = shared.lock_viewport();
            for (axis, value) in arrival.axes.iter() {
                if vp.axes().contains(axis) && !locked.contains(axis) {
                    vp.set_axis_position(axis, value);
                }
            }
            shared.display_task(&vp)
        };
        trace!(channel = %arrival.channel, tile = ?arrival.tile, "tile arrived");
        shared.scheduler.submit(ViewerTask::ExpandAxisRange(vec![arrival.axes]))?;
        shared.scheduler.submit(task)
    }

    /// Redraws the current view.
    pub fn redraw(&self) -> ViewResult<()> {
        self.update_view(|_, _| {})
    }

    /// Shuts the pipeline down. Idempotent.
    ///
    /// Running work is cancelled, queued work dropped, a `Closed` event is
    /// sent and the tile source released.
    pub fn close(&self) {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        shared.scheduler.shutdown();
        let source = shared
            .source
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(source);
        let _ = shared.events.send(ViewerEvent::Closed);
        debug!("redraw pipeline closed");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Coarse state, derived from the display lane.
    pub fn state(&self) -> PipelineState {
        if self.shared.closed.load(Ordering::Acquire) {
            return PipelineState::Closed;
        }
        match self.shared.scheduler.lane_status(TaskKind::Display) {
            LaneStatus::Idle => PipelineState::Idle,
            LaneStatus::Queued => PipelineState::Scheduled,
            LaneStatus::Running => PipelineState::Compositing,
        }
    }

    /// Snapshot of the live viewport.
    pub fn viewport(&self) -> Viewport {
        self.shared.lock_viewport().snapshot()
    }

    /// Shared channel display settings.
    pub fn display_settings(&self) -> &Arc<DisplaySettings> {
        &self.shared.display
    }

    /// Acquired range of `axis`, if any data arrived along it.
    pub fn axis_range(&self, axis: &str) -> Option<(i32, i32)> {
        self.shared
            .axis_ranges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(axis)
            .copied()
    }

    /// Generation of the newest submitted snapshot.
    pub fn generation(&self) -> Generation {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Blocks until all queued work finished, or `timeout` passes.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.shared.scheduler.wait_idle(timeout)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_open(&self) -> ViewResult<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            Err(ViewError::SchedulerClosed)
        } else {
            Ok(())
        }
    }

    fn update_view<F>(&self, f: F) -> ViewResult<()>
    where
        F: FnOnce(&mut Viewport, Option<&ExploredTiles>),
    {
        self.ensure_open()?;
        let shared = &self.shared;
        let task = {
            let mut vp = shared.lock_viewport();
            let explored = shared.explored_tiles(&vp);
            f(&mut vp, explored.as_ref());
            shared.display_task(&vp)
        };
        shared.scheduler.submit(task)
    }
}

impl Drop for RedrawPipeline {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for RedrawPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedrawPipeline")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish()
    }
}

impl Shared {
    fn lock_viewport(&self) -> MutexGuard<'_, Viewport> {
        self.viewport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_locked_axes(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.locked_axes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn source(&self) -> Option<Arc<dyn TileSource>> {
        self.source.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Stamps a snapshot. Called with the viewport locked so generations
    /// follow mutation order.
    fn display_task(&self, vp: &Viewport) -> ViewerTask {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        ViewerTask::Display {
            generation,
            viewport: Box::new(vp.snapshot()),
        }
    }

    /// Data-holding tiles at the viewport's z, for explore datasets only.
    fn explored_tiles(&self, vp: &Viewport) -> Option<ExploredTiles> {
        if vp.is_bounded() {
            return None;
        }
        let source = self.source()?;
        let z = if vp.axes().contains(Z) { vp.axis_position(Z) } else { 0 };
        let (tw, th) = source.tile_dimensions();
        Some(ExploredTiles::new(tw, th, source.tile_indices_with_data_at(z)))
    }

    /// A newer trigger was stamped or the pipeline closed.
    fn is_stale(&self, generation: Generation) -> bool {
        self.closed.load(Ordering::Acquire) || self.generation.load(Ordering::Acquire) != generation
    }

    fn emit(&self, event: ViewerEvent) {
        if self.events.send(event).is_err() {
            trace!("event pump dropped, discarding event");
        }
    }

    fn run(&self, task: ViewerTask, cancel: &CancelFlag) {
        match task {
            ViewerTask::Display { generation, viewport } => self.run_display(generation, viewport, cancel),
            ViewerTask::Overlay { generation, viewport } => self.run_overlay(generation, &viewport, cancel),
            ViewerTask::ExpandAxisRange(batch) => self.run_expand(batch),
        }
    }

    fn run_display(&self, generation: Generation, viewport: Box<Viewport>, cancel: &CancelFlag) {
        let Some(source) = self.source() else { return };
        let settings = self.display.snapshot();
        let Some(composite) = self.compositor.composite(&viewport, &settings, source.as_ref(), cancel) else {
            trace!(generation, "display task superseded");
            return;
        };
        if cancel.is_cancelled() || self.is_stale(generation) {
            trace!(generation, "frame superseded before delivery");
            return;
        }
        trace!(generation, level = viewport.resolution_index(), "frame ready");

        let overlay = ViewerTask::Overlay {
            generation,
            viewport: viewport.clone(),
        };
        self.emit(ViewerEvent::RasterReady(Box::new(Frame {
            generation,
            raster: composite.raster,
            stats: composite.stats,
            viewport: *viewport,
        })));
        if self.scheduler.submit(overlay).is_err() {
            trace!(generation, "overlay skipped, scheduler closed");
        }
    }

    fn run_overlay(&self, generation: Generation, viewport: &Viewport, cancel: &CancelFlag) {
        let Some(source) = self.source() else { return };
        if cancel.is_cancelled() {
            return;
        }
        let explored = self.explored_tiles(viewport);
        let shapes = build_overlay(
            viewport,
            source.pixel_size_um(),
            explored.as_ref(),
            self.config.show_scale_bar,
        );
        if cancel.is_cancelled() || self.closed.load(Ordering::Acquire) {
            return;
        }
        self.emit(ViewerEvent::OverlayReady { generation, shapes });
    }

    fn run_expand(&self, batch: Vec<AxisPositions>) {
        let mut changed = BTreeSet::new();
        let mut ranges = self.axis_ranges.lock().unwrap_or_else(PoisonError::into_inner);
        for positions in &batch {
            for (axis, value) in positions.iter() {
                match ranges.get_mut(axis) {
                    None => {
                        ranges.insert(axis.to_owned(), (value, value));
                        changed.insert(axis.to_owned());
                    }
                    Some((min, max)) => {
                        if value < *min || value > *max {
                            *min = (*min).min(value);
                            *max = (*max).max(value);
                            changed.insert(axis.to_owned());
                        }
                    }
                }
            }
        }
        let updates: Vec<_> = changed
            .into_iter()
            .filter_map(|axis| ranges.get(&axis).map(|&(min, max)| (axis, min, max)))
            .collect();
        drop(ranges);

        trace!(positions = batch.len(), changed = updates.len(), "axis ranges updated");
        for (axis, min, max) in updates {
            self.emit(ViewerEvent::AxisRangeExpanded { axis, min, max });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndv_core::axis::{CHANNEL, TIME};
    use ndv_core::{Rect, TileIndex};
    use ndv_io::MemoryTileSource;

    const WAIT: Duration = Duration::from_secs(10);

    fn pipeline(bounds: Option<Rect>) -> (RedrawPipeline, EventPump, Arc<MemoryTileSource>) {
        let source = Arc::new(match bounds {
            Some(b) => MemoryTileSource::bounded(16, 16, b, 2, 8).unwrap(),
            None => MemoryTileSource::explore(16, 16, 2, 8).unwrap(),
        });
        let config = ViewerConfig {
            display_size: [32, 32],
            ..ViewerConfig::default()
        };
        let (p, pump) = RedrawPipeline::new(source.clone(), Arc::new(DisplaySettings::new()), config).unwrap();
        (p, pump, source)
    }

    fn arrival(channel: &str, axes: AxisPositions) -> TileArrival {
        TileArrival {
            channel: channel.into(),
            axes,
            tile: Some(TileIndex::new(0, 0)),
            bit_depth: 8,
        }
    }

    #[test]
    fn triggers_bump_generation() {
        let (p, _pump, _) = pipeline(Some(Rect::new(0, 0, 64, 64)));
        assert_eq!(p.generation(), 0);
        p.zoom(0.5, None).unwrap();
        p.pan(3.0, 0.0).unwrap();
        p.set_axis_position(Z, 1).unwrap();
        assert_eq!(p.generation(), 3);
        assert!(p.wait_idle(WAIT));
        assert_eq!(p.state(), PipelineState::Idle);
    }

    #[test]
    fn new_channel_gets_configured_color_and_gamma() {
        let source = Arc::new(MemoryTileSource::bounded(16, 16, Rect::new(0, 0, 16, 16), 0, 8).unwrap());
        let config = ViewerConfig {
            display_size: [16, 16],
            default_gamma: 0.5,
            ..ViewerConfig::default()
        }
        .with_channel_color("GFP", ndv_lut::Rgb8::GREEN);
        let (p, _pump) = RedrawPipeline::new(source, Arc::new(DisplaySettings::new()), config).unwrap();

        p.new_tile_arrived(arrival("GFP", AxisPositions::standard())).unwrap();
        p.new_tile_arrived(arrival("DAPI", AxisPositions::standard())).unwrap();
        let gfp = p.display_settings().get("GFP").unwrap();
        assert_eq!(gfp.color(), ndv_lut::Rgb8::GREEN);
        assert_eq!(gfp.gamma(), 0.5);
        assert_eq!(p.display_settings().get("DAPI").unwrap().color(), ndv_lut::Rgb8::WHITE);
        p.close();
    }

    #[test]
    fn unlocked_axes_follow_new_data() {
        let (p, _pump, _) = pipeline(Some(Rect::new(0, 0, 64, 64)));
        p.set_axis_locked(TIME, true);
        p.new_tile_arrived(arrival("c", AxisPositions::standard().with(Z, 4).with(TIME, 7).with(CHANNEL, 2)))
            .unwrap();
        let vp = p.viewport();
        assert_eq!(vp.axis_position(Z), 4);
        assert_eq!(vp.axis_position(TIME), 0);
        assert_eq!(vp.axis_position(CHANNEL), 2);

        p.set_axis_locked(CHANNEL, true);
        p.new_tile_arrived(arrival("c", AxisPositions::standard().with(Z, 5).with(CHANNEL, 1)))
            .unwrap();
        let vp = p.viewport();
        assert_eq!(vp.axis_position(Z), 5);
        assert_eq!(vp.axis_position(CHANNEL), 2);

        assert!(p.wait_idle(WAIT));
        assert_eq!(p.axis_range(Z), Some((4, 5)));
        assert_eq!(p.axis_range(TIME), Some((0, 7)));
    }

    #[derive(Default)]
    struct Frames(Vec<Generation>);

    impl crate::Presentation for Frames {
        fn on_raster_ready(&mut self, frame: Frame) {
            self.0.push(frame.generation);
        }
        fn on_axis_range_expanded(&mut self, _: &str, _: i32, _: i32) {}
        fn on_overlay_ready(&mut self, _: Generation, _: Vec<crate::OverlayShape>) {}
    }

    #[test]
    fn superseded_frame_is_not_delivered() {
        let (p, mut pump, source) = pipeline(Some(Rect::new(0, 0, 32, 32)));
        source
            .insert_tile("c", &AxisPositions::standard(), TileIndex::new(0, 0), vec![9; 256])
            .unwrap();
        p.display_settings().register("c", ndv_lut::Rgb8::WHITE, 8).unwrap();

        // A trigger stamped generation 1 while generation 0 was compositing.
        let ViewerTask::Display { generation, viewport } = p.shared.display_task(&p.viewport()) else {
            unreachable!()
        };
        p.shared.run_display(0, viewport.clone(), &CancelFlag::new());
        let mut frames = Frames::default();
        pump.dispatch(&mut frames);
        assert!(frames.0.is_empty());

        let cancelled = CancelFlag::new();
        cancelled.cancel();
        p.shared.run_display(generation, viewport.clone(), &cancelled);
        pump.dispatch(&mut frames);
        assert!(frames.0.is_empty());

        p.shared.run_display(generation, viewport, &CancelFlag::new());
        pump.dispatch(&mut frames);
        assert_eq!(frames.0, vec![generation]);
    }

    #[test]
    fn explore_pan_stays_on_data() {
        let (p, _pump, source) = pipeline(None);
        source
            .insert_tile("c", &AxisPositions::standard(), TileIndex::new(0, 0), vec![1; 256])
            .unwrap();
        p.pan(10_000.0, 10_000.0).unwrap();
        let [x, y, w, h] = p.viewport().visible_region();
        // Pulled back next to tile (0, 0).
        assert!(x < 16.0 && y < 16.0, "{x} {y} {w} {h}");
        assert!(x + w > 0.0 && y + h > 0.0);
    }

    #[test]
    fn close_is_final_and_idempotent() {
        let (p, mut pump, _) = pipeline(Some(Rect::new(0, 0, 64, 64)));
        p.close();
        p.close();
        assert_eq!(p.state(), PipelineState::Closed);
        assert!(matches!(p.pan(1.0, 1.0), Err(ViewError::SchedulerClosed)));
        assert!(matches!(
            p.new_tile_arrived(arrival("c", AxisPositions::standard())),
            Err(ViewError::SchedulerClosed)
        ));

        struct Sink(usize);
        impl crate::Presentation for Sink {
            fn on_raster_ready(&mut self, _: Frame) {}
            fn on_axis_range_expanded(&mut self, _: &str, _: i32, _: i32) {}
            fn on_overlay_ready(&mut self, _: Generation, _: Vec<crate::OverlayShape>) {}
            fn on_closed(&mut self) {
                self.0 += 1;
            }
        }
        let mut sink = Sink(0);
        pump.dispatch(&mut sink);
        assert_eq!(sink.0, 1);
    }
}
