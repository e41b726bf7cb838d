//! Handoff from pipeline workers to the presentation layer.
//!
//! Workers send [`ViewerEvent`]s; the presentation thread drains them with an
//! [`EventPump`], which hands only the newest frame and overlay to the
//! [`Presentation`]:
//!
//! ```text
//! display worker ──RasterReady(g)──┐
//! overlay worker ──OverlayReady(g)─┼──► mpsc ──► EventPump::dispatch ──► Presentation
//! expand worker ──AxisRangeExpanded┘              (newest g only)
//! ```

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use tracing::trace;

use ndv_compose::{ChannelStats, RgbRaster};
use ndv_core::Viewport;

use crate::overlay::OverlayShape;
use crate::task::Generation;

/// A finished display image.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Generation of the snapshot it was drawn from
    pub generation: Generation,
    /// Composite at the snapshot's pyramid level
    pub raster: RgbRaster,
    /// Raw statistics per drawn channel
    pub stats: Vec<ChannelStats>,
    /// The snapshot itself, for placing the raster on the canvas
    pub viewport: Viewport,
}

/// Events from pipeline workers.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    /// A display image is ready.
    RasterReady(Box<Frame>),
    /// The acquired range of an axis grew.
    AxisRangeExpanded {
        /// Axis name
        axis: String,
        /// Smallest position seen
        min: i32,
        /// Largest position seen
        max: i32,
    },
    /// Overlay shapes for a frame are ready.
    OverlayReady {
        /// Generation of the frame
        generation: Generation,
        /// Shapes in screen pixels
        shapes: Vec<OverlayShape>,
    },
    /// The pipeline shut down. No further events follow.
    Closed,
}

/// Consumer of pipeline output. Called on the thread that runs the pump.
pub trait Presentation {
    /// A new display image replaces the previous one.
    fn on_raster_ready(&mut self, frame: Frame);

    /// An axis slider should now span `[min, max]`.
    fn on_axis_range_expanded(&mut self, axis: &str, min: i32, max: i32);

    /// Overlay shapes for the frame of `generation`.
    fn on_overlay_ready(&mut self, generation: Generation, shapes: Vec<OverlayShape>);

    /// The pipeline was closed.
    fn on_closed(&mut self) {}
}

/// Drains pipeline events and coalesces them for a [`Presentation`].
#[derive(Debug)]
pub struct EventPump {
    rx: Receiver<ViewerEvent>,
    last_raster: Option<Generation>,
    closed: bool,
}

impl EventPump {
    pub(crate) fn new(rx: Receiver<ViewerEvent>) -> Self {
        Self {
            rx,
            last_raster: None,
            closed: false,
        }
    }

    /// Delivers everything received so far without blocking.
    ///
    /// Of several pending frames only the newest is delivered, likewise for
    /// overlays. Anything older than an already delivered frame is dropped,
    /// as is everything once `Closed` has been delivered.
    /// Returns the number of callbacks made.
    pub fn dispatch(&mut self, presentation: &mut dyn Presentation) -> usize {
        if self.closed {
            self.discard();
            return 0;
        }
        let mut pending = Vec::new();
        self.drain_into(&mut pending);
        self.deliver(pending, presentation)
    }

    /// Waits up to `timeout` for at least one event, then dispatches.
    pub fn dispatch_timeout(&mut self, presentation: &mut dyn Presentation, timeout: Duration) -> usize {
        if self.closed {
            self.discard();
            return 0;
        }
        let mut pending = match self.rx.recv_timeout(timeout) {
            Ok(event) => vec![event],
            Err(RecvTimeoutError::Timeout) => return 0,
            Err(RecvTimeoutError::Disconnected) => vec![ViewerEvent::Closed],
        };
        self.drain_into(&mut pending);
        self.deliver(pending, presentation)
    }

    /// Returns `true` once `Closed` has been delivered.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Late events from workers that outlived `close()`.
    fn discard(&self) {
        let dropped = self.rx.try_iter().count();
        if dropped > 0 {
            trace!(dropped, "discarding events after close");
        }
    }

    fn drain_into(&self, pending: &mut Vec<ViewerEvent>) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => pending.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        pending.push(ViewerEvent::Closed);
                    }
                    break;
                }
            }
        }
    }

    fn deliver(&mut self, events: Vec<ViewerEvent>, presentation: &mut dyn Presentation) -> usize {
        let mut raster: Option<Box<Frame>> = None;
        let mut overlay: Option<(Generation, Vec<OverlayShape>)> = None;
        let mut closed = false;
        let mut count = 0;

        for event in events {
            match event {
                ViewerEvent::RasterReady(frame) => {
                    if raster.as_ref().is_none_or(|r| frame.generation > r.generation) {
                        raster = Some(frame);
                    }
                }
                ViewerEvent::OverlayReady { generation, shapes } => {
                    if overlay.as_ref().is_none_or(|(g, _)| generation > *g) {
                        overlay = Some((generation, shapes));
                    }
                }
                ViewerEvent::AxisRangeExpanded { axis, min, max } => {
                    presentation.on_axis_range_expanded(&axis, min, max);
                    count += 1;
                }
                ViewerEvent::Closed => {
                    closed = true;
                    break;
                }
            }
        }

        if let Some(frame) = raster {
            if self.last_raster.is_none_or(|last| frame.generation > last) {
                self.last_raster = Some(frame.generation);
                presentation.on_raster_ready(*frame);
                count += 1;
            }
        }
        if let Some((generation, shapes)) = overlay {
            if self.last_raster.is_none_or(|last| generation >= last) {
                presentation.on_overlay_ready(generation, shapes);
                count += 1;
            }
        }
        if closed && !self.closed {
            self.closed = true;
            presentation.on_closed();
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<Generation>,
        overlays: Vec<Generation>,
        ranges: Vec<(String, i32, i32)>,
        closed: usize,
    }

    impl Presentation for Recorder {
        fn on_raster_ready(&mut self, frame: Frame) {
            self.frames.push(frame.generation);
        }
        fn on_axis_range_expanded(&mut self, axis: &str, min: i32, max: i32) {
            self.ranges.push((axis.to_owned(), min, max));
        }
        fn on_overlay_ready(&mut self, generation: Generation, _shapes: Vec<OverlayShape>) {
            self.overlays.push(generation);
        }
        fn on_closed(&mut self) {
            self.closed += 1;
        }
    }

    fn frame(generation: Generation) -> ViewerEvent {
        ViewerEvent::RasterReady(Box::new(Frame {
            generation,
            raster: RgbRaster::new(1, 1),
            stats: Vec::new(),
            viewport: Viewport::new(1, 1, None, 0).unwrap(),
        }))
    }

    #[test]
    fn newest_frame_wins() {
        let (tx, rx) = mpsc::channel();
        let mut pump = EventPump::new(rx);
        let mut rec = Recorder::default();
        for g in [3, 5, 4] {
            tx.send(frame(g)).unwrap();
        }
        assert_eq!(pump.dispatch(&mut rec), 1);
        assert_eq!(rec.frames, vec![5]);

        tx.send(frame(4)).unwrap();
        assert_eq!(pump.dispatch(&mut rec), 0);
        tx.send(frame(6)).unwrap();
        pump.dispatch(&mut rec);
        assert_eq!(rec.frames, vec![5, 6]);
    }

    #[test]
    fn stale_overlay_dropped() {
        let (tx, rx) = mpsc::channel();
        let mut pump = EventPump::new(rx);
        let mut rec = Recorder::default();
        tx.send(frame(2)).unwrap();
        tx.send(ViewerEvent::OverlayReady { generation: 1, shapes: Vec::new() }).unwrap();
        pump.dispatch(&mut rec);
        assert!(rec.overlays.is_empty());

        tx.send(ViewerEvent::OverlayReady { generation: 2, shapes: Vec::new() }).unwrap();
        pump.dispatch(&mut rec);
        assert_eq!(rec.overlays, vec![2]);
    }

    #[test]
    fn axis_events_all_delivered_in_order() {
        let (tx, rx) = mpsc::channel();
        let mut pump = EventPump::new(rx);
        let mut rec = Recorder::default();
        for max in 1..=3 {
            tx.send(ViewerEvent::AxisRangeExpanded { axis: "z".into(), min: 0, max }).unwrap();
        }
        assert_eq!(pump.dispatch(&mut rec), 3);
        assert_eq!(rec.ranges.last(), Some(&("z".to_owned(), 0, 3)));
    }

    #[test]
    fn closed_once_even_after_disconnect() {
        let (tx, rx) = mpsc::channel();
        let mut pump = EventPump::new(rx);
        let mut rec = Recorder::default();
        tx.send(ViewerEvent::Closed).unwrap();
        drop(tx);
        pump.dispatch(&mut rec);
        pump.dispatch(&mut rec);
        assert_eq!(rec.closed, 1);
        assert!(pump.is_closed());
        assert_eq!(pump.dispatch_timeout(&mut rec, Duration::from_millis(1)), 0);
    }

    #[test]
    fn nothing_after_close() {
        let (tx, rx) = mpsc::channel();
        let mut pump = EventPump::new(rx);
        let mut rec = Recorder::default();
        tx.send(frame(1)).unwrap();
        tx.send(ViewerEvent::Closed).unwrap();
        tx.send(frame(2)).unwrap();
        pump.dispatch(&mut rec);
        assert_eq!(rec.frames, vec![1]);
        assert_eq!(rec.closed, 1);

        // A worker that outlived shutdown.
        tx.send(frame(3)).unwrap();
        tx.send(ViewerEvent::OverlayReady { generation: 3, shapes: Vec::new() }).unwrap();
        assert_eq!(pump.dispatch(&mut rec), 0);
        assert_eq!(rec.frames, vec![1]);
        assert!(rec.overlays.is_empty());
    }
}
