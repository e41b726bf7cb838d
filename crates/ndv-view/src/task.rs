//! Work items of the redraw pipeline.

use ndv_core::{AxisPositions, Viewport};

use crate::scheduler::Coalesce;

/// Monotonic counter stamped on every display snapshot.
pub type Generation = u64;

/// Scheduler lane of a [`ViewerTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Recompute the display image.
    Display,
    /// Recompute overlay shapes.
    Overlay,
    /// Grow axis ranges for newly arrived data.
    ExpandAxisRange,
}

/// A unit of redraw work.
#[derive(Debug, Clone)]
pub enum ViewerTask {
    /// Composite the given snapshot.
    Display {
        /// Generation of the snapshot
        generation: Generation,
        /// Viewport to draw
        viewport: Box<Viewport>,
    },
    /// Build overlay shapes for the given snapshot.
    Overlay {
        /// Generation of the frame the overlay belongs to
        generation: Generation,
        /// Viewport the frame was drawn with
        viewport: Box<Viewport>,
    },
    /// Positions of newly arrived tiles, oldest first.
    ExpandAxisRange(Vec<AxisPositions>),
}

impl Coalesce for ViewerTask {
    type Kind = TaskKind;

    fn kind(&self) -> TaskKind {
        match self {
            Self::Display { .. } => TaskKind::Display,
            Self::Overlay { .. } => TaskKind::Overlay,
            Self::ExpandAxisRange(_) => TaskKind::ExpandAxisRange,
        }
    }

    fn merge(self, newer: Self) -> Self {
        match (self, newer) {
            (Self::ExpandAxisRange(mut queued), Self::ExpandAxisRange(arrived)) => {
                queued.extend(arrived);
                Self::ExpandAxisRange(queued)
            }
            (_, newer) => newer,
        }
    }

    fn cancels_running(&self) -> bool {
        !matches!(self, Self::ExpandAxisRange(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndv_core::axis::Z;

    fn display(generation: Generation) -> ViewerTask {
        ViewerTask::Display {
            generation,
            viewport: Box::new(Viewport::new(10, 10, None, 0).unwrap()),
        }
    }

    #[test]
    fn display_keeps_newest() {
        match display(1).merge(display(2)) {
            ViewerTask::Display { generation, .. } => assert_eq!(generation, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn axis_batches_accumulate_in_order() {
        let a = ViewerTask::ExpandAxisRange(vec![AxisPositions::standard().with(Z, 1)]);
        let b = ViewerTask::ExpandAxisRange(vec![AxisPositions::standard().with(Z, 2)]);
        match a.merge(b) {
            ViewerTask::ExpandAxisRange(batch) => {
                let zs: Vec<_> = batch.iter().map(|p| p.get(Z)).collect();
                assert_eq!(zs, vec![1, 2]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_accumulating_kind_spares_running_work() {
        assert!(display(0).cancels_running());
        assert!(!ViewerTask::ExpandAxisRange(Vec::new()).cancels_running());
        assert_eq!(display(0).kind(), TaskKind::Display);
    }
}
