//! Drawing engine: stroke capture, surface snapshots and undo/redo history.
//!
//! Rendering primitives are an external collaborator; the engine retains the
//! *geometry* that has been stroked onto the surface. Like an immediate-mode
//! canvas, a stroked segment persists even if the current path is later
//! reset, so the surface is a flat list of line segments rather than a list
//! of paths.

use crate::protocol::StrokeEvent;
use kurbo::{Line, Point};
use std::sync::Arc;

/// Default cap on the number of retained snapshots per stack.
pub const MAX_HISTORY: usize = 50;

/// An immutable full-surface capture, taken when a stroke completes.
///
/// Snapshots are cheap to clone and share their segment storage.
#[derive(Debug, Clone)]
pub struct Snapshot {
    segments: Arc<[Line]>,
}

impl Snapshot {
    /// The captured segments, in stroke order.
    pub fn segments(&self) -> &[Line] {
        &self.segments
    }

    /// Whether the capture shows a blank surface.
    pub fn is_blank(&self) -> bool {
        self.segments.is_empty()
    }
}

/// The drawing surface stand-in.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    segments: Vec<Line>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stroke one line segment onto the surface.
    pub fn stroke_segment(&mut self, segment: Line) {
        self.segments.push(segment);
    }

    /// Wipe the surface blank.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn is_blank(&self) -> bool {
        self.segments.is_empty()
    }

    /// Everything currently stroked, in stroke order.
    pub fn segments(&self) -> &[Line] {
        &self.segments
    }

    /// Capture the full surface as an immutable snapshot.
    pub fn capture(&self) -> Snapshot {
        Snapshot {
            segments: self.segments.clone().into(),
        }
    }

    /// Replace the surface contents with a previous capture.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.segments = snapshot.segments().to_vec();
    }
}

/// Pen position tracking for the stroke state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Pen {
    Idle,
    Active { last: Point },
}

/// Per-client drawing state machine and history.
///
/// The same `apply` drives both locally-captured pointer input and stroke
/// events replayed from peers, so a peer's half-finished stroke is visible
/// mid-draw. History is local only: snapshots are committed by the stroke's
/// author (see [`DrawingEngine::commit_stroke`]), never on replay, while the
/// bare `undo`/`redo` signals are applied by everyone. Peers therefore carry
/// independently-sized stacks, and a relayed undo can pop a different stroke
/// on different machines. That divergence is part of the protocol's
/// contract, not something the engine papers over.
#[derive(Debug, Clone)]
pub struct DrawingEngine {
    surface: Surface,
    pen: Pen,
    /// Snapshots of completed strokes, oldest first (LIFO via pop).
    undone: Vec<Snapshot>,
    /// Snapshots popped by undo, awaiting redo (LIFO via pop).
    redoable: Vec<Snapshot>,
    /// Cap on each stack; the oldest snapshot is evicted beyond it.
    max_history: usize,
}

impl Default for DrawingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingEngine {
    pub fn new() -> Self {
        Self::with_history_cap(MAX_HISTORY)
    }

    /// Create an engine retaining at most `cap` snapshots per stack.
    pub fn with_history_cap(cap: usize) -> Self {
        Self {
            surface: Surface::new(),
            pen: Pen::Idle,
            undone: Vec::new(),
            redoable: Vec::new(),
            max_history: cap,
        }
    }

    /// Advance the stroke state machine by one event.
    ///
    /// This is the single code path for local input and remote replay.
    pub fn apply(&mut self, stroke: StrokeEvent) {
        match stroke {
            StrokeEvent::Begin { x, y } => {
                self.pen = Pen::Active {
                    last: Point::new(x, y),
                };
            }
            StrokeEvent::Segment { x, y } => {
                let point = Point::new(x, y);
                match self.pen {
                    Pen::Active { last } => {
                        self.surface.stroke_segment(Line::new(last, point));
                        self.pen = Pen::Active { last: point };
                    }
                    // Segment without a begin (e.g. we joined mid-stroke):
                    // adopt the position, stroke nothing. Matches lineTo on
                    // an empty canvas path.
                    Pen::Idle => {
                        self.pen = Pen::Active { last: point };
                    }
                }
            }
            // End while idle is a no-op; the author sees its own End echoed
            // back after having already closed the path locally.
            StrokeEvent::End => {
                self.pen = Pen::Idle;
            }
        }
    }

    /// Whether a stroke is currently in progress on this replica.
    pub fn is_active(&self) -> bool {
        matches!(self.pen, Pen::Active { .. })
    }

    /// Commit the just-finished stroke to local history.
    ///
    /// Called on local pointer release only. Replayed remote strokes never
    /// commit: only the stroke's author appends a snapshot.
    pub fn commit_stroke(&mut self) {
        self.undone.push(self.surface.capture());
        // A new stroke invalidates any pending redo.
        self.redoable.clear();
        if self.undone.len() > self.max_history {
            self.undone.remove(0);
        }
    }

    /// Pop the last committed snapshot and repaint the one before it.
    ///
    /// No-op when nothing was committed on this replica, even if the surface
    /// shows strokes drawn by peers.
    pub fn undo(&mut self) {
        let Some(snapshot) = self.undone.pop() else {
            return;
        };
        self.redoable.push(snapshot);
        self.surface.clear();
        if let Some(previous) = self.undone.last() {
            self.surface.restore(previous);
        }
    }

    /// Mirror of [`DrawingEngine::undo`]: repaint the last undone snapshot.
    pub fn redo(&mut self) {
        let Some(snapshot) = self.redoable.pop() else {
            return;
        };
        self.surface.restore(&snapshot);
        self.undone.push(snapshot);
    }

    /// Clear the surface and both history stacks.
    pub fn erase_all(&mut self) {
        self.surface.clear();
        self.undone.clear();
        self.redoable.clear();
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn undone_len(&self) -> usize {
        self.undone.len()
    }

    pub fn redoable_len(&self) -> usize {
        self.redoable.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redoable.is_empty()
    }
}
