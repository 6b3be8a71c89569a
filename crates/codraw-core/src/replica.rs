//! Per-client replica: the single reducer and the outgoing event queue.
//!
//! Every mutation follows the same loop on every client: apply locally,
//! queue for the relay, and later re-apply the echoed event along with
//! everyone else. "Apply remote" and "apply local" are one code path,
//! [`Replica::apply`]; local input only differs in what it does *around*
//! that call (queueing the event, committing stroke history). Bare
//! undo/redo/erase signals are only applied when echoed back, since they
//! are not idempotent.

use crate::document::DocumentState;
use crate::drawing::DrawingEngine;
use crate::protocol::{Event, ProtocolError, StrokeEvent};

/// One client's view of the shared document and drawing.
#[derive(Debug, Default)]
pub struct Replica {
    document: DocumentState,
    drawing: DrawingEngine,
    /// Pointer currently held down by the local user. Gates move sampling
    /// only; the drawing engine's own state is driven by events.
    pointer_down: bool,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
}

impl Replica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a replica with a custom snapshot history cap.
    pub fn with_history_cap(cap: usize) -> Self {
        Self {
            drawing: DrawingEngine::with_history_cap(cap),
            ..Self::default()
        }
    }

    pub fn document(&self) -> &DocumentState {
        &self.document
    }

    pub fn drawing(&self) -> &DrawingEngine {
        &self.drawing
    }

    // --- The reducer ---

    /// Apply one event to local state, regardless of origin.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::ContentChange { content } => self.document.set_content(content.clone()),
            Event::BoldChange { value } => self.document.set_bold(*value),
            Event::ItalicChange { value } => self.document.set_italic(*value),
            Event::UnderlineChange { value } => self.document.set_underline(*value),
            Event::Draw { stroke } => self.drawing.apply(*stroke),
            Event::Undo => self.drawing.undo(),
            Event::Redo => self.drawing.redo(),
            Event::EraseAll => self.drawing.erase_all(),
        }
    }

    /// Parse, validate and apply an event received from the relay.
    ///
    /// Malformed payloads are returned as errors and leave state untouched;
    /// the caller logs and drops them.
    pub fn handle_message(&mut self, json: &str) -> Result<Event, ProtocolError> {
        let event = Event::from_json(json)?;
        self.apply(&event);
        Ok(event)
    }

    // --- Local input ---

    fn emit(&mut self, event: Event) {
        self.apply(&event);
        self.outgoing.push(event.to_json());
    }

    /// Queue without applying. The relay echoes every event back to its
    /// sender, and popping a history stack is not idempotent: applying a
    /// bare signal both here and on its echo would pop twice per command.
    /// The echo is the single application on the originator.
    fn emit_deferred(&mut self, event: Event) {
        self.outgoing.push(event.to_json());
    }

    /// Replace the document text, as typed by the local user.
    pub fn edit_text(&mut self, content: &str) {
        self.emit(Event::ContentChange {
            content: content.to_string(),
        });
    }

    pub fn toggle_bold(&mut self) {
        let value = !self.document.bold;
        self.emit(Event::BoldChange { value });
    }

    pub fn toggle_italic(&mut self) {
        let value = !self.document.italic;
        self.emit(Event::ItalicChange { value });
    }

    pub fn toggle_underline(&mut self) {
        let value = !self.document.underline;
        self.emit(Event::UnderlineChange { value });
    }

    /// Local pointer pressed at `(x, y)`: start a stroke.
    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.pointer_down = true;
        self.emit(Event::Draw {
            stroke: StrokeEvent::Begin { x, y },
        });
    }

    /// Local pointer sample while drawing. Ignored when the pointer is up.
    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        if !self.pointer_down {
            return;
        }
        self.emit(Event::Draw {
            stroke: StrokeEvent::Segment { x, y },
        });
    }

    /// Local pointer released: close the stroke and commit it to history.
    ///
    /// The snapshot commit happens here and not in the reducer: only the
    /// stroke's author appends to its history stacks.
    pub fn pointer_up(&mut self) {
        if !self.pointer_down {
            return;
        }
        self.pointer_down = false;
        self.emit(Event::Draw {
            stroke: StrokeEvent::End,
        });
        self.drawing.commit_stroke();
    }

    pub fn undo(&mut self) {
        self.emit_deferred(Event::Undo);
    }

    pub fn redo(&mut self) {
        self.emit_deferred(Event::Redo);
    }

    pub fn erase_all(&mut self) {
        self.emit_deferred(Event::EraseAll);
    }

    // --- Outgoing queue ---

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Line;
    use std::collections::HashSet;

    /// Deliver every queued event from `from` to all replicas, the way the
    /// relay does: in order, to everyone, sender included.
    fn relay(from: usize, replicas: &mut [Replica]) {
        let messages = replicas[from].take_outgoing();
        for message in messages {
            for replica in replicas.iter_mut() {
                replica.handle_message(&message).unwrap();
            }
        }
    }

    /// Unique stroked segments. The author applies its own events twice
    /// (locally, then echoed back), which re-strokes the same geometry the
    /// way re-stroking a canvas repaints the same pixels; coverage is the
    /// meaningful notion of equality across peers.
    fn coverage(replica: &Replica) -> HashSet<[u64; 4]> {
        replica
            .drawing()
            .surface()
            .segments()
            .iter()
            .map(|line| {
                [
                    line.p0.x.to_bits(),
                    line.p0.y.to_bits(),
                    line.p1.x.to_bits(),
                    line.p1.y.to_bits(),
                ]
            })
            .collect()
    }

    #[test]
    fn test_local_edit_applies_immediately() {
        let mut replica = Replica::new();
        replica.edit_text("hello");
        assert_eq!(replica.document().content, "hello");
        assert!(replica.has_outgoing());
    }

    #[test]
    fn test_replication_convergence() {
        let mut clients = [Replica::new(), Replica::new(), Replica::new()];
        clients[0].edit_text("hello");
        relay(0, &mut clients);
        for client in &clients {
            assert_eq!(client.document().content, "hello");
        }
    }

    #[test]
    fn test_concrete_three_client_scenario() {
        let mut clients = [Replica::new(), Replica::new(), Replica::new()];

        clients[0].edit_text("hello");
        relay(0, &mut clients);
        assert_eq!(clients[1].document().content, "hello");
        assert_eq!(clients[2].document().content, "hello");

        clients[1].toggle_bold();
        relay(1, &mut clients);
        assert!(clients[0].document().bold);
        assert!(clients[2].document().bold);
        assert_eq!(clients[0].document().content, "hello");
        assert_eq!(clients[2].document().content, "hello");
    }

    #[test]
    fn test_style_toggle_idempotence() {
        let mut clients = [Replica::new(), Replica::new()];
        clients[0].toggle_bold();
        relay(0, &mut clients);
        clients[0].toggle_bold();
        relay(0, &mut clients);
        assert!(!clients[0].document().bold);
        assert!(!clients[1].document().bold);
    }

    #[test]
    fn test_last_writer_wins_drops_racing_edit() {
        let mut clients = [Replica::new(), Replica::new()];
        // Both edit before either relay runs; hub-arrival order decides.
        clients[0].edit_text("from zero");
        clients[1].edit_text("from one");
        relay(0, &mut clients);
        relay(1, &mut clients);
        // The earlier write is silently lost on every replica.
        assert_eq!(clients[0].document().content, "from one");
        assert_eq!(clients[1].document().content, "from one");
    }

    #[test]
    fn test_stroke_visible_to_peers_mid_draw() {
        let mut clients = [Replica::new(), Replica::new()];
        clients[0].pointer_down(0.0, 0.0);
        clients[0].pointer_moved(5.0, 5.0);
        relay(0, &mut clients);
        // No End yet, but the peer already shows the segment.
        assert_eq!(clients[1].drawing().surface().segments().len(), 1);
        assert!(clients[1].drawing().is_active());
    }

    #[test]
    fn test_pointer_moves_ignored_while_up() {
        let mut replica = Replica::new();
        replica.pointer_moved(1.0, 1.0);
        assert!(!replica.has_outgoing());
        assert!(replica.drawing().surface().is_blank());
    }

    #[test]
    fn test_pointer_up_without_down_emits_nothing() {
        let mut replica = Replica::new();
        replica.pointer_up();
        assert!(!replica.has_outgoing());
    }

    #[test]
    fn test_only_author_commits_history() {
        let mut clients = [Replica::new(), Replica::new()];
        clients[0].pointer_down(0.0, 0.0);
        clients[0].pointer_moved(2.0, 2.0);
        clients[0].pointer_up();
        relay(0, &mut clients);

        assert_eq!(clients[0].drawing().undone_len(), 1);
        assert_eq!(clients[1].drawing().undone_len(), 0);
        // Geometry converged all the same.
        assert_eq!(coverage(&clients[0]), coverage(&clients[1]));
    }

    #[test]
    fn test_undo_divergence_across_peers() {
        // A bare undo signal pops the author's stack but no-ops on a peer
        // whose stack is empty, so the peer keeps showing the stroke. This
        // is the documented divergence of per-peer history, preserved
        // rather than patched.
        let mut clients = [Replica::new(), Replica::new()];
        clients[0].pointer_down(0.0, 0.0);
        clients[0].pointer_moved(4.0, 0.0);
        clients[0].pointer_up();
        relay(0, &mut clients);

        clients[0].undo();
        relay(0, &mut clients);

        assert!(clients[0].drawing().surface().is_blank());
        assert_eq!(clients[1].drawing().surface().segments().len(), 1);
    }

    #[test]
    fn test_single_undo_pops_one_snapshot_on_author() {
        // The author's own undo comes back through the self-inclusive
        // broadcast; it must still pop exactly once per command.
        let mut clients = [Replica::new(), Replica::new()];
        clients[0].pointer_down(0.0, 0.0);
        clients[0].pointer_moved(4.0, 0.0);
        clients[0].pointer_up();
        clients[0].pointer_down(0.0, 5.0);
        clients[0].pointer_moved(4.0, 5.0);
        clients[0].pointer_up();
        relay(0, &mut clients);
        assert_eq!(clients[0].drawing().undone_len(), 2);

        clients[0].undo();
        relay(0, &mut clients);

        assert_eq!(clients[0].drawing().undone_len(), 1);
        assert_eq!(clients[0].drawing().redoable_len(), 1);
        // The first stroke is still painted.
        assert_eq!(
            clients[0].drawing().surface().segments(),
            &[Line::new((0.0, 0.0), (4.0, 0.0))]
        );
    }

    #[test]
    fn test_undo_redo_round_trip_through_relay() {
        let mut clients = [Replica::new(), Replica::new()];
        clients[0].pointer_down(0.0, 0.0);
        clients[0].pointer_moved(4.0, 0.0);
        clients[0].pointer_up();
        clients[0].pointer_down(0.0, 5.0);
        clients[0].pointer_moved(4.0, 5.0);
        clients[0].pointer_up();
        relay(0, &mut clients);
        let before = coverage(&clients[0]);

        clients[0].undo();
        relay(0, &mut clients);
        clients[0].redo();
        relay(0, &mut clients);

        assert_eq!(clients[0].drawing().undone_len(), 2);
        assert_eq!(clients[0].drawing().redoable_len(), 0);
        assert_eq!(coverage(&clients[0]), before);
    }

    #[test]
    fn test_erase_all_converges_everywhere() {
        let mut clients = [Replica::new(), Replica::new()];
        clients[0].pointer_down(0.0, 0.0);
        clients[0].pointer_moved(4.0, 0.0);
        clients[0].pointer_up();
        relay(0, &mut clients);

        clients[1].erase_all();
        relay(1, &mut clients);

        for client in &clients {
            assert!(client.drawing().surface().is_blank());
            assert_eq!(client.drawing().undone_len(), 0);
            assert_eq!(client.drawing().redoable_len(), 0);
        }
    }

    #[test]
    fn test_malformed_message_leaves_state_untouched() {
        let mut replica = Replica::new();
        replica.edit_text("keep me");
        replica.take_outgoing();

        assert!(replica.handle_message(r#"{"type":"bold-change"}"#).is_err());
        assert!(replica.handle_message("garbage").is_err());

        assert_eq!(replica.document().content, "keep me");
        assert!(!replica.document().bold);
    }

    #[test]
    fn test_own_echo_is_idempotent_for_document_state() {
        // Self-inclusive broadcast re-applies the author's own events.
        let mut clients = [Replica::new()];
        clients[0].edit_text("echo");
        clients[0].toggle_bold();
        relay(0, &mut clients);
        assert_eq!(clients[0].document().content, "echo");
        assert!(clients[0].document().bold);
    }
}
