//! The CoDraw event protocol.
//!
//! A closed catalog of events exchanged between peers through the relay.
//! Every event is symmetric: the shape a client emits is the shape it
//! consumes, and both sides run the event through the same reducer.
//!
//! ## Wire format
//!
//! Events are JSON objects tagged on `"type"`:
//! ```json
//! { "type": "content-change", "content": "hello" }
//! { "type": "bold-change", "value": true }
//! { "type": "draw", "kind": "begin", "x": 10.0, "y": 20.0 }
//! { "type": "undo" }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised at the protocol boundary.
///
/// The original design let a malformed payload crash the consuming reducer;
/// here it is a contained error the caller logs and drops.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload did not match any event in the catalog.
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Stroke coordinates must be finite.
    #[error("non-finite stroke coordinate ({x}, {y})")]
    NonFinite { x: f64, y: f64 },
}

/// One datapoint of an in-progress pointer gesture.
///
/// Ephemeral: never stored, only relayed and replayed onto the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrokeEvent {
    /// Pointer pressed at `(x, y)`; starts a new stroke path.
    Begin { x: f64, y: f64 },
    /// Pointer moved to `(x, y)` while down; extends the current path.
    Segment { x: f64, y: f64 },
    /// Pointer released; closes the path.
    End,
}

/// A synchronized event, as relayed verbatim to every connected peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// Full replacement of the shared text content (last-writer-wins).
    ContentChange { content: String },
    /// New value of the bold flag.
    BoldChange { value: bool },
    /// New value of the italic flag.
    ItalicChange { value: bool },
    /// New value of the underline flag.
    UnderlineChange { value: bool },
    /// One step of a drawing gesture.
    Draw {
        #[serde(flatten)]
        stroke: StrokeEvent,
    },
    /// Bare signal: pop the receiver's undone stack.
    Undo,
    /// Bare signal: pop the receiver's redoable stack.
    Redo,
    /// Bare signal: clear the surface and both history stacks.
    EraseAll,
}

impl Event {
    /// Parse and validate an event from its wire representation.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let event: Event = serde_json::from_str(json)?;
        event.validate()?;
        Ok(event)
    }

    /// Serialize to the wire representation.
    pub fn to_json(&self) -> String {
        // The catalog contains no unserializable values.
        serde_json::to_string(self).expect("event serialization cannot fail")
    }

    /// Reject payloads JSON can technically carry but the protocol cannot.
    fn validate(&self) -> Result<(), ProtocolError> {
        if let Event::Draw { stroke } = self {
            match *stroke {
                StrokeEvent::Begin { x, y } | StrokeEvent::Segment { x, y } => {
                    if !x.is_finite() || !y.is_finite() {
                        return Err(ProtocolError::NonFinite { x, y });
                    }
                }
                StrokeEvent::End => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_change_roundtrip() {
        let event = Event::ContentChange {
            content: "hello".to_string(),
        };
        let json = event.to_json();
        assert!(json.contains("content-change"));
        assert_eq!(Event::from_json(&json).unwrap(), event);
    }

    #[test]
    fn test_style_event_names() {
        let json = Event::BoldChange { value: true }.to_json();
        assert!(json.contains("bold-change"));
        let json = Event::ItalicChange { value: false }.to_json();
        assert!(json.contains("italic-change"));
        let json = Event::UnderlineChange { value: true }.to_json();
        assert!(json.contains("underline-change"));
    }

    #[test]
    fn test_draw_payload_is_flattened() {
        let event = Event::Draw {
            stroke: StrokeEvent::Begin { x: 10.0, y: 20.0 },
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["type"], "draw");
        assert_eq!(value["kind"], "begin");
        assert_eq!(value["x"], 10.0);
        assert_eq!(value["y"], 20.0);
    }

    #[test]
    fn test_bare_signals_carry_no_payload() {
        assert_eq!(Event::Undo.to_json(), r#"{"type":"undo"}"#);
        assert_eq!(Event::Redo.to_json(), r#"{"type":"redo"}"#);
        assert_eq!(Event::EraseAll.to_json(), r#"{"type":"erase-all"}"#);
    }

    #[test]
    fn test_end_has_no_coordinates() {
        let event = Event::from_json(r#"{"type":"draw","kind":"end"}"#).unwrap();
        assert_eq!(
            event,
            Event::Draw {
                stroke: StrokeEvent::End
            }
        );
    }

    #[test]
    fn test_unknown_event_rejected() {
        let err = Event::from_json(r#"{"type":"resize","width":800}"#);
        assert!(matches!(err, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_wrong_payload_shape_rejected() {
        // bold-change with a string where a boolean belongs
        let err = Event::from_json(r#"{"type":"bold-change","value":"yes"}"#);
        assert!(matches!(err, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_missing_coordinates_rejected() {
        let err = Event::from_json(r#"{"type":"draw","kind":"begin","x":1.0}"#);
        assert!(matches!(err, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(Event::from_json("not json at all").is_err());
    }
}
