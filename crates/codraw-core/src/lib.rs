//! CoDraw Core Library
//!
//! Event protocol, document replica, drawing engine and relay client for the
//! CoDraw collaborative editor. Platform rendering and UI live elsewhere;
//! this crate owns the synchronization semantics.

pub mod document;
pub mod drawing;
pub mod protocol;
pub mod replica;
pub mod sync;

pub use document::DocumentState;
pub use drawing::{DrawingEngine, Snapshot, Surface};
pub use protocol::{Event, ProtocolError, StrokeEvent};
pub use replica::Replica;
pub use sync::{ConnectionState, RelayClient, SyncEvent};
