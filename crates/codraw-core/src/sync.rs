//! WebSocket client for the relay connection.
//!
//! Runs a blocking `tungstenite` socket on a background thread; the caller
//! drives it with a command channel and polls decoded events with
//! [`RelayClient::poll_events`], so a single-threaded UI loop never blocks
//! on the network.

use crate::protocol::Event;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tungstenite::{Message, connect};
use url::Url;

/// Connection-layer failures.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid relay URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events surfaced by the relay connection.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Connected to the relay.
    Connected,
    /// Connection closed or lost. Dropped connections are not retried.
    Disconnected,
    /// A relayed event, already parsed and validated.
    Received(Event),
    /// An inbound frame failed protocol validation and was dropped.
    Protocol { message: String },
    /// The connection could not be established.
    Error { message: String },
}

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// Relay connection for native platforms.
pub struct RelayClient {
    state: ConnectionState,
    events: Vec<SyncEvent>,
    /// Channel to send commands to the WebSocket thread.
    cmd_tx: Option<Sender<WsCommand>>,
    /// Channel to receive events from the WebSocket thread.
    event_rx: Option<Receiver<SyncEvent>>,
    /// Handle to the WebSocket thread.
    _thread: Option<JoinHandle<()>>,
}

impl RelayClient {
    /// Create a new disconnected client.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            events: Vec::new(),
            cmd_tx: None,
            event_rx: None,
            _thread: None,
        }
    }

    /// Connect to a relay endpoint (`ws://` or `wss://`).
    pub fn connect(&mut self, url: &str) -> Result<(), SyncError> {
        if self.cmd_tx.is_some() {
            return Err(SyncError::AlreadyConnected);
        }

        let parsed = Url::parse(url)?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(SyncError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        self.state = ConnectionState::Connecting;

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<SyncEvent>();
        let url = url.to_string();

        let handle = thread::spawn(move || run_socket(&url, &cmd_rx, &event_tx));

        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self._thread = Some(handle);

        Ok(())
    }

    /// Close the connection.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Send one event to the relay.
    pub fn send(&self, event: &Event) -> Result<(), SyncError> {
        let tx = self.cmd_tx.as_ref().ok_or(SyncError::NotConnected)?;
        tx.send(WsCommand::Send(event.to_json()))
            .map_err(|_| SyncError::NotConnected)
    }

    /// Poll for pending events (non-blocking).
    pub fn poll_events(&mut self) -> Vec<SyncEvent> {
        if let Some(ref rx) = self.event_rx {
            while let Ok(event) = rx.try_recv() {
                match &event {
                    SyncEvent::Connected => self.state = ConnectionState::Connected,
                    SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                    SyncEvent::Error { .. } => self.state = ConnectionState::Error,
                    _ => {}
                }
                self.events.push(event);
            }
        }
        std::mem::take(&mut self.events)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for RelayClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Body of the WebSocket thread.
fn run_socket(url: &str, cmd_rx: &Receiver<WsCommand>, event_tx: &Sender<SyncEvent>) {
    log::info!("relay thread: connecting to {}", url);

    let (mut socket, response) = match connect(url) {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("relay connection failed: {}", e);
            let _ = event_tx.send(SyncEvent::Error {
                message: format!("connection failed: {}", e),
            });
            return;
        }
    };
    log::info!("relay connected, status: {}", response.status());
    let _ = event_tx.send(SyncEvent::Connected);

    // Short read timeout so the loop can interleave sends and reads.
    if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
        let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
        let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
    }

    loop {
        // Commands first (non-blocking).
        match cmd_rx.try_recv() {
            Ok(WsCommand::Send(json)) => {
                if let Err(e) = socket.send(Message::Text(json)) {
                    log::error!("relay send error: {}", e);
                    break;
                }
            }
            Ok(WsCommand::Close) | Err(TryRecvError::Disconnected) => {
                let _ = socket.close(None);
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        // Then incoming frames (bounded by the read timeout).
        match socket.read() {
            Ok(Message::Text(text)) => match Event::from_json(&text) {
                Ok(event) => {
                    let _ = event_tx.send(SyncEvent::Received(event));
                }
                Err(e) => {
                    // Contained: log, surface, drop the frame.
                    log::warn!("dropping malformed relay frame: {}", e);
                    let _ = event_tx.send(SyncEvent::Protocol {
                        message: e.to_string(),
                    });
                }
            },
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // Ignore binary, pong
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                log::error!("relay read error: {}", e);
                break;
            }
        }
    }

    log::info!("relay thread exiting");
    let _ = event_tx.send(SyncEvent::Disconnected);
}
