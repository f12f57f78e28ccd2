//! Server-side client session
//!
//! One session per accepted connection. The session owns the peer's socket:
//! its receive loop reads frames and relays them to every other registered
//! session, and its [`ClientSession::send`] is what those other sessions (and
//! server broadcasts) call to reach this peer.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::FrameCodec;
use crate::message::{is_exit_signal, ChatMessage};
use crate::registry::SessionRegistry;
use crate::sink::{DisplayEvent, DisplaySink};
use crate::types::SessionId;

type FrameReader = FramedRead<OwnedReadHalf, FrameCodec>;
type FrameWriter = FramedWrite<OwnedWriteHalf, FrameCodec>;

/// How long `close()` waits for buffered frames to drain
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Sender shown in the server transcript for payloads without a separator
const UNTAGGED_SENDER: &str = "Client";

/// One connected peer, as seen by the server
pub struct ClientSession {
    /// Registry key
    id: SessionId,
    /// Remote IP address, for notices
    peer: String,
    /// Eligible for reads and broadcast delivery
    active: AtomicBool,
    /// Set once by `close()`
    closed: AtomicBool,
    /// Taken by the receive loop when it starts
    reader: Mutex<Option<FrameReader>>,
    /// Outbound half; one writer at a time
    writer: Mutex<Option<FrameWriter>>,
    /// Unblocks a pending read on close
    shutdown: CancellationToken,
    sink: Arc<dyn DisplaySink>,
}

impl ClientSession {
    /// Wrap an accepted connection
    ///
    /// If the socket cannot be configured the session starts inactive and
    /// its receive loop returns immediately.
    pub fn new(stream: TcpStream, peer: SocketAddr, sink: Arc<dyn DisplaySink>) -> Arc<Self> {
        let id = SessionId::new();
        let peer = peer.ip().to_string();

        let active = match stream.set_nodelay(true) {
            Ok(()) => true,
            Err(e) => {
                warn!(session = %id, %peer, error = %e, "session setup failed");
                sink.deliver(DisplayEvent::system(format!(
                    "Error setting up client handler: {e}"
                )));
                false
            }
        };

        let (read_half, write_half) = stream.into_split();

        Arc::new(Self {
            id,
            peer,
            active: AtomicBool::new(active),
            closed: AtomicBool::new(false),
            reader: Mutex::new(Some(FramedRead::new(read_half, FrameCodec::new()))),
            writer: Mutex::new(Some(FramedWrite::new(write_half, FrameCodec::new()))),
            shutdown: CancellationToken::new(),
            sink,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Run the receive loop until the peer leaves or the session is closed
    ///
    /// Every exit path closes the session and removes it from `registry`.
    pub async fn run(self: Arc<Self>, registry: SessionRegistry) {
        let reader = self.reader.lock().await.take();
        if let Some(mut reader) = reader {
            if self.is_active() {
                self.receive_loop(&mut reader, &registry).await;
            }
        }

        self.close().await;
        registry.remove(self.id).await;
        debug!(session = %self.id, "session removed");
    }

    async fn receive_loop(&self, reader: &mut FrameReader, registry: &SessionRegistry) {
        while self.is_active() {
            let frame = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                frame = reader.next() => frame,
            };

            match frame {
                Some(Ok(payload)) => {
                    if is_exit_signal(&payload) {
                        info!(session = %self.id, peer = %self.peer, "client sent exit signal");
                        self.notify(format!("Client {} has disconnected", self.peer));
                        break;
                    }

                    self.show(&payload);
                    self.relay(&payload, registry).await;
                }
                Some(Err(e)) => {
                    // A failed read after close() is the expected result of our own shutdown.
                    if self.is_active() {
                        warn!(session = %self.id, peer = %self.peer, error = %e, "frame read failed");
                        self.notify(format!("Lost connection to client {}: {e}", self.peer));
                    }
                    break;
                }
                None => {
                    if self.is_active() {
                        info!(session = %self.id, peer = %self.peer, "client closed connection");
                        self.notify(format!("Client {} has disconnected", self.peer));
                    }
                    break;
                }
            }
        }
    }

    /// Put a received payload on the server transcript
    fn show(&self, payload: &str) {
        let (sender, content) = match ChatMessage::parse(payload) {
            ChatMessage::Untagged { text } => (UNTAGGED_SENDER.to_string(), text),
            message => message.into_parts(),
        };
        debug!(session = %self.id, %sender, "frame received");
        self.sink.deliver(DisplayEvent::new(sender, content, false));
    }

    /// Forward a payload verbatim to every other session
    async fn relay(&self, payload: &str, registry: &SessionRegistry) {
        for session in registry.snapshot().await {
            if session.id != self.id {
                session.send(payload).await;
            }
        }
    }

    /// Write one frame to the peer
    ///
    /// Inactive sessions drop the frame silently. A write failure marks the
    /// session inactive and is reported to the sink, never to the caller.
    pub async fn send(&self, text: &str) {
        if !self.is_active() {
            return;
        }

        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return;
        };

        // A peer that stops reading fills the socket buffer; close() cancels
        // the token so it never waits behind this write.
        let written = tokio::select! {
            _ = self.shutdown.cancelled() => return,
            written = writer.send(text) => written,
        };

        if let Err(e) = written {
            self.active.store(false, Ordering::SeqCst);
            warn!(session = %self.id, peer = %self.peer, error = %e, "frame write failed");
            self.notify(format!("Error sending message to client: {e}"));
        }
    }

    /// Close the connection
    ///
    /// Idempotent. Unblocks the receive loop and shuts down the write half;
    /// close errors are reported, not returned.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.active.store(false, Ordering::SeqCst);
        self.shutdown.cancel();

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            // Flushing what a stalled peer never read would wait forever; past
            // the deadline the write half is dropped with the bytes unsent.
            let closed = timeout(CLOSE_TIMEOUT, SinkExt::<&str>::close(&mut writer)).await;
            let failure = match closed {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some("peer stopped reading".to_string()),
            };
            if let Some(e) = failure {
                warn!(session = %self.id, peer = %self.peer, error = %e, "close failed");
                self.notify(format!("Error closing client connection: {e}"));
            }
        }
        debug!(session = %self.id, "session closed");
    }

    fn notify(&self, notice: String) {
        self.sink.deliver(DisplayEvent::system(notice));
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("active", &self.is_active())
            .finish()
    }
}
