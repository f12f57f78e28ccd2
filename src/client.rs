//! Chat client
//!
//! Holds one outbound connection. A background task decodes inbound frames
//! and hands them to the display sink; `send` writes a user message and
//! echoes it locally without waiting for the server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::FrameCodec;
use crate::error::{FrameError, RelayError};
use crate::message::{exit_payload, user_payload, ChatMessage};
use crate::sink::{DisplayEvent, DisplaySink};

type FrameReader = FramedRead<OwnedReadHalf, FrameCodec>;
type FrameWriter = FramedWrite<OwnedWriteHalf, FrameCodec>;

/// Live connection state
struct Connection {
    writer: FrameWriter,
    /// Cancelled exactly once, by whoever tears this connection down
    shutdown: CancellationToken,
}

impl Connection {
    async fn close(mut self) {
        if let Err(e) = SinkExt::<&str>::close(&mut self.writer).await {
            warn!(error = %e, "error while disconnecting");
        }
    }
}

struct Inner {
    connected: AtomicBool,
    connection: Mutex<Option<Connection>>,
    sink: Arc<dyn DisplaySink>,
}

impl Inner {
    fn notify(&self, notice: impl Into<String>) {
        self.sink.deliver(DisplayEvent::system(notice));
    }

    /// Tear down after the receive loop saw the stream fail
    ///
    /// A cancelled token means a local `disconnect()` got there first and
    /// the failure is just the consequence of it.
    async fn connection_lost(&self, shutdown: &CancellationToken, reason: String) {
        let connection = {
            let mut slot = self.connection.lock().await;
            if shutdown.is_cancelled() {
                return;
            }
            shutdown.cancel();
            self.connected.store(false, Ordering::SeqCst);
            slot.take()
        };

        warn!(%reason, "lost connection to server");
        self.notify(format!("Lost connection to server: {reason}"));
        if let Some(connection) = connection {
            connection.close().await;
        }
    }
}

/// Client side of the relay
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<Inner>,
}

impl ChatClient {
    /// Create a disconnected client delivering to `sink`
    pub fn new(sink: Arc<dyn DisplaySink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                connected: AtomicBool::new(false),
                connection: Mutex::new(None),
                sink,
            }),
        }
    }

    /// Connect to `host:port` and start receiving
    ///
    /// Failures are reported to the sink and leave the client disconnected;
    /// retrying is up to the caller.
    pub async fn connect(&self, host: &str, port: u16) -> Result<(), RelayError> {
        let mut slot = self.inner.connection.lock().await;
        if slot.is_some() {
            return Err(RelayError::AlreadyConnected);
        }

        let stream = match TcpStream::connect((host, port)).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(%host, port, error = %e, "failed to connect");
                self.inner.notify(format!("Failed to connect to server: {e}"));
                return Err(RelayError::Connect {
                    addr: format!("{host}:{port}"),
                    source: e,
                });
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not set TCP_NODELAY");
        }

        let (read_half, write_half) = stream.into_split();
        let shutdown = CancellationToken::new();
        *slot = Some(Connection {
            writer: FramedWrite::new(write_half, FrameCodec::new()),
            shutdown: shutdown.clone(),
        });
        self.inner.connected.store(true, Ordering::SeqCst);

        info!(%host, port, "connected to server");
        self.inner.notify("Connected to server");

        tokio::spawn(receive_loop(
            Arc::clone(&self.inner),
            FramedRead::new(read_half, FrameCodec::new()),
            shutdown,
        ));
        Ok(())
    }

    /// Send `"<username>: <text>"` and echo it locally
    ///
    /// Empty text is ignored. When disconnected a "Not connected to server"
    /// notice is shown. A message too long for one frame is rejected without
    /// touching the connection; any other write failure disconnects.
    pub async fn send(&self, username: &str, text: &str) -> Result<(), RelayError> {
        if text.is_empty() {
            return Ok(());
        }

        let mut slot = self.inner.connection.lock().await;
        let Some(connection) = slot.as_mut() else {
            self.inner.notify("Not connected to server");
            return Err(RelayError::NotConnected);
        };

        let payload = user_payload(username, text);
        let written = connection.writer.send(payload.as_str()).await;
        match written {
            Ok(()) => {
                debug!(%username, "message sent");
                self.inner.sink.deliver(DisplayEvent::new(username, text, true));
                Ok(())
            }
            Err(e @ FrameError::TooLong(_)) => {
                warn!(error = %e, "message rejected");
                self.inner.notify(format!("Failed to send message: {e}"));
                Err(RelayError::FrameWrite(e))
            }
            Err(e) => {
                warn!(error = %e, "frame write failed");
                self.inner.notify(format!("Failed to send message: {e}"));

                let connection = slot.take();
                self.inner.connected.store(false, Ordering::SeqCst);
                drop(slot);
                if let Some(connection) = connection {
                    connection.shutdown.cancel();
                    connection.close().await;
                }
                Err(RelayError::FrameWrite(e))
            }
        }
    }

    /// Send the exit signal for `username`, then disconnect
    ///
    /// The exit signal tells the server to drop this session without
    /// relaying anything.
    pub async fn leave(&self, username: &str) {
        {
            let mut slot = self.inner.connection.lock().await;
            if let Some(connection) = slot.as_mut() {
                if let Err(e) = connection.writer.send(exit_payload(username).as_str()).await {
                    warn!(error = %e, "failed to send exit signal");
                }
            }
        }
        self.disconnect().await;
    }

    /// Close the connection
    ///
    /// Idempotent. Interrupts the receive loop, which exits without
    /// reporting a lost connection.
    pub async fn disconnect(&self) {
        let connection = {
            let mut slot = self.inner.connection.lock().await;
            let Some(connection) = slot.take() else {
                return;
            };
            connection.shutdown.cancel();
            self.inner.connected.store(false, Ordering::SeqCst);
            connection
        };

        connection.close().await;
        info!("disconnected from server");
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }
}

async fn receive_loop(inner: Arc<Inner>, mut reader: FrameReader, shutdown: CancellationToken) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = reader.next() => frame,
        };

        match frame {
            Some(Ok(payload)) => {
                let (sender, content) = ChatMessage::parse(&payload).into_parts();
                debug!(%sender, "frame received");
                inner.sink.deliver(DisplayEvent::new(sender, content, false));
            }
            Some(Err(e)) => {
                inner.connection_lost(&shutdown, e.to_string()).await;
                break;
            }
            None => {
                inner
                    .connection_lost(&shutdown, "connection closed by server".to_string())
                    .await;
                break;
            }
        }
    }

    debug!("receive loop ended");
}
