//! Relay server
//!
//! Owns the listening socket and the session registry. A dedicated accept
//! task registers one [`ClientSession`] per connection and spawns its receive
//! loop; sessions relay between themselves, and the server adds direct
//! broadcasts and shutdown on top.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::RelayError;
use crate::message::{announcement_payload, SERVER_SENDER};
use crate::registry::SessionRegistry;
use crate::session::ClientSession;
use crate::sink::{DisplayEvent, DisplaySink};

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion)
/// does not spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Running accept loop
struct Listening {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// The relay server
///
/// Every notice (start, connect, disconnect, errors) and every relayed
/// message goes to the sink given at construction.
pub struct RelayServer {
    /// Interface to bind
    host: String,
    /// Set by `start()`, cleared by `stop()`
    running: Arc<AtomicBool>,
    registry: SessionRegistry,
    sink: Arc<dyn DisplaySink>,
    listening: Mutex<Option<Listening>>,
}

impl RelayServer {
    /// Create a stopped server that will bind on `host`
    pub fn new(host: impl Into<String>, sink: Arc<dyn DisplaySink>) -> Self {
        Self {
            host: host.into(),
            running: Arc::new(AtomicBool::new(false)),
            registry: SessionRegistry::new(),
            sink,
            listening: Mutex::new(None),
        }
    }

    /// Bind `port` and start accepting connections
    ///
    /// Returns the bound address (useful with port 0). A bind failure is
    /// reported to the sink and no accept loop is started.
    pub async fn start(&self, port: u16) -> Result<SocketAddr, RelayError> {
        let mut listening = self.listening.lock().await;
        if let Some(current) = listening.as_ref() {
            return Err(RelayError::AlreadyRunning(current.addr));
        }

        let listener = match TcpListener::bind((self.host.as_str(), port)).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(host = %self.host, port, error = %e, "failed to bind");
                self.notify(format!("Server error: {e}"));
                return Err(RelayError::Bind { port, source: e });
            }
        };
        let addr = listener
            .local_addr()
            .map_err(|source| RelayError::Bind { port, source })?;

        self.running.store(true, Ordering::SeqCst);
        info!("Relay server listening on {}", addr);
        self.notify(format!("Server started on port {}", addr.port()));

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            listener,
            AcceptContext {
                running: Arc::clone(&self.running),
                registry: self.registry.clone(),
                sink: Arc::clone(&self.sink),
                shutdown: shutdown.clone(),
            },
        ));

        *listening = Some(Listening {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Send a server-authored message to every connected session
    ///
    /// The payload is `"Server: " + text`. Empty text is ignored.
    pub async fn broadcast(&self, text: &str) {
        if text.is_empty() {
            return;
        }

        self.sink.deliver(DisplayEvent::new(SERVER_SENDER, text, true));

        let payload = announcement_payload(text);
        let sessions = self.registry.snapshot().await;
        debug!(recipients = sessions.len(), "broadcasting");
        for session in sessions {
            session.send(&payload).await;
        }
    }

    /// Stop accepting, close every session and release the listener
    ///
    /// Idempotent: stopping a stopped server does nothing.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        // Accept loop goes first so no session can register after the drain below.
        let listening = self.listening.lock().await.take();
        if let Some(Listening { shutdown, task, .. }) = listening {
            shutdown.cancel();
            if let Err(e) = task.await {
                warn!(error = %e, "accept loop ended abnormally");
            }
        }

        let sessions = self.registry.drain().await;
        debug!(sessions = sessions.len(), "closing sessions");
        for session in sessions {
            session.close().await;
        }

        info!("Relay server stopped");
        self.notify("Server stopped".to_string());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address the server is bound to, if running
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.lock().await.as_ref().map(|l| l.addr)
    }

    /// Number of registered sessions
    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    fn notify(&self, notice: String) {
        self.sink.deliver(DisplayEvent::system(notice));
    }
}

/// State shared with the accept task
struct AcceptContext {
    running: Arc<AtomicBool>,
    registry: SessionRegistry,
    sink: Arc<dyn DisplaySink>,
    shutdown: CancellationToken,
}

impl AcceptContext {
    fn notify(&self, notice: String) {
        self.sink.deliver(DisplayEvent::system(notice));
    }
}

async fn accept_loop(listener: TcpListener, ctx: AcceptContext) {
    loop {
        let accepted = tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                info!(%peer, "client connected");
                ctx.notify(format!("New client connected: {}", peer.ip()));

                let session = ClientSession::new(stream, peer, Arc::clone(&ctx.sink));
                ctx.registry.insert(Arc::clone(&session)).await;
                debug!(session = %session.id(), "session registered");
                tokio::spawn(session.run(ctx.registry.clone()));
            }
            Err(e) => {
                // Errors caused by stop() closing the listener are expected.
                if !ctx.running.load(Ordering::SeqCst) {
                    break;
                }
                warn!(error = %e, "failed to accept connection");
                ctx.notify(format!("Error accepting client connection: {e}"));
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }

    debug!("accept loop ended");
}
