//! Error types for the relay
//!
//! Defines framing errors and relay-level errors.
//! Uses thiserror for ergonomic error definitions.

use std::net::SocketAddr;

use thiserror::Error;

/// Framing errors
///
/// Raised by the frame codec while encoding or decoding one frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Encoded payload does not fit the 16-bit length prefix
    #[error("encoded string too long: {0} bytes (max 65535)")]
    TooLong(usize),

    /// Payload bytes are not valid modified UTF-8
    #[error("malformed input around byte {0}")]
    Malformed(usize),

    /// Payload decodes to an unpaired surrogate
    #[error("unpaired surrogate in frame payload")]
    UnpairedSurrogate,

    /// IO error on the underlying stream
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Relay-level errors
///
/// Returned by the operations an owner calls directly. Read and close
/// failures happen on background tasks and only ever surface as notices.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Listening socket could not be bound
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Outbound connection could not be established
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Server is already accepting connections
    #[error("server already running on {0}")]
    AlreadyRunning(SocketAddr),

    /// Client already holds a connection
    #[error("already connected to server")]
    AlreadyConnected,

    /// Client has no connection to send on
    #[error("not connected to server")]
    NotConnected,

    /// Frame could not be written
    #[error("frame write failed: {0}")]
    FrameWrite(#[source] FrameError),
}
