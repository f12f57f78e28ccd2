//! Display sinks
//!
//! The relay core never renders anything. Every displayable event, whether a
//! chat line or a local notice, is handed to a [`DisplaySink`] supplied by the
//! owner, which is free to marshal it onto whatever context does rendering.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::message::SYSTEM_SENDER;

/// One line of a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayEvent {
    /// Who the line is attributed to (`"System"` for notices)
    pub sender: String,
    /// Text of the line
    pub content: String,
    /// Authored locally (local echo or the server's own broadcast)
    pub is_self: bool,
}

impl DisplayEvent {
    pub fn new(sender: impl Into<String>, content: impl Into<String>, is_self: bool) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            is_self,
        }
    }

    /// Local notice attributed to `"System"`
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(SYSTEM_SENDER, content, false)
    }

    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }
}

/// Receiver of display events
///
/// Called from socket tasks; implementations must not block.
pub trait DisplaySink: Send + Sync {
    fn deliver(&self, event: DisplayEvent);
}

impl<F> DisplaySink for F
where
    F: Fn(DisplayEvent) + Send + Sync,
{
    fn deliver(&self, event: DisplayEvent) {
        self(event)
    }
}

/// Sink that forwards events to a single consumer over an unbounded channel
///
/// Events from one task arrive in the order they were delivered.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<DisplayEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DisplayEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl DisplaySink for ChannelSink {
    fn deliver(&self, event: DisplayEvent) {
        // Renderer gone: nothing left to show the event on.
        let _ = self.sender.send(event);
    }
}
