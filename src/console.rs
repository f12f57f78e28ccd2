//! Console transcript renderer
//!
//! Consumes display events on a single task and prints the rolling
//! transcript to stdout, either as plain lines or as JSON lines.

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::cli::OutputFormat;
use crate::sink::DisplayEvent;

/// Render one event as a single line (without the newline)
pub fn format_event(event: &DisplayEvent, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => {
            let marker = if event.is_self { "[me] " } else { "" };
            Ok(format!("{marker}{}: {}", event.sender, event.content))
        }
        OutputFormat::Json => serde_json::to_string(event),
    }
}

/// Print every event from `events` until all senders are gone
pub fn spawn_renderer(
    mut events: mpsc::UnboundedReceiver<DisplayEvent>,
    format: OutputFormat,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = events.recv().await {
            let mut line = match format_event(&event, format) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "failed to render event");
                    continue;
                }
            };
            line.push('\n');

            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                warn!(error = %e, "stdout closed");
                break;
            }
            let _ = stdout.flush().await;
        }
    })
}
