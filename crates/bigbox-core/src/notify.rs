//! Notification channel messages.
//!
//! Everything the pipeline wants the UI to see goes through a [`Notifier`]:
//! subprocess output, progress lines and coarse status changes. The wire
//! shape matches what the browser UI subscribes to:
//!
//! ```text
//! {"type": "logline", "line": "...", "stream": "stdout" | "stderr" | "message"}
//! {"type": "status", "status_type": "...", "status_value": "...", "status_description": "..."}
//! ```

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Origin tag of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    /// Standard output of a subprocess.
    Stdout,
    /// Standard error of a subprocess, or a pipeline error.
    Stderr,
    /// Progress line emitted by the pipeline itself.
    Message,
}

/// Message pushed to every UI subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginMessage {
    /// A single line of output.
    Logline {
        /// Line content without its trailing newline.
        line: String,
        /// Where the line came from.
        stream: Stream,
    },

    /// Coarse state change.
    Status {
        /// Category, e.g. `flash`.
        status_type: String,
        /// New value, e.g. `building`.
        status_value: String,
        /// Free-form detail.
        status_description: String,
    },
}

/// Sink for [`PluginMessage`]s.
///
/// Implementations must not block: the process runner calls `send` from its
/// stream reader tasks for every line of tool output.
pub trait Notifier: Send + Sync {
    /// Deliver a message to all subscribers.
    fn send(&self, message: PluginMessage);

    /// Send a log line.
    fn logline(&self, stream: Stream, line: &str) {
        self.send(PluginMessage::Logline {
            line: line.to_string(),
            stream,
        });
    }

    /// Send a status change.
    fn status(&self, status_type: &str, status_value: &str, status_description: &str) {
        self.send(PluginMessage::Status {
            status_type: status_type.to_string(),
            status_value: status_value.to_string(),
            status_description: status_description.to_string(),
        });
    }
}

/// Notifier that keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<PluginMessage>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all messages received so far.
    pub fn messages(&self) -> Vec<PluginMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Log lines received on `stream`, in arrival order.
    pub fn lines(&self, stream: Stream) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                PluginMessage::Logline { line, stream: s } if s == stream => Some(line),
                _ => None,
            })
            .collect()
    }

    /// Status values received so far, in arrival order.
    pub fn status_values(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                PluginMessage::Status { status_value, .. } => Some(status_value),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, message: PluginMessage) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}
