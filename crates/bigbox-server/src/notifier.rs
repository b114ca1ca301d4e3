//! Fan-out of plugin messages to WebSocket subscribers.

use bigbox_core::{Notifier, PluginMessage};
use tokio::sync::broadcast;

/// Capacity for the broadcast channel.
/// Subscribers that fall further behind lose the oldest messages.
const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// Notifier that broadcasts every message to all connected clients.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<PluginMessage>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to messages sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PluginMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for BroadcastNotifier {
    /// Broadcast a message, ignoring the no-subscriber case.
    fn send(&self, message: PluginMessage) {
        let _ = self.tx.send(message);
    }
}
