//! Device-connection service.
//!
//! The serial session to the printer is owned by the host application. The
//! pipeline only asks whether a job is running and asks for the session to be
//! dropped before flashing and reopened afterwards.

use std::sync::Mutex;

/// Connection to the printer's controller board.
pub trait DeviceConnection: Send + Sync {
    /// Whether a print job is active.
    fn is_printing(&self) -> bool;

    /// Close the serial session so the flasher can own the port.
    fn disconnect(&self);

    /// Reopen the serial session on `port`.
    fn connect(&self, port: &str);
}

#[derive(Debug, Default)]
struct LocalState {
    printing: bool,
    port: Option<String>,
}

/// In-process device connection used when running standalone.
///
/// Tracks the printing flag and the currently open port; there is no real
/// serial session behind it.
#[derive(Debug, Default)]
pub struct LocalConnection {
    state: Mutex<LocalState>,
}

impl LocalConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a print job as running or finished.
    pub fn set_printing(&self, printing: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.printing = printing;
        }
    }

    /// Port of the open session, if any.
    pub fn port(&self) -> Option<String> {
        self.state.lock().ok().and_then(|state| state.port.clone())
    }
}

impl DeviceConnection for LocalConnection {
    fn is_printing(&self) -> bool {
        self.state.lock().map(|state| state.printing).unwrap_or(false)
    }

    fn disconnect(&self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(port) = state.port.take() {
                tracing::info!("Disconnected from {}", port);
            }
        }
    }

    fn connect(&self, port: &str) {
        if let Ok(mut state) = self.state.lock() {
            tracing::info!("Connected to {}", port);
            state.port = Some(port.to_string());
        }
    }
}
