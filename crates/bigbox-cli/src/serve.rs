//! Serve command implementation.
//!
//! Starts the HTTP/WebSocket server the browser UI talks to.

use std::sync::Arc;

use bigbox_core::{FirmwareConfig, LocalConnection};
use bigbox_server::ServerConfig;

use crate::colors;
use crate::output::{print_field, print_header};

/// Start the server with a standalone device connection.
pub async fn execute(firmware: FirmwareConfig, host: String, port: u16) -> anyhow::Result<()> {
    let config = ServerConfig { host, port };

    print_header("BigBox Firmware Server");
    print_field("Plugin", firmware.base_dir.display());
    print_field("Data", firmware.data_dir.display());
    print_field("Server", format!("http://{}:{}", config.host, config.port));
    print_field("WebSocket", format!("ws://{}:{}/ws", config.host, config.port));
    println!("{}", "─".repeat(50));
    println!("{}Press Ctrl+C to stop{}", colors::GREEN, colors::RESET);
    println!();

    bigbox_server::serve(firmware, config, Arc::new(LocalConnection::new())).await?;

    Ok(())
}
