//! Make command implementation.
//!
//! Runs the whole merge, build and flash pipeline headlessly.

use std::sync::Arc;
use std::time::Instant;

use bigbox_core::{BuildPipeline, FirmwareConfig, FirmwareContext, LocalConnection, MakeRequest};

use crate::colors;
use crate::output::{TerminalNotifier, print_field, print_header};

pub async fn execute(config: FirmwareConfig, request: MakeRequest) -> anyhow::Result<()> {
    let start = Instant::now();
    config.dirs().ensure()?;

    print_header("Building Marlin firmware");
    print_field(
        "Profile",
        if request.is_default {
            format!("{} (default)", request.profile_id)
        } else {
            request.profile_id.clone()
        },
    );
    print_field("Port", &request.port);
    println!();

    let context = FirmwareContext::new(
        config,
        Arc::new(LocalConnection::new()),
        Arc::new(TerminalNotifier),
    );
    BuildPipeline::new(context).make(&request).await?;

    println!(
        "\n{}Flashed{} in {:.1}s",
        colors::GREEN,
        colors::RESET,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
