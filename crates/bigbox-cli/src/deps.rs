//! Dependency commands: `check-deps` and `install-deps`.

use std::sync::Arc;

use bigbox_core::{FirmwareConfig, ProcessRunner, deps};

use crate::colors;
use crate::output::{TerminalNotifier, print_header};

/// Report each package and fail if any is missing.
pub async fn check(config: &FirmwareConfig) -> anyhow::Result<()> {
    print_header("Toolchain dependencies");

    let mut missing = Vec::new();
    for package in &config.dependencies.packages {
        if deps::is_package_installed(&config.dependencies, package).await {
            println!("  {}✓{} {}", colors::GREEN, colors::RESET, package);
        } else {
            println!("  {}✗{} {}", colors::RED, colors::RESET, package);
            missing.push(package.as_str());
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("Missing dependencies: {}", missing.join(", "));
    }
    println!("\n{}All dependencies are installed{}", colors::GREEN, colors::RESET);
    Ok(())
}

/// Install the toolchain packages through the privilege helper.
pub async fn install(config: &FirmwareConfig) -> anyhow::Result<()> {
    print_header("Installing toolchain dependencies");

    let notifier = Arc::new(TerminalNotifier);
    let runner = ProcessRunner::new(notifier.clone()).with_timeout(config.tool_timeout());
    let output = deps::install(
        &config.dependencies,
        &config.privilege,
        &runner,
        notifier.as_ref(),
    )
    .await?;

    if !output.success() {
        anyhow::bail!("Installation failed ({})", output.status);
    }
    println!("\n{}Dependencies installed{}", colors::GREEN, colors::RESET);
    Ok(())
}
