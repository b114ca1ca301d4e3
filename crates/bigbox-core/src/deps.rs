//! System package checks for the firmware toolchain.

use std::process::Stdio;

use tokio::process::Command;

use crate::config::{DependencyConfig, PrivilegeConfig};
use crate::error::Result;
use crate::notify::{Notifier, Stream};
use crate::process::{ProcessOutput, ProcessRunner};

/// Marker the package query prints for an installed package.
pub const INSTALLED_MARKER: &str = "Status: install ok installed";

/// Whether a single package is installed.
///
/// A query tool that cannot be run counts as "not installed".
pub async fn is_package_installed(config: &DependencyConfig, package: &str) -> bool {
    let Some((program, args)) = config.query_command.split_first() else {
        return false;
    };

    let output = Command::new(program)
        .args(args)
        .arg(package)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) => String::from_utf8_lossy(&output.stdout).contains(INSTALLED_MARKER),
        Err(e) => {
            tracing::debug!("Package query for {} failed: {}", package, e);
            false
        }
    }
}

/// Whether every configured package is installed.
pub async fn check_installed(config: &DependencyConfig) -> bool {
    for package in &config.packages {
        if !is_package_installed(config, package).await {
            tracing::info!("Missing dependency: {}", package);
            return false;
        }
    }
    true
}

/// Install the configured packages through the privilege helper.
pub async fn install(
    config: &DependencyConfig,
    privilege: &PrivilegeConfig,
    runner: &ProcessRunner,
    notifier: &dyn Notifier,
) -> Result<ProcessOutput> {
    let invocation = privilege.invocation(
        config
            .install_command
            .iter()
            .chain(config.packages.iter())
            .cloned(),
    );
    notifier.logline(Stream::Stdout, &format!("Command: {}", invocation.command_line()));
    tracing::info!("Installing dependencies: {}", config.packages.join(", "));

    runner.run(&invocation).await
}
