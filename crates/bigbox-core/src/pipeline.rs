//! Build and flash pipeline.
//!
//! One request runs these steps in order and stops at the first failure:
//!
//! ```text
//! check busy ──► merge config ──► build ──► verify artifact
//!                                                 │
//!        reconnect ◄── cleanup ◄── flash ◄── disconnect
//! ```
//!
//! A busy printer aborts before anything is touched. A missing artifact
//! aborts before the device is disconnected; the scratch folder is left as
//! the build tool wrote it. Once disconnected, cleanup and reconnect always
//! run, whatever the flasher did.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::FirmwareConfig;
use crate::device::DeviceConnection;
use crate::error::{Error, Result};
use crate::notify::{Notifier, Stream};
use crate::paths::PluginDirs;
use crate::process::{Invocation, ProcessOutput, ProcessRunner};
use crate::profile::ProfileStore;
use crate::rewrite::rewrite_template;

/// Status type used for pipeline state changes.
pub const STATUS_TYPE: &str = "flash";

/// Parameters of one build-and-flash request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeRequest {
    /// Serial port the board is attached to.
    pub port: String,
    pub profile_id: String,
    /// Look the profile up among the shipped defaults.
    pub is_default: bool,
}

/// Collaborators the pipeline works with.
pub struct FirmwareContext {
    pub config: FirmwareConfig,
    pub dirs: PluginDirs,
    pub profiles: ProfileStore,
    pub device: Arc<dyn DeviceConnection>,
    pub notifier: Arc<dyn Notifier>,
}

impl FirmwareContext {
    /// Derive paths and the profile store from `config`.
    pub fn new(
        config: FirmwareConfig,
        device: Arc<dyn DeviceConnection>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let dirs = config.dirs();
        let profiles = ProfileStore::new(&dirs.profiles_dir, &dirs.default_profiles_dir);
        Self {
            config,
            dirs,
            profiles,
            device,
            notifier,
        }
    }
}

/// Runs build-and-flash requests, one at a time.
pub struct BuildPipeline {
    context: FirmwareContext,
    runner: ProcessRunner,
    busy: Mutex<()>,
}

impl BuildPipeline {
    pub fn new(context: FirmwareContext) -> Self {
        let runner =
            ProcessRunner::new(context.notifier.clone()).with_timeout(context.config.tool_timeout());
        Self {
            context,
            runner,
            busy: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &FirmwareContext {
        &self.context
    }

    /// Runner sharing this pipeline's notifier and timeout.
    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Merge, build and flash.
    ///
    /// Fails fast with [`Error::BuildInProgress`] while another request runs.
    pub async fn make(&self, request: &MakeRequest) -> Result<()> {
        let Ok(_guard) = self.busy.try_lock() else {
            tracing::warn!("Rejected build request: another build is running");
            let error = Error::BuildInProgress;
            self.context
                .notifier
                .logline(Stream::Stderr, &error.to_string());
            return Err(error);
        };

        tracing::info!(
            "Build requested: profile {} (default: {}) on {}",
            request.profile_id,
            request.is_default,
            request.port
        );
        let result = self.run(request).await;

        let notifier = &self.context.notifier;
        match &result {
            Ok(()) => notifier.status(STATUS_TYPE, "done", ""),
            Err(Error::BusyConflict) => tracing::warn!("Build request rejected: printer is busy"),
            Err(e) => {
                tracing::error!("Build request failed: {}", e);
                // These already produced their own log line.
                if !matches!(
                    e,
                    Error::BuildFailure { .. } | Error::FlashFailure { .. } | Error::Timeout { .. }
                ) {
                    notifier.logline(Stream::Stderr, &e.to_string());
                }
                notifier.status(STATUS_TYPE, "failed", &e.to_string());
            }
        }
        result
    }

    async fn run(&self, request: &MakeRequest) -> Result<()> {
        let FirmwareContext {
            config,
            dirs,
            device,
            notifier,
            ..
        } = &self.context;

        if device.is_printing() {
            notifier.logline(Stream::Stderr, "Printer is busy! Aborted Flashing!");
            return Err(Error::BusyConflict);
        }

        notifier.logline(Stream::Message, "Parsing configuration..........");
        self.merge_config(&request.profile_id, request.is_default).await?;

        notifier.status(STATUS_TYPE, "building", "");
        notifier.logline(Stream::Message, "Building Marlin................");
        let build = self.runner.run(&self.build_invocation()).await?;
        tracing::debug!("Build tool finished with {}", build.status);

        let artifact = dirs.artifact_path(&config.build.artifact);
        if !tokio::fs::try_exists(&artifact).await.unwrap_or(false) {
            notifier.logline(Stream::Stderr, "Something went wrong. Hex file does not exist!");
            return Err(Error::BuildFailure { artifact });
        }
        notifier.logline(
            Stream::Message,
            &format!(
                "{} found! Proceeding to flash with {}.",
                config.build.artifact,
                config.flasher.display_name()
            ),
        );

        device.disconnect();
        notifier.status(STATUS_TYPE, "flashing", "");
        let flashed = self.flash(&request.port, &artifact).await;

        notifier.logline(Stream::Message, "Cleaning up build files....");
        self.cleanup().await;

        device.connect(&request.port);

        let flashed = flashed?;
        if !flashed.success() {
            notifier.logline(
                Stream::Stderr,
                &format!("Flashing failed ({})", flashed.status),
            );
            return Err(Error::FlashFailure {
                code: flashed.status.code(),
            });
        }
        Ok(())
    }

    /// Write every template, merged with the profile, into the firmware tree.
    pub async fn merge_config(&self, profile_id: &str, is_default: bool) -> Result<()> {
        let FirmwareContext {
            config,
            dirs,
            profiles,
            ..
        } = &self.context;

        let profile = profiles.load(profile_id, is_default)?;
        for name in &config.templates {
            let source = dirs.template_dir.join(name);
            let target = dirs.firmware_dir.join(name);

            let template = tokio::fs::read(&source)
                .await
                .map_err(|e| Error::io(&source, e))?;
            let merged = rewrite_template(&template, &profile);
            self.write_merged(&target, &merged).await?;
            tracing::debug!("Merged {} into {}", source.display(), target.display());
        }
        Ok(())
    }

    /// Write `content`, repairing permissions and retrying once on failure.
    async fn write_merged(&self, target: &Path, content: &[u8]) -> Result<()> {
        let Err(e) = tokio::fs::write(target, content).await else {
            return Ok(());
        };

        tracing::warn!("Cannot write {}: {}", target.display(), e);
        self.context
            .notifier
            .logline(Stream::Stderr, &format!("{}. Trying to change permission...", e));
        self.repair_permissions(target).await;

        tokio::fs::write(target, content)
            .await
            .map_err(|e| Error::io(target, e))
    }

    async fn repair_permissions(&self, target: &Path) {
        let invocation = self.context.config.privilege.invocation([
            "chmod".to_string(),
            "666".to_string(),
            target.display().to_string(),
        ]);
        if let Err(e) = self.runner.run(&invocation).await {
            tracing::warn!("Permission repair for {} failed: {}", target.display(), e);
        }
    }

    async fn flash(&self, port: &str, artifact: &Path) -> Result<ProcessOutput> {
        let invocation = self.flash_invocation(port, artifact);
        self.context.notifier.logline(
            Stream::Stdout,
            &format!("Command: {}", invocation.command_line()),
        );
        self.runner.run(&invocation).await
    }

    /// Remove build intermediates. Failures are reported, never returned.
    async fn cleanup(&self) {
        match self.runner.run(&self.clean_invocation()).await {
            Ok(output) if !output.success() => {
                tracing::warn!("Cleanup exited with {}", output.status);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Cleanup failed: {}", e);
                self.context
                    .notifier
                    .logline(Stream::Stderr, &format!("Cleanup failed: {}", e));
            }
        }
    }

    fn build_dir_arg(&self) -> String {
        format!("BUILD_DIR={}", self.context.dirs.scratch_dir.display())
    }

    fn build_invocation(&self) -> Invocation {
        let build = &self.context.config.build;
        Invocation::new(build.command.iter().cloned().chain([self.build_dir_arg()]))
            .current_dir(&self.context.dirs.firmware_dir)
    }

    fn clean_invocation(&self) -> Invocation {
        let build = &self.context.config.build;
        Invocation::new(
            build
                .command
                .iter()
                .cloned()
                .chain([build.clean_target.clone(), self.build_dir_arg()]),
        )
        .current_dir(&self.context.dirs.firmware_dir)
    }

    fn flash_invocation(&self, port: &str, artifact: &Path) -> Invocation {
        let flasher = &self.context.config.flasher;
        let args = [
            "-v".to_string(),
            "-p".to_string(),
            flasher.part.clone(),
            "-c".to_string(),
            flasher.programmer.clone(),
            "-P".to_string(),
            port.to_string(),
            "-U".to_string(),
            format!("flash:w:{}:i", artifact.display()),
            "-D".to_string(),
        ];
        let invocation = Invocation::new(flasher.command.iter().cloned().chain(args));
        match flasher.working_dir() {
            Some(dir) => invocation.current_dir(dir),
            None => invocation,
        }
    }
}
