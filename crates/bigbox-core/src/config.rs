//! Firmware builder configuration.
//!
//! Every field has a default matching the reference deployment (Marlin on an
//! ATmega2560 flashed with avrdude), so an empty TOML file is a valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paths::PluginDirs;
use crate::process::Invocation;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareConfig {
    /// Installation directory holding `default_profiles/` and `marlin/`.
    pub base_dir: PathBuf,
    /// Private data area holding user profiles and the build scratch folder.
    pub data_dir: PathBuf,
    /// Template files merged on every build, relative to `marlin/templates`.
    pub templates: Vec<String>,
    pub build: BuildToolConfig,
    pub flasher: FlasherConfig,
    pub privilege: PrivilegeConfig,
    pub dependencies: DependencyConfig,
    /// Upper bound for any single subprocess, in seconds.
    pub tool_timeout_secs: u64,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            data_dir: default_data_dir(),
            templates: vec![
                "Configuration.h".to_string(),
                "Configuration_adv.h".to_string(),
            ],
            build: BuildToolConfig::default(),
            flasher: FlasherConfig::default(),
            privilege: PrivilegeConfig::default(),
            dependencies: DependencyConfig::default(),
            tool_timeout_secs: 1800,
        }
    }
}

impl FirmwareConfig {
    /// Load a configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Directory layout derived from `base_dir` and `data_dir`.
    pub fn dirs(&self) -> PluginDirs {
        PluginDirs::new(&self.base_dir, &self.data_dir)
    }

    /// Timeout applied to every subprocess.
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("bigboxfirmware"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Build tool (make) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildToolConfig {
    /// Program and leading arguments.
    pub command: Vec<String>,
    /// Target that removes build intermediates.
    pub clean_target: String,
    /// Artifact file name inside the scratch folder.
    pub artifact: String,
}

impl Default for BuildToolConfig {
    fn default() -> Self {
        Self {
            command: vec!["make".to_string()],
            clean_target: "clean".to_string(),
            artifact: "Marlin.hex".to_string(),
        }
    }
}

/// Flasher (avrdude) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlasherConfig {
    /// Program and leading arguments.
    pub command: Vec<String>,
    /// Target part number.
    pub part: String,
    /// Programmer protocol.
    pub programmer: String,
}

impl Default for FlasherConfig {
    fn default() -> Self {
        Self {
            command: vec!["/usr/bin/avrdude".to_string()],
            part: "m2560".to_string(),
            programmer: "wiring".to_string(),
        }
    }
}

impl FlasherConfig {
    /// Program name for progress messages.
    pub fn display_name(&self) -> String {
        self.command
            .first()
            .map(|program| {
                Path::new(program)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| program.clone())
            })
            .unwrap_or_default()
    }

    /// Directory of the flasher program, when it is given as a path.
    pub fn working_dir(&self) -> Option<PathBuf> {
        let program = Path::new(self.command.first()?);
        program
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }
}

/// Privileged command execution.
///
/// The password, if any, is read from the environment at the moment a
/// privileged command runs and written to the helper's standard input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegeConfig {
    /// Elevation helper and its arguments.
    pub helper: Vec<String>,
    /// Name of the environment variable holding the password line.
    pub password_env: Option<String>,
}

impl Default for PrivilegeConfig {
    fn default() -> Self {
        Self {
            helper: vec!["sudo".to_string(), "-S".to_string()],
            password_env: Some("BIGBOX_SUDO_PASSWORD".to_string()),
        }
    }
}

impl PrivilegeConfig {
    /// Password line from the configured environment variable.
    pub fn password(&self) -> Option<String> {
        let name = self.password_env.as_deref()?;
        std::env::var(name).ok().filter(|value| !value.is_empty())
    }

    /// Wrap `args` in the elevation helper.
    pub fn invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv = self
            .helper
            .iter()
            .cloned()
            .chain(args.into_iter().map(Into::into));
        Invocation::new(argv).stdin_line(self.password())
    }
}

/// System packages the toolchain needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    /// Package names.
    pub packages: Vec<String>,
    /// Status query; the package name is appended.
    pub query_command: Vec<String>,
    /// Install command, run through the privilege helper; package names are appended.
    pub install_command: Vec<String>,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            packages: vec![
                "avr-libc".to_string(),
                "avrdude".to_string(),
                "make".to_string(),
            ],
            query_command: vec!["dpkg".to_string(), "-s".to_string()],
            install_command: vec![
                "apt-get".to_string(),
                "install".to_string(),
                "-y".to_string(),
            ],
        }
    }
}
