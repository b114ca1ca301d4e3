//! Plugin directory management.
//!
//! Keeps the on-disk layout in one place so the pipeline, the profile store
//! and the server agree on every path:
//!
//! ```text
//! <base_dir>/
//! ├── default_profiles/   # Read-only profiles shipped with the plugin
//! └── marlin/
//!     ├── templates/      # Pristine configuration headers
//!     └── Marlin/         # Firmware source tree (merged headers land here)
//!
//! <data_dir>/
//! ├── profiles/           # User profiles, one file per id
//! └── tmp/                # Build scratch folder
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Directory structure for the firmware builder.
#[derive(Debug, Clone)]
pub struct PluginDirs {
    /// Profiles shipped with the plugin.
    pub default_profiles_dir: PathBuf,

    /// Pristine configuration templates.
    pub template_dir: PathBuf,

    /// Firmware source tree; the build tool runs here.
    pub firmware_dir: PathBuf,

    /// User profiles.
    pub profiles_dir: PathBuf,

    /// Build output folder.
    pub scratch_dir: PathBuf,
}

impl PluginDirs {
    /// Derive the layout from the installation and data directories.
    pub fn new(base_dir: &Path, data_dir: &Path) -> Self {
        let marlin = base_dir.join("marlin");
        Self {
            default_profiles_dir: base_dir.join("default_profiles"),
            template_dir: marlin.join("templates"),
            firmware_dir: marlin.join("Marlin"),
            profiles_dir: data_dir.join("profiles"),
            scratch_dir: data_dir.join("tmp"),
        }
    }

    /// Create the writable directories if they don't exist.
    ///
    /// # Errors
    /// Returns an error if directory creation fails.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.profiles_dir, &self.scratch_dir] {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        Ok(())
    }

    /// Expected location of the build artifact.
    pub fn artifact_path(&self, artifact: &str) -> PathBuf {
        self.scratch_dir.join(artifact)
    }
}
