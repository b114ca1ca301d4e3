//! Firmware configuration profiles.
//!
//! A profile is a named list of directive overrides. Default profiles ship
//! read-only with the plugin; user profiles live one-per-file in the data
//! area. Files hold a JSON envelope:
//!
//! ```text
//! {"profile": {"id": "bigbox-dual", "define": [{"identifier": "EXTRUDERS", "value": "2", "enabled": true}]}}
//! ```
//!
//! Fields the UI stores beyond `id` and `define` are kept as-is.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One `#define` override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveOverride {
    /// Directive name, e.g. `BAUDRATE`.
    pub identifier: String,
    /// Replacement value, emitted verbatim.
    pub value: String,
    /// `false` emits the directive commented out.
    pub enabled: bool,
}

impl DirectiveOverride {
    pub fn new(identifier: impl Into<String>, value: impl Into<String>, enabled: bool) -> Self {
        Self {
            identifier: identifier.into(),
            value: value.into(),
            enabled,
        }
    }
}

/// A named set of directive overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,

    /// Set from the profile's origin when listing; never trusted from disk.
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,

    #[serde(rename = "define", default)]
    pub overrides: Vec<DirectiveOverride>,

    /// UI-owned fields (name, description, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Profile {
    pub fn new(id: impl Into<String>, overrides: Vec<DirectiveOverride>) -> Self {
        Self {
            id: id.into(),
            is_default: false,
            overrides,
            extra: serde_json::Map::new(),
        }
    }

    /// First override for `identifier`.
    pub fn find(&self, identifier: &str) -> Option<&DirectiveOverride> {
        self.overrides.iter().find(|o| o.identifier == identifier)
    }

    /// Check the id and that every override identifier is unique.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id)?;

        let mut seen = HashSet::new();
        for o in &self.overrides {
            if o.identifier.trim().is_empty() {
                return Err(Error::InvalidProfile(format!(
                    "profile {} has an override without identifier",
                    self.id
                )));
            }
            if !seen.insert(o.identifier.as_str()) {
                return Err(Error::InvalidProfile(format!(
                    "duplicate identifier {} in profile {}",
                    o.identifier, self.id
                )));
            }
        }
        Ok(())
    }
}

/// On-disk and over-the-wire wrapper around a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEnvelope {
    pub profile: Profile,
}

/// Ids double as file names.
fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) || id.contains('\0') {
        return Err(Error::InvalidProfile(format!("invalid profile id: {:?}", id)));
    }
    Ok(())
}

/// File-backed profile storage.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    profiles_dir: PathBuf,
    defaults_dir: PathBuf,
}

impl ProfileStore {
    pub fn new(profiles_dir: impl Into<PathBuf>, defaults_dir: impl Into<PathBuf>) -> Self {
        Self {
            profiles_dir: profiles_dir.into(),
            defaults_dir: defaults_dir.into(),
        }
    }

    /// Every profile keyed by id. Defaults shadow user profiles with the same id.
    pub fn list(&self) -> Result<BTreeMap<String, Profile>> {
        fs::create_dir_all(&self.profiles_dir).map_err(|e| Error::io(&self.profiles_dir, e))?;

        let mut profiles = BTreeMap::new();
        for (dir, is_default) in [(&self.profiles_dir, false), (&self.defaults_dir, true)] {
            for profile in Self::read_dir(dir)? {
                let mut profile = profile;
                profile.is_default = is_default;
                profiles.insert(profile.id.clone(), profile);
            }
        }
        Ok(profiles)
    }

    /// Load a single profile.
    pub fn load(&self, id: &str, is_default: bool) -> Result<Profile> {
        validate_id(id)?;
        let path = self.dir(is_default).join(id);

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ProfileNotFound {
                    id: id.to_string(),
                    is_default,
                });
            }
            Err(e) => return Err(Error::io(&path, e)),
        };

        let mut profile = serde_json::from_str::<ProfileEnvelope>(&text)?.profile;
        profile.is_default = is_default;
        Ok(profile)
    }

    /// Create or overwrite a user profile.
    pub fn save(&self, profile: &Profile) -> Result<()> {
        profile.validate()?;
        fs::create_dir_all(&self.profiles_dir).map_err(|e| Error::io(&self.profiles_dir, e))?;

        let path = self.profiles_dir.join(&profile.id);
        let mut stored = profile.clone();
        stored.is_default = false;
        let json = serde_json::to_string_pretty(&ProfileEnvelope { profile: stored })?;

        fs::write(&path, json).map_err(|e| Error::io(&path, e))?;
        tracing::debug!("Saved profile {}", path.display());
        Ok(())
    }

    /// Remove a user profile. Missing profiles are ignored.
    pub fn delete(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        let path = self.profiles_dir.join(id);
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            tracing::debug!("Deleted profile {}", path.display());
        }
        Ok(())
    }

    fn dir(&self, is_default: bool) -> &Path {
        if is_default {
            &self.defaults_dir
        } else {
            &self.profiles_dir
        }
    }

    /// Parse every profile file in `dir`. Unreadable files are skipped.
    fn read_dir(dir: &Path) -> Result<Vec<Profile>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Profile directory {} does not exist", dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::io(dir, e)),
        };

        let mut profiles = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io(dir, e))?.path();
            if !path.is_file() {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .map_err(|e| Error::io(&path, e))
                .and_then(|text| Ok(serde_json::from_str::<ProfileEnvelope>(&text)?));

            match parsed {
                Ok(envelope) => profiles.push(envelope.profile),
                Err(e) => tracing::warn!("Skipping profile {}: {}", path.display(), e),
            }
        }
        Ok(profiles)
    }
}
