//! Profiles command: list user and default profiles.

use bigbox_core::{FirmwareConfig, ProfileStore};

use crate::colors;
use crate::output::print_header;

pub fn list(config: &FirmwareConfig) -> anyhow::Result<()> {
    let dirs = config.dirs();
    let store = ProfileStore::new(&dirs.profiles_dir, &dirs.default_profiles_dir);
    let profiles = store.list()?;

    print_header("Firmware profiles");
    if profiles.is_empty() {
        println!("No profiles found.");
        return Ok(());
    }

    for (id, profile) in &profiles {
        let origin = if profile.is_default {
            format!(" {}(default){}", colors::DIM, colors::RESET)
        } else {
            String::new()
        };
        println!(
            "  {}{}{}{} - {} overrides",
            colors::CYAN,
            id,
            colors::RESET,
            origin,
            profile.overrides.len()
        );
    }
    Ok(())
}
