//! Shared fixtures: a plugin tree in a temp dir and `sh` scripts standing in
//! for make, avrdude and the privilege helper.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bigbox_core::config::{BuildToolConfig, FlasherConfig, PrivilegeConfig};
use bigbox_core::profile::ProfileEnvelope;
use bigbox_core::{
    BuildPipeline, DeviceConnection, DirectiveOverride, FirmwareConfig, FirmwareContext,
    MakeRequest, MemoryNotifier, Profile,
};
use tempfile::TempDir;

pub const PORT: &str = "/dev/ttyACM0";

pub const CONFIGURATION_H: &str = "\
#ifndef CONFIGURATION_H
#define CONFIGURATION_H
#define BAUDRATE 115200 // serial speed
//#define CUSTOM_MACHINE_NAME \"3D Printer\"
#define EXTRUDERS 1
#if ENABLED(DUAL)
  #define EXTRUDERS 1
#endif
#endif
";

pub const CONFIGURATION_ADV_H: &str = "\
#define CONFIGURATION_ADV_H
  #define EXTRUDERS 1
  //#define BABYSTEPPING
";

/// Build tool: honours `clean` and `BUILD_DIR=`, writes the artifact.
pub const GOOD_BUILD: &str = r#"
clean=0
for arg in "$@"; do
  case "$arg" in
    clean) clean=1 ;;
    BUILD_DIR=*) dir="${arg#BUILD_DIR=}" ;;
  esac
done
if [ "$clean" = 1 ]; then
  echo "cleaning $dir"
  rm -rf "$dir"
  exit 0
fi
mkdir -p "$dir"
echo "compiling Marlin"
echo "warning: unused variable" >&2
touch "$dir/Marlin.o"
echo ":00000001FF" > "$dir/Marlin.hex"
"#;

/// Build tool that leaves intermediates but no artifact.
pub const BROKEN_BUILD: &str = r#"
for arg in "$@"; do
  case "$arg" in
    BUILD_DIR=*) dir="${arg#BUILD_DIR=}" ;;
  esac
done
mkdir -p "$dir"
touch "$dir/Marlin.o"
echo "error: 'FOO' was not declared" >&2
exit 2
"#;

/// Slow variant of [`GOOD_BUILD`].
pub fn slow_build() -> String {
    format!("sleep 1\n{}", GOOD_BUILD)
}

/// Device connection recording every call.
#[derive(Default)]
pub struct RecordingDevice {
    printing: bool,
    events: Mutex<Vec<String>>,
}

impl RecordingDevice {
    pub fn printing() -> Self {
        Self {
            printing: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl DeviceConnection for RecordingDevice {
    fn is_printing(&self) -> bool {
        self.record("is_printing".to_string());
        self.printing
    }

    fn disconnect(&self) {
        self.record("disconnect".to_string());
    }

    fn connect(&self, port: &str) {
        self.record(format!("connect:{}", port));
    }
}

/// Plugin tree with templates, a default profile and fake tools.
pub struct Fixture {
    pub temp: TempDir,
    pub config: FirmwareConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let base = temp.path().join("plugin");
        let data = temp.path().join("data");

        fs::create_dir_all(base.join("marlin/templates")).unwrap();
        fs::create_dir_all(base.join("marlin/Marlin")).unwrap();
        fs::create_dir_all(base.join("default_profiles")).unwrap();
        fs::write(base.join("marlin/templates/Configuration.h"), CONFIGURATION_H).unwrap();
        fs::write(base.join("marlin/templates/Configuration_adv.h"), CONFIGURATION_ADV_H).unwrap();

        let profile = Profile::new(
            "bigbox",
            vec![
                DirectiveOverride::new("BAUDRATE", "250000", true),
                DirectiveOverride::new("CUSTOM_MACHINE_NAME", "\"BigBox\"", true),
                DirectiveOverride::new("EXTRUDERS", "2", true),
            ],
        );
        let json = serde_json::to_string(&ProfileEnvelope { profile }).unwrap();
        fs::write(base.join("default_profiles/bigbox"), json).unwrap();

        let mut fixture = Self {
            config: FirmwareConfig {
                base_dir: base,
                data_dir: data,
                tool_timeout_secs: 60,
                privilege: PrivilegeConfig {
                    helper: vec!["false".to_string()],
                    password_env: None,
                },
                ..FirmwareConfig::default()
            },
            temp,
        };
        fixture.set_build(GOOD_BUILD);
        fixture.set_flasher(0);
        fixture
    }

    /// Write `name` into the temp dir and return its path.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    pub fn set_build(&mut self, body: &str) {
        let script = self.script("make.sh", body);
        self.config.build = BuildToolConfig {
            command: vec!["sh".to_string(), script.display().to_string()],
            ..BuildToolConfig::default()
        };
    }

    /// Flasher that logs its arguments and exits with `code`.
    pub fn set_flasher(&mut self, code: i32) {
        let body = format!(
            "echo \"$@\" >> '{}'\necho 'avrdude: 1234 bytes of flash written'\nexit {}\n",
            self.flash_log().display(),
            code
        );
        let script = self.script("avrdude.sh", &body);
        self.config.flasher = FlasherConfig {
            command: vec!["sh".to_string(), script.display().to_string()],
            ..FlasherConfig::default()
        };
    }

    /// Privilege helper that logs its arguments, then runs `body`.
    pub fn set_helper(&mut self, body: &str) {
        let script = self.script(
            "helper.sh",
            &format!("echo \"$@\" >> '{}'\n{}\n", self.helper_log().display(), body),
        );
        self.config.privilege.helper = vec!["sh".to_string(), script.display().to_string()];
    }

    pub fn flash_log(&self) -> PathBuf {
        self.temp.path().join("flash.log")
    }

    pub fn helper_log(&self) -> PathBuf {
        self.temp.path().join("helper.log")
    }

    pub fn firmware_file(&self, name: &str) -> PathBuf {
        self.config.base_dir.join("marlin/Marlin").join(name)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.config.data_dir.join("tmp")
    }

    pub fn pipeline(
        &self,
        device: Arc<RecordingDevice>,
        notifier: Arc<MemoryNotifier>,
    ) -> BuildPipeline {
        BuildPipeline::new(FirmwareContext::new(self.config.clone(), device, notifier))
    }
}

pub fn request() -> MakeRequest {
    MakeRequest {
        port: PORT.to_string(),
        profile_id: "bigbox".to_string(),
        is_default: true,
    }
}

pub fn read_lines(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}
