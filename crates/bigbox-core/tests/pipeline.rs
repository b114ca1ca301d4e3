//! Integration tests for the build/flash pipeline.
//!
//! The build tool, flasher and privilege helper are `sh` scripts, so these
//! tests only run on Unix.

#![cfg(unix)]

mod common;

use std::fs;
use std::sync::Arc;

use bigbox_core::{Error, MemoryNotifier, PluginMessage, Stream};
use common::{BROKEN_BUILD, Fixture, PORT, RecordingDevice, read_lines, request, slow_build};

#[tokio::test]
async fn test_successful_build_and_flash() {
    let fixture = Fixture::new();
    let device = Arc::new(RecordingDevice::default());
    let notifier = Arc::new(MemoryNotifier::new());
    let pipeline = fixture.pipeline(device.clone(), notifier.clone());

    pipeline.make(&request()).await.expect("pipeline failed");

    // Merged headers
    let config = fs::read_to_string(fixture.firmware_file("Configuration.h")).unwrap();
    assert_eq!(
        config,
        "\
#ifndef CONFIGURATION_H
#define CONFIGURATION_H
#define BAUDRATE 250000 //Modified by BigBoxFirmware Plugin
#define CUSTOM_MACHINE_NAME \"BigBox\" //Modified by BigBoxFirmware Plugin
#define EXTRUDERS 2 //Modified by BigBoxFirmware Plugin
#if ENABLED(DUAL)
  #define EXTRUDERS 1
#endif
#endif
"
    );
    let adv = fs::read_to_string(fixture.firmware_file("Configuration_adv.h")).unwrap();
    assert_eq!(
        adv,
        "\
#define CONFIGURATION_ADV_H
  #define EXTRUDERS 2 //Modified by BigBoxFirmware Plugin
  //#define BABYSTEPPING
"
    );

    // Flasher got the verified artifact and the selected port
    let artifact = fixture.scratch_dir().join("Marlin.hex");
    assert_eq!(
        read_lines(&fixture.flash_log()),
        vec![format!(
            "-v -p m2560 -c wiring -P {} -U flash:w:{}:i -D",
            PORT,
            artifact.display()
        )]
    );

    // Device released for flashing and reopened afterwards
    assert_eq!(
        device.events(),
        vec!["is_printing", "disconnect", format!("connect:{}", PORT).as_str()]
    );

    // Cleanup removed the scratch folder
    assert!(!fixture.scratch_dir().exists());

    assert_eq!(
        notifier.lines(Stream::Message),
        vec![
            "Parsing configuration..........",
            "Building Marlin................",
            "Marlin.hex found! Proceeding to flash with sh.",
            "Cleaning up build files....",
        ]
    );
    let stdout = notifier.lines(Stream::Stdout);
    assert!(stdout.contains(&"compiling Marlin".to_string()));
    assert!(stdout.contains(&"avrdude: 1234 bytes of flash written".to_string()));
    assert!(stdout.iter().any(|l| l.starts_with("Command: sh ") && l.ends_with(":i -D")));
    assert_eq!(notifier.lines(Stream::Stderr), vec!["warning: unused variable"]);
    assert_eq!(notifier.status_values(), vec!["building", "flashing", "done"]);
}

#[tokio::test]
async fn test_busy_printer_touches_nothing() {
    let fixture = Fixture::new();
    let device = Arc::new(RecordingDevice::printing());
    let notifier = Arc::new(MemoryNotifier::new());
    let pipeline = fixture.pipeline(device.clone(), notifier.clone());

    let err = pipeline.make(&request()).await.unwrap_err();

    assert!(matches!(err, Error::BusyConflict));
    assert_eq!(device.events(), vec!["is_printing"]);
    assert!(!fixture.firmware_file("Configuration.h").exists());
    assert!(!fixture.scratch_dir().exists());
    assert!(!fixture.flash_log().exists());
    assert_eq!(
        notifier.messages(),
        vec![PluginMessage::Logline {
            line: "Printer is busy! Aborted Flashing!".to_string(),
            stream: Stream::Stderr,
        }]
    );
}

#[tokio::test]
async fn test_missing_artifact_stops_before_flashing() {
    let mut fixture = Fixture::new();
    fixture.set_build(BROKEN_BUILD);
    let device = Arc::new(RecordingDevice::default());
    let notifier = Arc::new(MemoryNotifier::new());
    let pipeline = fixture.pipeline(device.clone(), notifier.clone());

    let err = pipeline.make(&request()).await.unwrap_err();

    match err {
        Error::BuildFailure { artifact } => {
            assert_eq!(artifact, fixture.scratch_dir().join("Marlin.hex"));
        }
        other => panic!("Expected BuildFailure, got {other:?}"),
    }
    assert!(!fixture.flash_log().exists(), "flasher must not run");
    assert_eq!(device.events(), vec!["is_printing"]);

    // Intermediates are left behind on this path
    assert!(fixture.scratch_dir().join("Marlin.o").exists());

    let stderr = notifier.lines(Stream::Stderr);
    assert_eq!(
        stderr,
        vec![
            "error: 'FOO' was not declared",
            "Something went wrong. Hex file does not exist!",
        ]
    );
    assert_eq!(notifier.status_values(), vec!["building", "failed"]);
}

#[tokio::test]
async fn test_flash_failure_still_cleans_up_and_reconnects() {
    let mut fixture = Fixture::new();
    fixture.set_flasher(1);
    let device = Arc::new(RecordingDevice::default());
    let notifier = Arc::new(MemoryNotifier::new());
    let pipeline = fixture.pipeline(device.clone(), notifier.clone());

    let err = pipeline.make(&request()).await.unwrap_err();

    assert!(matches!(err, Error::FlashFailure { code: Some(1) }));
    assert_eq!(
        device.events(),
        vec!["is_printing", "disconnect", format!("connect:{}", PORT).as_str()]
    );
    assert!(!fixture.scratch_dir().exists());
    assert!(
        notifier
            .lines(Stream::Stderr)
            .iter()
            .any(|l| l.starts_with("Flashing failed"))
    );
}

#[tokio::test]
async fn test_missing_flasher_still_reconnects() {
    let mut fixture = Fixture::new();
    fixture.config.flasher.command = vec!["definitely-not-avrdude-3f9a".to_string()];
    let device = Arc::new(RecordingDevice::default());
    let notifier = Arc::new(MemoryNotifier::new());
    let pipeline = fixture.pipeline(device.clone(), notifier.clone());

    let err = pipeline.make(&request()).await.unwrap_err();

    assert!(matches!(err, Error::ToolNotFound { .. }));
    assert_eq!(device.events().last().map(String::as_str), Some("connect:/dev/ttyACM0"));
}

#[tokio::test]
async fn test_concurrent_request_is_rejected() {
    let mut fixture = Fixture::new();
    fixture.set_build(&slow_build());
    let device = Arc::new(RecordingDevice::default());
    let notifier = Arc::new(MemoryNotifier::new());
    let pipeline = fixture.pipeline(device, notifier.clone());

    let req = request();
    let (first, second) = tokio::join!(pipeline.make(&req), pipeline.make(&req));

    assert!(first.is_ok(), "first request failed: {first:?}");
    assert!(matches!(second, Err(Error::BuildInProgress)));
    assert!(
        notifier
            .lines(Stream::Stderr)
            .contains(&Error::BuildInProgress.to_string())
    );
}

#[tokio::test]
async fn test_latin1_template_is_merged_bytewise() {
    let fixture = Fixture::new();
    fs::write(
        fixture.config.base_dir.join("marlin/templates/Configuration.h"),
        b"// Temperatur in \xb0C\n#define BAUDRATE 115200\n",
    )
    .unwrap();
    let device = Arc::new(RecordingDevice::default());
    let pipeline = fixture.pipeline(device, Arc::new(MemoryNotifier::new()));

    pipeline.make(&request()).await.expect("pipeline failed");

    assert_eq!(
        fs::read(fixture.firmware_file("Configuration.h")).unwrap(),
        b"// Temperatur in \xb0C\n#define BAUDRATE 250000 //Modified by BigBoxFirmware Plugin\n"
    );
}

#[tokio::test]
async fn test_unknown_profile_fails_before_build() {
    let fixture = Fixture::new();
    let device = Arc::new(RecordingDevice::default());
    let notifier = Arc::new(MemoryNotifier::new());
    let pipeline = fixture.pipeline(device.clone(), notifier.clone());

    let mut req = request();
    req.is_default = false;
    let err = pipeline.make(&req).await.unwrap_err();

    assert!(matches!(err, Error::ProfileNotFound { .. }));
    assert_eq!(device.events(), vec!["is_printing"]);
    assert!(!fixture.scratch_dir().exists());
    assert_eq!(notifier.lines(Stream::Stderr), vec![err.to_string()]);
}

#[tokio::test]
async fn test_missing_template_is_fatal() {
    let fixture = Fixture::new();
    fs::remove_file(fixture.config.base_dir.join("marlin/templates/Configuration_adv.h")).unwrap();
    let device = Arc::new(RecordingDevice::default());
    let pipeline = fixture.pipeline(device, Arc::new(MemoryNotifier::new()));

    let err = pipeline.make(&request()).await.unwrap_err();

    assert!(matches!(err, Error::Io { ref path, .. } if path.ends_with("Configuration_adv.h")));
    assert!(!fixture.scratch_dir().exists());
}

#[tokio::test]
async fn test_unwritable_output_is_repaired_once() {
    let mut fixture = Fixture::new();
    // A directory in place of the header makes the first write fail; the
    // helper "repairs" it by removing the directory.
    let target = fixture.firmware_file("Configuration.h");
    fs::create_dir(&target).unwrap();
    fixture.set_helper("rmdir \"$3\"");
    let device = Arc::new(RecordingDevice::default());
    let notifier = Arc::new(MemoryNotifier::new());
    let pipeline = fixture.pipeline(device, notifier.clone());

    pipeline.make(&request()).await.expect("pipeline failed");

    assert_eq!(
        read_lines(&fixture.helper_log()),
        vec![format!("chmod 666 {}", target.display())]
    );
    assert!(target.is_file());
    assert!(
        notifier
            .lines(Stream::Stderr)
            .iter()
            .any(|l| l.ends_with(". Trying to change permission..."))
    );
}

#[tokio::test]
async fn test_failed_repair_is_fatal() {
    let mut fixture = Fixture::new();
    let target = fixture.firmware_file("Configuration.h");
    fs::create_dir(&target).unwrap();
    fixture.set_helper("exit 1");
    let pipeline = fixture.pipeline(
        Arc::new(RecordingDevice::default()),
        Arc::new(MemoryNotifier::new()),
    );

    let err = pipeline.make(&request()).await.unwrap_err();

    assert!(matches!(err, Error::Io { ref path, .. } if *path == target));
    assert_eq!(read_lines(&fixture.helper_log()).len(), 1);
    assert!(!fixture.scratch_dir().exists(), "build must not run");
}
