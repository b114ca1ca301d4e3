//! Core engine for the BigBox firmware builder.
//!
//! This crate provides:
//! - Directive rewriting of Marlin configuration headers against a profile
//! - Streaming execution of external tools (make, avrdude, apt-get)
//! - The build/flash pipeline tying both to the printer connection
//! - File-backed profile storage
//!
//! # Architecture
//!
//! ```text
//! ProfileStore ──► Profile ──┐
//!                            ├──► DirectiveRewriter ──► marlin/Marlin/*.h
//! marlin/templates/*.h ──────┘
//!
//! BuildPipeline ──► ProcessRunner ──► make / avrdude ──► Notifier (stdout, stderr)
//!       │
//!       └──► DeviceConnection (is_printing, disconnect, connect)
//! ```

pub mod config;
pub mod deps;
pub mod device;
pub mod error;
pub mod notify;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod profile;
pub mod rewrite;

pub use config::FirmwareConfig;
pub use device::{DeviceConnection, LocalConnection};
pub use error::{Error, Result};
pub use notify::{MemoryNotifier, Notifier, PluginMessage, Stream};
pub use paths::PluginDirs;
pub use pipeline::{BuildPipeline, FirmwareContext, MakeRequest};
pub use process::{Invocation, ProcessOutput, ProcessRunner};
pub use profile::{DirectiveOverride, Profile, ProfileEnvelope, ProfileStore};
pub use rewrite::{DirectiveRewriter, rewrite_template};
