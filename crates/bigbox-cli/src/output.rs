//! Terminal rendering of plugin messages.

use bigbox_core::{Notifier, PluginMessage, Stream};

use crate::colors;

/// Notifier printing every message as it arrives.
///
/// Tool stderr and pipeline errors go to stderr in red, progress lines are
/// bold, status changes are dimmed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn send(&self, message: PluginMessage) {
        match message {
            PluginMessage::Logline { line, stream } => match stream {
                Stream::Stdout => println!("{}", line),
                Stream::Message => println!("{}{}{}", colors::BOLD, line, colors::RESET),
                Stream::Stderr => eprintln!("{}{}{}", colors::RED, line, colors::RESET),
            },
            PluginMessage::Status {
                status_type,
                status_value,
                ..
            } => {
                println!(
                    "{}[{}] {}{}",
                    colors::DIM,
                    status_type,
                    status_value,
                    colors::RESET
                );
            }
        }
    }
}

/// Print a section header.
pub fn print_header(title: &str) {
    println!("\n{}{}{}", colors::BOLD, title, colors::RESET);
    println!("{}", "─".repeat(50));
}

/// Print a `label: value` line.
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("{}  ◆ {}:{} {}", colors::CYAN, label, colors::RESET, value);
}
