// NOTE: ocmonitor CLI layering
//
// - The binary only parses arguments, installs logging and maps errors to exit codes
// - Handlers turn runtime reports into plain text lines; no tables, no colors
// - All storage, pricing and tracking behaviour lives in the library crates so
//   tests can drive it without spawning the binary
// - The process exits non-zero only when no session source is usable or the
//   configuration cannot be read

mod args;
mod commands;
mod format;
mod handlers;
pub mod types;

pub use args::{Cli, Commands, SourceArgs};
pub use commands::run;
