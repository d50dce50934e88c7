//! Shared configuration, widget model and command execution for ControlDeck.

pub mod command;
pub mod config;
pub mod util;
pub mod widget;

pub use command::{CommandExecutor, CommandLine, CommandRunner};
pub use config::*;
pub use util::program_in_path;
pub use widget::*;
