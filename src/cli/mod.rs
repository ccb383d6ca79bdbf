//! Command-line interface module.

mod args;
pub mod build;
pub mod list;
pub mod resolve;
pub mod watch;

pub use args::{Cli, Commands};
