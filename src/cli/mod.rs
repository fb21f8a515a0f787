//! command line front end
//!
//! argument parsing lives in `args`; `commands` opens the repository, runs
//! one operation and renders its output.

pub mod args;
pub mod commands;

pub use args::{CheckoutTarget, Cli, Command};
pub use commands::{run, CliError, CliResult};
