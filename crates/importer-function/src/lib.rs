//! Importer Function - command-line runner
//!
//! Reads one RunFunction request, runs a reconciliation pass against the
//! HTTP tag index and prints the response. Exposed as a library so the
//! commands can be exercised without spawning the binary.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cli;
pub mod commands;
pub mod logging;

pub use cli::{Cli, Command, LogFormat, RunArgs, ValidateInputArgs};
