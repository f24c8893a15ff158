//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the formvault binary.

mod attachments;
mod commands;
mod maintenance;

pub use attachments::{delete_attachment, get_attachment, list_attachments, upload_files};
pub use commands::{Cli, Commands};
pub use maintenance::{cleanup, migrate, stats};

use formvault::{FormvaultResult, JsonError};
use serde::Serialize;

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> FormvaultResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| JsonError::new(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
