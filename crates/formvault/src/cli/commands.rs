//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Formvault - attachment storage for form submissions
#[derive(Parser, Debug)]
#[command(name = "formvault")]
#[command(about = "Store, migrate and evict form attachments", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file applied over the defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload files into one submission field
    Upload {
        /// Files to upload, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Submission the files belong to
        #[arg(long)]
        submission: String,

        /// Form field the files were uploaded to
        #[arg(long)]
        field: String,

        /// MIME type for every file (guessed from the extension otherwise)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Show a record and fetch its payload
    Get {
        /// Record id
        id: String,

        /// Write embedded bytes to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Delete a record and its payload
    Delete {
        /// Record id
        id: String,
    },

    /// List the records of a submission in creation order
    List {
        /// Submission id
        submission: String,
    },

    /// Move embedded payloads to remote storage
    Migrate {
        /// Migrate only this record
        #[arg(long)]
        id: Option<String>,
    },

    /// Show storage usage
    Stats,

    /// Delete embedded records older than a number of days
    Cleanup {
        /// Age threshold in days
        #[arg(long)]
        older_than_days: u32,
    },
}
