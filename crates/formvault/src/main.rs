//! Formvault CLI binary.
//!
//! This binary provides command-line access to a formvault store:
//! - Upload files into a submission field
//! - Fetch, list and delete attachments
//! - Migrate embedded payloads and evict old records

use clap::Parser;
use formvault::{AttachmentService, FormvaultConfig};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{
        Cli, Commands, cleanup, delete_attachment, get_attachment, list_attachments, migrate,
        stats, upload_files,
    };

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    let default_directive = if cli.verbose { "debug" } else { "info" };
    formvault::init_tracing(default_directive)?;

    let config = FormvaultConfig::load(cli.config.as_deref())?.with_default_data_dir()?;
    let service = AttachmentService::open(config).await?;

    // Execute the requested command
    match cli.command {
        Commands::Upload {
            files,
            submission,
            field,
            mime,
        } => {
            upload_files(&service, &files, &submission, &field, mime.as_deref()).await?;
        }

        Commands::Get { id, out } => {
            get_attachment(&service, &id, out.as_deref()).await?;
        }

        Commands::Delete { id } => {
            delete_attachment(&service, &id).await?;
        }

        Commands::List { submission } => {
            list_attachments(&service, &submission).await?;
        }

        Commands::Migrate { id } => {
            migrate(&service, id.as_deref()).await?;
        }

        Commands::Stats => {
            stats(&service).await?;
        }

        Commands::Cleanup { older_than_days } => {
            cleanup(&service, older_than_days).await?;
        }
    }

    Ok(())
}
