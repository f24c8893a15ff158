//! Migration, usage and cleanup handlers.

use super::print_json;
use formvault::{AttachmentService, FileId, FormvaultResult, MigrationTarget};
use serde_json::json;

/// Migrate one record, or all of them.
pub async fn migrate(service: &AttachmentService, id: Option<&str>) -> FormvaultResult<()> {
    let target = match id {
        Some(id) => MigrationTarget::One(FileId::from(id)),
        None => MigrationTarget::All,
    };

    let report = service.migrate(target).await?;
    print_json(&json!({
        "migrated": report.migrated(),
        "skipped": report.skipped(),
        "failed": report.failed(),
        "entries": report.entries,
    }))
}

/// Print usage statistics.
pub async fn stats(service: &AttachmentService) -> FormvaultResult<()> {
    print_json(&service.stats().await)
}

/// Evict embedded records older than `older_than_days`.
pub async fn cleanup(service: &AttachmentService, older_than_days: u32) -> FormvaultResult<()> {
    let report = service.cleanup(older_than_days).await;
    print_json(&report)
}
