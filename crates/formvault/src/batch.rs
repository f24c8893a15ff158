//! Concurrent multi-file uploads with progress and cancellation.

use crate::AttachmentService;
use formvault_core::{FileInput, FileRecord, UploadContext};
use formvault_storage::{StorageError, StorageErrorKind, StorageResult};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Progress snapshot of a running batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// Items resolved so far, successful or not
    pub completed: usize,
    /// Items stored
    pub succeeded: usize,
    /// Items failed or cancelled
    pub failed: usize,
    /// Items in the batch
    pub total: usize,
}

impl BatchProgress {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    fn record(&mut self, succeeded: bool) {
        self.completed += 1;
        if succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// True once every item has resolved.
    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Outcome of one batch item.
#[derive(Debug, Clone)]
pub enum BatchItemOutcome {
    /// The file was stored
    Stored(FileRecord),
    /// The file was not stored
    Failed {
        /// Name supplied by the uploader
        original_name: String,
        /// Why it failed
        error: StorageError,
    },
}

impl BatchItemOutcome {
    /// The stored record, if any.
    pub fn record(&self) -> Option<&FileRecord> {
        match self {
            BatchItemOutcome::Stored(record) => Some(record),
            BatchItemOutcome::Failed { .. } => None,
        }
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&StorageError> {
        match self {
            BatchItemOutcome::Stored(_) => None,
            BatchItemOutcome::Failed { error, .. } => Some(error),
        }
    }
}

/// Per-item outcomes in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One outcome per input, same order
    pub outcomes: Vec<BatchItemOutcome>,
}

impl BatchReport {
    /// Number of stored items.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.record().is_some()).count()
    }

    /// Number of failed or cancelled items.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Handle to a batch running in the background.
pub struct BatchHandle {
    progress: watch::Receiver<BatchProgress>,
    cancel: CancellationToken,
    task: JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// Receiver for progress updates, published after each item resolves.
    pub fn progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress.clone()
    }

    /// Stop scheduling new items. In-flight items still finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for every item to resolve.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the driving task panicked.
    pub async fn finish(self) -> StorageResult<BatchReport> {
        self.task.await.map_err(|e| {
            StorageError::new(StorageErrorKind::Persistence(format!(
                "batch task failed: {}",
                e
            )))
        })
    }
}

/// Runs one upload batch through a bounded worker pool.
///
/// Items are uploaded concurrently, at most `workers` at a time. A failing
/// item never aborts the others, and the report preserves input order.
///
/// # Example
///
/// ```rust
/// use formvault::{AttachmentService, BatchUploadCoordinator};
/// use formvault_core::{FileInput, FormvaultConfig, UploadContext};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = AttachmentService::builder(FormvaultConfig::default()).build().await?;
/// let batch = BatchUploadCoordinator::new(service, 4);
///
/// let handle = batch.start(
///     UploadContext::new("sub-1", "attachments"),
///     vec![
///         FileInput::new("a.txt", "text/plain", b"first".to_vec()),
///         FileInput::new("b.txt", "text/plain", b"second".to_vec()),
///     ],
/// );
/// let report = handle.finish().await?;
/// assert_eq!(report.succeeded(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BatchUploadCoordinator {
    service: AttachmentService,
    workers: usize,
}

impl BatchUploadCoordinator {
    /// Create a coordinator with a pool of `workers` concurrent uploads.
    pub fn new(service: AttachmentService, workers: usize) -> Self {
        Self {
            service,
            workers: workers.max(1),
        }
    }

    /// Start a batch with its own cancellation token.
    pub fn start(&self, context: UploadContext, inputs: Vec<FileInput>) -> BatchHandle {
        self.start_with_token(context, inputs, CancellationToken::new())
    }

    /// Start a batch controlled by `cancel`.
    ///
    /// Items not yet scheduled when `cancel` fires resolve as `Cancelled`.
    pub fn start_with_token(
        &self,
        context: UploadContext,
        inputs: Vec<FileInput>,
        cancel: CancellationToken,
    ) -> BatchHandle {
        let (progress_tx, progress_rx) = watch::channel(BatchProgress::new(inputs.len()));
        let task = tokio::spawn(drive(
            self.service.clone(),
            self.workers,
            context,
            inputs,
            cancel.clone(),
            Arc::new(progress_tx),
        ));

        BatchHandle {
            progress: progress_rx,
            cancel,
            task,
        }
    }

    /// Run a batch to completion.
    pub async fn run(
        &self,
        context: UploadContext,
        inputs: Vec<FileInput>,
    ) -> StorageResult<BatchReport> {
        self.start(context, inputs).finish().await
    }
}

#[tracing::instrument(
    skip_all,
    fields(
        submission = %context.submission_id(),
        field = %context.field_id(),
        total = inputs.len(),
        workers = workers
    )
)]
async fn drive(
    service: AttachmentService,
    workers: usize,
    context: UploadContext,
    inputs: Vec<FileInput>,
    cancel: CancellationToken,
    progress: Arc<watch::Sender<BatchProgress>>,
) -> BatchReport {
    let total = inputs.len();
    let names: Vec<String> = inputs.iter().map(|i| i.original_name().clone()).collect();
    let mut outcomes: Vec<Option<BatchItemOutcome>> = (0..total).map(|_| None).collect();

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    for (index, input) in inputs.into_iter().enumerate() {
        // Cancellation wins over an available permit
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            tracing::info!(scheduled = index, "Batch cancelled, skipping remaining items");
            break;
        };

        let service = service.clone();
        let context = context.clone();
        let progress = Arc::clone(&progress);
        tasks.spawn(async move {
            let _permit = permit;
            let name = input.original_name().clone();
            let outcome = match service.upload(input, &context).await {
                Ok(record) => BatchItemOutcome::Stored(record),
                Err(error) => {
                    tracing::warn!(index, name = %name, error = %error, "Batch item failed");
                    BatchItemOutcome::Failed {
                        original_name: name,
                        error,
                    }
                }
            };
            let succeeded = outcome.record().is_some();
            progress.send_modify(|p| p.record(succeeded));
            (index, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(e) => tracing::error!(error = %e, "Batch worker panicked"),
        }
    }

    let outcomes = outcomes
        .into_iter()
        .zip(names)
        .map(|(outcome, name)| {
            outcome.unwrap_or_else(|| {
                let kind = if cancel.is_cancelled() {
                    StorageErrorKind::Cancelled(name.clone())
                } else {
                    StorageErrorKind::Persistence(format!("worker for {} did not finish", name))
                };
                progress.send_modify(|p| p.record(false));
                BatchItemOutcome::Failed {
                    original_name: name,
                    error: StorageError::new(kind),
                }
            })
        })
        .collect();

    let report = BatchReport { outcomes };
    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Batch finished"
    );
    report
}
