//! Batch coordination: fan items out over a bounded pool, fan results in.
//!
//! ```text
//!                 ┌── worker(item 0) ──┐
//! sources ──spawn─┼── worker(item 1) ──┼──▶ channel ──▶ BatchOutcome
//!                 └── worker(item N) ──┘   (completion order)
//! ```
//!
//! ## Concurrency
//!
//! One job per item is spawned into a `rayon::scope` on the pool the caller
//! built (`processing.max_workers` threads). The pool's queue bounds how many
//! run at once; the scope is a blocking join-all. Each job sends its result
//! down an `mpsc` channel as soon as it finishes, so results arrive in
//! completion order, not request order. Use each result's `index` to map it
//! back to its input.
//!
//! Nothing is cancelled when an item fails: a failure is just another result.
//! The only ways a batch fails as a whole happen before any job is spawned
//! (empty input, invalid filters, pool construction).
//!
//! ## Progress
//!
//! An optional [`BatchEvent`] sender receives `Started`, one `ItemFinished`
//! per item (from the worker thread, as it finishes) and `Finished`.

use crate::filters::{FilterPipeline, ValidationError};
use crate::types::{BatchOutcome, ItemResult, SourceImage, UploadFile};
use crate::worker::{FileUploader, ItemWorker, Stage};
use rayon::ThreadPool;
use std::sync::mpsc::{self, Sender};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("no images to process")]
    EmptyBatch,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// How one item ended, as reported to the progress sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Stored { location: String },
    Failed { stage: Stage, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    ItemFinished {
        index: usize,
        source: String,
        status: ItemStatus,
    },
    Finished {
        succeeded: usize,
        failed: usize,
        total: usize,
    },
}

impl BatchEvent {
    fn item_finished(result: &ItemResult) -> Self {
        let status = match result {
            ItemResult::Success(uploaded) => ItemStatus::Stored {
                location: uploaded.location.clone(),
            },
            ItemResult::Failure(failure) => ItemStatus::Failed {
                stage: failure.error.stage(),
                message: failure.error.to_string(),
            },
        };
        BatchEvent::ItemFinished {
            index: result.index(),
            source: result.source().to_string(),
            status,
        }
    }
}

/// Build a pool with `threads` workers.
pub fn build_pool(threads: usize) -> Result<ThreadPool, BatchError> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("snap-worker-{i}"))
        .build()?)
}

/// Run `job` for every item on `pool` and collect the results in the order
/// the jobs finished. Blocks until every job is done.
pub fn fan_out<T, R, F>(pool: &ThreadPool, items: &[T], job: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let (tx, rx) = mpsc::channel();
    pool.scope(|scope| {
        for item in items {
            let tx = tx.clone();
            let job = &job;
            scope.spawn(move |_| {
                // The receiver lives until after the scope joins
                let _ = tx.send(job(item));
            });
        }
    });
    drop(tx);
    rx.into_iter().collect()
}

/// Drives one batch over a borrowed pool.
pub struct BatchCoordinator<'a> {
    pool: &'a ThreadPool,
    events: Option<Sender<BatchEvent>>,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(pool: &'a ThreadPool) -> Self {
        Self { pool, events: None }
    }

    pub fn with_events(mut self, events: Option<Sender<BatchEvent>>) -> Self {
        self.events = events;
        self
    }

    /// Process every source through `worker` with the shared `pipeline`.
    pub fn run(
        &self,
        worker: &ItemWorker<'_>,
        sources: &[SourceImage],
        pipeline: &FilterPipeline,
    ) -> Result<BatchOutcome, BatchError> {
        info!(items = sources.len(), filters = %pipeline, "processing batch");
        self.execute(sources, |source| worker.process(source, pipeline))
    }

    /// Store every file through `uploader`.
    pub fn run_uploads(
        &self,
        uploader: &FileUploader<'_>,
        files: &[UploadFile],
    ) -> Result<BatchOutcome, BatchError> {
        info!(items = files.len(), "upload batch");
        let numbered: Vec<(usize, &UploadFile)> = files.iter().enumerate().collect();
        self.execute(&numbered, |(index, file)| uploader.upload(*index, file))
    }

    fn execute<T, F>(&self, items: &[T], job: F) -> Result<BatchOutcome, BatchError>
    where
        T: Sync,
        F: Fn(&T) -> ItemResult + Sync,
    {
        if items.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        self.emit(BatchEvent::Started { total: items.len() });

        let results = fan_out(self.pool, items, |item| {
            let result = job(item);
            self.emit(BatchEvent::item_finished(&result));
            result
        });

        let outcome = BatchOutcome::from_results(results);
        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            total = outcome.total,
            "batch finished"
        );
        self.emit(BatchEvent::Finished {
            succeeded: outcome.succeeded,
            failed: outcome.failed,
            total: outcome.total,
        });
        Ok(outcome)
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.events {
            // A dropped printer must not stop the batch
            let _ = tx.send(event);
        }
    }
}
