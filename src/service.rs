//! The service façade: wires collaborators from config and runs whole
//! requests.
//!
//! ```text
//! apply(sources, params, owner)
//!   ├─ drop blank sources, reject empty      → BatchError::EmptyBatch
//!   ├─ resolve(params)                       → BatchError::Validation
//!   ├─ BatchCoordinator::run                 → BatchOutcome
//!   └─ PersistenceRecorder::record_all       → Vec<RecordError>
//!                                            ⇒ BatchReport
//! upload(files, owner)
//!   ├─ reject empty                          → BatchError::EmptyBatch
//!   ├─ BatchCoordinator::run_uploads         → BatchOutcome
//!   └─ PersistenceRecorder::record_all       ⇒ BatchReport
//! ```
//!
//! The service owns the collaborators behind `Arc<dyn …>` and one worker
//! pool; every request borrows them.

use crate::batch::{BatchCoordinator, BatchError, BatchEvent, build_pool};
use crate::config::{ServiceConfig, StorageBackend, effective_workers};
use crate::filters;
use crate::imaging::{ImageCodec, JpegCodec};
use crate::record::PersistenceRecorder;
use crate::storage::{
    BlobFetcher, HttpFetcher, HttpObjectStore, ImageIndex, JsonRecordStore, LocalObjectStore,
    MetadataStore, ObjectStore, OwnerId, StoreError,
};
use crate::types::{BatchOutcome, BatchReport, SourceImage, UploadFile, UploadedImage};
use crate::worker::{FileUploader, ItemWorker};
use rayon::ThreadPool;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use tracing::info;

/// The collaborators a [`FilterService`] runs against.
#[derive(Clone)]
pub struct Services {
    pub index: Arc<dyn ImageIndex>,
    pub fetcher: Arc<dyn BlobFetcher>,
    pub codec: Arc<dyn ImageCodec>,
    pub store: Arc<dyn ObjectStore>,
    pub records: Arc<dyn MetadataStore>,
}

/// Build production collaborators from config.
///
/// Returns the record store separately as well, so callers can list rows.
pub fn build_services(config: &ServiceConfig) -> Result<(Services, Arc<JsonRecordStore>), StoreError> {
    let records = Arc::new(JsonRecordStore::open(&config.records.path)?);
    let codec: Arc<dyn ImageCodec> = Arc::new(JpegCodec::new());
    let storage = &config.storage;

    let fetcher: Arc<dyn BlobFetcher>;
    let store: Arc<dyn ObjectStore>;
    match storage.backend {
        StorageBackend::Local => {
            // Serves its own objects back, so it is the fetcher too
            let local = Arc::new(LocalObjectStore::new(
                &storage.root,
                storage.prefix.clone(),
                storage.public_base_url.clone(),
            ));
            fetcher = local.clone();
            store = local;
        }
        StorageBackend::Http => {
            fetcher = Arc::new(HttpFetcher::new(config.network.fetch_timeout())?);
            store = Arc::new(HttpObjectStore::new(
                storage.endpoint.clone(),
                storage.prefix.clone(),
                storage.public_base_url.clone(),
                config.network.upload_timeout(),
            )?);
        }
    }

    let services = Services {
        index: records.clone(),
        fetcher,
        codec,
        store,
        records: records.clone(),
    };
    Ok((services, records))
}

pub struct FilterService {
    services: Services,
    pool: ThreadPool,
}

impl FilterService {
    pub fn new(services: Services, workers: usize) -> Result<Self, BatchError> {
        Ok(Self {
            services,
            pool: build_pool(workers)?,
        })
    }

    pub fn from_config(services: Services, config: &ServiceConfig) -> Result<Self, BatchError> {
        Self::new(services, effective_workers(&config.processing))
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Apply the filters in `params` to every source and record the results
    /// for `owner`.
    pub fn apply<I, K, V>(
        &self,
        sources: &[String],
        params: I,
        owner: OwnerId,
        events: Option<Sender<BatchEvent>>,
    ) -> Result<BatchReport, BatchError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let locations: Vec<&str> = sources
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if locations.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        let pipeline = filters::resolve(params)?;
        info!(owner, pipeline = %pipeline, "apply request");

        let worker = ItemWorker::new(
            self.services.index.as_ref(),
            self.services.fetcher.as_ref(),
            self.services.codec.as_ref(),
            self.services.store.as_ref(),
        );
        let outcome = BatchCoordinator::new(&self.pool)
            .with_events(events)
            .run(&worker, &SourceImage::enumerate(&locations), &pipeline)?;
        Ok(self.record(outcome, owner))
    }

    /// Store raw files and record them for `owner`, making them processable.
    pub fn upload(
        &self,
        files: &[UploadFile],
        owner: OwnerId,
        events: Option<Sender<BatchEvent>>,
    ) -> Result<BatchReport, BatchError> {
        info!(owner, files = files.len(), "upload request");
        let uploader = FileUploader::new(
            self.services.codec.as_ref(),
            self.services.store.as_ref(),
        );
        let outcome = BatchCoordinator::new(&self.pool)
            .with_events(events)
            .run_uploads(&uploader, files)?;
        Ok(self.record(outcome, owner))
    }

    fn record(&self, outcome: BatchOutcome, owner: OwnerId) -> BatchReport {
        let successes: Vec<&UploadedImage> = outcome.successes().collect();
        let record_errors = PersistenceRecorder::new(&self.pool, self.services.records.as_ref())
            .record_all(&successes, owner);
        BatchReport {
            outcome,
            record_errors,
        }
    }
}
