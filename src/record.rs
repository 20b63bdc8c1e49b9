//! Metadata rows for stored blobs.
//!
//! Runs after the batch has joined, over its successes only. Each insert is
//! its own job on the same pool; one failing insert does not affect the
//! others and never changes the [`BatchOutcome`](crate::types::BatchOutcome).
//!
//! A failed insert leaves its blob in object storage with no row pointing at
//! it. Nothing deletes that blob; the [`RecordError`] carries its location so
//! it can be cleaned up by hand.

use crate::batch::fan_out;
use crate::storage::{ImageStatus, MetadataStore, NewImageRecord, OwnerId, StoreError};
use crate::types::UploadedImage;
use rayon::ThreadPool;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
#[error("failed to record {location}: {error}")]
pub struct RecordError {
    pub index: usize,
    /// Location of the orphaned blob.
    pub location: String,
    pub name: String,
    #[source]
    pub error: StoreError,
}

pub struct PersistenceRecorder<'a> {
    pool: &'a ThreadPool,
    store: &'a dyn MetadataStore,
}

impl<'a> PersistenceRecorder<'a> {
    pub fn new(pool: &'a ThreadPool, store: &'a dyn MetadataStore) -> Self {
        Self { pool, store }
    }

    /// Insert one row per upload for `owner`; returns the inserts that failed.
    pub fn record_all(&self, uploads: &[&UploadedImage], owner: OwnerId) -> Vec<RecordError> {
        if uploads.is_empty() {
            return Vec::new();
        }
        let failures: Vec<RecordError> = fan_out(self.pool, uploads, |uploaded| {
            self.record_one(uploaded, owner).err()
        })
        .into_iter()
        .flatten()
        .collect();
        info!(
            recorded = uploads.len() - failures.len(),
            failed = failures.len(),
            "records written"
        );
        failures
    }

    fn record_one(&self, uploaded: &UploadedImage, owner: OwnerId) -> Result<(), RecordError> {
        let row = NewImageRecord {
            owner_id: owner,
            filename: uploaded.name.clone(),
            original_url: uploaded.location.clone(),
            derived_from: uploaded.derived_from.clone(),
            status: ImageStatus::Completed,
        };
        self.store.insert(row).map(|_| ()).map_err(|e| {
            error!(
                index = uploaded.index,
                location = %uploaded.location,
                "record insert failed, blob left orphaned: {e}"
            );
            RecordError {
                index: uploaded.index,
                location: uploaded.location.clone(),
                name: uploaded.name.clone(),
                error: e,
            }
        })
    }
}
