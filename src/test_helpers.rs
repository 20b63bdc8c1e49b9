//! Shared test utilities: fixture images and mock collaborators.
//!
//! Every mock records what it was asked to do behind a `Mutex`, so the same
//! instance can be handed to all workers of a rayon pool and inspected once
//! the batch has joined.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let env = MockEnv::with_sources(&["http://src/a.png", "http://src/b.png"]);
//! env.fetcher.respond("http://src/b.png", 404, None, Vec::new());
//!
//! let result = env.worker().process(&source, &pipeline);
//! assert_eq!(env.store.puts().len(), 1);
//! ```

use crate::imaging::JpegCodec;
use crate::naming::StoredNameGenerator;
use crate::storage::{
    BlobFetcher, FetchedBlob, ImageIndex, ImageRecord, ImageStatus, MetadataStore,
    NewImageRecord, ObjectStore, StoreError, StoredObject,
};
use crate::worker::ItemWorker;
use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

// =========================================================================
// Fixture images
// =========================================================================

/// Encode a `width`×`height` PNG with a simple gradient.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

// =========================================================================
// Mock collaborators
// =========================================================================

/// Index that knows a fixed set of locations.
#[derive(Default)]
pub struct MockIndex {
    known: Mutex<HashSet<String>>,
}

impl MockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, location: &str) {
        self.known.lock().unwrap().insert(location.to_string());
    }
}

impl ImageIndex for MockIndex {
    fn find_by_location(&self, location: &str) -> Result<Option<ImageRecord>, StoreError> {
        if !self.known.lock().unwrap().contains(location) {
            return Ok(None);
        }
        Ok(Some(ImageRecord {
            id: 1,
            owner_id: 1,
            filename: location.rsplit('/').next().unwrap_or_default().to_string(),
            original_url: location.to_string(),
            derived_from: None,
            status: ImageStatus::Completed,
            created_at: 0,
        }))
    }
}

enum Canned {
    Blob(FetchedBlob),
    Fail,
}

/// Fetcher with canned responses; unknown locations answer 404.
#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Canned>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, location: &str, status: u16, content_type: Option<&str>, bytes: Vec<u8>) {
        self.responses.lock().unwrap().insert(
            location.to_string(),
            Canned::Blob(FetchedBlob {
                bytes,
                content_type: content_type.map(str::to_string),
                status,
            }),
        );
    }

    /// Serve a small PNG at `location`.
    pub fn serve_png(&self, location: &str) {
        self.respond(location, 200, Some("image/png"), png_bytes(16, 12));
    }

    /// Make fetching `location` a transport error.
    pub fn fail(&self, location: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(location.to_string(), Canned::Fail);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl BlobFetcher for MockFetcher {
    fn fetch(&self, location: &str) -> Result<FetchedBlob, StoreError> {
        self.calls.lock().unwrap().push(location.to_string());
        match self.responses.lock().unwrap().get(location) {
            Some(Canned::Blob(blob)) => Ok(blob.clone()),
            Some(Canned::Fail) => Err(StoreError::Rejected(format!("connection reset: {location}"))),
            None => Ok(FetchedBlob {
                bytes: Vec::new(),
                content_type: None,
                status: 404,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedPut {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Object store that keeps every write in memory.
#[derive(Default)]
pub struct MockObjectStore {
    names: StoredNameGenerator,
    puts: Mutex<Vec<RecordedPut>>,
    failures_left: AtomicUsize,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` writes.
    pub fn fail_next_puts(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn puts(&self) -> Vec<RecordedPut> {
        self.puts.lock().unwrap().clone()
    }
}

impl ObjectStore for MockObjectStore {
    fn put(&self, bytes: &[u8], name_hint: &str) -> Result<StoredObject, StoreError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Rejected("bucket unavailable".into()));
        }
        let name = self.names.stored_name(name_hint);
        self.puts.lock().unwrap().push(RecordedPut {
            name: name.clone(),
            bytes: bytes.to_vec(),
        });
        Ok(StoredObject {
            location: format!("http://mock-store/images/{name}"),
            name,
        })
    }
}

/// Metadata store that fails inserts whose file name contains a marker.
#[derive(Default)]
pub struct MockMetadataStore {
    inserted: Mutex<Vec<NewImageRecord>>,
    poison: Mutex<Vec<String>>,
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when_name_contains(&self, marker: &str) {
        self.poison.lock().unwrap().push(marker.to_string());
    }

    pub fn inserted(&self) -> Vec<NewImageRecord> {
        self.inserted.lock().unwrap().clone()
    }
}

impl MetadataStore for MockMetadataStore {
    fn insert(&self, record: NewImageRecord) -> Result<ImageRecord, StoreError> {
        let poisoned = self
            .poison
            .lock()
            .unwrap()
            .iter()
            .any(|marker| record.filename.contains(marker.as_str()));
        if poisoned {
            return Err(StoreError::Rejected("constraint violation".into()));
        }
        let mut inserted = self.inserted.lock().unwrap();
        inserted.push(record.clone());
        Ok(ImageRecord {
            id: inserted.len() as u64,
            owner_id: record.owner_id,
            filename: record.filename,
            original_url: record.original_url,
            derived_from: record.derived_from,
            status: record.status,
            created_at: 0,
        })
    }
}

// =========================================================================
// Wired-up environment
// =========================================================================

/// One of each mock, with a set of registered, fetchable PNG sources.
#[derive(Default)]
pub struct MockEnv {
    pub index: MockIndex,
    pub fetcher: MockFetcher,
    pub codec: JpegCodec,
    pub store: MockObjectStore,
    pub records: MockMetadataStore,
}

impl MockEnv {
    pub fn with_sources(locations: &[&str]) -> Self {
        let env = Self::default();
        for location in locations {
            env.index.register(location);
            env.fetcher.serve_png(location);
        }
        env
    }

    pub fn worker(&self) -> ItemWorker<'_> {
        ItemWorker::new(&self.index, &self.fetcher, &self.codec, &self.store)
    }
}
