//! External collaborators: image index, blob fetch, object store, metadata.
//!
//! The batch pipeline only talks to the traits in this module, so every
//! collaborator can be swapped (or mocked in tests) without touching the
//! pipeline. All of them are `Send + Sync`: one instance is shared by
//! reference across every worker of the pool, and each call is expected to be
//! atomic on its own (one blob write, one record insert).
//!
//! | Trait | Production implementations |
//! |---|---|
//! | [`ImageIndex`] | [`JsonRecordStore`] |
//! | [`MetadataStore`] | [`JsonRecordStore`] |
//! | [`BlobFetcher`] | [`HttpFetcher`], [`LocalObjectStore`] |
//! | [`ObjectStore`] | [`LocalObjectStore`], [`HttpObjectStore`] |

pub mod http;
pub mod local;
pub mod records;

pub use http::{HttpFetcher, HttpObjectStore};
pub use local::LocalObjectStore;
pub use records::JsonRecordStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Rejected(String),
}

/// Owner of uploaded images (the authenticated user id upstream).
pub type OwnerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Completed,
}

/// One row of image metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: u64,
    pub owner_id: OwnerId,
    /// Stored object name.
    pub filename: String,
    /// Public location of the stored object; the key sources are looked up by.
    pub original_url: String,
    /// Source this image was processed from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<String>,
    pub status: ImageStatus,
    /// Unix seconds.
    pub created_at: u64,
}

/// Fields the caller supplies for a new record; id and timestamp are assigned
/// by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewImageRecord {
    pub owner_id: OwnerId,
    pub filename: String,
    pub original_url: String,
    pub derived_from: Option<String>,
    pub status: ImageStatus,
}

/// Raw response of a blob fetch. Status and content type are checked by the
/// caller, not the fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub status: u16,
}

impl FetchedBlob {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("image/"))
    }
}

/// Where an object landed after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub location: String,
    pub name: String,
}

/// Lookup of previously uploaded images by public location.
pub trait ImageIndex: Send + Sync {
    fn find_by_location(&self, location: &str) -> Result<Option<ImageRecord>, StoreError>;
}

/// Retrieval of raw bytes by URL. Implementations bound each call by a
/// deadline.
pub trait BlobFetcher: Send + Sync {
    fn fetch(&self, location: &str) -> Result<FetchedBlob, StoreError>;
}

/// Blob storage with a fixed prefix and unique naming.
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` under a unique name derived from `name_hint`.
    fn put(&self, bytes: &[u8], name_hint: &str) -> Result<StoredObject, StoreError>;
}

/// Insertion of image metadata rows.
pub trait MetadataStore: Send + Sync {
    fn insert(&self, record: NewImageRecord) -> Result<ImageRecord, StoreError>;
}

/// Join a public base URL, a prefix and a name with single slashes.
pub(crate) fn public_location(base: &str, prefix: &str, name: &str) -> String {
    format!("{}/{}{}", base.trim_end_matches('/'), prefix, name)
}

/// MIME type for a file name, from its extension.
pub(crate) fn content_type_for(name: &str) -> &'static str {
    image::ImageFormat::from_path(name)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}
