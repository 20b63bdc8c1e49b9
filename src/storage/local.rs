//! Filesystem-backed object store.
//!
//! Objects are written to `<root>/<prefix><stored name>` and published as
//! `<public_base_url>/<prefix><stored name>`, the way a static file server or
//! CDN in front of `root` would expose them. The same store can fetch its own
//! objects back by public URL, which lets a single machine run the whole
//! upload → process loop without a blob service.

use super::{BlobFetcher, FetchedBlob, ObjectStore, StoreError, StoredObject};
use super::{content_type_for, public_location};
use crate::naming::StoredNameGenerator;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

pub struct LocalObjectStore {
    root: PathBuf,
    prefix: String,
    public_base_url: String,
    names: StoredNameGenerator,
}

impl LocalObjectStore {
    pub fn new(
        root: impl Into<PathBuf>,
        prefix: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
            public_base_url: public_base_url.into(),
            names: StoredNameGenerator::new(),
        }
    }

    /// Map a public URL back to a path under `root`.
    ///
    /// `None` when the URL is not under this store's public base or tries to
    /// escape `root`.
    fn path_for(&self, location: &str) -> Option<PathBuf> {
        let base = self.public_base_url.trim_end_matches('/');
        let relative = location.strip_prefix(base)?.strip_prefix('/')?;
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, bytes: &[u8], name_hint: &str) -> Result<StoredObject, StoreError> {
        let dir = self.root.join(&self.prefix);
        std::fs::create_dir_all(&dir)?;
        let name = self.names.stored_name(name_hint);
        let path = dir.join(&name);
        // Stage then rename so readers never see a half-written object
        let staging = dir.join(format!(".{name}.part"));
        std::fs::write(&staging, bytes)?;
        std::fs::rename(&staging, &path)?;
        Ok(StoredObject {
            location: public_location(&self.public_base_url, &self.prefix, &name),
            name,
        })
    }
}

impl BlobFetcher for LocalObjectStore {
    fn fetch(&self, location: &str) -> Result<FetchedBlob, StoreError> {
        let path = self.path_for(location).ok_or_else(|| {
            StoreError::Rejected(format!("{location} is not served by the local store"))
        })?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(FetchedBlob {
                bytes,
                content_type: Some(content_type_for(&path.to_string_lossy()).to_string()),
                status: 200,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FetchedBlob {
                bytes: Vec::new(),
                content_type: None,
                status: 404,
            }),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
