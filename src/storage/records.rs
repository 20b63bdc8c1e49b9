//! JSON-file record store.
//!
//! Holds every [`ImageRecord`] in one JSON document, loaded at open and
//! rewritten on each insert (write to a sibling temp file, then rename). All
//! access goes through a `Mutex`, so concurrent inserts from the recorder's
//! workers serialize here and each insert is atomic on its own.
//!
//! Unlike a cache, the record table is the source of truth: a file that
//! exists but cannot be parsed is an error, never silently replaced.
//!
//! ## On-disk format
//!
//! ```json
//! {
//!   "next_id": 3,
//!   "records": [
//!     { "id": 1, "owner_id": 7, "filename": "1718…_cat.png",
//!       "original_url": "http://…/images/1718…_cat.png",
//!       "status": "completed", "created_at": 1718035200 }
//!   ]
//! }
//! ```

use super::{ImageIndex, ImageRecord, MetadataStore, NewImageRecord, OwnerId, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordTable {
    next_id: u64,
    records: Vec<ImageRecord>,
}

impl Default for RecordTable {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

pub struct JsonRecordStore {
    /// `None` keeps records in memory only.
    path: Option<PathBuf>,
    table: Mutex<RecordTable>,
}

impl JsonRecordStore {
    /// Open (or start) the record file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RecordTable::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            table: Mutex::new(table),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            table: Mutex::new(RecordTable::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecordTable> {
        // A panic mid-insert leaves the table consistent: the push is the last step
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn all(&self) -> Vec<ImageRecord> {
        self.lock().records.clone()
    }

    pub fn for_owner(&self, owner: OwnerId) -> Vec<ImageRecord> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.owner_id == owner)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(path: &Path, table: &RecordTable) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(table)?;
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, path)?;
        Ok(())
    }
}

impl ImageIndex for JsonRecordStore {
    fn find_by_location(&self, location: &str) -> Result<Option<ImageRecord>, StoreError> {
        Ok(self
            .lock()
            .records
            .iter()
            .find(|r| r.original_url == location)
            .cloned())
    }
}

impl MetadataStore for JsonRecordStore {
    fn insert(&self, record: NewImageRecord) -> Result<ImageRecord, StoreError> {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut table = self.lock();
        let row = ImageRecord {
            id: table.next_id,
            owner_id: record.owner_id,
            filename: record.filename,
            original_url: record.original_url,
            derived_from: record.derived_from,
            status: record.status,
            created_at,
        };

        if let Some(path) = &self.path {
            let mut next = table.clone();
            next.next_id += 1;
            next.records.push(row.clone());
            Self::persist(path, &next)?;
            *table = next;
        } else {
            table.next_id += 1;
            table.records.push(row.clone());
        }
        Ok(row)
    }
}
