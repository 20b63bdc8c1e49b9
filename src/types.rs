//! Result types shared by the worker, the batch coordinator and the recorder.
//!
//! A batch moves through three shapes:
//!
//! ```text
//! SourceImage ──worker──▶ ItemResult ──coordinator──▶ BatchOutcome
//!                                                        │
//!                                     recorder ◀─────────┘ successes only
//!                                        │
//!                                        ▼
//!                               BatchReport { outcome, record_errors }
//! ```
//!
//! `BatchOutcome` is final once the coordinator returns; the recorder never
//! edits it. Record failures live next to it in [`BatchReport`].

use crate::record::RecordError;
use crate::worker::ItemError;

/// One entry of a batch: its position in the request and where to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub index: usize,
    pub location: String,
}

impl SourceImage {
    /// Number a list of locations in request order.
    pub fn enumerate<S: AsRef<str>>(locations: &[S]) -> Vec<SourceImage> {
        locations
            .iter()
            .enumerate()
            .map(|(index, location)| SourceImage {
                index,
                location: location.as_ref().to_string(),
            })
            .collect()
    }
}

/// A raw file handed to an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Client-side file name; becomes the stored name's base.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A blob that made it to object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub index: usize,
    /// What the item was made from: a source URL or an uploaded file name.
    pub source: String,
    /// Public location of the stored object.
    pub location: String,
    /// Stored object name.
    pub name: String,
    /// Source URL when the blob is a processed derivative.
    pub derived_from: Option<String>,
}

#[derive(Debug)]
pub struct ItemFailure {
    pub index: usize,
    pub source: String,
    pub error: ItemError,
}

#[derive(Debug)]
pub enum ItemResult {
    Success(UploadedImage),
    Failure(ItemFailure),
}

impl ItemResult {
    pub fn index(&self) -> usize {
        match self {
            ItemResult::Success(uploaded) => uploaded.index,
            ItemResult::Failure(failure) => failure.index,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            ItemResult::Success(uploaded) => &uploaded.source,
            ItemResult::Failure(failure) => &failure.source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemResult::Success(_))
    }
}

/// Overall classification of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Success,
    PartialSuccess,
    Failure,
}

impl BatchStatus {
    pub fn classify(succeeded: usize, total: usize) -> Self {
        if total > 0 && succeeded == total {
            BatchStatus::Success
        } else if succeeded > 0 {
            BatchStatus::PartialSuccess
        } else {
            BatchStatus::Failure
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Success => "success",
            BatchStatus::PartialSuccess => "partial_success",
            BatchStatus::Failure => "failure",
        }
    }
}

/// Every item's result, in the order items finished.
///
/// `succeeded + failed == total == results.len()` always holds.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<ItemResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl BatchOutcome {
    pub fn from_results(results: Vec<ItemResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let total = results.len();
        Self {
            results,
            succeeded,
            failed: total - succeeded,
            total,
        }
    }

    pub fn successes(&self) -> impl Iterator<Item = &UploadedImage> {
        self.results.iter().filter_map(|r| match r {
            ItemResult::Success(uploaded) => Some(uploaded),
            ItemResult::Failure(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemFailure> {
        self.results.iter().filter_map(|r| match r {
            ItemResult::Failure(failure) => Some(failure),
            ItemResult::Success(_) => None,
        })
    }

    pub fn status(&self) -> BatchStatus {
        BatchStatus::classify(self.succeeded, self.total)
    }
}

/// What a caller gets back from a processing or upload batch.
#[derive(Debug)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    /// Successes whose blob exists but whose metadata row could not be written.
    pub record_errors: Vec<RecordError>,
}

impl BatchReport {
    /// Items that are both stored and recorded.
    pub fn recorded(&self) -> usize {
        self.outcome.succeeded.saturating_sub(self.record_errors.len())
    }

    /// Successes that never got a metadata row count as failures here, since
    /// nothing can find them afterwards.
    pub fn status(&self) -> BatchStatus {
        BatchStatus::classify(self.recorded(), self.outcome.total)
    }

    /// Public locations of items that are stored and recorded, in completion
    /// order.
    pub fn locations(&self) -> Vec<&str> {
        self.outcome
            .successes()
            .filter(|u| !self.record_errors.iter().any(|e| e.index == u.index))
            .map(|u| u.location.as_str())
            .collect()
    }
}
