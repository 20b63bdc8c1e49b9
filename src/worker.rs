//! Per-item work: one source in, one [`ItemResult`] out.
//!
//! ```text
//! fetch ──▶ decode ──▶ filter ──▶ encode ──▶ upload
//!   │         │          │          │          │
//!   └─────────┴──────────┴──────────┴──────────┴──▶ ItemFailure { stage }
//! ```
//!
//! A worker never returns `Err` and never panics out: every problem becomes
//! an [`ItemFailure`] tagged with the stage it happened in, so the batch
//! around it keeps going. There are no retries.
//!
//! Raw file uploads take a shorter path ([`FileUploader`]): probe, then
//! upload under the file's own name.

use crate::filters::{FilterPipeline, MAX_IMAGE_HEIGHT, MAX_IMAGE_WIDTH};
use crate::imaging::{self, CodecError, FilterError, ImageCodec, Quality};
use crate::storage::{BlobFetcher, ImageIndex, ObjectStore, StoreError, StoredObject};
use crate::types::{ItemFailure, ItemResult, SourceImage, UploadFile, UploadedImage};
use image::DynamicImage;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, warn};

/// Fixed output quality for processed images.
pub const OUTPUT_QUALITY: u8 = 90;

/// Base name (before the store's unique token) of the `index`-th processed
/// image.
pub fn processed_name(index: usize, extension: &str) -> String {
    format!("processed_image_{index}.{extension}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetch,
    Decode,
    Filter,
    Encode,
    Upload,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Filter => "filter",
            Stage::Encode => "encode",
            Stage::Upload => "upload",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ItemError {
    #[error("image is not registered")]
    NotRegistered,
    #[error("image index lookup failed: {0}")]
    Index(#[source] StoreError),
    #[error("fetch failed: {0}")]
    Transport(#[source] StoreError),
    #[error("fetch returned HTTP {0}")]
    HttpStatus(u16),
    #[error("not an image (content type {})", .content_type.as_deref().unwrap_or("missing"))]
    NotAnImage { content_type: Option<String> },
    #[error("decode failed: {0}")]
    Decode(#[source] CodecError),
    #[error("image is {width}x{height}, larger than {max_width}x{max_height}")]
    TooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("encode failed: {0}")]
    Encode(#[source] CodecError),
    #[error("upload failed: {0}")]
    Upload(#[source] StoreError),
}

impl ItemError {
    pub fn stage(&self) -> Stage {
        match self {
            ItemError::NotRegistered
            | ItemError::Index(_)
            | ItemError::Transport(_)
            | ItemError::HttpStatus(_)
            | ItemError::NotAnImage { .. } => Stage::Fetch,
            ItemError::Decode(_) | ItemError::TooLarge { .. } => Stage::Decode,
            ItemError::Filter(_) => Stage::Filter,
            ItemError::Encode(_) => Stage::Encode,
            ItemError::Upload(_) => Stage::Upload,
        }
    }
}

/// Runs the five stages for one source image.
///
/// Holds shared references only, so a single worker is used from every
/// thread of the pool.
pub struct ItemWorker<'a> {
    index: &'a dyn ImageIndex,
    fetcher: &'a dyn BlobFetcher,
    codec: &'a dyn ImageCodec,
    store: &'a dyn ObjectStore,
    quality: Quality,
}

impl<'a> ItemWorker<'a> {
    pub fn new(
        index: &'a dyn ImageIndex,
        fetcher: &'a dyn BlobFetcher,
        codec: &'a dyn ImageCodec,
        store: &'a dyn ObjectStore,
    ) -> Self {
        Self {
            index,
            fetcher,
            codec,
            store,
            quality: Quality::new(OUTPUT_QUALITY),
        }
    }

    pub fn process(&self, source: &SourceImage, pipeline: &FilterPipeline) -> ItemResult {
        match self.run(source, pipeline) {
            Ok(stored) => {
                debug!(index = source.index, location = %stored.location, "item stored");
                ItemResult::Success(UploadedImage {
                    index: source.index,
                    source: source.location.clone(),
                    location: stored.location,
                    name: stored.name,
                    derived_from: Some(source.location.clone()),
                })
            }
            Err(error) => {
                warn!(
                    index = source.index,
                    source = %source.location,
                    stage = %error.stage(),
                    "item failed: {error}"
                );
                ItemResult::Failure(ItemFailure {
                    index: source.index,
                    source: source.location.clone(),
                    error,
                })
            }
        }
    }

    fn run(&self, source: &SourceImage, pipeline: &FilterPipeline) -> Result<StoredObject, ItemError> {
        let bytes = self.fetch(&source.location)?;
        let image = self.decode(&bytes)?;
        drop(bytes);
        let filtered = apply_contained(image, pipeline)?;
        let encoded = self
            .codec
            .encode(&filtered, self.quality)
            .map_err(ItemError::Encode)?;
        self.store
            .put(&encoded, &processed_name(source.index, self.codec.extension()))
            .map_err(ItemError::Upload)
    }

    fn fetch(&self, location: &str) -> Result<Vec<u8>, ItemError> {
        self.index
            .find_by_location(location)
            .map_err(ItemError::Index)?
            .ok_or(ItemError::NotRegistered)?;

        let blob = self.fetcher.fetch(location).map_err(ItemError::Transport)?;
        if !blob.is_success() {
            return Err(ItemError::HttpStatus(blob.status));
        }
        if !blob.is_image() {
            return Err(ItemError::NotAnImage {
                content_type: blob.content_type,
            });
        }
        Ok(blob.bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, ItemError> {
        let dims = self.codec.dimensions(bytes).map_err(ItemError::Decode)?;
        if dims.width > MAX_IMAGE_WIDTH || dims.height > MAX_IMAGE_HEIGHT {
            return Err(ItemError::TooLarge {
                width: dims.width,
                height: dims.height,
                max_width: MAX_IMAGE_WIDTH,
                max_height: MAX_IMAGE_HEIGHT,
            });
        }
        self.codec.decode(bytes).map_err(ItemError::Decode)
    }
}

/// Run the pipeline, turning a kernel panic into a [`FilterError`].
fn apply_contained(image: DynamicImage, pipeline: &FilterPipeline) -> Result<DynamicImage, FilterError> {
    panic::catch_unwind(AssertUnwindSafe(|| imaging::apply(image, pipeline)))
        .unwrap_or_else(|payload| Err(FilterError::KernelPanicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Stores raw uploads under their own names.
pub struct FileUploader<'a> {
    codec: &'a dyn ImageCodec,
    store: &'a dyn ObjectStore,
}

impl<'a> FileUploader<'a> {
    pub fn new(codec: &'a dyn ImageCodec, store: &'a dyn ObjectStore) -> Self {
        Self { codec, store }
    }

    pub fn upload(&self, index: usize, file: &UploadFile) -> ItemResult {
        let stored = self
            .codec
            .dimensions(&file.bytes)
            .map_err(ItemError::Decode)
            .and_then(|_| {
                self.store
                    .put(&file.bytes, &file.name)
                    .map_err(ItemError::Upload)
            });
        match stored {
            Ok(stored) => ItemResult::Success(UploadedImage {
                index,
                source: file.name.clone(),
                location: stored.location,
                name: stored.name,
                derived_from: None,
            }),
            Err(error) => {
                warn!(index, file = %file.name, stage = %error.stage(), "upload failed: {error}");
                ItemResult::Failure(ItemFailure {
                    index,
                    source: file.name.clone(),
                    error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::resolve;
    use crate::imaging::JpegCodec;
    use crate::test_helpers::*;

    fn pipeline() -> FilterPipeline {
        resolve([("resize", "8x6")]).unwrap()
    }

    fn source(index: usize, location: &str) -> SourceImage {
        SourceImage {
            index,
            location: location.to_string(),
        }
    }

    fn failure_of(result: ItemResult) -> ItemFailure {
        match result {
            ItemResult::Failure(failure) => failure,
            ItemResult::Success(uploaded) => panic!("expected failure, got {uploaded:?}"),
        }
    }

    // =========================================================================
    // Happy path
    // =========================================================================

    #[test]
    fn processes_registered_image() {
        let env = MockEnv::with_sources(&["http://src/a.png"]);
        let worker = env.worker();

        let result = worker.process(&source(3, "http://src/a.png"), &pipeline());

        let ItemResult::Success(uploaded) = result else {
            panic!("expected success");
        };
        assert_eq!(uploaded.index, 3);
        assert_eq!(uploaded.derived_from.as_deref(), Some("http://src/a.png"));
        assert!(uploaded.name.ends_with("processed_image_3.jpg"));

        let puts = env.store.puts();
        assert_eq!(puts.len(), 1);
        let written = image::load_from_memory(&puts[0].bytes).unwrap();
        assert_eq!((written.width(), written.height()), (8, 6));
        assert_eq!(
            image::guess_format(&puts[0].bytes).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn processed_name_uses_index_and_extension() {
        assert_eq!(processed_name(0, "jpg"), "processed_image_0.jpg");
    }

    // =========================================================================
    // Fetch stage
    // =========================================================================

    #[test]
    fn unregistered_source_fails_fetch_without_fetching() {
        let env = MockEnv::with_sources(&[]);
        let failure = failure_of(env.worker().process(&source(0, "http://src/a.png"), &pipeline()));
        assert!(matches!(failure.error, ItemError::NotRegistered));
        assert_eq!(failure.error.stage(), Stage::Fetch);
        assert!(env.fetcher.calls().is_empty());
    }

    #[test]
    fn non_2xx_status_fails_fetch() {
        let env = MockEnv::with_sources(&["http://src/a.png"]);
        env.fetcher.respond("http://src/a.png", 503, Some("text/plain"), Vec::new());
        let failure = failure_of(env.worker().process(&source(0, "http://src/a.png"), &pipeline()));
        assert!(matches!(failure.error, ItemError::HttpStatus(503)));
        assert_eq!(failure.error.stage(), Stage::Fetch);
    }

    #[test]
    fn non_image_content_type_fails_fetch() {
        let env = MockEnv::with_sources(&["http://src/a.png"]);
        env.fetcher
            .respond("http://src/a.png", 200, Some("text/html"), b"<html>".to_vec());
        let failure = failure_of(env.worker().process(&source(0, "http://src/a.png"), &pipeline()));
        assert!(matches!(failure.error, ItemError::NotAnImage { .. }));
        assert!(failure.error.to_string().contains("text/html"));
    }

    #[test]
    fn transport_error_fails_fetch() {
        let env = MockEnv::with_sources(&["http://src/a.png"]);
        env.fetcher.fail("http://src/a.png");
        let failure = failure_of(env.worker().process(&source(0, "http://src/a.png"), &pipeline()));
        assert!(matches!(failure.error, ItemError::Transport(_)));
        assert!(env.store.puts().is_empty());
    }

    // =========================================================================
    // Decode stage
    // =========================================================================

    #[test]
    fn undecodable_bytes_fail_decode() {
        let env = MockEnv::with_sources(&["http://src/a.png"]);
        env.fetcher
            .respond("http://src/a.png", 200, Some("image/png"), b"not really".to_vec());
        let failure = failure_of(env.worker().process(&source(0, "http://src/a.png"), &pipeline()));
        assert_eq!(failure.error.stage(), Stage::Decode);
    }

    #[test]
    fn oversized_image_fails_decode() {
        let env = MockEnv::with_sources(&["http://src/a.png"]);
        env.fetcher.respond(
            "http://src/a.png",
            200,
            Some("image/png"),
            png_bytes(MAX_IMAGE_WIDTH + 1, 1),
        );
        let failure = failure_of(env.worker().process(&source(0, "http://src/a.png"), &pipeline()));
        assert!(matches!(
            failure.error,
            ItemError::TooLarge { width: 4001, height: 1, .. }
        ));
        assert_eq!(failure.error.stage(), Stage::Decode);
    }

    // =========================================================================
    // Filter and upload stages
    // =========================================================================

    #[test]
    fn filter_errors_are_filter_stage() {
        let err = ItemError::from(FilterError::EmptyCanvas { filter: "crop" });
        assert_eq!(err.stage(), Stage::Filter);
        let err = ItemError::from(FilterError::KernelPanicked("boom".into()));
        assert_eq!(err.stage(), Stage::Filter);
        let err = ItemError::from(FilterError::CanvasTooLarge {
            filter: "resize",
            width: 4000,
            height: 16_000_000,
        });
        assert_eq!(err.stage(), Stage::Filter);
    }

    #[test]
    fn every_filter_kind_runs_through_the_worker() {
        let env = MockEnv::with_sources(&["http://src/a.png"]);
        let pipeline = resolve([
            ("resize", "10x10"),
            ("crop_to_size", "8x8"),
            ("rotate", "30"),
            ("brightness_increase", "10"),
            ("contrast_decrease", "5"),
            ("saturation_increase", "50"),
            ("gaussian_blur", "1.5"),
            ("pixelate", "2"),
            ("grayscale", "true"),
            ("invert", "true"),
        ])
        .unwrap();
        let result = env.worker().process(&source(0, "http://src/a.png"), &pipeline);
        assert!(result.is_success());
    }

    #[test]
    fn store_failure_fails_upload() {
        let env = MockEnv::with_sources(&["http://src/a.png"]);
        env.store.fail_next_puts(1);
        let failure = failure_of(env.worker().process(&source(0, "http://src/a.png"), &pipeline()));
        assert!(matches!(failure.error, ItemError::Upload(_)));
        assert_eq!(failure.error.stage(), Stage::Upload);
    }

    #[test]
    fn panic_payload_message_is_kept() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    // =========================================================================
    // Raw uploads
    // =========================================================================

    #[test]
    fn file_uploader_keeps_original_name() {
        let store = MockObjectStore::new();
        let codec = JpegCodec::new();
        let uploader = FileUploader::new(&codec, &store);
        let file = UploadFile {
            name: "cat.png".into(),
            bytes: png_bytes(4, 4),
        };

        let ItemResult::Success(uploaded) = uploader.upload(0, &file) else {
            panic!("expected success");
        };
        assert!(uploaded.name.ends_with("_cat.png"));
        assert_eq!(uploaded.derived_from, None);
        assert_eq!(store.puts()[0].bytes, file.bytes);
    }

    #[test]
    fn file_uploader_rejects_non_images() {
        let store = MockObjectStore::new();
        let codec = JpegCodec::new();
        let uploader = FileUploader::new(&codec, &store);
        let file = UploadFile {
            name: "notes.txt".into(),
            bytes: b"hello".to_vec(),
        };
        let failure = failure_of(uploader.upload(0, &file));
        assert_eq!(failure.error.stage(), Stage::Decode);
        assert!(store.puts().is_empty());
    }
}
