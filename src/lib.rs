//! # snap-serve
//!
//! Batch image processing against object storage. Users upload images, ask
//! for a set of filters to be applied to some of them, and get back the
//! public locations of the processed copies, with one metadata row per
//! stored image.
//!
//! # Architecture: Batch Pipeline
//!
//! A request runs through four layers, leaf first:
//!
//! ```text
//! params ──resolve──▶ FilterPipeline (once per request, shared read-only)
//!
//! sources ──▶ BatchCoordinator ──spawn──▶ ItemWorker × N (bounded pool)
//!                  ▲                          fetch → decode → filter → encode → upload
//!                  └────── channel ◀──────────┘
//!             BatchOutcome ──▶ PersistenceRecorder ──▶ BatchReport
//! ```
//!
//! Each item succeeds or fails on its own. One bad URL, one oversize image or
//! one failed write never aborts its neighbours; the batch is classified as
//! success, partial success or failure once everything has joined. The only
//! whole-batch failures happen before any work starts: an empty batch, an
//! invalid filter parameter, or no recognised filters at all.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`filters`] | Request parameters → validated, canonically ordered [`filters::FilterPipeline`] |
//! | [`imaging`] | Decode/encode ([`imaging::ImageCodec`]) and the filter kernels |
//! | [`worker`] | One item through fetch → decode → filter → encode → upload |
//! | [`batch`] | Fan-out over a rayon pool, fan-in in completion order, progress events |
//! | [`record`] | One metadata insert per stored blob, failures kept apart |
//! | [`storage`] | Collaborator traits plus local, HTTP and JSON-file implementations |
//! | [`service`] | Wires collaborators from config; `apply` and `upload` requests |
//! | [`types`] | Item and batch result types |
//! | [`naming`] | Unique `<token>_<name>` object names |
//! | [`config`] | `snap-serve.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Threads, Not Tasks
//!
//! Workers are plain rayon jobs doing blocking I/O with per-call timeouts.
//! The coordinator's only job is a join-all, and a bounded thread pool is
//! exactly that: no runtime, no cancellation plumbing, and the same code path
//! for the CPU-heavy filter stage and the I/O stages around it.
//!
//! ## Canonical Filter Order
//!
//! Filters are applied in a fixed order (resize, crop, rotate, brightness,
//! contrast, saturation, blur, pixelate, grayscale, invert) regardless of how
//! the request listed them, so the same request always produces the same
//! image.
//!
//! ## No Compensating Deletes
//!
//! A blob whose metadata insert fails stays in storage. The report lists it
//! under `record_errors` with its location; it counts as a failure in the
//! report's status but never changes the batch outcome.

pub mod batch;
pub mod config;
pub mod filters;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod record;
pub mod service;
pub mod storage;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;
