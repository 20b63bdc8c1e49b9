//! CLI output formatting for batches, reports and records.
//!
//! # Output Format
//!
//! ## Progress (one line per event, as items finish)
//!
//! ```text
//! Batch of 3
//!     002 stored  http://src/c.png → http://localhost:8080/storage/images/1718…_processed_image_2.jpg
//!     000 failed  http://src/a.png [fetch] fetch returned HTTP 404
//!     001 stored  http://src/b.png → http://localhost:8080/storage/images/1718…_processed_image_1.jpg
//! Finished: 2 stored, 1 failed, 3 total
//! ```
//!
//! ## Report
//!
//! ```text
//! Status: partial_success (2 of 3 recorded)
//! Stored
//!     001 http://localhost:8080/storage/images/1718…_processed_image_1.jpg
//!         Source: http://src/b.png
//! Failed
//!     000 http://src/a.png
//!         Stage: fetch
//!         Error: fetch returned HTTP 404
//! ```
//!
//! Items are listed by input index, not completion order. Unrecorded items
//! (blob stored, metadata insert failed) get their own `Unrecorded` section
//! with the orphaned location.
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects. Logs go to stderr via
//! `tracing`, so stdout stays clean for these lines and for `--report -`.

use crate::batch::{BatchEvent, ItemStatus};
use crate::filters::supported_filters;
use crate::storage::{ImageRecord, ImageStatus};
use crate::types::BatchReport;
use serde_json::{Value, json};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 0-based input index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Progress events
// ============================================================================

pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Started { total } => vec![format!("Batch of {}", total)],
        BatchEvent::ItemFinished {
            index,
            source,
            status,
        } => {
            let line = match status {
                ItemStatus::Stored { location } => {
                    format!("{} stored  {} → {}", format_index(*index), source, location)
                }
                ItemStatus::Failed { stage, message } => format!(
                    "{} failed  {} [{}] {}",
                    format_index(*index),
                    source,
                    stage,
                    message
                ),
            };
            vec![format!("{}{}", indent(1), line)]
        }
        BatchEvent::Finished {
            succeeded,
            failed,
            total,
        } => vec![format!(
            "Finished: {} stored, {} failed, {} total",
            succeeded, failed, total
        )],
    }
}

// ============================================================================
// Report
// ============================================================================

pub fn format_report(report: &BatchReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Status: {} ({} of {} recorded)",
        report.status().as_str(),
        report.recorded(),
        report.outcome.total
    )];

    let mut stored: Vec<_> = report
        .outcome
        .successes()
        .filter(|u| !report.record_errors.iter().any(|e| e.index == u.index))
        .collect();
    stored.sort_by_key(|u| u.index);
    if !stored.is_empty() {
        lines.push("Stored".to_string());
        for uploaded in stored {
            lines.push(format!(
                "{}{} {}",
                indent(1),
                format_index(uploaded.index),
                uploaded.location
            ));
            lines.push(format!("{}Source: {}", indent(2), uploaded.source));
        }
    }

    let mut failed: Vec<_> = report.outcome.failures().collect();
    failed.sort_by_key(|f| f.index);
    if !failed.is_empty() {
        lines.push("Failed".to_string());
        for failure in failed {
            lines.push(format!(
                "{}{} {}",
                indent(1),
                format_index(failure.index),
                failure.source
            ));
            lines.push(format!("{}Stage: {}", indent(2), failure.error.stage()));
            lines.push(format!("{}Error: {}", indent(2), failure.error));
        }
    }

    let mut unrecorded: Vec<_> = report.record_errors.iter().collect();
    unrecorded.sort_by_key(|e| e.index);
    if !unrecorded.is_empty() {
        lines.push("Unrecorded".to_string());
        for err in unrecorded {
            lines.push(format!(
                "{}{} {}",
                indent(1),
                format_index(err.index),
                err.location
            ));
            lines.push(format!("{}Error: {}", indent(2), err.error));
        }
    }

    lines
}

pub fn print_report(report: &BatchReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

/// Machine-readable form of a report, for `--report`.
pub fn report_json(report: &BatchReport) -> Value {
    let mut images: Vec<_> = report.outcome.successes().collect();
    images.sort_by_key(|u| u.index);
    let mut failures: Vec<_> = report.outcome.failures().collect();
    failures.sort_by_key(|f| f.index);

    let images: Vec<Value> = images
        .iter()
        .map(|u| {
            json!({
                "index": u.index,
                "url": u.location,
                "filename": u.name,
                "source": u.source,
                "derived_from": u.derived_from,
            })
        })
        .collect();
    let errors: Vec<Value> = failures
        .iter()
        .map(|f| {
            json!({
                "index": f.index,
                "source": f.source,
                "stage": f.error.stage().as_str(),
                "error": f.error.to_string(),
            })
        })
        .collect();
    let record_errors: Vec<Value> = report
        .record_errors
        .iter()
        .map(|e| {
            json!({
                "index": e.index,
                "url": e.location,
                "error": e.error.to_string(),
            })
        })
        .collect();

    json!({
        "status": report.status().as_str(),
        "success_count": report.recorded(),
        "total_count": report.outcome.total,
        "urls": report.locations(),
        "images": images,
        "errors": errors,
        "record_errors": record_errors,
    })
}

// ============================================================================
// Filters and records
// ============================================================================

pub fn format_filter_list() -> Vec<String> {
    let mut lines = vec!["Supported filters".to_string()];
    lines.extend(supported_filters().map(|key| format!("{}{}", indent(1), key)));
    lines
}

pub fn print_filter_list() {
    for line in format_filter_list() {
        println!("{}", line);
    }
}

pub fn format_records(records: &[ImageRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["No records".to_string()];
    }
    let mut lines = Vec::new();
    for record in records {
        let status = match record.status {
            ImageStatus::Completed => "completed",
        };
        lines.push(format!(
            "{} {} (owner {}, {})",
            format_index(record.id as usize),
            record.filename,
            record.owner_id,
            status
        ));
        lines.push(format!("{}URL: {}", indent(1), record.original_url));
        if let Some(source) = &record.derived_from {
            lines.push(format!("{}From: {}", indent(1), source));
        }
    }
    lines
}

pub fn print_records(records: &[ImageRecord]) {
    for line in format_records(records) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
