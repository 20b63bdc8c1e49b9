//! Stored object naming.
//!
//! Every blob written to object storage is named `<token>_<base>`:
//!
//! - `token` is the current Unix time in nanoseconds, bumped so it strictly
//!   increases within one [`StoredNameGenerator`] even when the clock stalls
//!   or steps backwards.
//! - `base` is the caller's name hint, reduced to a safe file name.
//!
//! ```text
//! "holiday photo.png"        → 1718035200123456789_holiday_photo.png
//! "processed_image_3.jpg"    → 1718035200123456790_processed_image_3.jpg
//! "../../etc/passwd"         → 1718035200123456791_passwd
//! ```
//!
//! Uploading the same item twice therefore yields two distinct objects; the
//! store never deduplicates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Fallback base when a hint sanitizes to nothing.
const DEFAULT_BASE: &str = "image";

/// Produces collision-resistant stored names.
#[derive(Debug, Default)]
pub struct StoredNameGenerator {
    last: AtomicU64,
}

impl StoredNameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next token: wall-clock nanoseconds, or `last + 1` if the clock hasn't
    /// moved past the previous token.
    pub fn next_token(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(previous + 1);
            match self.last.compare_exchange_weak(
                previous,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }

    /// Unique stored name for a name hint.
    pub fn stored_name(&self, hint: &str) -> String {
        format!("{}_{}", self.next_token(), sanitize_base(hint))
    }
}

/// Reduce a name hint to a single safe path component.
///
/// Keeps only the final path segment; whitespace becomes `_`; anything other
/// than ASCII alphanumerics, `.`, `-` and `_` is dropped.
pub fn sanitize_base(hint: &str) -> String {
    let last_segment = hint.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last_segment
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        DEFAULT_BASE.to_string()
    } else {
        trimmed.to_string()
    }
}
