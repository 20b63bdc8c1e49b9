//! Image work for a single item, in pure Rust via the `image` crate.
//!
//! | Concern | Module |
//! |---|---|
//! | Decode / probe / encode | [`codec`] ([`ImageCodec`] + [`JpegCodec`]) |
//! | Apply a filter pipeline | [`kernels`] |
//! | Canvas size math | `calculations` (pure, no pixels) |
//!
//! The split mirrors how workers use it: the codec sits at the I/O edges of
//! an item, the kernels run in between, and the calculations let the filter
//! resolver predict output bounds without touching an image.

pub(crate) mod calculations;
pub mod codec;
pub mod kernels;

pub use codec::{CodecError, Dimensions, ImageCodec, JpegCodec, Quality};
pub use kernels::{FilterError, apply};
