//! Deterministic image recompression for formvault uploads.
//!
//! Image payloads are downscaled to fit configured bounds and re-encoded at a
//! fixed quality. Anything that is not an image, or that cannot be decoded,
//! passes through untouched with a `compression_skipped` flag.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod outcome;

pub use engine::{CompressionEngine, is_image_mime, target_dimensions};
pub use outcome::CompressionOutcome;
