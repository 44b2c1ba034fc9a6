//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the decode/encode capability the thumbnail
//! cache depends on: identify a source, and render a [`CropPlan`] into
//! encoded bytes. Both operations are bytes in, bytes out; all file I/O
//! belongs to the caller.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust, statically
//! linked.

use super::calculations::CropPlan;
use super::params::{Dimensions, Quality, SourceFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Unsupported image type: {0}")]
    Unsupported(String),
    #[error("Failed to decode {format} image: {message}")]
    Decode {
        format: SourceFormat,
        message: String,
    },
    #[error("Failed to encode {format} image: {message}")]
    Encode {
        format: SourceFormat,
        message: String,
    },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// Implementations must be stateless and deterministic: the same input
/// bytes, format, plan, and quality always produce the same output bytes.
pub trait ImageBackend: Sync {
    /// Detect the format and pixel size of an encoded image.
    fn identify(&self, bytes: &[u8]) -> Result<(SourceFormat, Dimensions), BackendError>;

    /// Decode `bytes`, resample to the plan's intermediate size, crop, and
    /// re-encode in `format`.
    fn render(
        &self,
        bytes: &[u8],
        format: SourceFormat,
        plan: &CropPlan,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
