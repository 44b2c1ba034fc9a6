//! Thumbnail image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::guess_format` + header-only dimension read |
//! | **Plan** | [`plan`]: intermediate size and centered crop box |
//! | **Render** | Lanczos3 resample + exact crop + re-encode in the source format |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop geometry (unit testable)
//! - **Parameters**: Quality, format matrix, dimensions
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{CropPlan, plan};
pub use params::{Dimensions, Quality, SourceFormat};
pub use rust_backend::RustBackend;
