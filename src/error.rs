//! Request-level error taxonomy.
//!
//! Every failure while serving a request ends up as a [`BlogError`]. At the
//! boundary ([`Blog::handle`](crate::blog::Blog::handle)) it is converted into
//! exactly one of two responses: 404 for [`BlogError::NotFound`], 500 for
//! everything else. Nothing is retried.

use crate::config::ConfigError;
use crate::imaging::BackendError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlogError {
    /// Unmatched route, missing article, missing source image.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Bad dimensions, missing metadata delimiter, invalid article header.
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Unsupported image type: {0}")]
    UnsupportedFormat(String),
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Image processing failed: {0}")]
    Image(BackendError),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Feed error: {0}")]
    Feed(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BlogError {
    /// Attach the path an I/O error happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        BlogError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// HTTP status class for this error: 404 or 500.
    pub fn status(&self) -> u16 {
        match self {
            BlogError::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// Short label for error pages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BlogError::NotFound(_) => "NotFound",
            BlogError::MalformedInput(_) => "MalformedInput",
            BlogError::UnsupportedFormat(_) => "UnsupportedFormat",
            BlogError::Io { .. } => "IOFailure",
            BlogError::Image(_) => "ImageFailure",
            BlogError::Template(_) => "TemplateFailure",
            BlogError::Feed(_) => "FeedFailure",
            BlogError::Config(_) => "ConfigFailure",
        }
    }
}

impl From<BackendError> for BlogError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unsupported(format) => BlogError::UnsupportedFormat(format),
            other => BlogError::Image(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, BlogError>;
