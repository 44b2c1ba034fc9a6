//! On-demand thumbnail cache.
//!
//! Image routes (`/image/{w}x{h}/{path}`) are served from a flat cache
//! directory. The first request for a given source and size renders the
//! thumbnail; every later request reads the file back.
//!
//! # Design
//!
//! ## Naming
//!
//! A thumbnail's identity is its filename:
//!
//! ```text
//! public/img/2024/cat.jpg  @ 300x200  →  thumbs/cat_300x200.jpg
//! ```
//!
//! `{source stem}_{width}x{height}.{source extension}`, in a single flat
//! directory. Two sources that share a file name in different directories
//! map to the same thumbnail. That is a known limitation of the scheme; the
//! first one rendered is served for both until the file is removed.
//!
//! ## Hits and misses
//!
//! The existence of the file is the only cache signal. Entries are never
//! validated against the current source and never evicted here; delete
//! files from the cache directory to force a re-render.
//!
//! ## Size limits
//!
//! Requests wider or taller than the configured maximum are refused before
//! the source is read. A request within the limit can still need a huge
//! intermediate image (a 1x10000 strip cropped to a square), so the
//! resample canvas is bounded too: at most four times the pixel count of a
//! maximum-size thumbnail.
//!
//! ## Concurrency
//!
//! Two requests that miss on the same thumbnail at the same time both
//! render it. Rendering is deterministic, so both produce identical bytes.
//! Each write goes to a temporary file inside the cache directory and is
//! renamed into place, so a reader never sees a half-written thumbnail and
//! the last rename wins.

use crate::error::{BlogError, Result};
use crate::imaging::{ImageBackend, Quality, RustBackend, SourceFormat, plan};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Default for [`ThumbnailCache::with_max_dimension`].
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

/// A validated request for one thumbnail.
///
/// Dimensions are positive by construction; zero is rejected before any
/// file is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    source_path: String,
    width: u32,
    height: u32,
}

impl ImageRequest {
    pub fn new(source_path: &str, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BlogError::MalformedInput(format!(
                "thumbnail size must be positive, got {width}x{height}"
            )));
        }
        Ok(Self {
            source_path: source_path.to_string(),
            width,
            height,
        })
    }

    /// Source path relative to the public directory.
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// A thumbnail on disk and its contents.
#[derive(Debug, Clone)]
pub struct ThumbnailArtifact {
    pub cache_path: PathBuf,
    pub bytes: Vec<u8>,
    pub format: SourceFormat,
    pub last_modified: SystemTime,
}

impl ThumbnailArtifact {
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }
}

/// Cache filename for a source image at a given size.
///
/// `img/cat.JPG` at 300x200 → `cat_300x200.JPG`.
pub fn thumbnail_filename(source: &Path, width: u32, height: u32) -> Result<String> {
    let stem = source.file_stem().and_then(|s| s.to_str());
    let ext = source.extension().and_then(|e| e.to_str());
    match (stem, ext) {
        (Some(stem), Some(ext)) => Ok(format!("{stem}_{width}x{height}.{ext}")),
        _ => Err(BlogError::MalformedInput(format!(
            "image path '{}' needs a file name and extension",
            source.display()
        ))),
    }
}

/// Resolve a request path inside `root`, refusing anything that could
/// escape it (`..`, absolute paths, drive prefixes).
fn contained_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (resolved != root).then_some(resolved)
}

/// Maps (source, width, height) to a cached thumbnail, rendering on miss.
pub struct ThumbnailCache<B: ImageBackend = RustBackend> {
    public_dir: PathBuf,
    cache_dir: PathBuf,
    quality: Quality,
    max_dimension: u32,
    backend: B,
}

impl<B: ImageBackend> ThumbnailCache<B> {
    pub fn new(public_dir: PathBuf, cache_dir: PathBuf, quality: Quality, backend: B) -> Self {
        Self {
            public_dir,
            cache_dir,
            quality,
            max_dimension: DEFAULT_MAX_DIMENSION,
            backend,
        }
    }

    /// Refuse thumbnails wider or taller than `max_dimension` pixels.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Return the thumbnail for `request`, rendering and storing it first
    /// if it is not cached yet.
    pub fn get_or_create(&self, request: &ImageRequest) -> Result<ThumbnailArtifact> {
        if request.width() > self.max_dimension || request.height() > self.max_dimension {
            return Err(BlogError::MalformedInput(format!(
                "thumbnail size {}x{} exceeds the {} pixel limit",
                request.width(),
                request.height(),
                self.max_dimension
            )));
        }

        let source = contained_path(&self.public_dir, request.source_path())
            .ok_or_else(|| BlogError::NotFound(format!("image {}", request.source_path())))?;
        if !source.is_file() {
            return Err(BlogError::NotFound(format!(
                "image {}",
                request.source_path()
            )));
        }

        let filename = thumbnail_filename(&source, request.width(), request.height())?;
        let cache_path = self.cache_dir.join(filename);

        if cache_path.is_file() {
            tracing::debug!(path = %cache_path.display(), "thumbnail cache hit");
            return load_artifact(&cache_path);
        }

        tracing::info!(
            source = %source.display(),
            width = request.width(),
            height = request.height(),
            "thumbnail cache miss, rendering"
        );

        let source_bytes = fs::read(&source).map_err(|e| BlogError::io(&source, e))?;
        let (format, dims) = self.backend.identify(&source_bytes)?;
        let crop = plan(
            (dims.width, dims.height),
            (request.width(), request.height()),
        );
        let canvas = crop.intermediate_width as u64 * crop.intermediate_height as u64;
        if canvas > self.max_canvas_pixels() {
            return Err(BlogError::MalformedInput(format!(
                "{}x{} from a {}x{} source needs a {}x{} intermediate image",
                request.width(),
                request.height(),
                dims.width,
                dims.height,
                crop.intermediate_width,
                crop.intermediate_height
            )));
        }
        let bytes = self
            .backend
            .render(&source_bytes, format, &crop, self.quality)?;

        self.write_atomic(&cache_path, &bytes)?;
        let last_modified = modified_time(&cache_path)?;

        Ok(ThumbnailArtifact {
            cache_path,
            bytes,
            format,
            last_modified,
        })
    }

    fn max_canvas_pixels(&self) -> u64 {
        4 * self.max_dimension as u64 * self.max_dimension as u64
    }

    /// Write to a temp file in the cache directory, then rename into place.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| BlogError::io(&self.cache_dir, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.cache_dir)
            .map_err(|e| BlogError::io(&self.cache_dir, e))?;
        tmp.write_all(bytes).map_err(|e| BlogError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| BlogError::io(path, e.error))?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "thumbnail written");
        Ok(())
    }
}

fn modified_time(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| BlogError::io(path, e))
}

/// Read a cached thumbnail back. The format is sniffed from the content,
/// falling back to the file extension.
fn load_artifact(path: &Path) -> Result<ThumbnailArtifact> {
    let bytes = fs::read(path).map_err(|e| BlogError::io(path, e))?;
    let format = SourceFormat::sniff(&bytes)
        .or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(SourceFormat::from_extension)
        })
        .ok_or_else(|| BlogError::UnsupportedFormat(path.display().to_string()))?;
    Ok(ThumbnailArtifact {
        cache_path: path.to_path_buf(),
        last_modified: modified_time(path)?,
        bytes,
        format,
    })
}
