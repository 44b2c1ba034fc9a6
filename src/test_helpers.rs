//! Shared test utilities for the simple-blog test suite.
//!
//! Provides synthetic source images, article file writers, and a temp site
//! scaffold laid out like the default configuration expects.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let site = setup_site();
//! write_article(&site.path().join(ARTICLES_DIR), "2024-01-01-a.md", &meta, "Body");
//! std::fs::write(site.path().join("public/img/a.png"), png_bytes(64, 64, 255)).unwrap();
//! ```

use crate::articles::{ArticleMeta, META_DELIMITER};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const ARTICLES_DIR: &str = "resources/articles";
pub const PAGES_DIR: &str = "resources/pages";
pub const PUBLIC_DIR: &str = "public";
pub const THUMBS_DIR: &str = "storage/thumbs";

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Baseline JPEG with a colour gradient.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// RGBA PNG where every pixel has the given alpha.
pub fn png_bytes(width: u32, height: u32, alpha: u8) -> Vec<u8> {
    let base = gradient(width, height);
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let Rgb([r, g, b]) = *base.get_pixel(x, y);
        Rgba([r, g, b, alpha])
    });
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

/// Lossless RGBA WebP where every pixel has the given alpha.
pub fn webp_bytes(width: u32, height: u32, alpha: u8) -> Vec<u8> {
    let base = gradient(width, height);
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let Rgb([r, g, b]) = *base.get_pixel(x, y);
        Rgba([r, g, b, alpha])
    });
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

// =========================================================================
// Articles
// =========================================================================

/// Article file contents: pretty JSON header, delimiter line, body.
pub fn article_source(meta: &ArticleMeta, body: &str) -> String {
    let mut header = serde_json::json!({
        "slug": meta.slug,
        "title": meta.title,
        "date": meta.date,
        "description": meta.description,
        "categories": meta.categories,
    });
    if let Some(meta_title) = &meta.meta_title {
        header["metaTitle"] = serde_json::Value::String(meta_title.clone());
    }
    format!(
        "{}\n{META_DELIMITER}\n{body}\n",
        serde_json::to_string_pretty(&header).unwrap()
    )
}

pub fn write_article(dir: &Path, filename: &str, meta: &ArticleMeta, body: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(filename), article_source(meta, body)).unwrap();
}

/// Metadata with the given slug, title and date; no categories.
pub fn article_meta(slug: &str, title: &str, date: &str) -> ArticleMeta {
    ArticleMeta {
        slug: slug.to_string(),
        title: title.to_string(),
        date: date.to_string(),
        description: format!("About {title}"),
        categories: String::new(),
        meta_title: None,
    }
}

// =========================================================================
// Site scaffold
// =========================================================================

/// Temp site root with the default directory layout and an `about` page.
pub fn setup_site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    for dir in [ARTICLES_DIR, PAGES_DIR, THUMBS_DIR] {
        fs::create_dir_all(tmp.path().join(dir)).unwrap();
    }
    fs::create_dir_all(tmp.path().join(PUBLIC_DIR).join("img")).unwrap();
    fs::write(
        tmp.path().join(PAGES_DIR).join("about.md"),
        "# About\n\nA small blog.",
    )
    .unwrap();
    tmp
}

/// File names in the site's thumbnail cache, sorted.
pub fn thumbnail_files(site: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(site.join(THUMBS_DIR)) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
