//! Markdown rendering and article shortcodes.
//!
//! Shortcodes are expanded into HTML before the markdown pass; the markdown
//! renderer passes raw HTML blocks through untouched.
//!
//! ## Shortcodes
//!
//! - `[gallery folder="img/trip"]`: every `jpg`, `png` and `gif` directly
//!   inside `public/img/trip`, sorted by name, as a linked gallery.

use crate::views::{GalleryPartial, render_view};
use pulldown_cmark::{Options, Parser, html as md_html};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;
use walkdir::WalkDir;

static GALLERY_SHORTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\[gallery\sfolder="(.+?)"\]"#).expect("gallery shortcode pattern is valid")
});

const GALLERY_EXTENSIONS: &[&str] = &["jpg", "png", "gif"];

/// Convert markdown to HTML. Never fails.
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(source, options);
    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}

/// Replace shortcodes in article markdown with their HTML.
pub fn expand_shortcodes(content: &str, public_dir: &Path) -> String {
    GALLERY_SHORTCODE
        .replace_all(content, |caps: &Captures| gallery_html(&caps[1], public_dir))
        .into_owned()
}

fn gallery_html(folder: &str, public_dir: &Path) -> String {
    let folder = folder.trim_matches('/');
    let images = gallery_images(&public_dir.join(folder));
    if images.is_empty() {
        tracing::debug!(folder, "gallery shortcode found no images");
    }
    render_view(&GalleryPartial {
        base_path: format!("/{folder}/"),
        images,
    })
}

/// Image file names directly inside `dir`, sorted. Unreadable or missing
/// directories give an empty gallery.
fn gallery_images(dir: &Path) -> Vec<String> {
    let mut images: Vec<String> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| {
            Path::new(name)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| GALLERY_EXTENSIONS.contains(&e))
        })
        .collect();
    images.sort();
    images
}
