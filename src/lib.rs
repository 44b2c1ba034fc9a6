//! # Simple Blog
//!
//! A small markdown blog server. Articles are files, configuration is one
//! TOML file, and images are served as exact-size thumbnails rendered on
//! first request and cached on disk.
//!
//! # Architecture: One Request, One Pipeline
//!
//! Every request runs the same synchronous pipeline:
//!
//! ```text
//! path ─→ Router ─→ Route ─→ page handler ─→ Response
//!                              │
//!                              └─ image: ThumbnailCache ─→ ImageBackend (on miss)
//! ```
//!
//! Nothing is shared between requests except the immutable configuration
//! and route table, built once at startup. The only mutable state is the
//! thumbnail cache directory on disk.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` loading: stock defaults, overlay merge, validation, `gen-config` |
//! | [`routing`] | Ordered pattern table, first-match [`routing::Router`], reverse URL building |
//! | [`imaging`] | Crop geometry and the pure-Rust decode/resize/crop/encode backend |
//! | [`cache`] | On-disk thumbnail cache: naming, hit/miss, atomic writes |
//! | [`response`] | Transport-independent responses and image caching headers |
//! | [`articles`] | Article files: listing, typed headers, year grouping, category icons |
//! | [`markdown`] | Markdown rendering and the `[gallery]` shortcode |
//! | [`views`] | Maud views with two-phase layout rendering |
//! | [`feed`] | RSS 2.0 feed |
//! | [`blog`] | [`blog::Blog::handle`]: route → page → response, errors → 404/500 |
//! | [`server`] | `tiny_http` listener with a rayon worker pool |
//! | [`error`] | Request error taxonomy and its status mapping |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output for `check` |
//!
//! # Design Decisions
//!
//! ## First Match Wins
//!
//! Routes are tried in configuration order and the first match is taken.
//! `/blog/feed` matches both the feed and the article pattern; the feed is
//! listed first, so it wins. Reordering `[[pages]]` changes behaviour.
//!
//! ## The Filename Is the Cache
//!
//! A thumbnail is identified by `{stem}_{width}x{height}.{ext}` in one flat
//! directory. If the file exists it is served; nothing checks it against the
//! source. Deleting files from the cache directory is the only way to
//! invalidate. See [`cache`] for the collision caveat this implies.
//!
//! ## Two Error Pages
//!
//! Every failure becomes either a 404 (something does not exist) or a 500
//! (everything else). The 500 page shows the error kind and message,
//! including file paths for I/O errors. That is useful on a personal site
//! and an information leak anywhere else.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling) and
//! `jpeg-encoder` (progressive JPEG), both pure Rust. No ImageMagick, no GD,
//! no system libraries.

pub mod articles;
pub mod blog;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod imaging;
pub mod logging;
pub mod markdown;
pub mod output;
pub mod response;
pub mod routing;
pub mod server;
pub mod views;

#[cfg(test)]
pub(crate) mod test_helpers;
