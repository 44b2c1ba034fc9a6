//! HTML views.
//!
//! Each page is a typed view model implementing [`View`]. Rendering happens
//! in two phases:
//!
//! 1. The view renders its own body.
//! 2. If the view declares a [`Layout`], the layout is rendered with that
//!    body bound as its content, plus the page's [`PageMeta`].
//!
//! Partials (the gallery) declare no layout and render as bare fragments.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating,
//! so every interpolated string is escaped unless wrapped in `PreEscaped`.
//! Only rendered markdown and configured category icons are inserted
//! unescaped.

use crate::articles::YearGroup;
use crate::error::{BlogError, Result};
use crate::markdown::render_markdown;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::Path;

const CSS: &str = include_str!("../static/style.css");

/// Values for the document head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub robots: String,
}

impl PageMeta {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        robots: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            robots: robots.into(),
        }
    }
}

/// The site-wide page frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub home_url: String,
    pub feed_url: Option<String>,
}

impl Layout {
    fn render(&self, meta: &PageMeta, content: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    title { (meta.title) }
                    meta name="description" content=(meta.description);
                    meta name="robots" content=(meta.robots);
                    @if let Some(feed) = &self.feed_url {
                        link rel="alternate" type="application/rss+xml" title="RSS" href=(feed);
                    }
                    style { (PreEscaped(CSS)) }
                }
                body {
                    header.site-header {
                        a.home href=(self.home_url) { "Blog" }
                        @if let Some(feed) = &self.feed_url {
                            a.feed href=(feed) { "RSS" }
                        }
                    }
                    main {
                        (content)
                    }
                }
            }
        }
    }
}

/// A renderable page or fragment.
pub trait View {
    fn meta(&self) -> PageMeta;

    /// The layout this view extends, if any.
    fn layout(&self) -> Option<&Layout>;

    fn body(&self) -> Markup;
}

/// Render a view, wrapping it in its layout when it declares one.
pub fn render_view(view: &impl View) -> String {
    let content = view.body();
    match view.layout() {
        Some(layout) => layout.render(&view.meta(), content).into_string(),
        None => content.into_string(),
    }
}

// ============================================================================
// Article listing
// ============================================================================

/// One row of the article listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogEntry {
    pub title: String,
    pub date: String,
    pub description: String,
    pub url: String,
    /// Pre-rendered icon HTML (entities) for the article's categories.
    pub icons: String,
}

pub struct BlogView {
    pub meta: PageMeta,
    pub layout: Layout,
    pub years: Vec<YearGroup<BlogEntry>>,
}

impl View for BlogView {
    fn meta(&self) -> PageMeta {
        self.meta.clone()
    }

    fn layout(&self) -> Option<&Layout> {
        Some(&self.layout)
    }

    fn body(&self) -> Markup {
        html! {
            @if self.years.is_empty() {
                p.empty { "No articles yet." }
            }
            @for group in &self.years {
                h2.year { (group.year) }
                ul.article-list {
                    @for entry in &group.articles {
                        li {
                            span.date { (entry.date) }
                            a href=(entry.url) { (entry.title) }
                            @if !entry.icons.is_empty() {
                                span.icons { (PreEscaped(&entry.icons)) }
                            }
                            @if !entry.description.is_empty() {
                                p.description { (entry.description) }
                            }
                        }
                    }
                }
            }
        }
    }
}

// ============================================================================
// Single article
// ============================================================================

pub struct ArticleView {
    pub meta: PageMeta,
    pub layout: Layout,
    pub title: String,
    pub date: String,
    pub icons: String,
    pub content_html: String,
}

impl View for ArticleView {
    fn meta(&self) -> PageMeta {
        self.meta.clone()
    }

    fn layout(&self) -> Option<&Layout> {
        Some(&self.layout)
    }

    fn body(&self) -> Markup {
        html! {
            article {
                header {
                    h1 {
                        (self.title)
                        @if !self.icons.is_empty() {
                            span.icons { (PreEscaped(&self.icons)) }
                        }
                    }
                    p.date { (self.date) }
                }
                (PreEscaped(&self.content_html))
            }
        }
    }
}

// ============================================================================
// Custom pages
// ============================================================================

/// A static page whose content is a markdown file in the templates
/// directory, named after the page's `view`.
pub struct CustomPageView {
    pub meta: PageMeta,
    pub layout: Layout,
    pub content_html: String,
}

impl CustomPageView {
    /// Load `{templates_dir}/{view}.md`. A missing or unreadable file is a
    /// template error.
    pub fn load(templates_dir: &Path, view: &str, meta: PageMeta, layout: Layout) -> Result<Self> {
        let path = templates_dir.join(format!("{view}.md"));
        let source = fs::read_to_string(&path).map_err(|e| {
            BlogError::Template(format!("view '{view}' ({}): {e}", path.display()))
        })?;
        Ok(Self {
            meta,
            layout,
            content_html: render_markdown(&source),
        })
    }
}

impl View for CustomPageView {
    fn meta(&self) -> PageMeta {
        self.meta.clone()
    }

    fn layout(&self) -> Option<&Layout> {
        Some(&self.layout)
    }

    fn body(&self) -> Markup {
        html! {
            article.page {
                (PreEscaped(&self.content_html))
            }
        }
    }
}

// ============================================================================
// Error pages
// ============================================================================

pub struct NotFoundView {
    pub layout: Layout,
}

impl View for NotFoundView {
    fn meta(&self) -> PageMeta {
        PageMeta::new("Not found", "Page not found", "noindex, follow")
    }

    fn layout(&self) -> Option<&Layout> {
        Some(&self.layout)
    }

    fn body(&self) -> Markup {
        html! {
            h1 { "Page not found" }
            p {
                "The page you requested does not exist. "
                a href=(self.layout.home_url) { "Back to the blog" }
                "."
            }
        }
    }
}

/// Internal error page. Shows the error kind and message, which for I/O
/// failures includes the file path.
pub struct ErrorView {
    pub layout: Layout,
    pub kind: String,
    pub message: String,
}

impl View for ErrorView {
    fn meta(&self) -> PageMeta {
        PageMeta::new("Error 500", "Internal Server Error", "noindex, follow")
    }

    fn layout(&self) -> Option<&Layout> {
        Some(&self.layout)
    }

    fn body(&self) -> Markup {
        html! {
            h1 { "Internal Server Error" }
            pre.error-detail {
                strong { (self.kind) } ": " (self.message)
            }
        }
    }
}

// ============================================================================
// Partials
// ============================================================================

/// Image gallery produced by the `[gallery]` shortcode.
pub struct GalleryPartial {
    /// URL prefix of the folder, with leading and trailing slash.
    pub base_path: String,
    pub images: Vec<String>,
}

impl View for GalleryPartial {
    fn meta(&self) -> PageMeta {
        PageMeta::new("", "", "")
    }

    fn layout(&self) -> Option<&Layout> {
        None
    }

    fn body(&self) -> Markup {
        html! {
            div.gallery {
                @for image in &self.images {
                    @let url = format!("{}{}", self.base_path, image);
                    a href=(url) {
                        img src=(url) alt=(image) loading="lazy";
                    }
                }
            }
        }
    }
}
