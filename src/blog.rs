//! Page dispatcher.
//!
//! [`Blog::handle`] is the whole request pipeline:
//!
//! ```text
//! path → Router → Route ─┬─ Blog     → article listing (grouped by year)
//!                        ├─ Article  → single article
//!                        ├─ Feed     → RSS
//!                        ├─ Image    → ThumbnailCache → image response
//!                        └─ Custom   → markdown page from the templates dir
//! ```
//!
//! Any error on the way is turned into one of two pages: 404 for
//! [`BlogError::NotFound`], 500 for everything else. `handle` itself never
//! fails.
//!
//! A `Blog` holds no per-request state. It is built once at startup and
//! shared by reference across worker threads.

use crate::articles::{ArticleStore, category_icons, group_by_year};
use crate::cache::{ImageRequest, ThumbnailCache};
use crate::config::{PageConfig, SiteConfig};
use crate::error::{BlogError, Result};
use crate::feed::{self, FeedChannel, FeedItem};
use crate::imaging::{ImageBackend, Quality, RustBackend};
use crate::response::{Response, image_response};
use crate::routing::{self, Route, Router, absolute_url};
use crate::views::{
    ArticleView, BlogEntry, BlogView, CustomPageView, ErrorView, Layout, NotFoundView, PageMeta,
    render_view,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// The inbound fields a page needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// Request path without query string.
    pub path: String,
    /// Host (and port) the client addressed, used for absolute URLs.
    pub host: String,
}

impl RequestInfo {
    pub fn new(path: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            host: host.into(),
        }
    }
}

pub struct Blog<B: ImageBackend = RustBackend> {
    config: SiteConfig,
    router: Router,
    articles: ArticleStore,
    thumbnails: ThumbnailCache<B>,
    templates_dir: PathBuf,
    layout: Layout,
}

impl Blog<RustBackend> {
    /// Build a blog for a validated config. Relative paths resolve against
    /// `root`.
    pub fn new(config: SiteConfig, root: &Path) -> Result<Self> {
        Self::with_backend(config, root, RustBackend::new())
    }
}

impl<B: ImageBackend> Blog<B> {
    pub fn with_backend(config: SiteConfig, root: &Path, backend: B) -> Result<Self> {
        let paths = config.paths.resolve(root);
        if config.images.quality < 100 {
            tracing::warn!(
                quality = config.images.quality,
                "images.quality applies to JPEG and PNG only; WebP thumbnails are lossless"
            );
        }
        let router = Router::from_config(&config.pages)?;
        let layout = Layout {
            home_url: router
                .table()
                .build_url(routing::BLOG, &[])
                .unwrap_or_else(|| "/".to_string()),
            feed_url: router.table().build_url(routing::FEED, &[]),
        };
        let thumbnails = ThumbnailCache::new(
            paths.public.clone(),
            paths.thumbs,
            Quality::new(config.images.quality),
            backend,
        )
        .with_max_dimension(config.images.max_dimension);
        Ok(Self {
            articles: ArticleStore::new(paths.articles, paths.public),
            templates_dir: paths.templates,
            router,
            thumbnails,
            layout,
            config,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn articles(&self) -> &ArticleStore {
        &self.articles
    }

    pub fn thumbnails(&self) -> &ThumbnailCache<B> {
        &self.thumbnails
    }

    /// Directory holding custom page sources.
    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// Produce the response for a request. Never fails.
    pub fn handle(&self, request: &RequestInfo) -> Response {
        match self.dispatch(request) {
            Ok(response) => response,
            Err(err) => self.error_response(request, &err),
        }
    }

    fn dispatch(&self, request: &RequestInfo) -> Result<Response> {
        match self.router.route(&request.path)? {
            Route::Blog => self.blog_page(),
            Route::Article { slug } => self.article_page(&slug),
            Route::Feed => self.feed(request),
            Route::Image(image) => self.image(&image),
            Route::Custom { id } => self.custom_page(&id),
        }
    }

    fn page_config(&self, id: &str) -> Result<&PageConfig> {
        self.config
            .page(id)
            .ok_or_else(|| BlogError::NotFound(format!("page '{id}'")))
    }

    fn page_meta(&self, id: &str, default_title: &str) -> PageMeta {
        let page = self.config.page(id);
        PageMeta::new(
            page.and_then(|p| p.meta_title.clone())
                .unwrap_or_else(|| default_title.to_string()),
            page.and_then(|p| p.meta_description.clone())
                .unwrap_or_default(),
            page.and_then(|p| p.meta_robots.clone()).unwrap_or_default(),
        )
    }

    fn url(&self, page_id: &str, params: &[(&str, &str)]) -> String {
        self.router
            .table()
            .build_url(page_id, params)
            .unwrap_or_default()
    }

    fn blog_page(&self) -> Result<Response> {
        let entries: Vec<BlogEntry> = self
            .articles
            .list_meta(None)?
            .into_iter()
            .map(|meta| BlogEntry {
                url: self.url(routing::ARTICLE, &[("slug", meta.slug.as_str())]),
                icons: category_icons(&meta, &self.config.category_icons),
                title: meta.title,
                date: meta.date,
                description: meta.description,
            })
            .collect();
        let years = group_by_year(entries, |e: &BlogEntry| e.date.as_str());
        let view = BlogView {
            meta: self.page_meta(routing::BLOG, "Blog"),
            layout: self.layout.clone(),
            years,
        };
        Ok(Response::html(200, render_view(&view)))
    }

    fn article_page(&self, slug: &str) -> Result<Response> {
        let article = self.articles.find_by_slug(slug)?;
        let view = ArticleView {
            meta: PageMeta::new(
                article.meta.meta_title(),
                article.meta.description.clone(),
                "index, follow",
            ),
            layout: self.layout.clone(),
            icons: category_icons(&article.meta, &self.config.category_icons),
            title: article.meta.title,
            date: article.meta.date,
            content_html: article.content_html,
        };
        Ok(Response::html(200, render_view(&view)))
    }

    fn feed(&self, request: &RequestInfo) -> Result<Response> {
        let page = self.page_config(routing::FEED)?;
        let scheme = self.config.server.scheme();
        let channel = FeedChannel {
            title: page
                .channel_title
                .clone()
                .unwrap_or_else(|| "RSS Feed".to_string()),
            description: page.channel_description.clone().unwrap_or_default(),
            link: absolute_url(scheme, &request.host, &self.url(routing::FEED, &[])),
        };
        let items: Vec<FeedItem> = self
            .articles
            .list_full(page.max_articles)?
            .into_iter()
            .map(|article| FeedItem {
                link: absolute_url(
                    scheme,
                    &request.host,
                    &self.url(routing::ARTICLE, &[("slug", article.meta.slug.as_str())]),
                ),
                title: article.meta.title,
                description_html: article.content_html,
                date: article.meta.date,
            })
            .collect();
        let xml = feed::render_feed(&channel, &items)?;
        Ok(Response::build(
            None,
            xml.into_bytes(),
            vec![("Content-Type".to_string(), feed::CONTENT_TYPE.to_string())],
        ))
    }

    fn image(&self, request: &ImageRequest) -> Result<Response> {
        let artifact = self.thumbnails.get_or_create(request)?;
        Ok(image_response(
            &artifact,
            Duration::from_secs(self.config.images.cache_lifetime),
            SystemTime::now(),
        ))
    }

    fn custom_page(&self, id: &str) -> Result<Response> {
        let page = self.page_config(id)?;
        let view_name = page
            .view
            .as_deref()
            .ok_or_else(|| BlogError::Template(format!("page '{id}' has no view")))?;
        let view = CustomPageView::load(
            &self.templates_dir,
            view_name,
            self.page_meta(id, id),
            self.layout.clone(),
        )?;
        Ok(Response::html(200, render_view(&view)))
    }

    fn error_response(&self, request: &RequestInfo, err: &BlogError) -> Response {
        if err.status() == 404 {
            tracing::debug!(path = %request.path, "{err}");
            let view = NotFoundView {
                layout: self.layout.clone(),
            };
            return Response::html(404, render_view(&view));
        }

        tracing::error!(path = %request.path, kind = err.kind(), "{err}");
        let view = ErrorView {
            layout: self.layout.clone(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        };
        Response::html(500, render_view(&view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageConfig;
    use crate::imaging::SourceFormat;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn mock_blog(site: &TempDir, config: SiteConfig) -> Blog<MockBackend> {
        Blog::with_backend(
            config,
            site.path(),
            MockBackend::new(SourceFormat::Png, 4000, 2000),
        )
        .unwrap()
    }

    fn get(blog: &Blog<MockBackend>, path: &str) -> Response {
        blog.handle(&RequestInfo::new(path, "example.com"))
    }

    fn body(response: &Response) -> String {
        String::from_utf8(response.body.clone()).unwrap()
    }

    fn site_with_articles() -> TempDir {
        let site = setup_site();
        let dir = site.path().join(ARTICLES_DIR);
        let mut hello = article_meta("hello-world", "Hello World", "2024-03-01");
        hello.categories = "news".into();
        hello.meta_title = Some("Hello | Blog".into());
        write_article(&dir, "2024-03-01-hello.md", &hello, "Hello *there*.");
        write_article(
            &dir,
            "2023-07-15-older.md",
            &article_meta("older", "Older Post", "2023-07-15"),
            "Old news.",
        );
        site
    }

    // =========================================================================
    // Pages
    // =========================================================================

    #[test]
    fn blog_lists_articles_grouped_by_year() {
        let site = site_with_articles();
        let mut config = SiteConfig::default();
        config.category_icons = BTreeMap::from([("news".into(), "&#128463;".into())]);
        let blog = mock_blog(&site, config);

        let r = get(&blog, "/");
        assert_eq!(r.status_code, 200);
        assert_eq!(r.header("Content-Type"), Some(crate::response::HTML));
        let html = body(&r);
        assert!(html.contains("<title>Blog</title>"));
        assert!(html.contains(r#"href="/blog/hello-world""#));
        assert!(html.contains("&#128463;"));
        assert!(html.find("2024").unwrap() < html.find("2023").unwrap());
    }

    #[test]
    fn article_page_renders_markdown_and_meta() {
        let site = site_with_articles();
        let blog = mock_blog(&site, SiteConfig::default());

        let r = get(&blog, "/blog/hello-world");
        assert_eq!(r.status_code, 200);
        let html = body(&r);
        assert!(html.contains("<title>Hello | Blog</title>"));
        assert!(html.contains("<em>there</em>"));
        assert!(html.contains(r#"content="About Hello World""#));
    }

    #[test]
    fn unknown_article_is_404() {
        let site = site_with_articles();
        let blog = mock_blog(&site, SiteConfig::default());

        let r = get(&blog, "/blog/nope");
        assert_eq!(r.status_code, 404);
        assert_eq!(r.status_message, "Not Found");
        assert!(body(&r).contains("<title>Not found</title>"));
    }

    #[test]
    fn unmatched_path_is_404() {
        let site = setup_site();
        let blog = mock_blog(&site, SiteConfig::default());
        assert_eq!(get(&blog, "/nothing/here").status_code, 404);
    }

    #[test]
    fn feed_uses_absolute_urls_and_limit() {
        let site = site_with_articles();
        let mut config = SiteConfig::default();
        for page in &mut config.pages {
            if page.id == routing::FEED {
                page.max_articles = Some(1);
                page.channel_title = Some("My Feed".into());
            }
        }
        let blog = mock_blog(&site, config);

        let r = get(&blog, "/blog/feed");
        assert_eq!(r.status_code, 200);
        assert_eq!(r.header("Content-Type"), Some("text/xml"));
        let xml = body(&r);
        assert!(xml.contains("<title>My Feed</title>"));
        assert!(xml.contains("http://example.com/blog/feed"));
        assert!(xml.contains("http://example.com/blog/hello-world"));
        assert!(!xml.contains("/blog/older"));
    }

    #[test]
    fn custom_page_renders_view_file() {
        let site = setup_site();
        let blog = mock_blog(&site, SiteConfig::default());

        let r = get(&blog, "/about");
        assert_eq!(r.status_code, 200);
        let html = body(&r);
        assert!(html.contains("<title>About</title>"));
        assert!(html.contains(r#"content="noindex, follow""#));
        assert!(html.contains("A small blog."));
    }

    #[test]
    fn custom_page_with_missing_view_is_500() {
        let site = setup_site();
        fs::remove_file(site.path().join(PAGES_DIR).join("about.md")).unwrap();
        let blog = mock_blog(&site, SiteConfig::default());

        let r = get(&blog, "/about");
        assert_eq!(r.status_code, 500);
        let html = body(&r);
        assert!(html.contains("<title>Error 500</title>"));
        assert!(html.contains("TemplateFailure"));
    }

    #[test]
    fn broken_article_header_is_500() {
        let site = setup_site();
        fs::write(
            site.path().join(ARTICLES_DIR).join("bad.md"),
            "{ \"slug\": \"x\" }\nno delimiter here",
        )
        .unwrap();
        let blog = mock_blog(&site, SiteConfig::default());

        let r = get(&blog, "/");
        assert_eq!(r.status_code, 500);
        assert!(body(&r).contains("MalformedInput"));
    }

    // =========================================================================
    // Images
    // =========================================================================

    #[test]
    fn image_route_renders_then_hits_cache() {
        let site = setup_site();
        fs::write(site.path().join("public/img/wide.png"), b"source").unwrap();
        let blog = mock_blog(&site, SiteConfig::default());

        let first = get(&blog, "/image/300x300/img/wide.png");
        let second = get(&blog, "/image/300x300/img/wide.png");

        assert_eq!(first.status_code, 200);
        assert_eq!(first.body, b"png:300x300");
        assert_eq!(first.body, second.body);
        assert_eq!(first.header("Content-Type"), Some("image/png"));
        assert_eq!(first.header("Cache-Control"), Some("public, max-age=7776000"));
        assert!(first.header("ETag").is_some());
        assert_eq!(blog.thumbnails().backend().render_count(), 1);
        assert_eq!(thumbnail_files(site.path()), vec!["wide_300x300.png"]);
    }

    #[test]
    fn zero_width_is_rejected_before_any_io() {
        let site = setup_site();
        fs::write(site.path().join("public/img/wide.png"), b"source").unwrap();
        let blog = mock_blog(&site, SiteConfig::default());

        let r = get(&blog, "/image/0x100/img/wide.png");
        assert_eq!(r.status_code, 500);
        assert!(body(&r).contains("MalformedInput"));
        assert!(blog.thumbnails().backend().get_operations().is_empty());
        assert!(thumbnail_files(site.path()).is_empty());
    }

    #[test]
    fn oversized_thumbnail_is_500_without_rendering() {
        let site = setup_site();
        fs::write(site.path().join("public/img/a.png"), png_bytes(4, 4, 255)).unwrap();
        let blog = mock_blog(&site, SiteConfig::default());

        let r = get(&blog, "/image/60000x60000/img/a.png");
        assert_eq!(r.status_code, 500);
        assert!(body(&r).contains("MalformedInput"));
        assert!(blog.thumbnails().backend().get_operations().is_empty());
        assert!(thumbnail_files(site.path()).is_empty());
    }

    #[test]
    fn max_dimension_comes_from_config() {
        let site = setup_site();
        fs::write(site.path().join("public/img/a.png"), b"source").unwrap();
        let mut config = SiteConfig::default();
        config.images.max_dimension = 100;
        let blog = mock_blog(&site, config);

        assert_eq!(get(&blog, "/image/100x100/img/a.png").status_code, 200);
        assert_eq!(get(&blog, "/image/101x100/img/a.png").status_code, 500);
        assert_eq!(thumbnail_files(site.path()), vec!["a_100x100.png"]);
    }

    #[test]
    fn missing_source_image_is_404() {
        let site = setup_site();
        let blog = mock_blog(&site, SiteConfig::default());

        let r = get(&blog, "/image/10x10/img/missing.png");
        assert_eq!(r.status_code, 404);
        assert!(blog.thumbnails().backend().get_operations().is_empty());
    }

    #[test]
    fn image_quality_comes_from_config() {
        let site = setup_site();
        fs::write(site.path().join("public/img/a.png"), b"source").unwrap();
        let mut config = SiteConfig::default();
        config.images.quality = 40;
        let blog = mock_blog(&site, config);

        get(&blog, "/image/10x10/img/a.png");
        let ops = blog.thumbnails().backend().get_operations();
        assert!(matches!(
            ops.last(),
            Some(crate::imaging::backend::tests::RecordedOp::Render { quality: 40, .. })
        ));
    }

    // =========================================================================
    // Routing order
    // =========================================================================

    #[test]
    fn first_matching_page_wins() {
        let site = setup_site();
        fs::write(site.path().join(PAGES_DIR).join("feed-page.md"), "custom").unwrap();
        let mut custom = PageConfig::route("shadow", "^/blog/feed$", "/blog/feed");
        custom.view = Some("feed-page".into());
        let mut config = SiteConfig::default();
        config.pages.insert(0, custom);
        let blog = mock_blog(&site, config);

        let r = get(&blog, "/blog/feed");
        assert_eq!(r.header("Content-Type"), Some(crate::response::HTML));
        assert!(body(&r).contains("custom"));
    }
}
