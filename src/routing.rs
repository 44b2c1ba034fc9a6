//! Request routing.
//!
//! The route table is the ordered `[[pages]]` list from `config.toml`,
//! compiled once at startup into a [`PatternTable`]. Resolution is a linear
//! first-match scan:
//!
//! ```text
//! "/blog/hello-world"
//!   blog     ^/$              ✗
//!   feed     ^/blog/feed$     ✗
//!   article  ^/blog/(.+)$     ✓  → RouteMatch { page_id: "article", params: [slug = "hello-world"] }
//! ```
//!
//! Order is load-bearing: `/blog/feed` also matches the article pattern, and
//! only wins because `feed` comes first.
//!
//! Captured groups are mapped to named parameters by a fixed, per-page scheme
//! ([`ARTICLE`] → `slug`, [`IMAGE`] → `width`, `height`, `path`). Any other
//! page gets no parameters, whatever its pattern captured.
//!
//! The same table drives reverse routing: [`PatternTable::build_url`] fills
//! a page's `build_pattern` placeholders.

use crate::cache::ImageRequest;
use crate::config::{ConfigError, PageConfig};
use crate::error::{BlogError, Result};
use regex::Regex;

pub const BLOG: &str = "blog";
pub const FEED: &str = "feed";
pub const ARTICLE: &str = "article";
pub const IMAGE: &str = "image";

/// Page ids with a dedicated handler. Every other id is a custom page.
pub fn is_builtin_page(id: &str) -> bool {
    matches!(id, BLOG | FEED | ARTICLE | IMAGE)
}

/// PCRE modifiers that have an inline-flag equivalent in `regex`.
const DELIMITER_FLAGS: &str = "imsxU";

/// Compile a route pattern.
///
/// Accepts plain regexes (`^/blog/(.+)$`) and PHP-style delimited ones
/// (`/^\/blog\/(.+)$/`, optionally followed by `i`, `m`, `s`, `x`, `U`
/// modifiers, which become inline flags).
pub fn compile_pattern(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&strip_delimiters(pattern))
}

fn strip_delimiters(pattern: &str) -> String {
    if pattern.len() >= 2
        && pattern.starts_with('/')
        && let Some(end) = pattern.rfind('/')
        && end > 0
    {
        let flags = &pattern[end + 1..];
        if flags.chars().all(|c| DELIMITER_FLAGS.contains(c)) {
            let body = &pattern[1..end];
            return if flags.is_empty() {
                body.to_string()
            } else {
                format!("(?{flags}){body}")
            };
        }
    }
    pattern.to_string()
}

/// One compiled route.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub id: String,
    pub pattern: Regex,
    pub build_pattern: String,
}

/// Ordered, immutable route table.
#[derive(Debug, Clone)]
pub struct PatternTable {
    rules: Vec<RouteRule>,
}

impl PatternTable {
    pub fn from_config(pages: &[PageConfig]) -> std::result::Result<Self, ConfigError> {
        let rules = pages
            .iter()
            .map(|page| {
                let pattern =
                    compile_pattern(&page.parse_pattern).map_err(|source| ConfigError::Pattern {
                        id: page.id.clone(),
                        source,
                    })?;
                Ok(RouteRule {
                    id: page.id.clone(),
                    pattern,
                    build_pattern: page.build_pattern.clone(),
                })
            })
            .collect::<std::result::Result<Vec<_>, ConfigError>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Fill `:name` placeholders of a page's build pattern, in parameter order.
    ///
    /// Returns `None` for an unknown page id.
    pub fn build_url(&self, page_id: &str, params: &[(&str, &str)]) -> Option<String> {
        let rule = self.rules.iter().find(|r| r.id == page_id)?;
        let mut path = rule.build_pattern.clone();
        for (name, value) in params {
            path = path.replace(&format!(":{name}"), value);
        }
        Some(path)
    }
}

/// Prefix a site-relative path with scheme and host.
pub fn absolute_url(scheme: &str, host: &str, path: &str) -> String {
    format!("{scheme}://{host}/{}", path.trim_start_matches('/'))
}

/// Result of a successful resolve: which page, and its named parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub page_id: String,
    /// Named captures, in scheme order.
    pub params: Vec<(String, String)>,
}

impl RouteMatch {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parameter names assigned positionally to capture groups, per page.
fn param_scheme(page_id: &str) -> &'static [&'static str] {
    match page_id {
        ARTICLE => &["slug"],
        IMAGE => &["width", "height", "path"],
        _ => &[],
    }
}

/// First-match router over a [`PatternTable`].
#[derive(Debug, Clone)]
pub struct Router {
    table: PatternTable,
}

impl Router {
    pub fn new(table: PatternTable) -> Self {
        Self { table }
    }

    pub fn from_config(pages: &[PageConfig]) -> std::result::Result<Self, ConfigError> {
        PatternTable::from_config(pages).map(Self::new)
    }

    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    /// Find the first rule matching `path` and extract its parameters.
    pub fn resolve(&self, path: &str) -> Result<RouteMatch> {
        let (rule, captures) = self
            .table
            .rules
            .iter()
            .find_map(|rule| rule.pattern.captures(path).map(|caps| (rule, caps)))
            .ok_or_else(|| BlogError::NotFound(format!("no route for {path}")))?;

        let mut params = Vec::new();
        if captures.len() > 1 {
            for (index, name) in param_scheme(&rule.id).iter().enumerate() {
                let value = captures.get(index + 1).ok_or_else(|| {
                    BlogError::MalformedInput(format!(
                        "route '{}' did not capture '{name}' from {path}",
                        rule.id
                    ))
                })?;
                params.push((name.to_string(), value.as_str().to_string()));
            }
        }

        Ok(RouteMatch {
            page_id: rule.id.clone(),
            params,
        })
    }

    /// Resolve and convert into a typed [`Route`].
    pub fn route(&self, path: &str) -> Result<Route> {
        Route::from_match(self.resolve(path)?)
    }
}

/// Typed dispatch target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Blog,
    Feed,
    Article { slug: String },
    Image(ImageRequest),
    Custom { id: String },
}

impl Route {
    pub fn from_match(m: RouteMatch) -> Result<Route> {
        match m.page_id.as_str() {
            BLOG => Ok(Route::Blog),
            FEED => Ok(Route::Feed),
            ARTICLE => {
                let slug = m
                    .param("slug")
                    .ok_or_else(|| BlogError::NotFound("article slug missing".into()))?;
                Ok(Route::Article {
                    slug: slug.to_string(),
                })
            }
            IMAGE => {
                let (Some(width), Some(height), Some(path)) =
                    (m.param("width"), m.param("height"), m.param("path"))
                else {
                    return Err(BlogError::MalformedInput(
                        "image route needs width, height and path".into(),
                    ));
                };
                Ok(Route::Image(ImageRequest::new(
                    path,
                    parse_dimension("width", width)?,
                    parse_dimension("height", height)?,
                )?))
            }
            _ => Ok(Route::Custom { id: m.page_id }),
        }
    }
}

fn parse_dimension(name: &str, value: &str) -> Result<u32> {
    value.parse::<u32>().map_err(|_| {
        BlogError::MalformedInput(format!("{name} '{value}' is not a valid pixel count"))
    })
}
