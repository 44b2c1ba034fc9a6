//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the site root; every key is optional and falls back to the stock default.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! templates = "resources/pages"   # Markdown sources for custom pages
//! articles = "resources/articles" # Article files (*.md)
//! public = "public"               # Public files; image routes read sources from here
//! thumbs = "storage/thumbs"       # Generated thumbnails (flat directory)
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! https = false                   # Scheme used when building absolute URLs
//! # threads = 4                   # Worker threads (omit for auto = CPU cores)
//!
//! [images]
//! cache_lifetime = 7776000        # Seconds clients may cache thumbnails (90 days)
//! quality = 100                   # Thumbnail encoding quality (1-100)
//! max_dimension = 4096            # Largest thumbnail width or height served
//!
//! [category_icons]
//! # news = "&#128463;"
//!
//! [[pages]]
//! id = "blog"
//! parse_pattern = '^/$'
//! build_pattern = "/"
//! # ... one [[pages]] table per route, in match order
//! ```
//!
//! ## Route order
//!
//! `[[pages]]` is an ordered array and the router is first-match: the first
//! page whose `parse_pattern` matches wins. A catch-all custom page must come
//! after every specific page. Because arrays replace rather than merge, a
//! user file that declares `[[pages]]` must list the complete route table.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file inside the site root.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Invalid parse_pattern for page '{id}': {source}")]
    Pattern {
        id: String,
        #[source]
        source: regex::Error,
    },
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Filesystem locations, relative to the site root.
    pub paths: PathsConfig,
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Thumbnail caching and encoding settings.
    pub images: ImagesConfig,
    /// Lower-case category name → icon markup shown in the article list.
    pub category_icons: BTreeMap<String, String>,
    /// Ordered route table. First match wins.
    pub pages: Vec<PageConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            server: ServerConfig::default(),
            images: ImagesConfig::default(),
            category_icons: BTreeMap::new(),
            pages: default_pages(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "images.max_dimension must be greater than zero".into(),
            ));
        }
        if self.images.cache_lifetime == 0 {
            return Err(ConfigError::Validation(
                "images.cache_lifetime must be greater than zero".into(),
            ));
        }
        if self.pages.is_empty() {
            return Err(ConfigError::Validation("pages must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for page in &self.pages {
            if page.id.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "pages.id must not be empty".into(),
                ));
            }
            if !seen.insert(page.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate page id '{}'",
                    page.id
                )));
            }
            crate::routing::compile_pattern(&page.parse_pattern).map_err(|source| {
                ConfigError::Pattern {
                    id: page.id.clone(),
                    source,
                }
            })?;
            if !crate::routing::is_builtin_page(&page.id) && page.view.is_none() {
                return Err(ConfigError::Validation(format!(
                    "custom page '{}' must name a view",
                    page.id
                )));
            }
        }
        Ok(())
    }

    /// Look up a page by id.
    pub fn page(&self, id: &str) -> Option<&PageConfig> {
        self.pages.iter().find(|p| p.id == id)
    }
}

/// Filesystem locations. Relative paths are resolved against the site root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub templates: PathBuf,
    pub articles: PathBuf,
    pub public: PathBuf,
    pub thumbs: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            templates: PathBuf::from("resources/pages"),
            articles: PathBuf::from("resources/articles"),
            public: PathBuf::from("public"),
            thumbs: PathBuf::from("storage/thumbs"),
        }
    }
}

impl PathsConfig {
    /// Resolve every path against `root` (absolute paths are kept as-is).
    pub fn resolve(&self, root: &Path) -> PathsConfig {
        PathsConfig {
            templates: root.join(&self.templates),
            articles: root.join(&self.articles),
            public: root.join(&self.public),
            thumbs: root.join(&self.thumbs),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Scheme for absolute URLs (feed links): `https` when true.
    pub https: bool,
    /// Worker threads. When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            https: false,
            threads: None,
        }
    }
}

impl ServerConfig {
    pub fn scheme(&self) -> &'static str {
        if self.https { "https" } else { "http" }
    }
}

/// Resolve the effective worker thread count.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ServerConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .threads
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Thumbnail settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Seconds a client may cache a thumbnail (Cache-Control max-age, Expires).
    pub cache_lifetime: u64,
    /// Encoding quality for generated thumbnails (1 = worst, 100 = best).
    /// WebP thumbnails are always lossless and ignore it.
    pub quality: u32,
    /// Largest width or height a thumbnail may be requested at.
    pub max_dimension: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            cache_lifetime: 60 * 60 * 24 * 90,
            quality: 100,
            max_dimension: 4096,
        }
    }
}

/// One route: how to recognise it, how to build it, and page options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageConfig {
    pub id: String,
    /// Regex matched against the request path. `/…/` delimiters are optional.
    pub parse_pattern: String,
    /// URL template with `:name` placeholders, used for reverse routing.
    pub build_pattern: String,
    /// Custom pages: name of the markdown source under `paths.templates`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_robots: Option<String>,
    /// Feed page: RSS channel title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    /// Feed page: RSS channel description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_description: Option<String>,
    /// Feed page: number of newest articles included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_articles: Option<usize>,
}

impl PageConfig {
    /// A page with only the routing fields set.
    pub fn route(id: &str, parse_pattern: &str, build_pattern: &str) -> Self {
        Self {
            id: id.to_string(),
            parse_pattern: parse_pattern.to_string(),
            build_pattern: build_pattern.to_string(),
            view: None,
            meta_title: None,
            meta_description: None,
            meta_robots: None,
            channel_title: None,
            channel_description: None,
            max_articles: None,
        }
    }
}

fn default_pages() -> Vec<PageConfig> {
    vec![
        PageConfig {
            meta_title: Some("Blog".into()),
            meta_description: Some(String::new()),
            meta_robots: Some("index, follow".into()),
            ..PageConfig::route("blog", "^/$", "/")
        },
        PageConfig {
            channel_title: Some("RSS Feed".into()),
            channel_description: Some(String::new()),
            max_articles: Some(15),
            ..PageConfig::route("feed", "^/blog/feed$", "/blog/feed")
        },
        PageConfig::route("article", "^/blog/(.+)$", "/blog/:slug"),
        PageConfig::route(
            "image",
            "/image/([0-9]+)x([0-9]+)/(.+)",
            "/image/:widthx:height/:path",
        ),
        PageConfig {
            view: Some("about".into()),
            meta_title: Some("About".into()),
            meta_description: Some("About".into()),
            meta_robots: Some("noindex, follow".into()),
            ..PageConfig::route("about", "^/about$", "/about")
        },
    ]
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay (arrays included) replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from the site root as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given site root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Blog Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Paths (relative to the directory holding this file)
# ---------------------------------------------------------------------------
[paths]
# Markdown sources for custom pages ([[pages]] entries with a `view`).
templates = "resources/pages"

# Article files. Each is a JSON header, a `::METAEND::` line, then markdown.
articles = "resources/articles"

# Public folder. Image routes read their source images from here.
public = "public"

# Generated thumbnails. One flat directory, files named
# {name}_{width}x{height}.{ext}. Safe to delete at any time.
thumbs = "storage/thumbs"

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
host = "127.0.0.1"
port = 8080

# Build absolute URLs (feed links) with https:// instead of http://.
https = false

# Worker threads. Omit or comment out to auto-detect (= number of CPU cores).
# threads = 4

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[images]
# Seconds clients may cache a thumbnail (default: 90 days).
cache_lifetime = 7776000

# Encoding quality, 1-100. PNG maps this onto zlib levels 0-9.
# WebP thumbnails are always written lossless.
quality = 100

# Largest width or height a thumbnail can be requested at. Bigger requests
# are refused before any image is read.
max_dimension = 4096

# ---------------------------------------------------------------------------
# Category icons, keyed by lower-case category name.
# ---------------------------------------------------------------------------
[category_icons]
# news = "&#128463;"

# ---------------------------------------------------------------------------
# Pages / routes
# ---------------------------------------------------------------------------
# Evaluated top to bottom; the first parse_pattern that matches wins.
# Patterns are regular expressions; PHP-style /.../ delimiters are accepted.
# build_pattern placeholders (:name) are filled in when generating links.

[[pages]]
id = "blog"
parse_pattern = '^/$'
build_pattern = "/"
meta_title = "Blog"
meta_description = ""
meta_robots = "index, follow"

[[pages]]
id = "feed"
parse_pattern = '^/blog/feed$'
build_pattern = "/blog/feed"
channel_title = "RSS Feed"
channel_description = ""
max_articles = 15

[[pages]]
id = "article"
parse_pattern = '^/blog/(.+)$'
build_pattern = "/blog/:slug"

[[pages]]
id = "image"
parse_pattern = '/image/([0-9]+)x([0-9]+)/(.+)'
build_pattern = "/image/:widthx:height/:path"

# Custom pages: add your own below. `view` names a markdown file in
# paths.templates (here: resources/pages/about.md).
[[pages]]
id = "about"
parse_pattern = '^/about$'
build_pattern = "/about"
view = "about"
meta_title = "About"
meta_description = "About"
meta_robots = "noindex, follow"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_builtin_pages_in_order() {
        let config = SiteConfig::default();
        let ids: Vec<&str> = config.pages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["blog", "feed", "article", "image", "about"]);
    }

    #[test]
    fn default_config_has_image_settings() {
        let config = SiteConfig::default();
        assert_eq!(config.images.cache_lifetime, 7_776_000);
        assert_eq!(config.images.quality, 100);
        assert_eq!(config.images.max_dimension, 4096);
    }

    #[test]
    fn default_config_validates() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[server]
port = 9000
"##;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        // Defaults preserved
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.pages.len(), 5);
    }

    #[test]
    fn page_lookup_by_id() {
        let config = SiteConfig::default();
        assert_eq!(config.page("feed").unwrap().max_articles, Some(15));
        assert!(config.page("missing").is_none());
    }

    #[test]
    fn paths_resolve_against_root() {
        let paths = PathsConfig::default().resolve(Path::new("/srv/site"));
        assert_eq!(paths.thumbs, PathBuf::from("/srv/site/storage/thumbs"));

        let absolute = PathsConfig {
            public: PathBuf::from("/var/www"),
            ..PathsConfig::default()
        };
        assert_eq!(
            absolute.resolve(Path::new("/srv/site")).public,
            PathBuf::from("/var/www")
        );
    }

    #[test]
    fn scheme_follows_https_flag() {
        let mut server = ServerConfig::default();
        assert_eq!(server.scheme(), "http");
        server.https = true;
        assert_eq!(server.scheme(), "https");
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ServerConfig {
            threads: Some(1),
            ..ServerConfig::default()
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ServerConfig {
            threads: Some(100_000),
            ..ServerConfig::default()
        };
        assert_eq!(effective_threads(&config), cores);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_quality_out_of_range() {
        let mut config = SiteConfig::default();
        config.images.quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.images.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_max_dimension() {
        let mut config = SiteConfig::default();
        config.images.max_dimension = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("images.max_dimension"));
    }

    #[test]
    fn validate_duplicate_page_ids() {
        let mut config = SiteConfig::default();
        config.pages.push(PageConfig::route("blog", "^/again$", "/again"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate page id 'blog'"));
    }

    #[test]
    fn validate_bad_pattern() {
        let mut config = SiteConfig::default();
        config.pages[0].parse_pattern = "^/(unclosed$".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Pattern { ref id, .. }) if id == "blog"
        ));
    }

    #[test]
    fn validate_custom_page_needs_view() {
        let mut config = SiteConfig::default();
        config.pages.push(PageConfig::route("imprint", "^/imprint$", "/imprint"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("custom page 'imprint'"));
    }

    #[test]
    fn unknown_key_rejected() {
        let toml = r#"
[server]
prot = 80
"#;
        let result: Result<SiteConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_page_key_rejected() {
        let toml = r#"
[[pages]]
id = "blog"
parse_pattern = "^/$"
build_pattern = "/"
colour = "red"
"#;
        let result: Result<SiteConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[server]\nhost = \"a\"\nport = 1").unwrap();
        let overlay: toml::Value = toml::from_str("[server]\nport = 2").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["server"]["host"].as_str(), Some("a"));
        assert_eq!(merged["server"]["port"].as_integer(), Some(2));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base = stock_defaults_value();
        let overlay: toml::Value = toml::from_str(
            r#"
[[pages]]
id = "blog"
parse_pattern = "^/$"
build_pattern = "/"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["pages"].as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[images]
cache_lifetime = 60

[category_icons]
news = "N"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.images.cache_lifetime, 60);
        assert_eq!(config.images.quality, 100);
        assert_eq!(config.category_icons.get("news").map(String::as_str), Some("N"));
        assert_eq!(config.pages.len(), 5);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[server\nport = ").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[images]\ncache_lifetime = 0\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        assert!(load_raw_config(tmp.path()).unwrap().is_none());
    }

    // =========================================================================
    // stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_is_valid_toml() {
        let _: toml::Value = toml::from_str(stock_config_toml()).unwrap();
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let parsed: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, SiteConfig::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value();
        let table = value.as_table().unwrap();
        for key in ["paths", "server", "images", "category_icons", "pages"] {
            assert!(table.contains_key(key), "missing section {key}");
        }
    }
}
