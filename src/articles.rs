//! Article store.
//!
//! Articles are markdown files in a flat directory. Each file starts with a
//! JSON header, followed by a delimiter line and the markdown body:
//!
//! ```text
//! {
//!   "slug": "hello-world",
//!   "title": "Hello World",
//!   "date": "2024-03-01",
//!   "description": "First post",
//!   "categories": "news,rust"
//! }
//! ::METAEND::
//! Body in **markdown**.
//! ```
//!
//! Files are listed by name in descending order, so a date prefix
//! (`2024-03-01-hello-world.md`) puts the newest article first.

use crate::error::{BlogError, Result};
use crate::markdown::{expand_shortcodes, render_markdown};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Line separating the JSON header from the markdown body.
pub const META_DELIMITER: &str = "::METAEND::";

/// Typed article header.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleMeta {
    pub slug: String,
    pub title: String,
    pub date: String,
    pub description: String,
    /// Comma-separated category names.
    pub categories: String,
    #[serde(default)]
    pub meta_title: Option<String>,
}

impl ArticleMeta {
    /// Parse and validate a JSON header. `origin` names the file in errors.
    pub fn parse(json: &str, origin: &str) -> Result<Self> {
        let meta: ArticleMeta = serde_json::from_str(json).map_err(|e| {
            BlogError::MalformedInput(format!("{origin}: invalid article header: {e}"))
        })?;
        for (field, value) in [
            ("slug", &meta.slug),
            ("title", &meta.title),
            ("date", &meta.date),
        ] {
            if value.trim().is_empty() {
                return Err(BlogError::MalformedInput(format!(
                    "{origin}: article header field '{field}' is empty"
                )));
            }
        }
        Ok(meta)
    }

    /// Title for the `<title>` element; falls back to the article title.
    pub fn meta_title(&self) -> &str {
        self.meta_title.as_deref().unwrap_or(&self.title)
    }

    /// Lower-cased, trimmed category names.
    pub fn category_list(&self) -> Vec<String> {
        self.categories
            .split(',')
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// The first four characters of the date.
    pub fn year(&self) -> &str {
        year_of(&self.date)
    }
}

/// A fully loaded article with its body rendered to HTML.
#[derive(Debug, Clone)]
pub struct Article {
    pub meta: ArticleMeta,
    pub content_html: String,
}

/// Articles published in one year, in listing order.
#[derive(Debug, Clone, PartialEq)]
pub struct YearGroup<T> {
    pub year: String,
    pub articles: Vec<T>,
}

/// Group items by the year of their date, keeping the order in which years
/// first appear.
pub fn group_by_year<T>(items: Vec<T>, date: impl Fn(&T) -> &str) -> Vec<YearGroup<T>> {
    let mut groups: Vec<YearGroup<T>> = Vec::new();
    for item in items {
        let year = year_of(date(&item)).to_string();
        match groups.iter_mut().find(|g| g.year == year) {
            Some(group) => group.articles.push(item),
            None => groups.push(YearGroup {
                year,
                articles: vec![item],
            }),
        }
    }
    groups
}

fn year_of(date: &str) -> &str {
    date.get(..4).unwrap_or(date)
}

/// Concatenated icons for the article's categories, in icon-map order.
pub fn category_icons(meta: &ArticleMeta, icons: &BTreeMap<String, String>) -> String {
    let categories = meta.category_list();
    icons
        .iter()
        .filter(|(name, _)| categories.iter().any(|c| c == &name.to_lowercase()))
        .map(|(_, icon)| icon.as_str())
        .collect()
}

/// Reads articles from disk. Nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct ArticleStore {
    articles_dir: PathBuf,
    public_dir: PathBuf,
}

impl ArticleStore {
    /// `public_dir` is where gallery shortcodes look for images.
    pub fn new(articles_dir: PathBuf, public_dir: PathBuf) -> Self {
        Self {
            articles_dir,
            public_dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.articles_dir
    }

    /// `*.md` file names, descending. A missing directory has no articles.
    pub fn filenames(&self) -> Result<Vec<String>> {
        if !self.articles_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.articles_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.articles_dir).to_path_buf();
                BlogError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort_by(|a, b| b.cmp(a));
        Ok(names)
    }

    /// Parse only the header of an article, stopping at the delimiter line.
    pub fn read_meta(&self, filename: &str) -> Result<ArticleMeta> {
        let path = self.articles_dir.join(filename);
        let file = fs::File::open(&path).map_err(|e| BlogError::io(&path, e))?;
        let mut header = String::new();
        let mut delimited = false;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| BlogError::io(&path, e))?;
            let line = line.trim();
            if line == META_DELIMITER {
                delimited = true;
                break;
            }
            header.push_str(line);
            header.push('\n');
        }
        if !delimited {
            return Err(missing_delimiter(filename));
        }
        ArticleMeta::parse(&header, filename)
    }

    /// Load an article: header, then body with shortcodes expanded and
    /// markdown rendered.
    pub fn read_article(&self, filename: &str) -> Result<Article> {
        let path = self.articles_dir.join(filename);
        let content = fs::read_to_string(&path).map_err(|e| BlogError::io(&path, e))?;
        let (header, body) = content
            .split_once(META_DELIMITER)
            .ok_or_else(|| missing_delimiter(filename))?;
        let meta = ArticleMeta::parse(header, filename)?;
        let body = expand_shortcodes(body, &self.public_dir);
        Ok(Article {
            meta,
            content_html: render_markdown(&body),
        })
    }

    /// First article (in listing order) whose slug matches.
    pub fn find_by_slug(&self, slug: &str) -> Result<Article> {
        for filename in self.filenames()? {
            if self.read_meta(&filename)?.slug == slug {
                return self.read_article(&filename);
            }
        }
        Err(BlogError::NotFound(format!("article '{slug}'")))
    }

    /// Headers of the newest `limit` articles (all when `None`).
    pub fn list_meta(&self, limit: Option<usize>) -> Result<Vec<ArticleMeta>> {
        self.limited(limit)?
            .iter()
            .map(|f| self.read_meta(f))
            .collect()
    }

    /// Full articles, newest first, up to `limit`.
    pub fn list_full(&self, limit: Option<usize>) -> Result<Vec<Article>> {
        self.limited(limit)?
            .iter()
            .map(|f| self.read_article(f))
            .collect()
    }

    fn limited(&self, limit: Option<usize>) -> Result<Vec<String>> {
        let mut names = self.filenames()?;
        if let Some(limit) = limit.filter(|l| *l > 0) {
            names.truncate(limit);
        }
        Ok(names)
    }
}

fn missing_delimiter(filename: &str) -> BlogError {
    BlogError::MalformedInput(format!(
        "{filename}: article metadata missing ({META_DELIMITER} not found)"
    ))
}
