//! CLI output formatting for `check`.
//!
//! # Output Format
//!
//! ```text
//! Routes
//! 001 blog     ^/$                            → /
//! 002 feed     ^/blog/feed$                   → /blog/feed
//! 003 article  ^/blog/(.+)$                   → /blog/:slug
//!
//! Pages
//! 001 about → about.md
//! 002 contact → contact.md (missing)
//!
//! Articles
//! 001 Hello World (2024-03-01)
//!     Source: 2024-03-01-hello.md
//!     Slug: hello-world
//!     Categories: news, rust
//! 002 (broken.md)
//!     Error: Malformed input: broken.md: article metadata missing (::METAEND:: not found)
//!
//! 2 articles, 1 error
//! ```
//!
//! # Architecture
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability and [`print_check_output`] writes them to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::articles::ArticleMeta;
use crate::error::BlogError;
use crate::routing::RouteRule;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// A custom page and whether its markdown source exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStatus {
    pub id: String,
    pub view_file: String,
    pub exists: bool,
}

/// Header-parse outcome for one article file.
#[derive(Debug)]
pub struct ArticleStatus {
    pub filename: String,
    pub meta: Result<ArticleMeta, BlogError>,
}

/// Route table in first-match order, columns aligned.
pub fn format_routes(rules: &[RouteRule]) -> Vec<String> {
    let id_width = rules.iter().map(|r| r.id.len()).max().unwrap_or(0);
    let pattern_width = rules
        .iter()
        .map(|r| r.pattern.as_str().len())
        .max()
        .unwrap_or(0);

    let mut lines = vec!["Routes".to_string()];
    for (i, rule) in rules.iter().enumerate() {
        lines.push(format!(
            "{} {:<id_width$}  {:<pattern_width$}  → {}",
            format_index(i + 1),
            rule.id,
            rule.pattern.as_str(),
            rule.build_pattern,
        ));
    }
    lines
}

pub fn format_pages(pages: &[PageStatus]) -> Vec<String> {
    if pages.is_empty() {
        return Vec::new();
    }
    let mut lines = vec!["Pages".to_string()];
    for (i, page) in pages.iter().enumerate() {
        let missing = if page.exists { "" } else { " (missing)" };
        lines.push(format!(
            "{} {} → {}{missing}",
            format_index(i + 1),
            page.id,
            page.view_file
        ));
    }
    lines
}

pub fn format_articles(articles: &[ArticleStatus]) -> Vec<String> {
    let mut lines = vec!["Articles".to_string()];
    for (i, article) in articles.iter().enumerate() {
        let index = format_index(i + 1);
        match &article.meta {
            Ok(meta) => {
                lines.push(format!("{index} {} ({})", meta.title, meta.date));
                lines.push(format!("{}Source: {}", indent(1), article.filename));
                lines.push(format!("{}Slug: {}", indent(1), meta.slug));
                let categories = meta.category_list();
                if !categories.is_empty() {
                    lines.push(format!(
                        "{}Categories: {}",
                        indent(1),
                        categories.join(", ")
                    ));
                }
            }
            Err(err) => {
                lines.push(format!("{index} ({})", article.filename));
                lines.push(format!("{}Error: {err}", indent(1)));
            }
        }
    }
    lines
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Whole `check` report; the last line is the summary.
pub fn format_check_output(
    rules: &[RouteRule],
    pages: &[PageStatus],
    articles: &[ArticleStatus],
) -> Vec<String> {
    let mut lines = format_routes(rules);
    let page_lines = format_pages(pages);
    if !page_lines.is_empty() {
        lines.push(String::new());
        lines.extend(page_lines);
    }
    lines.push(String::new());
    lines.extend(format_articles(articles));
    lines.push(String::new());

    let errors = articles.iter().filter(|a| a.meta.is_err()).count();
    let missing = pages.iter().filter(|p| !p.exists).count();
    let mut summary = plural(articles.len(), "article");
    if errors > 0 {
        summary.push_str(&format!(", {}", plural(errors, "error")));
    }
    if missing > 0 {
        summary.push_str(&format!(", {} missing", plural(missing, "page")));
    }
    lines.push(summary);
    lines
}

pub fn print_check_output(rules: &[RouteRule], pages: &[PageStatus], articles: &[ArticleStatus]) {
    for line in format_check_output(rules, pages, articles) {
        println!("{}", line);
    }
}
