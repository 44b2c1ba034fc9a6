//! RSS 2.0 feed.

use crate::error::{BlogError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};

pub const CONTENT_TYPE: &str = "text/xml";

/// Channel-level feed values.
#[derive(Debug, Clone)]
pub struct FeedChannel {
    pub title: String,
    pub description: String,
    /// Absolute URL of the feed itself.
    pub link: String,
}

/// One article in the feed.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub title: String,
    /// Absolute article URL, also used as the permalink guid.
    pub link: String,
    pub description_html: String,
    /// Article date as written in its header.
    pub date: String,
}

/// Parse an article date: RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`
/// (both read as UTC).
pub fn parse_date(date: &str) -> Option<DateTime<Utc>> {
    let date = date.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn rfc2822(date: &str) -> Option<String> {
    let parsed = parse_date(date);
    if parsed.is_none() {
        tracing::warn!(date, "unparseable article date, omitting pubDate");
    }
    parsed.map(|d| d.to_rfc2822())
}

/// Render the feed document. Items are expected newest first; the channel
/// `pubDate` is taken from the first one.
pub fn render_feed(channel: &FeedChannel, items: &[FeedItem]) -> Result<String> {
    let rss_items: Vec<rss::Item> = items
        .iter()
        .map(|item| {
            ItemBuilder::default()
                .title(item.title.clone())
                .link(Some(item.link.clone()))
                .guid(
                    GuidBuilder::default()
                        .permalink(true)
                        .value(item.link.clone())
                        .build(),
                )
                .description(item.description_html.clone())
                .pub_date(rfc2822(&item.date))
                .build()
        })
        .collect();

    let channel = ChannelBuilder::default()
        .title(&channel.title)
        .link(&channel.link)
        .description(&channel.description)
        .pub_date(items.first().and_then(|i| rfc2822(&i.date)))
        .generator(format!("simple-blog {}", env!("CARGO_PKG_VERSION")))
        .items(rss_items)
        .build();

    let bytes = channel
        .write_to(Vec::new())
        .map_err(|e| BlogError::Feed(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BlogError::Feed(e.to_string()))
}
