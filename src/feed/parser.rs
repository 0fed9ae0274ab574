use serde::Deserialize;

use crate::util::unescape_html;

/// A decoded RSS document: channel metadata plus items in document order.
///
/// Text fields are HTML-unescaped. `pub_date` is kept verbatim; the ingestor
/// decides how to interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<ParsedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

// ============================================================================
// Wire Format
// ============================================================================

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RssChannel {
    title: String,
    link: String,
    description: String,
    #[serde(rename = "item")]
    items: Vec<RssItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RssItem {
    title: String,
    link: String,
    description: String,
    #[serde(rename = "pubDate")]
    pub_date: String,
}

/// Decode an RSS 2.0 `<rss><channel>…</channel></rss>` body.
///
/// Missing elements decode as empty strings. Elements the format does not use
/// (`guid`, `atom:link`, `category`, ...) are ignored.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeedDocument, quick_xml::de::DeError> {
    let text = String::from_utf8_lossy(bytes);
    let doc: RssDocument = quick_xml::de::from_str(&text)?;
    Ok(doc.channel.into_document())
}

impl RssChannel {
    fn into_document(self) -> ParsedFeedDocument {
        ParsedFeedDocument {
            title: unescape_html(self.title.trim()).into_owned(),
            link: self.link.trim().to_string(),
            description: unescape_html(self.description.trim()).into_owned(),
            items: self
                .items
                .into_iter()
                .map(|item| ParsedItem {
                    title: unescape_html(item.title.trim()).into_owned(),
                    link: item.link.trim().to_string(),
                    description: unescape_html(item.description.trim()).into_owned(),
                    pub_date: item.pub_date.trim().to_string(),
                })
                .collect(),
        }
    }
}
