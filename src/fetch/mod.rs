//! Document retrieval and plain-text extraction.
//!
//! Pages are fetched over HTTP and reduced to whitespace-collapsed plain text before the
//! ingestion pipeline ever sees them. Script, style, and noscript subtrees are dropped
//! during extraction. CSV feeds are downloaded raw and normalized (BOM, CRLF) so the
//! parser can sniff the delimiter from the header line.

use reqwest::Client;
use scraper::{ElementRef, Html};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors raised while retrieving remote content.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP layer failed before a body was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// HTTP fetcher shared by the URL and CSV ingestion paths.
pub struct Fetcher {
    http: Client,
}

impl Fetcher {
    /// Construct a fetcher with a conservative request timeout.
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent("spacebio/fetch")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to construct reqwest::Client for fetching");
        Self { http }
    }

    /// Fetch a page and extract its plain text. Non-success statuses are failures.
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(html_to_text(&body))
    }

    /// Fetch a raw feed body, normalizing encoding artifacts.
    pub async fn fetch_feed(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(normalize_feed_text(&String::from_utf8_lossy(&bytes)))
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduce an HTML document to whitespace-collapsed plain text.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    const SKIP: [&str; 3] = ["script", "style", "noscript"];
    if SKIP.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                out.push(' ');
                out.push_str(&text.text);
            }
            scraper::Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
            }
            _ => {}
        }
    }
}

/// Strip a UTF-8 BOM and normalize CRLF line endings in a downloaded feed.
pub fn normalize_feed_text(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').replace("\r\n", "\n")
}
