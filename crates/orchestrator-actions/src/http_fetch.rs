//! Page fetcher: GET a URL and strip it down to readable text.

use crate::io::{FetchedPage, IoError, IoResult, PageFetcher};
use reqwest::Client;

const MAX_CONTENT_CHARS: usize = 20_000;

pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Default for HttpPageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> IoResult<FetchedPage> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(IoError::RequestFailed(format!("{} returned {}", url, response.status())));
        }
        let body = response.text().await?;
        let title = extract_title(&body);
        let content = strip_tags(&body);
        let truncated = if content.len() > MAX_CONTENT_CHARS {
            format!("{}\n... [truncated]", &content[..MAX_CONTENT_CHARS])
        } else {
            content
        };
        Ok(FetchedPage { url: url.to_string(), title, content: truncated })
    }
}

fn extract_title(html: &str) -> Option<String> {
    let start = html.to_lowercase().find("<title>")? + "<title>".len();
    let end = html[start..].to_lowercase().find("</title>")? + start;
    Some(html[start..end].trim().to_string())
}

/// Minimal tag stripper: drops script/style blocks entirely, then removes
/// remaining tags and collapses whitespace.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut skip_block: Option<&str> = None;
    let lower = html.to_lowercase();
    let mut i = 0;
    let bytes = html.as_bytes();
    while i < bytes.len() {
        if skip_block.is_none() {
            if lower[i..].starts_with("<script") {
                skip_block = Some("</script>");
            } else if lower[i..].starts_with("<style") {
                skip_block = Some("</style>");
            }
        }
        if let Some(end_tag) = skip_block {
            if lower[i..].starts_with(end_tag) {
                skip_block = None;
                i += end_tag.len();
                continue;
            }
            i += 1;
            continue;
        }
        match bytes[i] {
            b'<' => {
                in_tag = true;
                i += 1;
            }
            b'>' => {
                in_tag = false;
                out.push(' ');
                i += 1;
            }
            _ if !in_tag => {
                out.push(bytes[i] as char);
                i += 1;
            }
            _ => i += 1,
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
