//! Catalog batch sources: one JSON document per source, yielding the raw
//! `items` listings. A source that cannot be read or parsed fails as a whole.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

/// Storefront APIs reject obviously non-browser clients; mimic one.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// HTTP client with browser-mimicking default headers and a bounded timeout,
/// shared across all remote sources in a run.
pub fn catalog_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("DNT", HeaderValue::from_static("1"));
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .context("failed to build catalog HTTP client")
}

/// One bounded batch of raw listings.
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// A JSON document on disk.
    File(PathBuf),
    /// A JSON endpoint fetched with a single GET.
    Remote(Url),
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSource::File(path) => write!(f, "file:{}", path.display()),
            CatalogSource::Remote(url) => write!(f, "{url}"),
        }
    }
}

impl CatalogSource {
    /// Fetch and parse this source, returning its raw listings.
    pub async fn fetch(&self, http: &Client) -> Result<Vec<Value>> {
        let doc = match self {
            CatalogSource::File(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str::<Value>(&raw)
                    .with_context(|| format!("invalid JSON in {}", path.display()))?
            }
            CatalogSource::Remote(url) => http
                .get(url.clone())
                .send()
                .await
                .with_context(|| format!("request to {url} failed"))?
                .error_for_status()
                .with_context(|| format!("{url} returned an error status"))?
                .json::<Value>()
                .await
                .with_context(|| format!("invalid JSON body from {url}"))?,
        };
        Ok(self.items_of(doc))
    }

    fn items_of(&self, doc: Value) -> Vec<Value> {
        match doc.get("items").and_then(Value::as_array) {
            Some(items) => {
                info!(source = %self, count = items.len(), "fetched raw listings");
                items.clone()
            }
            None => {
                warn!(source = %self, "document has no items array; treating as empty");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn temp_json(name: &str, doc: &Value) -> PathBuf {
        let path = std::env::temp_dir().join(format!("vitrine-{name}-{}.json", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{doc}").unwrap();
        path
    }

    #[tokio::test]
    async fn file_source_yields_items() {
        let path = temp_json(
            "items",
            &json!({"items": [{"id": "1"}, {"id": "2"}], "total": 2}),
        );
        let http = catalog_client(Duration::from_secs(5)).unwrap();
        let items = CatalogSource::File(path.clone()).fetch(&http).await.unwrap();
        assert_eq!(items.len(), 2);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn document_without_items_is_empty_not_an_error() {
        let path = temp_json("empty", &json!({"total": 0}));
        let http = catalog_client(Duration::from_secs(5)).unwrap();
        let items = CatalogSource::File(path.clone()).fetch(&http).await.unwrap();
        assert!(items.is_empty());
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn malformed_json_fails_the_whole_source() {
        let path = std::env::temp_dir().join(format!("vitrine-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{not json").unwrap();
        let http = catalog_client(Duration::from_secs(5)).unwrap();
        assert!(CatalogSource::File(path.clone()).fetch(&http).await.is_err());
        std::fs::remove_file(path).ok();
    }
}
