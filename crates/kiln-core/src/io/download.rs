//! HTTP fetches for package indexes and archives, with progress reporting.
//!
//! Every fetch of an `http://` URL that fails is retried once over
//! `https://` before the error is returned.

use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::Reporter;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid JSON from {url}: {source}")]
    Json {
        url: String,
        source: serde_json::Error,
    },
}

/// Build the HTTP client shared by every component of one engine.
pub fn build_client(user_agent: &str) -> Result<Client, DownloadError> {
    Ok(Client::builder().user_agent(user_agent).build()?)
}

/// The `https://` form of an `http://` URL, if it has one.
pub fn https_fallback(url: &str) -> Option<String> {
    url.strip_prefix("http://")
        .map(|rest| format!("https://{rest}"))
}

/// Fetch `url` into memory, reporting progress per chunk.
pub async fn fetch_bytes(
    client: &Client,
    url: &str,
    reporter: &dyn Reporter,
) -> Result<Vec<u8>, DownloadError> {
    match fetch_once(client, url, reporter).await {
        Ok(bytes) => Ok(bytes),
        Err(e) => match https_fallback(url) {
            Some(secure) => {
                tracing::warn!("Fetching {url} failed ({e}), retrying as {secure}");
                fetch_once(client, &secure, reporter).await
            }
            None => Err(e),
        },
    }
}

/// Fetch `url` and decode the body as JSON.
pub async fn fetch_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    reporter: &dyn Reporter,
) -> Result<T, DownloadError> {
    let body = fetch_bytes(client, url, reporter).await?;
    serde_json::from_slice(&body).map_err(|source| DownloadError::Json {
        url: url.to_string(),
        source,
    })
}

async fn fetch_once(
    client: &Client,
    url: &str,
    reporter: &dyn Reporter,
) -> Result<Vec<u8>, DownloadError> {
    tracing::debug!("GET {url}");
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let total = response.content_length();
    let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut stream = response.bytes_stream();
    reporter.downloading(url, 0, total);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        body.extend_from_slice(&chunk);
        reporter.downloading(url, body.len() as u64, total);
    }

    Ok(body)
}
