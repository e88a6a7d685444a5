use ::url::Url;
use anyhow::{Error, anyhow};
use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::get as reqwest_get;
use tokio::fs::read as tokio_fs_read;
use tokio_stream::{Stream, StreamExt as _, once};

use crate::loader::FragmentFetcher;

/// Creates a byte stream from a URL.
///
/// Supported URL schemes:
/// - `http`, `https`: Fetched via `reqwest` as a streaming response
/// - `file`: Read from the local filesystem (emitted as a single chunk)
///
/// # Errors
///
/// - Returns `Err` if the URL scheme is unsupported
/// - Returns `Err` if HTTP fetch fails or returns a non-success status
/// - Returns `Err` if the file path is invalid or the file cannot be read
pub async fn stream_url(
    url: &Url,
) -> Result<Box<dyn Stream<Item = Result<Bytes, Error>> + Send + Unpin>, Error> {
    Ok(match url.scheme() {
        "http" | "https" => {
            let response = reqwest_get(url.clone())
                .await
                .map_err(|err| anyhow!("Failed to fetch URL {url}: {err}"))?;

            if !response.status().is_success() {
                return Err(anyhow!(
                    "Failed to fetch URL: {} (Status: {})",
                    url,
                    response.status()
                ));
            }
            let stream = response.bytes_stream().map(|res| match res {
                Ok(bytes) => Ok::<Bytes, Error>(bytes),
                Err(err) => Err::<Bytes, Error>(anyhow!(err)),
            });
            Box::new(stream)
        }
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|()| anyhow!("Invalid file path for file url: {url}"))?;
            let data = tokio_fs_read(path).await.map(Bytes::from)?;
            // Emit the entire file as a single chunk for now.
            let stream = once(Ok::<Bytes, Error>(data));
            Box::new(stream)
        }
        _ => return Err(anyhow!("Unsupported url scheme {}", url.scheme())),
    })
}

/// Collect a URL's byte stream into a UTF-8 body.
pub async fn fetch_text(url: &Url) -> Result<String, Error> {
    let mut stream = stream_url(url).await?;
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    String::from_utf8(buf).map_err(|err| anyhow!("Response for {url} was not valid UTF-8: {err}"))
}

/// Default fragment fetcher: joins site-relative popup URLs against a
/// base and fetches them over http/https (or file, for local hosts).
pub struct HttpFetcher {
    base: Url,
}

impl HttpFetcher {
    pub fn new(base: Url) -> Self {
        Self { base }
    }
}

impl FragmentFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<String, Error>> {
        let resolved = self.base.join(url);
        Box::pin(async move {
            let resolved = resolved.map_err(|err| anyhow!("Invalid popup url: {err}"))?;
            fetch_text(&resolved).await
        })
    }
}
