//! HTTP fetching with range reads.
//!
//! The first request asks for the leading `header_bytes` only. That is
//! enough to reject anything that is not a TIFF before downloading it and,
//! for COGs, covers the image file directory. Servers that honour the range
//! answer 206 and the remainder is fetched with a second open-ended range;
//! servers that ignore it answer 200 with the whole file, which is used
//! as-is.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::{header, Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::error::{LoaderError, Result};

/// Configuration for the range fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Size of the initial header read
    pub header_bytes: usize,
    /// Retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            header_bytes: 64 * 1024,
            max_retries: 2,
            initial_retry_delay: Duration::from_millis(250),
        }
    }
}

/// The bytes of a fetched raster.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Bytes,
    /// Whether the server honoured range requests.
    pub range_reads: bool,
}

/// Fetches whole rasters, starting with a ranged header read.
#[derive(Debug, Clone)]
pub struct RangeFetcher {
    client: Client,
    config: FetchConfig,
}

impl RangeFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|source| LoaderError::Request {
                url: String::new(),
                source,
            })?;
        Ok(Self { client, config })
    }

    /// Build around an existing client, sharing its connection pool.
    pub fn with_client(client: Client, config: FetchConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch a raster, retrying transient failures with backoff.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<Fetched> {
        let mut delay = self.config.initial_retry_delay;
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(attempt = attempt, error = %e, "transient fetch failure, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                other => return other,
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Fetched> {
        let header_len = self.config.header_bytes.max(16);
        let head = self.get(url, format!("bytes=0-{}", header_len - 1)).await?;

        match head.status() {
            StatusCode::OK => {
                let body = read_body(url, head).await?;
                check_magic(&body)?;
                debug!(bytes = body.len(), "server ignored range, got full body");
                Ok(Fetched {
                    bytes: body,
                    range_reads: false,
                })
            }
            StatusCode::PARTIAL_CONTENT => {
                let total = content_range_total(&head);
                let first = read_body(url, head).await?;
                check_magic(&first)?;

                let complete = match total {
                    Some(total) => first.len() >= total,
                    None => first.len() < header_len,
                };
                if complete {
                    return Ok(Fetched {
                        bytes: first,
                        range_reads: true,
                    });
                }

                let rest = self.get(url, format!("bytes={}-", first.len())).await?;
                match rest.status() {
                    StatusCode::PARTIAL_CONTENT => {
                        let tail = read_body(url, rest).await?;
                        let mut all = BytesMut::with_capacity(first.len() + tail.len());
                        all.extend_from_slice(&first);
                        all.extend_from_slice(&tail);
                        debug!(header = first.len(), tail = tail.len(), "fetched with range reads");
                        Ok(Fetched {
                            bytes: all.freeze(),
                            range_reads: true,
                        })
                    }
                    StatusCode::OK => Ok(Fetched {
                        bytes: read_body(url, rest).await?,
                        range_reads: false,
                    }),
                    // Header read ended exactly at EOF.
                    StatusCode::RANGE_NOT_SATISFIABLE => Ok(Fetched {
                        bytes: first,
                        range_reads: true,
                    }),
                    status => Err(LoaderError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    }),
                }
            }
            status => Err(LoaderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn get(&self, url: &str, range: String) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .header(header::RANGE, range)
            .send()
            .await
            .map_err(|source| LoaderError::Request {
                url: url.to_string(),
                source,
            })
    }
}

async fn read_body(url: &str, response: reqwest::Response) -> Result<Bytes> {
    response.bytes().await.map_err(|source| LoaderError::Request {
        url: url.to_string(),
        source,
    })
}

/// Total length from `Content-Range: bytes a-b/total`.
fn content_range_total(response: &reqwest::Response) -> Option<usize> {
    response
        .headers()
        .get(header::CONTENT_RANGE)?
        .to_str()
        .ok()?
        .rsplit_once('/')?
        .1
        .trim()
        .parse()
        .ok()
}

/// Check for `II*\0`, `MM\0*` (classic) or `II+\0`, `MM\0+` (BigTIFF).
pub fn check_magic(bytes: &[u8]) -> Result<()> {
    let magic = bytes.get(..4);
    if matches!(magic, Some([b'I', b'I', 42 | 43, 0]) | Some([b'M', b'M', 0, 42 | 43])) {
        Ok(())
    } else {
        Err(LoaderError::NotTiff(bytes.iter().take(4).copied().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_magic() {
        assert!(check_magic(b"II*\0rest").is_ok());
        assert!(check_magic(b"MM\0*").is_ok());
        assert!(check_magic(b"II+\0").is_ok());
        assert!(check_magic(b"<htm").is_err());
        assert!(check_magic(b"II").is_err());
    }
}
