//! Source retrieval: download the raw PDF bytes behind a URL.
//!
//! The body is streamed into memory rather than written to a temp file:
//! pdfium loads documents from a byte buffer, and holding the bytes lets the
//! size cap be enforced chunk by chunk. One [`reqwest::Client`] is built per
//! [`HttpFetcher`] and shared by every run, so connection pools and TLS
//! sessions are reused across requests.

use crate::config::FetchLimits;
use crate::error::PdfThumbError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info};

/// Retrieves the raw bytes of a document reference.
///
/// Errors must be one of the fetch-phase kinds: `FetchError` (transport),
/// `SourceHttpError` (non-2xx) or `ReadError` (body).
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, PdfThumbError>;
}

/// [`SourceFetcher`] over HTTP(S) with timeout, redirect and size bounds.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    limits: FetchLimits,
}

impl HttpFetcher {
    pub fn new(limits: &FetchLimits) -> Result<Self, PdfThumbError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("edgequake-pdfthumb/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(limits.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(limits.max_redirects))
            .build()
            .map_err(|e| PdfThumbError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            limits: limits.clone(),
        })
    }

    pub fn limits(&self) -> &FetchLimits {
        &self.limits
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, PdfThumbError> {
        info!("Fetching PDF from: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                PdfThumbError::FetchTimeout {
                    url: url.to_string(),
                    secs: self.limits.timeout_secs,
                }
            } else {
                PdfThumbError::FetchFailed {
                    url: url.to_string(),
                    reason: error_chain(&e),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PdfThumbError::SourceStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let limit = self.limits.max_bytes;
        let declared = response.content_length();
        if let Some(len) = declared {
            if len > limit {
                return Err(PdfThumbError::SourceTooLarge {
                    limit,
                    received: len,
                });
            }
        }

        let mut buf = BytesMut::with_capacity(declared.unwrap_or(0).min(limit) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PdfThumbError::ReadFailed {
                reason: if e.is_timeout() {
                    format!("body timed out after {}s", self.limits.timeout_secs)
                } else {
                    error_chain(&e)
                },
            })?;
            let received = (buf.len() + chunk.len()) as u64;
            if received > limit {
                return Err(PdfThumbError::SourceTooLarge { limit, received });
            }
            buf.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {}", buf.len(), url);
        Ok(buf.freeze())
    }
}

/// Render an error and its `source()` chain on one line.
///
/// reqwest's top-level message ("error sending request") hides the cause;
/// the chain carries the DNS or connection detail.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let msg = cause.to_string();
        if !out.contains(&msg) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        source = cause.source();
    }
    out
}

static PDF_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://[^/?#\s]+/[^?#\s]*\.pdf(?:[?#]\S*)?$").expect("valid PDF URL regex")
});

/// Whether the URL is http(s) and its path ends in `.pdf`.
pub fn looks_like_pdf_url(url: &str) -> bool {
    PDF_URL.is_match(url.trim())
}
