//! Configuration types for the thumbnail pipeline.
//!
//! All pipeline behaviour is controlled through [`ThumbnailConfig`], built
//! via its [`ThumbnailConfigBuilder`]. The nested [`FetchLimits`] and
//! [`StorageConfig`] groups mirror the two network collaborators so each one
//! can be constructed from its own slice of the configuration.
//!
//! Defaults target the Recollect media bucket: bucket `recollect`, public base
//! URL `https://media.recollect.so`, destination folder `test`.

use crate::error::PdfThumbError;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_BUCKET: &str = "recollect";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://media.recollect.so";
pub const DEFAULT_KEY_PREFIX: &str = "test";

/// Bounds applied to the source download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLimits {
    /// Whole-request timeout (connect, headers and body) in seconds. Default: 30.
    pub timeout_secs: u64,

    /// Maximum accepted body size in bytes. Default: 50 MiB.
    ///
    /// Checked against `Content-Length` when present and again while the body
    /// streams in, so a lying or missing header cannot bypass it.
    pub max_bytes: u64,

    /// Maximum redirect hops followed. Default: 10.
    pub max_redirects: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 50 * 1024 * 1024,
            max_redirects: 10,
        }
    }
}

/// Connection settings for the S3-compatible object store.
#[derive(Clone)]
pub struct StorageConfig {
    /// Cloudflare account id; used to derive the R2 endpoint when `endpoint` is unset.
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,

    /// Explicit S3 endpoint, e.g. `http://localhost:9000` for MinIO.
    /// Takes precedence over `account_id`.
    pub endpoint: Option<String>,

    /// Region sent in signed requests. Default: `auto` (what R2 expects).
    pub region: String,

    /// Destination bucket. Default: `recollect`.
    pub bucket: String,

    /// Base URL under which the bucket is publicly readable.
    pub public_base_url: String,

    /// Timeout for a single put, in seconds. Default: 60.
    pub upload_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            endpoint: None,
            region: "auto".to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            upload_timeout_secs: 60,
        }
    }
}

impl StorageConfig {
    /// The endpoint the S3 client talks to.
    ///
    /// Falls back to `https://<account_id>.r2.cloudflarestorage.com`.
    pub fn resolved_endpoint(&self) -> Option<String> {
        match &self.endpoint {
            Some(e) if !e.trim().is_empty() => Some(e.trim().trim_end_matches('/').to_string()),
            _ if !self.account_id.trim().is_empty() => Some(format!(
                "https://{}.r2.cloudflarestorage.com",
                self.account_id.trim()
            )),
            _ => None,
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &if self.secret_access_key.is_empty() {
                    ""
                } else {
                    "<redacted>"
                },
            )
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("public_base_url", &self.public_base_url)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .finish()
    }
}

/// Configuration for one thumbnail pipeline instance.
///
/// Built via [`ThumbnailConfig::builder()`] or using
/// [`ThumbnailConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdfthumb::ThumbnailConfig;
///
/// let config = ThumbnailConfig::builder()
///     .key_prefix("thumbnails")
///     .bucket("media")
///     .public_base_url("https://cdn.example.com")
///     .build()
///     .unwrap();
/// assert_eq!(config.key_prefix, "thumbnails");
/// ```
#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    pub fetch: FetchLimits,

    pub storage: StorageConfig,

    /// Folder the thumbnails are written under. Default: `test`.
    ///
    /// Leading and trailing slashes are trimmed; an empty prefix writes to
    /// the bucket root.
    pub key_prefix: String,

    /// Timeout for decode + render of the first page, in seconds. Default: 60.
    ///
    /// pdfium cannot be interrupted, so on timeout the blocking thread runs to
    /// completion in the background and its frame is dropped. It holds the
    /// process-wide pdfium lock until then, so later renders wait behind it.
    pub render_timeout_secs: u64,

    /// Largest accepted viewport edge in pixels. Default: 10 000.
    ///
    /// At 1.5× an A0 poster is ~5 000 px wide, so the default only rejects
    /// documents with absurd media boxes.
    pub max_viewport_edge: u32,

    /// Reject URLs that do not look like a PDF before fetching. Default: false.
    pub require_pdf_url: bool,

    /// Return raw storage backend errors in `details`. Default: false.
    pub expose_storage_errors: bool,

    /// Path to a pdfium shared library. If None, binds the system library.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            fetch: FetchLimits::default(),
            storage: StorageConfig::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            render_timeout_secs: 60,
            max_viewport_edge: 10_000,
            require_pdf_url: false,
            expose_storage_errors: false,
            pdfium_lib_path: None,
        }
    }
}

impl ThumbnailConfig {
    /// Create a new builder for `ThumbnailConfig`.
    pub fn builder() -> ThumbnailConfigBuilder {
        ThumbnailConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ThumbnailConfig`].
#[derive(Debug)]
pub struct ThumbnailConfigBuilder {
    config: ThumbnailConfig,
}

impl ThumbnailConfigBuilder {
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch.timeout_secs = secs.max(1);
        self
    }

    pub fn max_source_bytes(mut self, bytes: u64) -> Self {
        self.config.fetch.max_bytes = bytes;
        self
    }

    pub fn max_redirects(mut self, n: usize) -> Self {
        self.config.fetch.max_redirects = n;
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn account_id(mut self, id: impl Into<String>) -> Self {
        self.config.storage.account_id = id.into();
        self
    }

    pub fn credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.config.storage.access_key_id = access_key_id.into();
        self.config.storage.secret_access_key = secret_access_key.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.storage.endpoint = Some(endpoint.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.storage.region = region.into();
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.storage.bucket = bucket.into();
        self
    }

    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.storage.public_base_url = url.into();
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.storage.upload_timeout_secs = secs.max(1);
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs.max(1);
        self
    }

    pub fn max_viewport_edge(mut self, px: u32) -> Self {
        self.config.max_viewport_edge = px.max(1);
        self
    }

    pub fn require_pdf_url(mut self, v: bool) -> Self {
        self.config.require_pdf_url = v;
        self
    }

    pub fn expose_storage_errors(mut self, v: bool) -> Self {
        self.config.expose_storage_errors = v;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Credentials are not checked here; they are only required when an S3
    /// client is built from [`StorageConfig`].
    pub fn build(self) -> Result<ThumbnailConfig, PdfThumbError> {
        let c = &self.config;
        if c.fetch.max_bytes == 0 {
            return Err(PdfThumbError::InvalidConfig(
                "max_source_bytes must be ≥ 1".into(),
            ));
        }
        if c.storage.bucket.trim().is_empty() {
            return Err(PdfThumbError::InvalidConfig(
                "bucket name must not be empty".into(),
            ));
        }
        let base = c.storage.public_base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(PdfThumbError::InvalidConfig(format!(
                "public base URL must be http(s), got '{}'",
                c.storage.public_base_url
            )));
        }
        if c.key_prefix.split('/').any(|part| part == "..") {
            return Err(PdfThumbError::InvalidConfig(format!(
                "key prefix must not contain '..', got '{}'",
                c.key_prefix
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_recollect_media_bucket() {
        let c = ThumbnailConfig::default();
        assert_eq!(c.key_prefix, "test");
        assert_eq!(c.storage.bucket, "recollect");
        assert_eq!(c.storage.public_base_url, "https://media.recollect.so");
        assert_eq!(c.storage.region, "auto");
        assert!(!c.require_pdf_url);
    }

    #[test]
    fn key_prefix_slashes_are_trimmed() {
        let c = ThumbnailConfig::builder()
            .key_prefix("/thumbs/2024/")
            .build()
            .unwrap();
        assert_eq!(c.key_prefix, "thumbs/2024");
    }

    #[test]
    fn dot_dot_prefix_is_rejected() {
        let err = ThumbnailConfig::builder()
            .key_prefix("a/../b")
            .build()
            .unwrap_err();
        assert!(matches!(err, PdfThumbError::InvalidConfig(_)));
    }

    #[test]
    fn non_http_public_base_is_rejected() {
        let err = ThumbnailConfig::builder()
            .public_base_url("media.example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("public base URL"));
    }

    #[test]
    fn zero_timeouts_are_clamped() {
        let c = ThumbnailConfig::builder()
            .fetch_timeout_secs(0)
            .render_timeout_secs(0)
            .upload_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.fetch.timeout_secs, 1);
        assert_eq!(c.render_timeout_secs, 1);
        assert_eq!(c.storage.upload_timeout_secs, 1);
    }

    #[test]
    fn r2_endpoint_derived_from_account_id() {
        let s = StorageConfig {
            account_id: "abc123".into(),
            ..StorageConfig::default()
        };
        assert_eq!(
            s.resolved_endpoint().as_deref(),
            Some("https://abc123.r2.cloudflarestorage.com")
        );

        let s = StorageConfig {
            account_id: "abc123".into(),
            endpoint: Some("http://localhost:9000/".into()),
            ..StorageConfig::default()
        };
        assert_eq!(s.resolved_endpoint().as_deref(), Some("http://localhost:9000"));

        assert!(StorageConfig::default().resolved_endpoint().is_none());
    }

    #[test]
    fn debug_redacts_secret() {
        let s = StorageConfig {
            secret_access_key: "super-secret".into(),
            ..StorageConfig::default()
        };
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
