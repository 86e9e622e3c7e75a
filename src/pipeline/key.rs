//! Storage key derivation: source URL → deterministic object key.
//!
//! The key is a pure function of the URL (and the configured prefix), so
//! re-processing a document overwrites its previous thumbnail instead of
//! accumulating copies.
//!
//! ```text
//! https://example.com/docs/a%20b.PDF?x=1
//!                          └───┬───┘
//!              last segment, decoded: "a b.PDF"
//!              .pdf stripped:         "a b"
//!              key:                   "test/thumb-a b.png"
//! ```
//!
//! The key is built as an object store [`Path`](ObjectPath) straight away,
//! and [`StorageKey::path`] reads back from it, so the string reported to
//! the caller is exactly the one the object is written under. Names the
//! store cannot hold verbatim (control characters, an embedded `//`) are
//! escaped segment by segment.

use crate::error::PdfThumbError;
use object_store::path::Path as ObjectPath;
use percent_encoding::percent_decode_str;
use std::fmt;
use url::Url;

/// Base name used when the URL has no usable last path segment.
pub const DEFAULT_BASE_NAME: &str = "file";

/// Destination of a thumbnail: bucket plus object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    bucket: String,
    location: ObjectPath,
}

impl StorageKey {
    /// Key for a `/`-separated `path`; segments that are not valid object
    /// store parts are escaped.
    pub fn new(bucket: impl Into<String>, path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        Self {
            bucket: bucket.into(),
            location: ObjectPath::parse(path).unwrap_or_else(|_| ObjectPath::from(path)),
        }
    }

    fn from_location(bucket: &str, location: ObjectPath) -> Self {
        Self {
            bucket: bucket.to_string(),
            location,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object path as stored.
    pub fn path(&self) -> &str {
        self.location.as_ref()
    }

    pub fn location(&self) -> &ObjectPath {
        &self.location
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Derive the key `<prefix>/thumb-<basename>.png` for `source_url`.
///
/// Fails only when the last segment decodes to invalid UTF-8.
pub fn derive_key(source_url: &str, prefix: &str, bucket: &str) -> Result<StorageKey, PdfThumbError> {
    let name = base_name(source_url)?;
    let file_name = format!("thumb-{}.png", name);
    let prefix = prefix.trim_matches('/');

    let raw = if prefix.is_empty() {
        file_name.clone()
    } else {
        format!("{}/{}", prefix, file_name)
    };

    // Fallback keeps the file name a single segment: `/` inside it is escaped.
    let location = ObjectPath::parse(&raw).unwrap_or_else(|_| {
        ObjectPath::from_iter(prefix.split('/').chain(std::iter::once(file_name.as_str())))
    });

    Ok(StorageKey::from_location(bucket, location))
}

/// Decoded last path segment with any `.pdf` suffix removed.
fn base_name(source_url: &str) -> Result<String, PdfThumbError> {
    let segment = match last_segment(source_url) {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(DEFAULT_BASE_NAME.to_string()),
    };

    let decoded = percent_decode_str(&segment)
        .decode_utf8()
        .map_err(|e| PdfThumbError::InvalidKeySegment {
            segment: segment.clone(),
            reason: e.to_string(),
        })?;

    if decoded.is_empty() {
        return Ok(DEFAULT_BASE_NAME.to_string());
    }

    Ok(strip_pdf_suffix(&decoded).to_string())
}

/// Last path segment, still percent-encoded.
///
/// Query and fragment never belong to a parsed path segment. A string the
/// URL parser rejects is split by hand so derivation stays total.
fn last_segment(source_url: &str) -> Option<String> {
    match Url::parse(source_url.trim()) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_owned),
        Err(_) => source_url
            .rsplit('/')
            .next()
            .and_then(|s| s.split('?').next())
            .and_then(|s| s.split('#').next())
            .map(str::to_owned),
    }
}

fn strip_pdf_suffix(name: &str) -> &str {
    let cut = name.len().saturating_sub(4);
    match name.get(cut..) {
        Some(ext) if ext.eq_ignore_ascii_case(".pdf") => &name[..cut],
        _ => name,
    }
}
