//! Error types for the edgequake-pdfthumb library.
//!
//! A single enum, [`PdfThumbError`], carries every concrete failure the
//! pipeline can hit. Each variant belongs to one [`ErrorKind`], the coarse
//! taxonomy callers see in a response: the kind decides the status code and
//! the fixed human-readable message, the variant's `Display` output becomes
//! the diagnostic `details` string.
//!
//! Storage failures are the exception to "details are always the Display
//! output": backend errors can carry endpoint names, request ids and
//! credential hints, so [`PdfThumbError::details`] redacts them unless the
//! caller explicitly opts in.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Detail string returned in place of a redacted storage backend error.
pub const REDACTED_STORAGE_DETAIL: &str = "storage backend rejected the request";

/// Coarse failure taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Network-level failure reaching the source URL.
    FetchError,
    /// Source responded with a non-success HTTP status.
    SourceHttpError,
    /// Source URL rejected before fetching (only with `require_pdf_url`).
    InvalidSource,
    /// Response body could not be read into memory.
    ReadError,
    /// Bytes are not a valid or parsable PDF.
    DecodeError,
    /// Requested page does not exist or cannot be loaded.
    PageAccessError,
    /// Rasterisation of the page failed.
    RenderError,
    /// Storage backend rejected or failed the put.
    UploadError,
    /// Anything else.
    InternalError,
}

impl ErrorKind {
    /// Response status code for this kind.
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::SourceHttpError | ErrorKind::InvalidSource => 400,
            _ => 500,
        }
    }

    /// Fixed message identifying the purpose of the failing stage.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::FetchError | ErrorKind::SourceHttpError => "Failed to fetch PDF from url",
            ErrorKind::InvalidSource => "URL does not reference a PDF document",
            ErrorKind::ReadError => "Failed to read PDF data",
            ErrorKind::DecodeError => "Failed to load PDF document",
            ErrorKind::PageAccessError => "Failed to get first page of PDF",
            ErrorKind::RenderError => "Failed to render PDF page",
            ErrorKind::UploadError => "Failed to upload thumbnail to object storage",
            ErrorKind::InternalError => "Internal Server Error",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::FetchError => "FetchError",
            ErrorKind::SourceHttpError => "SourceHttpError",
            ErrorKind::InvalidSource => "InvalidSource",
            ErrorKind::ReadError => "ReadError",
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::PageAccessError => "PageAccessError",
            ErrorKind::RenderError => "RenderError",
            ErrorKind::UploadError => "UploadError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors returned by the edgequake-pdfthumb library.
#[derive(Debug, Error)]
pub enum PdfThumbError {
    // ── Fetch errors ──────────────────────────────────────────────────────
    /// Transport failure: DNS, refused connection, TLS, invalid URL.
    #[error("Failed to reach '{url}': {reason}")]
    FetchFailed { url: String, reason: String },

    /// The request did not complete within the configured timeout.
    #[error("Fetching '{url}' timed out after {secs}s")]
    FetchTimeout { url: String, secs: u64 },

    /// Source answered with a non-2xx status.
    #[error("Source '{url}' responded with HTTP {status}")]
    SourceStatus { url: String, status: u16 },

    /// URL failed the PDF-pattern check before any request was made.
    #[error("URL '{url}' does not look like a PDF document (expected http(s) and a .pdf path)")]
    InvalidSource { url: String },

    // ── Read errors ───────────────────────────────────────────────────────
    /// The body stream broke while being read.
    #[error("Failed to read response body: {reason}")]
    ReadFailed { reason: String },

    /// Body is larger than `max_source_bytes`.
    #[error("Source body exceeds the {limit}-byte limit (got at least {received} bytes)")]
    SourceTooLarge { limit: u64, received: u64 },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// No `%PDF-` header near the start of the body.
    #[error("Data is not a PDF document\nFirst bytes: {magic:?}")]
    NotAPdf { magic: Vec<u8> },

    /// Header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// Document is encrypted; no password is ever supplied.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    // ── Page errors ───────────────────────────────────────────────────────
    /// Requested 1-based page does not exist.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Page exists but pdfium could not load it.
    #[error("Page {page} could not be loaded: {detail}")]
    PageUnavailable { page: usize, detail: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// Scaled page size rounds down to zero pixels on one axis.
    #[error("Viewport for page {page} is empty ({width}x{height} px)")]
    EmptyViewport { page: usize, width: u32, height: u32 },

    /// Scaled page size exceeds `max_viewport_edge`.
    #[error("Viewport for page {page} is {width}x{height} px, above the {limit} px edge limit")]
    ViewportTooLarge {
        page: usize,
        width: u32,
        height: u32,
        limit: u32,
    },

    /// pdfium returned an error while drawing the page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Decode + render did not finish within the configured timeout.
    #[error("Rendering timed out after {secs}s")]
    RenderTimeout { secs: u64 },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The put operation failed.
    #[error("Upload of '{key}' failed: {reason}")]
    UploadFailed { key: String, reason: String },

    /// The put operation did not finish within the configured timeout.
    #[error("Upload of '{key}' timed out after {secs}s")]
    UploadTimeout { key: String, secs: u64 },

    /// Key addresses a bucket the storage client was not built for.
    #[error("Bucket '{requested}' is not served by this client (configured: '{configured}')")]
    BucketMismatch {
        requested: String,
        configured: String,
    },

    // ── Internal errors ───────────────────────────────────────────────────
    /// PNG serialisation failed.
    #[error("PNG encoding failed: {0}")]
    EncodeFailed(String),

    /// Last path segment is not valid percent-encoded UTF-8.
    #[error("Cannot derive a storage key from segment '{segment}': {reason}")]
    InvalidKeySegment { segment: String, reason: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error, including caught panics.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfThumbError {
    /// The taxonomy bucket this failure belongs to.
    pub fn kind(&self) -> ErrorKind {
        use PdfThumbError::*;
        match self {
            FetchFailed { .. } | FetchTimeout { .. } => ErrorKind::FetchError,
            SourceStatus { .. } => ErrorKind::SourceHttpError,
            InvalidSource { .. } => ErrorKind::InvalidSource,
            ReadFailed { .. } | SourceTooLarge { .. } => ErrorKind::ReadError,
            NotAPdf { .. } | CorruptPdf { .. } | PasswordRequired => ErrorKind::DecodeError,
            PageOutOfRange { .. } | PageUnavailable { .. } => ErrorKind::PageAccessError,
            EmptyViewport { .. }
            | ViewportTooLarge { .. }
            | RasterisationFailed { .. }
            | RenderTimeout { .. } => ErrorKind::RenderError,
            UploadFailed { .. } | UploadTimeout { .. } | BucketMismatch { .. } => {
                ErrorKind::UploadError
            }
            EncodeFailed(_)
            | InvalidKeySegment { .. }
            | PdfiumBindingFailed(_)
            | InvalidConfig(_)
            | Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Shorthand for `self.kind().status()`.
    pub fn status(&self) -> u16 {
        self.kind().status()
    }

    /// Diagnostic detail for the response body.
    ///
    /// `None` for a non-success source status: the caller already knows the
    /// URL it sent and the status is logged. Storage failures are replaced by
    /// [`REDACTED_STORAGE_DETAIL`] unless `expose_storage_errors` is set.
    pub fn details(&self, expose_storage_errors: bool) -> Option<String> {
        match self.kind() {
            ErrorKind::SourceHttpError => None,
            ErrorKind::UploadError if !expose_storage_errors => {
                Some(REDACTED_STORAGE_DETAIL.to_string())
            }
            _ => Some(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_status_maps_to_400_without_details() {
        let e = PdfThumbError::SourceStatus {
            url: "https://example.com/missing.pdf".into(),
            status: 404,
        };
        assert_eq!(e.kind(), ErrorKind::SourceHttpError);
        assert_eq!(e.status(), 400);
        assert!(e.details(true).is_none());
        assert!(e.to_string().contains("404"), "got: {e}");
    }

    #[test]
    fn every_other_kind_is_500() {
        let errors = [
            PdfThumbError::FetchFailed {
                url: "u".into(),
                reason: "dns".into(),
            },
            PdfThumbError::SourceTooLarge {
                limit: 10,
                received: 11,
            },
            PdfThumbError::CorruptPdf {
                detail: "xref".into(),
            },
            PdfThumbError::PageOutOfRange { page: 1, total: 0 },
            PdfThumbError::RenderTimeout { secs: 3 },
            PdfThumbError::UploadTimeout {
                key: "k".into(),
                secs: 3,
            },
            PdfThumbError::Internal("boom".into()),
        ];
        for e in errors {
            assert_eq!(e.status(), 500, "{e:?}");
        }
    }

    #[test]
    fn invalid_source_is_client_error() {
        let e = PdfThumbError::InvalidSource {
            url: "ftp://example.com/a.txt".into(),
        };
        assert_eq!(e.status(), 400);
        assert!(e.details(false).unwrap().contains("ftp://example.com/a.txt"));
    }

    #[test]
    fn storage_detail_is_redacted_by_default() {
        let e = PdfThumbError::UploadFailed {
            key: "test/thumb-a.png".into(),
            reason: "AccessDenied: signature mismatch for AKIA...".into(),
        };
        assert_eq!(e.details(false).as_deref(), Some(REDACTED_STORAGE_DETAIL));
        assert!(e.details(true).unwrap().contains("AccessDenied"));
    }

    #[test]
    fn decode_details_carry_the_underlying_message() {
        let e = PdfThumbError::NotAPdf {
            magic: b"<htm".to_vec(),
        };
        assert_eq!(e.kind(), ErrorKind::DecodeError);
        assert_eq!(e.kind().message(), "Failed to load PDF document");
        assert!(e.details(false).unwrap().contains("not a PDF"));
    }

    #[test]
    fn page_out_of_range_display() {
        let e = PdfThumbError::PageOutOfRange { page: 1, total: 0 };
        assert!(e.to_string().contains("0 pages"));
        assert_eq!(e.kind(), ErrorKind::PageAccessError);
    }
}
