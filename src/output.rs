//! Request, response and result types.
//!
//! [`ThumbnailRequest`] and [`ThumbnailResponse`] are the JSON wire shapes
//! (`{ "url": … }` in, `{ success, path?, publicUrl?, error?, details? }`
//! out). [`PipelineResult`] wraps the response with the status code and the
//! stage the run stopped at, which is what a transport layer needs to send
//! it and what logs need to explain it.

use crate::error::{ErrorKind, PdfThumbError};
use crate::pipeline::key::StorageKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of a thumbnail request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRequest {
    /// URL of the PDF to process.
    pub url: String,
}

impl ThumbnailRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// JSON response returned for every run, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailResponse {
    pub success: bool,
    /// Storage key of the thumbnail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Public URL of the thumbnail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// Fixed message naming the failing stage's purpose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Underlying failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    ValidateSource,
    Fetch,
    ValidateHttpStatus,
    ReadBytes,
    Decode,
    GetPage,
    ComputeViewport,
    Render,
    Encode,
    DeriveKey,
    Upload,
    Finalize,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ValidateSource => "validate_source",
            Stage::Fetch => "fetch",
            Stage::ValidateHttpStatus => "validate_http_status",
            Stage::ReadBytes => "read_bytes",
            Stage::Decode => "decode",
            Stage::GetPage => "get_page",
            Stage::ComputeViewport => "compute_viewport",
            Stage::Render => "render",
            Stage::Encode => "encode",
            Stage::DeriveKey => "derive_key",
            Stage::Upload => "upload",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure tagged with the stage that produced it.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: PdfThumbError,
}

impl StageFailure {
    pub fn new(stage: Stage, error: PdfThumbError) -> Self {
        Self { stage, error }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.error)
    }
}

impl std::error::Error for StageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredThumbnail {
    pub key: StorageKey,
    pub public_url: String,
    /// Rendered frame size in pixels.
    pub width: u32,
    pub height: u32,
    /// Encoded PNG size.
    pub size_bytes: usize,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    /// Response status code: 200, 400 or 500.
    pub status: u16,
    /// Last stage reached: [`Stage::Finalize`] on success, the failing stage otherwise.
    pub stage: Stage,
    /// Failure kind, `None` on success.
    pub kind: Option<ErrorKind>,
    pub response: ThumbnailResponse,
}

impl PipelineResult {
    pub fn success(stored: &StoredThumbnail) -> Self {
        Self {
            status: 200,
            stage: Stage::Finalize,
            kind: None,
            response: ThumbnailResponse {
                success: true,
                path: Some(stored.key.path().to_string()),
                public_url: Some(stored.public_url.clone()),
                error: None,
                details: None,
            },
        }
    }

    pub fn failure(failure: &StageFailure, expose_storage_errors: bool) -> Self {
        let kind = failure.error.kind();
        Self {
            status: kind.status(),
            stage: failure.stage,
            kind: Some(kind),
            response: ThumbnailResponse {
                success: false,
                path: None,
                public_url: None,
                error: Some(kind.message().to_string()),
                details: failure.error.details(expose_storage_errors),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.response.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_requires_url() {
        let req: ThumbnailRequest =
            serde_json::from_str(r#"{"url":"https://example.com/a.pdf"}"#).unwrap();
        assert_eq!(req.url, "https://example.com/a.pdf");
        assert!(serde_json::from_str::<ThumbnailRequest>("{}").is_err());
    }

    #[test]
    fn success_response_uses_camel_case_and_omits_errors() {
        let stored = StoredThumbnail {
            key: StorageKey::new("recollect", "test/thumb-report.png"),
            public_url: "https://media.recollect.so/test/thumb-report.png".into(),
            width: 918,
            height: 1188,
            size_bytes: 1024,
        };
        let result = PipelineResult::success(&stored);
        let json = serde_json::to_value(&result.response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "path": "test/thumb-report.png",
                "publicUrl": "https://media.recollect.so/test/thumb-report.png",
            })
        );
        assert_eq!(result.status, 200);
        assert_eq!(result.stage, Stage::Finalize);
    }

    #[test]
    fn failure_response_for_404_has_no_details() {
        let failure = StageFailure::new(
            Stage::ValidateHttpStatus,
            PdfThumbError::SourceStatus {
                url: "https://example.com/a.pdf".into(),
                status: 404,
            },
        );
        let result = PipelineResult::failure(&failure, false);
        assert_eq!(result.status, 400);
        assert_eq!(result.kind, Some(ErrorKind::SourceHttpError));
        let json = serde_json::to_value(&result.response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "error": "Failed to fetch PDF from url",
            })
        );
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Fetch < Stage::Decode);
        assert!(Stage::Render < Stage::Upload);
        assert!(Stage::Upload < Stage::Finalize);
    }
}
