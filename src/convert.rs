//! Pipeline orchestration: URL in, stored thumbnail (or tagged failure) out.
//!
//! [`ThumbnailPipeline::execute`] chains the stages with `?`, so the first
//! failing stage ends the run and nothing after it executes; in particular a
//! failure before [`Stage::Upload`] never touches the object store.
//! [`ThumbnailPipeline::run`] is the caller-facing boundary: it turns the
//! outcome into a [`PipelineResult`], catches panics as internal errors and
//! logs every failure with its stage.
//!
//! One pipeline is meant to be built at startup and shared. It holds no
//! mutable state; concurrent runs for the same URL race on the same key and
//! the last successful upload wins.

use crate::config::ThumbnailConfig;
use crate::error::{ErrorKind, PdfThumbError};
use crate::output::{PipelineResult, Stage, StageFailure, StoredThumbnail, ThumbnailRequest};
use crate::pipeline::decode::{DocumentDecoder, PdfiumDecoder};
use crate::pipeline::fetch::{looks_like_pdf_url, HttpFetcher, SourceFetcher};
use crate::pipeline::upload::ObjectStorageUploader;
use crate::pipeline::{encode, key, render};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// The thumbnail pipeline with its long-lived collaborators.
#[derive(Clone)]
pub struct ThumbnailPipeline {
    fetcher: Arc<dyn SourceFetcher>,
    decoder: Arc<dyn DocumentDecoder>,
    uploader: ObjectStorageUploader,
    config: Arc<ThumbnailConfig>,
}

impl std::fmt::Debug for ThumbnailPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailPipeline")
            .field("fetcher", &"<dyn SourceFetcher>")
            .field("decoder", &"<dyn DocumentDecoder>")
            .field("uploader", &self.uploader)
            .field("config", &self.config)
            .finish()
    }
}

impl ThumbnailPipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        config: ThumbnailConfig,
        fetcher: Arc<dyn SourceFetcher>,
        decoder: Arc<dyn DocumentDecoder>,
        uploader: ObjectStorageUploader,
    ) -> Self {
        Self {
            fetcher,
            decoder,
            uploader,
            config: Arc::new(config),
        }
    }

    /// Production pipeline: HTTP fetcher, pdfium decoder, S3 uploader.
    pub fn from_config(config: ThumbnailConfig) -> Result<Self, PdfThumbError> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        let decoder = PdfiumDecoder::new(config.pdfium_lib_path.clone());
        let uploader = ObjectStorageUploader::s3(&config.storage)?;
        Ok(Self::new(
            config,
            Arc::new(fetcher),
            Arc::new(decoder),
            uploader,
        ))
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    pub fn uploader(&self) -> &ObjectStorageUploader {
        &self.uploader
    }

    /// Run the pipeline for one request. Never fails: every outcome,
    /// including a panic inside a stage, becomes a [`PipelineResult`].
    pub async fn run(&self, request: &ThumbnailRequest) -> PipelineResult {
        let start = Instant::now();
        let progress = Progress::default();
        let outcome = AssertUnwindSafe(self.execute_tracked(&request.url, &progress))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(stored)) => {
                info!(
                    url = %request.url,
                    path = %stored.key,
                    width = stored.width,
                    height = stored.height,
                    bytes = stored.size_bytes,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Thumbnail stored: {}",
                    stored.public_url
                );
                return PipelineResult::success(&stored);
            }
            Ok(Err(failure)) => failure,
            Err(panic) => StageFailure::new(
                progress.current(),
                PdfThumbError::Internal(panic_message(panic.as_ref())),
            ),
        };

        let kind = failure.error.kind();
        if kind == ErrorKind::SourceHttpError || kind == ErrorKind::InvalidSource {
            warn!(
                stage = %failure.stage,
                kind = %kind,
                url = %request.url,
                "Thumbnail pipeline rejected source: {}",
                failure.error
            );
        } else {
            error!(
                stage = %failure.stage,
                kind = %kind,
                url = %request.url,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Thumbnail pipeline failed: {}",
                failure.error
            );
        }

        PipelineResult::failure(&failure, self.config.expose_storage_errors)
    }

    /// Run every stage in order, stopping at the first failure.
    pub async fn execute(&self, url: &str) -> Result<StoredThumbnail, StageFailure> {
        self.execute_tracked(url, &Progress::default()).await
    }

    async fn execute_tracked(
        &self,
        url: &str,
        progress: &Progress,
    ) -> Result<StoredThumbnail, StageFailure> {
        // ── Step 0: Optional source validation ───────────────────────────
        if self.config.require_pdf_url {
            progress.enter(Stage::ValidateSource);
            if !looks_like_pdf_url(url) {
                return Err(StageFailure::new(
                    Stage::ValidateSource,
                    PdfThumbError::InvalidSource {
                        url: url.to_string(),
                    },
                ));
            }
        }

        // ── Step 1: Fetch, check status, read body ───────────────────────
        progress.enter(Stage::Fetch);
        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| StageFailure::new(fetch_stage(&e), e))?;

        // ── Step 2: Decode, get page, viewport, render ───────────────────
        progress.enter(Stage::Decode);
        let frame = render::render_thumbnail(
            Arc::clone(&self.decoder),
            bytes,
            self.config.max_viewport_edge,
            self.config.render_timeout_secs,
        )
        .await?;
        let (width, height) = (frame.width(), frame.height());

        // ── Step 3: Encode PNG ───────────────────────────────────────────
        progress.enter(Stage::Encode);
        let image = encode::encode_png(frame).map_err(|e| StageFailure::new(Stage::Encode, e))?;

        // ── Step 4: Derive key ───────────────────────────────────────────
        progress.enter(Stage::DeriveKey);
        let key = key::derive_key(url, &self.config.key_prefix, self.uploader.bucket())
            .map_err(|e| StageFailure::new(Stage::DeriveKey, e))?;

        // ── Step 5: Upload ───────────────────────────────────────────────
        progress.enter(Stage::Upload);
        self.uploader
            .put(&key, &image)
            .await
            .map_err(|e| StageFailure::new(Stage::Upload, e))?;

        // ── Step 6: Finalize ─────────────────────────────────────────────
        progress.enter(Stage::Finalize);
        let public_url = self.uploader.public_url(&key);

        Ok(StoredThumbnail {
            key,
            public_url,
            width,
            height,
            size_bytes: image.len(),
        })
    }
}

/// Build a production pipeline from `config` and run it once for `url`.
///
/// Convenient for one-off use; services should build one
/// [`ThumbnailPipeline`] and call [`ThumbnailPipeline::run`] per request.
pub async fn generate_thumbnail(
    url: impl AsRef<str>,
    config: ThumbnailConfig,
) -> Result<PipelineResult, PdfThumbError> {
    let pipeline = ThumbnailPipeline::from_config(config)?;
    Ok(pipeline.run(&ThumbnailRequest::new(url.as_ref())).await)
}

/// Synchronous wrapper around [`generate_thumbnail`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_thumbnail_sync(
    url: impl AsRef<str>,
    config: ThumbnailConfig,
) -> Result<PipelineResult, PdfThumbError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfThumbError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_thumbnail(url, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Stage a fetcher error belongs to, by kind.
fn fetch_stage(err: &PdfThumbError) -> Stage {
    match err.kind() {
        ErrorKind::SourceHttpError => Stage::ValidateHttpStatus,
        ErrorKind::ReadError => Stage::ReadBytes,
        _ => Stage::Fetch,
    }
}

/// Last stage entered, readable after a panic unwinds through the run.
#[derive(Default)]
struct Progress(AtomicU8);

impl Progress {
    const ORDER: [Stage; 12] = [
        Stage::ValidateSource,
        Stage::Fetch,
        Stage::ValidateHttpStatus,
        Stage::ReadBytes,
        Stage::Decode,
        Stage::GetPage,
        Stage::ComputeViewport,
        Stage::Render,
        Stage::Encode,
        Stage::DeriveKey,
        Stage::Upload,
        Stage::Finalize,
    ];

    fn enter(&self, stage: Stage) {
        if let Some(i) = Self::ORDER.iter().position(|s| *s == stage) {
            self.0.store(i as u8, Ordering::Relaxed);
        }
    }

    fn current(&self) -> Stage {
        Self::ORDER
            .get(self.0.load(Ordering::Relaxed) as usize)
            .copied()
            .unwrap_or(Stage::Fetch)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_map_to_their_stage() {
        let status = PdfThumbError::SourceStatus {
            url: "u".into(),
            status: 404,
        };
        let read = PdfThumbError::ReadFailed { reason: "eof".into() };
        let net = PdfThumbError::FetchFailed {
            url: "u".into(),
            reason: "dns".into(),
        };
        assert_eq!(fetch_stage(&status), Stage::ValidateHttpStatus);
        assert_eq!(fetch_stage(&read), Stage::ReadBytes);
        assert_eq!(fetch_stage(&net), Stage::Fetch);
    }

    #[test]
    fn progress_tracks_last_stage() {
        let p = Progress::default();
        assert_eq!(p.current(), Stage::ValidateSource);
        p.enter(Stage::Upload);
        assert_eq!(p.current(), Stage::Upload);
    }

    #[test]
    fn panic_payloads_are_described() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "panic: boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "panic: bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u32);
        assert!(panic_message(boxed.as_ref()).contains("non-string"));
    }

    #[test]
    fn pipeline_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ThumbnailPipeline>();
    }

    #[test]
    fn from_config_without_credentials_fails() {
        let err = ThumbnailPipeline::from_config(ThumbnailConfig::default()).unwrap_err();
        assert!(matches!(err, PdfThumbError::InvalidConfig(_)));
    }
}
