//! # edgequake-pdfthumb
//!
//! Render the first page of a remotely hosted PDF into a PNG thumbnail and
//! publish it to S3-compatible object storage (Cloudflare R2 by default).
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Fetch    download the PDF (timeout, redirect and size caps)
//!  ├─ 2. Decode   parse with pdfium from memory (spawn_blocking)
//!  ├─ 3. Render   rasterise page 1 at 1.5× native size
//!  ├─ 4. Encode   RGBA frame → PNG
//!  ├─ 5. Key      <prefix>/thumb-<name>.png, derived from the URL
//!  └─ 6. Upload   single put, then <public-base>/<key>
//! ```
//!
//! Every run ends in a [`PipelineResult`]: `200` with `path` and
//! `publicUrl`, `400` when the source answered with a non-success status,
//! `500` for everything else. The first failing stage stops the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfthumb::{ThumbnailConfig, ThumbnailPipeline, ThumbnailRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ThumbnailConfig::builder()
//!         .account_id("my-account")
//!         .credentials("AKIA...", "secret")
//!         .build()?;
//!     // Build once, share across requests.
//!     let pipeline = ThumbnailPipeline::from_config(config)?;
//!
//!     let result = pipeline
//!         .run(&ThumbnailRequest::new("https://example.com/report.pdf"))
//!         .await;
//!     println!("{}", serde_json::to_string(&result.response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfthumb` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## PDFium
//!
//! Rendering binds a pdfium shared library at runtime: the path in
//! [`ThumbnailConfig::pdfium_lib_path`] if set, otherwise the system library.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FetchLimits, StorageConfig, ThumbnailConfig, ThumbnailConfigBuilder};
pub use convert::{generate_thumbnail, generate_thumbnail_sync, ThumbnailPipeline};
pub use error::{ErrorKind, PdfThumbError};
pub use output::{
    PipelineResult, Stage, StageFailure, StoredThumbnail, ThumbnailRequest, ThumbnailResponse,
};
pub use pipeline::decode::{Document, DocumentDecoder, Page, PdfiumDecoder};
pub use pipeline::fetch::{HttpFetcher, SourceFetcher};
pub use pipeline::key::{derive_key, StorageKey};
pub use pipeline::render::{RasterFrame, Viewport, RENDER_SCALE};
pub use pipeline::upload::ObjectStorageUploader;
