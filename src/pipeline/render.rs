//! Page rasterisation: first page of a [`Document`] → [`RasterFrame`].
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and CPU-heavy drawing.
//! `tokio::task::spawn_blocking` moves decode and render onto the blocking
//! pool so the async workers keep serving fetches and uploads. The blocking
//! task cannot be interrupted; on timeout the pipeline stops waiting for it
//! and the eventual frame is discarded.
//!
//! pdfium-render's `thread_safe` feature serialises all pdfium calls behind
//! one process-wide lock held for the lifetime of each `Pdfium` handle. A
//! timed-out render keeps that lock until it finishes, so runs started after
//! it queue behind the abandoned work and may time out in turn.
//!
//! ## Why reject oversized viewports instead of shrinking them?
//!
//! Thumbnails are always rendered at exactly [`RENDER_SCALE`]. A page whose
//! scaled size exceeds `max_viewport_edge` is treated as pathological and
//! fails the render stage rather than silently producing a different scale.

use crate::error::PdfThumbError;
use crate::output::{Stage, StageFailure};
use crate::pipeline::decode::{Document, DocumentDecoder, FIRST_PAGE};
use bytes::Bytes;
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Scale applied to the page's native size.
pub const RENDER_SCALE: f32 = 1.5;

/// Integer pixel dimensions a page is rasterised at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Scale a native `(width, height)` in points, truncating to whole pixels.
    pub fn from_points((width, height): (f32, f32), scale: f32) -> Self {
        // `as` saturates: negative and NaN sizes become 0.
        Self {
            width: (width * scale).floor() as u32,
            height: (height * scale).floor() as u32,
        }
    }

    fn check(self, page: usize, max_edge: u32) -> Result<Self, PdfThumbError> {
        if self.width == 0 || self.height == 0 {
            return Err(PdfThumbError::EmptyViewport {
                page,
                width: self.width,
                height: self.height,
            });
        }
        if self.width > max_edge || self.height > max_edge {
            return Err(PdfThumbError::ViewportTooLarge {
                page,
                width: self.width,
                height: self.height,
                limit: max_edge,
            });
        }
        Ok(self)
    }
}

/// A rendered RGBA8 pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFrame {
    image: RgbaImage,
}

impl RasterFrame {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Render page 1 of `document` at [`RENDER_SCALE`].
///
/// Failures are tagged with the stage they belong to: a missing page is
/// [`Stage::GetPage`], a bad viewport [`Stage::ComputeViewport`], a drawing
/// error [`Stage::Render`].
pub fn render_first_page(
    document: &dyn Document,
    max_edge: u32,
) -> Result<RasterFrame, StageFailure> {
    let page = document
        .page(FIRST_PAGE)
        .map_err(|e| StageFailure::new(Stage::GetPage, e))?;

    let viewport = page
        .viewport(RENDER_SCALE)
        .check(FIRST_PAGE, max_edge)
        .map_err(|e| StageFailure::new(Stage::ComputeViewport, e))?;
    debug!(
        "Page {} viewport at {}x: {}x{} px",
        FIRST_PAGE, RENDER_SCALE, viewport.width, viewport.height
    );

    page.render(viewport)
        .map_err(|e| StageFailure::new(Stage::Render, e))
}

/// Decode `bytes` and render the first page on the blocking pool.
pub async fn render_thumbnail(
    decoder: Arc<dyn DocumentDecoder>,
    bytes: Bytes,
    max_edge: u32,
    timeout_secs: u64,
) -> Result<RasterFrame, StageFailure> {
    let task = tokio::task::spawn_blocking(move || {
        decoder.decode(bytes, &mut |document| render_first_page(document, max_edge))
    });

    match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(StageFailure::new(
            Stage::Render,
            PdfThumbError::Internal(format!("Render task panicked: {}", join_err)),
        )),
        Err(_elapsed) => Err(StageFailure::new(
            Stage::Render,
            PdfThumbError::RenderTimeout { secs: timeout_secs },
        )),
    }
}
