//! Document decoding: raw bytes → navigable [`Document`].
//!
//! ## Capability traits
//!
//! [`Document`] and [`Page`] are the only things the renderer needs from a
//! backend: a page count, a page by 1-based index, the page's native size
//! and a way to draw it at a given pixel size. [`PdfiumDecoder`] is the
//! production backend; tests substitute in-memory fakes.
//!
//! ## Why a visitor instead of returning the document?
//!
//! A pdfium `PdfDocument<'a>` borrows the `Pdfium` handle that loaded it and
//! is not `Send`. Handing `&dyn Document` to a closure while both are alive
//! keeps the borrow local, and lets the whole decode → render sequence run on
//! one blocking thread.
//!
//! ## Hardening
//!
//! Documents are only ever loaded from the in-memory byte vector, so pdfium
//! has no path or URL to resolve external resources against. pdfium-render
//! sets up a form-fill environment on every load, but it is given no
//! JavaScript platform and no document actions are ever triggered, so
//! embedded scripts are never evaluated.

use crate::error::PdfThumbError;
use crate::output::{Stage, StageFailure};
use crate::pipeline::render::{RasterFrame, Viewport};
use bytes::Bytes;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// The only page this pipeline renders (1-based).
pub const FIRST_PAGE: usize = 1;

/// How far into the body the `%PDF-` header may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// A single page of a decoded document.
pub trait Page {
    /// Native page size in points, `(width, height)`.
    fn size(&self) -> (f32, f32);

    /// Pixel viewport of this page at `scale`.
    fn viewport(&self, scale: f32) -> Viewport {
        Viewport::from_points(self.size(), scale)
    }

    /// Rasterise the page into a frame of exactly `viewport` pixels.
    fn render(&self, viewport: Viewport) -> Result<RasterFrame, PdfThumbError>;
}

/// A decoded, navigable document.
pub trait Document {
    fn page_count(&self) -> usize;

    /// Fetch a page by 1-based index.
    fn page(&self, index: usize) -> Result<Box<dyn Page + '_>, PdfThumbError>;
}

/// Closure run against a live document; see the module docs.
pub type DocumentVisitor<'v> =
    &'v mut dyn FnMut(&dyn Document) -> Result<RasterFrame, StageFailure>;

/// Parses raw bytes into a [`Document`] and hands it to `visit`.
///
/// Implementations tag their own failures with [`Stage::Decode`] and pass
/// the visitor's result through untouched.
pub trait DocumentDecoder: Send + Sync {
    fn decode(&self, bytes: Bytes, visit: DocumentVisitor<'_>)
        -> Result<RasterFrame, StageFailure>;
}

/// Check for a `%PDF-` header near the start of `bytes`.
///
/// Gives callers a meaningful error for HTML error pages and other non-PDF
/// bodies instead of an opaque pdfium format error.
pub fn sniff_pdf_header(bytes: &[u8]) -> Result<(), PdfThumbError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if window.windows(5).any(|w| w == b"%PDF-") {
        Ok(())
    } else {
        Err(PdfThumbError::NotAPdf {
            magic: bytes.iter().take(8).copied().collect(),
        })
    }
}

/// [`DocumentDecoder`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumDecoder {
    library_path: Option<PathBuf>,
}

impl PdfiumDecoder {
    /// `library_path` points at a pdfium shared library; `None` binds the
    /// system library.
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    fn bind(&self) -> Result<Pdfium, PdfThumbError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PdfThumbError::PdfiumBindingFailed(e.to_string()))?;

        Ok(Pdfium::new(bindings))
    }
}

impl DocumentDecoder for PdfiumDecoder {
    fn decode(
        &self,
        bytes: Bytes,
        visit: DocumentVisitor<'_>,
    ) -> Result<RasterFrame, StageFailure> {
        let decode_failure = |e| StageFailure::new(Stage::Decode, e);

        sniff_pdf_header(&bytes).map_err(decode_failure)?;
        let pdfium = self.bind().map_err(decode_failure)?;

        let document = pdfium
            .load_pdf_from_byte_vec(bytes.to_vec(), None)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    PdfThumbError::PasswordRequired
                } else {
                    PdfThumbError::CorruptPdf { detail: err_str }
                }
            })
            .map_err(decode_failure)?;

        let document = PdfiumDocument { document };
        info!("PDF loaded: {} pages", document.page_count());

        visit(&document)
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl Document for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page(&self, index: usize) -> Result<Box<dyn Page + '_>, PdfThumbError> {
        let total = self.page_count();
        if index == 0 || index > total {
            return Err(PdfThumbError::PageOutOfRange { page: index, total });
        }

        let page = self
            .document
            .pages()
            .get((index - 1) as u16)
            .map_err(|e| PdfThumbError::PageUnavailable {
                page: index,
                detail: format!("{:?}", e),
            })?;

        Ok(Box::new(PdfiumPage { page, index }))
    }
}

struct PdfiumPage<'a> {
    page: PdfPage<'a>,
    index: usize,
}

impl Page for PdfiumPage<'_> {
    fn size(&self) -> (f32, f32) {
        (self.page.width().value, self.page.height().value)
    }

    fn render(&self, viewport: Viewport) -> Result<RasterFrame, PdfThumbError> {
        let render_config = PdfRenderConfig::new()
            .set_target_size(viewport.width as i32, viewport.height as i32)
            .render_form_data(true);

        let bitmap = self
            .page
            .render_with_config(&render_config)
            .map_err(|e| PdfThumbError::RasterisationFailed {
                page: self.index,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image().into_rgba8();
        debug!(
            "Rendered page {} → {}x{} px",
            self.index,
            image.width(),
            image.height()
        );

        Ok(RasterFrame::new(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_at_start_is_accepted() {
        assert!(sniff_pdf_header(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n").is_ok());
    }

    #[test]
    fn header_after_leading_junk_is_accepted() {
        let mut body = vec![b' '; 200];
        body.extend_from_slice(b"%PDF-1.4\n");
        assert!(sniff_pdf_header(&body).is_ok());
    }

    #[test]
    fn html_body_is_rejected_with_magic() {
        let err = sniff_pdf_header(b"<!DOCTYPE html><html>").unwrap_err();
        match err {
            PdfThumbError::NotAPdf { magic } => assert_eq!(magic, b"<!DOCTYP".to_vec()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn header_beyond_window_is_rejected() {
        let mut body = vec![b'x'; HEADER_SEARCH_WINDOW];
        body.extend_from_slice(b"%PDF-1.4\n");
        assert!(sniff_pdf_header(&body).is_err());
    }

    #[test]
    fn empty_body_is_rejected() {
        assert!(matches!(
            sniff_pdf_header(b""),
            Err(PdfThumbError::NotAPdf { .. })
        ));
    }

    #[test]
    fn non_pdf_bytes_fail_before_binding_pdfium() {
        // A bogus library path would fail at bind time; the header check must
        // short-circuit first.
        let decoder = PdfiumDecoder::new(Some(PathBuf::from("/nonexistent/libpdfium.so")));
        let mut visited = false;
        let result = decoder.decode(Bytes::from_static(b"hello world"), &mut |_| {
            visited = true;
            Err(StageFailure::new(
                Stage::Render,
                PdfThumbError::Internal("unreachable".into()),
            ))
        });
        let failure = result.unwrap_err();
        assert_eq!(failure.stage, Stage::Decode);
        assert!(matches!(failure.error, PdfThumbError::NotAPdf { .. }));
        assert!(!visited);
    }
}
