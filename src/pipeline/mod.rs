//! Pipeline stages for PDF-to-thumbnail conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch rendering backend or object store)
//! without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ decode ──▶ render ──▶ encode ──▶ key ──▶ upload
//! (reqwest)  (pdfium)   (1.5×)     (PNG)    (URL)   (S3/R2)
//! ```
//!
//! 1. [`fetch`]   download the source with timeout, redirect and size caps
//! 2. [`decode`]  parse bytes into a [`decode::Document`]; pdfium-backed
//! 3. [`render`]  rasterise page 1 at a fixed scale; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 4. [`encode`]  PNG-encode the frame
//! 5. [`key`]     derive the deterministic storage key from the URL
//! 6. [`upload`]  put the PNG and compute its public URL

pub mod decode;
pub mod encode;
pub mod fetch;
pub mod key;
pub mod render;
pub mod upload;
