//! PDF rasterisation: render every page of an in-memory PDF via pdfium.
//!
//! ## Why a trait?
//!
//! Expansion only needs "bytes in, page images out". [`PageRenderer`] keeps
//! pdfium out of the orchestration code and lets tests substitute a renderer
//! that fabricates pages without a native library.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 12,000 × 17,000 px image. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded.
//!
//! Rendering is CPU-bound and pdfium is not async-safe, so callers run
//! [`PageRenderer::render`] inside `spawn_blocking`.

use crate::error::BatchError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Knobs for one render call.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Target resolution; pages are scaled by `dpi / 72`.
    pub dpi: u32,
    /// Longest-edge cap in pixels.
    pub max_pixels: u32,
    pub password: Option<String>,
}

/// Turns a multi-page document into one image per page, in page order.
pub trait PageRenderer: Send + Sync {
    /// The number of pages is discovered here; it is not known in advance.
    fn render(&self, pdf: &[u8], options: &RenderOptions) -> Result<Vec<DynamicImage>, String>;
}

/// pdfium-backed renderer.
///
/// Binds to `PDFIUM_LIB_PATH` when set, otherwise to the system library.
/// Binding happens once in [`PdfiumRenderer::new`] so a missing library is a
/// fatal configuration error, not N per-input failures. The handle is shared
/// by every render; pdfium-render's `sync` feature makes it `Send + Sync`
/// and serialises calls into the library.
pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    pub fn new() -> Result<Self, BatchError> {
        let pdfium = bind().map_err(BatchError::PdfiumBindingFailed)?;
        Ok(Self { pdfium })
    }
}

fn bind() -> Result<Pdfium, String> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| format!("{:?}", e))?;
    Ok(Pdfium::new(bindings))
}

impl PageRenderer for PdfiumRenderer {
    fn render(&self, pdf: &[u8], options: &RenderOptions) -> Result<Vec<DynamicImage>, String> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(pdf, options.password.as_deref())
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if options.password.is_some() {
                        "wrong password".to_string()
                    } else {
                        "document is encrypted; provide a password".to_string()
                    }
                } else {
                    format!("corrupt PDF: {err_str}")
                }
            })?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let scale = options.dpi.max(1) as f32 / 72.0;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .set_maximum_width(options.max_pixels as i32)
            .set_maximum_height(options.max_pixels as i32);

        let mut images = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| format!("page {}: {:?}", idx, e))?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx,
                image.width(),
                image.height()
            );
            images.push(image);
        }

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_shareable<T: Send + Sync + 'static>() {}

    #[test]
    fn pdfium_renderer_is_shareable_across_workers() {
        assert_shareable::<PdfiumRenderer>();
    }

    #[test]
    fn missing_library_is_a_binding_error() {
        std::env::set_var("PDFIUM_LIB_PATH", "/definitely/not/libpdfium.so");
        let result = PdfiumRenderer::new();
        std::env::remove_var("PDFIUM_LIB_PATH");
        assert!(matches!(result, Err(BatchError::PdfiumBindingFailed(_))));
    }
}
