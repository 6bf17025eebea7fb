//! Data model shared by every pipeline phase.
//!
//! ```text
//! SourceDocument ──expand──▶ Unit ──recognize──▶ Outcome ──stitch──▶ SourceResult
//!   (input i)              (i, page)           (i, page)            (index i)
//! ```
//!
//! Every [`Unit`] and [`Outcome`] carries an explicit [`UnitId`]
//! (`origin`, `page`). Workers complete in arbitrary order; the stitcher
//! restores input order and page order from these tags alone, never from
//! the position a value happened to land in a collection.

use crate::error::UnitError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Free-form string metadata attached to a recognition or a stitched result.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key set on results the correction pass rewrote.
pub const CORRECTED_KEY: &str = "corrected";

/// What a source document is, as sniffed from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    /// A single raster image (PNG, JPEG, TIFF, WebP).
    Image,
    /// A (possibly multi-page) PDF document.
    Pdf,
}

/// One original input document, loaded into memory.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Display name: file name or last URL segment.
    pub name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            bytes,
        }
    }
}

/// Identity of a unit: which input it came from and which page it is.
///
/// `page` is `None` for a unit that is not a page of an expanded
/// multi-page document (a single image, or a whole PDF handed to a backend
/// that reads PDFs natively).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId {
    /// Index of the original input this unit was expanded from.
    pub origin: usize,
    /// 0-based page index within the original input.
    pub page: Option<usize>,
    /// Name of the original input, for error attribution.
    pub name: Arc<str>,
}

impl UnitId {
    pub fn new(origin: usize, page: Option<usize>, name: impl Into<Arc<str>>) -> Self {
        Self {
            origin,
            page,
            name: name.into(),
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input {} ({})", self.origin, self.name)?;
        if let Some(page) = self.page {
            write!(f, " page {page}")?;
        }
        Ok(())
    }
}

/// The work item handed to a recognition backend.
#[derive(Debug, Clone)]
pub enum Payload {
    /// A decoded raster image (a single-image input or a rendered page).
    Image(DynamicImage),
    /// Raw PDF bytes, for backends that accept whole documents natively.
    Pdf(Arc<[u8]>),
}

impl Payload {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Payload::Image(_) => DocumentKind::Image,
            Payload::Pdf(_) => DocumentKind::Pdf,
        }
    }
}

/// One atomic item of recognition work.
#[derive(Debug, Clone)]
pub struct Unit {
    pub id: UnitId,
    pub payload: Payload,
}

impl Unit {
    pub fn new(id: UnitId, payload: Payload) -> Self {
        Self { id, payload }
    }
}

/// What a recognition backend returns for one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,
    pub metadata: Metadata,
    /// Structured images some backends extract alongside the text.
    pub images: Vec<serde_json::Value>,
}

impl Recognition {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The result of running one unit through the pipeline.
///
/// Holding a `Result` makes "exactly one of text or error" structural.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub id: UnitId,
    pub result: Result<Recognition, UnitError>,
}

impl Outcome {
    pub fn success(id: UnitId, recognition: Recognition) -> Self {
        Self {
            id,
            result: Ok(recognition),
        }
    }

    pub fn failure(error: UnitError) -> Self {
        Self {
            id: error.id().clone(),
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&UnitError> {
        self.result.as_ref().err()
    }
}

/// The stitched, per-original-input result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub text: String,
    pub images: Vec<serde_json::Value>,
    pub metadata: Metadata,
}

impl SourceResult {
    /// `true` once the correction pass has rewritten this result.
    pub fn is_corrected(&self) -> bool {
        self.metadata.get(CORRECTED_KEY).map(String::as_str) == Some("true")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_id_display_with_and_without_page() {
        assert_eq!(UnitId::new(0, None, "a.png").to_string(), "input 0 (a.png)");
        assert_eq!(
            UnitId::new(2, Some(1), "c.pdf").to_string(),
            "input 2 (c.pdf) page 1"
        );
    }

    #[test]
    fn outcome_failure_takes_identity_from_error() {
        let id = UnitId::new(3, Some(4), "d.pdf");
        let outcome = Outcome::failure(UnitError::Cancelled { id: id.clone() });
        assert_eq!(outcome.id, id);
        assert!(!outcome.is_success());
        assert!(outcome.error().is_some());
    }

    #[test]
    fn corrected_marker() {
        let mut r = SourceResult::default();
        assert!(!r.is_corrected());
        r.metadata.insert(CORRECTED_KEY.into(), "true".into());
        assert!(r.is_corrected());
    }

    #[test]
    fn payload_kind() {
        let pdf = Payload::Pdf(Arc::from(&b"%PDF-1.7"[..]));
        assert_eq!(pdf.kind(), DocumentKind::Pdf);
        let img = Payload::Image(DynamicImage::new_luma8(1, 1));
        assert_eq!(img.kind(), DocumentKind::Image);
    }
}
