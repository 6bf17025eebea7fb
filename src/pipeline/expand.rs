//! Expansion: one source document → one or more recognition units.
//!
//! * image input → one unit, `page = None`
//! * PDF, backend reads PDFs natively → one unit carrying the raw bytes, `page = None`
//! * PDF otherwise → one unit per rendered page, `page = Some(0..K)`
//!
//! `K` is only known after rendering, which is why the recognition tracker's
//! total is retargeted once expansion finishes. A document that fails to
//! expand contributes zero units and one [`UnitError::Expansion`]; it never
//! stops the other documents.

use crate::error::UnitError;
use crate::model::{DocumentKind, Payload, SourceDocument, Unit, UnitId};
use crate::pipeline::render::{PageRenderer, RenderOptions};
use crate::progress::ProgressTracker;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Expansion settings shared by every document of the batch.
#[derive(Clone)]
pub struct Expander {
    /// `None` when no PDF needs rendering in this batch.
    pub renderer: Option<Arc<dyn PageRenderer>>,
    pub options: RenderOptions,
    /// Hand PDFs to the backend whole instead of rendering them.
    pub native_multi_page: bool,
}

/// Result of expanding the whole batch.
#[derive(Debug, Default)]
pub struct Expansion {
    /// Units in input order, pages ascending within an input.
    pub units: Vec<Unit>,
    pub errors: Vec<UnitError>,
}

impl Expander {
    /// Expand one document. Runs on the calling thread; CPU-bound.
    pub fn expand_one(&self, origin: usize, doc: SourceDocument) -> Result<Vec<Unit>, UnitError> {
        let name: Arc<str> = Arc::from(doc.name.as_str());
        let whole = UnitId::new(origin, None, Arc::clone(&name));
        match doc.kind {
            DocumentKind::Image => {
                let image = image::load_from_memory(&doc.bytes).map_err(|e| {
                    UnitError::Expansion {
                        id: whole.clone(),
                        detail: format!("image decode: {e}"),
                    }
                })?;
                Ok(vec![Unit::new(whole, Payload::Image(image))])
            }
            DocumentKind::Pdf if self.native_multi_page => {
                Ok(vec![Unit::new(whole, Payload::Pdf(Arc::from(doc.bytes)))])
            }
            DocumentKind::Pdf => {
                let renderer = self.renderer.as_ref().ok_or_else(|| UnitError::Expansion {
                    id: whole.clone(),
                    detail: "no page renderer available".into(),
                })?;
                let pages = renderer
                    .render(&doc.bytes, &self.options)
                    .map_err(|detail| UnitError::Expansion {
                        id: whole.clone(),
                        detail,
                    })?;
                if pages.is_empty() {
                    return Err(UnitError::Expansion {
                        id: whole,
                        detail: "document has no pages".into(),
                    });
                }
                debug!("{} expanded into {} pages", name, pages.len());
                Ok(pages
                    .into_iter()
                    .enumerate()
                    .map(|(page, image)| {
                        Unit::new(
                            UnitId::new(origin, Some(page), Arc::clone(&name)),
                            Payload::Image(image),
                        )
                    })
                    .collect())
            }
        }
    }

    /// Expand every document with at most `concurrency` renders in flight.
    ///
    /// Each finished document ticks `tracker` (completed or failed).
    pub async fn expand_all(
        &self,
        docs: Vec<SourceDocument>,
        concurrency: usize,
        tracker: &ProgressTracker,
    ) -> Expansion {
        let mut per_doc: Vec<(usize, Result<Vec<Unit>, UnitError>)> =
            stream::iter(docs.into_iter().enumerate().map(|(origin, doc)| {
                let expander = self.clone();
                let tracker = tracker.clone();
                async move {
                    let id = UnitId::new(origin, None, doc.name.as_str());
                    let result = tokio::task::spawn_blocking(move || expander.expand_one(origin, doc))
                        .await
                        .unwrap_or_else(|e| {
                            Err(UnitError::Expansion {
                                id,
                                detail: format!("render task panicked: {e}"),
                            })
                        });
                    match &result {
                        Ok(_) => tracker.increment_completed(),
                        Err(e) => {
                            warn!("{}", e);
                            tracker.increment_failed();
                        }
                    }
                    (origin, result)
                }
            }))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        per_doc.sort_by_key(|(origin, _)| *origin);

        let mut expansion = Expansion::default();
        for (_, result) in per_doc {
            match result {
                Ok(units) => expansion.units.extend(units),
                Err(e) => expansion.errors.push(e),
            }
        }
        expansion
    }
}
