//! Preprocessing: an ordered chain of pure image transforms per unit.
//!
//! Transforms run on the blocking pool (they are CPU-bound) with at most
//! `concurrency` units in flight. Units whose payload is raw PDF bytes pass
//! through untouched. A failing transform fails only its own unit; the unit
//! is reported as an error and never reaches recognition.

use crate::config::TransformSpec;
use crate::error::UnitError;
use crate::model::{Payload, Unit, UnitId};
use crate::progress::ProgressTracker;
use futures::stream::{self, StreamExt};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::sync::Arc;
use tracing::{debug, warn};

/// A pure image → image function. Must be safe to call concurrently on
/// distinct inputs.
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, String>;
}

/// Convert to 8-bit luminance.
pub struct Grayscale;

impl Transform for Grayscale {
    fn name(&self) -> &str {
        "grayscale"
    }

    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, String> {
        Ok(DynamicImage::ImageLuma8(image.to_luma8()))
    }
}

/// Shrink so the longest edge is at most `max_edge`, keeping aspect ratio.
pub struct Downscale {
    pub max_edge: u32,
}

impl Transform for Downscale {
    fn name(&self) -> &str {
        "downscale"
    }

    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, String> {
        if self.max_edge == 0 {
            return Err("max_edge must be ≥ 1".into());
        }
        let (w, h) = image.dimensions();
        if w.max(h) <= self.max_edge {
            return Ok(image);
        }
        Ok(image.resize(self.max_edge, self.max_edge, FilterType::Lanczos3))
    }
}

/// Posterise luminance to `levels` evenly spaced grey values.
pub struct Quantize {
    pub levels: u16,
}

impl Transform for Quantize {
    fn name(&self) -> &str {
        "quantize"
    }

    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, String> {
        if !(2..=256).contains(&self.levels) {
            return Err(format!("levels must be 2–256, got {}", self.levels));
        }
        let steps = (self.levels - 1) as f32;
        let mut luma = image.to_luma8();
        for px in luma.pixels_mut() {
            let bucket = (px.0[0] as f32 / 255.0 * steps).round();
            px.0[0] = (bucket / steps * 255.0).round() as u8;
        }
        Ok(DynamicImage::ImageLuma8(luma))
    }
}

/// Adjust contrast by `amount` (percent; negative lowers contrast).
pub struct Contrast {
    pub amount: f32,
}

impl Transform for Contrast {
    fn name(&self) -> &str {
        "contrast"
    }

    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, String> {
        Ok(image.adjust_contrast(self.amount))
    }
}

/// Instantiate the configured chain.
pub fn build_chain(specs: &[TransformSpec]) -> Vec<Arc<dyn Transform>> {
    specs
        .iter()
        .map(|spec| -> Arc<dyn Transform> {
            match *spec {
                TransformSpec::Grayscale => Arc::new(Grayscale),
                TransformSpec::Downscale { max_edge } => Arc::new(Downscale { max_edge }),
                TransformSpec::Quantize { levels } => Arc::new(Quantize { levels }),
                TransformSpec::Contrast { amount } => Arc::new(Contrast { amount }),
            }
        })
        .collect()
}

/// Run `chain` over one unit on the current thread.
pub fn apply_chain(chain: &[Arc<dyn Transform>], unit: Unit) -> Result<Unit, UnitError> {
    let Unit { id, payload } = unit;
    let image = match payload {
        Payload::Image(image) => image,
        pdf @ Payload::Pdf(_) => return Ok(Unit::new(id, pdf)),
    };
    let mut current = image;
    for transform in chain {
        current = transform
            .apply(current)
            .map_err(|detail| UnitError::Preprocess {
                id: id.clone(),
                transform: transform.name().to_string(),
                detail,
            })?;
    }
    Ok(Unit::new(id, Payload::Image(current)))
}

/// Split of a preprocessed batch.
#[derive(Debug, Default)]
pub struct Preprocessed {
    /// Units ready for recognition, in submission order.
    pub units: Vec<Unit>,
    pub errors: Vec<UnitError>,
}

/// Run the chain over every unit with at most `concurrency` in flight.
pub async fn preprocess_all(
    chain: Arc<[Arc<dyn Transform>]>,
    units: Vec<Unit>,
    concurrency: usize,
    tracker: &ProgressTracker,
) -> Preprocessed {
    if chain.is_empty() {
        for _ in &units {
            tracker.increment_completed();
        }
        return Preprocessed {
            units,
            errors: Vec::new(),
        };
    }

    let mut slots: Vec<(usize, Result<Unit, UnitError>)> =
        stream::iter(units.into_iter().enumerate().map(|(slot, unit)| {
            let chain = Arc::clone(&chain);
            let tracker = tracker.clone();
            async move {
                let id: UnitId = unit.id.clone();
                let result = tokio::task::spawn_blocking(move || apply_chain(&chain, unit))
                    .await
                    .unwrap_or_else(|e| {
                        Err(UnitError::Preprocess {
                            id,
                            transform: "chain".into(),
                            detail: format!("transform task panicked: {e}"),
                        })
                    });
                match &result {
                    Ok(unit) => {
                        debug!("{} preprocessed", unit.id);
                        tracker.increment_completed();
                    }
                    Err(e) => {
                        warn!("{}", e);
                        tracker.increment_failed();
                    }
                }
                (slot, result)
            }
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    slots.sort_by_key(|(slot, _)| *slot);

    let mut out = Preprocessed::default();
    for (_, result) in slots {
        match result {
            Ok(unit) => out.units.push(unit),
            Err(e) => out.errors.push(e),
        }
    }
    out
}
