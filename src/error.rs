//! Error types for the edgequake-batch-ocr library.
//!
//! Three tiers reflect three distinct failure scopes:
//!
//! * [`BatchError`] — **Fatal**: the batch cannot start at all (invalid
//!   configuration, provider not configured, pdfium unavailable) or one
//!   input could not even be loaded. Returned as `Err(BatchError)`.
//!
//! * [`UnitError`] — **Non-fatal**: one unit of work failed (a corrupt PDF,
//!   a transform glitch, a transient API error) but every sibling unit keeps
//!   going. Carried inside [`crate::model::Outcome`] and the per-phase lists
//!   of [`crate::orchestrator::BatchReport`].
//!
//! * [`AggregateError`] — a summary of many `UnitError`s, rendered as one
//!   newline-joined message at the end of a phase.
//!
//! Backends report their own [`BackendError`]; the executor wraps it with the
//! unit's identity so every failure is attributed to an input and a page.

use crate::model::UnitId;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-batch-ocr library.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The input exists but is neither a PDF nor a supported image format.
    #[error("Unsupported input '{name}': not a PDF or a supported image (first bytes: {magic:?})")]
    UnsupportedFormat { name: String, magic: Vec<u8> },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Backend errors ────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Multi-page PDFs are rendered with pdfium. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Install libpdfium system-wide.\n\
  • Use a backend that accepts PDFs natively (--native-pdf).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Outcome errors ────────────────────────────────────────────────────
    /// Some inputs succeeded but at least one unit failed somewhere.
    ///
    /// Returned by [`crate::orchestrator::BatchReport::into_result`] when
    /// the caller wants to treat any unit failure as an error.
    #[error("{failed}/{total} inputs produced no result\n{errors}")]
    PartialFailure {
        succeeded: usize,
        failed: usize,
        total: usize,
        errors: AggregateError,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure reported by a recognition or correction backend.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum BackendError {
    /// The provider API returned an error after all retries.
    #[error("{provider} call failed after {retries} retries: {detail}")]
    Provider {
        provider: String,
        retries: u32,
        detail: String,
    },

    /// A local recognition binary could not be run or exited non-zero.
    #[error("'{program}' failed: {detail}")]
    Process { program: String, detail: String },

    /// The backend was handed a payload it cannot process.
    #[error("unsupported payload: {0}")]
    UnsupportedPayload(String),

    /// Encoding the payload for the request failed.
    #[error("encoding failed: {0}")]
    Encode(String),
}

/// A non-fatal error for a single unit (or, for correction and delivery, a
/// single stitched result).
///
/// The batch continues; the error is collected into the phase's aggregate.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// A source document could not be expanded into units.
    #[error("{id}: expansion failed: {detail}")]
    Expansion { id: UnitId, detail: String },

    /// A preprocessing transform failed.
    #[error("{id}: transform '{transform}' failed: {detail}")]
    Preprocess {
        id: UnitId,
        transform: String,
        detail: String,
    },

    /// The recognition backend returned an error.
    #[error("{id}: recognition failed: {source}")]
    Recognition {
        id: UnitId,
        #[source]
        source: BackendError,
    },

    /// The recognition call exceeded the per-call timeout.
    #[error("{id}: recognition timed out after {secs}s")]
    Timeout { id: UnitId, secs: u64 },

    /// The shared context was cancelled before or during the call.
    #[error("{id}: cancelled")]
    Cancelled { id: UnitId },

    /// The correction pass failed for one stitched result.
    #[error("{id}: correction failed: {source}")]
    Correction {
        id: UnitId,
        #[source]
        source: BackendError,
    },

    /// The sink rejected a final result.
    #[error("{id}: delivery failed: {detail}")]
    Delivery { id: UnitId, detail: String },
}

impl UnitError {
    /// Identity of the unit (or input) the failure is attributed to.
    pub fn id(&self) -> &UnitId {
        match self {
            UnitError::Expansion { id, .. }
            | UnitError::Preprocess { id, .. }
            | UnitError::Recognition { id, .. }
            | UnitError::Timeout { id, .. }
            | UnitError::Cancelled { id }
            | UnitError::Correction { id, .. }
            | UnitError::Delivery { id, .. } => id,
        }
    }

    /// `true` when the failure was caused by cancellation of the shared context.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UnitError::Cancelled { .. })
    }
}

/// Many independent unit-level failures summarised as one error value.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AggregateError {
    pub errors: Vec<UnitError>,
}

impl AggregateError {
    pub fn new(errors: Vec<UnitError>) -> Self {
        Self { errors }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `None` when there is nothing to report.
    pub fn into_option(self) -> Option<Self> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

impl From<Vec<UnitError>> for AggregateError {
    fn from(errors: Vec<UnitError>) -> Self {
        Self::new(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(origin: usize, page: usize) -> UnitId {
        UnitId::new(origin, Some(page), "c.pdf")
    }

    #[test]
    fn recognition_error_is_attributed() {
        let e = UnitError::Recognition {
            id: page(2, 0),
            source: BackendError::Provider {
                provider: "openai".into(),
                retries: 3,
                detail: "HTTP 500".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("input 2"), "got: {msg}");
        assert!(msg.contains("page 0"), "got: {msg}");
        assert!(msg.contains("c.pdf"), "got: {msg}");
        assert!(msg.contains("HTTP 500"), "got: {msg}");
    }

    #[test]
    fn aggregate_joins_with_newlines() {
        let agg = AggregateError::new(vec![
            UnitError::Cancelled { id: page(0, 1) },
            UnitError::Timeout {
                id: UnitId::new(1, None, "b.png"),
                secs: 60,
            },
        ]);
        let msg = agg.to_string();
        assert_eq!(msg.lines().count(), 2);
        assert!(msg.lines().nth(1).unwrap().contains("60s"));
    }

    #[test]
    fn empty_aggregate_into_option_is_none() {
        assert!(AggregateError::default().into_option().is_none());
    }

    #[test]
    fn partial_failure_display() {
        let e = BatchError::PartialFailure {
            succeeded: 9,
            failed: 1,
            total: 10,
            errors: AggregateError::default(),
        };
        assert!(e.to_string().contains("1/10"));
    }

    #[test]
    fn cancelled_is_detected() {
        assert!(UnitError::Cancelled { id: page(0, 0) }.is_cancelled());
        assert!(!UnitError::Timeout {
            id: page(0, 0),
            secs: 1
        }
        .is_cancelled());
    }
}
