//! Pipeline stages for batch text recognition.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and can be driven without the orchestrator.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ expand ──▶ preprocess ──▶ execute ──▶ stitch ──▶ correct
//! (path/URL) (render)   (transforms)   (backend)   (by origin) (optional)
//! ```
//!
//! 1. [`input`]  — load a local path or URL into a sniffed `SourceDocument`
//! 2. [`expand`] — one document → units; PDFs are rasterised by [`render`]
//!    unless the backend reads them natively
//! 3. [`preprocess`] — ordered image transforms on the blocking pool
//! 4. [`execute`] — bounded, rate-limited, cancellable recognition; the only
//!    stage with network I/O besides correction
//! 5. [`stitch`] — regroup outcomes per input, pages in ascending order
//! 6. [`correct`] — optional best-effort refinement of each stitched text
//!
//! [`encode`] and [`postprocess`] are shared by the backends: base64 payloads
//! for vision requests and deterministic cleanup of recognised text.

pub mod correct;
pub mod encode;
pub mod execute;
pub mod expand;
pub mod input;
pub mod postprocess;
pub mod preprocess;
pub mod render;
pub mod stitch;
