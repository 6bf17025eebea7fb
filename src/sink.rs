//! Output sinks: where final per-input results are delivered.
//!
//! The orchestrator calls [`Sink::deliver`] once per input that produced a
//! result, with the input's original index. Inputs with no result are
//! skipped, never delivered as empty text.

use crate::model::SourceResult;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

/// Why a sink refused a result.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no output name for input {0}")]
    UnknownIndex(usize),

    #[error("cannot write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Receives final results.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, index: usize, result: SourceResult) -> Result<(), SinkError>;
}

// ── DirectorySink ────────────────────────────────────────────────────────

/// Writes one text file per input into a directory.
///
/// Each input `a/b/report.pdf` becomes `<dir>/report.<ext>`. Inputs sharing
/// a stem get their index appended (`report-3.txt`) so no file is clobbered.
pub struct DirectorySink {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl DirectorySink {
    /// `names` are the input names in batch order; `extension` excludes the dot.
    pub fn new(dir: impl Into<PathBuf>, names: &[impl AsRef<str>], extension: &str) -> Self {
        let dir = dir.into();
        let mut taken = HashSet::new();
        let files = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let stem = file_stem(name.as_ref());
                let mut file = format!("{stem}.{extension}");
                let mut suffix = i;
                // A suffixed name may itself be a later input's real stem.
                while !taken.insert(file.clone()) {
                    file = format!("{stem}-{suffix}.{extension}");
                    suffix += 1;
                }
                dir.join(file)
            })
            .collect();
        Self { dir, files }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Destination of input `index`.
    pub fn path_for(&self, index: usize) -> Option<&Path> {
        self.files.get(index).map(PathBuf::as_path)
    }
}

fn file_stem(name: &str) -> String {
    // Names may be URLs or paths; keep only the last segment.
    let last = name
        .rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or(name);
    let stem = Path::new(last)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(last);
    if stem.is_empty() {
        "output".to_string()
    } else {
        stem.to_string()
    }
}

#[async_trait]
impl Sink for DirectorySink {
    async fn deliver(&self, index: usize, result: SourceResult) -> Result<(), SinkError> {
        let path = self
            .path_for(index)
            .ok_or(SinkError::UnknownIndex(index))?
            .to_path_buf();
        let write_err = |source| SinkError::Write {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(write_err)?;

        // Atomic write: write to temp, then rename
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, result.text.as_bytes())
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(write_err)?;

        debug!("wrote {}", path.display());
        Ok(())
    }
}

// ── MemorySink ───────────────────────────────────────────────────────────

/// Collects results in memory, keyed by input index.
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<BTreeMap<usize, SourceResult>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in index order.
    pub fn results(&self) -> BTreeMap<usize, SourceResult> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.delivered.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn deliver(&self, index: usize, result: SourceResult) -> Result<(), SinkError> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(index, result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn result(text: &str) -> SourceResult {
        SourceResult {
            text: text.into(),
            ..Default::default()
        }
    }

    #[test]
    fn stems_are_unique() {
        let sink = DirectorySink::new(
            "/out",
            &["scans/report.pdf", "report.png", "https://x.org/files/memo.pdf", "notes"],
            "txt",
        );
        assert_eq!(sink.path_for(0), Some(Path::new("/out/report.txt")));
        assert_eq!(sink.path_for(1), Some(Path::new("/out/report-1.txt")));
        assert_eq!(sink.path_for(2), Some(Path::new("/out/memo.txt")));
        assert_eq!(sink.path_for(3), Some(Path::new("/out/notes.txt")));
        assert_eq!(sink.path_for(4), None);
    }

    #[test]
    fn suffixed_names_never_collide_with_real_stems() {
        let names = ["report.pdf", "report.png", "report-1.pdf", "report-1.tif"];
        let sink = DirectorySink::new("/out", &names, "txt");
        let paths: Vec<_> = (0..names.len()).map(|i| sink.path_for(i).unwrap()).collect();
        assert_eq!(paths[0], Path::new("/out/report.txt"));
        assert_eq!(paths[1], Path::new("/out/report-1.txt"));
        assert_eq!(paths[2], Path::new("/out/report-1-2.txt"));
        assert_eq!(paths[3], Path::new("/out/report-1-3.txt"));
        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), names.len(), "two inputs share one output file");
    }

    #[tokio::test]
    async fn directory_sink_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let sink = DirectorySink::new(&out, &["a.pdf", "b.png"], "md");
        assert_ok!(sink.deliver(1, result("hello")).await);

        let written = std::fs::read_to_string(out.join("b.md")).unwrap();
        assert_eq!(written, "hello");
        assert!(!out.join("a.md").exists());
        assert!(!out.join("b.tmp").exists());
    }

    #[tokio::test]
    async fn unknown_index_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path(), &["a.pdf"], "txt");
        let err = assert_err!(sink.deliver(7, result("x")).await);
        assert!(matches!(err, SinkError::UnknownIndex(7)));
    }

    #[tokio::test]
    async fn memory_sink_keeps_index_order() {
        let sink = MemorySink::new();
        assert_ok!(sink.deliver(2, result("c")).await);
        assert_ok!(sink.deliver(0, result("a")).await);
        let got: Vec<_> = sink.results().into_iter().map(|(i, r)| (i, r.text)).collect();
        assert_eq!(got, vec![(0, "a".to_string()), (2, "c".to_string())]);
    }
}
