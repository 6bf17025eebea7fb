//! Local OCR through the `tesseract` command-line binary.
//!
//! The page is PNG-encoded and piped to `tesseract stdin stdout -l <lang>`;
//! recognised text is read back from stdout. The child is spawned with
//! `kill_on_drop`, so a cancelled or timed-out recognition also terminates
//! the process.

use super::Recognizer;
use crate::error::BackendError;
use crate::model::{Payload, Recognition, Unit};
use crate::pipeline::postprocess::clean_text;
use async_trait::async_trait;
use image::DynamicImage;
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub struct TesseractRecognizer {
    binary: PathBuf,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(binary: PathBuf, language: String) -> Self {
        Self { binary, language }
    }

    fn program(&self) -> String {
        self.binary.display().to_string()
    }

    fn process_error(&self, detail: impl Into<String>) -> BackendError {
        BackendError::Process {
            program: self.program(),
            detail: detail.into(),
        }
    }

    async fn run(&self, png: Vec<u8>) -> Result<String, BackendError> {
        let mut child = Command::new(&self.binary)
            .arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.process_error(format!("cannot start: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.process_error("stdin was not captured"))?;

        // Feed stdin concurrently with draining stdout so neither pipe fills.
        let writer = tokio::spawn(async move {
            stdin.write_all(&png).await?;
            stdin.shutdown().await
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.process_error(e.to_string()))?;

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.process_error(format!("writing image: {e}"))),
            Err(e) => return Err(self.process_error(format!("writer task: {e}"))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.process_error(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, unit: &Unit) -> Result<Recognition, BackendError> {
        let image = match &unit.payload {
            Payload::Image(image) => image,
            Payload::Pdf(_) => {
                return Err(BackendError::UnsupportedPayload(
                    "tesseract reads images only; render PDF pages first".into(),
                ))
            }
        };
        let png = encode_png(image)?;
        debug!("{}: piping {} bytes to {}", unit.id, png.len(), self.program());

        let raw = self.run(png).await?;
        Ok(Recognition::text(clean_text(&raw))
            .with_metadata("backend", "tesseract")
            .with_metadata("language", self.language.clone()))
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| BackendError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UnitId;
    use std::sync::Arc;

    fn recognizer(binary: &str) -> TesseractRecognizer {
        TesseractRecognizer::new(PathBuf::from(binary), "eng".into())
    }

    #[tokio::test]
    async fn pdf_payload_is_rejected() {
        let unit = Unit::new(
            UnitId::new(0, None, "a.pdf"),
            Payload::Pdf(Arc::from(&b"%PDF-1.7"[..])),
        );
        let err = recognizer("tesseract").recognize(&unit).await.unwrap_err();
        assert!(matches!(err, BackendError::UnsupportedPayload(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_a_process_error() {
        let unit = Unit::new(
            UnitId::new(0, None, "a.png"),
            Payload::Image(DynamicImage::new_luma8(4, 4)),
        );
        let err = recognizer("/nonexistent/tesseract-binary")
            .recognize(&unit)
            .await
            .unwrap_err();
        match err {
            BackendError::Process { program, detail } => {
                assert!(program.contains("tesseract-binary"));
                assert!(detail.contains("cannot start"), "got: {detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn png_encoding_has_signature() {
        let png = encode_png(&DynamicImage::new_rgb8(3, 3)).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
    }
}
