//! Text extraction (OCR) collaborators.
//!
//! The pipeline only needs "image file in, text out", expressed by the
//! [`TextExtractor`] trait. Implementations:
//! - **[`NullExtractor`]**: never produces text; used when OCR is disabled
//!   and in tests.
//! - **[`TesseractExtractor`]**: shells out to the `tesseract` CLI.
//!
//! Errors returned here are never fatal to an ingest: the pipeline logs
//! them and records the document without text.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use crate::config::OcrConfig;

/// Turns a stored image into text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Engine identifier, e.g. `"tesseract"`.
    fn name(&self) -> &str;

    /// Extracts text from the image at `image_path`.
    ///
    /// An empty string means the engine ran but found no text.
    async fn extract(&self, image_path: &Path) -> Result<String>;
}

/// Extractor that finds no text.
pub struct NullExtractor;

#[async_trait]
impl TextExtractor for NullExtractor {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn extract(&self, _image_path: &Path) -> Result<String> {
        Ok(String::new())
    }
}

/// Runs `tesseract <image> stdout -l <language>`.
pub struct TesseractExtractor {
    command: String,
    language: String,
}

impl TesseractExtractor {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn extract(&self, image_path: &Path) -> Result<String> {
        let output = Command::new(&self.command)
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .await
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} failed: {}", self.command, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Builds the extractor selected by `[ocr].engine`.
pub fn create_extractor(config: &OcrConfig) -> Result<Box<dyn TextExtractor>> {
    match config.engine.as_str() {
        "disabled" => Ok(Box::new(NullExtractor)),
        "tesseract" => Ok(Box::new(TesseractExtractor::new(
            config.command.clone(),
            config.language.clone(),
        ))),
        other => bail!("Unknown OCR engine: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_extractor_finds_nothing() {
        let text = NullExtractor.extract(Path::new("missing.jpg")).await.unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let ocr = TesseractExtractor::new("homedocs-no-such-ocr-binary", "eng");
        let err = ocr.extract(Path::new("x.jpg")).await.unwrap_err();
        assert!(err.to_string().contains("Is it installed"));
    }

    #[test]
    fn factory_follows_config() {
        let mut cfg = OcrConfig::default();
        assert_eq!(create_extractor(&cfg).unwrap().name(), "disabled");
        cfg.engine = "tesseract".to_string();
        assert_eq!(create_extractor(&cfg).unwrap().name(), "tesseract");
        cfg.engine = "other".to_string();
        assert!(create_extractor(&cfg).is_err());
    }
}
