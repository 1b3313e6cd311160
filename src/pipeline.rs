//! Per-upload image pipeline.
//!
//! Steps run strictly in this order:
//!
//! 1. **Persist** the uploaded bytes at the allocated address. This is the
//!    durability point; failure aborts the ingest.
//! 2. **Preprocess** (optional): grayscale + adaptive threshold. The result
//!    is written next to the original, or over it when
//!    `retain_original = false`. Failure is logged and skipped.
//! 3. **Thumbnail** into `previews/` under a fresh token. Failure aborts the
//!    ingest, but the original written in step 1 stays on disk.
//! 4. **OCR** on the preprocessed image when there is one. Errors and empty
//!    output both leave the record without text.
//! 5. **Summarize** the OCR text, only when there is some. Errors leave the
//!    record without a summary.

use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::address::{self, Address};
use crate::config::PipelineConfig;
use crate::error::{HomeDocsError, Result};
use crate::extract::TextExtractor;
use crate::imaging;
use crate::models::JPEG_EXTENSION;
use crate::summarize::Summarizer;

/// Directory under the root holding thumbnails.
pub const PREVIEWS_DIR: &str = "previews";

/// Suffix of the binarized derivative kept beside a retained original.
pub const PROCESSED_SUFFIX: &str = ".processed.png";

/// Artifacts produced for one upload.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub original_path: PathBuf,
    pub processed_path: Option<PathBuf>,
    pub thumbnail_path: PathBuf,
    pub ocr_text: Option<String>,
    pub summary_text: Option<String>,
    /// Hex SHA-256 of the stored original; `None` once it was overwritten.
    pub sha256: Option<String>,
}

pub struct ImagePipeline {
    root: PathBuf,
    config: PipelineConfig,
    extractor: Arc<dyn TextExtractor>,
    summarizer: Arc<dyn Summarizer>,
}

impl ImagePipeline {
    pub fn new(
        root: impl Into<PathBuf>,
        config: PipelineConfig,
        extractor: Arc<dyn TextExtractor>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            extractor,
            summarizer,
        }
    }

    pub fn previews_dir(&self) -> PathBuf {
        self.root.join(PREVIEWS_DIR)
    }

    pub async fn run(&self, address: &Address, bytes: &[u8]) -> Result<PipelineOutput> {
        persist(&address.path, bytes)?;
        let sha256 = hex::encode(Sha256::digest(bytes));

        let decoded = imaging::decode(bytes);

        let processed = match (&decoded, self.config.preprocess) {
            (Ok(img), true) => self.preprocess(address, img),
            (Err(e), true) => {
                tracing::warn!(path = %address.path.display(), error = %e, "preprocessing skipped");
                None
            }
            (_, false) => None,
        };

        let img = decoded.map_err(|e| HomeDocsError::Thumbnail {
            original: address.path.clone(),
            reason: format!("{:#}", e),
        })?;
        let thumbnail_path = self.write_thumbnail(address, &img)?;

        let ocr_source = processed.as_deref().unwrap_or(address.path.as_path());
        let ocr_text = self.extract_text(ocr_source).await;

        let summary_text = match &ocr_text {
            Some(text) => self.summarize(text).await,
            None => None,
        };

        let overwritten = processed.as_ref() == Some(&address.path);
        let processed_path = processed.filter(|_| !overwritten);
        let sha256 = (!overwritten).then_some(sha256);

        Ok(PipelineOutput {
            original_path: address.path.clone(),
            processed_path,
            thumbnail_path,
            ocr_text,
            summary_text,
            sha256,
        })
    }

    /// Returns the path OCR should read, or `None` if nothing was written.
    fn preprocess(&self, address: &Address, img: &DynamicImage) -> Option<PathBuf> {
        let binary = DynamicImage::ImageLuma8(imaging::binarize(
            img,
            self.config.threshold_block_size,
            self.config.threshold_offset,
        ));

        let (target, format) = if self.config.retain_original {
            (processed_path_for(&address.path, &address.token), ImageFormat::Png)
        } else {
            (address.path.clone(), ImageFormat::Jpeg)
        };

        let written = imaging::encode(&binary, format).and_then(|data| {
            std::fs::write(&target, data).map_err(anyhow::Error::from)
        });
        match written {
            Ok(()) => Some(target),
            Err(e) => {
                tracing::warn!(path = %target.display(), error = %e, "preprocessing failed");
                None
            }
        }
    }

    fn write_thumbnail(&self, address: &Address, img: &DynamicImage) -> Result<PathBuf> {
        let data = imaging::make_thumbnail(img, self.config.thumbnail_size).map_err(|e| {
            HomeDocsError::Thumbnail {
                original: address.path.clone(),
                reason: format!("{:#}", e),
            }
        })?;

        let dir = self.previews_dir();
        std::fs::create_dir_all(&dir).map_err(|e| HomeDocsError::storage_write(&dir, e))?;
        let path = dir.join(format!("{}{}", address::generate_token(), JPEG_EXTENSION));
        std::fs::write(&path, data).map_err(|e| HomeDocsError::storage_write(&path, e))?;
        Ok(path)
    }

    async fn extract_text(&self, image_path: &Path) -> Option<String> {
        match self.extractor.extract(image_path).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                tracing::info!(path = %image_path.display(), "no text found");
                None
            }
            Err(e) => {
                tracing::warn!(
                    path = %image_path.display(),
                    engine = self.extractor.name(),
                    error = %e,
                    "text extraction failed"
                );
                None
            }
        }
    }

    async fn summarize(&self, text: &str) -> Option<String> {
        match self.summarizer.summarize(text).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(
                    provider = self.summarizer.name(),
                    error = %e,
                    "summarization failed"
                );
                None
            }
        }
    }
}

fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| HomeDocsError::storage_write(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| HomeDocsError::storage_write(path, e))
}

fn processed_path_for(original: &Path, token: &str) -> PathBuf {
    original.with_file_name(format!("{}{}", token, PROCESSED_SUFFIX))
}
