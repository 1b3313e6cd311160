//! Ingestion façade.
//!
//! [`IngestService`] handles one upload end to end: make sure the shard
//! tree exists, allocate an address, run the [`ImagePipeline`], build the
//! [`DocumentRecord`], and append it to the [`MetadataIndex`].

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::address;
use crate::config::{Config, PipelineConfig};
use crate::error::Result;
use crate::extract::{create_extractor, TextExtractor};
use crate::index::MetadataIndex;
use crate::models::{DocumentRecord, IndexEntry, JPEG_EXTENSION};
use crate::pipeline::ImagePipeline;
use crate::summarize::{create_summarizer, Summarizer};
use crate::tree;

pub struct IngestService {
    root: PathBuf,
    pipeline: ImagePipeline,
    index: MetadataIndex,
}

impl IngestService {
    pub fn new(
        root: impl Into<PathBuf>,
        config: PipelineConfig,
        extractor: Arc<dyn TextExtractor>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let root = root.into();
        Self {
            pipeline: ImagePipeline::new(root.clone(), config, extractor, summarizer),
            index: MetadataIndex::new(root.clone()),
            root,
        }
    }

    /// Wires the collaborators selected in the config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let extractor: Arc<dyn TextExtractor> = Arc::from(create_extractor(&config.ocr)?);
        let summarizer: Arc<dyn Summarizer> = Arc::from(create_summarizer(&config.summarize)?);
        Ok(Self::new(
            config.data_root(),
            config.pipeline.clone(),
            extractor,
            summarizer,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &MetadataIndex {
        &self.index
    }

    /// Builds the shard tree and an empty index. Returns the number of
    /// leaf directories created.
    pub fn prepare(&self) -> Result<usize> {
        let created = tree::ensure_tree(&self.root)?;
        self.index.load()?;
        Ok(created)
    }

    /// Stores one upload and records it in the index.
    pub async fn ingest(
        &self,
        bytes: &[u8],
        original_filename: &str,
        tags: &str,
    ) -> Result<IndexEntry> {
        tree::ensure_tree(&self.root)?;

        let upload_time = Utc::now();
        let address = address::allocate(&self.root, JPEG_EXTENSION)?;
        let out = self.pipeline.run(&address, bytes).await?;

        let record = DocumentRecord {
            id: address.token,
            original_filename: original_filename.to_string(),
            tags: tags.to_string(),
            extension: JPEG_EXTENSION.to_string(),
            full_path: out.original_path.to_string_lossy().into_owned(),
            thumbnail_path: out.thumbnail_path.to_string_lossy().into_owned(),
            upload_time,
            upload_time_zone: "utc".to_string(),
            ocr_text: out.ocr_text,
            summary_text: out.summary_text,
            processed_path: out
                .processed_path
                .map(|p| p.to_string_lossy().into_owned()),
            sha256: out.sha256,
        };

        let index = self.index.clone();
        let pending = record.clone();
        let key = tokio::task::spawn_blocking(move || index.append(pending)).await??;
        tracing::info!(key, id = %record.id, path = %record.full_path, "document ingested");

        Ok(IndexEntry { key, record })
    }

    /// Reads a file from disk and ingests it under its file name.
    pub async fn ingest_file(&self, path: &Path, tags: &str) -> anyhow::Result<IndexEntry> {
        let bytes = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.ingest(&bytes, &name, tags).await?)
    }

    /// Every indexed record.
    pub fn list(&self) -> Result<Vec<IndexEntry>> {
        self.index.all()
    }
}
