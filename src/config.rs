//! TOML configuration parsing.
//!
//! The configuration file is loaded once at process start. When it does not
//! exist, [`load_or_create_config`] writes [`DEFAULT_CONFIG_TOML`] to disk
//! first so that the next run finds the same settings.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config document written on first run.
pub const DEFAULT_CONFIG_TOML: &str = r#"app-name = "HomeDocs"
app-version = "1.0"
config-version = "0.1"

[app]
page_title = "HomeDocs"
page_icon = ":shark:"
layout = "centered"
data_path_root = "data"
"#;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "app-name", default = "default_app_name")]
    pub app_name: String,
    #[serde(rename = "app-version", default)]
    pub app_version: Option<String>,
    #[serde(rename = "config-version", default)]
    pub config_version: Option<String>,
    pub app: AppConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub summarize: SummarizeConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub page_title: String,
    pub page_icon: String,
    pub layout: String,
    pub data_path_root: PathBuf,
}

/// Settings for the per-upload image pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_true")]
    pub preprocess: bool,
    /// Keep the uploaded bytes untouched and write the binarized image
    /// next to them. When false the original is overwritten in place.
    #[serde(default = "default_true")]
    pub retain_original: bool,
    #[serde(default = "default_block_size")]
    pub threshold_block_size: u32,
    #[serde(default = "default_offset")]
    pub threshold_offset: i32,
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preprocess: true,
            retain_original: true,
            threshold_block_size: default_block_size(),
            threshold_offset: default_offset(),
            thumbnail_size: default_thumbnail_size(),
        }
    }
}

fn default_app_name() -> String {
    "HomeDocs".to_string()
}
fn default_true() -> bool {
    true
}
fn default_block_size() -> u32 {
    21
}
fn default_offset() -> i32 {
    15
}
fn default_thumbnail_size() -> u32 {
    128
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_engine")]
    pub engine: String,
    #[serde(default = "default_ocr_command")]
    pub command: String,
    #[serde(default = "default_ocr_language")]
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: default_ocr_engine(),
            command: default_ocr_command(),
            language: default_ocr_language(),
        }
    }
}

fn default_ocr_engine() -> String {
    "disabled".to_string()
}
fn default_ocr_command() -> String {
    "tesseract".to_string()
}
fn default_ocr_language() -> String {
    "eng".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizeConfig {
    #[serde(default = "default_summarize_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            provider: default_summarize_provider(),
            model: None,
            max_sentences: default_max_sentences(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_summarize_provider() -> String {
    "disabled".to_string()
}
fn default_max_sentences() -> usize {
    3
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}
fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

impl Config {
    /// Parses and validates a config document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.app.data_path_root.as_os_str().is_empty() {
            anyhow::bail!("app.data_path_root must not be empty");
        }

        let block = self.pipeline.threshold_block_size;
        if block < 3 || block % 2 == 0 {
            anyhow::bail!(
                "pipeline.threshold_block_size must be odd and >= 3 (got {})",
                block
            );
        }
        if self.pipeline.thumbnail_size == 0 {
            anyhow::bail!("pipeline.thumbnail_size must be > 0");
        }

        match self.ocr.engine.as_str() {
            "disabled" | "tesseract" => {}
            other => anyhow::bail!(
                "Unknown OCR engine: '{}'. Must be disabled or tesseract.",
                other
            ),
        }

        match self.summarize.provider.as_str() {
            "disabled" | "lead" => {}
            "openai" => {
                if self.summarize.model.is_none() {
                    anyhow::bail!("summarize.model must be specified when provider is 'openai'");
                }
            }
            other => anyhow::bail!(
                "Unknown summarize provider: '{}'. Must be disabled, lead, or openai.",
                other
            ),
        }
        if self.summarize.max_sentences == 0 {
            anyhow::bail!("summarize.max_sentences must be > 0");
        }

        Ok(())
    }

    /// The storage root for the shard tree, previews, and `map.json`.
    pub fn data_root(&self) -> &Path {
        &self.app.data_path_root
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Config::from_toml_str(&content)
}

/// Loads the config at `path`, writing the default document there first
/// if the file is missing.
pub fn load_or_create_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }
        std::fs::write(path, DEFAULT_CONFIG_TOML)
            .with_context(|| format!("Failed to write default config: {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote default config");
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_document_parses() {
        let cfg = Config::from_toml_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(cfg.app_name, "HomeDocs");
        assert_eq!(cfg.app.page_title, "HomeDocs");
        assert_eq!(cfg.app.page_icon, ":shark:");
        assert_eq!(cfg.app.layout, "centered");
        assert_eq!(cfg.data_root(), Path::new("data"));
        assert!(cfg.pipeline.preprocess);
        assert!(cfg.pipeline.retain_original);
        assert_eq!(cfg.pipeline.threshold_block_size, 21);
        assert_eq!(cfg.pipeline.threshold_offset, 15);
        assert_eq!(cfg.pipeline.thumbnail_size, 128);
        assert_eq!(cfg.ocr.engine, "disabled");
        assert_eq!(cfg.summarize.provider, "disabled");
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conf").join("config.toml");

        let cfg = load_or_create_config(&path).unwrap();
        assert_eq!(cfg.app.page_title, "HomeDocs");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG_TOML);
    }

    #[test]
    fn existing_file_is_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        let custom = DEFAULT_CONFIG_TOML.replace("\"data\"", "\"scans\"");
        std::fs::write(&path, &custom).unwrap();

        let cfg = load_or_create_config(&path).unwrap();
        assert_eq!(cfg.data_root(), Path::new("scans"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), custom);
    }

    #[test]
    fn even_block_size_is_rejected() {
        let doc = format!("{}\n[pipeline]\nthreshold_block_size = 20\n", DEFAULT_CONFIG_TOML);
        let err = Config::from_toml_str(&doc).unwrap_err();
        assert!(err.to_string().contains("threshold_block_size"));
    }

    #[test]
    fn openai_summarizer_requires_model() {
        let doc = format!("{}\n[summarize]\nprovider = \"openai\"\n", DEFAULT_CONFIG_TOML);
        assert!(Config::from_toml_str(&doc).is_err());
    }

    #[test]
    fn unknown_ocr_engine_is_rejected() {
        let doc = format!("{}\n[ocr]\nengine = \"magic\"\n", DEFAULT_CONFIG_TOML);
        let err = Config::from_toml_str(&doc).unwrap_err();
        assert!(err.to_string().contains("Unknown OCR engine"));
    }
}
