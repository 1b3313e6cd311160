//! # HomeDocs
//!
//! A local-first store for scanned documents.
//!
//! An uploaded JPEG is written into a sharded directory tree, a thumbnail is
//! derived, text is extracted via OCR and optionally summarized, and the
//! result is recorded in a flat JSON index (`map.json`) that front ends
//! render as a table and gallery.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────────────┐   ┌───────────┐
//! │ CLI / HTTP │──▶│ IngestService                │──▶│ map.json  │
//! └────────────┘   │  address → pipeline → record │   └───────────┘
//!                  └──────────────┬───────────────┘
//!                                 ▼
//!          root/<h>/<h>/<h>/<token>.jpg   root/previews/<token>.jpg
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! homedocs init                               # config, shard tree, index
//! homedocs ingest scan.jpg --tags "2023 1099 tax form"
//! homedocs list
//! homedocs serve                              # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, created with defaults |
//! | [`error`] | Storage and index error type |
//! | [`models`] | Index record types |
//! | [`address`] | Token → shard path |
//! | [`tree`] | 16×16×16 shard tree initialization |
//! | [`imaging`] | Thresholding and thumbnails |
//! | [`extract`] | OCR collaborators |
//! | [`summarize`] | Summarization collaborators |
//! | [`pipeline`] | Per-upload processing steps |
//! | [`index`] | `map.json` read-modify-write under a lock |
//! | [`ingest`] | Ingestion façade |
//! | [`list`] | Query entry point |
//! | [`integrity`] | Storage consistency report |
//! | [`progress`] | Batch ingest progress on stderr |
//! | [`server`] | HTTP API |

pub mod address;
pub mod config;
pub mod error;
pub mod extract;
pub mod imaging;
pub mod index;
pub mod ingest;
pub mod integrity;
pub mod list;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod server;
pub mod summarize;
pub mod tree;
