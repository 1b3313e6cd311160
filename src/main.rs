//! # HomeDocs CLI (`homedocs`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `homedocs init` | Create the config, shard tree, and empty index |
//! | `homedocs ingest <file>...` | Store images and record them in the index |
//! | `homedocs list` | List every indexed document |
//! | `homedocs get <key-or-id>` | Show one document with its OCR text |
//! | `homedocs check` | Cross-check the index against the filesystem |
//! | `homedocs serve` | Start the HTTP API |
//! | `homedocs completions <shell>` | Print shell completions |
//!
//! The config file is created with defaults when it does not exist yet.
//! Diagnostics are logged to stderr; set `RUST_LOG=info` for more detail.

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use homedocs::config;
use homedocs::ingest::IngestService;
use homedocs::integrity;
use homedocs::list;
use homedocs::progress::{IngestProgressEvent, ProgressMode};
use homedocs::server;

/// HomeDocs: store scanned documents with thumbnails, OCR text, and a
/// JSON metadata index.
#[derive(Parser)]
#[command(name = "homedocs", version, about)]
struct Cli {
    /// Path to the configuration file (TOML). Created with defaults if missing.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the shard tree and an empty index under the data root.
    ///
    /// Idempotent: existing directories and an existing index are kept.
    Init,

    /// Ingest one or more image files.
    Ingest {
        /// Image files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Free-text tags recorded with every file, e.g. "2023 1099 tax form".
        #[arg(long, default_value = "")]
        tags: String,

        /// Progress output on stderr: `auto`, `human`, `json`, or `off`.
        #[arg(long, default_value = "auto", value_parser = ProgressMode::parse)]
        progress: ProgressMode,
    },

    /// List every indexed document.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show one document by index key or id.
    Get {
        /// Index key (e.g. `0`) or document id.
        key: String,
    },

    /// Check that every record's files exist and match their checksums.
    Check,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "homedocs", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_or_create_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let service = IngestService::from_config(&cfg)?;
            let created = service.prepare()?;
            println!("Data root:   {}", service.root().display());
            println!("Shard dirs:  {} created", created);
            println!("Index:       {}", service.index().path().display());
            println!("initialized");
        }
        Commands::Ingest {
            files,
            tags,
            progress,
        } => {
            let service = IngestService::from_config(&cfg)?;
            let reporter = progress.reporter();
            let total = files.len() as u64;
            let mut failed = 0u64;

            for (i, path) in files.iter().enumerate() {
                let n = i as u64 + 1;
                let file = path.display().to_string();
                reporter.report(IngestProgressEvent::Started {
                    file: file.clone(),
                    n,
                    total,
                });
                match service.ingest_file(path, &tags).await {
                    Ok(entry) => {
                        reporter.report(IngestProgressEvent::Stored {
                            file: file.clone(),
                            key: entry.key,
                            n,
                            total,
                        });
                        println!("{}  {}  {}", entry.key, entry.record.id, entry.record.full_path);
                    }
                    Err(e) => {
                        failed += 1;
                        reporter.report(IngestProgressEvent::Failed {
                            file: file.clone(),
                            error: format!("{:#}", e),
                            n,
                            total,
                        });
                        eprintln!("Error: {}: {:#}", file, e);
                    }
                }
            }

            println!("ingested: {}", total - failed);
            if failed > 0 {
                println!("failed: {}", failed);
                std::process::exit(1);
            }
            println!("ok");
        }
        Commands::List { json } => {
            list::run_list(&cfg, json)?;
        }
        Commands::Get { key } => {
            if let Err(e) = list::run_get(&cfg, &key) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Check => {
            if !integrity::run_check(&cfg)? {
                std::process::exit(1);
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
