//! Pinned model snapshot downloader CLI.
//!
//! Resolves a hub revision to a concrete commit, materializes the matching
//! files under a local models directory and writes a lockfile recording the
//! SHA-256 and size of every file.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin snapshot -- \
//!     --repo stabilityai/stable-diffusion-2-1 \
//!     --revision 5c9d0c0 \
//!     --include "*.safetensors,*.json" \
//!     --dest models
//! ```
//!
//! Authentication for gated repos comes from the standard hub token
//! environment (`HF_TOKEN`) or the cached CLI login.

use anyhow::{Context, Result};
use candle_studio::snapshot::{self, SnapshotRequest};
use clap::Parser;
use hf_hub::api::sync::Api;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Download a revision-pinned model snapshot")]
struct Args {
    /// Repository id, e.g. org/name
    #[arg(long)]
    repo: String,

    /// Tag, branch or commit to pin
    #[arg(long)]
    revision: String,

    /// Comma-separated allow patterns
    #[arg(long, default_value = "*.safetensors,*.json")]
    include: String,

    /// Comma-separated ignore patterns
    #[arg(long)]
    exclude: Option<String>,

    /// Destination base directory
    #[arg(long, default_value = "models")]
    dest: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("candle_studio=info".parse()?)
                .add_directive("snapshot=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let request = SnapshotRequest {
        repo_id: args.repo.clone(),
        revision: args.revision.clone(),
        include: snapshot::parse_patterns(&args.include),
        exclude: snapshot::parse_patterns(args.exclude.as_deref().unwrap_or("")),
        dest: args.dest.clone(),
    };

    let api = Api::new().context("failed to create hub API client")?;
    let manifest = snapshot::fetch(&api, &request)
        .with_context(|| format!("snapshot of {}@{} failed", args.repo, args.revision))?;

    info!("Pinned snapshot -> {}", manifest.dir.display());
    info!("Lockfile -> {}", manifest.lock_path.display());
    info!("Commit: {}", manifest.lock.resolved_commit);
    info!("Files: {}", manifest.lock.files.len());

    Ok(())
}
