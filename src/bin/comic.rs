//! Comic panel series CLI.
//!
//! Generates one still panel per prompt, with optional per-panel variants,
//! and writes them as numbered PNGs. Prompts come from `--prompts`
//! (semicolon or newline separated) or `--prompts-file` (one per line).
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin comic -- \
//!     --prompts "a city skyline at dawn; a hero leaps across rooftops" \
//!     --style "comic book style, bold ink, halftone" \
//!     --out-dir out/comic
//! ```

use anyhow::{Context, Result};
use candle_core::Device;
use candle_studio::frames::normalize_sequence;
use candle_studio::pipeline::{FramePipeline, GenerationRequest, ProceduralPipeline};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate a series of comic panels from prompts")]
struct Args {
    /// Semicolon or newline separated prompts, one per panel
    #[arg(long)]
    prompts: Option<String>,

    /// Path to a text file with one prompt per line
    #[arg(long)]
    prompts_file: Option<PathBuf>,

    /// Style prefix applied to every panel prompt
    #[arg(long)]
    style: Option<String>,

    /// Negative prompt applied to all panels
    #[arg(long)]
    negative: Option<String>,

    /// Panel width in pixels
    #[arg(long, default_value = "512")]
    width: usize,

    /// Panel height in pixels
    #[arg(long, default_value = "512")]
    height: usize,

    /// Number of inference steps
    #[arg(long, default_value = "25")]
    steps: usize,

    /// Guidance scale
    #[arg(long, default_value = "7.5")]
    guidance: f64,

    /// Base seed; panels and variants get deterministic offsets
    #[arg(long)]
    seed: Option<u64>,

    /// Number of variants to generate per panel
    #[arg(long, default_value = "1")]
    variants: usize,

    /// Directory the panels are written into
    #[arg(long, default_value = "out/comic")]
    out_dir: PathBuf,

    /// Use CPU instead of CUDA
    #[arg(long)]
    cpu: bool,
}

/// Collect panel prompts from the file or inline argument.
fn parse_prompts(args: &Args) -> Result<Vec<String>> {
    let prompts: Vec<String> = if let Some(path) = &args.prompts_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompts file {path:?}"))?;
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        args.prompts
            .as_deref()
            .unwrap_or("")
            .replace('\n', ";")
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    };
    if prompts.is_empty() {
        anyhow::bail!("no prompts provided; pass --prompts or --prompts-file");
    }
    Ok(prompts)
}

/// Deterministic seed for panel `i`, variant `k`. Single-variant runs keep
/// the plain `base + panel` offset so older invocations stay reproducible.
fn panel_seed(base: Option<u64>, panel: usize, variant: usize, variants: usize) -> Option<u64> {
    base.map(|s| {
        if variants > 1 {
            s + (panel * 1000 + variant) as u64
        } else {
            s + panel as u64
        }
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("candle_studio=info".parse()?)
                .add_directive("comic=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let prompts = parse_prompts(&args)?;
    let variants = args.variants.max(1);

    info!("Comic Panel Generator");
    info!(
        "{} panels at {}x{}, {} variant(s) each",
        prompts.len(),
        args.width,
        args.height,
        variants
    );

    let device = if args.cpu {
        info!("Using CPU");
        Device::Cpu
    } else {
        match Device::cuda_if_available(0) {
            Ok(device) => {
                info!("Using CUDA device 0");
                device
            }
            Err(e) => {
                warn!("CUDA not available: {}, falling back to CPU", e);
                Device::Cpu
            }
        }
    };

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {:?}", args.out_dir))?;

    let pipeline = ProceduralPipeline::new(device);
    let mut written = 0usize;

    for (i, prompt) in prompts.iter().enumerate() {
        for k in 0..variants {
            let request = GenerationRequest {
                prompt: prompt.clone(),
                negative_prompt: args.negative.clone(),
                style: args.style.clone(),
                num_frames: 1,
                width: args.width,
                height: args.height,
                steps: args.steps,
                guidance_scale: args.guidance,
                seed: panel_seed(args.seed, i, k, variants),
            };

            let panel = pipeline.generate(&request)?;
            let frames = normalize_sequence(vec![panel])?;
            let frame = frames
                .first()
                .context("pipeline returned an empty panel")?;

            let suffix = if variants > 1 {
                format!("_{:02}", k + 1)
            } else {
                String::new()
            };
            let path = args.out_dir.join(format!("panel_{:02}{suffix}.png", i + 1));
            image::save_buffer(
                &path,
                frame.as_bytes(),
                frame.width(),
                frame.height(),
                image::ColorType::Rgb8,
            )?;
            written += 1;
        }
        info!("panel {}/{}: {prompt}", i + 1, prompts.len());
    }

    info!("Saved {written} panels -> {}", args.out_dir.display());
    Ok(())
}
