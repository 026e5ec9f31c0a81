//! Text-to-video generation CLI.
//!
//! Drives a [`FramePipeline`] from a text prompt, normalizes the raw frame
//! tensors it returns, and exports the clip. When no video encoder is usable
//! the clip degrades to a PNG still sequence next to the requested output.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin t2v -- \
//!     --prompt "a timelapse of clouds over mountains" \
//!     --frames 16 --width 576 --height 320 --fps 8 \
//!     --out out/clouds.mp4
//! ```

use anyhow::Result;
use candle_core::{DType, Device};
use candle_studio::export::{write_png_sequence, ExportOutcome, Exporter};
use candle_studio::frames::normalize_sequence;
use candle_studio::pipeline::{FramePipeline, GenerationRequest, ProceduralPipeline};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// Command line arguments for text-to-video generation
#[derive(Parser, Debug)]
#[command(author, version, about = "Generate a short clip from a text prompt")]
struct Args {
    /// The text prompt describing the clip to generate
    #[arg(short, long)]
    prompt: String,

    /// Negative prompt terms (e.g. "monochrome, low saturation")
    #[arg(long)]
    negative: Option<String>,

    /// Positive style prefix applied to the prompt
    #[arg(long)]
    style: Option<String>,

    /// Number of frames to generate
    #[arg(long, default_value = "16")]
    frames: usize,

    /// Frame width in pixels
    #[arg(long, default_value = "576")]
    width: usize,

    /// Frame height in pixels
    #[arg(long, default_value = "320")]
    height: usize,

    /// Number of inference steps
    #[arg(long, default_value = "20")]
    steps: usize,

    /// Guidance scale
    #[arg(long, default_value = "9.0")]
    guidance: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Frames per second for export
    #[arg(long, default_value = "8")]
    fps: u32,

    /// Output video path; the extension selects the container
    #[arg(short, long, default_value = "out/clip.mp4")]
    out: PathBuf,

    /// Optional directory to also dump PNG frames for debugging
    #[arg(long)]
    save_frames_dir: Option<PathBuf>,

    /// Use CPU instead of CUDA
    #[arg(long)]
    cpu: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("candle_studio=info".parse()?)
                .add_directive("t2v=info".parse()?),
        )
        .init();

    let args = Args::parse();

    info!("Text-to-Video Generator");
    info!("Prompt: {}", args.prompt);
    info!(
        "Clip: {}x{} @ {} frames, {} fps",
        args.width, args.height, args.frames, args.fps
    );
    info!("Inference steps: {}", args.steps);
    info!("Guidance scale: {}", args.guidance);

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

    if args.frames < 1 {
        anyhow::bail!("frames must be at least 1 (got {})", args.frames);
    }

    let request = GenerationRequest {
        prompt: args.prompt.clone(),
        negative_prompt: args.negative.clone(),
        style: args.style.clone(),
        num_frames: args.frames,
        width: args.width,
        height: args.height,
        steps: args.steps,
        guidance_scale: args.guidance,
        seed: args.seed,
    };

    let pipeline = ProceduralPipeline::new(device);
    let clip = pipeline.generate(&request)?;
    info!("Raw clip tensor shape: {:?}", clip.dims());

    // Dynamic-range telemetry: a collapsed range is the first sign of a
    // misbehaving pipeline.
    let flat = clip.flatten_all()?.to_dtype(DType::F32)?;
    let min = flat.min(0)?.to_scalar::<f32>()?;
    let max = flat.max(0)?.to_scalar::<f32>()?;
    info!("Frame value range: [{min:.3}, {max:.3}]");

    let frames = normalize_sequence(vec![clip])?;
    info!("Normalized {} frames", frames.len());

    if let Some(dir) = &args.save_frames_dir {
        let written = write_png_sequence(&frames, dir)?;
        info!("Dumped {} debug frames to {:?}", written.len(), dir);
    }

    match Exporter::default().export(&frames, &args.out, args.fps)? {
        ExportOutcome::Video { backend, path } => {
            info!("Saved ({backend}) -> {}", path.display());
        }
        ExportOutcome::ImageSequence { dir, count } => {
            info!("Saved {count} stills -> {}", dir.display());
        }
    }

    Ok(())
}
