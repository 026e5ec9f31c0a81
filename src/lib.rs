//! Candle-Studio: generation utilities for Candle-based diffusion pipelines.
//!
//! This crate provides the orchestration layer around an external inference
//! pipeline: revision-pinned model snapshot downloads with an integrity
//! lockfile, normalization of raw frame tensors into 8-bit RGB, and video
//! export with graceful degradation to still-image sequences.

pub mod export;
pub mod frames;
pub mod pipeline;
pub mod snapshot;
pub mod utils;

pub use export::{ExportOutcome, Exporter};
pub use frames::{flatten_stacks, normalize, normalize_sequence, NormalizedFrame};
pub use pipeline::{FramePipeline, GenerationRequest, ProceduralPipeline};
