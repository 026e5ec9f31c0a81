//! The inference-pipeline seam.
//!
//! The crate does not implement a diffusion model; it consumes one through
//! [`FramePipeline`]. Implementations return a stacked float tensor shaped
//! the way hosted pipelines emit frames, `(1, T, H, W, 3)` in `[0, 1]`, batch
//! axis included — [`crate::frames`] exists to absorb exactly that shape.
//!
//! [`ProceduralPipeline`] is the built-in model-free implementation: a
//! seeded, fully deterministic synthesizer used by the CLIs when no model
//! integration is wired in, and by the tests. Same request, same bits.

use crate::utils::rng::Pcg32;
use candle_core::{Device, Tensor};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid generation request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

/// Sampling parameters for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    /// Style prefix prepended to the prompt, `"<style>, <prompt>"`.
    pub style: Option<String>,
    pub num_frames: usize,
    pub width: usize,
    pub height: usize,
    pub steps: usize,
    pub guidance_scale: f64,
    /// Defaults to a hash of the composed prompt when unset.
    pub seed: Option<u64>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            style: None,
            num_frames: 1,
            width: 512,
            height: 512,
            steps: 25,
            guidance_scale: 7.5,
            seed: None,
        }
    }

    /// Prompt with the style prefix applied.
    pub fn full_prompt(&self) -> String {
        match self.style.as_deref().filter(|s| !s.is_empty()) {
            Some(style) => format!("{style}, {}", self.prompt),
            None => self.prompt.clone(),
        }
    }

    /// Explicit seed, or a stable hash of the composed prompts.
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            let mut hasher = DefaultHasher::new();
            self.full_prompt().hash(&mut hasher);
            self.negative_prompt.hash(&mut hasher);
            hasher.finish()
        })
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.num_frames == 0 {
            return Err(PipelineError::InvalidRequest(
                "num_frames must be at least 1".to_string(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::InvalidRequest(format!(
                "resolution {}x{} is not drawable",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// A text-conditioned frame source.
pub trait FramePipeline {
    /// Generate the requested clip as a `(1, T, H, W, 3)` float tensor with
    /// values in `[0, 1]`.
    fn generate(&self, request: &GenerationRequest) -> Result<Tensor, PipelineError>;
}

/// Deterministic model-free generator: a drifting three-phase color field
/// with seeded Gaussian grain. Visually distinct per prompt (the seed falls
/// back to a prompt hash), reproducible per seed.
pub struct ProceduralPipeline {
    device: Device,
}

impl ProceduralPipeline {
    pub fn new(device: Device) -> Self {
        Self { device }
    }
}

impl FramePipeline for ProceduralPipeline {
    fn generate(&self, request: &GenerationRequest) -> Result<Tensor, PipelineError> {
        request.validate()?;

        let seed = request.effective_seed();
        let (t, h, w) = (request.num_frames, request.height, request.width);
        debug!("procedural clip: {w}x{h} x{t} frames, seed {seed}");

        let mut rng = Pcg32::new(seed);
        // Per-channel phase offsets keep distinct seeds visually distinct.
        let phase: [f32; 3] = [
            rng.next_f32() * std::f32::consts::TAU,
            rng.next_f32() * std::f32::consts::TAU,
            rng.next_f32() * std::f32::consts::TAU,
        ];
        // More steps, less grain; stronger guidance, harder contrast.
        let grain = 0.35 / (request.steps.max(1) as f32).sqrt();
        let contrast = (request.guidance_scale as f32 / 7.5).clamp(0.25, 2.0);

        let mut data = Vec::with_capacity(t * h * w * 3);
        for frame in 0..t {
            let time = frame as f32 / t as f32;
            for y in 0..h {
                let v = y as f32 / (h.max(2) - 1) as f32;
                for x in 0..w {
                    let u = x as f32 / (w.max(2) - 1) as f32;
                    for c in 0..3 {
                        let wave = (std::f32::consts::TAU * (u + 0.35 * v + time) + phase[c])
                            .sin()
                            * 0.5;
                        let value = 0.5 + wave * contrast + rng.next_gaussian() * grain;
                        data.push(value.clamp(0.0, 1.0));
                    }
                }
            }
        }

        Ok(Tensor::from_vec(data, (1, t, h, w, 3), &self.device)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_prefix_composes() {
        let mut req = GenerationRequest::new("a city skyline at dawn");
        assert_eq!(req.full_prompt(), "a city skyline at dawn");
        req.style = Some("bold ink, halftone".to_string());
        assert_eq!(
            req.full_prompt(),
            "bold ink, halftone, a city skyline at dawn"
        );
    }

    #[test]
    fn unseeded_requests_hash_their_prompt() {
        let a = GenerationRequest::new("clouds over mountains");
        let b = GenerationRequest::new("clouds over mountains");
        let c = GenerationRequest::new("a different prompt");
        assert_eq!(a.effective_seed(), b.effective_seed());
        assert_ne!(a.effective_seed(), c.effective_seed());
    }

    #[test]
    fn zero_frames_is_rejected() {
        let mut req = GenerationRequest::new("x");
        req.num_frames = 0;
        let err = ProceduralPipeline::new(Device::Cpu)
            .generate(&req)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
    }
}
