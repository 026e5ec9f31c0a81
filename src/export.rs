//! Frame-sequence export with prioritized capability fallback.
//!
//! Encoding capabilities are an explicit ordered list of [`VideoBackend`]s
//! rather than implicit try/catch control flow: the in-process GIF encoder
//! for `.gif` targets, then an external `ffmpeg` binary for everything else.
//! A backend that is unavailable, does not apply to the target, or fails to
//! encode is skipped; the terminal fallback writes the sequence as numbered
//! PNG stills next to the requested target and never produces a video file.
//!
//! The caller learns which artifact was actually written through
//! [`ExportOutcome`]; degradation is not an error.

use crate::frames::NormalizedFrame;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Errors surfaced by export. Capability gaps are not errors; these are the
/// unrecoverable cases (bad input sequence, I/O on the terminal stills path)
/// plus per-backend failures reported internally before falling through.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no frames to export")]
    NoFrames,

    #[error("frame {index} is {got_w}x{got_h}, sequence started at {want_w}x{want_h}")]
    MismatchedFrame {
        index: usize,
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },

    #[error("{encoder} exited with {status}")]
    EncoderFailed {
        encoder: &'static str,
        status: std::process::ExitStatus,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("gif encoding failed: {0}")]
    Gif(#[from] gif::EncodingError),
}

/// What an export call actually produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// A single video file at the requested target path.
    Video {
        backend: &'static str,
        path: PathBuf,
    },
    /// Numbered PNG stills in `dir`; no video file was written.
    ImageSequence { dir: PathBuf, count: usize },
}

/// One encoding capability in the fallback chain.
pub trait VideoBackend {
    fn name(&self) -> &'static str;

    /// Whether the capability exists on this system at all. Checked once per
    /// export call, before encoding is attempted.
    fn available(&self) -> bool {
        true
    }

    /// Whether this backend can produce the container implied by `target`.
    fn supports(&self, target: &Path) -> bool {
        let _ = target;
        true
    }

    fn encode(
        &self,
        frames: &[NormalizedFrame],
        target: &Path,
        fps: u32,
    ) -> Result<(), ExportError>;
}

/// In-process animated GIF encoder. Applies to `.gif` targets only; always
/// available since it is compiled in.
#[derive(Debug, Default)]
pub struct GifBackend;

impl VideoBackend for GifBackend {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn supports(&self, target: &Path) -> bool {
        target
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("gif"))
    }

    fn encode(
        &self,
        frames: &[NormalizedFrame],
        target: &Path,
        fps: u32,
    ) -> Result<(), ExportError> {
        use gif::{Encoder, Repeat};
        use rayon::prelude::*;

        let (w, h) = check_uniform(frames)?;
        if let Some(parent) = nonempty_parent(target) {
            std::fs::create_dir_all(parent)?;
        }

        // gif delays are in 10ms units
        let delay = (100 / fps).max(1) as u16;

        let mut file = std::fs::File::create(target)?;
        let mut encoder = Encoder::new(&mut file, w as u16, h as u16, &[])?;
        encoder.set_repeat(Repeat::Infinite)?;

        // Palette quantization dominates; run it in parallel, write in order.
        let quantized: Vec<_> = frames
            .par_iter()
            .map(|f| {
                let mut frame = gif::Frame::from_rgb_speed(w as u16, h as u16, f.as_bytes(), 30);
                frame.delay = delay;
                frame
            })
            .collect();

        for frame in quantized {
            encoder.write_frame(&frame)?;
        }
        Ok(())
    }
}

/// External `ffmpeg` encoder invoked as a subprocess. The still sequence is
/// staged in a temporary directory beside the target and removed after the
/// mux, so a successful export leaves exactly one file.
#[derive(Debug)]
pub struct FfmpegBackend {
    program: String,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
        }
    }
}

impl FfmpegBackend {
    /// Use a non-PATH encoder binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl VideoBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn available(&self) -> bool {
        // Only a failure to spawn counts as missing; any exit status means
        // the binary exists.
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    fn encode(
        &self,
        frames: &[NormalizedFrame],
        target: &Path,
        fps: u32,
    ) -> Result<(), ExportError> {
        let parent = nonempty_parent(target).unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".frames-")
            .tempdir_in(parent)?;
        write_png_sequence(frames, staging.path())?;

        let status = Command::new(&self.program)
            .arg("-y")
            .args(["-framerate", &fps.to_string()])
            .arg("-i")
            .arg(staging.path().join("frame_%04d.png"))
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .arg(target)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;

        if !status.success() {
            return Err(ExportError::EncoderFailed {
                encoder: "ffmpeg",
                status,
            });
        }
        Ok(())
    }
}

/// Ordered list of encoding capabilities with a stills-sequence terminal
/// fallback.
pub struct Exporter {
    backends: Vec<Box<dyn VideoBackend>>,
}

impl Default for Exporter {
    fn default() -> Self {
        Self {
            backends: vec![
                Box::new(GifBackend),
                Box::new(FfmpegBackend::default()),
            ],
        }
    }
}

impl Exporter {
    /// Build an exporter with an explicit backend chain. An empty chain goes
    /// straight to the stills fallback.
    pub fn with_backends(backends: Vec<Box<dyn VideoBackend>>) -> Self {
        Self { backends }
    }

    /// Encode `frames` to `target` through the first backend that applies and
    /// succeeds, degrading to a `<stem>_frames/` PNG sequence when no video
    /// capability is usable. `fps` is floored to 1.
    pub fn export(
        &self,
        frames: &[NormalizedFrame],
        target: &Path,
        fps: u32,
    ) -> Result<ExportOutcome, ExportError> {
        if frames.is_empty() {
            return Err(ExportError::NoFrames);
        }
        let fps = fps.max(1);

        for backend in &self.backends {
            if !backend.supports(target) {
                debug!("encoder {} does not apply to {:?}", backend.name(), target);
                continue;
            }
            if !backend.available() {
                debug!("encoder {} unavailable", backend.name());
                continue;
            }
            match backend.encode(frames, target, fps) {
                Ok(()) => {
                    info!(
                        "wrote {} frames to {:?} via {}",
                        frames.len(),
                        target,
                        backend.name()
                    );
                    return Ok(ExportOutcome::Video {
                        backend: backend.name(),
                        path: target.to_path_buf(),
                    });
                }
                Err(err) => {
                    debug!("encoder {} failed, trying next: {err}", backend.name());
                }
            }
        }

        let dir = stills_dir_for(target);
        write_png_sequence(frames, &dir)?;
        info!("no video encoder usable, wrote {} stills to {:?}", frames.len(), dir);
        Ok(ExportOutcome::ImageSequence {
            dir,
            count: frames.len(),
        })
    }
}

/// Directory used for the stills fallback of `target`: a sibling named after
/// the target's stem, e.g. `out/v.mp4` -> `out/v_frames`.
pub fn stills_dir_for(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    target.with_file_name(format!("{stem}_frames"))
}

/// Write every frame as `frame_%04d.png` into `dir` (created if missing), in
/// sequence order. Returns the written paths.
pub fn write_png_sequence(
    frames: &[NormalizedFrame],
    dir: &Path,
) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        let path = dir.join(format!("frame_{i:04}.png"));
        image::save_buffer(
            &path,
            frame.as_bytes(),
            frame.width(),
            frame.height(),
            image::ColorType::Rgb8,
        )?;
        written.push(path);
    }
    Ok(written)
}

fn check_uniform(frames: &[NormalizedFrame]) -> Result<(u32, u32), ExportError> {
    let first = frames.first().ok_or(ExportError::NoFrames)?;
    let (want_w, want_h) = first.dimensions();
    for (index, frame) in frames.iter().enumerate().skip(1) {
        let (got_w, got_h) = frame.dimensions();
        if (got_w, got_h) != (want_w, want_h) {
            return Err(ExportError::MismatchedFrame {
                index,
                got_w,
                got_h,
                want_w,
                want_h,
            });
        }
    }
    Ok((want_w, want_h))
}

fn nonempty_parent(target: &Path) -> Option<&Path> {
    target.parent().filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stills_dir_is_sibling_of_target() {
        assert_eq!(
            stills_dir_for(Path::new("out/v.mp4")),
            PathBuf::from("out/v_frames")
        );
        assert_eq!(
            stills_dir_for(Path::new("clip.gif")),
            PathBuf::from("clip_frames")
        );
    }

    #[test]
    fn gif_backend_applies_to_gif_targets_only() {
        let backend = GifBackend;
        assert!(backend.supports(Path::new("out/anim.gif")));
        assert!(backend.supports(Path::new("out/anim.GIF")));
        assert!(!backend.supports(Path::new("out/anim.mp4")));
        assert!(!backend.supports(Path::new("out/anim")));
    }
}
