//! End-to-end test: generate a clip, normalize it, export it.

use candle_core::Device;
use candle_studio::export::{ExportOutcome, Exporter};
use candle_studio::frames::normalize_sequence;
use candle_studio::pipeline::{FramePipeline, GenerationRequest, ProceduralPipeline};

#[test]
fn generate_normalize_and_degrade_to_stills() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let target = tmp.path().join("clip.mp4");

    let mut request = GenerationRequest::new("a timelapse of clouds over mountains");
    request.num_frames = 3;
    request.width = 24;
    request.height = 16;
    request.steps = 8;
    request.seed = Some(7);

    let clip = ProceduralPipeline::new(Device::Cpu).generate(&request)?;
    let frames = normalize_sequence(vec![clip])?;
    assert_eq!(frames.len(), 3);

    // No backends: the chain degrades to a PNG sequence without failing.
    let outcome = Exporter::with_backends(vec![]).export(&frames, &target, 8)?;
    let ExportOutcome::ImageSequence { dir, count } = outcome else {
        panic!("expected a stills degradation");
    };
    assert_eq!(count, 3);
    for i in 0..3 {
        let still = dir.join(format!("frame_{i:04}.png"));
        let decoded = image::open(&still)?.to_rgb8();
        assert_eq!(decoded.dimensions(), (24, 16));
    }
    assert!(!target.exists());
    Ok(())
}

#[test]
fn generate_and_export_gif_clip() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let target = tmp.path().join("clip.gif");

    let mut request = GenerationRequest::new("neon rain on a window");
    request.num_frames = 2;
    request.width = 16;
    request.height = 16;
    request.seed = Some(11);

    let clip = ProceduralPipeline::new(Device::Cpu).generate(&request)?;
    let frames = normalize_sequence(vec![clip])?;

    let outcome = Exporter::default().export(&frames, &target, 8)?;
    assert!(matches!(outcome, ExportOutcome::Video { backend: "gif", .. }));
    assert!(target.is_file());
    Ok(())
}
