//! Frame-tensor normalization.
//!
//! Inference pipelines hand back frame tensors in whatever layout their
//! authors preferred: channel-first or channel-last, grayscale or RGB, with
//! any number of leftover batch/time axes of length 1, as floats in `[0, 1]`
//! or as ready-made bytes. This module collapses all of that into a single
//! canonical form, [`NormalizedFrame`]: `height x width` interleaved 8-bit
//! RGB, directly encodable by the PNG and GIF writers in [`crate::export`].
//!
//! The layout decision is made once per tensor and the resolved variant is
//! rasterized with one deterministic conversion, so shape checks do not leak
//! into the rest of the pipeline.

use candle_core::{DType, IndexOp, Tensor};

/// Errors surfaced by frame normalization.
///
/// Shape ambiguity is never an error; it is resolved by the layout rules.
/// Genuinely malformed tensors (zero-size, unsupported backend ops) propagate
/// from candle unmasked.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame buffer of {len} bytes does not match {width}x{height} RGB")]
    BufferSize {
        width: u32,
        height: u32,
        len: usize,
    },

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

/// A single frame in canonical form: interleaved RGB, 8 bits per channel,
/// row-major from the top-left pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl NormalizedFrame {
    /// Wrap an existing RGB buffer. The buffer length must be exactly
    /// `width * height * 3`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        if data.len() != width as usize * height as usize * 3 {
            return Err(FrameError::BufferSize {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// RGB triple at `(x, y)`. Panics if out of bounds; test helper mostly.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }
}

/// Layout of a raw frame after shape resolution.
///
/// `Interleaved` carries a `(h, w, c)` tensor with `c` of 1 or 3; the
/// single-channel case is replicated to RGB at rasterization time.
#[derive(Debug)]
enum Layout {
    Grayscale(Tensor),
    Interleaved(Tensor),
}

/// Convert one raw frame tensor of arbitrary layout into a [`NormalizedFrame`].
///
/// Resolution order:
/// 1. every length-1 axis is squeezed away;
/// 2. anything still above rank 3 keeps only the trailing three axes (the
///    leading ones are taken to be batch/time leftovers);
/// 3. rank 2 is grayscale;
/// 4. rank 3 moves the channel axis (length 1 or 3, first match wins) to the
///    last position, then replicates single channels to RGB;
/// 5. rank 0/1 stragglers are padded with trailing length-1 axes and re-enter
///    the rank-3 rule.
///
/// Values: NaN maps to 0, +inf to the representable maximum, -inf to the
/// minimum. `U8` passes through untouched; floats are clamped to `[0, 1]` and
/// scaled; other integers are clamped to `[0, 255]`.
pub fn normalize(raw: &Tensor) -> Result<NormalizedFrame, FrameError> {
    rasterize(resolve_layout(raw)?)
}

/// Expand a sequence whose elements may themselves be stacks of frames.
///
/// Each element has its leading length-1 axes squeezed while rank exceeds 3;
/// if rank still exceeds 3 the element is split along the leading axis into
/// that many single frames, preserving order.
pub fn flatten_stacks(frames: Vec<Tensor>) -> Result<Vec<Tensor>, FrameError> {
    let mut flat = Vec::with_capacity(frames.len());
    for mut t in frames {
        while t.rank() > 3 && t.dim(0)? == 1 {
            t = t.squeeze(0)?;
        }
        if t.rank() > 3 && t.dim(0)? > 1 {
            let stack = t.dim(0)?;
            for i in 0..stack {
                flat.push(t.i(i)?);
            }
        } else {
            flat.push(t);
        }
    }
    Ok(flat)
}

/// Flatten stacked elements, then normalize every resulting frame.
pub fn normalize_sequence(frames: Vec<Tensor>) -> Result<Vec<NormalizedFrame>, FrameError> {
    flatten_stacks(frames)?
        .iter()
        .map(normalize)
        .collect()
}

fn resolve_layout(raw: &Tensor) -> Result<Layout, FrameError> {
    let mut t = squeeze_all(raw)?;

    // Leading axes above rank 3 are batch/time leftovers; keep slice 0.
    while t.rank() > 3 {
        t = t.i(0)?;
    }

    match t.rank() {
        2 => Ok(Layout::Grayscale(t)),
        3 => interleave_channels(t),
        _ => {
            // Rank 0 or 1: pad with trailing unit axes and re-enter the
            // rank-3 rule, which treats the trailing axis as a channel.
            while t.rank() < 3 {
                t = t.unsqueeze(t.rank())?;
            }
            interleave_channels(t)
        }
    }
}

fn squeeze_all(raw: &Tensor) -> Result<Tensor, FrameError> {
    let mut t = raw.clone();
    loop {
        let Some(axis) = t.dims().iter().position(|&d| d == 1) else {
            return Ok(t);
        };
        t = t.squeeze(axis)?;
    }
}

/// Move the channel axis of a rank-3 tensor to the last position.
///
/// An axis of length 1 or 3 counts as the channel, earlier axes checked
/// first. A rank-3 tensor with no such axis is not image-like; it degrades by
/// dropping the leading axis and treating the rest as grayscale.
fn interleave_channels(t: Tensor) -> Result<Layout, FrameError> {
    let (d0, d1, d2) = t.dims3()?;
    if d2 == 1 || d2 == 3 {
        return Ok(Layout::Interleaved(t));
    }
    if d0 == 1 || d0 == 3 {
        return Ok(Layout::Interleaved(t.permute((1, 2, 0))?));
    }
    if d1 == 1 || d1 == 3 {
        return Ok(Layout::Interleaved(t.permute((0, 2, 1))?));
    }
    Ok(Layout::Grayscale(t.i(0)?))
}

fn rasterize(layout: Layout) -> Result<NormalizedFrame, FrameError> {
    match layout {
        Layout::Grayscale(t) => {
            let (h, w) = t.dims2()?;
            Ok(replicate_gray(w as u32, h as u32, extract_scaled(&t)?))
        }
        Layout::Interleaved(t) => {
            let (h, w, c) = t.dims3()?;
            let px = extract_scaled(&t)?;
            if c == 3 {
                NormalizedFrame::new(w as u32, h as u32, px)
            } else {
                Ok(replicate_gray(w as u32, h as u32, px))
            }
        }
    }
}

fn replicate_gray(width: u32, height: u32, px: Vec<u8>) -> NormalizedFrame {
    let mut data = Vec::with_capacity(px.len() * 3);
    for v in px {
        data.extend_from_slice(&[v, v, v]);
    }
    NormalizedFrame {
        width,
        height,
        data,
    }
}

/// Pull the tensor contents out as bytes, applying the dtype conversion rules.
fn extract_scaled(t: &Tensor) -> Result<Vec<u8>, FrameError> {
    let flat = t.contiguous()?.flatten_all()?;
    match flat.dtype() {
        DType::U8 => Ok(flat.to_vec1::<u8>()?),
        DType::U32 => Ok(flat
            .to_vec1::<u32>()?
            .into_iter()
            .map(|v| v.min(255) as u8)
            .collect()),
        DType::I64 => Ok(flat
            .to_vec1::<i64>()?
            .into_iter()
            .map(|v| v.clamp(0, 255) as u8)
            .collect()),
        _ => Ok(flat
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?
            .into_iter()
            .map(scale_unit_float)
            .collect()),
    }
}

fn scale_unit_float(v: f32) -> u8 {
    // NaN -> 0, +inf -> top of the unit range, -inf -> bottom.
    let v = if v.is_nan() {
        0.0
    } else if v == f32::INFINITY {
        1.0
    } else if v == f32::NEG_INFINITY {
        0.0
    } else {
        v
    };
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn scale_handles_non_finite_values() {
        assert_eq!(scale_unit_float(f32::NAN), 0);
        assert_eq!(scale_unit_float(f32::INFINITY), 255);
        assert_eq!(scale_unit_float(f32::NEG_INFINITY), 0);
        assert_eq!(scale_unit_float(0.5), 128);
        assert_eq!(scale_unit_float(-2.0), 0);
        assert_eq!(scale_unit_float(7.0), 255);
    }

    #[test]
    fn channel_first_moves_to_last() -> Result<(), FrameError> {
        let t = Tensor::zeros((3, 4, 5), DType::F32, &Device::Cpu)?;
        match interleave_channels(t)? {
            Layout::Interleaved(t) => assert_eq!(t.dims(), &[4, 5, 3]),
            other => panic!("unexpected layout {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn middle_channel_moves_to_last() -> Result<(), FrameError> {
        let t = Tensor::zeros((4, 3, 5), DType::F32, &Device::Cpu)?;
        match interleave_channels(t)? {
            Layout::Interleaved(t) => assert_eq!(t.dims(), &[4, 5, 3]),
            other => panic!("unexpected layout {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn channelless_rank3_degrades_to_grayscale() -> Result<(), FrameError> {
        let t = Tensor::zeros((5, 6, 7), DType::F32, &Device::Cpu)?;
        match interleave_channels(t)? {
            Layout::Grayscale(t) => assert_eq!(t.dims(), &[6, 7]),
            other => panic!("unexpected layout {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn buffer_size_is_checked() {
        let err = NormalizedFrame::new(2, 2, vec![0u8; 5]).unwrap_err();
        assert!(matches!(err, FrameError::BufferSize { len: 5, .. }));
    }
}
