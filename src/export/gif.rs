//! GIF export assembler.
//!
//! Every frame is processed, quantized on its own to a palette sized by the
//! art style, mapped to indices and appended to a [`GifStreamEncoder`].
//! This pass is independent of the pipeline's palette lock: the GIF palette
//! is rebuilt from the processed pixels either way. The one exception is a
//! locked custom palette, which is used as-is.
//!
//! A frame whose quantization fails is still written, mapped onto
//! [`fallback_palette`], so the encoder always receives exactly
//! `rows × cols` frames.

use super::{ExportError, ExportInput, Result};
use crate::config::AnimationSettings;
use crate::imaging::{RasterBackend, process_frame_into};
use crate::palette::{
    Palette, QuantizeError, Quantizer, TRANSPARENT_BELOW, fallback_palette, nearest_indices,
};
use crate::worker::CancelToken;
use image::RgbaImage;
use std::borrow::Cow;
use tracing::{info, warn};

/// One indexed frame handed to a [`GifStreamEncoder`].
#[derive(Debug, Clone, Copy)]
pub struct GifFrame<'a> {
    pub indices: &'a [u8],
    pub width: u16,
    pub height: u16,
    pub palette: &'a Palette,
    pub delay_ms: u32,
    pub transparent_index: Option<u8>,
    /// `-1` plays once, `0` loops forever, `n` repeats `n` times.
    pub repeat: i32,
    /// GIF disposal method, 0–3.
    pub disposal: u8,
}

/// Indexed-frame stream encoder.
pub trait GifStreamEncoder {
    fn write_frame(&mut self, frame: &GifFrame<'_>) -> Result<()>;

    /// Write the trailer. No frames may follow.
    fn finish(&mut self) -> Result<()>;

    /// The finished stream; empty before [`finish`](Self::finish).
    fn bytes(&self) -> &[u8];
}

enum EncoderState {
    Idle,
    Writing(gif::Encoder<Vec<u8>>),
    Finished(Vec<u8>),
}

/// [`GifStreamEncoder`] backed by the `gif` crate. The logical screen is
/// sized from the first frame; every frame carries its own palette.
pub struct GifCrateEncoder {
    state: EncoderState,
}

impl GifCrateEncoder {
    pub fn new() -> Self {
        Self {
            state: EncoderState::Idle,
        }
    }
}

impl Default for GifCrateEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn encoder_error(e: impl std::fmt::Display) -> ExportError {
    ExportError::Encoder(e.to_string())
}

fn disposal_method(code: u8) -> gif::DisposalMethod {
    match code {
        1 => gif::DisposalMethod::Keep,
        2 => gif::DisposalMethod::Background,
        3 => gif::DisposalMethod::Previous,
        _ => gif::DisposalMethod::Any,
    }
}

/// Milliseconds to GIF centiseconds, rounded.
fn centiseconds(ms: u32) -> u16 {
    (ms.saturating_add(5) / 10).min(u16::MAX as u32) as u16
}

impl GifStreamEncoder for GifCrateEncoder {
    fn write_frame(&mut self, frame: &GifFrame<'_>) -> Result<()> {
        if let EncoderState::Idle = self.state {
            let mut encoder = gif::Encoder::new(Vec::new(), frame.width, frame.height, &[])
                .map_err(encoder_error)?;
            match frame.repeat {
                r if r < 0 => {}
                0 => encoder
                    .set_repeat(gif::Repeat::Infinite)
                    .map_err(encoder_error)?,
                n => encoder
                    .set_repeat(gif::Repeat::Finite(n.min(u16::MAX as i32) as u16))
                    .map_err(encoder_error)?,
            }
            self.state = EncoderState::Writing(encoder);
        }
        let EncoderState::Writing(encoder) = &mut self.state else {
            return Err(ExportError::Encoder("frame written after finish".into()));
        };
        let out = gif::Frame {
            width: frame.width,
            height: frame.height,
            delay: centiseconds(frame.delay_ms),
            dispose: disposal_method(frame.disposal),
            transparent: frame.transparent_index,
            palette: Some(frame.palette.to_rgb_bytes()),
            buffer: Cow::Borrowed(frame.indices),
            ..gif::Frame::default()
        };
        encoder.write_frame(&out).map_err(encoder_error)
    }

    fn finish(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, EncoderState::Idle) {
            EncoderState::Writing(encoder) => {
                let bytes = encoder.into_inner().map_err(encoder_error)?;
                self.state = EncoderState::Finished(bytes);
                Ok(())
            }
            EncoderState::Idle => Err(ExportError::Encoder("no frames written".into())),
            finished @ EncoderState::Finished(_) => {
                self.state = finished;
                Ok(())
            }
        }
    }

    fn bytes(&self) -> &[u8] {
        match &self.state {
            EncoderState::Finished(bytes) => bytes,
            _ => &[],
        }
    }
}

/// Floyd–Steinberg error diffusion onto `palette`.
///
/// Transparent pixels take the nearest transparent entry and neither
/// receive nor spread error.
pub fn dither_indices(
    rgba: &[u8],
    width: usize,
    palette: &Palette,
) -> std::result::Result<Vec<u8>, QuantizeError> {
    if width == 0 || rgba.len() % (width * 4) != 0 {
        return Err(QuantizeError::MisalignedInput(rgba.len()));
    }
    let plain = nearest_indices(rgba, palette)?;
    let colors = palette.colors();
    let height = rgba.len() / (width * 4);
    let mut error = vec![[0f32; 3]; width * height];
    let mut out = plain.clone();

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let px = &rgba[i * 4..i * 4 + 4];
            if px[3] < TRANSPARENT_BELOW {
                continue;
            }
            let want = [0usize, 1, 2].map(|c| (px[c] as f32 + error[i][c]).clamp(0.0, 255.0));
            let sample = [want[0].round() as u8, want[1].round() as u8, want[2].round() as u8, 255];
            let index = nearest_indices(&sample, palette)?[0];
            out[i] = index;
            let got = colors[index as usize];
            let diff = [0usize, 1, 2].map(|c| want[c] - got[c] as f32);

            let mut spread = |nx: isize, ny: usize, weight: f32| {
                if nx < 0 || nx as usize >= width || ny >= height {
                    return;
                }
                let j = ny * width + nx as usize;
                for c in 0..3 {
                    error[j][c] += diff[c] * weight;
                }
            };
            let xi = x as isize;
            spread(xi + 1, y, 7.0 / 16.0);
            spread(xi - 1, y + 1, 3.0 / 16.0);
            spread(xi, y + 1, 5.0 / 16.0);
            spread(xi + 1, y + 1, 1.0 / 16.0);
        }
    }
    Ok(out)
}

/// Palette and indices for one frame.
fn index_frame(
    quantizer: &impl Quantizer,
    pixels: &[u8],
    width: usize,
    settings: &AnimationSettings,
    colors: usize,
) -> std::result::Result<(Palette, Vec<u8>), QuantizeError> {
    let palette = match settings.palette_override() {
        Some(custom) => Palette::with_transparent_slot(custom),
        None => quantizer.quantize(pixels, colors)?,
    };
    let indices = if settings.gif_dither {
        dither_indices(pixels, width, &palette)?
    } else {
        quantizer.apply_palette(pixels, &palette)?
    };
    if indices.len() * 4 != pixels.len() {
        return Err(QuantizeError::Library(format!(
            "{} indices for {} pixels",
            indices.len(),
            pixels.len() / 4
        )));
    }
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= palette.len()) {
        return Err(QuantizeError::Library(format!(
            "index {bad} outside a {}-entry palette",
            palette.len()
        )));
    }
    Ok((palette, indices))
}

/// Stream every frame of the sheet into `encoder`, then finish it.
pub fn assemble_gif(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    input: &ExportInput<'_>,
    encoder: &mut impl GifStreamEncoder,
    cancel: &CancelToken,
) -> Result<()> {
    let settings = input.settings;
    let style = input.art.style;
    let side = settings.target_resolution;
    let dim = u16::try_from(side)
        .map_err(|_| ExportError::Encoder(format!("frame side {side} exceeds GIF limits")))?;
    let colors = style.gif_color_count();
    let mut scratch = RgbaImage::new(0, 0);

    for index in 0..settings.frame_count() {
        cancel.check()?;
        process_frame_into(
            backend,
            quantizer,
            input.source,
            index,
            settings,
            style,
            &mut scratch,
        )?;
        let pixels = backend.read_pixels(&scratch)?;

        let (palette, indices) =
            match index_frame(quantizer, &pixels, side as usize, settings, colors) {
                Ok(indexed) => indexed,
                Err(e) => {
                    warn!(frame = index, error = %e, "GIF quantization failed; using fallback palette");
                    let palette = fallback_palette();
                    let indices = nearest_indices(&pixels, &palette).map_err(encoder_error)?;
                    (palette, indices)
                }
            };

        encoder.write_frame(&GifFrame {
            indices: &indices,
            width: dim,
            height: dim,
            palette: &palette,
            delay_ms: settings.frame_duration_ms(),
            transparent_index: palette.has_transparent_slot().then_some(0),
            repeat: settings.gif_repeat,
            disposal: settings.gif_disposal,
        })?;
    }

    cancel.check()?;
    encoder.finish()?;
    info!(frames = settings.frame_count(), colors, "GIF assembled");
    Ok(())
}

/// Encoded GIF bytes for the whole animation.
pub fn export_gif(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    input: &ExportInput<'_>,
    cancel: &CancelToken,
) -> Result<Vec<u8>> {
    let mut encoder = GifCrateEncoder::new();
    assemble_gif(backend, quantizer, input, &mut encoder, cancel)?;
    Ok(encoder.bytes().to_vec())
}
