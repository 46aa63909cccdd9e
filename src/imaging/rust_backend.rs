//! Pure Rust raster backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG, WebP) | `image::ImageReader` / `image::load_from_memory` |
//! | Resampling blit | nearest-neighbour over a fractional source rect |
//! | Colour pass | [`filters::apply_color_adjust`](super::filters::apply_color_adjust) |
//! | Encode → PNG / lossless WebP | `image::RgbaImage::write_to` |

use super::backend::{BackendError, LoadError, RasterBackend, allocate_rgba};
use super::calculations::SourceRect;
use super::filters::apply_color_adjust;
use super::params::{ColorAdjust, EncodeFormat};
use image::{ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Source coordinate sampled for each of `dst` destination pixels when
/// stretching the span `[start, start + len)` of a `limit`-pixel axis.
///
/// Samples at destination pixel centres and clamps to the source bounds,
/// so fractional spans never read past the edge.
fn sample_axis(start: f64, len: f64, dst: u32, limit: u32) -> Vec<u32> {
    let step = len / dst as f64;
    let max = limit.saturating_sub(1) as f64;
    (0..dst)
        .map(|d| (start + (d as f64 + 0.5) * step).floor().clamp(0.0, max) as u32)
        .collect()
}

/// Nearest-neighbour blit of `rect` of `source` onto all of `target`.
fn blit_nearest(source: &RgbaImage, rect: SourceRect, target: &mut RgbaImage) {
    let (tw, th) = target.dimensions();
    let xs = sample_axis(rect.x, rect.w, tw, source.width());
    let ys = sample_axis(rect.y, rect.h, th, source.height());
    for (dy, &sy) in ys.iter().enumerate() {
        for (dx, &sx) in xs.iter().enumerate() {
            target.put_pixel(dx as u32, dy as u32, *source.get_pixel(sx, sy));
        }
    }
}

fn copy_out(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    out.try_reserve_exact(pixels.len())
        .map_err(|_| BackendError::Allocation {
            width: width.into(),
            height: height.into(),
        })?;
    out.extend_from_slice(pixels);
    Ok(out)
}

fn image_format(format: EncodeFormat) -> ImageFormat {
    match format {
        EncodeFormat::Png => ImageFormat::Png,
        EncodeFormat::WebP => ImageFormat::WebP,
    }
}

impl RasterBackend for RustBackend {
    fn load(&self, path: &Path) -> Result<RgbaImage, BackendError> {
        let decoded = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| LoadError {
                origin: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(decoded.into_rgba8())
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, BackendError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| LoadError {
            origin: format!("<{} bytes>", bytes.len()),
            reason: e.to_string(),
        })?;
        Ok(decoded.into_rgba8())
    }

    fn draw_frame(
        &self,
        source: &RgbaImage,
        rect: SourceRect,
        side: u32,
        adjust: &ColorAdjust,
        target: &mut RgbaImage,
    ) -> Result<(), BackendError> {
        if source.width() == 0 || source.height() == 0 {
            return Err(BackendError::ProcessingFailed(
                "source bitmap is empty".to_string(),
            ));
        }
        if target.dimensions() != (side, side) {
            *target = allocate_rgba(side, side)?;
        }
        blit_nearest(source, rect, target);
        apply_color_adjust(target, adjust);
        Ok(())
    }

    fn read_pixels(&self, surface: &RgbaImage) -> Result<Vec<u8>, BackendError> {
        copy_out(surface.as_raw(), surface.width(), surface.height())
    }

    fn put_pixels(&self, surface: &mut RgbaImage, pixels: &[u8]) -> Result<(), BackendError> {
        if pixels.len() != surface.as_raw().len() {
            return Err(BackendError::ProcessingFailed(format!(
                "pixel buffer of {} bytes does not fit a {}x{} surface",
                pixels.len(),
                surface.width(),
                surface.height()
            )));
        }
        surface.copy_from_slice(pixels);
        Ok(())
    }

    fn scale_nearest(
        &self,
        image: &RgbaImage,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, BackendError> {
        let mut out = allocate_rgba(width, height)?;
        if image.width() == 0 || image.height() == 0 {
            return Ok(out);
        }
        let whole = SourceRect {
            x: 0.0,
            y: 0.0,
            w: image.width() as f64,
            h: image.height() as f64,
        };
        blit_nearest(image, whole, &mut out);
        Ok(out)
    }

    fn encode(&self, image: &RgbaImage, format: EncodeFormat) -> Result<Vec<u8>, BackendError> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image_format(format))
            .map_err(|e| BackendError::Encode(format!("{}: {e}", format.extension())))?;
        Ok(bytes)
    }
}
