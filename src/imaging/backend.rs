//! Raster backend trait and shared types.
//!
//! The [`RasterBackend`] trait is the drawing surface the frame pipeline
//! talks to. It mirrors the handful of primitives a 2D canvas offers:
//!
//! | Primitive | Method |
//! |---|---|
//! | Decode a bitmap | [`load`](RasterBackend::load), [`decode`](RasterBackend::decode) |
//! | Resampling blit + colour filter | [`draw_frame`](RasterBackend::draw_frame) |
//! | Pixel readback | [`read_pixels`](RasterBackend::read_pixels) |
//! | Pixel write-back | [`put_pixels`](RasterBackend::put_pixels) |
//! | Nearest-neighbour scale | [`scale_nearest`](RasterBackend::scale_nearest) |
//! | Encode | [`encode`](RasterBackend::encode) |
//!
//! Readback is the expensive primitive, so the pipeline only calls it when a
//! stage actually needs to inspect pixels. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::calculations::SourceRect;
use super::params::{ColorAdjust, EncodeFormat};
use image::RgbaImage;
use std::path::Path;
use thiserror::Error;

/// Largest surface the backends will allocate (16384 × 16384).
pub const MAX_SURFACE_PIXELS: u64 = 16_384 * 16_384;

/// The source bitmap could not be decoded.
#[derive(Error, Debug)]
#[error("failed to decode {origin}: {reason}")]
pub struct LoadError {
    /// Path or label of the bitmap.
    pub origin: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("cannot allocate a {width}x{height} surface")]
    Allocation { width: u64, height: u64 },
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Allocate a zeroed (fully transparent) RGBA surface.
///
/// Fails with [`BackendError::Allocation`] instead of aborting when the size
/// overflows, exceeds [`MAX_SURFACE_PIXELS`] or the allocator refuses.
pub fn allocate_rgba(width: u32, height: u32) -> Result<RgbaImage, BackendError> {
    let too_big = || BackendError::Allocation {
        width: width.into(),
        height: height.into(),
    };
    if width as u64 * height as u64 > MAX_SURFACE_PIXELS {
        return Err(too_big());
    }
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(too_big)?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| too_big())?;
    buf.resize(len, 0);
    RgbaImage::from_raw(width, height, buf).ok_or_else(too_big)
}

/// Trait for raster backends.
///
/// Every method is fallible so allocation and codec failures surface as a
/// single terminal error for the export that hit them.
pub trait RasterBackend: Sync {
    /// Decode a bitmap from disk into RGBA8.
    fn load(&self, path: &Path) -> Result<RgbaImage, BackendError>;

    /// Decode an in-memory bitmap into RGBA8.
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, BackendError>;

    /// Resample `rect` of `source` onto a `side × side` surface with
    /// nearest-neighbour sampling, then run the colour pass.
    ///
    /// `target` is reused when it already has the right size.
    fn draw_frame(
        &self,
        source: &RgbaImage,
        rect: SourceRect,
        side: u32,
        adjust: &ColorAdjust,
        target: &mut RgbaImage,
    ) -> Result<(), BackendError>;

    /// Copy a surface's pixels out for inspection.
    fn read_pixels(&self, surface: &RgbaImage) -> Result<Vec<u8>, BackendError>;

    /// Overwrite a surface with pixels previously read from it.
    fn put_pixels(&self, surface: &mut RgbaImage, pixels: &[u8]) -> Result<(), BackendError>;

    /// Scale to `width × height` without smoothing.
    fn scale_nearest(
        &self,
        image: &RgbaImage,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, BackendError>;

    /// Encode to container bytes.
    fn encode(&self, image: &RgbaImage, format: EncodeFormat) -> Result<Vec<u8>, BackendError>;
}
