//! High-level frame operations.
//!
//! These functions combine the grid math, the backend and the pixel filters
//! into the per-frame pipeline every exporter drives:
//!
//! ```text
//! grid rect → resample + colour (backend) → chroma key → sharpen → palette lock
//! ```
//!
//! The three pixel stages share a single readback. When none of them is
//! enabled the frame is exactly what the backend drew and no readback
//! happens at all.

use super::backend::{BackendError, RasterBackend, allocate_rgba};
use super::calculations::{GridError, cell_origin, sheet_dimensions, source_rect};
use super::filters::{apply_chroma_key, sharpen_silhouette};
use super::params::{ChromaKey, ColorAdjust};
use crate::config::AnimationSettings;
use crate::palette::{Quantizer, lock_palette};
use crate::types::PixelStyle;
use image::RgbaImage;
use image::imageops::replace;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type for frame operations.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Side length of every processed frame.
pub fn frame_dimensions(settings: &AnimationSettings) -> (u32, u32) {
    (settings.target_resolution, settings.target_resolution)
}

/// Produce one processed frame in a fresh buffer.
pub fn process_frame(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    source: &RgbaImage,
    index: u32,
    settings: &AnimationSettings,
    style: PixelStyle,
) -> Result<RgbaImage> {
    let mut frame = RgbaImage::new(0, 0);
    process_frame_into(backend, quantizer, source, index, settings, style, &mut frame)?;
    Ok(frame)
}

/// Produce one processed frame into a caller-owned scratch buffer.
///
/// The scratch is resized when its dimensions do not match, so one buffer
/// can serve every frame of an export.
pub fn process_frame_into(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    source: &RgbaImage,
    index: u32,
    settings: &AnimationSettings,
    style: PixelStyle,
    scratch: &mut RgbaImage,
) -> Result<()> {
    let rect = source_rect(
        index,
        settings.cols,
        settings.rows,
        source.width(),
        source.height(),
    )?;
    let side = settings.target_resolution;
    backend.draw_frame(
        source,
        rect,
        side,
        &ColorAdjust::from_settings(settings),
        scratch,
    )?;

    if !settings.needs_readback() {
        return Ok(());
    }

    let mut pixels = backend.read_pixels(scratch)?;
    if settings.auto_transparency {
        apply_chroma_key(&mut pixels, &ChromaKey::magenta(settings.chroma_tolerance));
    }
    if settings.vector_rite {
        sharpen_silhouette(&mut pixels, side, side);
    }
    if settings.palette_lock {
        let colors = style.lock_color_count();
        if let Err(e) = lock_palette(
            quantizer,
            &mut pixels,
            colors,
            settings.palette_override(),
        ) {
            warn!(frame = index, error = %e, "palette lock failed; frame left unquantized");
        }
    }
    backend.put_pixels(scratch, &pixels)?;
    Ok(())
}

/// Re-tile every processed frame into one sheet, row-major, with no
/// resampling between cells.
///
/// `on_frame` runs after each frame is placed and may abort the build by
/// returning an error (used for cancellation).
pub fn compose_sheet<E>(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    source: &RgbaImage,
    settings: &AnimationSettings,
    style: PixelStyle,
    mut on_frame: impl FnMut(u32) -> std::result::Result<(), E>,
) -> std::result::Result<RgbaImage, E>
where
    E: From<FrameError>,
{
    let side = settings.target_resolution;
    let (width, height) = sheet_dimensions(settings.cols, settings.rows, side).map_err(|_| {
        FrameError::from(BackendError::Allocation {
            width: u64::from(settings.cols) * u64::from(side),
            height: u64::from(settings.rows) * u64::from(side),
        })
    })?;
    let mut sheet = allocate_rgba(width, height).map_err(FrameError::from)?;
    let mut scratch = RgbaImage::new(0, 0);

    for index in 0..settings.frame_count() {
        process_frame_into(
            backend,
            quantizer,
            source,
            index,
            settings,
            style,
            &mut scratch,
        )?;
        let (x, y) = cell_origin(index, settings.cols, side);
        replace(&mut sheet, &scratch, x as i64, y as i64);
        on_frame(index)?;
    }
    debug!(width, height, frames = settings.frame_count(), "composited sheet");
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::palette::tests::FakeQuantizer;
    use crate::test_helpers::{BG, grid_sheet, solid};
    use image::Rgba;

    fn plain() -> AnimationSettings {
        AnimationSettings {
            rows: 2,
            cols: 2,
            target_resolution: 8,
            auto_transparency: false,
            vector_rite: false,
            palette_lock: false,
            ..AnimationSettings::default()
        }
    }

    #[test]
    fn fast_path_performs_no_readback() {
        let backend = MockBackend::new();
        let quantizer = FakeQuantizer::new();
        let sheet = grid_sheet(2, 2, 16);
        let frame = process_frame(
            &backend,
            &quantizer,
            &sheet,
            3,
            &plain(),
            PixelStyle::EightBit,
        )
        .unwrap();

        assert_eq!(frame.dimensions(), (8, 8));
        assert_eq!(backend.readback_count(), 0);
        assert_eq!(backend.get_operations(), vec![RecordedOp::Draw { side: 8 }]);
        assert_eq!(quantizer.quantize_count(), 0);
    }

    #[test]
    fn each_flag_forces_one_readback() {
        for flag in 0..3 {
            let mut settings = plain();
            match flag {
                0 => settings.auto_transparency = true,
                1 => settings.vector_rite = true,
                _ => settings.palette_lock = true,
            }
            let backend = MockBackend::new();
            let sheet = grid_sheet(2, 2, 16);
            process_frame(
                &backend,
                &FakeQuantizer::new(),
                &sheet,
                0,
                &settings,
                PixelStyle::EightBit,
            )
            .unwrap();
            assert_eq!(backend.readback_count(), 1, "flag {flag}");
            assert_eq!(
                backend.get_operations().last(),
                Some(&RecordedOp::PutPixels)
            );
        }
    }

    #[test]
    fn chroma_key_clears_background() {
        let settings = AnimationSettings {
            auto_transparency: true,
            ..plain()
        };
        let frame = process_frame(
            &MockBackend::new(),
            &FakeQuantizer::new(),
            &solid(16, 16, BG),
            0,
            &settings,
            PixelStyle::EightBit,
        )
        .unwrap();
        assert!(frame.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn out_of_range_index_is_grid_error() {
        let result = process_frame(
            &MockBackend::new(),
            &FakeQuantizer::new(),
            &solid(16, 16, BG),
            4,
            &plain(),
            PixelStyle::EightBit,
        );
        assert!(matches!(result, Err(FrameError::Grid(_))));
    }

    #[test]
    fn quantize_failure_leaves_frame_unquantized() {
        let settings = AnimationSettings {
            palette_lock: true,
            ..plain()
        };
        let sheet = grid_sheet(2, 2, 16);
        let backend = MockBackend::new();
        let failing = FakeQuantizer::failing_on(&[0]);
        let locked =
            process_frame(&backend, &failing, &sheet, 1, &settings, PixelStyle::EightBit).unwrap();
        let reference = process_frame(
            &MockBackend::new(),
            &FakeQuantizer::new(),
            &sheet,
            1,
            &plain(),
            PixelStyle::EightBit,
        )
        .unwrap();
        assert_eq!(locked, reference);
        assert_eq!(failing.quantize_count(), 1);
    }

    #[test]
    fn custom_palette_skips_quantize() {
        let settings = AnimationSettings {
            palette_lock: true,
            custom_palette: vec![crate::types::Rgb { r: 0, g: 0, b: 0 }],
            ..plain()
        };
        let quantizer = FakeQuantizer::new();
        let frame = process_frame(
            &MockBackend::new(),
            &quantizer,
            &grid_sheet(2, 2, 16),
            2,
            &settings,
            PixelStyle::EightBit,
        )
        .unwrap();
        assert_eq!(quantizer.quantize_count(), 0);
        assert_eq!(quantizer.apply_count(), 1);
        assert!(frame.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn scratch_buffer_is_reused() {
        let backend = MockBackend::new();
        let sheet = grid_sheet(2, 2, 16);
        let mut scratch = RgbaImage::new(8, 8);
        for i in 0..4 {
            process_frame_into(
                &backend,
                &FakeQuantizer::new(),
                &sheet,
                i,
                &plain(),
                PixelStyle::EightBit,
                &mut scratch,
            )
            .unwrap();
        }
        assert_eq!(scratch.dimensions(), (8, 8));
    }

    #[test]
    fn compose_sheet_places_frames_row_major() {
        let sheet = grid_sheet(2, 2, 16);
        let settings = plain();
        let mut visited = Vec::new();
        let out = compose_sheet::<FrameError>(
            &MockBackend::new(),
            &FakeQuantizer::new(),
            &sheet,
            &settings,
            PixelStyle::EightBit,
            |i| {
                visited.push(i);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(out.dimensions(), (16, 16));
        assert_eq!(visited, vec![0, 1, 2, 3]);
        for index in 0..4u32 {
            let (x, y) = cell_origin(index, 2, 8);
            let expected = sheet.get_pixel((index % 2) * 16 + 5, (index / 2) * 16 + 5);
            assert_eq!(out.get_pixel(x + 3, y + 3), expected);
        }
    }

    /// One 8×8 cell, drawn 1:1, with every post filter off.
    fn single_cell() -> AnimationSettings {
        AnimationSettings {
            rows: 1,
            cols: 1,
            ..plain()
        }
    }

    fn cell(f: impl Fn(u32, u32) -> [u8; 4]) -> RgbaImage {
        RgbaImage::from_fn(8, 8, |x, y| Rgba(f(x, y)))
    }

    #[test]
    fn keying_runs_before_sharpening() {
        const GREEN: [u8; 4] = [0, 200, 0, 255];
        // A lone green pixel on magenta, and a 2×2 green block.
        let source = cell(|x, y| match (x, y) {
            (5, 5) => GREEN,
            (1..=2, 1..=2) => GREEN,
            _ => BG,
        });
        let settings = AnimationSettings {
            auto_transparency: true,
            vector_rite: true,
            ..single_cell()
        };
        let frame = process_frame(
            &MockBackend::new(),
            &FakeQuantizer::new(),
            &source,
            0,
            &settings,
            PixelStyle::EightBit,
        )
        .unwrap();

        // Once the magenta is keyed out the lone pixel has no solid
        // neighbour left and is erased as a speck.
        assert_eq!(frame.get_pixel(5, 5)[3], 0);
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            assert_eq!(frame.get_pixel(x, y).0, GREEN);
        }
        assert_eq!(frame.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn palette_lock_sees_sharpened_alpha() {
        const GREEN: [u8; 4] = [0, 200, 0, 255];
        // Solid block at 2..=4 with two soft edge pixels beside it.
        let source = cell(|x, y| match (x, y) {
            (2..=4, 2..=4) => GREEN,
            (5, 3) => [0, 200, 0, 130],
            (3, 5) => [0, 200, 0, 200],
            _ => [0, 0, 0, 0],
        });
        let settings = AnimationSettings {
            vector_rite: true,
            palette_lock: true,
            custom_palette: vec![crate::types::Rgb { r: 0, g: 200, b: 0 }],
            ..single_cell()
        };
        let frame = process_frame(
            &MockBackend::new(),
            &FakeQuantizer::new(),
            &source,
            0,
            &settings,
            PixelStyle::EightBit,
        )
        .unwrap();

        // Alpha 130 would map to an opaque entry; the sharpener snaps it
        // clear first, so the lock sends it to the transparent slot.
        assert_eq!(frame.get_pixel(5, 3).0, [0, 0, 0, 0]);
        assert_eq!(frame.get_pixel(3, 5).0, GREEN);
        assert_eq!(frame.get_pixel(3, 3).0, GREEN);
    }

    #[test]
    fn oversized_sheet_is_an_allocation_error() {
        let settings = AnimationSettings {
            rows: 1,
            cols: 70_000,
            target_resolution: 70_000,
            ..plain()
        };
        let result = compose_sheet::<FrameError>(
            &MockBackend::new(),
            &FakeQuantizer::new(),
            &grid_sheet(2, 2, 16),
            &settings,
            PixelStyle::EightBit,
            |_| Ok(()),
        );
        assert!(matches!(
            result,
            Err(FrameError::Backend(BackendError::Allocation {
                width: 4_900_000_000,
                height: 70_000
            }))
        ));
    }

    #[test]
    fn frame_dimensions_are_square() {
        assert_eq!(frame_dimensions(&plain()), (8, 8));
    }
}
