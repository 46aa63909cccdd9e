//! Shared test utilities for the sprite-forge test suite.
//!
//! Builds synthetic sprite sheets in memory so pipeline and exporter tests
//! never depend on fixture files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! // 2×2 grid of 16 px cells, each a distinct solid color
//! let sheet = grid_sheet(2, 2, 16);
//!
//! // 4×4 grid of sprites on a magenta background
//! let sheet = sprite_sheet(4, 4, 32);
//! assert_eq!(sheet.get_pixel(0, 0).0, BG);
//! ```

use crate::config::AnimationSettings;
use image::{Rgba, RgbaImage};

/// Generator background: pure magenta, opaque.
pub const BG: [u8; 4] = [255, 0, 255, 255];

// =========================================================================
// Sheets
// =========================================================================

/// Uniform image.
pub fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

/// Distinct, non-magenta opaque color for grid cell `index`.
pub fn cell_color(index: u32) -> [u8; 4] {
    [
        (index * 40 % 200) as u8 + 20,
        (index * 70 % 200) as u8 + 40,
        (index * 25 % 120) as u8,
        255,
    ]
}

/// `cols × rows` grid of `cell`-px cells, each filled with [`cell_color`].
pub fn grid_sheet(cols: u32, rows: u32, cell: u32) -> RgbaImage {
    RgbaImage::from_fn(cols * cell, rows * cell, |x, y| {
        Rgba(cell_color((y / cell) * cols + x / cell))
    })
}

/// Sprite sheet as a generator would paint it: magenta background with a
/// centred square sprite in each cell, coloured per [`cell_color`].
pub fn sprite_sheet(cols: u32, rows: u32, cell: u32) -> RgbaImage {
    let margin = cell / 4;
    RgbaImage::from_fn(cols * cell, rows * cell, |x, y| {
        let (cx, cy) = (x % cell, y % cell);
        let inside = (margin..cell - margin).contains(&cx) && (margin..cell - margin).contains(&cy);
        if inside {
            Rgba(cell_color((y / cell) * cols + x / cell))
        } else {
            Rgba(BG)
        }
    })
}

// =========================================================================
// Settings
// =========================================================================

/// Small settings for fast tests: `cols × rows` grid, 8 px frames, chroma
/// key on, every other stage off.
pub fn small_settings(cols: u32, rows: u32) -> AnimationSettings {
    AnimationSettings {
        rows,
        cols,
        target_resolution: 8,
        auto_transparency: true,
        vector_rite: false,
        palette_lock: false,
        ..AnimationSettings::default()
    }
}

// =========================================================================
// Pixel assertions
// =========================================================================

/// Count pixels with alpha 0.
pub fn transparent_count(image: &RgbaImage) -> usize {
    image.pixels().filter(|p| p[3] == 0).count()
}

/// Assert that every pixel of the `side`-px cell at `(col, row)` equals `color`.
pub fn assert_cell_is(image: &RgbaImage, col: u32, row: u32, side: u32, color: [u8; 4]) {
    for y in row * side..(row + 1) * side {
        for x in col * side..(col + 1) * side {
            assert_eq!(
                image.get_pixel(x, y).0,
                color,
                "pixel ({x}, {y}) of cell ({col}, {row})"
            );
        }
    }
}

#[test]
fn cell_colors_are_distinct_and_not_magenta() {
    let colors: Vec<[u8; 4]> = (0..16).map(cell_color).collect();
    for (i, a) in colors.iter().enumerate() {
        assert_ne!(*a, BG);
        for b in &colors[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn sprite_sheet_has_background_and_sprites() {
    let sheet = sprite_sheet(2, 1, 16);
    assert_eq!(sheet.get_pixel(0, 0).0, BG);
    assert_eq!(sheet.get_pixel(8, 8).0, cell_color(0));
    assert_eq!(sheet.get_pixel(24, 8).0, cell_color(1));
}
