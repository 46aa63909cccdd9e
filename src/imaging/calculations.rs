//! Pure layout math for sprite sheets.
//!
//! All functions here are pure and testable without any I/O or pixels.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridError {
    #[error("frame index {index} out of range for a sheet of {frame_count} frames")]
    IndexOutOfRange { index: u32, frame_count: u32 },
    #[error("a {cols}x{rows} grid of {side} px frames is too large to composite")]
    SheetTooLarge { cols: u32, rows: u32, side: u32 },
}

/// A rectangle on the source sheet. Grid divisions need not be integral,
/// so every component is fractional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Map a frame index to its rectangle on a `cols × rows` source sheet.
///
/// Frames are numbered row-major. The cell size is `source / grid` and may
/// be fractional, e.g. a 100 px wide sheet with 3 columns has 33.33 px cells.
///
/// # Examples
/// ```
/// # use sprite_forge::imaging::source_rect;
/// let r = source_rect(5, 4, 4, 512, 512).unwrap();
/// assert_eq!((r.x, r.y, r.w, r.h), (128.0, 128.0, 128.0, 128.0));
/// ```
pub fn source_rect(
    index: u32,
    cols: u32,
    rows: u32,
    source_width: u32,
    source_height: u32,
) -> Result<SourceRect, GridError> {
    if u64::from(index) >= u64::from(cols) * u64::from(rows) {
        return Err(GridError::IndexOutOfRange {
            index,
            frame_count: cols.saturating_mul(rows),
        });
    }
    let w = source_width as f64 / cols as f64;
    let h = source_height as f64 / rows as f64;
    Ok(SourceRect {
        x: (index % cols) as f64 * w,
        y: (index / cols) as f64 * h,
        w,
        h,
    })
}

/// `(col, row)` of a frame index on a row-major grid.
pub fn grid_position(index: u32, cols: u32) -> (u32, u32) {
    (index % cols, index / cols)
}

/// Top-left pixel of a frame's cell on a composited sheet of `side`-px cells.
///
/// Exact for every cell of a sheet [`sheet_dimensions`] accepts; saturates
/// otherwise.
pub fn cell_origin(index: u32, cols: u32, side: u32) -> (u32, u32) {
    let (col, row) = grid_position(index, cols);
    (col.saturating_mul(side), row.saturating_mul(side))
}

/// Dimensions of a composited sheet: `(side * cols, side * rows)`.
///
/// Fails when either edge or the frame count overflows `u32`.
pub fn sheet_dimensions(cols: u32, rows: u32, side: u32) -> Result<(u32, u32), GridError> {
    cols.checked_mul(rows)
        .and(side.checked_mul(cols).zip(side.checked_mul(rows)))
        .ok_or(GridError::SheetTooLarge { cols, rows, side })
}

/// Scale `(width, height)` so the longer edge becomes `long_edge`,
/// preserving aspect ratio.
pub fn fit_long_edge(width: u32, height: u32, long_edge: u32) -> (u32, u32) {
    if width >= height {
        let h = (long_edge as f64 * height as f64 / width as f64).round() as u32;
        (long_edge, h.max(1))
    } else {
        let w = (long_edge as f64 * width as f64 / height as f64).round() as u32;
        (w.max(1), long_edge)
    }
}

/// Frame delay in milliseconds for a playback rate (unrounded).
pub fn frame_interval_ms(fps: u32) -> f64 {
    1000.0 / fps as f64
}
