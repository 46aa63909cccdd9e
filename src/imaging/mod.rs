//! Frame processing in pure Rust on top of the `image` crate.
//!
//! | Stage | Where |
//! |---|---|
//! | **Grid rect** | [`source_rect`] (fractional cells allowed) |
//! | **Resample + colour** | [`RasterBackend::draw_frame`] |
//! | **Chroma key** | [`filters::apply_chroma_key`] |
//! | **Silhouette sharpen** | [`filters::sharpen_silhouette`] |
//! | **Palette lock** | [`crate::palette::lock_palette`] |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for grid and sheet math (unit testable)
//! - **Parameters**: Data structures describing frame operations
//! - **Filters**: In-place pixel stages over raw RGBA buffers
//! - **Backend**: [`RasterBackend`] trait + [`RustBackend`]
//! - **Operations**: [`process_frame`] and the sheet compositor

pub mod backend;
mod calculations;
pub mod filters;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, LoadError, MAX_SURFACE_PIXELS, RasterBackend, allocate_rgba};
pub use calculations::{
    GridError, SourceRect, cell_origin, fit_long_edge, frame_interval_ms, grid_position,
    sheet_dimensions, source_rect,
};
pub use operations::{
    FrameError, compose_sheet, frame_dimensions, process_frame, process_frame_into,
};
pub use params::{ChromaKey, ColorAdjust, EncodeFormat, MAGENTA};
pub use rust_backend::RustBackend;
