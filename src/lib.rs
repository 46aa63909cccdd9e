//! # Sprite Forge
//!
//! Turns an AI-generated sprite sheet into clean pixel-art frames and game
//! assets. The source is a single bitmap holding a `cols × rows` grid of
//! frames painted on a magenta background; every export walks the same
//! per-frame pipeline and differs only in what it does with the frames.
//!
//! # Architecture: One Frame Pipeline, Many Exporters
//!
//! ```text
//! source sheet ─┬─ grid rect ─ resample + colour ─┬─ chroma key ─ sharpen ─ palette lock ─┐
//!               │                                  └──────────── (fast path) ──────────────┤
//!               │                                                                          ▼
//!               └──────────────────────────────── processed frame N ──► PNG / GIF / video / …
//! ```
//!
//! Frames are processed strictly in order, one at a time, each export with
//! its own scratch buffer. When none of the pixel stages is enabled the
//! pipeline never reads pixels back; the resample-and-colour blit is the
//! whole job.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Grid math, colour/chroma/sharpen filters, the [`imaging::RasterBackend`] trait and `process_frame` |
//! | [`palette`] | The [`palette::Quantizer`] trait, NeuQuant adapter and palette lock |
//! | [`export`] | PNG, GIF, video, SVG, texture atlas and mobile bundle exporters |
//! | [`aseprite`] | Aseprite JSON manifest (pure layout math) |
//! | [`worker`] | Background export jobs with cooperative cancellation |
//! | [`config`] | `forge.toml` loading, merging and validation |
//! | [`types`] | Art description shared by config and manifests |
//! | [`output`] | CLI output formatting for export reports |
//!
//! # Design Decisions
//!
//! ## Injected Collaborators
//!
//! Decoding, resampling and encoding sit behind [`imaging::RasterBackend`];
//! quantization behind [`palette::Quantizer`]; GIF packing behind
//! [`export::gif::GifStreamEncoder`]; video capture behind
//! [`export::video::VideoSink`]. The production implementations use the
//! `image`, `color_quant` and `gif` crates and the system `ffmpeg`. Tests swap
//! in recording or deterministic fakes, which is how the no-readback fast
//! path and the GIF frame-count guarantee are checked.
//!
//! ## Quantization Failures Are Local
//!
//! A quantizer error never fails an export. Palette lock leaves the frame
//! unquantized; GIF export maps the frame onto a fixed fallback palette. In
//! both cases a warning names the frame.
//!
//! ## No Partial Files
//!
//! Single files are written to a `.partial` sibling and renamed. Bundles are
//! staged in a hidden directory inside the destination and moved into place
//! together; they only ever replace their own files. A failed or cancelled
//! export leaves the previous output untouched.

pub mod aseprite;
pub mod config;
pub mod export;
pub mod imaging;
pub mod output;
pub mod palette;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;
