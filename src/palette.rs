//! Palette quantization.
//!
//! Hardware palette emulation is delegated to a [`Quantizer`]: one call
//! builds a [`Palette`] from a frame's RGBA pixels, a second maps every
//! pixel to a palette index. The pipeline's palette-lock stage and the GIF
//! assembler both go through this trait so tests can inject a
//! deterministic quantizer.
//!
//! ## Transparency
//!
//! When a frame contains transparent pixels (alpha below 128), index 0 of
//! the palette is reserved for fully transparent black and the opaque
//! pixels share the remaining entries. Index mapping sends every
//! transparent pixel to that slot, which is what lets GIF frames declare a
//! fixed transparent index of 0.

use crate::types::Rgb;
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

/// Alpha below which a pixel counts as transparent for palette purposes.
pub const TRANSPARENT_BELOW: u8 = 128;

/// NeuQuant sampling factor (1 = best, 30 = fastest).
const SAMPLE_FACTOR: i32 = 10;

/// Most entries an indexed frame can address.
pub const MAX_COLORS: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantizeError {
    #[error("color count must be 1..=256, got {0}")]
    InvalidColorCount(usize),
    #[error("cannot quantize an empty pixel buffer")]
    EmptyInput,
    #[error("pixel buffer length {0} is not a multiple of 4")]
    MisalignedInput(usize),
    #[error("quantizer failed: {0}")]
    Library(String),
}

/// Ordered list of at most 256 RGBA colors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    colors: Vec<[u8; 4]>,
}

impl Palette {
    /// Build a palette, truncating to [`MAX_COLORS`] entries.
    pub fn new(mut colors: Vec<[u8; 4]>) -> Self {
        colors.truncate(MAX_COLORS);
        Self { colors }
    }

    /// Opaque user palette behind a reserved transparent slot at index 0.
    pub fn with_transparent_slot(custom: &[Rgb]) -> Self {
        let colors = std::iter::once([0, 0, 0, 0])
            .chain(custom.iter().map(|c| [c.r, c.g, c.b, 255]))
            .collect();
        Self::new(colors)
    }

    pub fn colors(&self) -> &[[u8; 4]] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// True when index 0 is a transparent entry.
    pub fn has_transparent_slot(&self) -> bool {
        self.colors
            .first()
            .is_some_and(|c| c[3] < TRANSPARENT_BELOW)
    }

    /// Flat `[r, g, b, r, g, b, ...]` table, the layout indexed encoders take.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.colors.iter().flat_map(|c| [c[0], c[1], c[2]]).collect()
    }
}

/// Quantize + index-map contract.
///
/// Both calls may fail; callers treat a failure as local to one frame.
pub trait Quantizer: Sync {
    /// Build a palette of at most `colors` entries for `rgba`.
    fn quantize(&self, rgba: &[u8], colors: usize) -> Result<Palette, QuantizeError>;

    /// One palette index per pixel of `rgba`.
    fn apply_palette(&self, rgba: &[u8], palette: &Palette) -> Result<Vec<u8>, QuantizeError>;
}

fn check_input(rgba: &[u8]) -> Result<(), QuantizeError> {
    if rgba.is_empty() {
        return Err(QuantizeError::EmptyInput);
    }
    if rgba.len() % 4 != 0 {
        return Err(QuantizeError::MisalignedInput(rgba.len()));
    }
    Ok(())
}

fn rgb_distance(a: &[u8], b: &[u8; 4]) -> u32 {
    (0..3)
        .map(|c| {
            let d = a[c] as i32 - b[c] as i32;
            (d * d) as u32
        })
        .sum()
}

/// Nearest palette entry for every pixel.
///
/// Transparent pixels go to the nearest transparent entry when the palette
/// has one; opaque pixels go to the nearest opaque entry by RGB distance.
/// If the palette lacks entries of the matching kind, all entries compete.
pub fn nearest_indices(rgba: &[u8], palette: &Palette) -> Result<Vec<u8>, QuantizeError> {
    check_input(rgba)?;
    if palette.is_empty() {
        return Err(QuantizeError::InvalidColorCount(0));
    }
    let colors = palette.colors();
    let (clear, solid): (Vec<usize>, Vec<usize>) =
        (0..colors.len()).partition(|&i| colors[i][3] < TRANSPARENT_BELOW);
    let all: Vec<usize> = (0..colors.len()).collect();

    let pick = |px: &[u8], candidates: &[usize]| -> u8 {
        candidates
            .iter()
            .copied()
            .min_by_key(|&i| rgb_distance(px, &colors[i]))
            .unwrap_or(0) as u8
    };

    Ok(rgba
        .chunks_exact(4)
        .map(|px| {
            let pool = match (px[3] < TRANSPARENT_BELOW, clear.is_empty(), solid.is_empty()) {
                (true, false, _) => &clear,
                (false, _, false) => &solid,
                _ => &all,
            };
            pick(px, pool)
        })
        .collect())
}

/// Fixed 16-color palette (plus transparent slot) used when the quantizer
/// fails and a frame still has to be written.
pub fn fallback_palette() -> Palette {
    const VGA: [[u8; 3]; 16] = [
        [0, 0, 0],
        [128, 0, 0],
        [0, 128, 0],
        [128, 128, 0],
        [0, 0, 128],
        [128, 0, 128],
        [0, 128, 128],
        [192, 192, 192],
        [128, 128, 128],
        [255, 0, 0],
        [0, 255, 0],
        [255, 255, 0],
        [0, 0, 255],
        [255, 0, 255],
        [0, 255, 255],
        [255, 255, 255],
    ];
    let custom: Vec<Rgb> = VGA
        .iter()
        .map(|&[r, g, b]| Rgb { r, g, b })
        .collect();
    Palette::with_transparent_slot(&custom)
}

fn mean_color(rgba: &[u8]) -> [u8; 4] {
    let n = (rgba.len() / 4).max(1) as u64;
    let mut sum = [0u64; 3];
    for px in rgba.chunks_exact(4) {
        for c in 0..3 {
            sum[c] += px[c] as u64;
        }
    }
    let [r, g, b] = sum.map(|s| ((s + n / 2) / n) as u8);
    [r, g, b, 255]
}

/// [`Quantizer`] backed by `color_quant::NeuQuant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeuQuantizer;

impl NeuQuantizer {
    pub fn new() -> Self {
        Self
    }
}

impl Quantizer for NeuQuantizer {
    fn quantize(&self, rgba: &[u8], colors: usize) -> Result<Palette, QuantizeError> {
        check_input(rgba)?;
        if colors == 0 || colors > MAX_COLORS {
            return Err(QuantizeError::InvalidColorCount(colors));
        }

        let opaque: Vec<u8> = rgba
            .chunks_exact(4)
            .filter(|px| px[3] >= TRANSPARENT_BELOW)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect();
        let has_clear = opaque.len() < rgba.len();

        let mut entries = Vec::with_capacity(colors);
        if has_clear {
            entries.push([0, 0, 0, 0]);
        }
        let budget = colors - entries.len();
        if budget == 0 || opaque.is_empty() {
            return Ok(Palette::new(entries));
        }
        // NeuQuant needs at least two neurons.
        if budget == 1 {
            entries.push(mean_color(&opaque));
            return Ok(Palette::new(entries));
        }

        let map = catch_unwind(AssertUnwindSafe(|| {
            color_quant::NeuQuant::new(SAMPLE_FACTOR, budget, &opaque).color_map_rgba()
        }))
        .map_err(|panic| {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "NeuQuant panicked".to_string());
            QuantizeError::Library(reason)
        })?;

        entries.extend(map.chunks_exact(4).map(|c| [c[0], c[1], c[2], 255]));
        Ok(Palette::new(entries))
    }

    fn apply_palette(&self, rgba: &[u8], palette: &Palette) -> Result<Vec<u8>, QuantizeError> {
        nearest_indices(rgba, palette)
    }
}

/// Constrain `pixels` to a palette in place.
///
/// With `custom` set, the quantize call is skipped and the custom colors
/// (behind a transparent slot) are used directly; index mapping still runs.
/// On error the buffer is left untouched.
pub fn lock_palette(
    quantizer: &impl Quantizer,
    pixels: &mut [u8],
    colors: usize,
    custom: Option<&[Rgb]>,
) -> Result<(), QuantizeError> {
    let palette = match custom {
        Some(custom) => Palette::with_transparent_slot(custom),
        None => quantizer.quantize(pixels, colors)?,
    };
    let indices = quantizer.apply_palette(pixels, &palette)?;
    if indices.len() * 4 != pixels.len() {
        return Err(QuantizeError::Library(format!(
            "index mapper returned {} indices for {} pixels",
            indices.len(),
            pixels.len() / 4
        )));
    }
    let table = palette.colors();
    if let Some(&index) = indices.iter().find(|&&i| i as usize >= table.len()) {
        return Err(QuantizeError::Library(format!(
            "index {index} outside a {}-entry palette",
            table.len()
        )));
    }
    for (px, &index) in pixels.chunks_exact_mut(4).zip(&indices) {
        px.copy_from_slice(&table[index as usize]);
    }
    Ok(())
}
