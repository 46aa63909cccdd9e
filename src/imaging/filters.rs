//! In-place pixel filters over raw RGBA8 buffers.
//!
//! Every function takes a tightly packed, row-major `&mut [u8]` with four
//! bytes per pixel, the layout [`image::RgbaImage::as_raw`] exposes.
//!
//! | Stage | Function |
//! |---|---|
//! | Colour pass | [`apply_color_adjust`] |
//! | Chroma-key matte | [`apply_chroma_key`] |
//! | Silhouette sharpening | [`sharpen_silhouette`] |

use super::params::{ChromaKey, ColorAdjust};

/// Luma weights shared by the hue-rotate and saturate matrices.
const LUMA: [f32; 3] = [0.213, 0.715, 0.072];

/// Alpha above which a soft edge pixel snaps to opaque.
const SNAP_OPAQUE_ABOVE: u8 = 140;
/// Neighbour alpha that counts as solid for halo correction.
const HALO_SOLID_ABOVE: u8 = 220;
/// Neighbour alpha that keeps a pixel from being an isolated speck.
const SUPPORT_ABOVE: u8 = 100;

type Matrix = [[f32; 3]; 3];

/// Precomputed colour transform for one [`ColorAdjust`].
///
/// Stages whose parameter is at its identity value are `None` and skipped,
/// which keeps the identity transform bit-exact.
#[derive(Debug, Clone, Copy)]
struct ColorTransform {
    hue: Option<Matrix>,
    saturate: Option<Matrix>,
    contrast: Option<f32>,
    brightness: Option<f32>,
}

impl ColorTransform {
    fn new(adjust: &ColorAdjust) -> Self {
        Self {
            hue: (adjust.hue != 0.0).then(|| hue_rotate_matrix(adjust.hue)),
            saturate: (adjust.saturation != 100.0)
                .then(|| saturate_matrix(adjust.saturation / 100.0)),
            contrast: (adjust.contrast != 100.0).then_some(adjust.contrast / 100.0),
            brightness: (adjust.brightness != 100.0).then_some(adjust.brightness / 100.0),
        }
    }

    fn apply(&self, px: [u8; 4]) -> [u8; 4] {
        let mut rgb = [
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
        ];
        if let Some(m) = &self.hue {
            rgb = mul(m, rgb);
        }
        if let Some(m) = &self.saturate {
            rgb = mul(m, rgb);
        }
        if let Some(c) = self.contrast {
            rgb = rgb.map(|v| ((v - 0.5) * c + 0.5).clamp(0.0, 1.0));
        }
        if let Some(b) = self.brightness {
            rgb = rgb.map(|v| (v * b).clamp(0.0, 1.0));
        }
        [to_byte(rgb[0]), to_byte(rgb[1]), to_byte(rgb[2]), px[3]]
    }
}

fn mul(m: &Matrix, v: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0; 3];
    for (row, o) in m.iter().zip(out.iter_mut()) {
        *o = (row[0] * v[0] + row[1] * v[1] + row[2] * v[2]).clamp(0.0, 1.0);
    }
    out
}

fn to_byte(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Hue rotation about the luma axis (the CSS `hue-rotate()` matrix).
fn hue_rotate_matrix(degrees: f32) -> Matrix {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let [lr, lg, lb] = LUMA;
    [
        [
            lr + cos * (1.0 - lr) - sin * lr,
            lg - cos * lg - sin * lg,
            lb - cos * lb + sin * (1.0 - lb),
        ],
        [
            lr - cos * lr + sin * 0.143,
            lg + cos * (1.0 - lg) + sin * 0.140,
            lb - cos * lb - sin * 0.283,
        ],
        [
            lr - cos * lr - sin * (1.0 - lr),
            lg - cos * lg + sin * lg,
            lb + cos * (1.0 - lb) + sin * lb,
        ],
    ]
}

/// Saturation scale toward luma grey (the CSS `saturate()` matrix).
fn saturate_matrix(s: f32) -> Matrix {
    let [lr, lg, lb] = LUMA;
    [
        [lr + (1.0 - lr) * s, lg - lg * s, lb - lb * s],
        [lr - lr * s, lg + (1.0 - lg) * s, lb - lb * s],
        [lr - lr * s, lg - lg * s, lb + (1.0 - lb) * s],
    ]
}

/// Adjust one RGBA pixel: hue rotation, then saturation, contrast and
/// brightness. Alpha passes through untouched.
pub fn adjust_pixel(px: [u8; 4], adjust: &ColorAdjust) -> [u8; 4] {
    ColorTransform::new(adjust).apply(px)
}

/// Run the colour pass over a whole buffer. A no-op for the identity adjust.
pub fn apply_color_adjust(data: &mut [u8], adjust: &ColorAdjust) {
    if adjust.is_identity() {
        return;
    }
    let transform = ColorTransform::new(adjust);
    for px in data.chunks_exact_mut(4) {
        let out = transform.apply([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&out);
    }
}

/// Manhattan RGB distance between a pixel and a key color.
pub fn key_distance(px: &[u8], key: [u8; 3]) -> u32 {
    px.iter()
        .zip(key)
        .map(|(&c, k)| (c as i32 - k as i32).unsigned_abs())
        .sum()
}

/// Zero the alpha of every pixel within `key.threshold` of the key color.
///
/// RGB is left as-is; only alpha decides transparency downstream.
pub fn apply_chroma_key(data: &mut [u8], key: &ChromaKey) {
    for px in data.chunks_exact_mut(4) {
        if key_distance(&px[..3], key.key) <= key.threshold {
            px[3] = 0;
        }
    }
}

/// Binarize soft alpha edges and erase isolated specks.
///
/// Decisions read a snapshot of the buffer taken before the pass, so the
/// result does not depend on scan order. The outermost 1 px ring is never
/// touched because it lacks a full 3×3 neighbourhood.
pub fn sharpen_silhouette(data: &mut [u8], width: u32, height: u32) {
    let (w, h) = (width as usize, height as usize);
    if w < 3 || h < 3 || data.len() < w * h * 4 {
        return;
    }
    let temp = data.to_vec();

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = (y * w + x) * 4;
            let alpha = temp[i + 3];

            if alpha > 0 && alpha < 255 {
                if alpha > SNAP_OPAQUE_ABOVE {
                    data[i + 3] = 255;
                    if let Some(rgb) = solid_neighbour_mean(&temp, x, y, w) {
                        data[i..i + 3].copy_from_slice(&rgb);
                    }
                } else {
                    data[i + 3] = 0;
                }
            }

            if !neighbours(x, y, w).any(|n| temp[n + 3] > SUPPORT_ABOVE) {
                data[i + 3] = 0;
            }
        }
    }
}

/// Byte offsets of the 8 neighbours of an interior pixel.
fn neighbours(x: usize, y: usize, w: usize) -> impl Iterator<Item = usize> {
    (0..3usize)
        .flat_map(move |dy| (0..3usize).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| !(dx == 1 && dy == 1))
        .map(move |(dx, dy)| ((y + dy - 1) * w + (x + dx - 1)) * 4)
}

/// Rounded mean RGB of the neighbours that were already solid.
fn solid_neighbour_mean(temp: &[u8], x: usize, y: usize, w: usize) -> Option<[u8; 3]> {
    let mut sum = [0u32; 3];
    let mut count = 0u32;
    for n in neighbours(x, y, w).filter(|&n| temp[n + 3] > HALO_SOLID_ABOVE) {
        for c in 0..3 {
            sum[c] += temp[n + c] as u32;
        }
        count += 1;
    }
    (count > 0).then(|| sum.map(|s| ((s as f32) / count as f32).round() as u8))
}
