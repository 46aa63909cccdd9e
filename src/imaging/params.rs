//! Parameter types for frame operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`operations`](super::operations) module (which
//! decides what each frame needs) and the [`backend`](super::backend) and
//! [`filters`](super::filters) (which do the pixel work).
//!
//! ## Types
//!
//! - [`ColorAdjust`]: hue/saturation/contrast/brightness of the color pass.
//! - [`ChromaKey`]: key color plus Manhattan distance budget for the matte.
//! - [`EncodeFormat`]: container a composited bitmap is encoded to.

use crate::config::AnimationSettings;

/// Color adjustment applied during the resample blit.
///
/// `hue` is in degrees; the others are percentages where 100 is identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAdjust {
    pub hue: f32,
    pub saturation: f32,
    pub contrast: f32,
    pub brightness: f32,
}

impl ColorAdjust {
    pub fn identity() -> Self {
        Self {
            hue: 0.0,
            saturation: 100.0,
            contrast: 100.0,
            brightness: 100.0,
        }
    }

    pub fn from_settings(settings: &AnimationSettings) -> Self {
        Self {
            hue: settings.hue,
            saturation: settings.saturation,
            contrast: settings.contrast,
            brightness: settings.brightness,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

impl Default for ColorAdjust {
    fn default() -> Self {
        Self::identity()
    }
}

/// Pure magenta, the background the generator is asked to paint.
pub const MAGENTA: [u8; 3] = [255, 0, 255];

/// Chroma-key matte parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromaKey {
    pub key: [u8; 3],
    /// Maximum `|Δr| + |Δg| + |Δb|` that is keyed out.
    pub threshold: u32,
}

impl ChromaKey {
    /// Magenta key with the 0–50 tolerance knob scaled ×4.
    pub fn magenta(tolerance: u32) -> Self {
        Self {
            key: MAGENTA,
            threshold: tolerance * 4,
        }
    }
}

/// Output container for a composited bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    Png,
    /// Lossless WebP.
    WebP,
}

impl EncodeFormat {
    pub fn extension(self) -> &'static str {
        match self {
            EncodeFormat::Png => "png",
            EncodeFormat::WebP => "webp",
        }
    }
}
