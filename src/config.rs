//! Forge configuration module.
//!
//! Handles loading, validating, and merging `forge.toml`. Stock defaults are
//! serialized to a TOML table, the user's file is merged on top, and the
//! result is deserialized and validated. CLI flags are applied last by the
//! binary.
//!
//! ## Keys
//!
//! ```toml
//! # every key is optional; values are the defaults
//!
//! [animation]
//! rows = 4                  # Grid rows on the source sheet
//! cols = 4                  # Grid columns on the source sheet
//! fps = 8                   # Playback rate (frame durations, GIF delay, video)
//! target_resolution = 32    # Output frame side length in pixels
//! hue = 0.0                 # Hue rotation in degrees (-180..180)
//! saturation = 100.0        # Percent, 100 = unchanged (0..200)
//! contrast = 100.0          # Percent, 100 = unchanged (0..200)
//! brightness = 100.0        # Percent, 100 = unchanged (0..200)
//! auto_transparency = true  # Key out the magenta background
//! chroma_tolerance = 5      # Matte strictness (0..50)
//! vector_rite = false       # Silhouette sharpening
//! palette_lock = false      # Emulate the style's hardware palette
//! custom_palette = []       # Fixed palette used instead of quantization
//! batch_mode = false
//! gif_repeat = 0            # 0 = loop forever, -1 = play once, n = n loops
//! gif_dither = false
//! gif_disposal = 2          # GIF disposal method (0..3)
//!
//! [art]
//! id = "sprite"
//! name = ""
//! style = "8-bit"
//! category = "character"
//! kind = "spritesheet"
//! actions = []
//!
//! [video]
//! display_size = 512        # Square output size of the video
//! pacing = "unpaced"        # "realtime" waits 1000/fps ms between frames
//! cycles = 2                # Full animation loops recorded
//!
//! [mobile]
//! use_webp = false
//! adaptive_icons = false
//!
//! [processing]
//! max_processes = 4         # Max parallel export jobs (omit for auto = CPU cores)
//! ```
//!
//! A misspelled key fails the load instead of being ignored.

use crate::imaging::MAX_SURFACE_PIXELS;
use crate::types::{Rgb, SpriteArt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full configuration loaded from `forge.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
    /// Grid shape, filters and container hints.
    pub animation: AnimationSettings,
    /// Description of the art being exported.
    pub art: SpriteArt,
    /// Video capture settings.
    pub video: VideoConfig,
    /// Mobile bundle settings.
    pub mobile: MobileConfig,
    /// Parallel export settings.
    pub processing: ProcessingConfig,
}

impl ForgeConfig {
    /// Reject values no exporter can honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.animation.validate()?;
        if self.video.display_size == 0 || self.video.display_size % 2 != 0 {
            return Err(ConfigError::Validation(
                "video.display_size must be a positive even number".into(),
            ));
        }
        if u64::from(self.video.display_size).pow(2) > MAX_SURFACE_PIXELS {
            return Err(ConfigError::Validation(format!(
                "video.display_size {} is too large to render",
                self.video.display_size
            )));
        }
        if self.video.cycles == 0 {
            return Err(ConfigError::Validation(
                "video.cycles must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Settings that drive frame extraction, the filter chain and exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnimationSettings {
    pub rows: u32,
    pub cols: u32,
    pub fps: u32,
    /// Side length of every output frame.
    pub target_resolution: u32,
    /// Degrees, -180..=180.
    pub hue: f32,
    /// Percent, 0..=200, 100 = identity.
    pub saturation: f32,
    /// Percent, 0..=200, 100 = identity.
    pub contrast: f32,
    /// Percent, 0..=200, 100 = identity.
    pub brightness: f32,
    pub auto_transparency: bool,
    /// 0..=50; scaled ×4 to a Manhattan distance budget.
    pub chroma_tolerance: u32,
    pub vector_rite: bool,
    pub palette_lock: bool,
    /// Used instead of quantization when `palette_lock` is on and this is non-empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_palette: Vec<Rgb>,
    pub batch_mode: bool,
    pub gif_repeat: i32,
    pub gif_dither: bool,
    pub gif_disposal: u8,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 4,
            fps: 8,
            target_resolution: 32,
            hue: 0.0,
            saturation: 100.0,
            contrast: 100.0,
            brightness: 100.0,
            auto_transparency: true,
            chroma_tolerance: 5,
            vector_rite: false,
            palette_lock: false,
            custom_palette: Vec::new(),
            batch_mode: false,
            gif_repeat: 0,
            gif_dither: false,
            gif_disposal: 2,
        }
    }
}

impl AnimationSettings {
    /// Number of frames on the sheet (`rows * cols`), saturating for grids
    /// that [`validate`](Self::validate) would reject.
    pub fn frame_count(&self) -> u32 {
        self.rows.saturating_mul(self.cols)
    }

    /// Frame display time in milliseconds, rounded (Aseprite durations).
    pub fn frame_duration_ms(&self) -> u32 {
        (1000.0 / self.fps as f64).round() as u32
    }

    /// Whether any stage after the color pass needs to read pixels back.
    pub fn needs_readback(&self) -> bool {
        self.vector_rite || self.auto_transparency || self.palette_lock
    }

    /// The fixed palette override, when palette lock is on and one is set.
    pub fn palette_override(&self) -> Option<&[Rgb]> {
        (self.palette_lock && !self.custom_palette.is_empty()).then_some(&self.custom_palette[..])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::Validation(
                "animation.rows and animation.cols must be at least 1".into(),
            ));
        }
        if self.target_resolution == 0 {
            return Err(ConfigError::Validation(
                "animation.target_resolution must be greater than 0".into(),
            ));
        }
        let side = u128::from(self.target_resolution);
        if u128::from(self.rows) * u128::from(self.cols) * side * side
            > u128::from(MAX_SURFACE_PIXELS)
        {
            return Err(ConfigError::Validation(format!(
                "a {}x{} grid of {} px frames exceeds the {MAX_SURFACE_PIXELS} pixel sheet limit",
                self.cols, self.rows, self.target_resolution
            )));
        }
        if self.fps == 0 {
            return Err(ConfigError::Validation(
                "animation.fps must be greater than 0".into(),
            ));
        }
        if !(-180.0..=180.0).contains(&self.hue) {
            return Err(ConfigError::Validation(
                "animation.hue must be -180..180".into(),
            ));
        }
        for (name, value) in [
            ("saturation", self.saturation),
            ("contrast", self.contrast),
            ("brightness", self.brightness),
        ] {
            if !(0.0..=200.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "animation.{name} must be 0-200"
                )));
            }
        }
        if self.chroma_tolerance > 50 {
            return Err(ConfigError::Validation(
                "animation.chroma_tolerance must be 0-50".into(),
            ));
        }
        if self.custom_palette.len() > 256 {
            return Err(ConfigError::Validation(
                "animation.custom_palette may hold at most 256 colors".into(),
            ));
        }
        if self.gif_repeat < -1 {
            return Err(ConfigError::Validation(
                "animation.gif_repeat must be -1 (once), 0 (forever) or a loop count".into(),
            ));
        }
        if self.gif_disposal > 3 {
            return Err(ConfigError::Validation(
                "animation.gif_disposal must be 0-3".into(),
            ));
        }
        Ok(())
    }
}

/// How the video capture loop is paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// Push frames as fast as the sink accepts them; the frame rate is metadata.
    #[default]
    Unpaced,
    /// Wait one frame interval between ticks, like a live capture.
    Realtime,
}

/// Video capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideoConfig {
    /// Square display resolution frames are scaled up to.
    pub display_size: u32,
    pub pacing: Pacing,
    /// Number of full animation loops recorded.
    pub cycles: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            display_size: 512,
            pacing: Pacing::default(),
            cycles: 2,
        }
    }
}

/// Mobile bundle settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MobileConfig {
    /// Write Android drawables as lossless WebP instead of PNG.
    pub use_webp: bool,
    /// Add Android adaptive launcher icons for eligible categories.
    pub adaptive_icons: bool,
}

/// Parallel export settings for the `all` command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Upper bound on concurrent export jobs; unset means one per core.
    pub max_processes: Option<usize>,
}

/// Worker count for the export pool: `max_processes` capped to `1..=cores`.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    match config.max_processes {
        Some(limit) => limit.clamp(1, cores),
        None => cores,
    }
}

// =============================================================================
// Loading
// =============================================================================

/// `ForgeConfig::default()` as a TOML table, the base every file is laid over.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ForgeConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Lay `overlay` over `base`. Nested tables merge per key; any other value
/// in the overlay wins outright.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    let toml::Value::Table(mut table) = base else {
        return overlay;
    };
    let toml::Value::Table(layer) = overlay else {
        return overlay;
    };
    for (key, value) in layer {
        let value = match table.remove(&key) {
            Some(existing) => merge_toml(existing, value),
            None => value,
        };
        table.insert(key, value);
    }
    toml::Value::Table(table)
}

/// Parse `path` as TOML, or `None` when no file is there.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(toml::Value::Table(text.parse::<toml::Table>()?))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Build the final config from the stock base and an optional user layer.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ForgeConfig, ConfigError> {
    let layered = overlay.into_iter().fold(base, merge_toml);
    let config = ForgeConfig::deserialize(layered)?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<ForgeConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Commented `forge.toml` holding every key at its default, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# Sprite Forge Configuration
# ==========================
# Every key is optional and shown at its default.
# Misspelled keys are an error.

# ---------------------------------------------------------------------------
# Frame extraction and filters
# ---------------------------------------------------------------------------
[animation]
# Grid shape of the source sheet. Frame count = rows * cols.
rows = 4
cols = 4

# Playback rate. Drives Aseprite frame durations, the GIF delay and video timing.
fps = 8

# Side length, in pixels, of every exported frame.
target_resolution = 32

# Color adjustment. Hue in degrees (-180..180); the others are percentages
# (0..200) where 100 leaves the image unchanged.
hue = 0.0
saturation = 100.0
contrast = 100.0
brightness = 100.0

# Key out the magenta (#FF00FF) background. Tolerance 0..50; higher keys out
# more near-magenta pixels.
auto_transparency = true
chroma_tolerance = 5

# Snap soft alpha edges to hard pixel-art edges and remove isolated specks.
vector_rite = false

# Reduce every frame to the style's hardware palette (4 colors for 8-bit and
# gameboy, 16 for 16-bit, 64 for hi-bit, 32 otherwise).
palette_lock = false

# Fixed palette used instead of quantization while palette_lock is on.
# custom_palette = [{ r = 15, g = 56, b = 15 }, { r = 155, g = 188, b = 15 }]

batch_mode = false

# GIF container hints: repeat 0 = loop forever, -1 = play once, n = n loops.
gif_repeat = 0
gif_dither = false
gif_disposal = 2

# ---------------------------------------------------------------------------
# Art description (manifest keys, file names, frame tags)
# ---------------------------------------------------------------------------
[art]
id = "sprite"
name = ""
# One of: 8-bit, 16-bit, gameboy, hi-bit (anything else uses generic budgets)
style = "8-bit"
category = "character"
# One of: single, spritesheet, batch, multi-sheet
kind = "spritesheet"
# One action per grid row, e.g. ["idle", "walk"]
actions = []

# ---------------------------------------------------------------------------
# Video capture
# ---------------------------------------------------------------------------
[video]
# Square output resolution (must be even).
display_size = 512
# "unpaced" streams frames immediately; "realtime" waits 1000/fps ms per frame.
pacing = "unpaced"
# Number of full animation loops recorded.
cycles = 2

# ---------------------------------------------------------------------------
# Mobile bundle
# ---------------------------------------------------------------------------
[mobile]
use_webp = false
adaptive_icons = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum export jobs run at once by the `all` command.
# Unset means one job per CPU core.
# max_processes = 4
"##
}
