//! Shared types used across the frame pipeline and every exporter.
//!
//! These types are deserialized from `forge.toml` and serialized into the
//! JSON manifests, so their serde names are part of the file formats.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendering style tag of the generated art.
///
/// The style decides how many colors a palette-locked frame may keep.
/// Unknown tags deserialize as [`PixelStyle::Other`] instead of failing, so
/// art generated with newer styles still exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PixelStyle {
    #[default]
    EightBit,
    SixteenBit,
    Gameboy,
    HiBit,
    /// Any other style tag; falls back to the generic color budgets.
    Other,
}

impl PixelStyle {
    /// Hardware palette size emulated by this style, if it has one.
    ///
    /// - `8-bit` / `gameboy` → 4 colors
    /// - `16-bit` → 16 colors
    /// - `hi-bit` → 64 colors
    pub fn palette_size(self) -> Option<usize> {
        match self {
            PixelStyle::EightBit | PixelStyle::Gameboy => Some(4),
            PixelStyle::SixteenBit => Some(16),
            PixelStyle::HiBit => Some(64),
            PixelStyle::Other => None,
        }
    }

    /// Color count for the palette-lock stage (generic default 32).
    pub fn lock_color_count(self) -> usize {
        self.palette_size().unwrap_or(32)
    }

    /// Color count for a GIF frame (generic default 256).
    pub fn gif_color_count(self) -> usize {
        self.palette_size().unwrap_or(256)
    }
}

impl fmt::Display for PixelStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PixelStyle::EightBit => "8-bit",
            PixelStyle::SixteenBit => "16-bit",
            PixelStyle::Gameboy => "gameboy",
            PixelStyle::HiBit => "hi-bit",
            PixelStyle::Other => "other",
        };
        f.write_str(s)
    }
}

impl From<String> for PixelStyle {
    fn from(tag: String) -> Self {
        tag.parse().unwrap_or(PixelStyle::Other)
    }
}

impl From<PixelStyle> for String {
    fn from(style: PixelStyle) -> Self {
        style.to_string()
    }
}

impl std::str::FromStr for PixelStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "8-bit" => Ok(PixelStyle::EightBit),
            "16-bit" => Ok(PixelStyle::SixteenBit),
            "gameboy" => Ok(PixelStyle::Gameboy),
            "hi-bit" => Ok(PixelStyle::HiBit),
            "other" => Ok(PixelStyle::Other),
            _ => Err(format!(
                "unknown style '{s}' (expected 8-bit, 16-bit, gameboy, hi-bit or other)"
            )),
        }
    }
}

/// What the generated art depicts. Only a few exporters branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    #[default]
    Character,
    Enemy,
    Tileset,
    TilesetBitmask,
    Prop,
    Background,
    UiPanel,
    IconSet,
    Projectile,
    Vfx,
    PlayingCard,
}

impl AssetCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetCategory::Character => "character",
            AssetCategory::Enemy => "enemy",
            AssetCategory::Tileset => "tileset",
            AssetCategory::TilesetBitmask => "tileset_bitmask",
            AssetCategory::Prop => "prop",
            AssetCategory::Background => "background",
            AssetCategory::UiPanel => "ui_panel",
            AssetCategory::IconSet => "icon_set",
            AssetCategory::Projectile => "projectile",
            AssetCategory::Vfx => "vfx",
            AssetCategory::PlayingCard => "playing_card",
        }
    }

    /// Categories that get Android adaptive launcher icons in a mobile bundle.
    pub fn wants_adaptive_icon(self) -> bool {
        matches!(
            self,
            AssetCategory::IconSet
                | AssetCategory::UiPanel
                | AssetCategory::Character
                | AssetCategory::PlayingCard
        )
    }
}

/// A named animation action; one grid row per action on a multi-action sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationAction {
    Idle,
    Walk,
    Run,
    Jump,
    Fly,
    Attack,
    Talk,
    Hit,
    Death,
    None,
}

impl AnimationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AnimationAction::Idle => "idle",
            AnimationAction::Walk => "walk",
            AnimationAction::Run => "run",
            AnimationAction::Jump => "jump",
            AnimationAction::Fly => "fly",
            AnimationAction::Attack => "attack",
            AnimationAction::Talk => "talk",
            AnimationAction::Hit => "hit",
            AnimationAction::Death => "death",
            AnimationAction::None => "none",
        }
    }
}

/// How the source sheet was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtKind {
    Single,
    #[default]
    Spritesheet,
    /// Four unrelated variations on a 2×2 grid.
    Batch,
    /// One row per action.
    MultiSheet,
}

/// 9-slice insets in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SliceData {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

/// An opaque RGB color as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Descriptive data about the art being exported.
///
/// Nothing here touches pixels; exporters use it for file names, manifest
/// keys and frame tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpriteArt {
    /// Stable identifier, used in manifest keys and image names.
    pub id: String,
    /// Human-readable name (usually the generation prompt).
    pub name: String,
    pub style: PixelStyle,
    pub category: AssetCategory,
    pub kind: ArtKind,
    pub actions: Vec<AnimationAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice: Option<SliceData>,
}

impl Default for SpriteArt {
    fn default() -> Self {
        Self {
            id: "sprite".to_string(),
            name: String::new(),
            style: PixelStyle::default(),
            category: AssetCategory::default(),
            kind: ArtKind::default(),
            actions: Vec::new(),
            slice: None,
        }
    }
}

impl SpriteArt {
    /// File-system friendly name: non-alphanumerics → `_`, lower-cased,
    /// at most 20 characters, `asset` when nothing is left.
    pub fn safe_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .take(20)
            .collect();
        if cleaned.is_empty() {
            "asset".to_string()
        } else {
            cleaned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_color_counts() {
        assert_eq!(PixelStyle::Gameboy.lock_color_count(), 4);
        assert_eq!(PixelStyle::EightBit.lock_color_count(), 4);
        assert_eq!(PixelStyle::SixteenBit.lock_color_count(), 16);
        assert_eq!(PixelStyle::HiBit.lock_color_count(), 64);
        assert_eq!(PixelStyle::Other.lock_color_count(), 32);
        assert_eq!(PixelStyle::Other.gif_color_count(), 256);
        assert_eq!(PixelStyle::SixteenBit.gif_color_count(), 16);
    }

    #[test]
    fn style_parses_from_tag() {
        assert_eq!("hi-bit".parse::<PixelStyle>(), Ok(PixelStyle::HiBit));
        assert!("watercolor".parse::<PixelStyle>().is_err());
    }

    #[test]
    fn unknown_style_deserializes_as_other() {
        #[derive(Deserialize)]
        struct Wrapper {
            style: PixelStyle,
        }
        let w: Wrapper = toml::from_str(r#"style = "32-bit""#).unwrap();
        assert_eq!(w.style, PixelStyle::Other);
    }

    #[test]
    fn safe_name_sanitizes_and_truncates() {
        let art = SpriteArt {
            name: "Brave Knight: Idle Loop (v2) extra".to_string(),
            ..SpriteArt::default()
        };
        assert_eq!(art.safe_name(), "brave_knight__idle_l");
    }

    #[test]
    fn safe_name_falls_back_to_asset() {
        assert_eq!(SpriteArt::default().safe_name(), "asset");
    }

    #[test]
    fn adaptive_icon_categories() {
        assert!(AssetCategory::IconSet.wants_adaptive_icon());
        assert!(AssetCategory::PlayingCard.wants_adaptive_icon());
        assert!(!AssetCategory::Tileset.wants_adaptive_icon());
    }
}
