//! Aseprite sprite-sheet manifest.
//!
//! Pure layout math over the grid settings: one frame entry per cell and
//! one tag per action row. No pixels are read, so the manifest can be
//! produced before (or without) any image export.
//!
//! The JSON follows Aseprite's hash-style sheet export:
//!
//! ```json
//! {
//!   "frames": {
//!     "character_knight_0.png": {
//!       "frame": { "x": 0, "y": 0, "w": 32, "h": 32 },
//!       "rotated": false, "trimmed": false,
//!       "spriteSourceSize": { "x": 0, "y": 0, "w": 32, "h": 32 },
//!       "sourceSize": { "w": 32, "h": 32 },
//!       "duration": 125
//!     }
//!   },
//!   "meta": {
//!     "app": "Arcane Pixel Forge", "version": "1.0",
//!     "image": "pxl_flux_knight.png", "format": "RGBA8888",
//!     "size": { "w": 128, "h": 128 }, "scale": "1",
//!     "frameTags": [{ "name": "IDLE", "from": 0, "to": 3, "direction": "forward" }],
//!     "slices": []
//!   }
//! }
//! ```
//!
//! Frame keys keep grid order. `serde_json` maps are sorted, so
//! [`FrameTable`] serializes its entries itself.

use crate::config::AnimationSettings;
use crate::imaging::{GridError, cell_origin, frame_dimensions, sheet_dimensions};
use crate::types::{ArtKind, SpriteArt};
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Application name written into every manifest.
pub const MANIFEST_APP: &str = "Arcane Pixel Forge";
pub const MANIFEST_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

/// One sheet cell, shared by the Aseprite manifest and the texture atlas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameEntry {
    pub frame: Rect,
    pub rotated: bool,
    pub trimmed: bool,
    pub sprite_source_size: Rect,
    pub source_size: Size,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl FrameEntry {
    /// Untrimmed, unrotated entry for the `side`-px cell at `(x, y)`.
    pub fn cell(x: u32, y: u32, side: u32) -> Self {
        Self {
            frame: Rect { x, y, w: side, h: side },
            rotated: false,
            trimmed: false,
            sprite_source_size: Rect {
                x: 0,
                y: 0,
                w: side,
                h: side,
            },
            source_size: Size { w: side, h: side },
            duration: None,
        }
    }
}

/// Frame entries keyed by name, serialized as a JSON object in insertion
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameTable(pub Vec<(String, FrameEntry)>);

impl FrameTable {
    pub fn get(&self, key: &str) -> Option<&FrameEntry> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FrameTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameTag {
    pub name: String,
    pub from: u32,
    pub to: u32,
    pub direction: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SliceKey {
    pub frame: u32,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slice {
    pub name: &'static str,
    pub color: &'static str,
    pub keys: Vec<SliceKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsepriteMeta {
    pub app: &'static str,
    pub version: &'static str,
    pub image: String,
    pub format: &'static str,
    pub size: Size,
    pub scale: &'static str,
    pub frame_tags: Vec<FrameTag>,
    pub slices: Vec<Slice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsepriteManifest {
    pub frames: FrameTable,
    pub meta: AsepriteMeta,
}

fn forward(name: String, from: u32, to: u32) -> FrameTag {
    FrameTag {
        name,
        from,
        to,
        direction: "forward",
    }
}

/// One tag per action, each spanning a `cols`-wide run of frames.
///
/// Batch sheets get four single-frame `Var_n` tags instead; art without
/// actions gets a single `NONE` tag.
pub fn frame_tags(art: &SpriteArt, settings: &AnimationSettings) -> Vec<FrameTag> {
    if art.kind == ArtKind::Batch || settings.batch_mode {
        return (0..4).map(|i| forward(format!("Var_{}", i + 1), i, i)).collect();
    }
    let cols = settings.cols;
    let names: Vec<String> = if art.actions.is_empty() {
        vec!["none".to_string()]
    } else {
        art.actions.iter().map(|a| a.as_str().to_string()).collect()
    };
    names
        .into_iter()
        .zip(0u32..)
        .map(|(name, idx)| {
            forward(
                name.to_uppercase(),
                idx.saturating_mul(cols),
                (idx + 1).saturating_mul(cols).saturating_sub(1),
            )
        })
        .collect()
}

/// 9-slice definition from the art's insets.
fn slices(art: &SpriteArt, side: u32) -> Vec<Slice> {
    art.slice
        .map(|s| Slice {
            name: "9slice",
            color: "#0000ff",
            keys: vec![SliceKey {
                frame: 0,
                bounds: Rect {
                    x: s.left,
                    y: s.top,
                    w: side.saturating_sub(s.left.saturating_add(s.right)),
                    h: side.saturating_sub(s.top.saturating_add(s.bottom)),
                },
            }],
        })
        .into_iter()
        .collect()
}

/// Build the manifest structure.
pub fn aseprite_manifest(
    art: &SpriteArt,
    settings: &AnimationSettings,
) -> Result<AsepriteManifest, GridError> {
    let (side, _) = frame_dimensions(settings);
    let (w, h) = sheet_dimensions(settings.cols, settings.rows, side)?;
    let duration = settings.frame_duration_ms();

    let frames = (0..settings.frame_count())
        .map(|i| {
            let (x, y) = cell_origin(i, settings.cols, side);
            let key = format!("{}_{}_{}.png", art.category.as_str(), art.id, i);
            let entry = FrameEntry {
                duration: Some(duration),
                ..FrameEntry::cell(x, y, side)
            };
            (key, entry)
        })
        .collect();

    Ok(AsepriteManifest {
        frames: FrameTable(frames),
        meta: AsepriteMeta {
            app: MANIFEST_APP,
            version: MANIFEST_VERSION,
            image: format!("pxl_flux_{}.png", art.id),
            format: "RGBA8888",
            size: Size { w, h },
            scale: "1",
            frame_tags: frame_tags(art, settings),
            slices: slices(art, side),
        },
    })
}

/// Aseprite JSON for the sheet described by `art` and `settings`.
pub fn generate_aseprite_metadata(
    art: &SpriteArt,
    settings: &AnimationSettings,
) -> Result<String, ManifestError> {
    Ok(serde_json::to_string_pretty(&aseprite_manifest(art, settings)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnimationAction, AssetCategory, SliceData};
    use serde_json::Value;

    fn knight() -> SpriteArt {
        SpriteArt {
            id: "knight".to_string(),
            category: AssetCategory::Character,
            actions: vec![AnimationAction::Idle, AnimationAction::Walk],
            ..SpriteArt::default()
        }
    }

    fn two_by_two() -> AnimationSettings {
        AnimationSettings {
            rows: 2,
            cols: 2,
            fps: 8,
            ..AnimationSettings::default()
        }
    }

    #[test]
    fn action_tags_span_rows() {
        let tags = frame_tags(&knight(), &two_by_two());
        assert_eq!(
            tags,
            vec![forward("IDLE".into(), 0, 1), forward("WALK".into(), 2, 3)]
        );
    }

    #[test]
    fn every_frame_lasts_125ms() {
        let manifest = aseprite_manifest(&knight(), &two_by_two()).unwrap();
        assert_eq!(manifest.frames.len(), 4);
        assert!(manifest.frames.0.iter().all(|(_, f)| f.duration == Some(125)));
    }

    #[test]
    fn empty_actions_give_none_tag() {
        let art = SpriteArt {
            actions: vec![],
            ..knight()
        };
        let tags = frame_tags(&art, &two_by_two());
        assert_eq!(tags, vec![forward("NONE".into(), 0, 1)]);
    }

    #[test]
    fn batch_gets_variation_tags() {
        let art = SpriteArt {
            kind: ArtKind::Batch,
            ..knight()
        };
        let names: Vec<String> = frame_tags(&art, &two_by_two())
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["Var_1", "Var_2", "Var_3", "Var_4"]);

        let settings = AnimationSettings {
            batch_mode: true,
            ..two_by_two()
        };
        assert_eq!(frame_tags(&knight(), &settings)[3], forward("Var_4".into(), 3, 3));
    }

    #[test]
    fn frame_rects_follow_the_grid() {
        let settings = AnimationSettings {
            rows: 2,
            cols: 3,
            target_resolution: 16,
            ..AnimationSettings::default()
        };
        let manifest = aseprite_manifest(&knight(), &settings).unwrap();
        let entry = manifest.frames.get("character_knight_4.png").unwrap();
        assert_eq!(entry.frame, Rect { x: 16, y: 16, w: 16, h: 16 });
        assert_eq!(manifest.meta.size, Size { w: 48, h: 32 });
        assert_eq!(manifest.meta.image, "pxl_flux_knight.png");
    }

    #[test]
    fn json_keeps_grid_order_and_field_names() {
        let json = generate_aseprite_metadata(&knight(), &two_by_two()).unwrap();
        let keys: Vec<usize> = ["_0.png", "_1.png", "_2.png", "_3.png"]
            .iter()
            .map(|k| json.find(k).unwrap())
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));

        let value: Value = serde_json::from_str(&json).unwrap();
        let frame = &value["frames"]["character_knight_3.png"];
        assert_eq!(frame["duration"], 125);
        assert_eq!(frame["rotated"], false);
        assert_eq!(frame["spriteSourceSize"]["w"], 32);
        assert_eq!(frame["sourceSize"]["h"], 32);
        assert_eq!(value["meta"]["app"], "Arcane Pixel Forge");
        assert_eq!(value["meta"]["format"], "RGBA8888");
        assert_eq!(value["meta"]["scale"], "1");
        assert_eq!(value["meta"]["frameTags"][1]["name"], "WALK");
        assert_eq!(value["meta"]["frameTags"][1]["direction"], "forward");
        assert_eq!(value["meta"]["slices"], Value::Array(vec![]));
    }

    #[test]
    fn slice_insets_become_bounds() {
        let art = SpriteArt {
            slice: Some(SliceData {
                top: 4,
                bottom: 6,
                left: 3,
                right: 5,
            }),
            ..knight()
        };
        let manifest = aseprite_manifest(&art, &two_by_two()).unwrap();
        let slice = &manifest.meta.slices[0];
        assert_eq!(slice.name, "9slice");
        assert_eq!(slice.color, "#0000ff");
        assert_eq!(slice.keys[0].bounds, Rect { x: 3, y: 4, w: 24, h: 22 });
    }

    #[test]
    fn oversized_grid_is_rejected_not_wrapped() {
        let settings = AnimationSettings {
            rows: 1,
            cols: 70_000,
            target_resolution: 70_000,
            ..two_by_two()
        };
        let err = generate_aseprite_metadata(&knight(), &settings).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Grid(GridError::SheetTooLarge { cols: 70_000, .. })
        ));
    }

    #[test]
    fn huge_insets_saturate() {
        let art = SpriteArt {
            slice: Some(SliceData {
                top: u32::MAX,
                bottom: 1,
                left: u32::MAX,
                right: 1,
            }),
            ..knight()
        };
        let manifest = aseprite_manifest(&art, &two_by_two()).unwrap();
        let bounds = manifest.meta.slices[0].keys[0].bounds;
        assert_eq!((bounds.w, bounds.h), (0, 0));
    }
}
