//! Texture atlas export: the composited sheet plus a JSON region table.
//!
//! Writes `<safe_name>.png` and `<safe_name>.json` into the output
//! directory. Region names are what game code looks frames up by:
//! `icon_<i>` for icon sets, otherwise `<action>_<i>`. The two files are
//! staged and committed together, so a failed export leaves neither.

use super::{ExportInput, ExportKind, ExportReport, Result, Staging, build_sheet};
use crate::aseprite::{FrameEntry, FrameTable, MANIFEST_APP, MANIFEST_VERSION, Size};
use crate::config::AnimationSettings;
use crate::imaging::{
    EncodeFormat, FrameError, GridError, RasterBackend, cell_origin, sheet_dimensions,
};
use crate::palette::Quantizer;
use crate::types::{AnimationAction, ArtKind, AssetCategory, SpriteArt};
use crate::worker::CancelToken;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AtlasMeta {
    pub app: &'static str,
    pub version: &'static str,
    pub image: String,
    pub format: &'static str,
    pub size: Size,
    pub scale: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Atlas {
    pub frames: FrameTable,
    pub meta: AtlasMeta,
}

/// Name of the region at grid cell `(row, col)`.
pub fn region_name(art: &SpriteArt, rows: u32, cols: u32, row: u32, col: u32) -> String {
    let linear = row * cols + col;
    if art.category == AssetCategory::IconSet {
        return format!("icon_{linear}");
    }
    let multi = art.kind == ArtKind::MultiSheet;
    let action = match art.actions.as_slice() {
        [] => AnimationAction::Idle,
        actions if multi || actions.len() == rows as usize => {
            actions[row as usize % actions.len()]
        }
        [first, ..] => *first,
    };
    let index = if multi { col } else { linear };
    format!("{}_{index}", action.as_str())
}

/// Region table for a sheet described by `art` and `settings`.
pub fn build_atlas(
    art: &SpriteArt,
    settings: &AnimationSettings,
) -> std::result::Result<Atlas, GridError> {
    let side = settings.target_resolution;
    let (w, h) = sheet_dimensions(settings.cols, settings.rows, side)?;
    let frames = (0..settings.frame_count())
        .map(|i| {
            let (row, col) = (i / settings.cols, i % settings.cols);
            let (x, y) = cell_origin(i, settings.cols, side);
            (
                region_name(art, settings.rows, settings.cols, row, col),
                FrameEntry::cell(x, y, side),
            )
        })
        .collect();
    Ok(Atlas {
        frames: FrameTable(frames),
        meta: AtlasMeta {
            app: MANIFEST_APP,
            version: MANIFEST_VERSION,
            image: format!("{}.png", art.safe_name()),
            format: "RGBA8888",
            size: Size { w, h },
            scale: "1",
        },
    })
}

/// Composite the sheet and write it with its atlas JSON into `out_dir`.
pub fn export_atlas(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    input: &ExportInput<'_>,
    out_dir: &Path,
    cancel: &CancelToken,
) -> Result<ExportReport> {
    let sheet = build_sheet(backend, quantizer, input, cancel)?;
    let png = backend.encode(&sheet, EncodeFormat::Png)?;
    let atlas = build_atlas(input.art, input.settings).map_err(FrameError::from)?;
    let json = serde_json::to_string_pretty(&atlas)?;
    cancel.check()?;

    let name = input.art.safe_name();
    let mut staging = Staging::new(out_dir)?;
    staging.write(format!("{name}.png"), &png)?;
    staging.write(format!("{name}.json"), json.as_bytes())?;
    let files = staging.commit()?;
    info!(dir = %out_dir.display(), regions = atlas.frames.len(), "atlas written");
    Ok(ExportReport {
        kind: ExportKind::Atlas,
        frames: input.settings.frame_count(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{ExportError, STAGING_DIR};
    use crate::imaging::RustBackend;
    use crate::palette::tests::FakeQuantizer;
    use crate::test_helpers::{small_settings, sprite_sheet};

    fn art(actions: Vec<AnimationAction>, kind: ArtKind) -> SpriteArt {
        SpriteArt {
            name: "Fire Mage".to_string(),
            actions,
            kind,
            ..SpriteArt::default()
        }
    }

    #[test]
    fn icon_sets_use_linear_icon_names() {
        let icons = SpriteArt {
            category: AssetCategory::IconSet,
            ..SpriteArt::default()
        };
        assert_eq!(region_name(&icons, 2, 3, 1, 2), "icon_5");
    }

    #[test]
    fn no_actions_default_to_idle() {
        let a = art(vec![], ArtKind::Spritesheet);
        assert_eq!(region_name(&a, 2, 2, 1, 0), "idle_2");
    }

    #[test]
    fn one_action_per_row_when_counts_match() {
        use AnimationAction::*;
        let a = art(vec![Walk, Run], ArtKind::Spritesheet);
        assert_eq!(region_name(&a, 2, 4, 0, 3), "walk_3");
        assert_eq!(region_name(&a, 2, 4, 1, 0), "run_4");
    }

    #[test]
    fn mismatched_actions_use_the_first() {
        use AnimationAction::*;
        let a = art(vec![Attack, Hit, Death], ArtKind::Spritesheet);
        assert_eq!(region_name(&a, 2, 2, 1, 1), "attack_3");
    }

    #[test]
    fn multi_sheets_cycle_actions_and_count_columns() {
        use AnimationAction::*;
        let a = art(vec![Idle, Jump], ArtKind::MultiSheet);
        assert_eq!(region_name(&a, 4, 4, 2, 3), "idle_3");
        assert_eq!(region_name(&a, 4, 4, 3, 1), "jump_1");
    }

    #[test]
    fn atlas_meta_names_the_image() {
        let atlas =
            build_atlas(&art(vec![], ArtKind::Spritesheet), &small_settings(3, 2)).unwrap();
        assert_eq!(atlas.meta.image, "fire_mage.png");
        assert_eq!(atlas.meta.size, Size { w: 24, h: 16 });
        assert_eq!(atlas.frames.len(), 6);
        assert_eq!(atlas.frames.get("idle_4").unwrap().frame.x, 8);
        assert_eq!(atlas.frames.get("idle_4").unwrap().duration, None);
    }

    #[test]
    fn export_writes_png_and_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = sprite_sheet(2, 2, 16);
        let settings = small_settings(2, 2);
        let art = art(vec![AnimationAction::Walk], ArtKind::Spritesheet);
        let input = ExportInput {
            source: &source,
            settings: &settings,
            art: &art,
        };
        let report = export_atlas(
            &RustBackend::new(),
            &FakeQuantizer::new(),
            &input,
            tmp.path(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(report.files.len(), 2);
        let png = tmp.path().join("fire_mage.png");
        let json = std::fs::read_to_string(tmp.path().join("fire_mage.json")).unwrap();
        assert!(png.exists());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["frames"]["walk_3"]["frame"]["y"], 8);
        assert!(value["frames"]["walk_3"].get("duration").is_none());
        assert_eq!(value["meta"]["image"], "fire_mage.png");
    }

    #[test]
    fn cancelled_export_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = sprite_sheet(2, 2, 16);
        let settings = small_settings(2, 2);
        let art = SpriteArt::default();
        let input = ExportInput {
            source: &source,
            settings: &settings,
            art: &art,
        };
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = export_atlas(
            &RustBackend::new(),
            &FakeQuantizer::new(),
            &input,
            tmp.path(),
            &cancel,
        );
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn json_failure_leaves_no_sheet_behind() {
        let tmp = tempfile::TempDir::new().unwrap();
        // A directory squatting on the JSON path makes its commit fail.
        std::fs::create_dir_all(tmp.path().join("fire_mage.json/keep")).unwrap();
        let source = sprite_sheet(2, 2, 16);
        let settings = small_settings(2, 2);
        let art = art(vec![], ArtKind::Spritesheet);
        let input = ExportInput {
            source: &source,
            settings: &settings,
            art: &art,
        };
        let result = export_atlas(
            &RustBackend::new(),
            &FakeQuantizer::new(),
            &input,
            tmp.path(),
            &CancelToken::new(),
        );

        assert!(matches!(result, Err(ExportError::OutputIsDirectory(_))));
        assert!(!tmp.path().join("fire_mage.png").exists());
        assert!(!tmp.path().join(STAGING_DIR).exists());
        assert!(tmp.path().join("fire_mage.json/keep").is_dir());
    }

    #[test]
    fn oversized_grid_is_an_error() {
        let settings = AnimationSettings {
            rows: 1,
            cols: 70_000,
            target_resolution: 70_000,
            ..AnimationSettings::default()
        };
        let result = build_atlas(&art(vec![], ArtKind::Spritesheet), &settings);
        assert!(matches!(result, Err(GridError::SheetTooLarge { .. })));
    }
}
