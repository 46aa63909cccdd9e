//! End-to-end exports through the public API with the real backend,
//! quantizer and GIF encoder on synthetic sheets.
//!
//! Run with: cargo test --test export_pipeline

use image::{Rgba, RgbaImage};
use sprite_forge::aseprite::generate_aseprite_metadata;
use sprite_forge::config::{AnimationSettings, ForgeConfig, load_config};
use sprite_forge::export::{ExportError, ExportInput, all, atlas, gif, png, write_atomic};
use sprite_forge::imaging::{BackendError, FrameError, RasterBackend, RustBackend, process_frame};
use sprite_forge::palette::NeuQuantizer;
use sprite_forge::types::{AnimationAction, PixelStyle, SpriteArt};
use sprite_forge::worker::{CancelToken, spawn_export};
use std::collections::HashSet;
use std::path::Path;

const MAGENTA: [u8; 4] = [255, 0, 255, 255];

/// Magenta sheet with a two-tone sprite in every cell: a body colour per
/// cell and a darker outline ring.
fn sheet(cols: u32, rows: u32, cell: u32) -> RgbaImage {
    let margin = cell / 4;
    RgbaImage::from_fn(cols * cell, rows * cell, |x, y| {
        let (cx, cy) = (x % cell, y % cell);
        let index = (y / cell) * cols + x / cell;
        let inside = |m: u32| (m..cell - m).contains(&cx) && (m..cell - m).contains(&cy);
        if inside(margin + 2) {
            Rgba([40 + index as u8 * 20, 180, 60, 255])
        } else if inside(margin) {
            Rgba([20, 20, 40, 255])
        } else {
            Rgba(MAGENTA)
        }
    })
}

fn write_sheet(dir: &Path, image: &RgbaImage) -> std::path::PathBuf {
    let path = dir.join("sheet.png");
    image.save(&path).unwrap();
    path
}

fn config(cols: u32, rows: u32) -> ForgeConfig {
    ForgeConfig {
        animation: AnimationSettings {
            rows,
            cols,
            target_resolution: 16,
            ..AnimationSettings::default()
        },
        ..ForgeConfig::default()
    }
}

#[test]
fn sheet_from_disk_is_keyed() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = write_sheet(tmp.path(), &sheet(2, 2, 32));
    let backend = RustBackend::new();
    let source = backend.load(&path).unwrap();
    let config = config(2, 2);

    let frame = process_frame(
        &backend,
        &NeuQuantizer::new(),
        &source,
        3,
        &config.animation,
        PixelStyle::SixteenBit,
    )
    .unwrap();
    assert_eq!(frame.dimensions(), (16, 16));
    assert_eq!(frame.get_pixel(0, 0)[3], 0);
    assert_eq!(frame.get_pixel(8, 8).0, [100, 180, 60, 255]);
}

#[test]
fn gif_has_one_frame_per_cell() {
    let source = sheet(3, 2, 32);
    let config = config(3, 2);
    let input = ExportInput::new(&source, &config);
    let bytes = gif::export_gif(
        &RustBackend::new(),
        &NeuQuantizer::new(),
        &input,
        &CancelToken::new(),
    )
    .unwrap();

    let mut options = ::gif::DecodeOptions::new();
    options.set_color_output(::gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(bytes.as_slice()).unwrap();
    let mut frames = 0;
    while let Some(frame) = decoder.read_next_frame().unwrap() {
        assert_eq!((frame.width, frame.height), (16, 16));
        assert_eq!(frame.delay, 13);
        assert_eq!(frame.transparent, Some(0));
        assert!(frame.palette.as_ref().is_some_and(|p| p.len() / 3 <= 4));
        frames += 1;
    }
    assert_eq!(frames, 6);
}

#[test]
fn palette_lock_limits_sheet_colors() {
    let source = sheet(2, 2, 32);
    let mut config = config(2, 2);
    config.animation.palette_lock = true;
    config.art.style = PixelStyle::Gameboy;
    let backend = RustBackend::new();
    let bytes = png::export_png(
        &backend,
        &NeuQuantizer::new(),
        &ExportInput::new(&source, &config),
        &CancelToken::new(),
    )
    .unwrap();

    let sheet = backend.decode(&bytes).unwrap();
    assert_eq!(sheet.dimensions(), (32, 32));
    for cell in 0..4 {
        let (x0, y0) = ((cell % 2) * 16, (cell / 2) * 16);
        let colors: HashSet<[u8; 4]> = (y0..y0 + 16)
            .flat_map(|y| (x0..x0 + 16).map(move |x| (x, y)))
            .map(|(x, y)| sheet.get_pixel(x, y).0)
            .collect();
        assert!(colors.len() <= 4, "cell {cell} has {} colors", colors.len());
    }
}

#[test]
fn config_file_drives_atlas_names() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config_path = tmp.path().join("forge.toml");
    std::fs::write(
        &config_path,
        r#"
[animation]
rows = 2
cols = 2
target_resolution = 8

[art]
name = "Slime King"
actions = ["idle", "attack"]
"#,
    )
    .unwrap();
    let config = load_config(&config_path).unwrap();
    assert_eq!(config.art.actions, [AnimationAction::Idle, AnimationAction::Attack]);

    let source = sheet(2, 2, 16);
    let out = tmp.path().join("atlas");
    let report = atlas::export_atlas(
        &RustBackend::new(),
        &NeuQuantizer::new(),
        &ExportInput::new(&source, &config),
        &out,
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(report.files.len(), 2);

    let json = std::fs::read_to_string(out.join("slime_king.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    for name in ["idle_0", "idle_1", "attack_2", "attack_3"] {
        assert!(value["frames"].get(name).is_some(), "missing {name}");
    }
}

#[test]
fn background_gif_job_writes_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("anim.gif");
    let target = out.clone();
    let job = spawn_export("gif", move |cancel| {
        let source = sheet(2, 2, 16);
        let config = config(2, 2);
        let bytes = gif::export_gif(
            &RustBackend::new(),
            &NeuQuantizer::new(),
            &ExportInput::new(&source, &config),
            &cancel,
        )?;
        write_atomic(&target, &bytes)
    })
    .unwrap();
    let written = job.wait().unwrap();
    assert_eq!(written.path, out);
    assert_eq!(&std::fs::read(&out).unwrap()[..6], b"GIF89a");
}

#[test]
fn cancelled_background_job_reports_cancelled() {
    let job = spawn_export("cancel", |cancel| {
        while !cancel.is_cancelled() {
            std::thread::yield_now();
        }
        cancel.check()
    })
    .unwrap();
    job.cancel();
    assert!(matches!(job.wait(), Err(ExportError::Cancelled)));
}

#[test]
fn aseprite_manifest_for_two_actions() {
    let art = SpriteArt {
        id: "hero".to_string(),
        actions: vec![AnimationAction::Idle, AnimationAction::Walk],
        ..SpriteArt::default()
    };
    let settings = AnimationSettings {
        rows: 2,
        cols: 2,
        fps: 8,
        ..AnimationSettings::default()
    };
    let json = generate_aseprite_metadata(&art, &settings).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let tags = value["meta"]["frameTags"].as_array().unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0]["name"], "IDLE");
    assert_eq!(tags[0]["from"], 0);
    assert_eq!(tags[0]["to"], 1);
    assert_eq!(tags[1]["name"], "WALK");
    assert_eq!(tags[1]["from"], 2);
    assert_eq!(tags[1]["to"], 3);

    let frames = value["frames"].as_object().unwrap();
    assert_eq!(frames.len(), 4);
    assert!(frames.values().all(|f| f["duration"] == 125));
}

#[test]
fn unvalidated_huge_grid_is_an_allocation_error() {
    let source = sheet(1, 1, 32);
    let mut config = config(70_000, 1);
    config.animation.target_resolution = 70_000;
    assert!(config.validate().is_err());

    let result = png::export_png(
        &RustBackend::new(),
        &NeuQuantizer::new(),
        &ExportInput::new(&source, &config),
        &CancelToken::new(),
    );
    assert!(matches!(
        result,
        Err(ExportError::Frame(FrameError::Backend(BackendError::Allocation { .. })))
    ));
}

#[test]
fn all_exports_share_one_directory_with_a_project() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Cargo.toml"), "[package]").unwrap();
    let source = sheet(2, 1, 32);
    let mut config = config(2, 1);
    config.art.name = "Slime".to_string();

    let reports = all::export_all(
        &RustBackend::new(),
        &NeuQuantizer::new(),
        &ExportInput::new(&source, &config),
        tmp.path(),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(reports.len(), 4);
    let names: HashSet<String> = std::fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    let expected: HashSet<String> = ["Cargo.toml", "slime.png", "slime.gif", "slime.svg", "slime.json"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(names, expected);
}
