//! Mobile bundle export.
//!
//! Lays the composited sheet out the way Android Studio and Xcode expect
//! to find it:
//!
//! ```text
//! <dest>/
//! ├── android/res/
//! │   ├── drawable-mdpi/<file>.png        ×1
//! │   ├── drawable-xhdpi/<file>.png       ×2
//! │   ├── drawable-xxhdpi/<file>.png      ×3
//! │   ├── drawable-xxxhdpi/<file>.png     ×4
//! │   ├── mipmap-anydpi-v26/ic_launcher.xml        (adaptive icons only)
//! │   └── drawable-nodpi/ic_launcher_{background,foreground}.png
//! └── ios/Assets.xcassets/<file>.imageset/
//!     ├── <file>.png, <file>@2x.png, <file>@3x.png
//!     └── Contents.json
//! ```
//!
//! `<file>` is `<category>_<safe_name>`. Android drawables use WebP when
//! `mobile.use_webp` is set; iOS always gets PNG. Every scale is a
//! nearest-neighbour upscale of the same sheet.
//!
//! The bundle is assembled in a [`Staging`] area inside `dest` and only
//! moved into place once every file is written. Files in `dest` that the
//! bundle does not produce are never touched.

use super::{ExportInput, ExportKind, ExportReport, Result, Staging, build_sheet};
use crate::config::MobileConfig;
use crate::imaging::{EncodeFormat, RasterBackend};
use crate::palette::Quantizer;
use crate::worker::CancelToken;
use image::{Rgba, RgbaImage, imageops};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Android density buckets by scale factor.
const ANDROID_DENSITIES: [(u32, &str); 4] = [
    (1, "drawable-mdpi"),
    (2, "drawable-xhdpi"),
    (3, "drawable-xxhdpi"),
    (4, "drawable-xxxhdpi"),
];

/// iOS scale suffixes by scale factor.
const IOS_SCALES: [(u32, &str); 3] = [(1, ""), (2, "@2x"), (3, "@3x")];

/// Adaptive icon canvas side in dp-independent pixels.
const ICON_CANVAS: u32 = 108;
/// Largest foreground inside the adaptive icon safe zone.
const ICON_SAFE_ZONE: u32 = 72;
/// Background when no custom palette is set (stone-900).
const ICON_BACKGROUND: [u8; 4] = [0x1c, 0x19, 0x17, 255];

const ADAPTIVE_ICON_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<adaptive-icon xmlns:android="http://schemas.android.com/apk/res/android">
    <background android:drawable="@drawable/ic_launcher_background" />
    <foreground android:drawable="@drawable/ic_launcher_foreground" />
</adaptive-icon>
"#;

#[derive(Debug, Serialize)]
struct ImagesetEntry {
    idiom: &'static str,
    scale: String,
    filename: String,
}

#[derive(Debug, Serialize)]
struct ImagesetInfo {
    version: u32,
    author: &'static str,
}

/// `Contents.json` of an Xcode imageset.
#[derive(Debug, Serialize)]
struct ImagesetContents {
    images: Vec<ImagesetEntry>,
    info: ImagesetInfo,
}

fn imageset_contents(file: &str) -> ImagesetContents {
    ImagesetContents {
        images: IOS_SCALES
            .iter()
            .map(|&(scale, suffix)| ImagesetEntry {
                idiom: "universal",
                scale: format!("{scale}x"),
                filename: format!("{file}{suffix}.png"),
            })
            .collect(),
        info: ImagesetInfo {
            version: 1,
            author: "ArcanePixelForge",
        },
    }
}

/// Adaptive icon layers: flat background and frame 0 centred in the safe
/// zone.
fn adaptive_icon_layers(
    backend: &impl RasterBackend,
    sheet: &RgbaImage,
    side: u32,
    background: [u8; 4],
) -> Result<(RgbaImage, RgbaImage)> {
    let back = RgbaImage::from_pixel(ICON_CANVAS, ICON_CANVAS, Rgba(background));

    let fg_side = side.min(ICON_SAFE_ZONE);
    let first = imageops::crop_imm(sheet, 0, 0, side, side).to_image();
    let scaled = backend.scale_nearest(&first, fg_side, fg_side)?;
    let mut front = RgbaImage::new(ICON_CANVAS, ICON_CANVAS);
    let offset = ((ICON_CANVAS - fg_side) / 2) as i64;
    imageops::replace(&mut front, &scaled, offset, offset);
    Ok((back, front))
}

fn write_bundle(
    backend: &impl RasterBackend,
    input: &ExportInput<'_>,
    mobile: &MobileConfig,
    sheet: &RgbaImage,
    staging: &mut Staging,
    cancel: &CancelToken,
) -> Result<()> {
    let art = input.art;
    let file = format!("{}_{}", art.category.as_str(), art.safe_name());
    let android_format = if mobile.use_webp {
        EncodeFormat::WebP
    } else {
        EncodeFormat::Png
    };
    let android = PathBuf::from("android/res");
    let imageset = PathBuf::from(format!("ios/Assets.xcassets/{file}.imageset"));
    let (width, height) = sheet.dimensions();

    for scale in 1..=4u32 {
        cancel.check()?;
        let scaled = backend.scale_nearest(
            sheet,
            width.saturating_mul(scale),
            height.saturating_mul(scale),
        )?;
        if let Some(&(_, folder)) = ANDROID_DENSITIES.iter().find(|(s, _)| *s == scale) {
            let bytes = backend.encode(&scaled, android_format)?;
            staging.write(
                android
                    .join(folder)
                    .join(format!("{file}.{}", android_format.extension())),
                &bytes,
            )?;
        }
        if let Some(&(_, suffix)) = IOS_SCALES.iter().find(|(s, _)| *s == scale) {
            let bytes = backend.encode(&scaled, EncodeFormat::Png)?;
            staging.write(imageset.join(format!("{file}{suffix}.png")), &bytes)?;
        }
    }

    if mobile.adaptive_icons && art.category.wants_adaptive_icon() {
        cancel.check()?;
        let background = input
            .settings
            .custom_palette
            .first()
            .map(|c| [c.r, c.g, c.b, 255])
            .unwrap_or(ICON_BACKGROUND);
        let (back, front) = adaptive_icon_layers(
            backend,
            sheet,
            input.settings.target_resolution,
            background,
        )?;
        let ext = android_format.extension();
        staging.write(
            android.join("mipmap-anydpi-v26/ic_launcher.xml"),
            ADAPTIVE_ICON_XML.as_bytes(),
        )?;
        staging.write(
            android.join(format!("drawable-nodpi/ic_launcher_background.{ext}")),
            &backend.encode(&back, android_format)?,
        )?;
        staging.write(
            android.join(format!("drawable-nodpi/ic_launcher_foreground.{ext}")),
            &backend.encode(&front, android_format)?,
        )?;
    }

    let contents = serde_json::to_string_pretty(&imageset_contents(&file))?;
    staging.write(imageset.join("Contents.json"), contents.as_bytes())
}

/// Build the Android/iOS bundle for the sheet and move it into `dest`.
///
/// Files from a previous bundle with the same names are overwritten; any
/// other content of `dest` stays as it was.
pub fn export_mobile(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    input: &ExportInput<'_>,
    mobile: &MobileConfig,
    dest: &Path,
    cancel: &CancelToken,
) -> Result<ExportReport> {
    let sheet = build_sheet(backend, quantizer, input, cancel)?;
    let mut staging = Staging::new(dest)?;

    if let Err(e) = write_bundle(backend, input, mobile, &sheet, &mut staging, cancel)
        .and_then(|()| cancel.check())
    {
        warn!(error = %e, "mobile bundle failed; discarding staging");
        return Err(e);
    }
    let files = staging.commit()?;

    info!(dir = %dest.display(), files = files.len(), "mobile bundle written");
    Ok(ExportReport {
        kind: ExportKind::Mobile,
        frames: input.settings.frame_count(),
        files,
    })
}
