//! SVG export: the composited sheet as crisp vector rectangles.
//!
//! Each horizontal run of identical RGBA pixels becomes one `<rect>`.
//! Fully transparent runs are skipped.

use super::{ExportInput, Result, build_sheet};
use crate::imaging::RasterBackend;
use crate::palette::Quantizer;
use crate::worker::CancelToken;
use image::RgbaImage;
use std::fmt::Write;
use tracing::info;

/// Render `sheet` as an SVG document.
pub fn render_svg(sheet: &RgbaImage) -> String {
    let (width, height) = sheet.dimensions();
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" shape-rendering="crispEdges">"#
    );
    svg.push('\n');

    for y in 0..height {
        let mut x = 0;
        while x < width {
            let color = sheet.get_pixel(x, y).0;
            let mut run = 1;
            while x + run < width && sheet.get_pixel(x + run, y).0 == color {
                run += 1;
            }
            if color[3] > 0 {
                push_rect(&mut svg, x, y, run, color);
            }
            x += run;
        }
    }

    svg.push_str("</svg>\n");
    svg
}

fn push_rect(svg: &mut String, x: u32, y: u32, width: u32, [r, g, b, a]: [u8; 4]) {
    // Writing into a String cannot fail.
    let _ = write!(
        svg,
        r##"<rect x="{x}" y="{y}" width="{width}" height="1" fill="#{r:02x}{g:02x}{b:02x}""##
    );
    if a < 255 {
        let _ = write!(svg, r#" fill-opacity="{:.3}""#, a as f32 / 255.0);
    }
    svg.push_str("/>\n");
}

/// SVG markup of the composited sheet.
pub fn export_svg(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    input: &ExportInput<'_>,
    cancel: &CancelToken,
) -> Result<String> {
    let sheet = build_sheet(backend, quantizer, input, cancel)?;
    let svg = render_svg(&sheet);
    info!(
        width = sheet.width(),
        height = sheet.height(),
        bytes = svg.len(),
        "SVG rendered"
    );
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::palette::tests::FakeQuantizer;
    use crate::test_helpers::{small_settings, sprite_sheet};
    use crate::types::SpriteArt;
    use image::Rgba;

    #[test]
    fn runs_merge_into_one_rect() {
        let mut sheet = RgbaImage::from_pixel(4, 1, Rgba([255, 0, 0, 255]));
        sheet.put_pixel(3, 0, Rgba([0, 0, 255, 255]));
        let svg = render_svg(&sheet);
        assert!(svg.contains(r##"<rect x="0" y="0" width="3" height="1" fill="#ff0000"/>"##));
        assert!(svg.contains(r##"<rect x="3" y="0" width="1" height="1" fill="#0000ff"/>"##));
        assert_eq!(svg.matches("<rect").count(), 2);
    }

    #[test]
    fn transparent_pixels_emit_nothing() {
        let sheet = RgbaImage::from_pixel(3, 3, Rgba([255, 255, 255, 0]));
        let svg = render_svg(&sheet);
        assert!(!svg.contains("<rect"));
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"viewBox="0 0 3 3""#));
        assert!(svg.contains(r#"shape-rendering="crispEdges""#));
    }

    #[test]
    fn translucent_runs_carry_opacity() {
        let sheet = RgbaImage::from_pixel(2, 1, Rgba([16, 32, 48, 128]));
        let svg = render_svg(&sheet);
        assert!(svg.contains(r##"fill="#102030" fill-opacity="0.502"/>"##));
    }

    #[test]
    fn sheet_export_skips_keyed_background() {
        let source = sprite_sheet(2, 1, 16);
        let settings = small_settings(2, 1);
        let art = SpriteArt::default();
        let input = ExportInput {
            source: &source,
            settings: &settings,
            art: &art,
        };
        let svg = export_svg(
            &RustBackend::new(),
            &FakeQuantizer::new(),
            &input,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(svg.contains(r#"width="16" height="8""#));
        // 4 sprite rows per frame, one run per frame per row
        assert_eq!(svg.matches("<rect").count(), 8);
    }
}
