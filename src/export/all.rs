//! Side-by-side export: PNG sheet, GIF, SVG and the Aseprite manifest.
//!
//! The four renders run in parallel on the rayon pool, each with its own
//! buffers. Their bytes are staged and committed as one bundle, so a failure
//! in any of them leaves none of the four files behind.

use super::{ExportInput, ExportKind, ExportReport, Result, Staging, gif, png, svg};
use crate::aseprite::generate_aseprite_metadata;
use crate::imaging::RasterBackend;
use crate::palette::Quantizer;
use crate::worker::CancelToken;
use rayon::prelude::*;
use std::path::Path;
use tracing::{info, warn};

/// Kinds produced by [`export_all`], in report order.
pub const ALL_KINDS: [ExportKind; 4] = [
    ExportKind::Png,
    ExportKind::Gif,
    ExportKind::Svg,
    ExportKind::Aseprite,
];

fn extension(kind: ExportKind) -> &'static str {
    match kind {
        ExportKind::Gif => "gif",
        ExportKind::Svg => "svg",
        ExportKind::Aseprite => "json",
        _ => "png",
    }
}

fn render(
    kind: ExportKind,
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    input: &ExportInput<'_>,
    cancel: &CancelToken,
) -> Result<Vec<u8>> {
    match kind {
        ExportKind::Gif => gif::export_gif(backend, quantizer, input, cancel),
        ExportKind::Svg => svg::export_svg(backend, quantizer, input, cancel).map(String::into_bytes),
        ExportKind::Aseprite => {
            Ok(generate_aseprite_metadata(input.art, input.settings)?.into_bytes())
        }
        _ => png::export_png(backend, quantizer, input, cancel),
    }
}

/// Render every kind in [`ALL_KINDS`] and write them into `dir` as
/// `<safe_name>.<ext>`.
pub fn export_all(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    input: &ExportInput<'_>,
    dir: &Path,
    cancel: &CancelToken,
) -> Result<Vec<ExportReport>> {
    let rendered: Vec<(ExportKind, Vec<u8>)> = ALL_KINDS
        .par_iter()
        .map(|&kind| {
            let result = render(kind, backend, quantizer, input, cancel);
            if let Err(e) = &result {
                warn!(%kind, error = %e, "export failed; cancelling the rest");
                cancel.cancel();
            }
            result.map(|bytes| (kind, bytes))
        })
        .collect::<Result<_>>()?;
    cancel.check()?;

    let name = input.art.safe_name();
    let mut staging = Staging::new(dir)?;
    for (kind, bytes) in &rendered {
        staging.write(format!("{name}.{}", extension(*kind)), bytes)?;
    }
    let files = staging.commit()?;
    info!(dir = %dir.display(), files = files.len(), "all exports written");

    let frames = input.settings.frame_count();
    Ok(rendered
        .iter()
        .zip(files)
        .map(|(&(kind, _), file)| ExportReport {
            kind,
            frames: if kind == ExportKind::Aseprite { 0 } else { frames },
            files: vec![file],
        })
        .collect())
}
