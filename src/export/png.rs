//! PNG sheet compositor.
//!
//! Re-tiles the processed frames into a `cols × rows` sheet of
//! `target_resolution`-px cells and encodes it as PNG.

use super::{ExportInput, Result, build_sheet};
use crate::imaging::{EncodeFormat, RasterBackend};
use crate::palette::Quantizer;
use crate::worker::CancelToken;
use tracing::info;

/// Encoded PNG bytes of the composited sheet.
pub fn export_png(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    input: &ExportInput<'_>,
    cancel: &CancelToken,
) -> Result<Vec<u8>> {
    let sheet = build_sheet(backend, quantizer, input, cancel)?;
    let bytes = backend.encode(&sheet, EncodeFormat::Png)?;
    info!(
        width = sheet.width(),
        height = sheet.height(),
        bytes = bytes.len(),
        "PNG sheet encoded"
    );
    Ok(bytes)
}
