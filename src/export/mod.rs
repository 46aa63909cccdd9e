//! Exporters: everything that turns a stream of processed frames into a
//! deliverable asset.
//!
//! Each exporter drives [`process_frame`](crate::imaging::process_frame)
//! once per frame index, in order, with its own scratch buffers. Exporters
//! differ only in what they do with the frames:
//!
//! | Kind | Module | Output |
//! |------|--------|--------|
//! | PNG sheet | [`png`] | one composited PNG |
//! | GIF | [`gif`] | indexed animation, palette per frame |
//! | Video | [`video`] | WebM captured through `ffmpeg` |
//! | SVG | [`svg`] | row-run `<rect>` vector sheet |
//! | Atlas | [`atlas`] | PNG + JSON region table |
//! | Mobile | [`mobile`] | Android/iOS density buckets |
//! | Aseprite | [`crate::aseprite`] | JSON manifest, no pixels |
//! | All | [`all`] | PNG, GIF, SVG and manifest as one bundle |
//!
//! # Failure policy
//!
//! A whole-job failure is reported as one [`ExportError`] and never leaves a
//! partial file behind: single files go through [`write_atomic`], multi-file
//! bundles are built in a [`Staging`] area and moved into place together.
//! A bundle only ever replaces its own files. Cancellation is observed
//! between frames.

pub mod all;
pub mod atlas;
pub mod gif;
pub mod mobile;
pub mod png;
pub mod svg;
pub mod video;

use crate::aseprite::ManifestError;
use crate::config::{AnimationSettings, ConfigError, ForgeConfig};
use crate::imaging::{BackendError, FrameError, RasterBackend, compose_sheet};
use crate::palette::Quantizer;
use crate::types::SpriteArt;
use crate::worker::CancelToken;
use image::RgbaImage;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("{} is a directory, not an export file", .0.display())]
    OutputIsDirectory(PathBuf),
    #[error("video capture unsupported: {0}")]
    VideoUnsupported(String),
    #[error("encoder failed: {0}")]
    Encoder(String),
    #[error("export cancelled")]
    Cancelled,
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// What an export reads: the source sheet plus the settings and art
/// description it is processed with.
#[derive(Debug, Clone, Copy)]
pub struct ExportInput<'a> {
    pub source: &'a RgbaImage,
    pub settings: &'a AnimationSettings,
    pub art: &'a SpriteArt,
}

impl<'a> ExportInput<'a> {
    pub fn new(source: &'a RgbaImage, config: &'a ForgeConfig) -> Self {
        Self {
            source,
            settings: &config.animation,
            art: &config.art,
        }
    }
}

/// Composite every processed frame into one sheet, checking for
/// cancellation after each frame.
pub fn build_sheet(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    input: &ExportInput<'_>,
    cancel: &CancelToken,
) -> Result<RgbaImage> {
    cancel.check()?;
    compose_sheet(
        backend,
        quantizer,
        input.source,
        input.settings,
        input.art.style,
        |_| cancel.check(),
    )
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Png,
    Gif,
    Video,
    Svg,
    Atlas,
    Mobile,
    Aseprite,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportKind::Png => "PNG sheet",
            ExportKind::Gif => "GIF",
            ExportKind::Video => "Video",
            ExportKind::Svg => "SVG",
            ExportKind::Atlas => "Texture atlas",
            ExportKind::Mobile => "Mobile bundle",
            ExportKind::Aseprite => "Aseprite manifest",
        };
        f.write_str(s)
    }
}

/// One file an export left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Outcome of a completed export, consumed by [`crate::output`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub kind: ExportKind,
    /// Frames processed (0 for exports that touch no pixels).
    pub frames: u32,
    pub files: Vec<WrittenFile>,
}

impl ExportReport {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }
}

// ============================================================================
// Atomic output
// ============================================================================

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("export"));
    name.push(suffix);
    path.with_file_name(name)
}

/// Sibling path with `.partial` appended to the file name.
pub fn partial_path(path: &Path) -> PathBuf {
    with_suffix(path, ".partial")
}

/// Write `bytes` to `path` so readers never observe a half-written file:
/// the data goes to a sibling `.partial` file that is renamed over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<WrittenFile> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    if let Err(e) = std::fs::write(&partial, bytes) {
        let _ = std::fs::remove_file(&partial);
        return Err(e.into());
    }
    std::fs::rename(&partial, path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote");
    Ok(WrittenFile {
        path: path.to_path_buf(),
        bytes: bytes.len() as u64,
    })
}

// ============================================================================
// Staged bundles
// ============================================================================

/// Hidden directory inside the destination where a bundle is assembled.
pub const STAGING_DIR: &str = ".sprite-forge.partial";

/// Where a replaced file is parked until its successor is in place.
fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, ".previous")
}

/// A multi-file export under construction.
///
/// Files are written below [`STAGING_DIR`] inside `dest` and only moved to
/// their final paths by [`commit`](Staging::commit), once every one of them
/// exists. Only paths written through [`write`](Staging::write) are ever
/// replaced; everything else in `dest` is left alone. Dropping an
/// uncommitted bundle removes the staging directory.
#[derive(Debug)]
pub struct Staging {
    dest: PathBuf,
    root: PathBuf,
    files: Vec<(PathBuf, u64)>,
    created_dest: bool,
    committed: bool,
}

impl Staging {
    pub fn new(dest: &Path) -> Result<Self> {
        let created_dest = !dest.exists();
        let root = dest.join(STAGING_DIR);
        if root.exists() {
            std::fs::remove_dir_all(&root)?;
        }
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            dest: dest.to_path_buf(),
            root,
            files: Vec::new(),
            created_dest,
            committed: false,
        })
    }

    /// Stage `bytes` for `dest/<rel>`.
    pub fn write(&mut self, rel: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
        let rel = rel.as_ref();
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        self.files.push((rel.to_path_buf(), bytes.len() as u64));
        Ok(())
    }

    /// Move every staged file to its final path.
    ///
    /// Files being replaced are set aside first and restored if any move
    /// fails, so `dest` ends up with either the whole new bundle or the
    /// files it had before.
    pub fn commit(mut self) -> Result<Vec<WrittenFile>> {
        let targets: Vec<PathBuf> = self
            .files
            .iter()
            .map(|(rel, _)| self.dest.join(rel))
            .collect();
        if let Some(dir) = targets.iter().find(|t| t.is_dir()) {
            return Err(ExportError::OutputIsDirectory(dir.clone()));
        }

        let mut set_aside = Vec::new();
        let mut placed = Vec::new();
        if let Err(e) = self.place(&targets, &mut set_aside, &mut placed) {
            for path in &placed {
                let _ = std::fs::remove_file(path);
            }
            for (target, backup) in &set_aside {
                let _ = std::fs::rename(backup, target);
            }
            return Err(e.into());
        }
        for (_, backup) in &set_aside {
            if let Err(e) = std::fs::remove_file(backup) {
                debug!(path = %backup.display(), error = %e, "stale backup left behind");
            }
        }
        self.committed = true;
        info!(path = %self.dest.display(), files = targets.len(), "bundle committed");

        Ok(targets
            .into_iter()
            .zip(&self.files)
            .map(|(path, &(_, bytes))| WrittenFile { path, bytes })
            .collect())
    }

    fn place(
        &self,
        targets: &[PathBuf],
        set_aside: &mut Vec<(PathBuf, PathBuf)>,
        placed: &mut Vec<PathBuf>,
    ) -> std::io::Result<()> {
        for target in targets.iter().filter(|t| t.exists()) {
            let backup = backup_path(target);
            std::fs::rename(target, &backup)?;
            set_aside.push((target.clone(), backup));
        }
        for ((rel, _), target) in self.files.iter().zip(targets) {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::rename(self.root.join(rel), target)?;
            placed.push(target.clone());
        }
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            debug!(path = %self.root.display(), error = %e, "staging cleanup failed");
        }
        if self.created_dest && !self.committed {
            // Only succeeds while empty.
            let _ = std::fs::remove_dir(&self.dest);
        }
    }
}
