//! Video frame streamer.
//!
//! The sheet is composited once, then a capture loop pushes
//! `cycles × rows × cols` frames into a [`VideoSink`], cutting each tick's
//! cell out of the sheet and scaling it to the display size over black. Only
//! one display-sized frame is alive at a time. The sink is checked
//! before any pixel work so a missing capture backend fails fast with
//! [`ExportError::VideoUnsupported`].

use super::{ExportError, ExportInput, Result, build_sheet, partial_path};
use crate::config::{Pacing, VideoConfig};
use crate::imaging::{RasterBackend, cell_origin, frame_interval_ms};
use crate::palette::Quantizer;
use crate::worker::CancelToken;
use image::RgbaImage;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Stream parameters handed to [`VideoSink::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Destination of captured frames.
pub trait VideoSink {
    /// Fail with [`ExportError::VideoUnsupported`] if this sink cannot
    /// record on the current host.
    fn check_available(&self) -> Result<()>;

    fn begin(&mut self, config: &CaptureConfig) -> Result<()>;

    /// Append one opaque RGBA frame.
    fn push_frame(&mut self, frame: &RgbaImage) -> Result<()>;

    /// Finalize the stream.
    fn end(&mut self) -> Result<()>;

    /// Drop whatever was captured so far.
    fn abort(&mut self);
}

// ============================================================================
// ffmpeg sink
// ============================================================================

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// [`VideoSink`] that pipes raw RGBA frames into the system `ffmpeg` and
/// records VP9 WebM.
///
/// ffmpeg writes to a `.partial` sibling of the output path, which is
/// renamed into place by [`end`](VideoSink::end) and deleted by
/// [`abort`](VideoSink::abort).
pub struct FfmpegSink {
    out_path: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    config: Option<CaptureConfig>,
}

impl FfmpegSink {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            child: None,
            stdin: None,
            stderr_drain: None,
            config: None,
        }
    }

    fn partial(&self) -> PathBuf {
        partial_path(&self.out_path)
    }
}

fn ffmpeg_error(message: impl Into<String>) -> ExportError {
    ExportError::Encoder(message.into())
}

impl VideoSink for FfmpegSink {
    fn check_available(&self) -> Result<()> {
        if is_ffmpeg_on_path() {
            Ok(())
        } else {
            Err(ExportError::VideoUnsupported(
                "ffmpeg was not found on PATH".into(),
            ))
        }
    }

    fn begin(&mut self, config: &CaptureConfig) -> Result<()> {
        if config.width % 2 != 0 || config.height % 2 != 0 {
            return Err(ffmpeg_error(format!(
                "video size must be even for yuv420p, got {}x{}",
                config.width, config.height
            )));
        }
        if let Some(parent) = self.out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", config.width, config.height),
            "-r",
            &config.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libvpx-vp9",
            "-pix_fmt",
            "yuv420p",
            "-b:v",
            "0",
            "-crf",
            "30",
            "-f",
            "webm",
        ]);
        cmd.arg(self.partial());

        let mut child = cmd
            .spawn()
            .map_err(|e| ExportError::VideoUnsupported(format!("failed to spawn ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ffmpeg_error("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ffmpeg_error("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        debug!(path = %self.out_path.display(), "ffmpeg started");
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.config = Some(*config);
        Ok(())
    }

    fn push_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        let config = self
            .config
            .ok_or_else(|| ffmpeg_error("ffmpeg sink not started"))?;
        if frame.dimensions() != (config.width, config.height) {
            return Err(ffmpeg_error(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                config.width,
                config.height
            )));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ffmpeg_error("ffmpeg sink is already finalized"));
        };
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| ffmpeg_error(format!("failed to write frame to ffmpeg stdin: {e}")))
    }

    fn end(&mut self) -> Result<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| ffmpeg_error("ffmpeg sink not started"))?;
        let status = child
            .wait()
            .map_err(|e| ffmpeg_error(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ffmpeg_error("ffmpeg stderr drain thread panicked"))?
                .unwrap_or_default(),
            None => Vec::new(),
        };
        self.config = None;

        if !status.success() {
            let _ = std::fs::remove_file(self.partial());
            return Err(ffmpeg_error(format!(
                "ffmpeg exited with status {status}: {}",
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        std::fs::rename(self.partial(), &self.out_path)?;
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
        self.config = None;
        if let Err(e) = std::fs::remove_file(self.partial()) {
            debug!(error = %e, "no partial video to remove");
        }
    }
}

// ============================================================================
// Capture loop
// ============================================================================

/// Copy `frame` onto opaque black, scaling alpha into the color.
fn flatten_over_black(frame: &mut RgbaImage) {
    for px in frame.pixels_mut() {
        let a = px[3] as u16;
        for c in 0..3 {
            px[c] = ((px[c] as u16 * a + 127) / 255) as u8;
        }
        px[3] = 255;
    }
}

/// Cut cell `index` out of `sheet` and scale it to `display × display`.
fn display_frame(
    backend: &impl RasterBackend,
    sheet: &RgbaImage,
    index: u32,
    cols: u32,
    side: u32,
    display: u32,
) -> Result<RgbaImage> {
    let (x, y) = cell_origin(index, cols, side);
    let cell = image::imageops::crop_imm(sheet, x, y, side, side).to_image();
    let mut scaled = backend.scale_nearest(&cell, display, display)?;
    flatten_over_black(&mut scaled);
    Ok(scaled)
}

/// Record the animation into `sink`. Returns the number of frames pushed.
pub fn stream_video(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    input: &ExportInput<'_>,
    video: &VideoConfig,
    sink: &mut impl VideoSink,
    cancel: &CancelToken,
) -> Result<u32> {
    sink.check_available()?;

    let settings = input.settings;
    let sheet = build_sheet(backend, quantizer, input, cancel)?;
    let frame_count = settings.frame_count();

    let config = CaptureConfig {
        width: video.display_size,
        height: video.display_size,
        fps: settings.fps,
    };
    let ticks = video.cycles.saturating_mul(frame_count);
    sink.begin(&config)?;

    let interval = Duration::from_secs_f64(frame_interval_ms(settings.fps) / 1000.0);
    let start = Instant::now();
    let pushed = (0..ticks).try_for_each(|tick| {
        cancel.check()?;
        if video.pacing == Pacing::Realtime {
            let due = start + interval * tick;
            if let Some(wait) = due.checked_duration_since(Instant::now()) {
                std::thread::sleep(wait);
            }
        }
        let frame = display_frame(
            backend,
            &sheet,
            tick % frame_count,
            settings.cols,
            settings.target_resolution,
            video.display_size,
        )?;
        sink.push_frame(&frame)
    });
    if let Err(e) = pushed {
        warn!(error = %e, "video capture aborted");
        sink.abort();
        return Err(e);
    }

    sink.end()?;
    info!(
        frames = ticks,
        size = video.display_size,
        fps = settings.fps,
        "video captured"
    );
    Ok(ticks)
}

/// Record the animation to a WebM file at `out` through ffmpeg.
pub fn export_video(
    backend: &impl RasterBackend,
    quantizer: &impl Quantizer,
    input: &ExportInput<'_>,
    video: &VideoConfig,
    out: &Path,
    cancel: &CancelToken,
) -> Result<u32> {
    let mut sink = FfmpegSink::new(out);
    stream_video(backend, quantizer, input, video, &mut sink, cancel)
}
