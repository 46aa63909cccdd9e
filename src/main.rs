use clap::{ArgAction, Parser, Subcommand};
use image::RgbaImage;
use sprite_forge::config::{self, ForgeConfig};
use sprite_forge::export::{
    self, ExportError, ExportInput, ExportKind, ExportReport, all, atlas, gif, mobile, png, svg,
    video,
};
use sprite_forge::imaging::{RasterBackend, RustBackend};
use sprite_forge::palette::NeuQuantizer;
use sprite_forge::types::PixelStyle;
use sprite_forge::worker::{self, CancelToken};
use sprite_forge::{aseprite, output};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Settings that override `forge.toml` for one run.
#[derive(clap::Args, Clone, Default)]
struct Overrides {
    /// Grid rows on the source sheet
    #[arg(long)]
    rows: Option<u32>,
    /// Grid columns on the source sheet
    #[arg(long)]
    cols: Option<u32>,
    /// Playback rate
    #[arg(long)]
    fps: Option<u32>,
    /// Output frame side length in pixels
    #[arg(long)]
    resolution: Option<u32>,
    /// Art style: 8-bit, 16-bit, gameboy, hi-bit or other
    #[arg(long)]
    style: Option<PixelStyle>,
}

/// Source sheet and destination for commands that process pixels.
#[derive(clap::Args, Clone)]
struct SheetArgs {
    /// Source sprite sheet (PNG, JPEG or WebP)
    input: PathBuf,
    /// Output file, or directory for bundle exports
    #[arg(short, long)]
    output: PathBuf,
    #[command(flatten)]
    overrides: Overrides,
}

#[derive(clap::Args, Clone)]
struct ManifestArgs {
    /// Output JSON file
    #[arg(short, long)]
    output: PathBuf,
    #[command(flatten)]
    overrides: Overrides,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "sprite-forge")]
#[command(about = "Turn generated sprite sheets into pixel-art game assets")]
#[command(long_about = "\
Turn generated sprite sheets into pixel-art game assets

The source is one bitmap holding a cols x rows grid of frames on a magenta
(#FF00FF) background. Every frame is resampled to the target resolution,
colour adjusted, keyed, optionally sharpened and palette locked, then
exported.

Exports:

  png        composited sheet
  gif        animated GIF, palette per frame
  video      WebM capture through ffmpeg
  svg        vector sheet, one <rect> per pixel run
  atlas      sheet PNG + JSON texture atlas
  mobile     Android density buckets + iOS imageset
  aseprite   Aseprite JSON manifest (no input image needed)
  all        png, gif, svg and aseprite side by side

Run 'sprite-forge gen-config' to generate a documented forge.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (optional; stock defaults apply when missing)
    #[arg(long, default_value = "forge.toml", global = true)]
    config: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export the processed frames as one PNG sheet
    Png(SheetArgs),
    /// Export an animated GIF
    Gif(SheetArgs),
    /// Record a WebM video of the animation (requires ffmpeg)
    Video(SheetArgs),
    /// Export the processed sheet as SVG
    Svg(SheetArgs),
    /// Export a PNG + JSON texture atlas into a directory
    Atlas(SheetArgs),
    /// Export an Android/iOS asset bundle into a directory
    Mobile(SheetArgs),
    /// Write the Aseprite manifest for the configured grid
    Aseprite(ManifestArgs),
    /// Export PNG, GIF, SVG and the Aseprite manifest into a directory
    All(SheetArgs),
    /// Print a stock forge.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Png(args) => run_single(&cli.config, ExportKind::Png, args)?,
        Command::Gif(args) => run_single(&cli.config, ExportKind::Gif, args)?,
        Command::Video(args) => run_single(&cli.config, ExportKind::Video, args)?,
        Command::Svg(args) => run_single(&cli.config, ExportKind::Svg, args)?,
        Command::Atlas(args) => run_single(&cli.config, ExportKind::Atlas, args)?,
        Command::Mobile(args) => run_single(&cli.config, ExportKind::Mobile, args)?,
        Command::Aseprite(args) => {
            let config = load_config(&cli.config, &args.overrides)?;
            let report = write_aseprite(&config, &args.output)?;
            output::print_export_report(&report, None);
        }
        Command::All(args) => {
            let config = load_config(&cli.config, &args.overrides)?;
            init_thread_pool(&config.processing);
            let source = RustBackend::new().load(&args.input)?;
            let reports = run_all(&config, &source, &args.output)?;
            output::print_export_summary(&reports, Some(&args.output));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the stderr log subscriber.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Load `forge.toml`, apply CLI overrides and re-validate.
fn load_config(path: &Path, overrides: &Overrides) -> Result<ForgeConfig, config::ConfigError> {
    let mut config = config::load_config(path)?;
    let animation = &mut config.animation;
    if let Some(rows) = overrides.rows {
        animation.rows = rows;
    }
    if let Some(cols) = overrides.cols {
        animation.cols = cols;
    }
    if let Some(fps) = overrides.fps {
        animation.fps = fps;
    }
    if let Some(resolution) = overrides.resolution {
        animation.target_resolution = resolution;
    }
    if let Some(style) = overrides.style {
        config.art.style = style;
    }
    config.validate()?;
    Ok(config)
}

/// Run one export on a background job and print its report.
fn run_single(
    config_path: &Path,
    kind: ExportKind,
    args: SheetArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path, &args.overrides)?;
    let source = RustBackend::new().load(&args.input)?;
    let out = args.output.clone();
    let job = worker::spawn_export(&kind.to_string(), move |cancel| {
        run_export(kind, &config, &source, &out, &cancel)
    })?;
    let report = job.wait()?;
    let root = if matches!(kind, ExportKind::Atlas | ExportKind::Mobile) {
        Some(args.output.as_path())
    } else {
        None
    };
    output::print_export_report(&report, root);
    Ok(())
}

/// PNG, GIF, SVG and the manifest in parallel, committed together.
fn run_all(
    config: &ForgeConfig,
    source: &RgbaImage,
    dir: &Path,
) -> Result<Vec<ExportReport>, ExportError> {
    all::export_all(
        &RustBackend::new(),
        &NeuQuantizer::new(),
        &ExportInput::new(source, config),
        dir,
        &CancelToken::new(),
    )
}

/// Run `kind` and write its output to `out`.
fn run_export(
    kind: ExportKind,
    config: &ForgeConfig,
    source: &RgbaImage,
    out: &Path,
    cancel: &CancelToken,
) -> Result<ExportReport, ExportError> {
    let backend = RustBackend::new();
    let quantizer = NeuQuantizer::new();
    let input = ExportInput::new(source, config);
    let frames = config.animation.frame_count();
    let single = |bytes: &[u8]| -> Result<ExportReport, ExportError> {
        Ok(ExportReport {
            kind,
            frames,
            files: vec![export::write_atomic(out, bytes)?],
        })
    };

    match kind {
        ExportKind::Png => single(&png::export_png(&backend, &quantizer, &input, cancel)?),
        ExportKind::Gif => single(&gif::export_gif(&backend, &quantizer, &input, cancel)?),
        ExportKind::Svg => single(svg::export_svg(&backend, &quantizer, &input, cancel)?.as_bytes()),
        ExportKind::Video => {
            let pushed = video::export_video(
                &backend,
                &quantizer,
                &input,
                &config.video,
                out,
                cancel,
            )?;
            let bytes = std::fs::metadata(out)?.len();
            Ok(ExportReport {
                kind,
                frames: pushed,
                files: vec![export::WrittenFile {
                    path: out.to_path_buf(),
                    bytes,
                }],
            })
        }
        ExportKind::Atlas => atlas::export_atlas(&backend, &quantizer, &input, out, cancel),
        ExportKind::Mobile => {
            mobile::export_mobile(&backend, &quantizer, &input, &config.mobile, out, cancel)
        }
        ExportKind::Aseprite => write_aseprite(config, out),
    }
}

fn write_aseprite(config: &ForgeConfig, out: &Path) -> Result<ExportReport, ExportError> {
    let json = aseprite::generate_aseprite_metadata(&config.art, &config.animation)?;
    Ok(ExportReport {
        kind: ExportKind::Aseprite,
        frames: 0,
        files: vec![export::write_atomic(out, json.as_bytes())?],
    })
}
