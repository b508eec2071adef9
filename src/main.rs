use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixel_dither::Pipeline;
use pixforge::batch::{self, BatchOptions, CancelFlag, VideoJob};
use pixforge::config::{image_defaults, video_defaults, PipelineArgs};
use pixforge::video::{self, EncodeOptions, StitchOptions};
use pixforge::{codec, AppError};

#[derive(Parser)]
#[command(name = "pixforge")]
#[command(about = "Pixel-art pixelation and dithering for images and videos")]
#[command(version)]
struct Cli {
    /// Log per-pass details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single image
    Image {
        /// Input image (any common raster format)
        #[arg(short, long)]
        input: PathBuf,

        /// Output image; format from the extension
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Process a video into a PNG frame sequence
    Frames {
        /// Input video
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for frame_NNNNNN.png files
        #[arg(short, long)]
        output: PathBuf,

        /// First frame index
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// End frame index (exclusive); default runs to the end
        #[arg(long)]
        end: Option<usize>,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Process a video into a new MP4, keeping its audio
    Video {
        /// Input video
        #[arg(short, long)]
        input: PathBuf,

        /// Output MP4
        #[arg(short, long)]
        output: PathBuf,

        /// Replace an existing output
        #[arg(long)]
        overwrite: bool,

        #[command(flatten)]
        encode: EncodeArgs,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Encode a directory of PNG frames into an MP4
    Stitch {
        /// Directory holding the frames
        #[arg(short, long)]
        frames: PathBuf,

        /// Output MP4 (default: FRAMES/frames.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Frame rate (default: from --source, else 30)
        #[arg(long)]
        fps: Option<f64>,

        /// Video to take audio and frame rate from
        #[arg(long)]
        source: Option<PathBuf>,

        /// Numeric frame file pattern
        #[arg(long, default_value = "frame_%06d.png")]
        pattern: String,

        /// First number of the numeric pattern
        #[arg(long)]
        start_number: Option<u32>,

        /// Use every *.png in name order instead of --pattern
        #[arg(long)]
        glob: bool,

        /// Replace an existing output
        #[arg(long)]
        overwrite: bool,

        #[command(flatten)]
        encode: EncodeArgs,
    },
}

/// x264 flags shared by `video` and `stitch`.
#[derive(clap::Args)]
struct EncodeArgs {
    /// x264 CRF (lower is higher quality and larger)
    #[arg(long, default_value_t = 18, value_parser = clap::value_parser!(u8).range(0..=51))]
    crf: u8,

    /// x264 preset: ultrafast..veryslow
    #[arg(long = "x264-preset", default_value = "medium")]
    x264_preset: String,
}

impl From<EncodeArgs> for EncodeOptions {
    fn from(args: EncodeArgs) -> Self {
        EncodeOptions {
            crf: args.crf,
            preset: args.x264_preset,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Image {
            input,
            output,
            pipeline,
        } => run_image_command(&input, &output, &pipeline),
        Commands::Frames {
            input,
            output,
            start,
            end,
            pipeline,
        } => {
            let pipeline = Pipeline::new(pipeline.resolve(image_defaults())?);
            let options = BatchOptions {
                start,
                end,
                ..BatchOptions::default()
            };
            let cancel = CancelFlag::new();
            let report = run_cancellable(cancel.clone(), move || {
                batch::extract_frames(&input, &output, &pipeline, &options, &cancel)
                    .with_context(|| format!("Failed to extract frames from {}", input.display()))
            })
            .await?;
            println!("Wrote {} frames", report.written);
            Ok(())
        }
        Commands::Video {
            input,
            output,
            overwrite,
            encode,
            pipeline,
        } => {
            let pipeline = Pipeline::new(pipeline.resolve(video_defaults())?);
            let job = VideoJob {
                encode: encode.into(),
                overwrite,
                batch: BatchOptions::default(),
            };
            let cancel = CancelFlag::new();
            run_cancellable(cancel.clone(), move || {
                let report = batch::process_video(&input, &output, &pipeline, &job, &cancel)
                    .with_context(|| format!("Failed to process {}", input.display()))?;
                println!(
                    "Wrote processed video: {} ({} frames)",
                    output.display(),
                    report.written
                );
                Ok(())
            })
            .await
        }
        Commands::Stitch {
            frames,
            output,
            fps,
            source,
            pattern,
            start_number,
            glob,
            overwrite,
            encode,
        } => {
            let output = output.unwrap_or_else(|| frames.join("frames.mp4"));
            let options = StitchOptions {
                fps,
                pattern,
                start_number,
                glob,
                audio_source: source,
                encode: encode.into(),
                overwrite,
            };
            tokio::task::spawn_blocking(move || {
                video::stitch(&frames, &output, &options)
                    .with_context(|| format!("Failed to stitch {}", frames.display()))?;
                println!("Wrote {}", output.display());
                anyhow::Ok(())
            })
            .await?
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "pixforge=debug,pixel_dither=debug"
    } else {
        "pixforge=info,pixel_dither=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

/// Process one image file.
fn run_image_command(input: &Path, output: &Path, args: &PipelineArgs) -> anyhow::Result<()> {
    let config = args.resolve(image_defaults())?;
    let image = codec::load_image(input).context("Failed to load input image")?;
    let pipeline = Pipeline::new(config);
    let result = pipeline.run(&image);
    codec::save_image(&result, output).context("Failed to save output image")?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        width = result.width(),
        height = result.height(),
        "Processed image"
    );
    println!(
        "Wrote {} ({}x{})",
        output.display(),
        result.width(),
        result.height()
    );
    Ok(())
}

/// Run a blocking batch job; Ctrl-C asks it to stop at the next frame.
async fn run_cancellable<T, F>(cancel: CancelFlag, job: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let mut handle = tokio::task::spawn_blocking(job);
    tokio::select! {
        joined = &mut handle => joined?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping after the current frame");
            cancel.cancel();
            match handle.await? {
                Err(e) if matches!(e.downcast_ref::<AppError>(), Some(AppError::Cancelled { .. })) => {
                    Err(e.context("Stopped by user"))
                }
                other => other,
            }
        }
    }
}
