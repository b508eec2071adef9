//! Ordered, batched frame processing with cooperative cancellation.
//!
//! Frames are pulled from a source one at a time, grouped into batches,
//! run through the pipeline in parallel and handed to a sink in their
//! original order. Each frame is independent; inside a frame the dither
//! pass stays sequential.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pixel_dither::{Image, Pipeline};
use rayon::prelude::*;

use crate::codec;
use crate::error::AppError;
use crate::video::{self, EncodeOptions, FrameReader, FrameWriter};

/// Shared stop request, checked between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Destination for processed frames, called in frame order.
pub trait FrameSink {
    fn write(&mut self, index: usize, frame: &Image) -> Result<(), AppError>;
}

/// Which frames to process and how many to run in parallel.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Frames handed to the worker pool at once.
    pub batch_size: usize,
    /// First frame index to process.
    pub start: usize,
    /// Exclusive end index; `None` runs to the end of the source.
    pub end: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: rayon::current_num_threads() * 2,
            start: 0,
            end: None,
        }
    }
}

/// Outcome of a completed batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Frames passed to the sink.
    pub written: usize,
    /// Frames read but outside `start..end`.
    pub skipped: usize,
}

/// Process `frames` through `pipeline` into `sink`.
///
/// On cancellation the frames already written stay written and
/// [`AppError::Cancelled`] is returned.
pub fn run_batch<I, S>(
    frames: I,
    pipeline: &Pipeline,
    sink: &mut S,
    options: &BatchOptions,
    cancel: &CancelFlag,
) -> Result<BatchReport, AppError>
where
    I: IntoIterator<Item = Result<Image, AppError>>,
    S: FrameSink + ?Sized,
{
    let batch_size = options.batch_size.max(1);
    let mut report = BatchReport {
        written: 0,
        skipped: 0,
    };
    let mut batch: Vec<(usize, Image)> = Vec::with_capacity(batch_size);
    let mut frames = frames.into_iter().enumerate();

    loop {
        batch.clear();
        let mut exhausted = false;
        while batch.len() < batch_size {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled {
                    frames: report.written,
                });
            }
            let Some((index, frame)) = frames.next() else {
                exhausted = true;
                break;
            };
            if options.end.is_some_and(|end| index >= end) {
                exhausted = true;
                break;
            }
            let frame = frame?;
            if index < options.start {
                report.skipped += 1;
                continue;
            }
            batch.push((index, frame));
        }

        if !batch.is_empty() {
            tracing::debug!(
                first = batch[0].0,
                count = batch.len(),
                "Processing batch"
            );
            let processed: Vec<(usize, Image)> = batch
                .par_iter()
                .map(|(index, frame)| (*index, pipeline.run(frame)))
                .collect();

            for (index, frame) in &processed {
                if cancel.is_cancelled() {
                    return Err(AppError::Cancelled {
                        frames: report.written,
                    });
                }
                sink.write(*index, frame)?;
                report.written += 1;
            }
        }

        if exhausted {
            return Ok(report);
        }
    }
}

/// Writes `frame_{index:06}.png` files into a directory.
#[derive(Debug)]
pub struct PngDirSink {
    dir: PathBuf,
}

impl PngDirSink {
    /// Use `dir`, creating it if needed.
    pub fn create(dir: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }
}

impl FrameSink for PngDirSink {
    fn write(&mut self, index: usize, frame: &Image) -> Result<(), AppError> {
        codec::save_image(frame, &self.frame_path(index))
    }
}

/// Feeds frames to an encoder started on the first frame.
pub struct VideoSink {
    path: PathBuf,
    fps: f64,
    options: EncodeOptions,
    writer: Option<FrameWriter>,
}

impl VideoSink {
    pub fn new(path: &Path, fps: f64, options: EncodeOptions) -> Self {
        Self {
            path: path.to_path_buf(),
            fps,
            options,
            writer: None,
        }
    }

    /// Flush the encoder. Returns the number of frames encoded.
    pub fn finish(self) -> Result<usize, AppError> {
        match self.writer {
            Some(writer) => writer.finish(),
            None => Ok(0),
        }
    }

    /// Stop the encoder and delete the file it started writing.
    ///
    /// A sink that never received a frame never touched `path` and leaves
    /// it alone.
    pub fn abort(self) {
        let Some(writer) = self.writer else {
            return;
        };
        writer.abort();
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed partial output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove partial output"
            ),
        }
    }
}

impl FrameSink for VideoSink {
    fn write(&mut self, _index: usize, frame: &Image) -> Result<(), AppError> {
        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => FrameWriter::create(
                &self.path,
                frame.width(),
                frame.height(),
                self.fps,
                &self.options,
            )?,
        };
        let result = writer.write_frame(frame);
        self.writer = Some(writer);
        result
    }
}

/// Decode `input`, process frames `start..end` and write them as PNGs.
pub fn extract_frames(
    input: &Path,
    out_dir: &Path,
    pipeline: &Pipeline,
    options: &BatchOptions,
    cancel: &CancelFlag,
) -> Result<BatchReport, AppError> {
    let info = video::probe(input)?;
    let mut sink = PngDirSink::create(out_dir)?;
    let mut reader = FrameReader::open(input, &info)?;
    let report = run_batch(&mut reader, pipeline, &mut sink, options, cancel)?;
    // Stopping at `end` leaves the decoder running; dropping the reader
    // kills it.
    if options.end.is_none() {
        reader.finish()?;
    }
    tracing::info!(
        frames = report.written,
        dir = %out_dir.display(),
        "Wrote frames"
    );
    Ok(report)
}

/// Settings of a video-to-video run.
#[derive(Debug, Clone, Default)]
pub struct VideoJob {
    pub encode: EncodeOptions,
    pub overwrite: bool,
    pub batch: BatchOptions,
}

/// Process every frame of `input` into a new MP4 at `output`, keeping the
/// source audio when there is any.
///
/// When cancelled, the frames encoded so far are still finalized into
/// `output` (without audio). Any other failure kills the encoder and removes
/// the partial file.
pub fn process_video(
    input: &Path,
    output: &Path,
    pipeline: &Pipeline,
    job: &VideoJob,
    cancel: &CancelFlag,
) -> Result<BatchReport, AppError> {
    if output.exists() && !job.overwrite {
        return Err(AppError::OutputExists(output.to_path_buf()));
    }
    let info = video::probe(input)?;
    let target = if info.has_audio {
        video::video_only_path(output)
    } else {
        output.to_path_buf()
    };
    let (out_w, out_h) = pipeline.output_dimensions(info.width, info.height);
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        width = out_w,
        height = out_h,
        fps = info.fps,
        "Processing video"
    );

    let mut reader = FrameReader::open(input, &info)?;
    let mut sink = VideoSink::new(&target, info.fps, job.encode.clone());
    let report = match run_batch(&mut reader, pipeline, &mut sink, &job.batch, cancel) {
        Ok(report) => report,
        Err(e @ AppError::Cancelled { .. }) => {
            if sink.finish()? > 0 && target != output {
                std::fs::rename(&target, output)?;
            }
            return Err(e);
        }
        Err(e) => {
            sink.abort();
            return Err(e);
        }
    };
    let encoded = sink.finish()?;
    reader.finish()?;

    if encoded == 0 {
        return Err(AppError::Decode {
            path: input.to_path_buf(),
            message: "no frames in input video".to_string(),
        });
    }
    if target != output {
        video::attach_audio(&target, input, output)?;
    }
    tracing::info!(frames = encoded, output = %output.display(), "Wrote video");
    Ok(report)
}
