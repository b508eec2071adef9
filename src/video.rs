//! Video I/O through external `ffmpeg` / `ffprobe` processes.
//!
//! Frames cross the process boundary as raw `rgb24`, one
//! `width * height * 3` byte block per frame, in stream order.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use pixel_dither::Image;
use serde::Deserialize;

use crate::error::AppError;

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";

/// Frame rate used when the container does not report one.
pub const DEFAULT_FPS: f64 = 30.0;

/// Stream facts needed to decode and re-encode a video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: usize,
    pub height: usize,
    pub fps: f64,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<usize>,
    height: Option<usize>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

/// Inspect `path` with `ffprobe`.
pub fn probe(path: &Path) -> Result<VideoInfo, AppError> {
    let mut cmd = Command::new(FFPROBE);
    cmd.args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(path);
    let stdout = run_tool(FFPROBE, &mut cmd)?;
    let info = parse_probe(&String::from_utf8_lossy(&stdout)).map_err(|message| {
        AppError::Decode {
            path: path.to_path_buf(),
            message,
        }
    })?;
    tracing::debug!(
        path = %path.display(),
        width = info.width,
        height = info.height,
        fps = info.fps,
        has_audio = info.has_audio,
        "Probed video"
    );
    Ok(info)
}

/// Extract [`VideoInfo`] from `ffprobe -print_format json` output.
pub fn parse_probe(json: &str) -> Result<VideoInfo, String> {
    let output: ProbeOutput = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let is = |s: &ProbeStream, kind: &str| s.codec_type.as_deref() == Some(kind);

    let video = output
        .streams
        .iter()
        .find(|s| is(s, "video"))
        .ok_or_else(|| "no video stream".to_string())?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no dimensions".to_string()),
    };
    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(DEFAULT_FPS);
    let has_audio = output.streams.iter().any(|s| is(s, "audio"));

    Ok(VideoInfo {
        width,
        height,
        fps,
        has_audio,
    })
}

/// Parse an ffprobe rational such as `30000/1001`. Zero rates are `None`.
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    let fps = num / den;
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Run a tool to completion, returning stdout or a [`AppError::ToolFailed`]
/// carrying its stderr.
fn run_tool(tool: &'static str, cmd: &mut Command) -> Result<Vec<u8>, AppError> {
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| AppError::spawn(tool, e))?;
    if !output.status.success() {
        return Err(AppError::ToolFailed {
            tool,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Collect a child's stderr on a helper thread so the pipe never fills up.
fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    let mut stderr = child.stderr.take()?;
    Some(std::thread::spawn(move || {
        let mut text = String::new();
        let _ = stderr.read_to_string(&mut text);
        text
    }))
}

fn wait_tool(
    tool: &'static str,
    child: &mut Child,
    stderr: Option<JoinHandle<String>>,
) -> Result<(), AppError> {
    let status = child.wait()?;
    let stderr = stderr
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    if !status.success() {
        return Err(AppError::ToolFailed {
            tool,
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(())
}

/// Decoded frames of a video, streamed from an `ffmpeg` child process.
pub struct FrameReader {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    width: usize,
    height: usize,
    buf: Vec<u8>,
    frames: usize,
    finished: bool,
}

impl FrameReader {
    pub fn open(path: &Path, info: &VideoInfo) -> Result<Self, AppError> {
        let mut child = Command::new(FFMPEG)
            .args(reader_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::spawn(FFMPEG, e))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg stdout not captured"))?;
        let stderr = drain_stderr(&mut child);
        Ok(Self {
            child,
            stdout,
            stderr,
            width: info.width,
            height: info.height,
            buf: vec![0; info.width * info.height * 3],
            frames: 0,
            finished: false,
        })
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Next frame, or `None` at the end of the stream.
    ///
    /// A truncated trailing frame is discarded.
    pub fn read_frame(&mut self) -> Result<Option<Image>, AppError> {
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.stdout.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled < self.buf.len() {
            if filled > 0 {
                tracing::warn!(
                    bytes = filled,
                    frame = self.frames,
                    "Discarding truncated trailing frame"
                );
            }
            return Ok(None);
        }
        self.frames += 1;
        Ok(Some(Image::from_raw(
            self.width,
            self.height,
            self.buf.clone(),
        )?))
    }

    /// Wait for the decoder and report a failed exit.
    pub fn finish(&mut self) -> Result<usize, AppError> {
        self.finished = true;
        wait_tool(FFMPEG, &mut self.child, self.stderr.take())?;
        Ok(self.frames)
    }
}

impl Iterator for FrameReader {
    type Item = Result<Image, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Decode to raw RGB at the stored size. Rotation metadata is ignored so
/// frames keep the width and height `probe` reported.
fn reader_args(input: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-noautorotate", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args.extend(
        ["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]
            .into_iter()
            .map(OsString::from),
    );
    args
}

/// x264 settings for encoded outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOptions {
    /// Constant rate factor, lower is higher quality.
    pub crf: u8,
    /// x264 speed preset, `ultrafast` to `veryslow`.
    pub preset: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            crf: 18,
            preset: "medium".to_string(),
        }
    }
}

impl EncodeOptions {
    fn args(&self) -> Vec<OsString> {
        vec![
            "-c:v".into(),
            "libx264".into(),
            // yuv420p needs even dimensions
            "-vf".into(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-crf".into(),
            self.crf.to_string().into(),
            "-preset".into(),
            self.preset.clone().into(),
            "-movflags".into(),
            "+faststart".into(),
        ]
    }
}

/// Encodes raw frames into an H.264 MP4 through an `ffmpeg` child process.
pub struct FrameWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    path: PathBuf,
    width: usize,
    height: usize,
    frames: usize,
}

impl FrameWriter {
    /// Start an encoder for `width x height` frames. Overwrites `output`.
    pub fn create(
        output: &Path,
        width: usize,
        height: usize,
        fps: f64,
        options: &EncodeOptions,
    ) -> Result<Self, AppError> {
        let mut child = Command::new(FFMPEG)
            .args(writer_args(output, width, height, fps, options))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::spawn(FFMPEG, e))?;
        let stdin = child.stdin.take();
        let stderr = drain_stderr(&mut child);
        tracing::debug!(path = %output.display(), width, height, fps, "Started encoder");
        Ok(Self {
            child,
            stdin,
            stderr,
            path: output.to_path_buf(),
            width,
            height,
            frames: 0,
        })
    }

    pub fn write_frame(&mut self, frame: &Image) -> Result<(), AppError> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(AppError::FrameSize {
                index: self.frames,
                width: self.width,
                height: self.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| std::io::Error::other("encoder input already closed"))?;
        if let Err(e) = stdin.write_all(frame.as_raw()) {
            // The encoder died; its exit status and stderr say why.
            self.stdin = None;
            wait_tool(FFMPEG, &mut self.child, self.stderr.take())?;
            return Err(e.into());
        }
        self.frames += 1;
        Ok(())
    }

    /// Close the input and wait for the encoder. Returns the frame count.
    pub fn finish(mut self) -> Result<usize, AppError> {
        drop(self.stdin.take());
        wait_tool(FFMPEG, &mut self.child, self.stderr.take())?;
        tracing::debug!(path = %self.path.display(), frames = self.frames, "Encoder finished");
        Ok(self.frames)
    }

    /// Kill the encoder without finalizing its output.
    pub fn abort(mut self) {
        drop(self.stdin.take());
        if let Err(e) = self.child.kill() {
            tracing::debug!(error = %e, "Encoder already exited");
        }
        let _ = self.child.wait();
        if let Some(handle) = self.stderr.take() {
            let _ = handle.join();
        }
        tracing::debug!(path = %self.path.display(), frames = self.frames, "Encoder aborted");
    }
}

fn writer_args(
    output: &Path,
    width: usize,
    height: usize,
    fps: f64,
    options: &EncodeOptions,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-v".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "-s".into(),
        format!("{width}x{height}").into(),
        "-framerate".into(),
        fps.to_string().into(),
        "-i".into(),
        "pipe:0".into(),
    ];
    args.extend(options.args());
    args.push(output.as_os_str().to_owned());
    args
}

/// Copy the video stream of `video` and the audio stream of `audio_source`
/// into `output`.
pub fn remux_audio(video: &Path, audio_source: &Path, output: &Path) -> Result<(), AppError> {
    let mut cmd = Command::new(FFMPEG);
    cmd.args(["-y", "-v", "error", "-i"])
        .arg(video)
        .arg("-i")
        .arg(audio_source)
        .args([
            "-map",
            "0:v:0",
            "-map",
            "1:a:0",
            "-c:v",
            "copy",
            "-c:a",
            "copy",
            "-movflags",
            "+faststart",
        ])
        .arg(output);
    run_tool(FFMPEG, &mut cmd)?;
    Ok(())
}

/// Move a video-only encode to `output`, adding the audio of `audio_source`.
///
/// A failed remux is logged and the video-only file becomes the output.
/// Returns whether audio was attached.
pub fn attach_audio(video_only: &Path, audio_source: &Path, output: &Path) -> Result<bool, AppError> {
    match remux_audio(video_only, audio_source, output) {
        Ok(()) => {
            std::fs::remove_file(video_only)?;
            Ok(true)
        }
        Err(e) => {
            tracing::warn!(%e, "Audio remux failed, keeping video without audio");
            std::fs::rename(video_only, output)?;
            Ok(false)
        }
    }
}

/// Scratch path for the video-only encode next to `output`.
pub fn video_only_path(output: &Path) -> PathBuf {
    output.with_extension("video-only.mp4")
}

/// Settings for encoding a PNG sequence.
#[derive(Debug, Clone)]
pub struct StitchOptions {
    /// Frame rate; taken from `audio_source` (or [`DEFAULT_FPS`]) when unset.
    pub fps: Option<f64>,
    /// printf-style numeric file pattern, e.g. `frame_%06d.png`.
    pub pattern: String,
    pub start_number: Option<u32>,
    /// Match `*.png` in name order instead of `pattern`.
    pub glob: bool,
    /// Video whose audio (and frame rate) is reused.
    pub audio_source: Option<PathBuf>,
    pub encode: EncodeOptions,
    pub overwrite: bool,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            fps: None,
            pattern: "frame_%06d.png".to_string(),
            start_number: None,
            glob: false,
            audio_source: None,
            encode: EncodeOptions::default(),
            overwrite: false,
        }
    }
}

/// Encode the PNG frames in `frames_dir` into `output`.
pub fn stitch(frames_dir: &Path, output: &Path, options: &StitchOptions) -> Result<(), AppError> {
    if output.exists() && !options.overwrite {
        return Err(AppError::OutputExists(output.to_path_buf()));
    }

    let source = match &options.audio_source {
        Some(path) => Some(probe(path)?),
        None => None,
    };
    let fps = options
        .fps
        .or(source.as_ref().map(|info| info.fps))
        .unwrap_or(DEFAULT_FPS);
    let with_audio = source.as_ref().is_some_and(|info| info.has_audio);
    let target = if with_audio {
        video_only_path(output)
    } else {
        output.to_path_buf()
    };

    tracing::info!(
        frames = %frames_dir.display(),
        output = %output.display(),
        fps,
        glob = options.glob,
        "Stitching frames"
    );
    let mut cmd = Command::new(FFMPEG);
    cmd.args(stitch_args(frames_dir, &target, fps, options));
    run_tool(FFMPEG, &mut cmd)?;

    if let (true, Some(audio)) = (with_audio, &options.audio_source) {
        attach_audio(&target, audio, output)?;
    }
    Ok(())
}

fn stitch_args(frames_dir: &Path, output: &Path, fps: f64, options: &StitchOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-v".into(),
        "error".into(),
        "-framerate".into(),
        fps.to_string().into(),
    ];
    let input = if options.glob {
        args.extend(["-pattern_type".into(), "glob".into()]);
        frames_dir.join("*.png")
    } else {
        if let Some(start) = options.start_number {
            args.extend(["-start_number".into(), start.to_string().into()]);
        }
        frames_dir.join(&options.pattern)
    };
    args.push("-i".into());
    args.push(input.into_os_string());
    args.extend(options.encode.args());
    args.push(output.as_os_str().to_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_parse_probe_video_and_audio() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "width": 640, "height": 360,
                 "avg_frame_rate": "30000/1001", "r_frame_rate": "30000/1001"},
                {"codec_type": "audio", "sample_rate": "48000"}
            ]
        }"#;
        let info = parse_probe(json).unwrap();
        assert_eq!((info.width, info.height), (640, 360));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert!(info.has_audio);
    }

    #[test]
    fn test_parse_probe_falls_back_to_r_frame_rate_then_default() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 8, "height": 8,
            "avg_frame_rate": "0/0", "r_frame_rate": "25/1"}]}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.fps, 25.0);
        assert!(!info.has_audio);

        let json = r#"{"streams": [{"codec_type": "video", "width": 8, "height": 8}]}"#;
        assert_eq!(parse_probe(json).unwrap().fps, DEFAULT_FPS);
    }

    #[test]
    fn test_parse_probe_requires_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}]}"#;
        assert_eq!(parse_probe(json).unwrap_err(), "no video stream");
        assert!(parse_probe("not json").is_err());
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("24/1"), Some(24.0));
        assert_eq!(parse_rate("60"), Some(60.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("abc"), None);
    }

    #[test]
    fn test_reader_args_decode_stored_orientation() {
        let args = strings(&reader_args(Path::new("rotated.mov")));
        assert_eq!(
            args,
            vec![
                "-v", "error", "-nostdin", "-noautorotate", "-i", "rotated.mov", "-f",
                "rawvideo", "-pix_fmt", "rgb24", "pipe:1",
            ]
        );
        // Input options must come before the input they apply to.
        let flag = args.iter().position(|a| a == "-noautorotate").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(flag < input);
    }

    #[test]
    fn test_writer_args() {
        let args = writer_args(
            Path::new("out.mp4"),
            64,
            48,
            24.0,
            &EncodeOptions::default(),
        );
        assert_eq!(
            strings(&args),
            vec![
                "-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24", "-s", "64x48",
                "-framerate", "24", "-i", "pipe:0", "-c:v", "libx264", "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2", "-pix_fmt", "yuv420p", "-crf", "18", "-preset",
                "medium", "-movflags", "+faststart", "out.mp4",
            ]
        );
    }

    #[test]
    fn test_stitch_args_numeric_pattern() {
        let options = StitchOptions {
            start_number: Some(12),
            pattern: "frame_%08d.png".to_string(),
            ..StitchOptions::default()
        };
        let args = strings(&stitch_args(Path::new("frames"), Path::new("o.mp4"), 30.0, &options));
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], Path::new("frames").join("frame_%08d.png").to_string_lossy());
        assert!(args.windows(2).any(|w| w == ["-start_number", "12"]));
        assert!(!args.contains(&"-pattern_type".to_string()));
    }

    #[test]
    fn test_stitch_args_glob() {
        let options = StitchOptions {
            glob: true,
            start_number: Some(3),
            ..StitchOptions::default()
        };
        let args = strings(&stitch_args(Path::new("frames"), Path::new("o.mp4"), 12.5, &options));
        assert!(args.windows(2).any(|w| w == ["-pattern_type", "glob"]));
        assert!(args.windows(2).any(|w| w == ["-framerate", "12.5"]));
        assert!(!args.contains(&"-start_number".to_string()));
        assert_eq!(args.last().unwrap(), "o.mp4");
    }

    #[test]
    fn test_video_only_path() {
        assert_eq!(
            video_only_path(Path::new("dir/out.mp4")),
            PathBuf::from("dir/out.video-only.mp4")
        );
    }

    #[test]
    fn test_stitch_refuses_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("frames.mp4");
        std::fs::write(&output, b"x").unwrap();
        let err = stitch(dir.path(), &output, &StitchOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::OutputExists(p) if p == output));
    }
}
