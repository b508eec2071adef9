//! Test images and scratch directories.

use std::path::{Path, PathBuf};
use std::process::Command;

use pixel_dither::Image;
use tempfile::TempDir;

/// Smooth RGB gradient with a diagonal blue ripple.
pub fn gradient(width: usize, height: usize) -> Image {
    Image::from_fn(width, height, |x, y| {
        [
            ((x * 255) / width) as u8,
            ((y * 255) / height) as u8,
            (((x + y) * 23) % 256) as u8,
        ]
    })
}

/// 200/0 checkerboard; every 2x2 block averages to 100.
pub fn checkerboard(size: usize) -> Image {
    Image::from_fn(size, size, |x, y| {
        if (x + y) % 2 == 0 {
            [200; 3]
        } else {
            [0; 3]
        }
    })
}

/// A scratch directory removed when the returned guard drops.
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `image` as PNG and return its path.
    pub fn write_png(&self, name: &str, image: &Image) -> PathBuf {
        let path = self.path(name);
        pixforge::codec::save_image(image, &path).expect("Failed to write fixture");
        path
    }

    /// Write a text file (presets) and return its path.
    pub fn write_text(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, content).expect("Failed to write fixture");
        path
    }
}

/// Generate a short test video with ffmpeg's `testsrc` (and a sine tone
/// when `audio` is set).
pub fn make_test_video(path: &Path, frames: usize, audio: bool) {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-v", "error", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=size=64x48:rate=10:duration={}", frames as f64 / 10.0));
    if audio {
        cmd.args(["-f", "lavfi", "-i", "sine=frequency=440:duration=2", "-shortest"]);
    }
    cmd.args(["-pix_fmt", "yuv420p"]).arg(path);
    let status = cmd.status().expect("ffmpeg must be installed for this test");
    assert!(status.success(), "ffmpeg failed to create test video");
}
