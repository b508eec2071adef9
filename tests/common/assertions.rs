//! Assertion helpers for tests.

use std::path::Path;

use pixel_dither::{Image, Levels};
use pretty_assertions::assert_eq;

/// Assert the file at `path` is a PNG
pub fn assert_png_file(path: &Path) {
    let bytes = std::fs::read(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    assert!(
        bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
        "Expected PNG at {}, got {} bytes starting with {:?}",
        path.display(),
        bytes.len(),
        &bytes[..8.min(bytes.len())]
    );
}

/// Assert every sample of `image` is one of the quantization levels
pub fn assert_on_grid(image: &Image, levels: Levels) {
    let allowed: Vec<u8> = levels.values().collect();
    let stray = image.as_raw().iter().find(|v| !allowed.contains(v));
    assert_eq!(
        stray,
        None,
        "Sample outside the {}-level grid {:?}",
        levels.count(),
        allowed
    );
}

/// Assert every `cell x cell` block of `image` is a single color
pub fn assert_blocky(image: &Image, cell: usize) {
    for y in 0..image.height() {
        for x in 0..image.width() {
            assert_eq!(
                image.pixel(x, y),
                image.pixel(x / cell * cell, y / cell * cell),
                "Pixel ({x}, {y}) differs from its {cell}x{cell} block"
            );
        }
    }
}
