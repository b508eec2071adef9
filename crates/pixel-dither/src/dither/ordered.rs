//! Ordered (Bayer matrix) dithering.
//!
//! Instead of diffusing error, every sample is biased by a position
//! dependent threshold before quantization. The threshold tiles the image,
//! so flat regions turn into a stable repeating texture.

use crate::image::{Image, CHANNELS};
use crate::quantize::Levels;

const BAYER_2: [[u8; 2]; 2] = [[0, 2], [3, 1]];

const BAYER_4: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

const BAYER_8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Size of the threshold matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BayerSize {
    Two,
    Four,
    Eight,
}

impl BayerSize {
    pub fn n(self) -> usize {
        match self {
            BayerSize::Two => 2,
            BayerSize::Four => 4,
            BayerSize::Eight => 8,
        }
    }

    /// Raw matrix entry at `(x mod N, y mod N)`, in `0..N*N`.
    #[inline]
    pub fn entry(self, x: usize, y: usize) -> u8 {
        match self {
            BayerSize::Two => BAYER_2[y % 2][x % 2],
            BayerSize::Four => BAYER_4[y % 4][x % 4],
            BayerSize::Eight => BAYER_8[y % 8][x % 8],
        }
    }

    /// Normalized threshold `entry / N^2`, in `[0, 1)`.
    #[inline]
    pub fn threshold(self, x: usize, y: usize) -> f32 {
        let n = self.n();
        f32::from(self.entry(x, y)) / (n * n) as f32
    }
}

/// Dither `image` to `levels` with a tiled Bayer threshold.
///
/// Each sample `v` becomes `quantize(v + (t - 0.5) * step)` where `t` is the
/// normalized threshold at the pixel and `step = 255 / (L - 1)`.
pub fn ordered(image: &Image, levels: Levels, size: BayerSize) -> Image {
    let (width, height) = image.dimensions();
    let step = levels.step();
    let n = size.n();

    // One bias per matrix cell.
    let bias: Vec<f32> = (0..n * n)
        .map(|i| (size.threshold(i % n, i / n) - 0.5) * step)
        .collect();

    let src = image.as_raw();
    let mut out = vec![0u8; src.len()];
    for y in 0..height {
        let row_bias = &bias[(y % n) * n..(y % n + 1) * n];
        for x in 0..width {
            let b = row_bias[x % n];
            let idx = (y * width + x) * CHANNELS;
            for c in 0..CHANNELS {
                out[idx + c] = levels.quantize(f32::from(src[idx + c]) + b);
            }
        }
    }

    Image::from_parts(width, height, out)
}
