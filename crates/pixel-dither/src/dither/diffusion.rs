//! Raster-order error diffusion shared by every kernel.

use crate::image::{Image, CHANNELS};
use crate::quantize::Levels;

use super::kernel::Kernel;

/// Dither `image` to `levels` by diffusing quantization error over `kernel`.
///
/// Pixels are visited row by row, left to right. Each channel of the
/// error-adjusted value is quantized independently, the quantized sample is
/// written to the output and `adjusted - quantized` is split over the
/// kernel's taps. Shares that land outside the image are dropped, not
/// redistributed.
///
/// Pending error lives in a ring of `kernel.rows()` row slots: row `y` uses
/// slot `y % rows` and clears it once scanned, ready for row `y + rows`.
pub fn diffuse(image: &Image, levels: Levels, kernel: &Kernel) -> Image {
    let (width, height) = image.dimensions();
    let src = image.as_raw();
    let stride = width * CHANNELS;
    let rows = kernel.rows();
    let divisor = f32::from(kernel.divisor);

    let mut out = vec![0u8; src.len()];
    let mut pending = vec![0.0f32; rows * stride];

    for y in 0..height {
        let slot = (y % rows) * stride;
        for x in 0..width {
            let idx = y * stride + x * CHANNELS;
            let mut error = [0.0f32; CHANNELS];
            for c in 0..CHANNELS {
                let value = f32::from(src[idx + c]) + pending[slot + x * CHANNELS + c];
                let quantized = levels.quantize(value);
                out[idx + c] = quantized;
                error[c] = value - f32::from(quantized);
            }

            for tap in kernel.taps {
                let tx = x as isize + isize::from(tap.dx);
                let ty = y + usize::from(tap.dy);
                if tx < 0 || tx as usize >= width || ty >= height {
                    continue;
                }
                let share = f32::from(tap.weight) / divisor;
                let at = (ty % rows) * stride + tx as usize * CHANNELS;
                for c in 0..CHANNELS {
                    pending[at + c] += error[c] * share;
                }
            }
        }
        pending[slot..slot + stride].fill(0.0);
    }

    Image::from_parts(width, height, out)
}
