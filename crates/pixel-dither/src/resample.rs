//! Nearest-neighbor resampling and block averaging.
//!
//! These primitives build the fixed scale chain of the pipeline:
//! block-average downscale to pick the "pixel art" grid, integer
//! replication to grow it back, and arbitrary nearest resizing for the
//! final scale and the temporary dither-scale wrap.

use crate::image::{Image, CHANNELS};

/// Average non-overlapping `factor x factor` blocks.
///
/// Partial blocks at the right and bottom edges are averaged over the
/// pixels they contain. The output is `ceil(W / factor) x ceil(H / factor)`
/// and each sample is the rounded block mean. `factor <= 1` returns a copy.
pub fn downscale_block_average(image: &Image, factor: usize) -> Image {
    if factor <= 1 {
        return image.clone();
    }
    let (width, height) = image.dimensions();
    let out_w = width.div_ceil(factor);
    let out_h = height.div_ceil(factor);
    let src = image.as_raw();
    let mut out = Vec::with_capacity(out_w * out_h * CHANNELS);

    for by in 0..out_h {
        let y0 = by * factor;
        let y1 = (y0 + factor).min(height);
        for bx in 0..out_w {
            let x0 = bx * factor;
            let x1 = (x0 + factor).min(width);
            let mut sum = [0u64; 3];
            for y in y0..y1 {
                let row = &src[(y * width + x0) * CHANNELS..(y * width + x1) * CHANNELS];
                for px in row.chunks_exact(CHANNELS) {
                    for c in 0..CHANNELS {
                        sum[c] += u64::from(px[c]);
                    }
                }
            }
            let count = ((y1 - y0) * (x1 - x0)) as f64;
            for s in sum {
                out.push((s as f64 / count).round_ties_even().clamp(0.0, 255.0) as u8);
            }
        }
    }

    Image::from_parts(out_w, out_h, out)
}

/// Replicate every pixel into a `factor x factor` block.
///
/// Output pixel `(x, y)` copies source pixel `(x / factor, y / factor)`.
/// `factor <= 1` returns a copy.
pub fn upscale_nearest(image: &Image, factor: usize) -> Image {
    if factor <= 1 {
        return image.clone();
    }
    let (width, height) = image.dimensions();
    let src = image.as_raw();
    let out_w = width * factor;
    let mut out = Vec::with_capacity(out_w * height * factor * CHANNELS);

    let mut row = Vec::with_capacity(out_w * CHANNELS);
    for y in 0..height {
        row.clear();
        for px in src[y * width * CHANNELS..(y + 1) * width * CHANNELS].chunks_exact(CHANNELS) {
            for _ in 0..factor {
                row.extend_from_slice(px);
            }
        }
        for _ in 0..factor {
            out.extend_from_slice(&row);
        }
    }

    Image::from_parts(out_w, height * factor, out)
}

/// Resize to exactly `new_width x new_height` with nearest-neighbor sampling.
///
/// Output pixel `(x, y)` reads source pixel
/// `(floor(x * W / new_width), floor(y * H / new_height))`, clamped to the
/// source bounds. Zero target dimensions are raised to 1.
pub fn resize_nearest(image: &Image, new_width: usize, new_height: usize) -> Image {
    let new_width = new_width.max(1);
    let new_height = new_height.max(1);
    let (width, height) = image.dimensions();
    if (width, height) == (new_width, new_height) {
        return image.clone();
    }

    let map = |i: usize, src: usize, dst: usize| -> usize {
        let s = (i as u64 * src as u64 / dst as u64) as usize;
        s.min(src - 1)
    };
    let xs: Vec<usize> = (0..new_width).map(|x| map(x, width, new_width)).collect();

    let src = image.as_raw();
    let mut out = Vec::with_capacity(new_width * new_height * CHANNELS);
    for y in 0..new_height {
        let sy = map(y, height, new_height);
        let row = &src[sy * width * CHANNELS..(sy + 1) * width * CHANNELS];
        for &sx in &xs {
            out.extend_from_slice(&row[sx * CHANNELS..(sx + 1) * CHANNELS]);
        }
    }

    Image::from_parts(new_width, new_height, out)
}

/// Target size for scaling `(width, height)` by `scale`.
///
/// Each dimension is `max(1, round(d * scale))`.
pub fn scaled_dimensions(width: usize, height: usize, scale: f32) -> (usize, usize) {
    let scale = f64::from(scale);
    let dim = |d: usize| ((d as f64 * scale).round_ties_even() as usize).max(1);
    (dim(width), dim(height))
}

/// Resize by a positive float `scale` with nearest-neighbor sampling.
pub fn resize_nearest_scale(image: &Image, scale: f32) -> Image {
    let (w, h) = scaled_dimensions(image.width(), image.height(), scale);
    resize_nearest(image, w, h)
}

/// Classic pixelation: block-average by `factor`, then replicate back.
///
/// The result has the input's dimensions; when they are not multiples of
/// `factor` the replicated grid is cropped at the right and bottom edges.
pub fn pixelate(image: &Image, factor: usize) -> Image {
    if factor <= 1 {
        return image.clone();
    }
    let (width, height) = image.dimensions();
    let grown = upscale_nearest(&downscale_block_average(image, factor), factor);
    if grown.dimensions() == (width, height) {
        return grown;
    }
    crop(&grown, width, height)
}

/// Top-left `width x height` region of `image`.
fn crop(image: &Image, width: usize, height: usize) -> Image {
    let src = image.as_raw();
    let stride = image.width() * CHANNELS;
    let mut out = Vec::with_capacity(width * height * CHANNELS);
    for y in 0..height {
        out.extend_from_slice(&src[y * stride..y * stride + width * CHANNELS]);
    }
    Image::from_parts(width, height, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn gradient(width: usize, height: usize) -> Image {
        Image::from_fn(width, height, |x, y| {
            [(x * 10) as u8, (y * 10) as u8, ((x + y) * 5) as u8]
        })
    }

    #[test]
    fn test_block_average_exact_blocks() {
        let img = Image::from_fn(4, 2, |x, _| if x < 2 { [10, 20, 30] } else { [0, 1, 255] });
        let out = downscale_block_average(&img, 2);
        assert_eq!(out.dimensions(), (2, 1));
        assert_eq!(out.pixel(0, 0), [10, 20, 30]);
        assert_eq!(out.pixel(1, 0), [0, 1, 255]);
    }

    #[test]
    fn test_block_average_rounds_mean_half_to_even() {
        // r: 2 / 4 = 0.5 -> 0; g: 6 / 4 = 1.5 -> 2; b: 1 / 4 = 0.25 -> 0
        let img = Image::from_fn(2, 2, |x, y| [x as u8, (x * 3) as u8, (x * y) as u8]);
        let out = downscale_block_average(&img, 2);
        assert_eq!(out.pixel(0, 0), [0, 2, 0]);
    }

    #[test]
    fn test_block_average_huge_block_does_not_overflow() {
        // 4105^2 * 255 exceeds u32::MAX
        let side = 4105;
        let img = Image::from_fn(side, side, |_, _| [255, 0, 128]);
        let out = downscale_block_average(&img, side);
        assert_eq!(out.dimensions(), (1, 1));
        assert_eq!(out.pixel(0, 0), [255, 0, 128]);
    }

    #[test]
    fn test_block_average_partial_edge_blocks() {
        // 5x3 with factor 2 -> 3x2; the last column/row average fewer pixels.
        let img = gradient(5, 3);
        let out = downscale_block_average(&img, 2);
        assert_eq!(out.dimensions(), (3, 2));
        // Right column block holds x = 4, y in 0..2: r = 40, g = (0 + 10) / 2,
        // b = (20 + 25) / 2 = 22.5 -> 22
        assert_eq!(out.pixel(2, 0), [40, 5, 22]);
        // Bottom-right block is the single pixel (4, 2).
        assert_eq!(out.pixel(2, 1), img.pixel(4, 2));
    }

    #[test]
    fn test_block_average_factor_one_is_identity() {
        let img = gradient(7, 5);
        assert_eq!(downscale_block_average(&img, 1), img);
    }

    #[test]
    fn test_upscale_nearest_replicates_blocks() {
        let img = gradient(3, 2);
        let out = upscale_nearest(&img, 3);
        assert_eq!(out.dimensions(), (9, 6));
        for y in 0..6 {
            for x in 0..9 {
                assert_eq!(out.pixel(x, y), img.pixel(x / 3, y / 3));
            }
        }
    }

    #[test]
    fn test_upscale_then_block_average_restores_source() {
        let img = gradient(4, 3);
        assert_eq!(downscale_block_average(&upscale_nearest(&img, 4), 4), img);
    }

    #[test]
    fn test_resize_nearest_mapping() {
        let img = gradient(4, 4);
        let out = resize_nearest(&img, 6, 2);
        assert_eq!(out.dimensions(), (6, 2));
        // x: floor(x * 4 / 6) = 0, 0, 1, 2, 2, 3; y: floor(y * 4 / 2) = 0, 2
        let xs = [0, 0, 1, 2, 2, 3];
        for (x, &sx) in xs.iter().enumerate() {
            assert_eq!(out.pixel(x, 0), img.pixel(sx, 0));
            assert_eq!(out.pixel(x, 1), img.pixel(sx, 2));
        }
    }

    #[test]
    fn test_resize_nearest_same_size_is_copy() {
        let img = gradient(5, 5);
        assert_eq!(resize_nearest(&img, 5, 5), img);
    }

    #[test]
    fn test_resize_nearest_scale_dimensions() {
        let img = gradient(10, 6);
        assert_eq!(resize_nearest_scale(&img, 0.5).dimensions(), (5, 3));
        assert_eq!(resize_nearest_scale(&img, 1.5).dimensions(), (15, 9));
        assert_eq!(resize_nearest_scale(&img, 0.01).dimensions(), (1, 1));
    }

    #[test]
    fn test_scaled_dimensions_ties_round_to_even() {
        assert_eq!(scaled_dimensions(5, 7, 0.5), (2, 4));
        assert_eq!(scaled_dimensions(3, 1, 0.5), (2, 1));
    }

    #[test]
    fn test_resize_scale_round_trip_shape() {
        let img = gradient(8, 6);
        for scale in [2.0, 0.5, 4.0, 3.0] {
            let there = resize_nearest_scale(&img, scale);
            let back = resize_nearest_scale(&there, 1.0 / scale);
            assert_eq!(back.dimensions(), img.dimensions(), "scale {scale}");
        }
    }

    #[test]
    fn test_integer_scale_matches_upscale() {
        let img = gradient(3, 4);
        assert_eq!(resize_nearest_scale(&img, 2.0), upscale_nearest(&img, 2));
    }

    #[test]
    fn test_pixelate_keeps_dimensions_and_flattens_blocks() {
        let img = gradient(7, 5);
        let out = pixelate(&img, 3);
        assert_eq!(out.dimensions(), (7, 5));
        for y in 0..5 {
            for x in 0..7 {
                assert_eq!(out.pixel(x, y), out.pixel(x / 3 * 3, y / 3 * 3));
            }
        }
        let small = downscale_block_average(&img, 3);
        assert_eq!(out.pixel(6, 4), small.pixel(2, 1));
    }
}
