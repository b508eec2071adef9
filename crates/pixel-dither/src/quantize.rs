//! Uniform per-channel quantization.
//!
//! Every channel is snapped independently to one of `L` evenly spaced
//! levels spanning `[0, 255]`. The resulting palette is the `L x L x L`
//! RGB grid, so a requested color count `C` is mapped to
//! `L = round(cbrt(C))`, clamped to `[2, 256]`.
//!
//! For `L = 4` the levels are 0, 85, 170 and 255.

use crate::error::Error;
use crate::image::Image;

/// Per-channel level count derived from a total color count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Levels(pub(crate) u16);

impl Levels {
    pub const MIN: u16 = 2;
    pub const MAX: u16 = 256;

    /// Use exactly `count` levels per channel.
    pub fn new(count: u16) -> Result<Self, Error> {
        if !(Self::MIN..=Self::MAX).contains(&count) {
            return Err(Error::invalid(
                "levels",
                format!("must be in {}..={}, got {count}", Self::MIN, Self::MAX),
            ));
        }
        Ok(Self(count))
    }

    /// Derive the level count from a total color count `C >= 2`.
    ///
    /// `L = clamp(round(cbrt(C)), 2, 256)`; the representable palette has
    /// `L^3` colors.
    pub fn from_color_count(colors: u32) -> Result<Self, Error> {
        if colors < 2 {
            return Err(Error::invalid(
                "colors",
                format!("must be >= 2, got {colors}"),
            ));
        }
        let root = f64::from(colors).cbrt().round();
        let count = root.clamp(f64::from(Self::MIN), f64::from(Self::MAX)) as u16;
        Ok(Self(count))
    }

    /// Levels per channel.
    #[inline]
    pub fn count(self) -> u16 {
        self.0
    }

    /// Distance between adjacent levels: `255 / (L - 1)`.
    #[inline]
    pub fn step(self) -> f32 {
        255.0 / f32::from(self.0 - 1)
    }

    /// Size of the RGB palette, `L^3`.
    pub fn total_colors(self) -> u32 {
        u32::from(self.0).pow(3)
    }

    /// Snap a (possibly out of range) channel value to the nearest level.
    ///
    /// `rint(rint(value / step) * step)` with ties to even, the level index
    /// clamped to `[0, L - 1]` and the result to `[0, 255]`.
    #[inline]
    pub fn quantize(self, value: f32) -> u8 {
        let step = self.step();
        let max_index = f32::from(self.0 - 1);
        let index = (value / step).round_ties_even().clamp(0.0, max_index);
        (index * step).round_ties_even().clamp(0.0, 255.0) as u8
    }

    /// The level values in ascending order.
    pub fn values(self) -> impl Iterator<Item = u8> {
        let step = self.step();
        (0..self.0)
            .map(move |i| (f32::from(i) * step).round_ties_even().clamp(0.0, 255.0) as u8)
    }

    /// Lookup table mapping every 8-bit sample to its level.
    fn lut(self) -> [u8; 256] {
        let mut table = [0u8; 256];
        for (v, slot) in table.iter_mut().enumerate() {
            *slot = self.quantize(v as f32);
        }
        table
    }
}

/// Quantize every sample of `image` to `levels` without dithering.
pub fn quantize(image: &Image, levels: Levels) -> Image {
    let lut = levels.lut();
    image.map_samples(|v| lut[v as usize])
}
