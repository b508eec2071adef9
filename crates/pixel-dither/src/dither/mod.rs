//! Dithering methods.
//!
//! Two families are available, both quantizing to the uniform RGB grid
//! described by [`Levels`]:
//!
//! - **Error diffusion** ([`diffuse`]): Floyd-Steinberg, Atkinson, Burkes and
//!   three-row Sierra. One raster-scan loop, parameterized by a [`Kernel`].
//! - **Ordered** ([`ordered`]): tiled 2x2, 4x4 or 8x8 Bayer thresholds.
//!
//! [`DitherMethod`] is the closed set of methods selectable from the
//! pipeline, with `None` meaning plain quantization when called directly.

mod diffusion;
mod kernel;
mod ordered;

pub use diffusion::diffuse;
pub use kernel::{Kernel, Tap, ATKINSON, BURKES, FLOYD_STEINBERG, SIERRA};
pub use ordered::{ordered, BayerSize};

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::image::Image;
use crate::quantize::{quantize, Levels};

/// Dithering method selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DitherMethod {
    /// No dithering.
    #[default]
    None,
    /// Floyd-Steinberg error diffusion.
    Floyd,
    /// Atkinson error diffusion (75% propagation).
    Atkinson,
    /// Burkes error diffusion.
    Burkes,
    /// Three-row Sierra error diffusion.
    Sierra,
    /// Ordered dithering with the 2x2 Bayer matrix.
    Bayer2,
    /// Ordered dithering with the 4x4 Bayer matrix.
    Bayer4,
    /// Ordered dithering with the 8x8 Bayer matrix.
    Bayer8,
}

impl DitherMethod {
    pub const ALL: [DitherMethod; 8] = [
        DitherMethod::None,
        DitherMethod::Floyd,
        DitherMethod::Atkinson,
        DitherMethod::Burkes,
        DitherMethod::Sierra,
        DitherMethod::Bayer2,
        DitherMethod::Bayer4,
        DitherMethod::Bayer8,
    ];

    /// Name used on the command line and in presets.
    pub fn as_str(self) -> &'static str {
        match self {
            DitherMethod::None => "none",
            DitherMethod::Floyd => "floyd",
            DitherMethod::Atkinson => "atkinson",
            DitherMethod::Burkes => "burkes",
            DitherMethod::Sierra => "sierra",
            DitherMethod::Bayer2 => "bayer2",
            DitherMethod::Bayer4 => "bayer4",
            DitherMethod::Bayer8 => "bayer8",
        }
    }

    /// Diffusion kernel for error-diffusion methods.
    pub fn kernel(self) -> Option<&'static Kernel> {
        match self {
            DitherMethod::Floyd => Some(&FLOYD_STEINBERG),
            DitherMethod::Atkinson => Some(&ATKINSON),
            DitherMethod::Burkes => Some(&BURKES),
            DitherMethod::Sierra => Some(&SIERRA),
            _ => None,
        }
    }

    /// Threshold matrix size for ordered methods.
    pub fn bayer_size(self) -> Option<BayerSize> {
        match self {
            DitherMethod::Bayer2 => Some(BayerSize::Two),
            DitherMethod::Bayer4 => Some(BayerSize::Four),
            DitherMethod::Bayer8 => Some(BayerSize::Eight),
            _ => None,
        }
    }

    /// Reduce `image` to `levels` with this method.
    ///
    /// `None` quantizes without dithering. The pipeline never calls this
    /// for `None`; see [`Pipeline::run`](crate::Pipeline::run).
    pub fn apply(self, image: &Image, levels: Levels) -> Image {
        if let Some(kernel) = self.kernel() {
            return diffuse(image, levels, kernel);
        }
        if let Some(size) = self.bayer_size() {
            return ordered(image, levels, size);
        }
        quantize(image, levels)
    }
}

impl fmt::Display for DitherMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DitherMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DitherMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::invalid(
                    "dither",
                    format!(
                        "unknown method {s:?}, expected one of: {}",
                        DitherMethod::ALL.map(DitherMethod::as_str).join(", ")
                    ),
                )
            })
    }
}
