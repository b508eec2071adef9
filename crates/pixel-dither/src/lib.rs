#![allow(clippy::needless_range_loop)]

//! pixel-dither: pixelation, color reduction and dithering for RGB images
//!
//! The crate turns an ordinary RGB frame into low-resolution, low-color
//! "pixel art". Everything is pure, synchronous and deterministic: the same
//! image and configuration always produce the same bytes.
//!
//! # Quick Start
//!
//! ```
//! use pixel_dither::{DitherMethod, DitherStage, Image, Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .pixel_factor(4)
//!     .color_count(64)
//!     .method(DitherMethod::Floyd)
//!     .stage(DitherStage::AfterUpscale1)
//!     .build()
//!     .unwrap();
//!
//! let frame = Image::from_fn(32, 24, |x, y| [(x * 8) as u8, (y * 10) as u8, 128]);
//! let out = Pipeline::new(config).run(&frame);
//!
//! // 32x24 -> 8x6 blocks -> two 2x upscales
//! assert_eq!(out.dimensions(), (32, 24));
//! ```
//!
//! # Building Blocks
//!
//! - [`Levels`] and [`quantize`]: uniform per-channel quantization to
//!   `L = round(cbrt(colors))` levels.
//! - [`DitherMethod`]: four error-diffusion kernels (Floyd-Steinberg,
//!   Atkinson, Burkes, Sierra) and three ordered Bayer matrices.
//! - [`resample`]: block-average downscale, nearest-neighbor upscale and
//!   resize, pixelation.
//! - [`Pipeline`]: the fixed scale chain with a selectable [`DitherStage`].
//!
//! # Stage Selection
//!
//! ```text
//! source --/pixel--> downscaled --x2--> upscaled1 --x2--> upscaled2 --xscale--> final
//!                        ^                  ^                  ^                  ^
//!                 after-downscale    after-upscale1     after-upscale2       after-final
//! ```
//!
//! Dithering at `after-downscale` yields the coarsest grain (each dithered
//! pixel ends up as a `4 * scale` square); `after-final` dithers at output
//! resolution.

pub mod dither;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod quantize;
pub mod resample;


pub use dither::{BayerSize, DitherMethod, Kernel};
pub use error::Error;
pub use image::Image;
pub use pipeline::{DitherStage, Pipeline, PipelineConfig, PipelineConfigBuilder};
pub use quantize::{quantize, Levels};
pub use resample::{
    downscale_block_average, pixelate, resize_nearest, resize_nearest_scale, upscale_nearest,
};
