//! Pixforge
//!
//! Pixel-art style pixelation and dithering for images and videos, built on
//! the `pixel-dither` crate. This library exposes the command building
//! blocks for integration testing.

pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod video;

pub use error::AppError;
