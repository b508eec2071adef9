//! Validated pipeline configuration.

use std::fmt;
use std::str::FromStr;

use crate::dither::DitherMethod;
use crate::error::Error;
use crate::quantize::Levels;

/// Point in the resampling chain where dithering is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DitherStage {
    /// On the block-averaged image, before both 2x upscales.
    AfterDownscale,
    /// After the first 2x upscale.
    #[default]
    AfterUpscale1,
    /// After the second 2x upscale, before the final scale.
    AfterUpscale2,
    /// On the fully scaled image.
    AfterFinal,
}

impl DitherStage {
    pub const ALL: [DitherStage; 4] = [
        DitherStage::AfterDownscale,
        DitherStage::AfterUpscale1,
        DitherStage::AfterUpscale2,
        DitherStage::AfterFinal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DitherStage::AfterDownscale => "after-downscale",
            DitherStage::AfterUpscale1 => "after-upscale1",
            DitherStage::AfterUpscale2 => "after-upscale2",
            DitherStage::AfterFinal => "after-final",
        }
    }
}

impl fmt::Display for DitherStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DitherStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DitherStage::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::invalid(
                    "dither-stage",
                    format!(
                        "unknown stage {s:?}, expected one of: {}",
                        DitherStage::ALL.map(DitherStage::as_str).join(", ")
                    ),
                )
            })
    }
}

/// Immutable settings for one pipeline run.
///
/// Built with [`PipelineConfig::builder`]; every field is range-checked
/// before any pixel is touched.
///
/// # Example
///
/// ```
/// use pixel_dither::{DitherMethod, DitherStage, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .pixel_factor(4)
///     .color_count(32)
///     .method(DitherMethod::Bayer4)
///     .stage(DitherStage::AfterUpscale2)
///     .final_scale(2)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.levels().count(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pixel_factor: u32,
    color_count: u32,
    levels: Levels,
    method: DitherMethod,
    stage: DitherStage,
    dither_scale: f32,
    final_scale: u32,
}

impl PipelineConfig {
    /// Largest accepted `dither_scale`. The temporary resize allocates
    /// `scale^2` times the stage image.
    pub const MAX_DITHER_SCALE: f32 = 64.0;

    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Block size of the initial block-average downscale.
    #[inline]
    pub fn pixel_factor(&self) -> u32 {
        self.pixel_factor
    }

    /// Requested total color count.
    #[inline]
    pub fn color_count(&self) -> u32 {
        self.color_count
    }

    /// Per-channel levels derived from the color count.
    #[inline]
    pub fn levels(&self) -> Levels {
        self.levels
    }

    #[inline]
    pub fn method(&self) -> DitherMethod {
        self.method
    }

    #[inline]
    pub fn stage(&self) -> DitherStage {
        self.stage
    }

    /// Temporary resize factor applied around the dither step.
    #[inline]
    pub fn dither_scale(&self) -> f32 {
        self.dither_scale
    }

    /// Integer upscale applied after the two fixed 2x steps.
    #[inline]
    pub fn final_scale(&self) -> u32 {
        self.final_scale
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pixel_factor: 1,
            color_count: 256,
            levels: Levels(6),
            method: DitherMethod::None,
            stage: DitherStage::AfterUpscale1,
            dither_scale: 1.0,
            final_scale: 1,
        }
    }
}

/// Builder for [`PipelineConfig`].
///
/// Methods consume and return the builder; [`build`](Self::build) checks
/// every field and reports the first invalid one.
#[derive(Debug, Clone)]
pub struct PipelineConfigBuilder {
    pixel_factor: u32,
    color_count: u32,
    method: DitherMethod,
    stage: DitherStage,
    dither_scale: f32,
    final_scale: u32,
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            pixel_factor: defaults.pixel_factor,
            color_count: defaults.color_count,
            method: defaults.method,
            stage: defaults.stage,
            dither_scale: defaults.dither_scale,
            final_scale: defaults.final_scale,
        }
    }
}

impl PipelineConfigBuilder {
    #[inline]
    pub fn pixel_factor(mut self, factor: u32) -> Self {
        self.pixel_factor = factor;
        self
    }

    #[inline]
    pub fn color_count(mut self, colors: u32) -> Self {
        self.color_count = colors;
        self
    }

    #[inline]
    pub fn method(mut self, method: DitherMethod) -> Self {
        self.method = method;
        self
    }

    #[inline]
    pub fn stage(mut self, stage: DitherStage) -> Self {
        self.stage = stage;
        self
    }

    #[inline]
    pub fn dither_scale(mut self, scale: f32) -> Self {
        self.dither_scale = scale;
        self
    }

    #[inline]
    pub fn final_scale(mut self, scale: u32) -> Self {
        self.final_scale = scale;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<PipelineConfig, Error> {
        if self.pixel_factor < 1 {
            return Err(Error::invalid("pixel", "must be >= 1, got 0"));
        }
        let levels = Levels::from_color_count(self.color_count)?;
        let max_scale = PipelineConfig::MAX_DITHER_SCALE;
        if !(self.dither_scale > 0.0 && self.dither_scale <= max_scale) {
            return Err(Error::invalid(
                "dither-scale",
                format!("must be in (0, {max_scale}], got {}", self.dither_scale),
            ));
        }
        if self.final_scale < 1 {
            return Err(Error::invalid("scale", "must be >= 1, got 0"));
        }
        Ok(PipelineConfig {
            pixel_factor: self.pixel_factor,
            color_count: self.color_count,
            levels,
            method: self.method,
            stage: self.stage,
            dither_scale: self.dither_scale,
            final_scale: self.final_scale,
        })
    }
}
