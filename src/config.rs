//! Pipeline settings from command-line flags and YAML presets.
//!
//! Precedence, highest first: explicit flag, preset value, command default.

use std::path::{Path, PathBuf};

use clap::Args;
use pixel_dither::{DitherMethod, DitherStage, PipelineConfig, PipelineConfigBuilder};
use serde::Deserialize;

use crate::error::AppError;

/// Pipeline flags shared by the `image`, `frames` and `video` commands.
#[derive(Debug, Clone, Default, Args)]
pub struct PipelineArgs {
    /// Block size of the initial downscale (>= 1)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub pixel: Option<u32>,

    /// Approximate palette size (>= 2); levels per channel = round(cbrt(colors))
    #[arg(long, value_parser = clap::value_parser!(u32).range(2..))]
    pub colors: Option<u32>,

    /// Dither method: none, floyd, atkinson, burkes, sierra, bayer2, bayer4, bayer8
    #[arg(long)]
    pub dither: Option<DitherMethod>,

    /// Where to dither: after-downscale, after-upscale1, after-upscale2, after-final
    #[arg(long = "dither-stage")]
    pub dither_stage: Option<DitherStage>,

    /// Temporary resize around the dither step, controls grain size (0 < s <= 64)
    #[arg(long = "dither-scale", value_parser = parse_dither_scale)]
    pub dither_scale: Option<f32>,

    /// Final nearest-neighbor upscale (>= 1)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub scale: Option<u32>,

    /// YAML preset with any of the pipeline fields above
    #[arg(long)]
    pub preset: Option<PathBuf>,
}

fn parse_dither_scale(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{e}"))?;
    let max = PipelineConfig::MAX_DITHER_SCALE;
    if !(value > 0.0 && value <= max) {
        return Err(format!("must be in (0, {max}], got {s}"));
    }
    Ok(value)
}

impl PipelineArgs {
    /// Load the preset, if any, and merge everything onto `defaults`.
    pub fn resolve(&self, defaults: PipelineConfigBuilder) -> Result<PipelineConfig, AppError> {
        let preset = match &self.preset {
            Some(path) => Preset::load(path)?,
            None => Preset::default(),
        };
        self.merge(preset, defaults)
    }

    /// Overlay `preset` and then the explicit flags onto `defaults`.
    pub fn merge(
        &self,
        preset: Preset,
        defaults: PipelineConfigBuilder,
    ) -> Result<PipelineConfig, AppError> {
        let mut builder = defaults;

        if let Some(pixel) = self.pixel.or(preset.pixel) {
            builder = builder.pixel_factor(pixel);
        }
        if let Some(colors) = self.colors.or(preset.colors) {
            builder = builder.color_count(colors);
        }
        let method = match (self.dither, preset.dither.as_deref()) {
            (Some(method), _) => Some(method),
            (None, Some(name)) => Some(name.parse::<DitherMethod>()?),
            (None, None) => None,
        };
        if let Some(method) = method {
            builder = builder.method(method);
        }
        let stage = match (self.dither_stage, preset.dither_stage.as_deref()) {
            (Some(stage), _) => Some(stage),
            (None, Some(name)) => Some(name.parse::<DitherStage>()?),
            (None, None) => None,
        };
        if let Some(stage) = stage {
            builder = builder.stage(stage);
        }
        if let Some(scale) = self.dither_scale.or(preset.dither_scale) {
            builder = builder.dither_scale(scale);
        }
        if let Some(scale) = self.scale.or(preset.scale) {
            builder = builder.final_scale(scale);
        }

        let config = builder.build()?;
        tracing::debug!(
            pixel = config.pixel_factor(),
            colors = config.color_count(),
            levels = config.levels().count(),
            method = %config.method(),
            stage = %config.stage(),
            dither_scale = config.dither_scale(),
            scale = config.final_scale(),
            "Resolved pipeline configuration"
        );
        Ok(config)
    }
}

/// Defaults of the `image` and `frames` commands.
pub fn image_defaults() -> PipelineConfigBuilder {
    PipelineConfig::builder()
}

/// Defaults of the `video` command: a chunky 16px look with 2x2 Bayer grain.
pub fn video_defaults() -> PipelineConfigBuilder {
    PipelineConfig::builder()
        .pixel_factor(16)
        .color_count(32)
        .method(DitherMethod::Bayer2)
        .stage(DitherStage::AfterUpscale2)
        .final_scale(4)
}

/// Pipeline preset loaded from YAML.
///
/// ```yaml
/// pixel: 8
/// colors: 64
/// dither: bayer4
/// dither-stage: after-upscale2
/// dither-scale: 1.0
/// scale: 2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Preset {
    pub pixel: Option<u32>,
    pub colors: Option<u32>,
    pub dither: Option<String>,
    pub dither_stage: Option<String>,
    pub dither_scale: Option<f32>,
    pub scale: Option<u32>,
}

impl Preset {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::Preset {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let preset = Self::parse(&content).map_err(|message| AppError::Preset {
            path: path.to_path_buf(),
            message,
        })?;
        tracing::info!(path = %path.display(), "Loaded preset");
        Ok(preset)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        // An empty file is an empty preset.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }
}
