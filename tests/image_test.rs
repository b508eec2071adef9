//! Tests for single-image processing: codec, presets and the pipeline
//! working together.

mod common;

use common::fixtures::{self, Scratch};
use pixel_dither::{DitherMethod, DitherStage, Pipeline, PipelineConfig};
use pixforge::codec::{encode_png, load_image, save_image};
use pixforge::config::{image_defaults, PipelineArgs, Preset};
use pixforge::AppError;
use pretty_assertions::assert_eq;

#[test]
fn test_png_round_trip_is_lossless() {
    let scratch = Scratch::new();
    let image = fixtures::gradient(37, 21);
    let path = scratch.write_png("gradient.png", &image);

    common::assert_png_file(&path);
    assert_eq!(load_image(&path).unwrap(), image);
}

#[test]
fn test_encode_png_matches_saved_file() {
    let scratch = Scratch::new();
    let image = fixtures::gradient(8, 8);
    let path = scratch.write_png("small.png", &image);
    assert_eq!(std::fs::read(&path).unwrap(), encode_png(&image).unwrap());
}

#[test]
fn test_other_formats_go_through_image_crate() {
    let scratch = Scratch::new();
    let image = fixtures::gradient(16, 9);
    let path = scratch.path("gradient.bmp");
    save_image(&image, &path).unwrap();

    // BMP is lossless as well
    assert_eq!(load_image(&path).unwrap(), image);
}

#[test]
fn test_load_missing_file_is_decode_error() {
    let scratch = Scratch::new();
    let path = scratch.path("missing.png");
    match load_image(&path) {
        Err(AppError::Decode { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn test_load_garbage_is_decode_error() {
    let scratch = Scratch::new();
    let path = scratch.write_text("noise.png", "definitely not a png");
    assert!(matches!(load_image(&path), Err(AppError::Decode { .. })));
}

#[test]
fn test_pixelated_file_output() {
    let scratch = Scratch::new();
    let input = scratch.write_png("in.png", &fixtures::gradient(40, 24));
    let output = scratch.path("out.png");

    let config = PipelineConfig::builder()
        .pixel_factor(8)
        .color_count(64)
        .method(DitherMethod::Bayer4)
        .stage(DitherStage::AfterDownscale)
        .final_scale(2)
        .build()
        .unwrap();
    let image = load_image(&input).unwrap();
    let result = Pipeline::new(config.clone()).run(&image);
    save_image(&result, &output).unwrap();

    let written = load_image(&output).unwrap();
    // 40x24 / 8 = 5x3, then x2 x2 x2
    assert_eq!(written.dimensions(), (40, 24));
    common::assert_on_grid(&written, config.levels());
    // Dithered at the downscaled node, so each dithered pixel is 8x8.
    common::assert_blocky(&written, 8);
}

#[test]
fn test_preset_file_drives_pipeline() {
    let scratch = Scratch::new();
    let preset = scratch.write_text(
        "retro.yaml",
        "pixel: 2\ncolors: 8\ndither: bayer2\ndither-stage: after-final\nscale: 2\n",
    );
    let args = PipelineArgs {
        preset: Some(preset),
        ..PipelineArgs::default()
    };
    let config = args.resolve(image_defaults()).unwrap();
    assert_eq!(config.method(), DitherMethod::Bayer2);
    assert_eq!(config.stage(), DitherStage::AfterFinal);

    // Flat 100 after averaging; dithered at full output resolution.
    let out = Pipeline::new(config).run(&fixtures::checkerboard(8));
    assert_eq!(out.dimensions(), (32, 32));
    for y in 0..32 {
        for x in 0..32 {
            let white = x % 2 == 0 && y % 2 == 1;
            assert_eq!(out.pixel(x, y), if white { [255; 3] } else { [0; 3] });
        }
    }
}

#[test]
fn test_missing_preset_file_is_reported() {
    let scratch = Scratch::new();
    let args = PipelineArgs {
        preset: Some(scratch.path("nope.yaml")),
        ..PipelineArgs::default()
    };
    assert!(matches!(
        args.resolve(image_defaults()),
        Err(AppError::Preset { .. })
    ));
}

#[test]
fn test_preset_parse_is_independent_of_flags() {
    let preset = Preset::parse("dither: atkinson\n").unwrap();
    assert_eq!(preset.dither.as_deref(), Some("atkinson"));
    assert_eq!(preset.pixel, None);
}
