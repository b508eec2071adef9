//! Image file adapter: decode anything to RGB8, encode PNG losslessly.

use std::io::Cursor;
use std::path::Path;

use pixel_dither::Image;

use crate::error::AppError;

/// Decode an image file and convert it to 8-bit RGB.
///
/// Alpha is dropped and grey or palette images are expanded to three
/// channels.
pub fn load_image(path: &Path) -> Result<Image, AppError> {
    let decoded = image::open(path).map_err(|e| AppError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    tracing::debug!(path = %path.display(), width, height, "Decoded image");
    Ok(Image::from_raw(
        width as usize,
        height as usize,
        rgb.into_raw(),
    )?)
}

/// Write `image` to `path`, choosing the format from the extension.
///
/// PNG goes through the `png` encoder directly; other extensions are
/// handled by the `image` crate.
pub fn save_image(image: &Image, path: &Path) -> Result<(), AppError> {
    if is_png(path) {
        let bytes = encode_png(image).map_err(|message| AppError::Encode {
            path: path.to_path_buf(),
            message,
        })?;
        std::fs::write(path, bytes)?;
        return Ok(());
    }

    let (width, height) = dimensions_u32(image).map_err(|message| AppError::Encode {
        path: path.to_path_buf(),
        message,
    })?;
    image::save_buffer(
        path,
        image.as_raw(),
        width,
        height,
        image::ExtendedColorType::Rgb8,
    )
    .map_err(|e| AppError::Encode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Encode `image` as an 8-bit RGB PNG in memory.
pub fn encode_png(image: &Image) -> Result<Vec<u8>, String> {
    let (width, height) = dimensions_u32(image)?;
    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = png::Encoder::new(&mut buf, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);
        let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
        writer
            .write_image_data(image.as_raw())
            .map_err(|e| e.to_string())?;
    }
    Ok(buf.into_inner())
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

fn dimensions_u32(image: &Image) -> Result<(u32, u32), String> {
    let width = u32::try_from(image.width()).map_err(|_| "width exceeds u32".to_string())?;
    let height = u32::try_from(image.height()).map_err(|_| "height exceeds u32".to_string())?;
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_png_signature_and_size() {
        let img = Image::from_fn(3, 2, |x, y| [x as u8, y as u8, 9]);
        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let decoder = png::Decoder::new(Cursor::new(bytes));
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!((info.width, info.height), (3, 2));
        assert_eq!(info.color_type, png::ColorType::Rgb);
    }

    #[test]
    fn test_is_png_ignores_case() {
        assert!(is_png(Path::new("a/frame.PNG")));
        assert!(is_png(Path::new("frame.png")));
        assert!(!is_png(Path::new("frame.jpg")));
        assert!(!is_png(Path::new("png")));
    }
}
