//! Re-encoding of generated images into the requested output format.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage, ImageEncoder};

use crate::core::{ErgonError, ImageFormat, Quality};

/// Returns `bytes` unchanged when `source_mime` already matches `target`,
/// otherwise decodes and re-encodes them.
pub fn transcode(bytes: Vec<u8>, source_mime: &str, target: ImageFormat, quality: Quality) -> Result<Vec<u8>, ErgonError> {
    if source_mime.eq_ignore_ascii_case(target.mime_type()) {
        return Ok(bytes);
    }

    tracing::debug!("Transcoding {} bytes from {} to {}", bytes.len(), source_mime, target.mime_type());
    let image = image::load_from_memory(&bytes).map_err(|e| ErgonError::Image(format!("Failed to decode {}: {}", source_mime, e)))?;
    encode(&image, target, quality)
}

pub fn encode(image: &DynamicImage, format: ImageFormat, quality: Quality) -> Result<Vec<u8>, ErgonError> {
    let mut out = Vec::new();
    let (width, height) = (image.width(), image.height());

    let result = match format {
        ImageFormat::Png => {
            let rgba = image.to_rgba8();
            PngEncoder::new(&mut out).write_image(rgba.as_raw(), width, height, ColorType::Rgba8)
        }
        ImageFormat::Jpg | ImageFormat::Jpeg => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, quality.get()).write_image(rgb.as_raw(), width, height, ColorType::Rgb8)
        }
        ImageFormat::Webp => {
            let rgba = image.to_rgba8();
            WebPEncoder::new_lossless(&mut out).encode(rgba.as_raw(), width, height, ColorType::Rgba8)
        }
    };

    result.map_err(|e| ErgonError::Image(format!("Failed to encode {}: {}", format, e)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(8, 4, |x, y| Rgba([(x * 30) as u8, (y * 60) as u8, 128, 255]));
        encode(&DynamicImage::ImageRgba8(img), ImageFormat::Png, Quality::default()).unwrap()
    }

    #[test]
    fn same_format_passes_through() {
        let png = sample_png();
        let out = transcode(png.clone(), "image/png", ImageFormat::Png, Quality::default()).unwrap();
        assert_eq!(out, png);
    }

    #[test]
    fn png_to_jpeg_and_webp() {
        let png = sample_png();

        let jpeg = transcode(png.clone(), "image/png", ImageFormat::Jpg, Quality::parse("80").unwrap()).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));

        let webp = transcode(png, "image/png", ImageFormat::Webp, Quality::default()).unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[test]
    fn undecodable_input_is_an_image_error() {
        let err = transcode(vec![1, 2, 3], "image/jpeg", ImageFormat::Png, Quality::default()).unwrap_err();
        assert!(matches!(err, ErgonError::Image(_)));
    }
}
