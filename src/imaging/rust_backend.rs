//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::guess_format` + `ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, WebP) | `image::load_from_memory_with_format` |
//! | Resample | `image::imageops::resize` with `Lanczos3` onto a transparent RGBA canvas |
//! | Crop | `image::imageops::crop_imm` (exact pixels, no resampling) |
//! | Encode → JPEG | `jpeg-encoder`, progressive |
//! | Encode → PNG | `image::codecs::png::PngEncoder`, compression from [`Quality::png_level`] |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//!
//! The pure-Rust WebP encoder has no lossy mode, so WebP thumbnails are
//! always lossless and [`Quality`] only affects JPEG and PNG.

use super::backend::{BackendError, ImageBackend};
use super::calculations::CropPlan;
use super::params::{Dimensions, Quality, SourceFormat};
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_format(bytes: &[u8]) -> Result<SourceFormat, BackendError> {
    match image::guess_format(bytes) {
        Ok(format) => SourceFormat::from_image_format(format).ok_or_else(|| {
            BackendError::Unsupported(
                format
                    .extensions_str()
                    .first()
                    .copied()
                    .unwrap_or("unknown")
                    .to_string(),
            )
        }),
        Err(_) => Err(BackendError::Unsupported("unrecognized data".to_string())),
    }
}

fn decode(bytes: &[u8], format: SourceFormat) -> Result<DynamicImage, BackendError> {
    image::load_from_memory_with_format(bytes, format.image_format()).map_err(|e| {
        BackendError::Decode {
            format,
            message: e.to_string(),
        }
    })
}

/// Resample onto a fully transparent canvas of the intermediate size, then
/// cut the crop window out of it.
fn resize_and_crop(img: &DynamicImage, plan: &CropPlan) -> RgbaImage {
    let resized = image::imageops::resize(
        &img.to_rgba8(),
        plan.intermediate_width,
        plan.intermediate_height,
        FilterType::Lanczos3,
    );

    let mut canvas = RgbaImage::from_pixel(
        plan.intermediate_width,
        plan.intermediate_height,
        Rgba([0, 0, 0, 0]),
    );
    image::imageops::replace(&mut canvas, &resized, 0, 0);

    image::imageops::crop_imm(
        &canvas,
        plan.crop_x,
        plan.crop_y,
        plan.crop_width,
        plan.crop_height,
    )
    .to_image()
}

fn encode(img: RgbaImage, format: SourceFormat, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let encode_err = |message: String| BackendError::Encode { format, message };
    let (width, height) = img.dimensions();
    let mut buf = Vec::new();

    match format {
        SourceFormat::Jpeg => {
            let (w, h) = match (u16::try_from(width), u16::try_from(height)) {
                (Ok(w), Ok(h)) => (w, h),
                _ => {
                    return Err(encode_err(format!(
                        "{width}x{height} exceeds the JPEG size limit"
                    )));
                }
            };
            let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
            let mut encoder = jpeg_encoder::Encoder::new(&mut buf, quality.value() as u8);
            encoder.set_progressive(true);
            encoder
                .encode(rgb.as_raw(), w, h, jpeg_encoder::ColorType::Rgb)
                .map_err(|e| encode_err(e.to_string()))?;
        }
        SourceFormat::Png => {
            let compression = match quality.png_level() {
                0..=2 => CompressionType::Fast,
                3..=6 => CompressionType::Default,
                _ => CompressionType::Best,
            };
            PngEncoder::new_with_quality(&mut buf, compression, PngFilter::Adaptive)
                .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| encode_err(e.to_string()))?;
        }
        // Lossless at every quality.
        SourceFormat::WebP => {
            WebPEncoder::new_lossless(&mut buf)
                .encode(img.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| encode_err(e.to_string()))?;
        }
    }

    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<(SourceFormat, Dimensions), BackendError> {
        let format = detect_format(bytes)?;
        let (width, height) = ImageReader::with_format(Cursor::new(bytes), format.image_format())
            .into_dimensions()
            .map_err(|e| BackendError::Decode {
                format,
                message: e.to_string(),
            })?;
        if width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "source has empty dimensions {width}x{height}"
            )));
        }
        Ok((format, Dimensions { width, height }))
    }

    fn render(
        &self,
        bytes: &[u8],
        format: SourceFormat,
        plan: &CropPlan,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let img = decode(bytes, format)?;
        let cropped = resize_and_crop(&img, plan);
        encode(cropped, format, quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::plan;
    use crate::test_helpers::{jpeg_bytes, png_bytes, webp_bytes};

    fn render(bytes: &[u8], target: (u32, u32)) -> (SourceFormat, Vec<u8>) {
        let backend = RustBackend::new();
        let (format, dims) = backend.identify(bytes).unwrap();
        let p = plan((dims.width, dims.height), target);
        let out = backend
            .render(bytes, format, &p, Quality::default())
            .unwrap();
        (format, out)
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let backend = RustBackend::new();
        let (format, dims) = backend.identify(&jpeg_bytes(200, 150)).unwrap();
        assert_eq!(format, SourceFormat::Jpeg);
        assert_eq!((dims.width, dims.height), (200, 150));
    }

    #[test]
    fn identify_rejects_gif_as_unsupported() {
        let gif = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";
        let err = RustBackend::new().identify(gif).unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)), "{err}");
    }

    #[test]
    fn identify_rejects_garbage() {
        let err = RustBackend::new().identify(b"not an image").unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[test]
    fn jpeg_thumbnail_has_exact_size_and_is_progressive() {
        let (format, out) = render(&jpeg_bytes(400, 200), (100, 100));
        assert_eq!(format, SourceFormat::Jpeg);

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 100));
        // SOF2 marker = progressive DCT
        assert!(out.windows(2).any(|w| w == [0xFF, 0xC2]));
    }

    #[test]
    fn png_thumbnail_preserves_transparency() {
        let (format, out) = render(&png_bytes(120, 80, 0), (40, 40));
        assert_eq!(format, SourceFormat::Png);

        let decoded = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (40, 40));
        assert!(decoded.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn png_thumbnail_keeps_opaque_pixels_opaque() {
        let (_, out) = render(&png_bytes(120, 80, 255), (40, 60));
        let decoded = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (40, 60));
        assert!(decoded.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn webp_thumbnail_round_trips_in_webp() {
        let (format, out) = render(&webp_bytes(90, 160, 255), (30, 20));
        assert_eq!(format, SourceFormat::WebP);
        assert_eq!(SourceFormat::sniff(&out), Some(SourceFormat::WebP));

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 20));
    }

    #[test]
    fn webp_thumbnail_preserves_transparency() {
        let (format, out) = render(&webp_bytes(120, 80, 0), (40, 40));
        assert_eq!(format, SourceFormat::WebP);

        let decoded = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (40, 40));
        assert!(decoded.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn webp_is_lossless_whatever_the_quality() {
        let source = webp_bytes(90, 60, 255);
        let backend = RustBackend::new();
        let p = plan((90, 60), (30, 30));
        let low = backend
            .render(&source, SourceFormat::WebP, &p, Quality::new(10))
            .unwrap();
        let high = backend
            .render(&source, SourceFormat::WebP, &p, Quality::new(100))
            .unwrap();

        assert_eq!(low, high);
        assert!(low.windows(4).any(|w| w == b"VP8L"));
        assert!(!low.windows(4).any(|w| w == b"VP8 "));
    }

    #[test]
    fn upscaling_small_source_works() {
        let (_, out) = render(&png_bytes(10, 5, 255), (64, 64));
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn render_is_deterministic() {
        let source = jpeg_bytes(300, 200);
        let (_, a) = render(&source, (50, 50));
        let (_, b) = render(&source, (50, 50));
        assert_eq!(a, b);
    }

    #[test]
    fn render_with_wrong_format_is_decode_error() {
        let backend = RustBackend::new();
        let p = plan((10, 10), (5, 5));
        let err = backend
            .render(&png_bytes(10, 10, 255), SourceFormat::Jpeg, &p, Quality::default())
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::Decode {
                format: SourceFormat::Jpeg,
                ..
            }
        ));
    }
}
