//! Raster image conversions: image to image, and image to single-page PDF.

use super::layout::{finish_document, int, media_box};
use crate::catalog::FormatId;
use crate::config::ConversionSettings;
use crate::error::OpError;
use crate::router::ConversionRequest;
use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::imageops::FilterType;
use image::{
    ColorType, DynamicImage, ExtendedColorType, ImageDecoder, ImageFormat, ImageReader, Rgb,
    RgbImage,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Stream};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

pub const JPEG_QUALITY: u8 = 95;
pub const ICO_SIZE: u32 = 256;

/// Codec for a format token; only image tokens have one.
pub fn image_format(format: &FormatId) -> Result<ImageFormat, OpError> {
    match format.as_str() {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "bmp" => Ok(ImageFormat::Bmp),
        "gif" => Ok(ImageFormat::Gif),
        "tiff" => Ok(ImageFormat::Tiff),
        "webp" => Ok(ImageFormat::WebP),
        "ico" => Ok(ImageFormat::Ico),
        other => Err(OpError::codec(format!("{} is not an image format", other))),
    }
}

pub fn convert_image(
    request: &ConversionRequest,
    _settings: &ConversionSettings,
) -> Result<Vec<u8>, OpError> {
    let image = load_image(request.source(), request.input())?;
    encode_image(image, request.output())
}

pub fn image_to_pdf(
    request: &ConversionRequest,
    _settings: &ConversionSettings,
) -> Result<Vec<u8>, OpError> {
    let embedded = if request.input().is_jpeg() {
        embed_jpeg(request.source())?
    } else {
        embed_raster(load_image(request.source(), request.input())?)
    };
    write_image_pdf(embedded)
}

/// Decode with the codec named by the filename-derived format, not by sniffing.
pub fn load_image(path: &Path, format: &FormatId) -> Result<DynamicImage, OpError> {
    let mut reader = ImageReader::open(path)?;
    reader.set_format(image_format(format)?);
    let image = reader.decode()?;
    debug!(
        "Decoded {} image {}x{} ({:?})",
        format,
        image.width(),
        image.height(),
        image.color()
    );
    Ok(image)
}

/// Encode `image` as `target`, applying the per-format rules:
/// JPEG is flattened onto white at fixed quality, ICO is a single 256x256
/// entry, everything else keeps its size and (where possible) color model.
pub fn encode_image(image: DynamicImage, target: &FormatId) -> Result<Vec<u8>, OpError> {
    let format = image_format(target)?;
    let mut out = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let flat = flatten_alpha(image);
            let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
            flat.write_with_encoder(encoder)?;
        }
        ImageFormat::Ico => {
            let icon = image
                .resize_exact(ICO_SIZE, ICO_SIZE, FilterType::Lanczos3)
                .to_rgba8();
            DynamicImage::ImageRgba8(icon).write_to(&mut out, ImageFormat::Ico)?;
        }
        other => {
            normalize_color(image, other).write_to(&mut out, other)?;
        }
    }

    Ok(out.into_inner())
}

/// Composite any alpha channel onto opaque white. Result is 8-bit gray or RGB.
pub fn flatten_alpha(image: DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
            DynamicImage::ImageLuma16(_) => DynamicImage::ImageLuma8(image.to_luma8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };
    }

    let rgba = image.to_rgba8();
    let mut flat = RgbImage::from_pixel(rgba.width(), rgba.height(), Rgb([255, 255, 255]));
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        flat.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    DynamicImage::ImageRgb8(flat)
}

/// Fall back to 8-bit RGB(A) when the target encoder can't take the source layout.
fn normalize_color(image: DynamicImage, format: ImageFormat) -> DynamicImage {
    use ColorType::*;

    let color = image.color();
    let supported = match format {
        ImageFormat::Png => matches!(color, L8 | La8 | Rgb8 | Rgba8 | L16 | La16 | Rgb16 | Rgba16),
        ImageFormat::Tiff => matches!(color, L8 | Rgb8 | Rgba8 | L16 | Rgb16 | Rgba16),
        ImageFormat::Bmp => matches!(color, L8 | La8 | Rgb8 | Rgba8),
        _ => matches!(color, Rgb8 | Rgba8),
    };

    if supported {
        image
    } else if color.has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

/// Image XObject ready to be placed on a page.
struct EmbeddedImage {
    width: u32,
    height: u32,
    stream: Stream,
}

/// JPEG data goes into the PDF untouched as a DCTDecode stream.
fn embed_jpeg(path: &Path) -> Result<EmbeddedImage, OpError> {
    let data = std::fs::read(path)?;
    let (width, height, color_space) = {
        let decoder = JpegDecoder::new(Cursor::new(data.as_slice()))?;
        let (width, height) = decoder.dimensions();
        let color_space = match decoder.original_color_type() {
            ExtendedColorType::L8 => "DeviceGray",
            ExtendedColorType::Cmyk8 => "DeviceCMYK",
            _ => "DeviceRGB",
        };
        (width, height, color_space)
    };

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8_i64,
        "Filter" => "DCTDecode",
    };

    Ok(EmbeddedImage {
        width,
        height,
        stream: Stream::new(dict, data).with_compression(false),
    })
}

/// Non-JPEG sources are embedded as raw 8-bit samples (Flate-compressed on save).
fn embed_raster(image: DynamicImage) -> EmbeddedImage {
    let flat = flatten_alpha(image);
    let (width, height) = (flat.width(), flat.height());
    let (color_space, samples) = match flat {
        DynamicImage::ImageLuma8(gray) => ("DeviceGray", gray.into_raw()),
        other => ("DeviceRGB", other.to_rgb8().into_raw()),
    };

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8_i64,
    };

    EmbeddedImage {
        width,
        height,
        stream: Stream::new(dict, samples),
    }
}

/// One page, sized to the image at one point per pixel.
fn write_image_pdf(embedded: EmbeddedImage) -> Result<Vec<u8>, OpError> {
    let (width, height) = (embedded.width as i64, embedded.height as i64);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(embedded.stream);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![int(width), int(0), int(0), int(height), int(0), int(0)],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => media_box(width, height),
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });

    finish_document(doc, pages_id, vec![page_id])
}
