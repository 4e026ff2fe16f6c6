//! Conversion between image XObjects and self-describing raster bytes.

use std::io::{Cursor, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{dictionary, Dictionary, Document as LopdfDocument, Object, Stream};

use super::colorspace::{cmyk_to_rgb, ColorSpace};
use super::source::{resolve, stream_bytes};
use super::RasterImage;
use crate::error::ImageDecodeError;

/// Decode an image XObject.
///
/// JPEG and JPEG 2000 payloads are returned as stored; sampled images are
/// re-encoded as PNG.
pub(crate) fn decode_image_stream(
    doc: &LopdfDocument,
    stream: &Stream,
) -> Result<RasterImage, ImageDecodeError> {
    let dict = &stream.dict;
    let width = positive_int(doc, dict, b"Width")?;
    let height = positive_int(doc, dict, b"Height")?;
    let filters = filter_names(doc, dict);

    let passthrough = match filters.last().map(Vec::as_slice) {
        Some(b"DCTDecode" | b"DCT") => Some("jpg"),
        Some(b"JPXDecode") => Some("jpx"),
        Some(
            name @ (b"CCITTFaxDecode" | b"CCF" | b"JBIG2Decode" | b"RunLengthDecode" | b"RL"),
        ) => {
            return Err(ImageDecodeError::Unsupported(
                String::from_utf8_lossy(name).into_owned(),
            ))
        }
        _ => None,
    };
    if let Some(format) = passthrough {
        if filters.len() > 1 {
            return Err(ImageDecodeError::Unsupported(format!(
                "{} behind {} other filters",
                format,
                filters.len() - 1
            )));
        }
        return Ok(RasterImage {
            format: format.to_string(),
            width,
            height,
            bytes: stream.content.clone(),
        });
    }

    let samples = sample_bytes(doc, stream, &filters)?;
    let image_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let (space, bits) = if image_mask {
        (ColorSpace::DeviceGray, 1)
    } else {
        let space = dict
            .get(b"ColorSpace")
            .map(|obj| ColorSpace::from_object(doc, obj))
            .unwrap_or(ColorSpace::DeviceGray);
        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| resolve(doc, o).as_i64().ok())
            .unwrap_or(8);
        (space, bits)
    };

    let raster = samples_to_image(&samples, width, height, bits, &space)?;
    let mut bytes = Vec::new();
    raster.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(RasterImage {
        format: "png".to_string(),
        width,
        height,
        bytes,
    })
}

/// An image prepared for embedding: the XObject stream and its soft mask.
pub(crate) struct PreparedImage {
    pub(crate) image: Stream,
    pub(crate) soft_mask: Option<Stream>,
}

/// Turn codec bytes into image XObject streams.
///
/// JPEG data is embedded as is under `DCTDecode`; anything else the codec
/// layer can read becomes 8-bit RGB with the alpha channel split into an
/// `SMask`.
pub(crate) fn prepare_image(
    format: &str,
    bytes: &[u8],
    compress: bool,
) -> Result<PreparedImage, ImageDecodeError> {
    if is_jpeg(format, bytes) {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
        let space = if decoded.color().channel_count() == 1 {
            "DeviceGray"
        } else {
            "DeviceRGB"
        };
        let image = Stream::new(
            image_dict(decoded.width(), decoded.height(), space, Some("DCTDecode")),
            bytes.to_vec(),
        );
        return Ok(PreparedImage {
            image,
            soft_mask: None,
        });
    }

    let decoded = image::load_from_memory(bytes)?;
    let (width, height) = (decoded.width(), decoded.height());
    let soft_mask = if decoded.color().has_alpha() {
        let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|p| p.0[3]).collect();
        Some(sample_stream(width, height, "DeviceGray", alpha, compress)?)
    } else {
        None
    };
    let rgb = decoded.to_rgb8().into_raw();
    let image = sample_stream(width, height, "DeviceRGB", rgb, compress)?;
    Ok(PreparedImage { image, soft_mask })
}

/// Zlib-compress stream data.
pub(crate) fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn is_jpeg(format: &str, bytes: &[u8]) -> bool {
    format.eq_ignore_ascii_case("jpg")
        || format.eq_ignore_ascii_case("jpeg")
        || bytes.starts_with(&[0xFF, 0xD8, 0xFF])
}

fn image_dict(width: u32, height: u32, space: &str, filter: Option<&str>) -> Dictionary {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => Object::Name(space.as_bytes().to_vec()),
        "BitsPerComponent" => 8i64,
    };
    if let Some(filter) = filter {
        dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    }
    dict
}

fn sample_stream(
    width: u32,
    height: u32,
    space: &str,
    samples: Vec<u8>,
    compress: bool,
) -> Result<Stream, ImageDecodeError> {
    if compress {
        let data = deflate(&samples).map_err(|e| ImageDecodeError::Malformed(e.to_string()))?;
        Ok(Stream::new(
            image_dict(width, height, space, Some("FlateDecode")),
            data,
        ))
    } else {
        Ok(Stream::new(image_dict(width, height, space, None), samples))
    }
}

fn positive_int(
    doc: &LopdfDocument,
    dict: &Dictionary,
    key: &[u8],
) -> Result<u32, ImageDecodeError> {
    let value = dict
        .get(key)
        .ok()
        .and_then(|o| resolve(doc, o).as_i64().ok())
        .unwrap_or(0);
    if value <= 0 || value > u32::MAX as i64 {
        return Err(ImageDecodeError::Malformed(format!(
            "/{} is {}",
            String::from_utf8_lossy(key),
            value
        )));
    }
    Ok(value as u32)
}

fn filter_names(doc: &LopdfDocument, dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter").map(|o| resolve(doc, o)) {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| resolve(doc, o).as_name().ok())
            .map(<[u8]>::to_vec)
            .collect(),
        _ => Vec::new(),
    }
}

/// Undo the stream's filters. A lone unpredicted `FlateDecode` is inflated
/// here; other chains go through lopdf.
fn sample_bytes(
    doc: &LopdfDocument,
    stream: &Stream,
    filters: &[Vec<u8>],
) -> Result<Vec<u8>, ImageDecodeError> {
    let predicted = stream
        .dict
        .get(b"DecodeParms")
        .ok()
        .and_then(|o| resolve(doc, o).as_dict().ok())
        .and_then(|p| p.get(b"Predictor").ok())
        .and_then(|o| o.as_i64().ok())
        .is_some_and(|p| p > 1);

    if let [filter] = filters {
        if (filter == b"FlateDecode" || filter == b"Fl") && !predicted {
            let mut out = Vec::new();
            ZlibDecoder::new(stream.content.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| ImageDecodeError::Malformed(e.to_string()))?;
            return Ok(out);
        }
    }
    stream_bytes(stream).map_err(|e| ImageDecodeError::Malformed(e.to_string()))
}

fn samples_to_image(
    samples: &[u8],
    width: u32,
    height: u32,
    bits: i64,
    space: &ColorSpace,
) -> Result<DynamicImage, ImageDecodeError> {
    let (w, h) = (width as usize, height as usize);
    let components = space.component_count();

    if bits == 8 {
        let pixels = take_samples(samples, sample_len(&[w, h, components.max(1)])?)?;
        return match (space, components) {
            (ColorSpace::Indexed { .. }, _) => {
                let palette = palette(space)?;
                rgb_image(width, height, pixels.iter().flat_map(|&i| lookup(&palette, i)))
            }
            (
                ColorSpace::DeviceGray | ColorSpace::CalGray | ColorSpace::IccBased { .. },
                1,
            ) => GrayImage::from_raw(width, height, pixels.to_vec())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| short_buffer(samples.len())),
            (ColorSpace::DeviceRgb | ColorSpace::CalRgb | ColorSpace::IccBased { .. }, 3) => {
                RgbImage::from_raw(width, height, pixels.to_vec())
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| short_buffer(samples.len()))
            }
            (ColorSpace::DeviceCmyk | ColorSpace::IccBased { .. }, 4) => rgb_image(
                width,
                height,
                pixels.chunks_exact(4).flat_map(|p| {
                    let [c, m, y, k] = [p[0], p[1], p[2], p[3]].map(|v| v as f32 / 255.0);
                    cmyk_to_rgb(c, m, y, k)
                }),
            ),
            _ => Err(ImageDecodeError::Unsupported(format!(
                "8-bit {} samples",
                space.name()
            ))),
        };
    }

    if matches!(bits, 1 | 2 | 4) && components == 1 {
        let bits = bits as usize;
        let row_bytes = sample_len(&[w, bits])?.div_ceil(8);
        let data = take_samples(samples, sample_len(&[row_bytes, h])?)?;
        let values: Vec<u8> = data
            .chunks_exact(row_bytes)
            .flat_map(|row| (0..w).map(move |x| unpack(row, x, bits)))
            .collect();

        return match space {
            ColorSpace::Indexed { .. } => {
                let palette = palette(space)?;
                rgb_image(width, height, values.iter().flat_map(|&i| lookup(&palette, i)))
            }
            ColorSpace::DeviceGray | ColorSpace::CalGray | ColorSpace::IccBased { .. } => {
                let max = (1u16 << bits) - 1;
                let gray = values
                    .iter()
                    .map(|&v| (v as u16 * 255 / max) as u8)
                    .collect();
                GrayImage::from_raw(width, height, gray)
                    .map(DynamicImage::ImageLuma8)
                    .ok_or_else(|| short_buffer(samples.len()))
            }
            _ => Err(ImageDecodeError::Unsupported(format!(
                "{}-bit {} samples",
                bits,
                space.name()
            ))),
        };
    }

    Err(ImageDecodeError::Unsupported(format!(
        "{} bits per component in {}",
        bits,
        space.name()
    )))
}

/// Product of image dimensions, rejecting sizes that overflow.
fn sample_len(factors: &[usize]) -> Result<usize, ImageDecodeError> {
    factors
        .iter()
        .try_fold(1usize, |acc, &f| acc.checked_mul(f))
        .ok_or_else(|| ImageDecodeError::Malformed(format!("image size {:?} overflows", factors)))
}

fn take_samples(samples: &[u8], needed: usize) -> Result<&[u8], ImageDecodeError> {
    samples.get(..needed).ok_or_else(|| {
        ImageDecodeError::Malformed(format!(
            "expected {} sample bytes, found {}",
            needed,
            samples.len()
        ))
    })
}

fn short_buffer(len: usize) -> ImageDecodeError {
    ImageDecodeError::Malformed(format!("{} sample bytes do not fill the image", len))
}

fn unpack(row: &[u8], x: usize, bits: usize) -> u8 {
    let bit = x * bits;
    let byte = row[bit / 8];
    let shift = 8 - bits - (bit % 8);
    (byte >> shift) & ((1u8 << bits) - 1)
}

fn palette(space: &ColorSpace) -> Result<Vec<[u8; 3]>, ImageDecodeError> {
    let ColorSpace::Indexed { hival, .. } = space else {
        return Ok(Vec::new());
    };
    (0..=*hival)
        .map(|i| {
            space
                .to_rgb(&[i as f32])
                .map_err(|e| ImageDecodeError::Unsupported(e.to_string()))
        })
        .collect()
}

fn lookup(palette: &[[u8; 3]], index: u8) -> [u8; 3] {
    palette
        .get(index as usize)
        .or_else(|| palette.last())
        .copied()
        .unwrap_or([0, 0, 0])
}

fn rgb_image(
    width: u32,
    height: u32,
    pixels: impl Iterator<Item = u8>,
) -> Result<DynamicImage, ImageDecodeError> {
    let data: Vec<u8> = pixels.collect();
    let len = data.len();
    RgbImage::from_raw(width, height, data)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| short_buffer(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_stream(extra: Dictionary, data: Vec<u8>) -> Stream {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2i64,
            "Height" => 2i64,
            "BitsPerComponent" => 8i64,
        };
        for (key, value) in extra.iter() {
            dict.set(key.clone(), value.clone());
        }
        Stream::new(dict, data)
    }

    fn decode_png(raster: &RasterImage) -> DynamicImage {
        assert_eq!(raster.format, "png");
        image::load_from_memory_with_format(&raster.bytes, ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_rgb_samples_become_png() {
        let doc = LopdfDocument::with_version("1.5");
        let stream = image_stream(
            dictionary! { "ColorSpace" => "DeviceRGB" },
            vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 0],
        );
        let raster = decode_image_stream(&doc, &stream).unwrap();
        assert_eq!((raster.width, raster.height), (2, 2));
        let png = decode_png(&raster).to_rgb8();
        assert_eq!(png.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(png.get_pixel(1, 1).0, [255, 255, 0]);
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let doc = LopdfDocument::with_version("1.5");
        let stream = image_stream(
            dictionary! {
                "Width" => 2_147_483_648i64,
                "Height" => 2_147_483_648i64,
                "ColorSpace" => "DeviceCMYK",
            },
            vec![0; 16],
        );
        assert!(matches!(
            decode_image_stream(&doc, &stream),
            Err(ImageDecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_flate_cmyk_samples() {
        let doc = LopdfDocument::with_version("1.5");
        let samples = vec![0u8, 0, 0, 255, 0, 0, 0, 0, 255, 0, 0, 0, 0, 0, 0, 0];
        let stream = image_stream(
            dictionary! { "ColorSpace" => "DeviceCMYK", "Filter" => "FlateDecode" },
            deflate(&samples).unwrap(),
        );
        let png = decode_png(&decode_image_stream(&doc, &stream).unwrap()).to_rgb8();
        assert_eq!(png.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(png.get_pixel(1, 0).0, [255, 255, 255]);
        assert_eq!(png.get_pixel(0, 1).0, [0, 255, 255]);
    }

    #[test]
    fn test_one_bit_gray() {
        let doc = LopdfDocument::with_version("1.5");
        let stream = image_stream(
            dictionary! { "ColorSpace" => "DeviceGray", "BitsPerComponent" => 1i64 },
            vec![0b1000_0000, 0b0100_0000],
        );
        let png = decode_png(&decode_image_stream(&doc, &stream).unwrap()).to_luma8();
        assert_eq!(png.get_pixel(0, 0).0, [255]);
        assert_eq!(png.get_pixel(1, 0).0, [0]);
        assert_eq!(png.get_pixel(1, 1).0, [255]);
    }

    #[test]
    fn test_jpeg_passes_through() {
        let doc = LopdfDocument::with_version("1.5");
        let payload = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];
        let stream = image_stream(
            dictionary! { "ColorSpace" => "DeviceRGB", "Filter" => "DCTDecode" },
            payload.clone(),
        );
        let raster = decode_image_stream(&doc, &stream).unwrap();
        assert_eq!(raster.format, "jpg");
        assert_eq!(raster.bytes, payload);
    }

    #[test]
    fn test_decode_failures() {
        let doc = LopdfDocument::with_version("1.5");
        let short = image_stream(dictionary! { "ColorSpace" => "DeviceRGB" }, vec![1, 2, 3]);
        assert!(matches!(
            decode_image_stream(&doc, &short),
            Err(ImageDecodeError::Malformed(_))
        ));

        let fax = image_stream(dictionary! { "Filter" => "CCITTFaxDecode" }, vec![0]);
        assert!(matches!(
            decode_image_stream(&doc, &fax),
            Err(ImageDecodeError::Unsupported(_))
        ));

        let spot = image_stream(
            dictionary! {
                "ColorSpace" => vec![Object::Name(b"Separation".to_vec()), Object::Name(b"Gold".to_vec())],
            },
            vec![0; 4],
        );
        assert!(decode_image_stream(&doc, &spot).is_err());
    }

    #[test]
    fn test_prepare_png_with_alpha() {
        let mut rgba = image::RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, image::Rgba([10, 20, 30, 255]));
        rgba.put_pixel(1, 0, image::Rgba([40, 50, 60, 0]));
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let prepared = prepare_image("png", &png, false).unwrap();
        assert_eq!(prepared.image.content, vec![10, 20, 30, 40, 50, 60]);
        let mask = prepared.soft_mask.unwrap();
        assert_eq!(mask.content, vec![255, 0]);
    }

    #[test]
    fn test_prepare_rejects_garbage() {
        assert!(prepare_image("png", b"not an image", true).is_err());
    }
}
