//! # Image Rasters
//!
//! Decoding uploaded image files into tensors and encoding explanation
//! image tensors back to PNG. Grayscale files decode to (H, W); color files
//! to (H, W, 3), with pixel values on the 0-255 scale.

use ndarray::{ArrayD, IxDyn};

use crate::tensor::Tensor;

use super::{RenderError, RenderResult};

/// Decode an uploaded image file into a tensor
pub fn decode_image(bytes: &[u8]) -> RenderResult<Tensor> {
    let img = image::load_from_memory(bytes).map_err(|e| RenderError::Decode(e.to_string()))?;
    match img {
        image::DynamicImage::ImageLuma8(gray) => {
            let (w, h) = gray.dimensions();
            let mut out = ArrayD::zeros(IxDyn(&[h as usize, w as usize]));
            for (x, y, pixel) in gray.enumerate_pixels() {
                out[[y as usize, x as usize]] = pixel.0[0] as f64;
            }
            Ok(out)
        }
        other => {
            let rgb = other.to_rgb8();
            let (w, h) = rgb.dimensions();
            let mut out = ArrayD::zeros(IxDyn(&[h as usize, w as usize, 3]));
            for (x, y, pixel) in rgb.enumerate_pixels() {
                for c in 0..3 {
                    out[[y as usize, x as usize, c]] = pixel.0[c] as f64;
                }
            }
            Ok(out)
        }
    }
}

/// Encode an explanation image tensor (H x W x C) as PNG. Values on the
/// unit scale are stretched to 0-255; everything is clamped into range.
pub fn raster_image(img: &Tensor) -> RenderResult<Vec<u8>> {
    if img.ndim() != 3 {
        return Err(RenderError::Encode(format!(
            "expected an H x W x C image tensor, got rank {}",
            img.ndim()
        )));
    }
    let (h, w, c) = (img.shape()[0], img.shape()[1], img.shape()[2]);
    if h == 0 || w == 0 || c == 0 {
        return Err(RenderError::Encode("image tensor is empty".to_string()));
    }

    let max = img.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let scale = if max <= 1.0 { 255.0 } else { 1.0 };

    let mut rgb = vec![0u8; h * w * 3];
    for y in 0..h {
        for x in 0..w {
            for out_c in 0..3 {
                let src_c = if c >= 3 { out_c } else { 0 };
                let v = (img[[y, x, src_c]] * scale).clamp(0.0, 255.0);
                rgb[(y * w + x) * 3 + out_c] = v.round() as u8;
            }
        }
    }

    use image::ImageEncoder;
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(&rgb, w as u32, h as u32, image::ExtendedColorType::Rgb8)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(out)
}
