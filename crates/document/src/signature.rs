//! Signature image decoding
//!
//! The form's canvas posts the signature as `data:image/png;base64,...`.
//! Transparent pixels are composited onto white since the PDF image is
//! written as plain DeviceRGB.

use crate::errors::SignatureError;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Decoded signature as 8-bit RGB pixels
#[derive(Debug, Clone)]
pub struct SignatureImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl SignatureImage {
    /// Size that fits into `max_w` x `max_h` keeping the aspect ratio
    pub fn fit_within(&self, max_w: f32, max_h: f32) -> (f32, f32) {
        let (w, h) = (self.width as f32, self.height as f32);
        let scale = (max_w / w).min(max_h / h);
        (w * scale, h * scale)
    }
}

/// Payload of a data URI, or the input itself when there is no `data:` prefix
fn base64_payload(uri: &str) -> Result<&str, SignatureError> {
    let uri = uri.trim();
    match uri.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or(SignatureError::NotBase64)?;
            if !header.ends_with(";base64") {
                return Err(SignatureError::NotBase64);
            }
            Ok(payload)
        }
        None => Ok(uri),
    }
}

pub fn decode_data_uri(uri: &str) -> Result<SignatureImage, SignatureError> {
    let payload: String = base64_payload(uri)?
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(payload)?;

    let decoded = image::load_from_memory(&bytes)?.to_rgba8();
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(SignatureError::Empty);
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for pixel in decoded.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u16;
        for channel in [r, g, b] {
            let blended = (channel as u16 * alpha + 255 * (255 - alpha)) / 255;
            rgb.push(blended as u8);
        }
    }

    Ok(SignatureImage { width, height, rgb })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    /// 4x2 PNG: left half opaque black, right half fully transparent
    pub(crate) fn sample_data_uri() -> String {
        let mut img = RgbaImage::new(4, 2);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            *pixel = if x < 2 { Rgba([0, 0, 0, 255]) } else { Rgba([0, 0, 0, 0]) };
        }
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(png))
    }

    #[test]
    fn test_decode_png_data_uri() {
        let sig = decode_data_uri(&sample_data_uri()).unwrap();
        assert_eq!((sig.width, sig.height), (4, 2));
        assert_eq!(sig.rgb.len(), 4 * 2 * 3);
        // opaque black stays black, transparent becomes white
        assert_eq!(&sig.rgb[0..3], &[0, 0, 0]);
        assert_eq!(&sig.rgb[9..12], &[255, 255, 255]);
    }

    #[test]
    fn test_non_base64_uri_rejected() {
        assert!(matches!(
            decode_data_uri("data:image/png,rawbytes"),
            Err(SignatureError::NotBase64)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decode_data_uri("data:image/png;base64,!!!").is_err());
        assert!(decode_data_uri("data:image/png;base64,aGVsbG8=").is_err());
    }

    #[test]
    fn test_fit_within_keeps_ratio() {
        let sig = SignatureImage { width: 400, height: 100, rgb: Vec::new() };
        let (w, h) = sig.fit_within(200.0, 80.0);
        assert_eq!((w, h), (200.0, 50.0));
    }
}
