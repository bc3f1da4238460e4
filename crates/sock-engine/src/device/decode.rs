use std::fmt;

/// Decoded image in tightly packed RGBA8 rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Wraps raw RGBA8 pixels, checking the length matches the dimensions.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DecodeError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(DecodeError::new(format!(
                "expected {expected} bytes for {width}x{height} RGBA8, got {}",
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for DecodeError {}

/// Turns encoded image bytes into RGBA8 pixels.
pub trait ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError>;
}

/// [`ImageDecoder`] backed by the `image` crate (PNG, JPEG, BMP, GIF).
#[derive(Debug, Default, Copy, Clone)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        let img = ::image::load_from_memory(bytes).map_err(|e| DecodeError::new(e.to_string()))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(DecodedImage { width, height, pixels: rgba.into_raw() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_length_is_checked() {
        assert!(DecodedImage::from_rgba8(2, 2, vec![0; 16]).is_ok());
        let err = DecodedImage::from_rgba8(2, 2, vec![0; 15]).unwrap_err();
        assert!(err.reason.contains("expected 16 bytes"));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = ImageCrateDecoder.decode(b"definitely not an image").unwrap_err();
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn decodes_png() {
        let mut img = ::image::RgbaImage::new(3, 2);
        img.put_pixel(1, 0, ::image::Rgba([10, 20, 30, 40]));

        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ::image::ImageFormat::Png)
            .unwrap();

        let decoded = ImageCrateDecoder.decode(&bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(&decoded.pixels[4..8], &[10, 20, 30, 40]);
    }
}
