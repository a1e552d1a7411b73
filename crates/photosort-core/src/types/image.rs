//! Decoded image pixels.

/// A decoded image in RGB8 layout, ready for the embedder.
///
/// Decoding happens on the producer side; the inference worker receives
/// these as immutable inputs over the channel boundary.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGB8 pixel data, `width * height * 3` bytes.
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Create a decoded image. Truncates or zero-pads the pixel buffer to
    /// the expected `width * height * 3` length.
    pub fn new(width: u32, height: u32, mut pixels: Vec<u8>) -> Self {
        let expected = (width as usize) * (height as usize) * 3;
        pixels.resize(expected, 0);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_pixel_buffers() {
        let img = DecodedImage::new(2, 2, vec![255; 3]);
        assert_eq!(img.pixels.len(), 12);
        assert_eq!(img.pixel_count(), 4);
    }
}
