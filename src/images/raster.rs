//! Decoded bitmaps, still or animated

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, ImageFormat, RgbaImage};

use super::ImageLoadError;

/// Largest edge, in pixels, a resize may produce
pub const MAX_RESIZE_DIMENSION: u32 = 4096;

/// One frame of a bitmap
#[derive(Debug, Clone, PartialEq)]
pub struct RasterFrame {
    pub buffer: RgbaImage,
    pub delay_ms: u32,
}

/// A decoded image; animated images carry more than one frame
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    frames: Vec<RasterFrame>,
}

impl RasterImage {
    pub fn from_frames(frames: Vec<RasterFrame>) -> Result<Self, ImageLoadError> {
        if frames.is_empty() {
            return Err(ImageLoadError::Decode("image has no frames".to_string()));
        }
        Ok(Self { frames })
    }

    pub fn from_rgba(buffer: RgbaImage) -> Self {
        Self {
            frames: vec![RasterFrame {
                buffer,
                delay_ms: 0,
            }],
        }
    }

    /// Transparent still image of the given pixel size
    pub fn blank(width: u32, height: u32) -> Self {
        Self::from_rgba(RgbaImage::new(width, height))
    }

    /// Decode PNG, JPEG or GIF bytes; GIFs keep every frame
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageLoadError> {
        let format = image::guess_format(bytes).map_err(|e| ImageLoadError::Decode(e.to_string()))?;
        if format == ImageFormat::Gif {
            let decoder =
                GifDecoder::new(Cursor::new(bytes)).map_err(|e| ImageLoadError::Decode(e.to_string()))?;
            let frames = decoder
                .into_frames()
                .collect_frames()
                .map_err(|e| ImageLoadError::Decode(e.to_string()))?
                .into_iter()
                .map(|frame| {
                    let (numer, denom) = frame.delay().numer_denom_ms();
                    RasterFrame {
                        delay_ms: if denom == 0 { 0 } else { numer / denom },
                        buffer: frame.into_buffer(),
                    }
                })
                .collect();
            return Self::from_frames(frames);
        }

        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| ImageLoadError::Decode(e.to_string()))?;
        Ok(Self::from_rgba(decoded.to_rgba8()))
    }

    pub fn frames(&self) -> &[RasterFrame] {
        &self.frames
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// Pixel size of the first frame
    pub fn size(&self) -> (u32, u32) {
        self.frames
            .first()
            .map(|f| f.buffer.dimensions())
            .unwrap_or((0, 0))
    }

    pub fn width(&self) -> u32 {
        self.size().0
    }

    pub fn height(&self) -> u32 {
        self.size().1
    }

    /// Scale to `new_width`, keeping the aspect ratio, anchored at the top.
    ///
    /// A target edge above [`MAX_RESIZE_DIMENSION`] leaves the image as is.
    /// Every frame of an animated image is scaled the same way and keeps its
    /// delay.
    pub fn resize_top_aligned_to_fill(&self, new_width: u32) -> RasterImage {
        let (width, height) = self.size();
        if width == 0 || height == 0 || new_width == 0 || new_width == width {
            return self.clone();
        }
        let new_height = (f64::from(height) * f64::from(new_width) / f64::from(width)).round().max(1.0);
        if new_width > MAX_RESIZE_DIMENSION || new_height > f64::from(MAX_RESIZE_DIMENSION) {
            return self.clone();
        }
        let new_height = new_height as u32;
        let frames = self
            .frames
            .iter()
            .map(|frame| RasterFrame {
                buffer: image::imageops::resize(&frame.buffer, new_width, new_height, FilterType::Triangle),
                delay_ms: frame.delay_ms,
            })
            .collect();
        RasterImage { frames }
    }

    /// First frame encoded as PNG
    pub fn to_png(&self) -> Result<Vec<u8>, ImageLoadError> {
        let frame = self
            .frames
            .first()
            .ok_or_else(|| ImageLoadError::Decode("image has no frames".to_string()))?;
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(frame.buffer.clone())
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(|e| ImageLoadError::Decode(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_roundtrip_keeps_size() {
        let image = RasterImage::blank(4, 2);
        let png = image.to_png().unwrap();
        let decoded = RasterImage::decode(&png).unwrap();
        assert_eq!(decoded.size(), (4, 2));
        assert!(!decoded.is_animated());
    }

    #[test]
    fn test_resize_top_aligned_keeps_aspect() {
        let resized = RasterImage::blank(200, 100).resize_top_aligned_to_fill(50);
        assert_eq!(resized.size(), (50, 25));
    }

    #[test]
    fn test_resize_beyond_limit_keeps_original() {
        let image = RasterImage::blank(10, 10);
        assert_eq!(image.resize_top_aligned_to_fill(u32::MAX).size(), (10, 10));

        let tall = RasterImage::blank(1, 100);
        assert_eq!(tall.resize_top_aligned_to_fill(100).size(), (1, 100));
    }

    #[test]
    fn test_resize_every_frame() {
        let frame = |delay| RasterFrame {
            buffer: RgbaImage::new(40, 80),
            delay_ms: delay,
        };
        let animated = RasterImage::from_frames(vec![frame(50), frame(70)]).unwrap();
        let resized = animated.resize_top_aligned_to_fill(20);
        assert!(resized.is_animated());
        for (frame, delay) in resized.frames().iter().zip([50, 70]) {
            assert_eq!(frame.buffer.dimensions(), (20, 40));
            assert_eq!(frame.delay_ms, delay);
        }
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(
            RasterImage::decode(b"not an image"),
            Err(ImageLoadError::Decode(_))
        ));
        assert!(RasterImage::from_frames(Vec::new()).is_err());
    }
}
