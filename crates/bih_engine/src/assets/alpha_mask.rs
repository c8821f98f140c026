//! Cutout masks for alpha-tested surfaces
//!
//! One bit per texel, rows padded to whole bytes, built from the alpha
//! channel of a texture. Shadow rays sample it to pass through transparent
//! texels.

use std::path::Path;

use image::RgbaImage;

use crate::assets::AssetError;
use crate::foundation::math::Vec2;

/// Per-texel opacity bits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    bits: Vec<u8>,
}

impl AlphaMask {
    /// Bytes per mask row
    fn stride(width: u32) -> usize {
        (width as usize + 7) / 8
    }

    /// Build a mask by asking `opaque(x, y)` for every texel
    pub fn from_fn(width: u32, height: u32, mut opaque: impl FnMut(u32, u32) -> bool) -> Self {
        let stride = Self::stride(width);
        let mut bits = vec![0u8; stride * height as usize];
        for y in 0..height {
            for x in 0..width {
                if opaque(x, y) {
                    bits[y as usize * stride + x as usize / 8] |= 1 << (x % 8);
                }
            }
        }
        Self { width, height, bits }
    }

    /// Wrap prebuilt mask rows of `(width + 7) / 8` bytes each
    pub fn from_bits(width: u32, height: u32, bits: Vec<u8>) -> Result<Self, AssetError> {
        let expected = Self::stride(width) * height as usize;
        if bits.len() != expected {
            return Err(AssetError::InvalidData(format!(
                "alpha mask {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                bits.len()
            )));
        }
        Ok(Self { width, height, bits })
    }

    /// Texels whose alpha exceeds `cutoff` are opaque
    pub fn from_rgba(image: &RgbaImage, cutoff: u8) -> Self {
        let (width, height) = image.dimensions();
        Self::from_fn(width, height, |x, y| image.get_pixel(x, y)[3] > cutoff)
    }

    /// Load a texture and keep only its alpha test
    pub fn from_file<P: AsRef<Path>>(path: P, cutoff: u8) -> Result<Self, AssetError> {
        let path_ref = path.as_ref();

        log::debug!("Loading alpha mask from: {:?}", path_ref);

        let img = image::open(path_ref)
            .map_err(|e| AssetError::LoadFailed(format!("Failed to load image: {}", e)))?;
        let mask = Self::from_rgba(&img.to_rgba8(), cutoff);

        log::info!("Loaded {}x{} alpha mask from {:?}", mask.width, mask.height, path_ref);
        Ok(mask)
    }

    /// Mask width in texels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in texels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the texel under `uv` is opaque
    ///
    /// Coordinates are clamped to the texture rather than wrapped. An empty
    /// mask is transparent everywhere.
    pub fn is_opaque_at(&self, uv: Vec2) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let texel = |size: u32, t: f32| ((size as f32 * t) as i64).clamp(0, i64::from(size) - 1) as usize;
        let x = texel(self.width, uv.x);
        let y = texel(self.height, uv.y);
        self.bits[y * Self::stride(self.width) + x / 8] & (1 << (x % 8)) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bits_follow_row_layout() {
        let mask = AlphaMask::from_fn(10, 2, |x, y| x == 9 && y == 1);
        assert_eq!(mask.bits.len(), 4);
        assert_eq!(mask.bits, vec![0, 0, 0, 0b10]);
        assert!(mask.is_opaque_at(Vec2::new(0.95, 0.75)));
        assert!(!mask.is_opaque_at(Vec2::new(0.85, 0.75)));
    }

    #[test]
    fn test_coordinates_clamp_to_edges() {
        let mask = AlphaMask::from_fn(4, 4, |x, _| x == 0);
        assert!(mask.is_opaque_at(Vec2::new(-3.0, 0.5)));
        assert!(!mask.is_opaque_at(Vec2::new(7.0, 0.5)));
    }

    #[test]
    fn test_from_rgba_uses_alpha_cutoff() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgba([255, 255, 255, 0]));
        image.put_pixel(1, 0, image::Rgba([0, 0, 0, 200]));
        let mask = AlphaMask::from_rgba(&image, 0);
        assert!(!mask.is_opaque_at(Vec2::new(0.25, 0.5)));
        assert!(mask.is_opaque_at(Vec2::new(0.75, 0.5)));
        let strict = AlphaMask::from_rgba(&image, 220);
        assert!(!strict.is_opaque_at(Vec2::new(0.75, 0.5)));
    }

    #[test]
    fn test_from_bits_checks_length() {
        assert!(AlphaMask::from_bits(9, 2, vec![0; 4]).is_ok());
        assert!(matches!(AlphaMask::from_bits(9, 2, vec![0; 3]), Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(
            AlphaMask::from_file("does/not/exist.png", 0),
            Err(AssetError::LoadFailed(_))
        ));
    }
}
