//! Float pixel buffers, resampling and the intermediate-surface pool.

mod pool;
mod sampler;

use std::path::Path;

use anyhow::Context as _;

pub use pool::{SurfacePool, SurfacePoolOpts, SurfacePoolStats};
pub use sampler::{Interpolation, Sampler};

use crate::color::Color;
use crate::foundation::core::{RectInt, VectorInt};
use crate::foundation::error::{StrataError, StrataResult};

/// Row-major buffer of straight-alpha colors.
///
/// Pixel `(x, y)` is centered at `(x + 0.5, y + 0.5)` in surface coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<Color>,
}

impl Surface {
    /// Transparent surface of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize).saturating_mul(height as usize);
        Self {
            width,
            height,
            data: vec![Color::alpha(); len],
        }
    }

    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let mut s = Self::new(width, height);
        s.fill(color);
        s
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Color) -> Self {
        let mut s = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                s.data[(y as usize) * (width as usize) + x as usize] = f(x, y);
            }
        }
        s
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> VectorInt {
        VectorInt::new(
            i32::try_from(self.width).unwrap_or(i32::MAX),
            i32::try_from(self.height).unwrap_or(i32::MAX),
        )
    }

    pub fn rect(&self) -> RectInt {
        RectInt::from_size(self.size())
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[Color] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Color] {
        &mut self.data
    }

    pub fn row(&self, y: u32) -> &[Color] {
        let w = self.width as usize;
        let start = (y as usize) * w;
        &self.data[start..start + w]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [Color] {
        let w = self.width as usize;
        let start = (y as usize) * w;
        &mut self.data[start..start + w]
    }

    /// Pixel at `(x, y)`; transparent outside the surface.
    pub fn get(&self, x: i32, y: i32) -> Color {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return Color::alpha();
        }
        self.data[(y as usize) * (self.width as usize) + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, c: Color) {
        if x < self.width && y < self.height {
            self.data[(y as usize) * (self.width as usize) + x as usize] = c;
        }
    }

    pub fn fill(&mut self, c: Color) {
        self.data.fill(c);
    }

    pub fn clear(&mut self) {
        self.fill(Color::alpha());
    }

    /// Copies `src` into this surface with its top-left corner at `offset`, clipped.
    pub fn blit(&mut self, src: &Surface, offset: VectorInt) {
        let dst_rect = self.rect();
        let area = src.rect().offset(offset).intersect(&dst_rect);
        if !area.is_valid() {
            return;
        }
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let c = src.get(x - offset.x, y - offset.y);
                self.set(x as u32, y as u32, c);
            }
        }
    }

    /// Resampling view of this surface.
    pub fn sampler(&self, interpolation: Interpolation) -> Sampler<'_> {
        Sampler::new(self, interpolation)
    }

    /// Premultiplied RGBA8 bytes, row-major.
    pub fn to_rgba8_premul(&self) -> Vec<u8> {
        self.data.iter().flat_map(|c| c.to_rgba8_premul()).collect()
    }

    /// Straight RGBA8 image.
    pub fn to_image(&self) -> StrataResult<image::RgbaImage> {
        let bytes: Vec<u8> = self.data.iter().flat_map(|c| c.to_rgba8()).collect();
        image::RgbaImage::from_raw(self.width, self.height, bytes)
            .ok_or_else(|| StrataError::render("surface buffer does not match its size"))
    }

    pub fn from_image(img: &image::RgbaImage) -> Self {
        let (w, h) = img.dimensions();
        Self::from_fn(w, h, |x, y| Color::from_rgba8(img.get_pixel(x, y).0))
    }

    /// Decodes any format the `image` crate understands.
    pub fn decode(bytes: &[u8]) -> StrataResult<Self> {
        let img = image::load_from_memory(bytes).context("decode image from memory")?;
        Ok(Self::from_image(&img.to_rgba8()))
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> StrataResult<()> {
        let path = path.as_ref();
        let img = self.to_image()?;
        img.save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_outside_is_transparent() {
        let s = Surface::filled(2, 2, Color::red());
        assert_eq!(s.get(1, 1), Color::red());
        assert_eq!(s.get(-1, 0), Color::alpha());
        assert_eq!(s.get(2, 0), Color::alpha());
    }

    #[test]
    fn blit_clips_to_destination() {
        let mut dst = Surface::new(3, 3);
        let src = Surface::filled(2, 2, Color::blue());
        dst.blit(&src, VectorInt::new(2, -1));
        assert_eq!(dst.get(2, 0), Color::blue());
        assert_eq!(dst.get(2, 1), Color::alpha());
        assert_eq!(dst.get(1, 0), Color::alpha());
    }

    #[test]
    fn png_roundtrip_through_memory() {
        let s = Surface::from_fn(2, 1, |x, _| if x == 0 { Color::red() } else { Color::alpha() });
        let img = s.to_image().unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let back = Surface::decode(&buf).unwrap();
        assert_eq!(back.width(), 2);
        assert_eq!(back.get(0, 0), Color::red());
        assert_eq!(back.get(1, 0).a, 0.0);
    }

    #[test]
    fn rgba8_premul_layout() {
        let s = Surface::filled(1, 1, Color::new(1.0, 0.0, 0.0, 0.5));
        assert_eq!(s.to_rgba8_premul(), vec![128, 0, 0, 128]);
    }

    #[test]
    fn decode_garbage_is_error() {
        assert!(Surface::decode(b"not an image").is_err());
    }
}
