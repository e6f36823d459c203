//! Dense single-band raster storage.
use crate::error::{Error, Result};
use crate::raster::PixelRect;

/// A row-major grid of `f32` samples for one resolution level.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterImage {
    width: usize,
    height: usize,
    pub data: Vec<f32>,
}

impl RasterImage {
    /// Create a new image of the given size, initializing all values to zero.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    /// Create a new image of the given size with every sample set to `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wrap existing row-major samples; the length must equal `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::InvalidConfig(format!(
                "expected {} samples for a {}x{} image, got {}",
                width * height,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Get the size of the image as `(width, height)`.
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect::of_size(self.width, self.height)
    }

    /// Get the value at `(x, y)`, `None` if out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    /// Get the value at signed indices, replicating the border for positions outside the image.
    #[inline]
    pub fn get_clamped(&self, ix: isize, iy: isize) -> f32 {
        if self.data.is_empty() {
            return f32::NAN;
        }
        let x = ix.clamp(0, self.width as isize - 1) as usize;
        let y = iy.clamp(0, self.height as isize - 1) as usize;
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        debug_assert!(x < self.width && y < self.height, "pixel out of bounds");
        self.data[y * self.width + x] = value;
    }

    /// Copy `samples` (row-major, `rect.width * rect.height`) into `rect`.
    pub fn write_region(&mut self, rect: PixelRect, samples: &[f32]) -> Result<()> {
        if !self.bounds().contains_rect(&rect) {
            return Err(Error::OutOfBounds {
                what: "write region",
                value: rect.right().max(rect.bottom()) as f64,
                limit: self.width.max(self.height) as f64,
            });
        }
        if samples.len() != rect.area() {
            return Err(Error::InvalidConfig(format!(
                "expected {} samples for region {:?}, got {}",
                rect.area(),
                rect,
                samples.len()
            )));
        }
        for row in 0..rect.height {
            let dst = (rect.y + row) * self.width + rect.x;
            let src = row * rect.width;
            self.data[dst..dst + rect.width].copy_from_slice(&samples[src..src + rect.width]);
        }
        Ok(())
    }

    /// Copy the samples of `rect` out in row-major order.
    pub fn read_region(&self, rect: PixelRect) -> Result<Vec<f32>> {
        if !self.bounds().contains_rect(&rect) {
            return Err(Error::OutOfBounds {
                what: "read region",
                value: rect.right().max(rect.bottom()) as f64,
                limit: self.width.max(self.height) as f64,
            });
        }
        let mut out = Vec::with_capacity(rect.area());
        for row in rect.y..rect.bottom() {
            let start = row * self.width + rect.x;
            out.extend_from_slice(&self.data[start..start + rect.width]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_initializes_with_zeroes() {
        let image = RasterImage::new(4, 3);
        assert_eq!(image.size(), (4, 3));
        assert!(image.data.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(RasterImage::from_vec(2, 2, vec![0.0; 3]).is_err());
        assert!(RasterImage::from_vec(2, 2, vec![0.0; 4]).is_ok());
    }

    #[test]
    fn get_clamped_replicates_edges() {
        let image = RasterImage::from_fn(3, 2, |x, y| (y * 3 + x) as f32);
        assert_eq!(image.get_clamped(-5, 0), 0.0);
        assert_eq!(image.get_clamped(7, 0), 2.0);
        assert_eq!(image.get_clamped(1, 9), 4.0);
        assert_eq!(image.get(3, 0), None);
    }

    #[test]
    fn region_write_and_read() {
        let mut image = RasterImage::new(4, 4);
        let rect = PixelRect::new(1, 1, 2, 2);
        image.write_region(rect, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(image.get(2, 2), Some(4.0));
        assert_eq!(image.read_region(rect).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(image
            .write_region(PixelRect::new(3, 3, 2, 2), &[0.0; 4])
            .is_err());
    }
}
