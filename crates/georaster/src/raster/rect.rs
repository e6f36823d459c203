//! Integer pixel rectangles.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in pixel space, `x`/`y` being the upper-left pixel.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole `width` x `height` image.
    pub const fn of_size(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Exclusive right edge.
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Whether `other` lies completely inside this rectangle.
    pub fn contains_rect(&self, other: &PixelRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Intersection of two rectangles, `None` if they do not overlap.
    pub fn intersection(&self, other: &PixelRect) -> Option<PixelRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Splits the rectangle into row-major tiles of at most `tile_width` x `tile_height`.
    ///
    /// Tiles on the right and bottom border are clipped to the rectangle.
    pub fn tiles(&self, tile_width: usize, tile_height: usize) -> Vec<PixelRect> {
        debug_assert!(tile_width > 0 && tile_height > 0, "tile size must be > 0");
        if self.is_empty() || tile_width == 0 || tile_height == 0 {
            return Vec::new();
        }
        let cols = self.width.div_ceil(tile_width);
        let rows = self.height.div_ceil(tile_height);
        let mut out = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let x = self.x + col * tile_width;
                let y = self.y + row * tile_height;
                out.push(PixelRect::new(
                    x,
                    y,
                    tile_width.min(self.right() - x),
                    tile_height.min(self.bottom() - y),
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiles_cover_rect_with_clipped_borders() {
        let rect = PixelRect::of_size(10, 7);
        let tiles = rect.tiles(4, 4);
        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles[2], PixelRect::new(8, 0, 2, 4));
        assert_eq!(tiles[5], PixelRect::new(8, 4, 2, 3));
        let area: usize = tiles.iter().map(PixelRect::area).sum();
        assert_eq!(area, rect.area());
    }

    #[test]
    fn intersection_and_containment() {
        let a = PixelRect::new(0, 0, 10, 10);
        let b = PixelRect::new(5, 5, 10, 10);
        assert_eq!(a.intersection(&b), Some(PixelRect::new(5, 5, 5, 5)));
        assert!(a.intersection(&PixelRect::new(10, 0, 2, 2)).is_none());
        assert!(a.contains_rect(&PixelRect::new(2, 2, 8, 8)));
        assert!(!a.contains_rect(&b));
        assert!(a.contains(9, 9));
        assert!(!a.contains(10, 9));
    }

    #[test]
    fn empty_rect_yields_no_tiles() {
        assert!(PixelRect::of_size(0, 5).tiles(2, 2).is_empty());
    }
}
