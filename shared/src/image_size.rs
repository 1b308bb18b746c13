//! Frame dimensions shared by images, cubes and masks

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height of a detector frame.
///
/// Arrays built from an `ImageSize` use the row-major `(height, width)` shape,
/// so pixel `(x, y)` lives at `array[[y, x]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Frame width in pixels
    pub width: usize,
    /// Frame height in pixels
    pub height: usize,
}

impl ImageSize {
    /// Create a new ImageSize
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Zero-filled array with shape (height, width)
    pub fn zeros(&self) -> Array2<f64> {
        Array2::zeros((self.height, self.width))
    }

    /// Shape tuple in ndarray order (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Geometric center `(width/2, height/2)` in pixel coordinates.
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Whether integer pixel `(x, y)` lies inside the frame.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Convert to tuple (width, height)
    pub fn to_tuple(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Create from tuple (width, height)
    pub fn from_tuple(dimensions: (usize, usize)) -> Self {
        Self {
            width: dimensions.0,
            height: dimensions.1,
        }
    }

    /// Size of an ndarray shape `(rows, cols)`.
    pub fn from_shape(shape: (usize, usize)) -> Self {
        Self {
            width: shape.1,
            height: shape.0,
        }
    }
}

impl From<(usize, usize)> for ImageSize {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::from_tuple(dimensions)
    }
}

impl From<ImageSize> for (usize, usize) {
    fn from(size: ImageSize) -> Self {
        size.to_tuple()
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_is_row_major() {
        let size = ImageSize::from_width_height(64, 32);
        assert_eq!(size.shape(), (32, 64));
        assert_eq!(size.zeros().dim(), (32, 64));
        assert_eq!(ImageSize::from_shape((32, 64)), size);
    }

    #[test]
    fn test_contains_and_center() {
        let size = ImageSize::from_width_height(10, 6);
        assert!(size.contains(0, 0));
        assert!(size.contains(9, 5));
        assert!(!size.contains(10, 5));
        assert!(!size.contains(-1, 2));
        assert_eq!(size.center(), (5.0, 3.0));
    }

    #[test]
    fn test_display_and_serde() {
        let size = ImageSize::from_width_height(1024, 768);
        assert_eq!(size.to_string(), "1024x768");
        let json = serde_json::to_string(&size).unwrap();
        let back: ImageSize = serde_json::from_str(&json).unwrap();
        assert_eq!(back, size);
    }
}
