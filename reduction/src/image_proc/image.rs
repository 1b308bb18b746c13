//! Owned 2D pixel buffer.
//!
//! An [`Image`] wraps an `Array2<f64>` of shape `(height, width)`. Pixel
//! coordinates are `(x, y)` with `x` along a row, so `get(x, y)` reads
//! `data[[y, x]]`. Coordinates are 0-based.

use crate::algo::stats;
use crate::error::{ReductionError, Result};
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2};
use shared::image_size::ImageSize;

/// Single detector frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data: Array2<f64>,
}

impl Image {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: Array2::zeros((height, width)),
        }
    }

    /// Zero-filled image of the given size.
    pub fn zeros(size: ImageSize) -> Self {
        Self { data: size.zeros() }
    }

    /// Wrap an array of shape `(height, width)`.
    pub fn from_array(data: Array2<f64>) -> Self {
        Self { data }
    }

    /// Build from a function of `(x, y)`.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        Self {
            data: Array2::from_shape_fn((height, width), |(y, x)| f(x, y)),
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::from_shape(self.data.dim())
    }

    /// Pixel value at `(x, y)`.
    ///
    /// # Panics
    /// Panics when the position is outside the image.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[[y, x]]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        self.data[[y, x]] = value;
    }

    /// Pixel value, or `None` outside the image.
    pub fn get_checked(&self, x: i64, y: i64) -> Option<f64> {
        if self.size().contains(x, y) {
            Some(self.data[[y as usize, x as usize]])
        } else {
            None
        }
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.data.view_mut()
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }

    /// Pixels in row-major order.
    pub fn pixels(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Row `y` as a vector.
    pub fn row(&self, y: usize) -> Vec<f64> {
        self.data.row(y).to_vec()
    }

    /// Column `x` as a vector.
    pub fn column(&self, x: usize) -> Vec<f64> {
        self.data.column(x).to_vec()
    }

    pub fn median(&self) -> f64 {
        stats::median_in_place(&mut self.pixels())
    }

    pub fn mean(&self) -> f64 {
        self.data.mean().unwrap_or(f64::NAN)
    }

    /// Smallest and largest pixel values.
    pub fn min_max(&self) -> (f64, f64) {
        self.data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Copy of the inclusive rectangle `[x0, x1] × [y0, y1]`, clipped to the
    /// image.
    pub fn extract(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> Result<Image> {
        let x1 = x1.min(self.width().saturating_sub(1));
        let y1 = y1.min(self.height().saturating_sub(1));
        if self.data.is_empty() || x0 > x1 || y0 > y1 {
            return Err(ReductionError::invalid(format!(
                "empty extraction window [{x0},{x1}]x[{y0},{y1}] in {} image",
                self.size()
            )));
        }
        Ok(Image::from_array(
            self.data.slice(s![y0..=y1, x0..=x1]).to_owned(),
        ))
    }

    /// Copy `other` into this image with its lower corner at `(x0, y0)`.
    /// Parts falling outside are dropped.
    pub fn paste(&mut self, other: &Image, x0: usize, y0: usize) {
        if x0 >= self.width() || y0 >= self.height() {
            return;
        }
        let w = other.width().min(self.width() - x0);
        let h = other.height().min(self.height() - y0);
        self.data
            .slice_mut(s![y0..y0 + h, x0..x0 + w])
            .assign(&other.data.slice(s![0..h, 0..w]));
    }

    pub fn sub_scalar(&mut self, value: f64) {
        self.data.mapv_inplace(|v| v - value);
    }

    /// Pixel-wise `self - other`, in place.
    pub fn sub_image(&mut self, other: &Image) -> Result<()> {
        if self.size() != other.size() {
            return Err(ReductionError::ShapeMismatch {
                expected: self.size().to_string(),
                actual: other.size().to_string(),
            });
        }
        self.data -= &other.data;
        Ok(())
    }

    /// Raise every pixel below `floor` to `floor`.
    pub fn threshold_low(&mut self, floor: f64) {
        self.data.mapv_inplace(|v| v.max(floor));
    }
}

impl From<Array2<f64>> for Image {
    fn from(data: Array2<f64>) -> Self {
        Self::from_array(data)
    }
}
