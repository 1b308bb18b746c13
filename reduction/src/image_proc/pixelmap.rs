//! Binary pixel maps and their morphology.
//!
//! A [`PixelMap`] is a boolean mask with the same `(height, width)` layout as
//! an [`Image`]. Morphological operators clear the outermost row and column
//! since their neighbourhood is incomplete there.

use crate::image_proc::image::Image;
use ndarray::{Array2, ArrayView2, Zip};
use shared::image_size::ImageSize;

/// Boolean mask over an image grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelMap {
    mask: Array2<bool>,
}

impl PixelMap {
    /// All-false map.
    pub fn empty(size: ImageSize) -> Self {
        Self {
            mask: Array2::from_elem(size.shape(), false),
        }
    }

    pub fn from_array(mask: Array2<bool>) -> Self {
        Self { mask }
    }

    /// Pixels with `lo <= v <= hi`.
    pub fn threshold(image: &Image, lo: f64, hi: f64) -> Self {
        Self {
            mask: image.view().mapv(|v| v >= lo && v <= hi),
        }
    }

    /// Pixels with `v >= lo`.
    pub fn threshold_above(image: &Image, lo: f64) -> Self {
        Self {
            mask: image.view().mapv(|v| v >= lo),
        }
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::from_shape(self.mask.dim())
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.mask[[y, x]]
    }

    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        self.mask[[y, x]] = value;
    }

    pub fn view(&self) -> ArrayView2<'_, bool> {
        self.mask.view()
    }

    /// Number of set pixels.
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|&&b| b).count()
    }

    /// Pixel-wise AND. Maps must share a size.
    pub fn and(&self, other: &PixelMap) -> PixelMap {
        let mut mask = self.mask.clone();
        Zip::from(&mut mask)
            .and(&other.mask)
            .for_each(|a, &b| *a = *a && b);
        PixelMap { mask }
    }

    fn morpho_3x3(&self, keep: impl Fn(usize) -> bool + Sync) -> PixelMap {
        let (h, w) = self.mask.dim();
        let src = self.mask.view();
        let mut out = Array2::from_elem((h, w), false);
        if w < 3 || h < 3 {
            return PixelMap { mask: out };
        }
        Zip::indexed(&mut out).par_for_each(|(y, x), o| {
            if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                return;
            }
            let set = src
                .slice(ndarray::s![y - 1..=y + 1, x - 1..=x + 1])
                .iter()
                .filter(|&&b| b)
                .count();
            *o = keep(set);
        });
        PixelMap { mask: out }
    }

    /// 3×3 erosion: a pixel survives only if all nine neighbours are set.
    pub fn erode_3x3(&self) -> PixelMap {
        self.morpho_3x3(|n| n == 9)
    }

    /// 3×3 dilation: a pixel is set if any of its nine neighbours is set.
    pub fn dilate_3x3(&self) -> PixelMap {
        self.morpho_3x3(|n| n > 0)
    }

    /// Erosion followed by dilation. Removes isolated pixels and thin
    /// structures before labelling.
    pub fn opening(&self) -> PixelMap {
        self.erode_3x3().dilate_3x3()
    }

    fn morpho_vertical(&self, half: usize, erode: bool) -> PixelMap {
        let (h, w) = self.mask.dim();
        let src = self.mask.view();
        let mut out = Array2::from_elem((h, w), false);
        Zip::indexed(&mut out).par_for_each(|(y, x), o| {
            let y0 = y.saturating_sub(half);
            let y1 = (y + half).min(h - 1);
            let mut column = (y0..=y1).map(|yy| src[[yy, x]]);
            *o = if erode {
                column.all(|b| b)
            } else {
                column.any(|b| b)
            };
        });
        PixelMap { mask: out }
    }

    /// Erosion with a vertical `1 × length` structuring element.
    ///
    /// Neighbours beyond the top and bottom rows are ignored.
    pub fn erode_vertical(&self, length: usize) -> PixelMap {
        self.morpho_vertical(length / 2, true)
    }

    /// Dilation with a vertical `1 × length` structuring element.
    pub fn dilate_vertical(&self, length: usize) -> PixelMap {
        self.morpho_vertical(length / 2, false)
    }

    /// Rows containing at least one set pixel, as `(first, last)`.
    pub fn row_span(&self) -> Option<(usize, usize)> {
        let rows: Vec<usize> = self
            .mask
            .outer_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|&b| b))
            .map(|(y, _)| y)
            .collect();
        Some((*rows.first()?, *rows.last()?))
    }
}
