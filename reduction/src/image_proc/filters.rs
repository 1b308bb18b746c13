//! Per-plane spatial filters.
//!
//! Linear 3×3 and 5×5 convolutions, a 3×1 row filter, morphological filters
//! over the sorted 3×3 neighbourhood, median filters, a flat (boxcar) filter
//! and a local standard-deviation filter.
//!
//! # Borders
//!
//! Fixed-size kernels leave a zero border as wide as their half-size. The
//! large median and flat filters clip their window at the image edge instead.
//!
//! # Named filters
//!
//! [`ImageFilter`] maps the usual names (`mean3`, `dx`, `contour2`, `max-min`,
//! `median`, ...) to their kernels and is what [`apply_filter`] dispatches on.
//!
//! All pixel loops run in parallel with `ndarray::Zip::par_for_each`.

use crate::algo::stats;
use crate::error::{ReductionError, Result};
use crate::image_proc::image::Image;
use ndarray::{Array2, Zip};
use std::fmt;
use std::str::FromStr;

const MEAN3: [f64; 9] = [1.0; 9];
const DX: [f64; 9] = [-1.0, 0.0, 1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0];
const DY: [f64; 9] = [-1.0, -1.0, -1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
const DX2: [f64; 9] = [1.0, -2.0, 1.0, 1.0, -2.0, 1.0, 1.0, -2.0, 1.0];
const DY2: [f64; 9] = [1.0, 1.0, 1.0, -2.0, -2.0, -2.0, 1.0, 1.0, 1.0];
const CONTOUR1: [f64; 9] = [1.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0];
const CONTOUR2: [f64; 9] = [-1.0, 0.0, 1.0, 2.0, 0.0, -2.0, -1.0, 0.0, 1.0];
const CONTOUR3: [f64; 9] = [-1.0, 2.0, -1.0, 0.0, 0.0, 0.0, 1.0, -2.0, 1.0];
const CONTRAST1: [f64; 9] = [1.0, 1.0, 1.0, 1.0, 4.0, 1.0, 1.0, 1.0, 1.0];
const MEAN5: [f64; 25] = [1.0; 25];
const MORPHO_MIN: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
const MORPHO_MAX: [f64; 9] = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0];
const MORPHO_MAX_MIN: [f64; 9] = [-1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0];

/// Named spatial filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFilter {
    Mean3,
    Dx,
    Dy,
    Dx2,
    Dy2,
    Contour1,
    Contour2,
    Contour3,
    Contrast1,
    Mean5,
    Min,
    Max,
    MaxMin,
    Median,
}

impl ImageFilter {
    pub const ALL: [ImageFilter; 14] = [
        ImageFilter::Mean3,
        ImageFilter::Dx,
        ImageFilter::Dy,
        ImageFilter::Dx2,
        ImageFilter::Dy2,
        ImageFilter::Contour1,
        ImageFilter::Contour2,
        ImageFilter::Contour3,
        ImageFilter::Contrast1,
        ImageFilter::Mean5,
        ImageFilter::Min,
        ImageFilter::Max,
        ImageFilter::MaxMin,
        ImageFilter::Median,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ImageFilter::Mean3 => "mean3",
            ImageFilter::Dx => "dx",
            ImageFilter::Dy => "dy",
            ImageFilter::Dx2 => "dx2",
            ImageFilter::Dy2 => "dy2",
            ImageFilter::Contour1 => "contour1",
            ImageFilter::Contour2 => "contour2",
            ImageFilter::Contour3 => "contour3",
            ImageFilter::Contrast1 => "contrast1",
            ImageFilter::Mean5 => "mean5",
            ImageFilter::Min => "min",
            ImageFilter::Max => "max",
            ImageFilter::MaxMin => "max-min",
            ImageFilter::Median => "median",
        }
    }
}

impl fmt::Display for ImageFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageFilter {
    type Err = ReductionError;

    fn from_str(s: &str) -> Result<Self> {
        ImageFilter::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| ReductionError::UnknownName {
                kind: "filter",
                name: s.to_string(),
            })
    }
}

/// Apply a named filter.
pub fn apply_filter(image: &Image, filter: ImageFilter) -> Image {
    match filter {
        ImageFilter::Mean3 => filter_3x3(image, &MEAN3),
        ImageFilter::Dx => filter_3x3(image, &DX),
        ImageFilter::Dy => filter_3x3(image, &DY),
        ImageFilter::Dx2 => filter_3x3(image, &DX2),
        ImageFilter::Dy2 => filter_3x3(image, &DY2),
        ImageFilter::Contour1 => filter_3x3(image, &CONTOUR1),
        ImageFilter::Contour2 => filter_3x3(image, &CONTOUR2),
        ImageFilter::Contour3 => filter_3x3(image, &CONTOUR3),
        ImageFilter::Contrast1 => filter_3x3(image, &CONTRAST1),
        ImageFilter::Mean5 => filter_5x5(image, &MEAN5),
        ImageFilter::Min => filter_morpho(image, &MORPHO_MIN),
        ImageFilter::Max => filter_morpho(image, &MORPHO_MAX),
        ImageFilter::MaxMin => filter_morpho(image, &MORPHO_MAX_MIN),
        ImageFilter::Median => median_3x3(image),
    }
}

fn kernel_norm(kernel: &[f64]) -> f64 {
    let sum: f64 = kernel.iter().sum();
    if sum.abs() < 1e-6 {
        1.0
    } else {
        1.0 / sum
    }
}

/// Run `f(x, y)` on every pixel at least `border` away from each edge,
/// leaving the border at zero.
fn interior_map<F>(image: &Image, border: usize, f: F) -> Image
where
    F: Fn(usize, usize) -> f64 + Sync,
{
    let (w, h) = (image.width(), image.height());
    let mut out = Array2::zeros((h, w));
    if w <= 2 * border || h <= 2 * border {
        return Image::from_array(out);
    }
    Zip::indexed(&mut out).par_for_each(|(y, x), o| {
        if x >= border && x < w - border && y >= border && y < h - border {
            *o = f(x, y);
        }
    });
    Image::from_array(out)
}

/// Linear 3×3 filter. `kernel[0]` weights `(x-1, y-1)`, `kernel[8]` weights
/// `(x+1, y+1)`.
pub fn filter_3x3(image: &Image, kernel: &[f64; 9]) -> Image {
    let norm = kernel_norm(kernel);
    let src = image.view();
    interior_map(image, 1, |x, y| {
        let mut acc = 0.0;
        for j in 0..3 {
            for i in 0..3 {
                acc += kernel[3 * j + i] * src[[y + j - 1, x + i - 1]];
            }
        }
        acc * norm
    })
}

/// Linear 5×5 filter, row-major kernel starting at `(x-2, y-2)`.
pub fn filter_5x5(image: &Image, kernel: &[f64; 25]) -> Image {
    let norm = kernel_norm(kernel);
    let src = image.view();
    interior_map(image, 2, |x, y| {
        let mut acc = 0.0;
        for j in 0..5 {
            for i in 0..5 {
                acc += kernel[5 * j + i] * src[[y + j - 2, x + i - 2]];
            }
        }
        acc * norm
    })
}

/// Horizontal 3-tap filter applied to every row.
///
/// End pixels use the two taps that fall inside the row, renormalised.
pub fn filter_3x1(image: &Image, kernel: &[f64; 3]) -> Image {
    let (w, h) = (image.width(), image.height());
    let src = image.view();
    let norm = kernel_norm(kernel);
    let left_norm = kernel_norm(&[kernel[1], kernel[2]]);
    let right_norm = kernel_norm(&[kernel[0], kernel[1]]);
    if w < 2 {
        return image.clone();
    }
    let mut out = Array2::zeros((h, w));
    Zip::indexed(&mut out).par_for_each(|(y, x), o| {
        *o = if x == 0 {
            (kernel[1] * src[[y, 0]] + kernel[2] * src[[y, 1]]) * left_norm
        } else if x == w - 1 {
            (kernel[0] * src[[y, w - 2]] + kernel[1] * src[[y, w - 1]]) * right_norm
        } else {
            (kernel[0] * src[[y, x - 1]] + kernel[1] * src[[y, x]] + kernel[2] * src[[y, x + 1]])
                * norm
        };
    });
    Image::from_array(out)
}

fn neighbourhood_3x3(src: &ndarray::ArrayView2<f64>, x: usize, y: usize) -> [f64; 9] {
    let mut n = [0.0; 9];
    for j in 0..3 {
        for i in 0..3 {
            n[3 * j + i] = src[[y + j - 1, x + i - 1]];
        }
    }
    n
}

/// Morphological 3×3 filter: the neighbourhood is sorted ascending and
/// weighted by `kernel`.
pub fn filter_morpho(image: &Image, kernel: &[f64; 9]) -> Image {
    let norm = kernel_norm(kernel);
    let src = image.view();
    interior_map(image, 1, |x, y| {
        let mut n = neighbourhood_3x3(&src, x, y);
        n.sort_unstable_by(f64::total_cmp);
        n.iter().zip(kernel).map(|(v, k)| v * k).sum::<f64>() * norm
    })
}

/// 3×3 median with a 1-pixel zero border.
pub fn median_3x3(image: &Image) -> Image {
    let src = image.view();
    interior_map(image, 1, |x, y| {
        let mut n = neighbourhood_3x3(&src, x, y);
        stats::kth_smallest(&mut n, 4)
    })
}

/// Median over a `(2hx+1)×(2hy+1)` window clipped at the image edges.
pub fn median_filter(image: &Image, hx: usize, hy: usize) -> Result<Image> {
    let (w, h) = (image.width(), image.height());
    if w <= hx || h <= hy {
        return Err(ReductionError::invalid(format!(
            "median window {hx}x{hy} too large for {} image",
            image.size()
        )));
    }
    let src = image.view();
    let mut out = Array2::zeros((h, w));
    Zip::indexed(&mut out).par_for_each(|(y, x), o| {
        let (x0, x1) = (x.saturating_sub(hx), (x + hx).min(w - 1));
        let (y0, y1) = (y.saturating_sub(hy), (y + hy).min(h - 1));
        let mut window = Vec::with_capacity((x1 - x0 + 1) * (y1 - y0 + 1));
        for yy in y0..=y1 {
            for xx in x0..=x1 {
                window.push(src[[yy, xx]]);
            }
        }
        *o = stats::median_in_place(&mut window);
    });
    Ok(Image::from_array(out))
}

/// Boxcar mean over a `(2h+1)²` window clipped at the edges.
pub fn flat_filter(image: &Image, half: usize) -> Result<Image> {
    let (w, h) = (image.width(), image.height());
    if half < 1 || 2 * half + 1 > w || 2 * half + 1 > h {
        return Err(ReductionError::invalid(format!(
            "flat filter half-size {half} invalid for {} image",
            image.size()
        )));
    }
    let src = image.view();
    let mut out = Array2::zeros((h, w));
    Zip::indexed(&mut out).par_for_each(|(y, x), o| {
        let (x0, x1) = (x.saturating_sub(half), (x + half).min(w - 1));
        let (y0, y1) = (y.saturating_sub(half), (y + half).min(h - 1));
        let window = src.slice(ndarray::s![y0..=y1, x0..=x1]);
        *o = window.sum() / window.len() as f64;
    });
    Ok(Image::from_array(out))
}

/// Population standard deviation over a `(2hx+1)×(2hy+1)` window.
///
/// Computed for pixels whose whole window fits in the image; others are zero.
pub fn local_stdev(image: &Image, hx: usize, hy: usize) -> Result<Image> {
    let (w, h) = (image.width(), image.height());
    if w <= 2 * hx || h <= 2 * hy {
        return Err(ReductionError::invalid(format!(
            "stdev window {hx}x{hy} leaves no interior in {} image",
            image.size()
        )));
    }
    let src = image.view();
    let n = ((2 * hx + 1) * (2 * hy + 1)) as f64;
    let mut out = Array2::zeros((h, w));
    Zip::indexed(&mut out).par_for_each(|(y, x), o| {
        if x < hx || x + hx >= w || y < hy || y + hy >= h {
            return;
        }
        let window = src.slice(ndarray::s![y - hy..=y + hy, x - hx..=x + hx]);
        let (s, sq) = window
            .iter()
            .fold((0.0, 0.0), |(s, sq), &v| (s + v, sq + v * v));
        let m = s / n;
        *o = (sq / n - m * m).max(0.0).sqrt();
    });
    Ok(Image::from_array(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(w: usize, h: usize) -> Image {
        Image::from_fn(w, h, |x, y| (x + 2 * y) as f64)
    }

    #[test]
    fn test_names_roundtrip() {
        for f in ImageFilter::ALL {
            assert_eq!(f.name().parse::<ImageFilter>().unwrap(), f);
        }
        assert!(matches!(
            "sobel".parse::<ImageFilter>(),
            Err(ReductionError::UnknownName { .. })
        ));
    }

    #[test]
    fn test_mean3_preserves_ramp_and_zeroes_border() {
        let img = ramp(8, 6);
        let out = apply_filter(&img, ImageFilter::Mean3);
        assert_relative_eq!(out.get(3, 2), img.get(3, 2), epsilon = 1e-12);
        assert_eq!(out.get(0, 3), 0.0);
        assert_eq!(out.get(7, 3), 0.0);
        assert_eq!(out.get(3, 5), 0.0);
    }

    #[test]
    fn test_dx_measures_gradient() {
        // zero-sum kernel is not normalised: 3 rows x (f(x+1) - f(x-1)) = 6
        let out = apply_filter(&ramp(8, 6), ImageFilter::Dx);
        assert_relative_eq!(out.get(4, 3), 6.0);
        let out = apply_filter(&ramp(8, 6), ImageFilter::Dy);
        assert_relative_eq!(out.get(4, 3), 12.0);
    }

    #[test]
    fn test_mean5_border() {
        let img = Image::from_fn(9, 9, |_, _| 2.0);
        let out = apply_filter(&img, ImageFilter::Mean5);
        assert_relative_eq!(out.get(4, 4), 2.0);
        assert_eq!(out.get(1, 4), 0.0);
    }

    #[test]
    fn test_morpho_and_median_remove_hot_pixel() {
        let mut img = Image::from_fn(7, 7, |_, _| 1.0);
        img.set(3, 3, 100.0);
        assert_eq!(median_3x3(&img).get(3, 3), 1.0);
        assert_eq!(apply_filter(&img, ImageFilter::Min).get(3, 3), 1.0);
        assert_eq!(apply_filter(&img, ImageFilter::Max).get(2, 2), 100.0);
        // zero-sum weights: plain difference
        assert_eq!(apply_filter(&img, ImageFilter::MaxMin).get(2, 3), 99.0);
    }

    #[test]
    fn test_filter_3x1_edges() {
        let img = Image::from_fn(4, 1, |x, _| x as f64);
        let out = filter_3x1(&img, &[1.0, 2.0, 1.0]);
        assert_relative_eq!(out.get(0, 0), 1.0 / 3.0);
        assert_relative_eq!(out.get(1, 0), 1.0);
        assert_relative_eq!(out.get(3, 0), 8.0 / 3.0);
    }

    #[test]
    fn test_large_median_and_flat() {
        let mut img = Image::from_fn(10, 10, |_, _| 5.0);
        img.set(0, 0, 1000.0);
        let med = median_filter(&img, 2, 2).unwrap();
        assert_eq!(med.get(0, 0), 5.0);
        assert!(median_filter(&img, 10, 2).is_err());

        let flat = flat_filter(&Image::from_fn(10, 10, |_, _| 3.0), 2).unwrap();
        assert_relative_eq!(flat.get(0, 0), 3.0);
        assert_relative_eq!(flat.get(5, 5), 3.0);
        assert!(flat_filter(&img, 0).is_err());
        assert!(flat_filter(&img, 5).is_err());
    }

    #[test]
    fn test_local_stdev() {
        let img = Image::from_fn(9, 9, |x, y| if (x + y) % 2 == 0 { 0.0 } else { 2.0 });
        let sd = local_stdev(&img, 1, 1).unwrap();
        // window around (4, 4): five zeros and four twos
        let mean: f64 = 8.0 / 9.0;
        let var = 16.0 / 9.0 - mean * mean;
        assert_relative_eq!(sd.get(4, 4), var.sqrt(), epsilon = 1e-12);
        assert_eq!(sd.get(0, 4), 0.0);
        assert!(local_stdev(&Image::new(3, 3), 2, 1).is_err());
    }
}
