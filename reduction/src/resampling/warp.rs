//! Reverse-mapped warps and 2× decimation.
//!
//! Each output pixel is traced back to a source position and interpolated
//! from the 4×4 neighbourhood around it. Sources whose neighbourhood leaves
//! the input give 0.

use super::kernel::Kernel;
use crate::algo::poly2d::Poly2d;
use crate::error::{ReductionError, Result};
use crate::image_proc::image::Image;
use nalgebra::{Matrix2, Vector2};
use ndarray::{Array2, ArrayView2, Zip};

/// Smallest determinant accepted for a linear transform.
pub const MIN_DETERMINANT: f64 = 1e-6;

/// Separable 16-tap interpolation around integer position `(px, py)`.
///
/// The caller guarantees `1 <= px <= w - 3` and `1 <= py <= h - 3`.
#[inline]
pub(crate) fn interpolate_16(
    src: &ArrayView2<f64>,
    px: usize,
    py: usize,
    tabs: (usize, usize),
    kernel: &Kernel,
) -> f64 {
    let wx = kernel.taps(tabs.0);
    let wy = kernel.taps(tabs.1);
    let mut value = 0.0;
    for (row, ry) in wy.iter().enumerate() {
        let y = py + row - 1;
        let line: f64 = wx
            .iter()
            .enumerate()
            .map(|(col, rx)| rx * src[[y, px + col - 1]])
            .sum();
        value += ry * line;
    }
    let norm = wx.iter().sum::<f64>() * wy.iter().sum::<f64>();
    value / norm
}

/// Interpolate at an arbitrary source position, 0 outside `[1, w-3]×[1, h-3]`.
fn sample(src: &ArrayView2<f64>, x: f64, y: f64, kernel: &Kernel) -> f64 {
    let (h, w) = src.dim();
    let (fx, fy) = (x.floor(), y.floor());
    if !(fx >= 1.0 && fy >= 1.0 && fx + 3.0 <= w as f64 && fy + 3.0 <= h as f64) {
        return 0.0;
    }
    let tabs = (Kernel::tab(x - fx), Kernel::tab(y - fy));
    interpolate_16(src, fx as usize, fy as usize, tabs, kernel)
}

/// Warp by the linear transform `u = ax + by + c`, `v = dx + ey + f` with
/// `params = [a, b, c, d, e, f]`, `(x, y)` in the input and `(u, v)` in the
/// output.
///
/// The output is scaled by `sqrt|ae - bd|` in both directions.
pub fn warp_linear(image: &Image, params: &[f64; 6], kernel: &Kernel) -> Result<Image> {
    let [a, b, c, d, e, f] = *params;
    let det = a * e - b * d;
    if det.abs() < MIN_DETERMINANT {
        return Err(ReductionError::invalid(format!(
            "linear transform is singular (determinant {det:e})"
        )));
    }
    let inverse = Matrix2::new(a, b, d, e)
        .try_inverse()
        .ok_or_else(|| ReductionError::invalid("linear transform is not invertible"))?;
    let origin = -(inverse * Vector2::new(c, f));

    let zoom = det.abs().sqrt();
    let out_w = (image.width() as f64 * zoom) as usize;
    let out_h = (image.height() as f64 * zoom) as usize;

    let src = image.view();
    let mut out = Array2::<f64>::zeros((out_h, out_w));
    Zip::indexed(&mut out).par_for_each(|(j, i), o| {
        let p = inverse * Vector2::new(i as f64, j as f64) + origin;
        *o = sample(&src, p.x, p.y, kernel);
    });
    Ok(Image::from_array(out))
}

/// Warp with a polynomial reverse mapping: output pixel `(u, v)` reads the
/// input at `(poly_u(u, v), poly_v(u, v))`. The output keeps the input size.
pub fn warp_polynomial(image: &Image, kernel: &Kernel, poly_u: &Poly2d, poly_v: &Poly2d) -> Image {
    let src = image.view();
    let mut out = Array2::<f64>::zeros(src.dim());
    Zip::indexed(&mut out).par_for_each(|(v, u), o| {
        let (u, v) = (u as f64, v as f64);
        *o = sample(&src, poly_u.eval(u, v), poly_v.eval(u, v), kernel);
    });
    Image::from_array(out)
}

/// Halve both dimensions after a 1-2-1 smoothing, first along x then y.
///
/// Output pixel `i` is centred on input pixel `2i`; neighbours past the edge
/// are dropped and the weights renormalised.
pub fn subsample(image: &Image) -> Image {
    let src = image.view();
    let (h, w) = src.dim();
    let smooth = |p0: Option<f64>, p1: f64, p2: Option<f64>| {
        let contrib = 2 + p0.is_some() as usize + p2.is_some() as usize;
        (p0.unwrap_or(0.0) + 2.0 * p1 + p2.unwrap_or(0.0)) / contrib as f64
    };

    let pass1 = Array2::from_shape_fn((h, w / 2), |(y, i)| {
        let x = 2 * i;
        smooth(
            x.checked_sub(1).map(|x| src[[y, x]]),
            src[[y, x]],
            (x + 1 < w).then(|| src[[y, x + 1]]),
        )
    });
    let pass2 = Array2::from_shape_fn((h / 2, w / 2), |(j, x)| {
        let y = 2 * j;
        smooth(
            y.checked_sub(1).map(|y| pass1[[y, x]]),
            pass1[[y, x]],
            (y + 1 < h).then(|| pass1[[y + 1, x]]),
        )
    });
    Image::from_array(pass2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resampling::kernel::KernelKind;
    use crate::resampling::shift::shift_image_integer;
    use approx::assert_abs_diff_eq;

    fn ramp() -> Image {
        Image::from_fn(32, 24, |x, y| ((x * 7 + y * 3) % 11) as f64 + 0.5 * x as f64)
    }

    #[test]
    fn test_identity_warp() {
        let img = ramp();
        let kernel = Kernel::generate(KernelKind::Sinc);
        let out = warp_linear(&img, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &kernel).unwrap();
        assert_eq!(out.size(), img.size());
        for y in 1..=img.height() - 3 {
            for x in 1..=img.width() - 3 {
                assert_abs_diff_eq!(out.get(x, y), img.get(x, y), epsilon = 1e-9);
            }
        }
        assert_eq!(out.get(0, 5), 0.0);
        assert_eq!(out.get(img.width() - 1, 5), 0.0);
    }

    #[test]
    fn test_translation_warp_matches_integer_shift() {
        let img = ramp();
        let kernel = Kernel::generate(KernelKind::Sinc);
        // u = x + 3, v = y - 2
        let out = warp_linear(&img, &[1.0, 0.0, 3.0, 0.0, 1.0, -2.0], &kernel).unwrap();
        let moved = shift_image_integer(&img, 3, -2);
        for y in 2..15 {
            for x in 5..25 {
                assert_abs_diff_eq!(out.get(x, y), moved.get(x, y), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_zoom_and_singular() {
        let img = ramp();
        let kernel = Kernel::default_kernel();
        let big = warp_linear(&img, &[2.0, 0.0, 0.0, 0.0, 2.0, 0.0], kernel).unwrap();
        assert_eq!((big.width(), big.height()), (64, 48));
        assert!(matches!(
            warp_linear(&img, &[1.0, 2.0, 0.0, 2.0, 4.0, 0.0], kernel),
            Err(ReductionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_polynomial_identity() {
        let img = ramp();
        let kernel = Kernel::generate(KernelKind::Sinc);
        let out = warp_polynomial(&img, &kernel, &Poly2d::identity_x(), &Poly2d::identity_y());
        assert_eq!(out.size(), img.size());
        assert_abs_diff_eq!(out.get(10, 10), img.get(10, 10), epsilon = 1e-9);

        let shifted_u = Poly2d::affine(-2.0, 1.0, 0.0);
        let out = warp_polynomial(&img, &kernel, &shifted_u, &Poly2d::identity_y());
        assert_abs_diff_eq!(out.get(10, 10), img.get(8, 10), epsilon = 1e-9);
    }

    #[test]
    fn test_subsample() {
        let flat = Image::from_fn(9, 6, |_, _| 4.0);
        let small = subsample(&flat);
        assert_eq!((small.width(), small.height()), (4, 3));
        assert!(small.view().iter().all(|&v| (v - 4.0).abs() < 1e-12));

        // row [0, 4, 8, 12]: first output (2*0 + 4) / 3, second (4 + 16 + 12) / 4
        let row = subsample(&Image::from_fn(4, 2, |x, _| 4.0 * x as f64));
        assert_abs_diff_eq!(row.get(0, 0), 4.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(row.get(1, 0), 8.0, epsilon = 1e-12);
    }
}
