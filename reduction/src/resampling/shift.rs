//! Translation of images and cubes.
//!
//! Sub-pixel shifts are separable: rows are interpolated first, then
//! columns, each with four kernel taps. `shift_image(img, dx, dy)` returns
//! `out(p) = img(p - (dx, dy))`, so content moves by `+(dx, dy)`.

use super::kernel::Kernel;
use crate::error::{ReductionError, Result};
use crate::image_proc::cube::Cube;
use crate::image_proc::image::Image;
use crate::registration::PlaneOffset;
use ndarray::{Array2, ArrayView1, Zip};
use rayon::prelude::*;

/// Shifts below this are treated as zero.
pub const MIN_SHIFT: f64 = 1e-2;

/// Four-tap interpolation of `line` at `pos`; 0 when a tap leaves the line.
#[inline]
fn interpolate_line(line: ArrayView1<f64>, pos: f64, kernel: &Kernel) -> f64 {
    let p = pos.floor();
    if p < 1.0 || p + 2.0 > (line.len() - 1) as f64 {
        return 0.0;
    }
    let p = p as usize;
    let w = kernel.taps(Kernel::tab(pos - p as f64));
    let value = line[p - 1] * w[0] + line[p] * w[1] + line[p + 1] * w[2] + line[p + 2] * w[3];
    let norm: f64 = w.iter().sum();
    if norm.abs() > 1e-4 {
        value / norm
    } else {
        value
    }
}

/// Sub-pixel shift with kernel interpolation.
///
/// Pixels whose taps fall outside the input are zero.
pub fn shift_image(image: &Image, dx: f64, dy: f64, kernel: &Kernel) -> Image {
    if dx.abs() < MIN_SHIFT && dy.abs() < MIN_SHIFT {
        return image.clone();
    }
    let (h, w) = (image.height(), image.width());
    let src = image.view();

    let mut first = Array2::<f64>::zeros((h, w));
    Zip::indexed(&mut first).par_for_each(|(y, x), o| {
        *o = interpolate_line(src.row(y), x as f64 - dx, kernel);
    });

    let mut second = Array2::<f64>::zeros((h, w));
    Zip::indexed(&mut second).par_for_each(|(y, x), o| {
        *o = interpolate_line(first.column(x), y as f64 - dy, kernel);
    });
    Image::from_array(second)
}

/// Whole-pixel relocation; uncovered pixels are zero.
pub fn shift_image_integer(image: &Image, dx: i64, dy: i64) -> Image {
    if dx == 0 && dy == 0 {
        return image.clone();
    }
    let (w, h) = (image.width() as i64, image.height() as i64);
    let src = image.view();
    let data = Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        let (sx, sy) = (x as i64 - dx, y as i64 - dy);
        if sx >= 0 && sx < w && sy >= 0 && sy < h {
            src[[sy as usize, sx as usize]]
        } else {
            0.0
        }
    });
    Image::from_array(data)
}

/// Whole-pixel relocation with wrap-around at the edges.
pub fn shift_image_circular(image: &Image, dx: i64, dy: i64) -> Image {
    let (w, h) = (image.width() as i64, image.height() as i64);
    if w == 0 || h == 0 {
        return image.clone();
    }
    let src = image.view();
    let data = Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        let sx = (x as i64 - dx).rem_euclid(w) as usize;
        let sy = (y as i64 - dy).rem_euclid(h) as usize;
        src[[sy, sx]]
    });
    Image::from_array(data)
}

/// Bring every plane onto the reference grid by shifting it by its negated
/// measured offset.
///
/// Planes with an invalid offset are left as they are.
pub fn shift_cube(cube: &Cube, offsets: &[PlaneOffset], kernel: &Kernel) -> Result<Cube> {
    if offsets.len() != cube.len() {
        return Err(ReductionError::ShapeMismatch {
            expected: format!("{} offsets", cube.len()),
            actual: format!("{} offsets", offsets.len()),
        });
    }
    let planes: Vec<Image> = cube
        .planes()
        .par_iter()
        .zip(offsets.par_iter())
        .enumerate()
        .map(|(i, (plane, offset))| {
            if offset.is_valid() {
                shift_image(plane, -offset.dx, -offset.dy, kernel)
            } else {
                log::warn!("plane {} has no valid offset, left unshifted", i + 1);
                plane.clone()
            }
        })
        .collect();
    Cube::from_planes(planes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resampling::kernel::KernelKind;
    use approx::assert_abs_diff_eq;
    use shared::synthetic::{SyntheticFrame, SyntheticStar};
    use shared::ImageSize;

    fn star_field() -> Image {
        let stars = [
            SyntheticStar::new(20.3, 18.7, 100.0, 2.5),
            SyntheticStar::new(40.0, 35.2, 60.0, 3.0),
        ];
        Image::from_array(
            SyntheticFrame::new(ImageSize::from_width_height(64, 56))
                .with_background(10.0)
                .with_stars(stars)
                .render(),
        )
    }

    #[test]
    fn test_tiny_shift_is_a_copy() {
        let img = star_field();
        assert_eq!(shift_image(&img, 0.005, -0.003, Kernel::default_kernel()), img);
    }

    #[test]
    fn test_whole_pixel_shift_matches_relocation() {
        let img = star_field();
        let kernel = Kernel::generate(KernelKind::Sinc);
        let shifted = shift_image(&img, 1.0, -2.0, &kernel);
        let moved = shift_image_integer(&img, 1, -2);
        for y in 4..img.height() - 6 {
            for x in 4..img.width() - 4 {
                assert_abs_diff_eq!(shifted.get(x, y), moved.get(x, y), epsilon = 1e-9);
            }
        }
        // taps off the left edge
        assert_eq!(shifted.get(0, 10), 0.0);
    }

    #[test]
    fn test_round_trip_interior() {
        let img = star_field();
        let kernel = Kernel::default_kernel();
        let there = shift_image(&img, 0.37, -0.61, kernel);
        let back = shift_image(&there, -0.37, 0.61, kernel);
        let mut sum_sq = 0.0;
        let mut n = 0;
        for y in 6..img.height() - 6 {
            for x in 6..img.width() - 6 {
                sum_sq += (back.get(x, y) - img.get(x, y)).powi(2);
                n += 1;
            }
        }
        let rms = (sum_sq / n as f64).sqrt();
        assert!(rms < 0.5, "round-trip rms {rms}");
    }

    #[test]
    fn test_integer_and_circular() {
        let img = Image::from_fn(4, 3, |x, y| (y * 4 + x) as f64 + 1.0);
        let moved = shift_image_integer(&img, 1, 1);
        assert_eq!(moved.get(0, 0), 0.0);
        assert_eq!(moved.get(1, 1), 1.0);
        assert_eq!(moved.get(3, 2), 7.0);

        let wrapped = shift_image_circular(&img, -1, 1);
        assert_eq!(wrapped.get(3, 1), 1.0);
        assert_eq!(wrapped.get(0, 0), img.get(1, 2));
        assert_eq!(shift_image_circular(&wrapped, 1, -1), img);
    }

    #[test]
    fn test_shift_cube_realigns() {
        let img = star_field();
        let moved = shift_image_integer(&img, 3, 2);
        let cube = Cube::from_planes(vec![img.clone(), moved]).unwrap();
        let offsets = [PlaneOffset::known(0.0, 0.0), PlaneOffset::known(3.0, 2.0)];
        let aligned = shift_cube(&cube, &offsets, Kernel::default_kernel()).unwrap();
        assert_eq!(aligned.plane(0), &img);
        assert_abs_diff_eq!(aligned.plane(1).get(20, 19), img.get(20, 19), epsilon = 1e-6);

        assert!(shift_cube(&cube, &offsets[..1], Kernel::default_kernel()).is_err());
        let kept = shift_cube(&cube, &[offsets[0], PlaneOffset::INVALID], Kernel::default_kernel())
            .unwrap();
        assert_eq!(kept.plane(1), cube.plane(1));
    }
}
