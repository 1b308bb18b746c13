//! First-guess offsets from whole-frame FFT cross-correlation.
//!
//! A central square zone of each plane is cut out, 2× subsampled and
//! mean-subtracted, then correlated against the reference in Fourier space.
//! The correlation peak gives the displacement to even-pixel precision,
//! enough to seed [`estimate_offset`](super::estimate_offset).

use crate::error::{ReductionError, Result};
use crate::image_proc::cube::Cube;
use crate::image_proc::image::Image;
use crate::resampling::subsample;
use ndarray::Array2;
use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Starting size of the correlation zone; halved until it fits the frame.
pub const BLIND_ZONE_INIT: usize = 512;
/// Smallest correlation zone accepted.
pub const BLIND_ZONE_MIN: usize = 64;

/// Blind offsets of every plane against plane 0.
pub fn blind_offsets(cube: &Cube) -> Result<Vec<(f64, f64)>> {
    if cube.is_empty() {
        return Err(ReductionError::invalid("blind offsets of an empty cube"));
    }
    blind_offsets_against(cube, cube.plane(0))
}

/// Blind offsets of every plane against `reference`.
pub fn blind_offsets_against(cube: &Cube, reference: &Image) -> Result<Vec<(f64, f64)>> {
    if reference.size() != cube.size() {
        return Err(ReductionError::ShapeMismatch {
            expected: cube.size().to_string(),
            actual: reference.size().to_string(),
        });
    }
    let (w, h) = (cube.width(), cube.height());
    let mut zone = BLIND_ZONE_INIT;
    while zone > w || zone > h {
        log::debug!("correlation zone reduced to fit the frame ({zone} -> {})", zone / 2);
        zone /= 2;
        if zone < BLIND_ZONE_MIN {
            return Err(ReductionError::invalid(format!(
                "frame {} too small for a {BLIND_ZONE_MIN}-pixel correlation zone",
                cube.size()
            )));
        }
    }
    let (x0, y0) = (w / 2 - zone / 2, h / 2 - zone / 2);
    let n = zone / 2;

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let pattern = spectrum(reference, (x0, y0), zone, &forward)?;

    cube.planes()
        .par_iter()
        .map(|plane| {
            let mut product = spectrum(plane, (x0, y0), zone, &forward)?;
            product.zip_mut_with(&pattern, |c, p| *c = *p * c.conj());
            fft2(&mut product, &inverse);

            let (mut best, mut px, mut py) = (f64::NEG_INFINITY, 0, 0);
            for ((y, x), v) in product.indexed_iter() {
                if v.re > best {
                    best = v.re;
                    // quadrant swap: zero lag lands on n/2
                    px = (x + n / 2) % n;
                    py = (y + n / 2) % n;
                }
            }
            Ok((
                -2.0 * (px as f64 - (n / 2) as f64),
                -2.0 * (py as f64 - (n / 2) as f64),
            ))
        })
        .collect()
}

/// Forward spectrum of the subsampled, mean-subtracted zone.
fn spectrum(
    image: &Image,
    (x0, y0): (usize, usize),
    zone: usize,
    fft: &Arc<dyn Fft<f64>>,
) -> Result<Array2<Complex64>> {
    let cut = image.extract(x0, y0, x0 + zone - 1, y0 + zone - 1)?;
    let small = subsample(&cut);
    let mean = small.mean();
    let mut data = small.view().mapv(|v| Complex64::new(v - mean, 0.0));
    fft2(&mut data, fft);
    Ok(data)
}

/// In-place 2D transform of a square array by rows then columns.
fn fft2(data: &mut Array2<Complex64>, fft: &Arc<dyn Fft<f64>>) {
    for mut row in data.rows_mut() {
        if let Some(slice) = row.as_slice_mut() {
            fft.process(slice);
        }
    }
    let mut transposed = data.t().as_standard_layout().into_owned();
    for mut row in transposed.rows_mut() {
        if let Some(slice) = row.as_slice_mut() {
            fft.process(slice);
        }
    }
    *data = transposed.t().as_standard_layout().into_owned();
}
