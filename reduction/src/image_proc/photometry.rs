//! Disk and annulus aperture measurements.
//!
//! All apertures are evaluated on integer pixel centres: a pixel at `(i, j)`
//! belongs to a disk of radius `r` around `(x, y)` when
//! `(i - x)² + (j - y)² <= r²`.

use crate::algo::stats;
use crate::error::{ReductionError, Result};
use crate::image_proc::detection::AABB;
use crate::image_proc::filters;
use crate::image_proc::image::Image;

/// Annulus pixel count below which median-based backgrounds are refused.
pub const MIN_BACKGROUND_PIXELS: usize = 30;

/// Fractions rejected at each end by [`BackgroundMethod::AverageRejected`].
const REJECT_LOW: f64 = 0.1;
const REJECT_HIGH: f64 = 0.1;

/// How [`disk_background`] reduces the annulus pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundMethod {
    Average,
    Median,
    /// Mean of the sorted values after dropping the lowest and highest 10 %
    AverageRejected,
}

/// Pixel values with `r_in² <= d² <= r_out²` around `(x, y)`.
pub fn annulus_pixels(image: &Image, x: f64, y: f64, r_in: f64, r_out: f64) -> Vec<f64> {
    let Some(window) = AABB::around(x, y, r_out + 2.0, image.size()) else {
        return Vec::new();
    };
    let (lo, hi) = (r_in * r_in, r_out * r_out);
    window
        .pixels()
        .filter(|&(i, j)| {
            let d = sq_dist(i, j, x, y);
            d >= lo && d <= hi
        })
        .map(|(i, j)| image.get(i, j))
        .collect()
}

/// Sum of `p - background` over the disk of `radius` around `(x, y)`.
pub fn disk_flux(image: &Image, x: f64, y: f64, radius: f64, background: f64) -> Result<f64> {
    if radius <= 0.0 {
        return Err(ReductionError::invalid(format!(
            "photometry radius must be positive, got {radius}"
        )));
    }
    let Some(window) = AABB::around(x, y, radius + 2.0, image.size()) else {
        return Ok(0.0);
    };
    let r2 = radius * radius;
    Ok(window
        .pixels()
        .filter(|&(i, j)| sq_dist(i, j, x, y) <= r2)
        .map(|(i, j)| image.get(i, j) - background)
        .sum())
}

/// Per-pixel background in the annulus `[r_in, r_out]` around `(x, y)`.
///
/// Returns `Ok(None)` when the annulus holds no pixel, or fewer than
/// [`MIN_BACKGROUND_PIXELS`] for the median-based methods.
pub fn disk_background(
    image: &Image,
    x: f64,
    y: f64,
    r_in: f64,
    r_out: f64,
    method: BackgroundMethod,
) -> Result<Option<f64>> {
    if r_in <= 0.0 || r_out <= 0.0 {
        return Err(ReductionError::invalid(format!(
            "background radii must be positive, got [{r_in}, {r_out}]"
        )));
    }
    if r_out - r_in < 1e-10 {
        return Err(ReductionError::invalid(format!(
            "empty background annulus [{r_in}, {r_out}]"
        )));
    }
    let mut ring = annulus_pixels(image, x, y, r_in, r_out);
    if ring.is_empty() {
        return Ok(None);
    }
    let value = match method {
        BackgroundMethod::Average => Some(stats::mean(&ring)),
        BackgroundMethod::Median if ring.len() < MIN_BACKGROUND_PIXELS => None,
        BackgroundMethod::Median => Some(stats::median_in_place(&mut ring)),
        BackgroundMethod::AverageRejected if ring.len() < MIN_BACKGROUND_PIXELS => None,
        BackgroundMethod::AverageRejected => {
            let n = ring.len();
            let low = (n as f64 * REJECT_LOW) as usize;
            let high = n - (n as f64 * (1.0 - REJECT_HIGH)) as usize;
            stats::rejected_mean(&mut ring, low, high)
        }
    };
    Ok(value)
}

/// Brightest pixel of the 3×3 median-filtered vignette of half-size
/// `(hx, hy)` around `(px, py)`, in absolute coordinates.
///
/// Median filtering first keeps isolated hot pixels from winning.
pub fn locate_peak(image: &Image, px: usize, py: usize, hx: usize, hy: usize) -> Result<(usize, usize)> {
    if hx < 1 || hy < 1 {
        return Err(ReductionError::invalid("peak search half-size must be at least 1"));
    }
    if px < hx || py < hy || px + hx >= image.width() || py + hy >= image.height() {
        return Err(ReductionError::invalid(format!(
            "peak search window around ({px}, {py}) leaves the {} frame",
            image.size()
        )));
    }
    let (x0, y0) = (px - hx, py - hy);
    let vignette = image.extract(x0, y0, px + hx, py + hy)?;
    let filtered = filters::median_3x3(&vignette);
    let ((my, mx), _) = filtered
        .view()
        .indexed_iter()
        .fold(((0, 0), f64::NEG_INFINITY), |best, (pos, &v)| {
            if v > best.1 {
                (pos, v)
            } else {
                best
            }
        });
    Ok((x0 + mx, y0 + my))
}

const ESTIMATE_REJECT_SIGMA: f64 = 3.0;
const ESTIMATE_HISTOGRAM_BINS: usize = 256;

/// Background level of a frame dominated by sky.
///
/// Iterates a 3σ-clipped mean until it moves by less than `stop_threshold`
/// or `max_iterations` passes are done, then refines the result to the
/// histogram mode within one sigma of it.
pub fn estimate_background(image: &Image, stop_threshold: f64, max_iterations: usize) -> Result<f64> {
    if stop_threshold <= 0.0 || max_iterations < 1 {
        return Err(ReductionError::invalid(
            "background estimation needs a positive stop threshold and at least one iteration",
        ));
    }
    let pixels = image.pixels();
    let mut central = stats::mean(&pixels);
    let mut spread = stats::rms(&pixels);

    for iteration in 1..=max_iterations {
        let previous = central;
        let cut = spread * ESTIMATE_REJECT_SIGMA;
        let (mut sum, mut sum_sq, mut n) = (0.0, 0.0, 0usize);
        for &p in pixels.iter().filter(|&&p| (p - central).abs() <= cut) {
            sum += p;
            sum_sq += p * p;
            n += 1;
        }
        if n == 0 {
            return Err(ReductionError::NoValidMeasurement(
                "no pixel left after sigma clipping".into(),
            ));
        }
        central = sum / n as f64;
        spread = (sum_sq / n as f64 - central * central).max(0.0).sqrt();
        if (central - previous).abs() < stop_threshold {
            log::debug!("background converged after {iteration} iterations");
            break;
        }
    }

    Ok(histogram_mode_in(&pixels, central - spread, central + spread).unwrap_or(central))
}

/// Centre of the fullest of 256 bins over `[lo, hi]`, ignoring values outside.
fn histogram_mode_in(values: &[f64], lo: f64, hi: f64) -> Option<f64> {
    if !(hi > lo) {
        return None;
    }
    let width = (hi - lo) / ESTIMATE_HISTOGRAM_BINS as f64;
    let mut bins = [0usize; ESTIMATE_HISTOGRAM_BINS];
    for &v in values.iter().filter(|&&v| v >= lo && v <= hi) {
        let b = (((v - lo) / width) as usize).min(ESTIMATE_HISTOGRAM_BINS - 1);
        bins[b] += 1;
    }
    let (best, count) = bins
        .iter()
        .enumerate()
        .fold((0, 0), |acc, (i, &c)| if c > acc.1 { (i, c) } else { acc });
    (count > 0).then(|| lo + (best as f64 + 0.5) * width)
}

#[inline]
fn sq_dist(i: usize, j: usize, x: f64, y: f64) -> f64 {
    let dx = i as f64 - x;
    let dy = j as f64 - y;
    dx * dx + dy * dy
}
