//! Thresholding and connected-component labelling.
//!
//! Two ways to pick a detection threshold are provided:
//!
//! - [`kappa_sigma_threshold`]: median plus `kappa` times the mean absolute
//!   deviation around the median
//! - [`mode_threshold`]: histogram mode plus twice the mean absolute
//!   deviation around the mode
//!
//! and [`label_components`] turns a binary mask into labelled 4-connected
//! regions.

use crate::algo::stats;
use crate::image_proc::image::Image;
use ndarray::{Array2, ArrayView2};

/// `median + kappa · mean|p - median|` over all pixels.
pub fn kappa_sigma_threshold(image: &Image, kappa: f64) -> f64 {
    let pixels = image.pixels();
    let median = stats::median(&pixels);
    median + kappa * stats::mean_abs_deviation(&pixels, median)
}

/// Mode of the pixel histogram.
///
/// Uses as many bins as the image is wide, spanning `[min, max]`. The first
/// most populated bin wins and its lower edge is returned.
pub fn histogram_mode(image: &Image) -> f64 {
    let (min, max) = image.min_max();
    let nbins = image.width().max(1);
    if !(max > min) {
        return min;
    }
    let bin_size = (max - min) / nbins as f64;
    let mut histogram = vec![0usize; nbins];
    for v in image.view().iter() {
        let bin = ((v - min) / bin_size) as usize;
        histogram[bin.min(nbins - 1)] += 1;
    }
    let (mode_bin, _) = histogram
        .iter()
        .enumerate()
        .fold((0, 0), |best, (i, &c)| if c > best.1 { (i, c) } else { best });
    min + (max - min) * mode_bin as f64 / nbins as f64
}

/// `mode + 2 · mean|p - mode|`.
pub fn mode_threshold(image: &Image) -> f64 {
    let mode = histogram_mode(image);
    mode + 2.0 * stats::mean_abs_deviation(&image.pixels(), mode)
}

/// Label 4-connected regions of a binary mask.
///
/// Uses an explicit stack rather than recursion so large regions cannot
/// overflow the call stack. Labels start at 1 and follow the raster order
/// (row by row) of each region's first pixel; background is 0.
///
/// # Returns
/// The label image and the number of regions.
pub fn label_components(mask: ArrayView2<bool>) -> (Array2<u32>, u32) {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut count = 0u32;
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if !mask[[row, col]] || labels[[row, col]] != 0 {
                continue;
            }
            count += 1;
            labels[[row, col]] = count;
            stack.push((row, col));

            while let Some((y, x)) = stack.pop() {
                let neighbours = [
                    (y > 0).then(|| (y - 1, x)),
                    (y + 1 < rows).then(|| (y + 1, x)),
                    (x > 0).then(|| (y, x - 1)),
                    (x + 1 < cols).then(|| (y, x + 1)),
                ];
                for (ny, nx) in neighbours.into_iter().flatten() {
                    if mask[[ny, nx]] && labels[[ny, nx]] == 0 {
                        labels[[ny, nx]] = count;
                        stack.push((ny, nx));
                    }
                }
            }
        }
    }

    (labels, count)
}
