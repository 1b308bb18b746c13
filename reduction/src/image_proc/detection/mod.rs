//! Point-source detection on single frames.
//!
//! Two detectors produce a [`DetectedSet`]:
//!
//! - [`detect_kappa_sigma`]: threshold at `median + kappa · MAD`, clean the
//!   mask with a morphological opening and label 4-connected regions
//! - [`detect_square_filter`]: combine a median-filtered map and a local
//!   standard-deviation map, each thresholded around its histogram mode
//!
//! The refinement stages in [`refine`] then add fine positions, FWHM and
//! aperture photometry as optional per-object columns.
//!
//! # Usage
//!
//! ```rust
//! use reduction::image_proc::detection::detect_kappa_sigma;
//! use reduction::Image;
//!
//! let mut image = Image::new(64, 64);
//! for y in 20..24 {
//!     for x in 20..24 {
//!         image.set(x, y, 100.0);
//!     }
//! }
//! let set = detect_kappa_sigma(&image, 2.0, false).unwrap();
//! assert_eq!(set.len(), 1);
//! assert_eq!(set.objects[0].npix, 16);
//! ```

pub mod aabb;
pub mod config;
pub mod refine;

pub use aabb::AABB;
pub use config::{DetectionConfig, DetectorKind};
pub use refine::{compute_fwhm, compute_image_quality, compute_photometry, fine_position};

use crate::algo::stats;
use crate::error::Result;
use crate::image_proc::filters::{self, ImageFilter};
use crate::image_proc::image::Image;
use crate::image_proc::pixelmap::PixelMap;
use crate::image_proc::thresholding::{kappa_sigma_threshold, label_components, mode_threshold};
use crate::registration::points::PointList;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Statistics of one labelled region.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStats {
    /// Label in the connected-component image
    pub label: u32,
    pub npix: usize,
    /// Intensity-weighted centroid `(x, y)`
    pub centroid: (f64, f64),
    /// Extreme pixels, first hit in raster order
    pub bottom: (usize, usize),
    pub top: (usize, usize),
    pub left: (usize, usize),
    pub right: (usize, usize),
    pub bbox: AABB,
    pub min_value: f64,
    pub min_pos: (usize, usize),
    pub max_value: f64,
    pub max_pos: (usize, usize),
    pub flux: f64,
    pub mean: f64,
    pub stdev: f64,
    pub median: f64,
}

/// Full width at half maximum along x and y, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fwhm {
    pub x: f64,
    pub y: f64,
}

impl Fwhm {
    pub fn mean(&self) -> f64 {
        0.5 * (self.x + self.y)
    }
}

/// Aperture photometry result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aperture {
    /// Background-subtracted flux inside the star radius
    pub flux: f64,
    /// Per-pixel background level
    pub background: f64,
}

/// What to put in the `z` slot of [`DetectedSet::to_point_list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZValue {
    Flux,
    Peak,
    Npix,
}

/// Objects found on one frame plus optional refinement columns.
///
/// A column is either `None` (stage not run) or holds exactly one entry per
/// object, with `None` entries where the stage failed for that object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedSet {
    pub objects: Vec<ObjectStats>,
    pub fine_positions: Option<Vec<Option<(f64, f64)>>>,
    pub fwhm: Option<Vec<Option<Fwhm>>>,
    pub median_fwhm: Option<Fwhm>,
    pub photometry: Option<Vec<Option<Aperture>>>,
}

impl DetectedSet {
    pub fn from_objects(objects: Vec<ObjectStats>) -> Self {
        Self {
            objects,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// No object was found.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Best known position: the fine position when available, otherwise the
    /// raw centroid.
    pub fn position(&self, i: usize) -> (f64, f64) {
        self.fine_positions
            .as_ref()
            .and_then(|col| col.get(i).copied().flatten())
            .unwrap_or(self.objects[i].centroid)
    }

    pub fn to_point_list(&self, z: ZValue) -> PointList {
        let mut list = PointList::with_capacity(self.len());
        for (i, obj) in self.objects.iter().enumerate() {
            let (x, y) = self.position(i);
            let zv = match z {
                ZValue::Flux => obj.flux,
                ZValue::Peak => obj.max_value,
                ZValue::Npix => obj.npix as f64,
            };
            list.push(x, y, zv);
        }
        list
    }

    /// Positions of the `n` objects with the largest summed flux, brightest
    /// first.
    pub fn brightest(&self, n: usize) -> PointList {
        let mut list = self.to_point_list(ZValue::Flux);
        list.sort_by_z(crate::registration::points::SortOrder::Descending);
        list.truncate(n);
        list
    }
}

/// Kappa-sigma detection.
///
/// A negative `kappa` selects [`config::DEFAULT_KAPPA`]. With `smear` the
/// threshold and mask are computed on a 5×5 mean-filtered copy; statistics
/// always use the original pixels.
pub fn detect_kappa_sigma(image: &Image, kappa: f64, smear: bool) -> Result<DetectedSet> {
    let kappa = if kappa < 0.0 {
        config::DEFAULT_KAPPA
    } else {
        kappa
    };
    let smeared;
    let work = if smear {
        smeared = filters::apply_filter(image, ImageFilter::Mean5);
        &smeared
    } else {
        image
    };

    let threshold = kappa_sigma_threshold(work, kappa);
    log::debug!("kappa-sigma threshold {threshold:.4} (kappa {kappa})");
    let map = PixelMap::threshold_above(work, threshold).opening();
    let (labels, count) = label_components(map.view());
    let set = DetectedSet::from_objects(object_stats(image, &labels, count));
    log::debug!("kappa-sigma detection found {} objects", set.len());
    Ok(set)
}

/// Square-filter detection.
///
/// Half-sizes below 1 select [`config::DEFAULT_SQUARE_HALF_SIZE`].
/// Statistics are taken on the 3×3 median-filtered frame.
pub fn detect_square_filter(image: &Image, hx: usize, hy: usize) -> Result<DetectedSet> {
    let hx = if hx < 1 {
        config::DEFAULT_SQUARE_HALF_SIZE
    } else {
        hx
    };
    let hy = if hy < 1 {
        config::DEFAULT_SQUARE_HALF_SIZE
    } else {
        hy
    };

    let median = filters::median_3x3(image);
    let stdev = filters::local_stdev(&median, hx, hy)?;

    let median_map = PixelMap::threshold_above(&median, mode_threshold(&median));
    let stdev_map = PixelMap::threshold_above(&stdev, mode_threshold(&stdev));
    let map = median_map.and(&stdev_map).opening();

    let (labels, count) = label_components(map.view());
    let set = DetectedSet::from_objects(object_stats(&median, &labels, count));
    log::debug!("square-filter detection found {} objects", set.len());
    Ok(set)
}

/// Run the detector selected in `config`.
pub fn detect(image: &Image, config: &DetectionConfig) -> Result<DetectedSet> {
    match config.detector {
        DetectorKind::KappaSigma => detect_kappa_sigma(image, config.kappa, config.smear),
        DetectorKind::SquareFilter => {
            detect_square_filter(image, config.square_half_x, config.square_half_y)
        }
    }
}

/// Compute [`ObjectStats`] for labels `1..=count` over `image`.
pub fn object_stats(image: &Image, labels: &Array2<u32>, count: u32) -> Vec<ObjectStats> {
    let mut members: Vec<Vec<(usize, usize)>> = vec![Vec::new(); count as usize];
    for ((y, x), &label) in labels.indexed_iter() {
        if label > 0 {
            members[(label - 1) as usize].push((x, y));
        }
    }
    members
        .iter()
        .enumerate()
        .filter(|(_, pixels)| !pixels.is_empty())
        .map(|(i, pixels)| region_stats(image, (i + 1) as u32, pixels))
        .collect()
}

/// Statistics for one region; `pixels` must be in raster order.
fn region_stats(image: &Image, label: u32, pixels: &[(usize, usize)]) -> ObjectStats {
    let values: Vec<f64> = pixels.iter().map(|&(x, y)| image.get(x, y)).collect();
    let n = pixels.len();

    let mut bbox = AABB::new();
    let (mut bottom, mut top, mut left, mut right) = (pixels[0], pixels[0], pixels[0], pixels[0]);
    let (mut min_value, mut min_pos) = (values[0], pixels[0]);
    let (mut max_value, mut max_pos) = (values[0], pixels[0]);
    for (&(x, y), &v) in pixels.iter().zip(&values) {
        bbox.expand_to_include(x, y);
        if y < bottom.1 {
            bottom = (x, y);
        }
        if y > top.1 {
            top = (x, y);
        }
        if x < left.0 {
            left = (x, y);
        }
        if x > right.0 {
            right = (x, y);
        }
        if v < min_value {
            min_value = v;
            min_pos = (x, y);
        }
        if v > max_value {
            max_value = v;
            max_pos = (x, y);
        }
    }

    let flux: f64 = values.iter().sum();
    let (mut sw, mut swx, mut swy) = (0.0, 0.0, 0.0);
    for (&(x, y), &v) in pixels.iter().zip(&values) {
        let w = v - min_value;
        sw += w;
        swx += w * x as f64;
        swy += w * y as f64;
    }
    let centroid = if sw.abs() > 1e-10 {
        (swx / sw, swy / sw)
    } else {
        let (sx, sy) = pixels
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
        (sx / n as f64, sy / n as f64)
    };

    ObjectStats {
        label,
        npix: n,
        centroid,
        bottom,
        top,
        left,
        right,
        bbox,
        min_value,
        min_pos,
        max_value,
        max_pos,
        flux,
        mean: flux / n as f64,
        stdev: stats::rms(&values),
        median: stats::median(&values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use shared::synthetic::{SyntheticFrame, SyntheticStar};
    use shared::ImageSize;

    fn two_star_frame() -> Image {
        let data = SyntheticFrame::new(ImageSize::from_width_height(96, 64))
            .with_background(10.0)
            .with_noise(1.0, 7)
            .with_star(SyntheticStar::new(25.3, 30.6, 400.0, 2.0))
            .with_star(SyntheticStar::new(70.8, 20.2, 250.0, 2.0))
            .render();
        Image::from_array(data)
    }

    #[test]
    fn test_two_blobs() {
        let image = two_star_frame();
        let set = detect_kappa_sigma(&image, 5.0, false).unwrap();
        assert_eq!(set.len(), 2);
        let mut centroids: Vec<_> = set.objects.iter().map(|o| o.centroid).collect();
        centroids.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert_abs_diff_eq!(centroids[0].0, 25.3, epsilon = 0.5);
        assert_abs_diff_eq!(centroids[0].1, 30.6, epsilon = 0.5);
        assert_abs_diff_eq!(centroids[1].0, 70.8, epsilon = 0.5);
        assert_abs_diff_eq!(centroids[1].1, 20.2, epsilon = 0.5);
    }

    #[test]
    fn test_empty_frame_is_ok() {
        let image = Image::from_fn(32, 32, |_, _| 3.0);
        let set = detect_kappa_sigma(&image, -1.0, true).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.brightest(5).len(), 0);
    }

    #[test]
    fn test_hot_pixel_rejected() {
        let mut image = Image::new(32, 32);
        image.set(10, 10, 1000.0);
        assert!(detect_kappa_sigma(&image, 2.0, false).unwrap().is_empty());
    }

    #[test]
    fn test_region_stats() {
        let mut image = Image::new(16, 16);
        let block = [(4, 4, 1.0), (5, 4, 3.0), (4, 5, 3.0), (5, 5, 5.0), (6, 5, 1.0)];
        let mut labels = Array2::<u32>::zeros((16, 16));
        for &(x, y, v) in &block {
            image.set(x, y, v);
            labels[[y, x]] = 1;
        }
        let objects = object_stats(&image, &labels, 1);
        assert_eq!(objects.len(), 1);
        let obj = &objects[0];
        assert_eq!(obj.npix, 5);
        assert_eq!(obj.max_pos, (5, 5));
        assert_eq!(obj.min_pos, (4, 4));
        assert_eq!(obj.bottom, (4, 4));
        assert_eq!(obj.top, (4, 5));
        assert_eq!(obj.right, (6, 5));
        assert_eq!(obj.median, 3.0);
        assert_eq!(obj.bbox, AABB::from_coords(4, 4, 6, 5));
        // weights 0,2,2,4,0 -> x = (10 + 8 + 20) / 8, y = (8 + 10 + 20) / 8
        assert_abs_diff_eq!(obj.centroid.0, 38.0 / 8.0);
        assert_abs_diff_eq!(obj.centroid.1, 38.0 / 8.0);
    }

    #[test]
    fn test_flat_region_uses_geometric_centroid() {
        let image = Image::from_fn(8, 8, |_, _| 2.0);
        let mut labels = Array2::<u32>::zeros((8, 8));
        labels[[1, 1]] = 1;
        labels[[1, 2]] = 1;
        let objects = object_stats(&image, &labels, 1);
        assert_eq!(objects[0].centroid, (1.5, 1.0));
        assert_eq!(objects[0].stdev, 0.0);
    }

    #[test]
    fn test_square_filter_finds_extended_source() {
        let data = SyntheticFrame::new(ImageSize::from_width_height(80, 80))
            .with_background(5.0)
            .with_noise(0.5, 11)
            .with_star(SyntheticStar::new(40.0, 40.0, 300.0, 3.0))
            .render();
        let image = Image::from_array(data);
        let set = detect_square_filter(&image, 3, 3).unwrap();
        assert!(!set.is_empty());
        let brightest = set.brightest(1);
        assert_abs_diff_eq!(brightest.get(0).0, 40.0, epsilon = 1.5);
        assert_abs_diff_eq!(brightest.get(0).1, 40.0, epsilon = 1.5);
    }

    #[test]
    fn test_square_filter_ignores_hot_pixel() {
        // flat plateau: the stdev map is zero inside it, so only a hot pixel
        // surviving into that map could grow the footprint
        let plateau = |x: usize, y: usize| {
            if (20..40).contains(&x) && (20..40).contains(&y) {
                50.0
            } else {
                5.0
            }
        };
        let clean = Image::from_fn(60, 60, plateau);
        let mut hot = clean.clone();
        hot.set(30, 30, 5000.0);

        let expected = detect_square_filter(&clean, 3, 3).unwrap();
        assert!(!expected.is_empty());
        assert_eq!(detect_square_filter(&hot, 3, 3).unwrap(), expected);
    }

    #[test]
    fn test_position_prefers_fine() {
        let mut image = Image::new(16, 16);
        for (x, y) in [(4, 4), (5, 4), (4, 5), (5, 5)] {
            image.set(x, y, 10.0);
        }
        let mut labels = Array2::<u32>::zeros((16, 16));
        for (x, y) in [(4, 4), (5, 4), (4, 5), (5, 5)] {
            labels[[y, x]] = 1;
        }
        let mut set = DetectedSet::from_objects(object_stats(&image, &labels, 1));
        assert_eq!(set.position(0), (4.5, 4.5));
        set.fine_positions = Some(vec![Some((4.6, 4.4))]);
        assert_eq!(set.position(0), (4.6, 4.4));
        set.fine_positions = Some(vec![None]);
        assert_eq!(set.position(0), (4.5, 4.5));
    }
}
