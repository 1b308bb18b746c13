//! Offset measurement by exhaustive squared-difference search.
//!
//! For every anchor, a `(2·mw+1)×(2·mh+1)` window of the candidate is compared
//! with the reference at every integer displacement of a `(2·sw+1)×(2·sh+1)`
//! search grid. The best match is refined to sub-pixel precision with a
//! parabola through its neighbours, and the per-anchor measurements are
//! reduced to the one closest to their per-axis median.

use super::points::PointList;
use super::{PlaneOffset, XcorrConfig};
use crate::algo::stats;
use crate::error::{ReductionError, Result};
use crate::image_proc::cube::Cube;
use crate::image_proc::filters::median_3x3;
use crate::image_proc::image::Image;
use crate::progress::Progress;
use float_cmp::approx_eq;
use ndarray::ArrayView2;
use rayon::prelude::*;

/// Distance from the search boundary below which a result is treated as a
/// failed correlation.
const BOUNDARY_TOLERANCE: f64 = 1e-2;

/// Parabolic sub-pixel position of the minimum of `d1, d2, d3` sampled at
/// `-1, 0, +1`, clipped to `[-0.5, 0.5]`.
fn apodise(d1: f64, d2: f64, d3: f64) -> f64 {
    if approx_eq!(f64, d1, d2, epsilon = 1e-8) {
        return -0.5;
    }
    if approx_eq!(f64, d2, d3, epsilon = 1e-8) {
        return 0.5;
    }
    if approx_eq!(f64, d1, d3, epsilon = 1e-8) {
        return 0.0;
    }
    (0.5 * (d1 - d3) / (d1 - 2.0 * d2 + d3)).clamp(-0.5, 0.5)
}

/// Whether a window centred on `c` keeps `margin` pixels on both sides.
fn fits(c: i64, len: usize, margin: usize) -> bool {
    c >= margin as i64 && c + (margin as i64) < len as i64
}

/// Best local displacement `(k, l, distance)` of the reference around
/// `(ax, ay)` matching the candidate window at `(bx, by)`.
fn search_min(
    reference: &ArrayView2<f64>,
    candidate: &ArrayView2<f64>,
    (ax, ay): (usize, usize),
    (bx, by): (usize, usize),
    (sw, sh): (usize, usize),
    (mw, mh): (usize, usize),
) -> (f64, f64, f64) {
    let grid_w = 2 * sw + 1;
    let inv_area = 1.0 / ((2 * mw + 1) * (2 * mh + 1)) as f64;
    let mut distances = vec![0.0; grid_w * (2 * sh + 1)];
    let (mut best, mut k_min, mut l_min) = (f64::INFINITY, 0i64, 0i64);

    for l in -(sh as i64)..=sh as i64 {
        for k in -(sw as i64)..=sw as i64 {
            let mut sum = 0.0;
            for j in -(mh as i64)..=mh as i64 {
                let ry = (ay as i64 + l + j) as usize;
                let cy = (by as i64 + j) as usize;
                for i in -(mw as i64)..=mw as i64 {
                    let rx = (ax as i64 + k + i) as usize;
                    let cx = (bx as i64 + i) as usize;
                    let diff = reference[[ry, rx]] - candidate[[cy, cx]];
                    sum += diff * diff;
                }
            }
            let idx = (l + sh as i64) as usize * grid_w + (k + sw as i64) as usize;
            distances[idx] = sum * inv_area;
            if sum * inv_area < best {
                best = sum * inv_area;
                k_min = k;
                l_min = l;
            }
        }
    }

    let pos = (l_min + sh as i64) as usize * grid_w + (k_min + sw as i64) as usize;
    let inc_x = if k_min.unsigned_abs() as usize == sw {
        0.0
    } else {
        apodise(distances[pos - 1], distances[pos], distances[pos + 1])
    };
    let inc_y = if l_min.unsigned_abs() as usize == sh {
        0.0
    } else {
        apodise(distances[pos - grid_w], distances[pos], distances[pos + grid_w])
    };
    (k_min as f64 + inc_x, l_min as f64 + inc_y, best)
}

/// Displacement of `candidate` relative to `reference`.
///
/// `initial_guess` is truncated to whole pixels and centres the search.
/// Anchors whose windows would leave either frame are skipped. Returns
/// [`PlaneOffset::INVALID`] when no anchor is usable or when the result sits
/// on the search boundary.
pub fn estimate_offset(
    reference: &Image,
    candidate: &Image,
    initial_guess: (f64, f64),
    anchors: &PointList,
    search: (usize, usize),
    measure: (usize, usize),
) -> PlaneOffset {
    let defaults = XcorrConfig::default();
    let search = (
        if search.0 == 0 { defaults.search.0 } else { search.0 },
        if search.1 == 0 { defaults.search.1 } else { search.1 },
    );
    let (ix, iy) = (initial_guess.0.trunc() as i64, initial_guess.1.trunc() as i64);
    let (margin_x, margin_y) = (search.0 + measure.0, search.1 + measure.1);
    let ref_view = reference.view();
    let cand_view = candidate.view();

    let measurements: Vec<Option<(f64, f64, f64)>> = anchors
        .as_slice()
        .par_iter()
        .map(|&(x, y, _)| {
            let (ax, ay) = (x as i64, y as i64);
            let (bx, by) = (ax + ix, ay + iy);
            let usable = fits(ax, reference.width(), margin_x)
                && fits(ay, reference.height(), margin_y)
                && fits(bx, candidate.width(), margin_x)
                && fits(by, candidate.height(), margin_y);
            if !usable {
                return None;
            }
            let (k, l, distance) = search_min(
                &ref_view,
                &cand_view,
                (ax as usize, ay as usize),
                (bx as usize, by as usize),
                search,
                measure,
            );
            Some((k, l, distance))
        })
        .collect();

    let valid: Vec<(f64, f64, f64)> = measurements.into_iter().flatten().collect();
    let (k, l, quality) = match valid.len() {
        0 => {
            log::debug!("no anchor usable for correlation");
            return PlaneOffset::INVALID;
        }
        1 => valid[0],
        _ => {
            let med_k = stats::median(&valid.iter().map(|m| m.0).collect::<Vec<_>>());
            let med_l = stats::median(&valid.iter().map(|m| m.1).collect::<Vec<_>>());
            let mut best = 0;
            let mut best_diff = f64::INFINITY;
            for (i, m) in valid.iter().enumerate() {
                let diff = (m.0 - med_k).abs() + (m.1 - med_l).abs();
                if diff < best_diff {
                    best = i;
                    best_diff = diff;
                }
            }
            valid[best]
        }
    };

    if (k.abs() - search.0 as f64).abs() < BOUNDARY_TOLERANCE
        || (l.abs() - search.1 as f64).abs() < BOUNDARY_TOLERANCE
    {
        log::debug!("best match ({k}, {l}) on the search boundary");
        return PlaneOffset::INVALID;
    }
    PlaneOffset::new(ix as f64 - k, iy as f64 - l, quality)
}

/// Offsets of every plane of `cube` relative to `reference`.
///
/// Both the reference and each plane are 3×3 median filtered first.
/// `guesses`, when given, must hold one entry per plane. Planes that do not
/// correlate get [`PlaneOffset::INVALID`].
pub fn estimate_cube_offsets(
    cube: &Cube,
    reference: &Image,
    guesses: Option<&[(f64, f64)]>,
    anchors: &PointList,
    config: &XcorrConfig,
    progress: &dyn Progress,
) -> Result<Vec<PlaneOffset>> {
    if reference.size() != cube.size() {
        return Err(ReductionError::ShapeMismatch {
            expected: cube.size().to_string(),
            actual: reference.size().to_string(),
        });
    }
    if let Some(g) = guesses {
        if g.len() != cube.len() {
            return Err(ReductionError::ShapeMismatch {
                expected: format!("{} offset guesses", cube.len()),
                actual: format!("{} offset guesses", g.len()),
            });
        }
    }
    if anchors.is_empty() {
        return Err(ReductionError::InsufficientAnchorPoints {
            found: 0,
            required: config.min_points.max(1),
            attempts: 0,
        });
    }

    let filtered_ref = median_3x3(reference);
    progress.begin("cross-correlating", cube.len());
    let offsets: Vec<PlaneOffset> = cube
        .planes()
        .par_iter()
        .enumerate()
        .map(|(i, plane)| {
            let guess = guesses.map_or((0.0, 0.0), |g| g[i]);
            let filtered = median_3x3(plane);
            let offset =
                estimate_offset(&filtered_ref, &filtered, guess, anchors, config.search, config.measure);
            if !offset.is_valid() {
                log::warn!("plane {} does not correlate", i + 1);
            }
            progress.advance();
            offset
        })
        .collect();
    progress.finish();
    Ok(offsets)
}
