//! Anchor-point selection for cross-correlation.
//!
//! Anchors are detected objects, ranked by distance to the frame centre and
//! kept only when far enough from the edges for the correlation windows to
//! fit. When a frame yields too few anchors the search escalates through
//! [`ANCHOR_LADDER`]: first the raw frame, then a smoothed copy at
//! progressively lower thresholds.

use super::points::{PointList, SortOrder};
use crate::error::{ReductionError, Result};
use crate::image_proc::detection::detect_kappa_sigma;
use crate::image_proc::filters::{apply_filter, ImageFilter};
use crate::image_proc::image::Image;

/// Detection kappa used when a non-positive value is given.
pub const DEFAULT_SIGMA_THRESHOLD: f64 = 2.0;

/// Anchor count bounds used when a value below 1 is given.
pub const DEFAULT_MIN_POINTS: usize = 1;
pub const DEFAULT_MAX_POINTS: usize = 100;

/// One rung of the anchor search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorAttempt {
    /// Blur the frame with a 5×5 mean before detecting
    pub smooth: bool,
    /// The detection kappa is divided by this
    pub sigma_divisor: f64,
}

/// Escalation order for [`select_anchor_points_with_ladder`].
pub const ANCHOR_LADDER: [AnchorAttempt; 4] = [
    AnchorAttempt {
        smooth: false,
        sigma_divisor: 1.0,
    },
    AnchorAttempt {
        smooth: true,
        sigma_divisor: 1.0,
    },
    AnchorAttempt {
        smooth: true,
        sigma_divisor: 2.0,
    },
    AnchorAttempt {
        smooth: true,
        sigma_divisor: 5.0,
    },
];

/// Whether `(x, y)` keeps `edge` pixels from every side of a `size` frame.
pub(crate) fn within_edges(x: f64, y: f64, size: (usize, usize), edge: (usize, usize)) -> bool {
    let x_max = size.0.checked_sub(edge.0);
    let y_max = size.1.checked_sub(edge.1);
    let (Some(x_max), Some(y_max)) = (x_max, y_max) else {
        return false;
    };
    x >= edge.0 as f64 && x <= x_max as f64 && y >= edge.1 as f64 && y <= y_max as f64
}

/// Detect objects and keep those usable as correlation anchors.
///
/// Points are ordered by increasing squared distance to the frame centre
/// (stored in `z`) and kept when the centroid satisfies
/// `edge_x <= x <= width - edge_x` and likewise in y. At most `max_points`
/// are returned.
///
/// # Errors
/// `InvalidArgument` when an edge exceeds half the frame,
/// `InsufficientAnchorPoints` when fewer than `min_points` survive.
pub fn select_anchor_points(
    image: &Image,
    edge_x: usize,
    edge_y: usize,
    sigma: f64,
    min_points: usize,
    max_points: usize,
) -> Result<PointList> {
    let (w, h) = (image.width(), image.height());
    if edge_x > w / 2 || edge_y > h / 2 {
        return Err(ReductionError::invalid(format!(
            "edge margins ({edge_x}, {edge_y}) exceed half of the {} frame",
            image.size()
        )));
    }
    let sigma = if sigma <= 0.0 {
        DEFAULT_SIGMA_THRESHOLD
    } else {
        sigma
    };
    let min_points = if min_points < 1 {
        DEFAULT_MIN_POINTS
    } else {
        min_points
    };
    let max_points = if max_points < 1 {
        DEFAULT_MAX_POINTS
    } else {
        max_points
    };

    let detected = detect_kappa_sigma(image, sigma, false)?;
    let (cx, cy) = ((w / 2) as f64, (h / 2) as f64);
    let mut points: PointList = detected
        .objects
        .iter()
        .map(|obj| {
            let (x, y) = obj.centroid;
            (x, y, (x - cx).powi(2) + (y - cy).powi(2))
        })
        .collect();
    points.sort_by_z(SortOrder::Ascending);
    points.retain(|&(x, y, _)| within_edges(x, y, (w, h), (edge_x, edge_y)));

    if points.len() < min_points {
        return Err(ReductionError::InsufficientAnchorPoints {
            found: points.len(),
            required: min_points,
            attempts: 1,
        });
    }
    points.truncate(max_points);
    log::debug!("{} anchor point(s) selected", points.len());
    Ok(points)
}

/// Walk [`ANCHOR_LADDER`] until one attempt yields enough anchors.
///
/// Returns the anchors and the 1-based rung that produced them.
pub fn select_anchor_points_with_ladder(
    image: &Image,
    edge_x: usize,
    edge_y: usize,
    sigma: f64,
    min_points: usize,
    max_points: usize,
) -> Result<(PointList, usize)> {
    let sigma = if sigma <= 0.0 {
        DEFAULT_SIGMA_THRESHOLD
    } else {
        sigma
    };
    let mut smoothed: Option<Image> = None;
    let mut best_found = 0;
    let mut required = min_points.max(DEFAULT_MIN_POINTS);

    for (rung, attempt) in ANCHOR_LADDER.iter().enumerate() {
        let frame: &Image = if attempt.smooth {
            smoothed.get_or_insert_with(|| apply_filter(image, ImageFilter::Mean5))
        } else {
            image
        };
        let kappa = sigma / attempt.sigma_divisor;
        match select_anchor_points(frame, edge_x, edge_y, kappa, min_points, max_points) {
            Ok(points) => {
                if rung > 0 {
                    log::info!("anchor points found on attempt {} (kappa {kappa})", rung + 1);
                }
                return Ok((points, rung + 1));
            }
            Err(ReductionError::InsufficientAnchorPoints {
                found,
                required: r,
                ..
            }) => {
                log::debug!("anchor attempt {}: {found} of {r} point(s)", rung + 1);
                best_found = best_found.max(found);
                required = r;
            }
            Err(e) => return Err(e),
        }
    }

    Err(ReductionError::InsufficientAnchorPoints {
        found: best_found,
        required,
        attempts: ANCHOR_LADDER.len(),
    })
}
