//! Photometric zero point from a standard-star sequence.
//!
//! The star is found on the first plane, followed through every plane with
//! the measured offsets and measured by disk photometry. Each positive flux
//! gives `zp = mag + 2.5 log10(flux / dit)`; the result is their mean.

use super::mode::{AcquisitionMode, ModeTable};
use crate::algo::stats;
use crate::config::JsonConfig;
use crate::error::{ReductionError, Result};
use crate::image_proc::cube::Cube;
use crate::image_proc::detection::config::check_radii;
use crate::image_proc::detection::refine::profile_fwhm;
use crate::image_proc::detection::{detect_kappa_sigma, Fwhm};
use crate::image_proc::image::Image;
use crate::image_proc::photometry::{disk_background, disk_flux, locate_peak, BackgroundMethod};
use crate::progress::Progress;
use crate::registration::anchors::within_edges;
use crate::registration::{
    blind_offsets, estimate_cube_offsets, select_anchor_points_with_ladder, PlaneOffset,
    XcorrConfig,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Kappa for finding the star on the first plane.
pub const STAR_DETECTION_KAPPA: f64 = 5.0;
/// Kappa for the retry on the negatives-clamped plane.
pub const STAR_FALLBACK_KAPPA: f64 = 1.0;
/// The star is expected this many pixels above the frame centre.
pub const STAR_OFFSET_ABOVE_CENTER: usize = 10;

/// Zero-point recipe parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroPointConfig {
    /// Catalogue magnitude of the standard star
    pub star_magnitude: f64,
    /// Detector integration time in seconds
    pub dit: f64,
    /// Explicit acquisition mode; resolved from the fields below when unset
    pub mode: Option<AcquisitionMode>,
    pub template_id: Option<String>,
    pub chopping_status: Option<String>,
    /// Known per-plane offsets; measured by cross-correlation when unset
    pub offsets: Option<Vec<(f64, f64)>>,
    /// Seed the cross-correlation with blind FFT offsets
    pub blind_guess: bool,
    /// Half-size of the peak search box around the predicted position
    pub locate_half_size: (usize, usize),
    pub star_radius: f64,
    pub background_inner: f64,
    pub background_outer: f64,
    pub xcorr: XcorrConfig,
}

impl Default for ZeroPointConfig {
    fn default() -> Self {
        Self {
            star_magnitude: 0.0,
            dit: 1.0,
            mode: None,
            template_id: None,
            chopping_status: None,
            offsets: None,
            blind_guess: false,
            locate_half_size: (20, 20),
            star_radius: 30.0,
            background_inner: 40.0,
            background_outer: 60.0,
            xcorr: XcorrConfig::default(),
        }
    }
}

impl JsonConfig for ZeroPointConfig {}

impl ZeroPointConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dit <= 0.0 {
            return Err(ReductionError::invalid(format!(
                "integration time must be positive, got {}",
                self.dit
            )));
        }
        if self.locate_half_size.0 < 1 || self.locate_half_size.1 < 1 {
            return Err(ReductionError::invalid("peak search half-size must be at least 1"));
        }
        check_radii(self.star_radius, self.background_inner, self.background_outer)
    }

    /// Explicit mode, else the template lookup, else the chopping flag.
    pub fn resolve_mode(&self, table: &ModeTable) -> Result<AcquisitionMode> {
        self.mode
            .or_else(|| self.template_id.as_deref().and_then(|t| table.resolve(t)))
            .or_else(|| {
                self.chopping_status
                    .as_deref()
                    .and_then(AcquisitionMode::from_chopping_status)
            })
            .ok_or_else(|| ReductionError::invalid("cannot determine the acquisition mode"))
    }
}

/// Photometry of the star on one plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaneMeasurement {
    pub plane: usize,
    /// Located peak `(x, y)`
    pub position: (usize, usize),
    pub fwhm: Option<Fwhm>,
    pub background: f64,
    pub flux: f64,
    /// `None` for a non-positive flux
    pub zero_point: Option<f64>,
}

/// Outcome of [`zero_point`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZeroPointResult {
    pub mode: AcquisitionMode,
    /// Star position on the first plane
    pub star: (usize, usize),
    /// Offsets of the measured planes
    pub offsets: Vec<PlaneOffset>,
    /// One entry per measured plane; `None` where the star was not measured
    pub measurements: Vec<Option<PlaneMeasurement>>,
    pub zero_point: f64,
    pub rms: f64,
    /// Number of values averaged into `zero_point`
    pub used: usize,
    pub flux_median: f64,
}

/// Run the zero-point recipe on a standard-star cube.
///
/// In [`AcquisitionMode::NoChop`] consecutive planes are first differenced
/// into `2n - 2` sky-free planes, and the highest and lowest zero points are
/// dropped when more than two remain.
///
/// # Errors
/// Configuration errors as `InvalidArgument`, anchor failures from the
/// offset estimation, `NoValidMeasurement` when no star or no positive flux
/// is found.
pub fn zero_point(
    cube: &Cube,
    config: &ZeroPointConfig,
    progress: &dyn Progress,
) -> Result<ZeroPointResult> {
    config.validate()?;
    if cube.is_empty() {
        return Err(ReductionError::invalid("zero point of an empty cube"));
    }
    let mode = config.resolve_mode(&ModeTable::default())?;
    log::info!("zero point on {} plane(s) in {mode} mode", cube.len());

    let offsets = plane_offsets(cube, config, progress)?;
    let (work, offsets): (Cow<Cube>, Vec<PlaneOffset>) = match mode {
        AcquisitionMode::Chop => (Cow::Borrowed(cube), offsets),
        AcquisitionMode::NoChop => {
            let (diff, offs) = difference_pairs(cube, &offsets)?;
            (Cow::Owned(diff), offs)
        }
    };

    let star = locate_star(work.plane(0), &config.xcorr)?;
    log::info!("standard star at ({}, {}) on the first plane", star.0, star.1);

    progress.begin("zero point photometry", work.len());
    let measurements: Vec<Option<PlaneMeasurement>> = work
        .planes()
        .par_iter()
        .zip(offsets.par_iter())
        .enumerate()
        .map(|(i, (plane, offset))| {
            let m = measure_plane(i, plane, star, offset, config);
            progress.advance();
            m
        })
        .collect();
    progress.finish();

    let mut zps: Vec<f64> = measurements
        .iter()
        .flatten()
        .filter_map(|m| m.zero_point)
        .collect();
    if mode == AcquisitionMode::NoChop && zps.len() > 2 {
        zps.sort_by(f64::total_cmp);
        zps = zps[1..zps.len() - 1].to_vec();
    }
    if zps.is_empty() {
        return Err(ReductionError::NoValidMeasurement(
            "no positive flux measured on the standard star".into(),
        ));
    }
    let zero_point = stats::mean(&zps);
    let rms = stats::rms(&zps);
    let fluxes: Vec<f64> = measurements.iter().flatten().map(|m| m.flux).collect();
    let flux_median = stats::median(&fluxes);
    log::info!(
        "zero point {zero_point:.3} ± {rms:.3} from {} measurement(s)",
        zps.len()
    );

    Ok(ZeroPointResult {
        mode,
        star,
        offsets,
        measurements,
        zero_point,
        rms,
        used: zps.len(),
        flux_median,
    })
}

fn plane_offsets(
    cube: &Cube,
    config: &ZeroPointConfig,
    progress: &dyn Progress,
) -> Result<Vec<PlaneOffset>> {
    if let Some(known) = &config.offsets {
        if known.len() != cube.len() {
            return Err(ReductionError::ShapeMismatch {
                expected: format!("{} offsets", cube.len()),
                actual: format!("{} offsets", known.len()),
            });
        }
        return Ok(known.iter().map(|&(dx, dy)| PlaneOffset::known(dx, dy)).collect());
    }

    let xcorr = &config.xcorr;
    let reference = cube.plane(0);
    let guesses = if config.blind_guess {
        Some(blind_offsets(cube)?)
    } else {
        None
    };
    let (edge_x, edge_y) = xcorr.edge_margin();
    let (anchors, _) = select_anchor_points_with_ladder(
        reference,
        edge_x,
        edge_y,
        xcorr.sigma,
        xcorr.min_points,
        xcorr.max_points,
    )?;
    estimate_cube_offsets(cube, reference, guesses.as_deref(), &anchors, xcorr, progress)
}

/// Sky-free planes from consecutive differences.
///
/// Inner planes give two differences (with the previous and the next plane),
/// the first and last planes one each, and every difference inherits the
/// offset of the plane it was built around.
pub fn difference_pairs(
    cube: &Cube,
    offsets: &[PlaneOffset],
) -> Result<(Cube, Vec<PlaneOffset>)> {
    let n = cube.len();
    if n < 2 {
        return Err(ReductionError::invalid("differencing needs at least two planes"));
    }
    if offsets.len() != n {
        return Err(ReductionError::ShapeMismatch {
            expected: format!("{n} offsets"),
            actual: format!("{} offsets", offsets.len()),
        });
    }
    let mut planes = Vec::with_capacity(2 * n - 2);
    let mut offs = Vec::with_capacity(2 * n - 2);
    for i in 0..n {
        let partners = if i == 0 {
            vec![1]
        } else if i == n - 1 {
            vec![n - 2]
        } else {
            vec![i - 1, i + 1]
        };
        for j in partners {
            let mut diff: Image = cube.plane(i).clone();
            diff.sub_image(cube.plane(j))?;
            planes.push(diff);
            offs.push(offsets[i]);
        }
    }
    Ok((Cube::from_planes(planes)?, offs))
}

/// Detected star closest to just above the frame centre, kept clear of the
/// correlation margins.
fn locate_star(plane: &Image, xcorr: &XcorrConfig) -> Result<(usize, usize)> {
    let mut detected = detect_kappa_sigma(plane, STAR_DETECTION_KAPPA, false)?;
    if detected.is_empty() {
        log::warn!("no star found, retrying with negative values clamped");
        let mut clamped = plane.clone();
        clamped.threshold_low(0.0);
        detected = detect_kappa_sigma(&clamped, STAR_FALLBACK_KAPPA, false)?;
    }
    if detected.is_empty() {
        return Err(ReductionError::NoValidMeasurement(
            "no star found in the first plane".into(),
        ));
    }

    let size = (plane.width(), plane.height());
    let centroids = detected.objects.iter().map(|obj| obj.centroid);
    let (x, y) = closest_to_target(centroids, size, xcorr.edge_margin()).ok_or_else(|| {
        ReductionError::NoValidMeasurement("no star far enough from the frame edges".into())
    })?;
    Ok((x.round() as usize, y.round() as usize))
}

/// Centroid nearest `(W/2, H/2 + 10)` among those clear of `edge`; the first
/// one wins on ties.
fn closest_to_target(
    centroids: impl Iterator<Item = (f64, f64)>,
    size: (usize, usize),
    edge: (usize, usize),
) -> Option<(f64, f64)> {
    let target = (
        (size.0 / 2) as f64,
        (size.1 / 2) as f64 + STAR_OFFSET_ABOVE_CENTER as f64,
    );
    let mut best: Option<((f64, f64), f64)> = None;
    for (x, y) in centroids {
        if !within_edges(x, y, size, edge) {
            continue;
        }
        let d = (x - target.0).powi(2) + (y - target.1).powi(2);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some(((x, y), d));
        }
    }
    best.map(|(p, _)| p)
}

fn measure_plane(
    index: usize,
    plane: &Image,
    star: (usize, usize),
    offset: &PlaneOffset,
    config: &ZeroPointConfig,
) -> Option<PlaneMeasurement> {
    if !offset.is_valid() {
        log::warn!("plane {}: no valid offset, star not measured", index + 1);
        return None;
    }
    let sx = star.0 as i64 + offset.dx.round() as i64;
    let sy = star.1 as i64 + offset.dy.round() as i64;
    if sx < 0 || sy < 0 {
        log::warn!("plane {}: predicted star position off the frame", index + 1);
        return None;
    }
    let (hx, hy) = config.locate_half_size;
    let (px, py) = match locate_peak(plane, sx as usize, sy as usize, hx, hy) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("plane {}: {e}", index + 1);
            return None;
        }
    };
    let (x, y) = (px as f64, py as f64);

    let background = match disk_background(
        plane,
        x,
        y,
        config.background_inner,
        config.background_outer,
        BackgroundMethod::Median,
    ) {
        Ok(Some(b)) => b,
        Ok(None) => {
            log::warn!("plane {}: background annulus too small, using 0", index + 1);
            0.0
        }
        Err(e) => {
            log::warn!("plane {}: {e}", index + 1);
            return None;
        }
    };
    let flux = disk_flux(plane, x, y, config.star_radius, background).ok()?;
    let zero_point =
        (flux > 0.0).then(|| config.star_magnitude + 2.5 * (flux / config.dit).log10());
    log::debug!(
        "plane {}: star at ({px}, {py}), background {background:.2}, flux {flux:.1}",
        index + 1
    );

    Some(PlaneMeasurement {
        plane: index,
        position: (px, py),
        fwhm: profile_fwhm(plane, px, py),
        background,
        flux,
        zero_point,
    })
}
