//! Filters that operate across the planes of a cube.
//!
//! The running min/max filter estimates the sky of each plane from its
//! temporal neighbours: for every pixel the neighbouring planes (after
//! removing their own median level) are sorted, the extremes rejected and the
//! rest averaged. Sources that move between planes (jittered or chopped
//! observations) fall into the rejected extremes.

use crate::algo::stats;
use crate::error::{ReductionError, Result};
use crate::image_proc::cube::Cube;
use crate::image_proc::filters::{apply_filter, ImageFilter};
use crate::image_proc::image::Image;
use crate::progress::Progress;
use ndarray::{Array2, Zip};
use rayon::prelude::*;

/// Sky-subtracted cube and the mean sky level removed from each plane.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyFiltered {
    pub cube: Cube,
    pub background: Vec<f64>,
}

/// Running min/max sky filter over a window of `2·halfwidth + 1` planes.
///
/// Output planes are `input - (rejected mean + plane median)`, with each
/// output plane's own median removed at the end.
pub fn runminmax_filter(
    cube: &Cube,
    halfwidth: usize,
    rej_min: usize,
    rej_max: usize,
    progress: &dyn Progress,
) -> Result<SkyFiltered> {
    check_window(cube, halfwidth, rej_min, rej_max, true)?;
    running_sky(cube, halfwidth, rej_min, rej_max, true, progress)
}

/// Like [`runminmax_filter`] but the plane being corrected is left out of
/// its own window.
pub fn runminmax_central_filter(
    cube: &Cube,
    halfwidth: usize,
    rej_min: usize,
    rej_max: usize,
    progress: &dyn Progress,
) -> Result<SkyFiltered> {
    check_window(cube, halfwidth, rej_min, rej_max, false)?;
    running_sky(cube, halfwidth, rej_min, rej_max, false, progress)
}

/// Run [`runminmax_filter`] independently on the four image quadrants.
///
/// Quadrants are pasted back in place; the background is the mean of the
/// four per-quadrant backgrounds.
pub fn runminmax_by_quadrant(
    cube: &Cube,
    halfwidth: usize,
    rej_min: usize,
    rej_max: usize,
    progress: &dyn Progress,
) -> Result<SkyFiltered> {
    check_window(cube, halfwidth, rej_min, rej_max, true)?;
    let (w, h) = (cube.width(), cube.height());
    if w < 2 || h < 2 {
        return Err(ReductionError::invalid(format!(
            "cannot split a {} cube into quadrants",
            cube.size()
        )));
    }
    let (hw, hh) = (w / 2, h / 2);
    // upper-left, upper-right, lower-right, lower-left with y growing upwards
    let quadrants = [
        (0, hh, hw - 1, h - 1),
        (hw, hh, w - 1, h - 1),
        (hw, 0, w - 1, hh - 1),
        (0, 0, hw - 1, hh - 1),
    ];

    let mut out = Cube::new(w, h, cube.len());
    let mut background = vec![0.0; cube.len()];
    for (q, &(x0, y0, x1, y1)) in quadrants.iter().enumerate() {
        log::debug!("sky filtering quadrant {q}");
        let sub = cube.extract(x0, y0, x1, y1)?;
        let filtered = running_sky(&sub, halfwidth, rej_min, rej_max, true, progress)?;
        out.paste(&filtered.cube, x0, y0)?;
        for (acc, b) in background.iter_mut().zip(&filtered.background) {
            *acc += b / quadrants.len() as f64;
        }
    }
    Ok(SkyFiltered { cube: out, background })
}

fn check_window(
    cube: &Cube,
    halfwidth: usize,
    rej_min: usize,
    rej_max: usize,
    include_centre: bool,
) -> Result<()> {
    let rejected = rej_min + rej_max;
    if halfwidth < 1 {
        return Err(ReductionError::invalid("running filter half-width must be at least 1"));
    }
    if rejected >= halfwidth {
        return Err(ReductionError::invalid(format!(
            "rejecting {rej_min}+{rej_max} planes needs a half-width above {rejected}, got {halfwidth}"
        )));
    }
    let usable = if include_centre {
        cube.len()
    } else {
        cube.len().saturating_sub(1)
    };
    if usable <= rejected {
        return Err(ReductionError::invalid(format!(
            "{} planes cannot survive rejecting {rejected} per pixel",
            cube.len()
        )));
    }
    Ok(())
}

fn running_sky(
    cube: &Cube,
    halfwidth: usize,
    rej_min: usize,
    rej_max: usize,
    include_centre: bool,
    progress: &dyn Progress,
) -> Result<SkyFiltered> {
    let n = cube.len();
    let medians: Vec<f64> = cube.planes().par_iter().map(Image::median).collect();
    progress.begin("running sky filter", n);

    let results: Vec<(Image, f64)> = (0..n)
        .into_par_iter()
        .map(|p| {
            let from = p.saturating_sub(halfwidth);
            let to = (p + halfwidth).min(n - 1);
            let window: Vec<usize> = (from..=to).filter(|&k| include_centre || k != p).collect();
            let input = cube.plane(p);
            let mut sky = Array2::zeros(input.view().dim());
            Zip::indexed(&mut sky).for_each(|(y, x), s| {
                let mut values: Vec<f64> = window
                    .iter()
                    .map(|&k| cube.plane(k).get(x, y) - medians[k])
                    .collect();
                let level = stats::rejected_mean(&mut values, rej_min, rej_max).unwrap_or(0.0);
                *s = level + medians[p];
            });
            let background = sky.mean().unwrap_or(0.0);
            let mut plane = Image::from_array(input.view().to_owned() - &sky);
            let residual = plane.median();
            plane.sub_scalar(residual);
            progress.advance();
            (plane, background)
        })
        .collect();
    progress.finish();

    let (planes, background): (Vec<Image>, Vec<f64>) = results.into_iter().unzip();
    Ok(SkyFiltered {
        cube: Cube::from_planes(planes)?,
        background,
    })
}

/// Apply a named filter to every plane.
pub fn filter_cube(cube: &Cube, filter: ImageFilter) -> Result<Cube> {
    let planes = cube
        .planes()
        .par_iter()
        .map(|p| apply_filter(p, filter))
        .collect();
    Cube::from_planes(planes)
}

/// Subtract a median sky frame from the object planes.
///
/// The sky is the per-pixel median of the planes flagged in `sky_flags`, or
/// of every plane when none is flagged. Each unflagged plane has the sky and
/// then its own median removed. Returns the sky frame.
pub fn subtract_median_sky(cube: &mut Cube, sky_flags: &[bool]) -> Result<Image> {
    if sky_flags.len() != cube.len() {
        return Err(ReductionError::ShapeMismatch {
            expected: format!("{} sky flags", cube.len()),
            actual: format!("{} sky flags", sky_flags.len()),
        });
    }
    let sky = if sky_flags.iter().any(|&f| f) {
        let sky_planes: Vec<Image> = cube
            .planes()
            .iter()
            .zip(sky_flags)
            .filter(|(_, &is_sky)| is_sky)
            .map(|(p, _)| p.clone())
            .collect();
        Cube::from_planes(sky_planes)?.median_image()?
    } else {
        log::info!("no sky plane flagged, using the median of all planes");
        cube.median_image()?
    };

    cube.planes_mut()
        .par_iter_mut()
        .zip(sky_flags.par_iter())
        .filter(|(_, &is_sky)| !is_sky)
        .try_for_each(|(plane, _)| -> Result<()> {
            plane.sub_image(&sky)?;
            let level = plane.median();
            plane.sub_scalar(level);
            Ok(())
        })?;
    Ok(sky)
}
