//! Refinement stages for a [`DetectedSet`].
//!
//! Stages run in the order fine position, FWHM, photometry. Each one fills
//! an optional column of the set; photometry and image quality compute the
//! FWHM column on demand when it is missing.

use super::config::{check_radii, DetectionConfig, DEFAULT_SEEING_RANGE};
use super::{Aperture, DetectedSet, Fwhm};
use crate::algo::misc::{full_width_linear, noise_level_around_peak};
use crate::algo::stats;
use crate::error::{ReductionError, Result};
use crate::image_proc::image::Image;
use crate::image_proc::photometry::{annulus_pixels, disk_background, disk_flux, BackgroundMethod};
use crate::image_proc::detection::AABB;
use rayon::prelude::*;

/// Largest relative difference `2|fx - fy| / (fx + fy)` accepted for image
/// quality.
pub const SEEING_FWHM_VARIATION: f64 = 0.2;

/// Background-subtracted barycentres within `star_r` of each raw centroid.
///
/// The background is the mean of the pixels between `bg_r1` and `bg_r2`
/// (0 when the annulus falls off the frame). Objects whose weights sum to
/// zero get `None`.
pub fn fine_position(
    set: &mut DetectedSet,
    image: &Image,
    star_r: f64,
    bg_r1: f64,
    bg_r2: f64,
) -> Result<()> {
    check_radii(star_r, bg_r1, bg_r2)?;
    let column: Vec<Option<(f64, f64)>> = set
        .objects
        .par_iter()
        .map(|obj| {
            let cx = obj.centroid.0.trunc();
            let cy = obj.centroid.1.trunc();
            let ring = annulus_pixels(image, cx, cy, bg_r1, bg_r2);
            let background = if ring.is_empty() {
                0.0
            } else {
                stats::mean(&ring)
            };
            barycentre(image, cx, cy, star_r, background)
        })
        .collect();
    set.fine_positions = Some(column);
    Ok(())
}

fn barycentre(image: &Image, cx: f64, cy: f64, radius: f64, background: f64) -> Option<(f64, f64)> {
    let window = AABB::around(cx, cy, radius, image.size())?;
    let r2 = radius * radius;
    let (mut sw, mut swx, mut swy) = (0.0, 0.0, 0.0);
    for (i, j) in window.pixels() {
        let (dx, dy) = (i as f64 - cx, j as f64 - cy);
        if dx * dx + dy * dy <= r2 {
            let w = image.get(i, j) - background;
            sw += w;
            swx += w * i as f64;
            swy += w * j as f64;
        }
    }
    (sw.abs() > 1e-10).then(|| (swx / sw, swy / sw))
}

/// FWHM along the row and column through each object's brightest pixel.
///
/// The half-maximum level sits between the peak and the noise floor found on
/// either side of it. A measurement is kept only when both widths are
/// positive. The median over valid objects is stored when at least three
/// are available.
pub fn compute_fwhm(set: &mut DetectedSet, image: &Image) -> Result<()> {
    if set.is_empty() {
        return Err(ReductionError::invalid("FWHM requested on an empty object set"));
    }
    let column: Vec<Option<Fwhm>> = set
        .objects
        .par_iter()
        .map(|obj| profile_fwhm(image, obj.max_pos.0, obj.max_pos.1))
        .collect();

    let valid: Vec<Fwhm> = column.iter().flatten().copied().collect();
    set.median_fwhm = if valid.len() < 3 {
        log::warn!(
            "only {} valid FWHM measurement(s), median not computed",
            valid.len()
        );
        None
    } else {
        let xs: Vec<f64> = valid.iter().map(|f| f.x).collect();
        let ys: Vec<f64> = valid.iter().map(|f| f.y).collect();
        Some(Fwhm {
            x: stats::median(&xs),
            y: stats::median(&ys),
        })
    };
    set.fwhm = Some(column);
    Ok(())
}

/// FWHM of the cuts through `(px, py)`.
pub fn profile_fwhm(image: &Image, px: usize, py: usize) -> Option<Fwhm> {
    if px >= image.width() || py >= image.height() {
        return None;
    }
    let row = image.row(py);
    let column = image.column(px);
    let peak = image.get(px, py);
    let noise = 0.5 * (noise_level_around_peak(&row, px) + noise_level_around_peak(&column, py));
    let half_max = 0.5 * (peak + noise);
    if half_max > peak {
        log::debug!("object at ({px}, {py}): half maximum {half_max:.3} above peak {peak:.3}");
        return None;
    }
    let x = full_width_linear(&row, px, half_max).ok()?;
    let y = full_width_linear(&column, py, half_max).ok()?;
    (x > 0.0 && y > 0.0).then_some(Fwhm { x, y })
}

/// Disk photometry with a median annulus background.
///
/// Positions are the fine positions when present. Backgrounds that cannot
/// be estimated or come out negative are taken as 0.
pub fn compute_photometry(
    set: &mut DetectedSet,
    image: &Image,
    star_r: f64,
    bg_in: f64,
    bg_out: f64,
) -> Result<()> {
    if star_r <= 0.0 || bg_in <= 0.0 {
        return Err(ReductionError::invalid(format!(
            "photometry radii must be positive, got star {star_r}, inner {bg_in}"
        )));
    }
    if bg_out - bg_in < 1e-10 {
        return Err(ReductionError::invalid(format!(
            "empty background annulus [{bg_in}, {bg_out}]"
        )));
    }
    if set.fwhm.is_none() {
        compute_fwhm(set, image)?;
    }

    let positions: Vec<(f64, f64)> = (0..set.len()).map(|i| set.position(i)).collect();
    let column = positions
        .par_iter()
        .map(|&(x, y)| -> Result<Option<Aperture>> {
            let background = disk_background(image, x, y, bg_in, bg_out, BackgroundMethod::Median)?
                .unwrap_or(0.0)
                .max(0.0);
            let flux = disk_flux(image, x, y, star_r, background)?;
            Ok(Some(Aperture { flux, background }))
        })
        .collect::<Result<Vec<_>>>()?;
    set.photometry = Some(column);
    Ok(())
}

/// Seeing estimate in arcseconds.
///
/// Keeps round objects (see [`SEEING_FWHM_VARIATION`]) whose widths lie
/// strictly inside `seeing_range` (arcsec, default 0.1 to 5.0) and returns
/// `pixel_scale` times the median of their mean widths. With fewer than three
/// survivors the first one is used. `None` when nothing qualifies or the
/// FWHM column is missing.
pub fn compute_image_quality(
    set: &DetectedSet,
    pixel_scale: f64,
    seeing_range: Option<(f64, f64)>,
) -> Option<f64> {
    if pixel_scale < 1e-6 || set.is_empty() {
        return None;
    }
    let (lo, hi) = seeing_range.unwrap_or(DEFAULT_SEEING_RANGE);
    let (f_min, f_max) = (lo / pixel_scale, hi / pixel_scale);
    let inside = |f: f64| f > f_min && f < f_max;

    let kept: Vec<f64> = set
        .fwhm
        .as_ref()?
        .iter()
        .flatten()
        .filter(|f| 2.0 * (f.x - f.y).abs() / (f.x + f.y) < SEEING_FWHM_VARIATION)
        .filter(|f| inside(f.x) && inside(f.y))
        .map(Fwhm::mean)
        .collect();

    match kept.len() {
        0 => None,
        1 | 2 => {
            log::warn!("only {} object(s) usable for image quality", kept.len());
            Some(pixel_scale * kept[0])
        }
        _ => Some(pixel_scale * stats::median(&kept)),
    }
}

/// Run fine position, FWHM and photometry with the radii from `config`.
pub fn refine(set: &mut DetectedSet, image: &Image, config: &DetectionConfig) -> Result<()> {
    if set.is_empty() {
        return Ok(());
    }
    config.validate()?;
    fine_position(
        set,
        image,
        config.star_radius,
        config.background_inner,
        config.background_outer,
    )?;
    compute_fwhm(set, image)?;
    compute_photometry(
        set,
        image,
        config.star_radius,
        config.background_inner,
        config.background_outer,
    )
}
