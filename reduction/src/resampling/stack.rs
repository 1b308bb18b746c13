//! Shift-and-add stacking with min/max rejection.
//!
//! Every plane is resampled onto a common output grid and the contributions
//! to each output pixel are sorted, trimmed at both ends and averaged.

use super::kernel::Kernel;
use super::shift::shift_image;
use super::warp::interpolate_16;
use crate::config::JsonConfig;
use crate::error::{ReductionError, Result};
use crate::image_proc::cube::Cube;
use crate::image_proc::image::Image;
use crate::registration::PlaneOffset;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Stacking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Lowest contributions dropped per pixel
    pub rej_min: usize,
    /// Highest contributions dropped per pixel
    pub rej_max: usize,
    /// Output covers the union of the plane footprints rather than their
    /// intersection
    pub union: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            rej_min: 1,
            rej_max: 1,
            union: true,
        }
    }
}

impl JsonConfig for StackConfig {}

/// Result of [`shift_and_add`].
#[derive(Debug, Clone, PartialEq)]
pub struct StackedImage {
    pub image: Image,
    /// Reference-frame position of output pixel `(0, 0)`
    pub origin: (i64, i64),
    /// Rejection was requested but too few planes were available
    pub rejection_disabled: bool,
    /// Indices of the planes that went into the stack
    pub used_planes: Vec<usize>,
}

/// Output length and origin along one axis from the sorted plane shifts.
fn output_axis(len: usize, sorted: &[f64], rejtot: usize, union: bool) -> Result<(usize, i64)> {
    let n = sorted.len();
    let (span, start) = if union {
        let (min, max) = (sorted[rejtot], sorted[n - rejtot - 1]);
        (len as f64 + max - min, min.floor())
    } else {
        let (min, max) = (sorted[0], sorted[n - 1]);
        (len as f64 - max + min, max.floor())
    };
    if span < 0.0 {
        return Err(ReductionError::invalid(
            "plane footprints do not intersect",
        ));
    }
    Ok((span as usize + 1, start as i64))
}

/// Register the planes of `cube` onto a common grid and average them with
/// per-pixel min/max rejection.
///
/// `offsets` are measured displacements; each plane is moved by the negated
/// offset. Planes with an invalid offset are left out.
pub fn shift_and_add(
    cube: &Cube,
    offsets: &[PlaneOffset],
    kernel: &Kernel,
    config: &StackConfig,
) -> Result<StackedImage> {
    if offsets.len() != cube.len() {
        return Err(ReductionError::ShapeMismatch {
            expected: format!("{} offsets", cube.len()),
            actual: format!("{} offsets", offsets.len()),
        });
    }
    let used: Vec<usize> = (0..cube.len())
        .filter(|&i| {
            let ok = offsets[i].is_valid();
            if !ok {
                log::warn!("plane {} has no valid offset, dropped from the stack", i + 1);
            }
            ok
        })
        .collect();

    match used.len() {
        0 => return Err(ReductionError::invalid("no plane with a valid offset to stack")),
        1 => {
            let p = used[0];
            log::warn!("single plane in shift-and-add, returning it shifted");
            return Ok(StackedImage {
                image: shift_image(cube.plane(p), -offsets[p].dx, -offsets[p].dy, kernel),
                origin: (0, 0),
                rejection_disabled: false,
                used_planes: used,
            });
        }
        _ => {}
    }

    let n = used.len();
    let (mut rej_min, mut rej_max) = (config.rej_min, config.rej_max);
    let mut rejection_disabled = false;
    if rej_min + rej_max > 0 && (n <= 3 || n <= 2 * (rej_min + rej_max)) {
        log::warn!(
            "rejection set to {rej_min}-{rej_max} but only {n} planes to stack: rejection not applied"
        );
        rej_min = 0;
        rej_max = 0;
        rejection_disabled = true;
    }
    let rejtot = rej_min + rej_max;

    // planes move by -offset
    let shifts: Vec<(f64, f64)> = used.iter().map(|&i| (-offsets[i].dx, -offsets[i].dy)).collect();
    let mut sx: Vec<f64> = shifts.iter().map(|s| s.0).collect();
    let mut sy: Vec<f64> = shifts.iter().map(|s| s.1).collect();
    sx.sort_by(f64::total_cmp);
    sy.sort_by(f64::total_cmp);
    let (out_w, start_x) = output_axis(cube.width(), &sx, rejtot, config.union)?;
    let (out_h, start_y) = output_axis(cube.height(), &sy, rejtot, config.union)?;
    log::debug!(
        "shift-and-add of {n} planes onto {out_w}x{out_h}, origin ({start_x}, {start_y})"
    );

    let (w, h) = (cube.width() as f64, cube.height() as f64);
    let views: Vec<_> = used.iter().map(|&i| cube.plane(i).view()).collect();
    let mut out = Array2::<f64>::zeros((out_h, out_w));
    Zip::indexed(&mut out).par_for_each(|(j, i), o| {
        let mut contributions = Vec::with_capacity(n);
        for (src, &(dx, dy)) in views.iter().zip(&shifts) {
            let x = i as f64 - dx + start_x as f64;
            let y = j as f64 - dy + start_y as f64;
            let (px, py) = (x.floor(), y.floor());
            if px > 1.0 && px < w - 2.0 && py > 1.0 && py < h - 2.0 {
                let tabs = (Kernel::tab_rounded(x - px), Kernel::tab_rounded(y - py));
                contributions.push(interpolate_16(src, px as usize, py as usize, tabs, kernel));
            }
        }
        if contributions.len() > rejtot {
            contributions.sort_by(f64::total_cmp);
            let kept = &contributions[rej_min..contributions.len() - rej_max];
            *o = kept.iter().sum::<f64>() / kept.len() as f64;
        }
    });

    Ok(StackedImage {
        image: Image::from_array(out),
        origin: (start_x, start_y),
        rejection_disabled,
        used_planes: used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resampling::shift::shift_image_integer;
    use approx::assert_abs_diff_eq;
    use shared::synthetic::{SyntheticFrame, SyntheticStar};
    use shared::ImageSize;

    fn reference() -> Image {
        Image::from_array(
            SyntheticFrame::new(ImageSize::from_width_height(60, 50))
                .with_background(10.0)
                .with_star(SyntheticStar::new(30.0, 25.0, 100.0, 2.0))
                .render(),
        )
    }

    fn shifted_cube(offsets: &[(i64, i64)]) -> (Cube, Vec<PlaneOffset>) {
        let img = reference();
        let planes = offsets
            .iter()
            .map(|&(dx, dy)| shift_image_integer(&img, dx, dy))
            .collect();
        let measured = offsets
            .iter()
            .map(|&(dx, dy)| PlaneOffset::known(dx as f64, dy as f64))
            .collect();
        (Cube::from_planes(planes).unwrap(), measured)
    }

    const OFFSETS: [(i64, i64); 5] = [(0, 0), (2, 1), (-3, 2), (1, -1), (4, 0)];

    #[test]
    fn test_union_grid() {
        let (cube, offsets) = shifted_cube(&OFFSETS);
        let config = StackConfig {
            rej_min: 0,
            rej_max: 0,
            union: true,
        };
        let stacked = shift_and_add(&cube, &offsets, Kernel::default_kernel(), &config).unwrap();
        assert_eq!(stacked.image.width(), 68);
        assert_eq!(stacked.image.height(), 54);
        assert_eq!(stacked.origin, (-4, -2));
        assert!(!stacked.rejection_disabled);
        assert_eq!(stacked.used_planes, vec![0, 1, 2, 3, 4]);
        // star centre lands at reference position minus origin
        assert_abs_diff_eq!(stacked.image.get(34, 27), 110.0, epsilon = 1e-6);
    }

    #[test]
    fn test_intersection_grid() {
        let (cube, offsets) = shifted_cube(&OFFSETS);
        let config = StackConfig {
            union: false,
            ..StackConfig::default()
        };
        let stacked = shift_and_add(&cube, &offsets, Kernel::default_kernel(), &config).unwrap();
        assert_eq!(stacked.image.width(), 54);
        assert_eq!(stacked.image.height(), 48);
        assert_eq!(stacked.origin, (3, 1));
        assert_abs_diff_eq!(stacked.image.get(27, 24), 110.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rejection_drops_outlier() {
        let (mut cube, offsets) = shifted_cube(&[(0, 0); 5]);
        cube.plane_mut(2).set(12, 12, 5000.0);
        let kernel = Kernel::default_kernel();

        let rejected = shift_and_add(&cube, &offsets, kernel, &StackConfig::default()).unwrap();
        assert_abs_diff_eq!(rejected.image.get(12, 12), 10.0, epsilon = 1e-6);

        let plain = StackConfig {
            rej_min: 0,
            rej_max: 0,
            union: true,
        };
        let averaged = shift_and_add(&cube, &offsets, kernel, &plain).unwrap();
        assert!(averaged.image.get(12, 12) > 1000.0);
    }

    #[test]
    fn test_rejection_clamp_is_reported() {
        let (cube, offsets) = shifted_cube(&[(0, 0), (1, 0), (0, 1)]);
        let stacked =
            shift_and_add(&cube, &offsets, Kernel::default_kernel(), &StackConfig::default())
                .unwrap();
        assert!(stacked.rejection_disabled);
        assert_eq!(stacked.origin, (-1, -1));
        assert_abs_diff_eq!(stacked.image.get(31, 26), 110.0, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_planes() {
        let (cube, mut offsets) = shifted_cube(&[(0, 0), (2, 0), (0, 0)]);
        offsets[0] = PlaneOffset::INVALID;
        offsets[2] = PlaneOffset::INVALID;
        let single =
            shift_and_add(&cube, &offsets, Kernel::default_kernel(), &StackConfig::default())
                .unwrap();
        assert_eq!(single.used_planes, vec![1]);
        assert_eq!(single.image.size(), cube.size());
        assert_abs_diff_eq!(single.image.get(30, 25), 110.0, epsilon = 1e-6);

        offsets[1] = PlaneOffset::INVALID;
        assert!(matches!(
            shift_and_add(&cube, &offsets, Kernel::default_kernel(), &StackConfig::default()),
            Err(ReductionError::InvalidArgument(_))
        ));
        assert!(shift_and_add(&cube, &offsets[..2], Kernel::default_kernel(), &StackConfig::default())
            .is_err());
    }

    #[test]
    fn test_config_json() {
        let config = StackConfig::from_json_str(r#"{ "union": false }"#).unwrap();
        assert_eq!((config.rej_min, config.rej_max, config.union), (1, 1, false));
    }
}
