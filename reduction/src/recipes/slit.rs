//! Vertical extent of a long slit.

use crate::error::{ReductionError, Result};
use crate::image_proc::image::Image;
use crate::image_proc::pixelmap::PixelMap;
use crate::image_proc::thresholding::label_components;

/// Erosion passes allowed before giving up.
pub const MAX_EROSIONS: usize = 1024;
/// Vertical structuring-element length used by default.
pub const DEFAULT_SLIT_KERNEL: usize = 5;

fn count_objects(map: &PixelMap) -> u32 {
    label_components(map.view()).1
}

/// Bottom and top rows (1-based) of the bright slit in `image`.
///
/// The image is thresholded between its mean and maximum, then eroded with
/// a `1 × kernel_size` vertical element until a single object remains. The
/// slit is grown back with one dilation matching the total erosion.
///
/// # Errors
/// `ResourceExhaustion` after [`MAX_EROSIONS`] passes, `NoValidMeasurement`
/// when erosion removes every object.
pub fn slit_position(image: &Image, kernel_size: usize) -> Result<(usize, usize)> {
    if kernel_size < 2 {
        return Err(ReductionError::invalid(format!(
            "slit kernel size must be at least 2, got {kernel_size}"
        )));
    }
    let (_, max) = image.min_max();
    let mut binary = PixelMap::threshold(image, image.mean(), max);

    let mut erosions = 0;
    let mut objects = count_objects(&binary);
    while objects > 1 {
        binary = binary.erode_vertical(kernel_size);
        erosions += 1;
        if erosions >= MAX_EROSIONS {
            return Err(ReductionError::ResourceExhaustion {
                operation: "slit erosion",
                iterations: erosions,
            });
        }
        objects = count_objects(&binary);
    }
    if objects == 0 {
        return Err(ReductionError::NoValidMeasurement("no slit detected".into()));
    }
    log::debug!("slit isolated after {erosions} erosion(s)");

    if erosions > 0 {
        binary = binary.dilate_vertical((kernel_size - 1) * erosions + 1);
    }
    let (bottom, top) = binary
        .row_span()
        .ok_or_else(|| ReductionError::NoValidMeasurement("no slit detected".into()))?;
    Ok((bottom + 1, top + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(image: &mut Image, x: std::ops::Range<usize>, y: std::ops::Range<usize>, v: f64) {
        for yy in y {
            for xx in x.clone() {
                image.set(xx, yy, v);
            }
        }
    }

    #[test]
    fn test_isolated_slit() {
        let mut image = Image::new(20, 60);
        fill(&mut image, 8..12, 10..50, 100.0);
        assert_eq!(slit_position(&image, DEFAULT_SLIT_KERNEL).unwrap(), (11, 50));
    }

    #[test]
    fn test_short_blob_eroded_away() {
        let mut image = Image::new(20, 60);
        fill(&mut image, 8..12, 10..50, 100.0);
        fill(&mut image, 9..11, 54..56, 100.0);
        // one erosion removes the blob, the dilation restores the slit ends
        assert_eq!(slit_position(&image, DEFAULT_SLIT_KERNEL).unwrap(), (11, 50));
    }

    #[test]
    fn test_failures() {
        let mut two_blobs = Image::new(20, 30);
        fill(&mut two_blobs, 2..4, 5..7, 10.0);
        fill(&mut two_blobs, 12..14, 20..22, 10.0);
        assert!(matches!(
            slit_position(&two_blobs, DEFAULT_SLIT_KERNEL),
            Err(ReductionError::NoValidMeasurement(_))
        ));

        // full-height columns never separate
        let mut columns = Image::new(3, 8);
        fill(&mut columns, 0..1, 0..8, 10.0);
        fill(&mut columns, 2..3, 0..8, 10.0);
        assert!(matches!(
            slit_position(&columns, DEFAULT_SLIT_KERNEL),
            Err(ReductionError::ResourceExhaustion { iterations: MAX_EROSIONS, .. })
        ));

        assert!(slit_position(&two_blobs, 1).is_err());
    }
}
