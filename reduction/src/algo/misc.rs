//! One-dimensional profile helpers.
//!
//! Cuts through a star (a row or a column through its peak) are analysed with
//! these routines to find the local noise floor and the full width at a given
//! level:
//!
//! - **Linear crossing**: x position where a segment reaches a given y
//! - **Flat low-pass**: boxcar smoothing with edge replication
//! - **Noise floor**: level where the smoothed profile stops descending
//! - **Full width**: width of the peak at a given height, with sub-sample
//!   precision from linear interpolation

use thiserror::Error;

/// Reasons a full-width measurement could not be made.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthError {
    #[error("Peak position {0} is outside the profile of length {1}")]
    PeakOutOfRange(usize, usize),
    #[error("Profile never drops below the requested level on the left side")]
    NoLeftCrossing,
    #[error("Profile never drops below the requested level on the right side")]
    NoRightCrossing,
    #[error("Flat segment at the crossing, cannot interpolate")]
    FlatSegment,
}

/// Interpolate the x coordinate at which the segment `(x1, y1)-(x2, y2)`
/// reaches `y`.
///
/// Returns `None` when the segment is flat (`|y2 - y1| < 1e-8`).
pub fn x_for_y_between(x1: f64, y1: f64, x2: f64, y2: f64, y: f64) -> Option<f64> {
    if (y2 - y1).abs() < 1e-8 {
        None
    } else {
        Some(x1 + (x2 - x1) * (y - y1) / (y2 - y1))
    }
}

/// Boxcar low-pass filter of half-width `hw`.
///
/// Samples beyond either end are replaced by the nearest end sample.
pub fn lowpass_flat(signal: &[f64], hw: usize) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }
    let norm = 1.0 / (2 * hw + 1) as f64;
    (0..n as isize)
        .map(|i| {
            let sum: f64 = (-(hw as isize)..=hw as isize)
                .map(|j| signal[(i + j).clamp(0, n as isize - 1) as usize])
                .sum();
            sum * norm
        })
        .collect()
}

/// Estimate the background level around a peak in a mostly flat profile.
///
/// The profile is smoothed with a 3-tap boxcar. From the peak, the smoothed
/// profile is followed downhill on each side until it stops decreasing, and
/// the two floor levels are averaged.
///
/// Returns 0 for an empty profile or a peak at index 0.
pub fn noise_level_around_peak(profile: &[f64], peak: usize) -> f64 {
    let n = profile.len();
    if n == 0 || peak < 1 || peak >= n {
        return 0.0;
    }
    let smooth = lowpass_flat(profile, 1);

    let mut i = peak;
    while i > 0 && smooth[i] > smooth[i - 1] {
        i -= 1;
    }
    let left = smooth[i];

    let mut i = peak;
    while i < n - 1 && smooth[i] > smooth[i + 1] {
        i += 1;
    }
    let right = smooth[i];

    0.5 * (left + right)
}

/// Full width of the peak at `peak` measured at height `level`.
///
/// Walks outwards from the peak to the first sample at or below `level` on
/// each side and interpolates the crossing linearly between that sample and
/// its inner neighbour. Fails when a crossing would lie on the profile end.
pub fn full_width_linear(profile: &[f64], peak: usize, level: f64) -> Result<f64, WidthError> {
    let n = profile.len();
    if peak >= n {
        return Err(WidthError::PeakOutOfRange(peak, n));
    }

    let mut i = peak;
    while i > 0 && profile[i] > level {
        i -= 1;
    }
    if i == 0 {
        return Err(WidthError::NoLeftCrossing);
    }
    let x_left = x_for_y_between(i as f64, profile[i], (i + 1) as f64, profile[i + 1], level)
        .ok_or(WidthError::FlatSegment)?;
    if x_left < i as f64 {
        return Err(WidthError::NoLeftCrossing);
    }

    let mut i = peak;
    while i < n - 1 && profile[i] > level {
        i += 1;
    }
    if i == n - 1 {
        return Err(WidthError::NoRightCrossing);
    }
    let x_right = x_for_y_between((i - 1) as f64, profile[i - 1], i as f64, profile[i], level)
        .ok_or(WidthError::FlatSegment)?;
    if x_right >= i as f64 {
        return Err(WidthError::NoRightCrossing);
    }

    Ok(x_right - x_left)
}
