//! Detection and refinement parameters.
//!
//! Defaults follow the values used for IR point-source work: a 2σ kappa
//! threshold, a 10-pixel square-filter half-size, a 5-pixel star aperture with
//! a 10-20 pixel background annulus and a 0.1-5.0 arcsec seeing window.
//!
//! # Usage
//!
//! ```rust
//! use reduction::config::JsonConfig;
//! use reduction::image_proc::detection::config::DetectionConfig;
//!
//! let config = DetectionConfig::from_json_str(r#"{ "kappa": 5.0 }"#).unwrap();
//! assert_eq!(config.kappa, 5.0);
//! assert_eq!(config.star_radius, 5.0); // untouched fields keep their default
//! ```

use crate::config::JsonConfig;
use crate::error::{ReductionError, Result};
use serde::{Deserialize, Serialize};

/// Kappa used when a negative value is requested.
pub const DEFAULT_KAPPA: f64 = 2.0;

/// Square-filter half-size used when a value below 1 is requested.
pub const DEFAULT_SQUARE_HALF_SIZE: usize = 10;

/// Seeing window in arcseconds for image-quality estimation.
pub const DEFAULT_SEEING_RANGE: (f64, f64) = (0.1, 5.0);

/// Which detector to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    KappaSigma,
    SquareFilter,
}

/// Parameters for detection and the refinement stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub detector: DetectorKind,
    /// Threshold in units of mean absolute deviation above the median
    pub kappa: f64,
    /// Blur with a 5×5 mean before thresholding
    pub smear: bool,
    pub square_half_x: usize,
    pub square_half_y: usize,
    /// Aperture radius for centroiding and photometry, in pixels
    pub star_radius: f64,
    pub background_inner: f64,
    pub background_outer: f64,
    pub seeing_range: (f64, f64),
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            detector: DetectorKind::KappaSigma,
            kappa: DEFAULT_KAPPA,
            smear: false,
            square_half_x: DEFAULT_SQUARE_HALF_SIZE,
            square_half_y: DEFAULT_SQUARE_HALF_SIZE,
            star_radius: 5.0,
            background_inner: 10.0,
            background_outer: 20.0,
            seeing_range: DEFAULT_SEEING_RANGE,
        }
    }
}

impl JsonConfig for DetectionConfig {}

impl DetectionConfig {
    /// Check the aperture ordering `star < inner < outer`.
    pub fn validate(&self) -> Result<()> {
        check_radii(self.star_radius, self.background_inner, self.background_outer)
    }
}

/// Require `0 < star_radius < inner < outer`.
pub fn check_radii(star_radius: f64, inner: f64, outer: f64) -> Result<()> {
    if star_radius > 0.0 && star_radius < inner && inner < outer {
        Ok(())
    } else {
        Err(ReductionError::invalid(format!(
            "radii must satisfy 0 < star ({star_radius}) < inner ({inner}) < outer ({outer})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DetectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detector, DetectorKind::KappaSigma);
    }

    #[test]
    fn test_radius_ordering() {
        assert!(check_radii(3.0, 6.0, 9.0).is_ok());
        assert!(check_radii(6.0, 6.0, 9.0).is_err());
        assert!(check_radii(3.0, 9.0, 6.0).is_err());
        assert!(check_radii(0.0, 1.0, 2.0).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = DetectionConfig {
            detector: DetectorKind::SquareFilter,
            kappa: 3.5,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert!(json.contains("square_filter"));
        let back = DetectionConfig::from_json_str(&json).unwrap();
        assert_eq!(back, config);
        assert!(DetectionConfig::from_json_str("{ not json").is_err());
    }
}
