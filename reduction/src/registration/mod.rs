//! Sub-pixel registration of frames against a reference.
//!
//! Offsets follow one convention throughout: a feature at `(x, y)` in the
//! reference appears at `(x + dx, y + dy)` in the candidate, i.e.
//! `candidate(p) = reference(p - d)`.
//!
//! - [`anchors`]: pick bright, central objects to correlate on
//! - [`xcorr`]: squared-difference search around each anchor
//! - [`blind`]: FFT cross-correlation for a first guess without anchors
//! - [`offsets`]: offsets read from a text file

pub mod anchors;
pub mod blind;
pub mod offsets;
pub mod points;
pub mod xcorr;

pub use anchors::{select_anchor_points, select_anchor_points_with_ladder, ANCHOR_LADDER};
pub use blind::{blind_offsets, blind_offsets_against};
pub use offsets::{load_offsets, parse_offsets};
pub use points::{PointList, SortOrder};
pub use xcorr::{estimate_cube_offsets, estimate_offset};

use crate::config::JsonConfig;
use serde::{Deserialize, Serialize};

/// Measured displacement of one plane.
///
/// `quality` is the normalised squared difference at the best match (lower
/// is better); a negative value marks a plane that could not be measured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneOffset {
    pub dx: f64,
    pub dy: f64,
    pub quality: f64,
}

impl PlaneOffset {
    pub const INVALID: PlaneOffset = PlaneOffset {
        dx: 0.0,
        dy: 0.0,
        quality: -1.0,
    };

    pub fn new(dx: f64, dy: f64, quality: f64) -> Self {
        Self { dx, dy, quality }
    }

    /// Offset known a priori, e.g. from a file or a blind estimate.
    pub fn known(dx: f64, dy: f64) -> Self {
        Self::new(dx, dy, 0.0)
    }

    pub fn is_valid(&self) -> bool {
        self.quality >= 0.0
    }
}

/// Cross-correlation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XcorrConfig {
    /// Upper bound on anchor points used per plane
    pub max_points: usize,
    /// Fewer anchors than this is a failure
    pub min_points: usize,
    /// Search half-width and half-height, in pixels
    pub search: (usize, usize),
    /// Measurement half-width and half-height, in pixels
    pub measure: (usize, usize),
    /// Detection kappa for anchor selection
    pub sigma: f64,
}

impl Default for XcorrConfig {
    fn default() -> Self {
        Self {
            max_points: 100,
            min_points: 1,
            search: (5, 5),
            measure: (25, 25),
            sigma: 2.0,
        }
    }
}

impl JsonConfig for XcorrConfig {}

impl XcorrConfig {
    /// Margin an anchor needs from each edge so that every search position
    /// keeps the measurement window inside the frame.
    pub fn edge_margin(&self) -> (usize, usize) {
        (
            self.search.0 + self.measure.0 + 1,
            self.search.1 + self.measure.1 + 1,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_sentinel() {
        assert!(!PlaneOffset::INVALID.is_valid());
        assert!(PlaneOffset::known(1.0, 2.0).is_valid());
    }

    #[test]
    fn test_config_defaults_and_json() {
        let config = XcorrConfig::from_json_str(r#"{ "search": [8, 6] }"#).unwrap();
        assert_eq!(config.search, (8, 6));
        assert_eq!(config.measure, (25, 25));
        assert_eq!(config.edge_margin(), (34, 32));
    }
}
