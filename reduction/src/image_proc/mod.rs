//! Image processing for detector frames.
//!
//! This module provides the pixel containers and the single-frame and
//! cube-level operations built on them: filtering, binary maps and
//! labelling, object detection and aperture photometry.

pub mod cube;
pub mod cube_filters;
pub mod detection;
pub mod filters;
pub mod image;
pub mod photometry;
pub mod pixelmap;
pub mod thresholding;

// Re-export key functionality for easier access
pub use cube::Cube;
pub use cube_filters::{runminmax_by_quadrant, runminmax_filter, subtract_median_sky, SkyFiltered};
pub use detection::{detect_kappa_sigma, detect_square_filter, DetectedSet, ObjectStats};
pub use filters::{apply_filter, ImageFilter};
pub use image::Image;
pub use pixelmap::PixelMap;
