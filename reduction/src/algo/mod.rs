//! Numerical building blocks shared by the image-processing stages.
//!
//! - [`stats`]: medians by partial selection, means, rms and rejection means
//! - [`misc`]: 1D profile analysis (noise floor, full width)
//! - [`poly2d`]: 2D polynomial source mappings

pub mod misc;
pub mod poly2d;
pub mod stats;

pub use poly2d::Poly2d;
pub use stats::{kth_smallest, mean, median, rms};
