//! Types shared across the reduction workspace.
//!
//! * [`image_size`] - frame dimensions with row-major array helpers
//! * [`synthetic`] - deterministic synthetic star fields for tests and demos

pub mod image_size;
pub mod synthetic;

pub use image_size::ImageSize;
