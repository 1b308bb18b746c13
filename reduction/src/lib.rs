//! Infrared image reduction core.
//!
//! Detection, sub-pixel registration and resampling of detector frames and
//! frame cubes, plus the small recipes built on top of them.
//!
//! # Modules
//!
//! - [`algo`] - statistics, 1D profile helpers and 2D polynomials
//! - [`image_proc`] - images, cubes, filters, pixel maps, detection and photometry
//! - [`registration`] - anchor selection and cross-correlation offsets
//! - [`resampling`] - interpolation kernels, shifts, warps and shift-and-add
//! - [`recipes`] - zero point and slit localisation
//!
//! Everything that loops over many planes or pixels runs on rayon and collects
//! results in index order, so outputs do not depend on thread scheduling.

pub mod algo;
pub mod config;
pub mod error;
pub mod image_proc;
pub mod progress;
pub mod recipes;
pub mod registration;
pub mod resampling;
pub mod shared_args;

pub use error::{ReductionError, Result};
pub use image_proc::{Cube, Image};
pub use progress::{BarProgress, NoProgress, Progress};
