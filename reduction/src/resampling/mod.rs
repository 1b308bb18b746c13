//! Resampling: interpolation kernels, sub-pixel shifts, warps and
//! shift-and-add stacking.
//!
//! All interpolation goes through a tabulated [`Kernel`] shared by reference
//! for the duration of one operation.

pub mod kernel;
pub mod shift;
pub mod stack;
pub mod warp;

pub use kernel::{Kernel, KernelKind, KERNEL_SAMPLES, KERNEL_WIDTH, TABSPERPIX};
pub use shift::{shift_cube, shift_image, shift_image_circular, shift_image_integer};
pub use stack::{shift_and_add, StackConfig, StackedImage};
pub use warp::{subsample, warp_linear, warp_polynomial};
