//! Small reductions built from the core stages.
//!
//! - [`zero_point`]: photometric zero point of a standard-star sequence
//! - [`slit`]: vertical extent of a long slit
//! - [`mode`]: chop / no-chop resolution for zero-point sequences

pub mod mode;
pub mod slit;
pub mod zero_point;

pub use mode::{AcquisitionMode, ModeTable};
pub use slit::slit_position;
pub use zero_point::{zero_point, PlaneMeasurement, ZeroPointConfig, ZeroPointResult};
