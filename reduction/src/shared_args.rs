use crate::image_proc::filters::ImageFilter;
use crate::resampling::KernelKind;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Parse an offset string in format "dx,dy"
fn parse_offset_pair(s: &str) -> Result<(f64, f64), String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        return Err("Offsets must be in format 'dx,dy'".to_string());
    }

    let dx = parts[0]
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid dx value: {}", parts[0]))?;
    let dy = parts[1]
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid dy value: {}", parts[1]))?;

    if !dx.is_finite() || !dy.is_finite() {
        return Err("Offsets must be finite".to_string());
    }
    Ok((dx, dy))
}

/// Wrapper for a `(dx, dy)` pair given on the command line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetArg(pub f64, pub f64);

impl std::str::FromStr for OffsetArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_offset_pair(s).map(|(dx, dy)| OffsetArg(dx, dy))
    }
}

impl std::fmt::Display for OffsetArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.0, self.1)
    }
}

/// Available interpolation kernels for selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KernelModel {
    /// Hyperbolic-tangent kernel - Default
    Default,
    /// Plain sinc
    Sinc,
    /// Squared sinc
    Sinc2,
    /// Lanczos window over two pixels
    Lanczos,
    /// Hamming raised cosine
    Hamming,
    /// Hann raised cosine
    Hann,
}

impl std::fmt::Display for KernelModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_kind())
    }
}

impl KernelModel {
    /// Get the corresponding KernelKind for the selected model
    pub fn to_kind(&self) -> KernelKind {
        match self {
            KernelModel::Default => KernelKind::Default,
            KernelModel::Sinc => KernelKind::Sinc,
            KernelModel::Sinc2 => KernelKind::Sinc2,
            KernelModel::Lanczos => KernelKind::Lanczos,
            KernelModel::Hamming => KernelKind::Hamming,
            KernelModel::Hann => KernelKind::Hann,
        }
    }
}

/// Available spatial filters for selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterModel {
    /// 3x3 box mean
    Mean3,
    /// Horizontal first derivative
    Dx,
    /// Vertical first derivative
    Dy,
    /// Horizontal second derivative
    Dx2,
    /// Vertical second derivative
    Dy2,
    Contour1,
    Contour2,
    Contour3,
    /// Centre-weighted smoothing
    Contrast1,
    /// 5x5 box mean
    Mean5,
    /// 3x3 minimum
    Min,
    /// 3x3 maximum
    Max,
    /// 3x3 maximum minus minimum
    MaxMin,
    /// 3x3 median
    Median,
}

impl FilterModel {
    pub fn to_filter(&self) -> ImageFilter {
        match self {
            FilterModel::Mean3 => ImageFilter::Mean3,
            FilterModel::Dx => ImageFilter::Dx,
            FilterModel::Dy => ImageFilter::Dy,
            FilterModel::Dx2 => ImageFilter::Dx2,
            FilterModel::Dy2 => ImageFilter::Dy2,
            FilterModel::Contour1 => ImageFilter::Contour1,
            FilterModel::Contour2 => ImageFilter::Contour2,
            FilterModel::Contour3 => ImageFilter::Contour3,
            FilterModel::Contrast1 => ImageFilter::Contrast1,
            FilterModel::Mean5 => ImageFilter::Mean5,
            FilterModel::Min => ImageFilter::Min,
            FilterModel::Max => ImageFilter::Max,
            FilterModel::MaxMin => ImageFilter::MaxMin,
            FilterModel::Median => ImageFilter::Median,
        }
    }
}

impl std::fmt::Display for FilterModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_filter())
    }
}

/// Common arguments shared across reduction binaries
#[derive(Parser, Debug, Clone)]
pub struct SharedReductionArgs {
    /// JSON configuration file; unset fields keep their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Text file with one "plane dx dy" line per plane
    #[arg(long)]
    pub offsets: Option<PathBuf>,

    /// Interpolation kernel for resampling
    #[arg(long, value_enum, default_value_t = KernelModel::Default)]
    pub kernel: KernelModel,

    /// Optional spatial filter applied to every plane before measuring
    #[arg(long, value_enum)]
    pub filter: Option<FilterModel>,

    /// Show a progress bar
    #[arg(long, default_value_t = false)]
    pub progress: bool,

    /// Enable debug output
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}
