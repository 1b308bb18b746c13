//! Tabulated interpolation kernels.
//!
//! A kernel is sampled every `1 / TABSPERPIX` pixel from 0 to
//! `KERNEL_WIDTH` pixels; the negative half follows by symmetry. Four taps
//! at distances `1 + f`, `f`, `1 - f` and `2 - f` from the sample position
//! are read straight from the table.

use crate::error::{ReductionError, Result};
use num_complex::Complex64;
use once_cell::sync::Lazy;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Table samples per pixel.
pub const TABSPERPIX: usize = 1000;
/// Kernel half-width in pixels.
pub const KERNEL_WIDTH: usize = 2;
/// Number of tabulated samples.
pub const KERNEL_SAMPLES: usize = 1 + TABSPERPIX * KERNEL_WIDTH;
/// Steepness of the hyperbolic-tangent frequency response.
pub const TANH_STEEPNESS: f64 = 5.0;

const TANH_FFT_POINTS: usize = 32768;

/// Interpolation kernel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    /// Hyperbolic-tangent kernel, also known as `tanh`
    #[default]
    Default,
    Sinc,
    Sinc2,
    Lanczos,
    Hamming,
    Hann,
}

impl KernelKind {
    pub const ALL: [KernelKind; 6] = [
        KernelKind::Default,
        KernelKind::Sinc,
        KernelKind::Sinc2,
        KernelKind::Lanczos,
        KernelKind::Hamming,
        KernelKind::Hann,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            KernelKind::Default => "default",
            KernelKind::Sinc => "sinc",
            KernelKind::Sinc2 => "sinc2",
            KernelKind::Lanczos => "lanczos",
            KernelKind::Hamming => "hamming",
            KernelKind::Hann => "hann",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KernelKind {
    type Err = ReductionError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "tanh" {
            return Ok(KernelKind::Default);
        }
        KernelKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| ReductionError::UnknownName {
                kind: "kernel",
                name: s.to_string(),
            })
    }
}

/// Cardinal sine `sin(πx) / (πx)`, 1 near the origin.
pub fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-4 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Immutable sampled kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    kind: KernelKind,
    samples: Vec<f64>,
}

static DEFAULT_KERNEL: Lazy<Kernel> = Lazy::new(|| Kernel::generate(KernelKind::Default));

impl Kernel {
    /// Tabulate a kernel.
    pub fn generate(kind: KernelKind) -> Self {
        let x = |i: usize| i as f64 / TABSPERPIX as f64;
        let samples = match kind {
            KernelKind::Default => tanh_kernel(TANH_STEEPNESS),
            KernelKind::Sinc => (0..KERNEL_SAMPLES).map(|i| sinc(x(i))).collect(),
            KernelKind::Sinc2 => (0..KERNEL_SAMPLES).map(|i| sinc(x(i)).powi(2)).collect(),
            KernelKind::Lanczos => (0..KERNEL_SAMPLES)
                .map(|i| {
                    let x = x(i);
                    if x < 2.0 {
                        sinc(x) * sinc(x / 2.0)
                    } else {
                        0.0
                    }
                })
                .collect(),
            KernelKind::Hamming => raised_cosine(0.54),
            KernelKind::Hann => raised_cosine(0.5),
        };
        Self { kind, samples }
    }

    /// Shared instance of the default kernel, built on first use.
    pub fn default_kernel() -> &'static Kernel {
        &DEFAULT_KERNEL
    }

    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Table index for a fractional offset, truncated.
    #[inline]
    pub fn tab(frac: f64) -> usize {
        ((frac.abs() * TABSPERPIX as f64) as usize).min(TABSPERPIX)
    }

    /// Table index for a fractional offset, rounded to the nearest sample.
    #[inline]
    pub fn tab_rounded(frac: f64) -> usize {
        ((0.5 + frac.abs() * TABSPERPIX as f64) as usize).min(TABSPERPIX)
    }

    /// Weights of the four taps at `p - 1`, `p`, `p + 1`, `p + 2` for a
    /// sample at `p + tab / TABSPERPIX`.
    #[inline]
    pub fn taps(&self, tab: usize) -> [f64; 4] {
        let k = &self.samples;
        [
            k[TABSPERPIX + tab],
            k[tab],
            k[TABSPERPIX - tab],
            k[2 * TABSPERPIX - tab],
        ]
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::default_kernel().clone()
    }
}

fn raised_cosine(alpha: f64) -> Vec<f64> {
    (0..KERNEL_SAMPLES)
        .map(|i| {
            if i < TABSPERPIX {
                let x = i as f64 / TABSPERPIX as f64;
                alpha + (1.0 - alpha) * (PI * x).cos()
            } else {
                0.0
            }
        })
        .collect()
}

/// Low-pass response with hyperbolic-tangent edges, brought back to pixel
/// space with an inverse FFT.
fn tanh_kernel(steep: f64) -> Vec<f64> {
    let np = TANH_FFT_POINTS;
    let width = TABSPERPIX as f64 / 2.0;
    let response = |f: f64| {
        ((steep * (f + 0.5)).tanh() + 1.0) / 2.0 * (((steep * (0.5 - f)).tanh() + 1.0) / 2.0)
    };

    let mut buffer: Vec<Complex64> = (0..np)
        .map(|i| {
            let bin = if i < np / 2 { i as f64 } else { i as f64 - np as f64 };
            Complex64::new(response(bin * 2.0 * width / np as f64), 0.0)
        })
        .collect();
    FftPlanner::<f64>::new()
        .plan_fft_inverse(np)
        .process(&mut buffer);

    buffer
        .iter()
        .take(KERNEL_SAMPLES)
        .map(|c| 2.0 * width * c.re / np as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_names() {
        assert_eq!("tanh".parse::<KernelKind>().unwrap(), KernelKind::Default);
        assert_eq!("lanczos".parse::<KernelKind>().unwrap(), KernelKind::Lanczos);
        assert!(matches!(
            "cubic".parse::<KernelKind>(),
            Err(ReductionError::UnknownName { kind: "kernel", .. })
        ));
        for kind in KernelKind::ALL {
            assert_eq!(kind.to_string().parse::<KernelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_closed_form_kernels() {
        let sinc_k = Kernel::generate(KernelKind::Sinc);
        assert_eq!(sinc_k.samples().len(), KERNEL_SAMPLES);
        assert_eq!(sinc_k.samples()[0], 1.0);
        assert_abs_diff_eq!(sinc_k.samples()[500], 2.0 / PI, epsilon = 1e-12);
        assert_abs_diff_eq!(sinc_k.samples()[1000], 0.0, epsilon = 1e-12);

        let lanczos = Kernel::generate(KernelKind::Lanczos);
        assert_abs_diff_eq!(lanczos.samples()[500], sinc(0.5) * sinc(0.25), epsilon = 1e-12);
        assert_eq!(lanczos.samples()[2000], 0.0);

        let hann = Kernel::generate(KernelKind::Hann);
        assert_abs_diff_eq!(hann.samples()[500], 0.5, epsilon = 1e-12);
        assert_eq!(hann.samples()[1000], 0.0);
        let hamming = Kernel::generate(KernelKind::Hamming);
        assert_abs_diff_eq!(hamming.samples()[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tanh_kernel_interpolates() {
        let k = Kernel::default_kernel();
        assert_eq!(k.kind(), KernelKind::Default);
        assert_eq!(k.samples().len(), KERNEL_SAMPLES);
        // close to 1 at the origin and to 0 at whole pixels
        assert_abs_diff_eq!(k.samples()[0], 1.0, epsilon = 0.02);
        assert_abs_diff_eq!(k.samples()[1000], 0.0, epsilon = 0.02);
        assert!(k.samples()[500] > 0.5);
        // taps at zero fraction select the centre pixel
        let taps = k.taps(0);
        let sum: f64 = taps.iter().sum();
        assert_abs_diff_eq!(taps[1] / sum, 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_tab_indices() {
        assert_eq!(Kernel::tab(0.2504), 250);
        assert_eq!(Kernel::tab_rounded(0.2506), 251);
        assert_eq!(Kernel::tab(-0.5), 500);
        assert_eq!(Kernel::tab_rounded(0.9999), TABSPERPIX);
    }
}
