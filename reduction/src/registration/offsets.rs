//! Offsets read from a plain-text file.
//!
//! One plane per line as `plane dx dy`. Blank lines and lines starting with
//! `#` are skipped. When the first pair is not (almost) zero, every pair is
//! made relative to it so that plane 0 becomes the reference.

use super::PlaneOffset;
use crate::error::{ReductionError, Result};
use std::path::Path;

const ZERO_TOLERANCE: f64 = 1e-2;

/// Parse offsets from file contents.
pub fn parse_offsets(text: &str) -> Result<Vec<PlaneOffset>> {
    let mut pairs = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(ReductionError::Parse {
                line: index + 1,
                message: format!("expected 'plane dx dy', got '{line}'"),
            });
        }
        let number = |token: &str| {
            token.parse::<f64>().map_err(|e| ReductionError::Parse {
                line: index + 1,
                message: format!("'{token}': {e}"),
            })
        };
        // plane number is informational only
        number(fields[0])?;
        pairs.push((number(fields[1])?, number(fields[2])?));
    }

    let (x0, y0) = *pairs
        .first()
        .ok_or_else(|| ReductionError::invalid("offsets file holds no offsets"))?;
    let relative = x0.abs() > ZERO_TOLERANCE || y0.abs() > ZERO_TOLERANCE;
    if relative {
        log::info!("offsets made relative to the first plane ({x0:.2}, {y0:.2})");
    }
    Ok(pairs
        .into_iter()
        .map(|(dx, dy)| {
            if relative {
                PlaneOffset::known(dx - x0, dy - y0)
            } else {
                PlaneOffset::known(dx, dy)
            }
        })
        .collect())
}

/// Read and parse an offsets file.
pub fn load_offsets(path: impl AsRef<Path>) -> Result<Vec<PlaneOffset>> {
    let text = std::fs::read_to_string(path)?;
    parse_offsets(&text)
}
