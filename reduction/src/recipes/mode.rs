//! Acquisition mode of a zero-point sequence.
//!
//! The mode is resolved from the observation template identifier through a
//! substring table, falling back to the chopping-status flag.

use crate::error::{ReductionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether the telescope chopped during the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    /// Every plane is already sky-subtracted
    Chop,
    /// Consecutive planes are differenced to remove the sky
    NoChop,
}

impl AcquisitionMode {
    /// Mode from a chopping-status flag: `T...` is chopped, `F...` is not.
    pub fn from_chopping_status(status: &str) -> Option<Self> {
        match status.trim_start().chars().next() {
            Some('T') => Some(AcquisitionMode::Chop),
            Some('F') => Some(AcquisitionMode::NoChop),
            _ => None,
        }
    }
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            AcquisitionMode::Chop => "chop",
            AcquisitionMode::NoChop => "nochop",
        })
    }
}

impl FromStr for AcquisitionMode {
    type Err = ReductionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chop" => Ok(AcquisitionMode::Chop),
            "nochop" => Ok(AcquisitionMode::NoChop),
            _ => Err(ReductionError::UnknownName {
                kind: "acquisition mode",
                name: s.to_string(),
            }),
        }
    }
}

/// Ordered `(substring, mode)` table; the first matching entry wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeTable {
    entries: Vec<(String, AcquisitionMode)>,
}

impl ModeTable {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, pattern: impl Into<String>, mode: AcquisitionMode) -> Self {
        self.entries.push((pattern.into(), mode));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mode of the first entry whose pattern occurs in `template_id`.
    pub fn resolve(&self, template_id: &str) -> Option<AcquisitionMode> {
        self.entries
            .iter()
            .find(|(pattern, _)| template_id.contains(pattern.as_str()))
            .map(|&(_, mode)| mode)
    }
}

impl Default for ModeTable {
    /// Known zero-point templates. The explicit no-chop variant precedes the
    /// long-wavelength entry it contains.
    fn default() -> Self {
        ModeTable::new()
            .with_entry("img_tec_ZpNoChop", AcquisitionMode::NoChop)
            .with_entry("LW_img_tec_Zp", AcquisitionMode::Chop)
            .with_entry("SW_img_tec_Zp", AcquisitionMode::NoChop)
            .with_entry("img_cal_GenericOffset", AcquisitionMode::NoChop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = ModeTable::default();
        assert_eq!(table.resolve("ISAACSW_img_tec_Zp"), Some(AcquisitionMode::NoChop));
        assert_eq!(table.resolve("ISAACLW_img_tec_Zp"), Some(AcquisitionMode::Chop));
        assert_eq!(
            table.resolve("ISAACLW_img_tec_ZpNoChop"),
            Some(AcquisitionMode::NoChop)
        );
        assert_eq!(
            table.resolve("ISAACSW_img_cal_GenericOffset"),
            Some(AcquisitionMode::NoChop)
        );
        assert_eq!(table.resolve("ISAACSW_spec_obs"), None);
    }

    #[test]
    fn test_custom_table_and_flags() {
        let table = ModeTable::new().with_entry("Chopped", AcquisitionMode::Chop);
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve("SofI_Chopped_Zp"), Some(AcquisitionMode::Chop));
        assert!(ModeTable::new().is_empty());

        assert_eq!(
            AcquisitionMode::from_chopping_status("T"),
            Some(AcquisitionMode::Chop)
        );
        assert_eq!(
            AcquisitionMode::from_chopping_status("False"),
            Some(AcquisitionMode::NoChop)
        );
        assert_eq!(AcquisitionMode::from_chopping_status(""), None);
        assert_eq!("nochop".parse::<AcquisitionMode>().unwrap(), AcquisitionMode::NoChop);
        assert!("maybe".parse::<AcquisitionMode>().is_err());
    }
}
