//! JSON loading for the serde-backed configuration structs.
//!
//! Every configuration type derives `Serialize`/`Deserialize` with
//! `#[serde(default)]`, so a document only needs the fields it overrides.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// JSON round-tripping for configuration structs.
pub trait JsonConfig: Serialize + DeserializeOwned {
    fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
