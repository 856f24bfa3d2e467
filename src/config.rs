//! Engine configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Redirect behaviour of an [`Engine`](crate::Engine).
///
/// Both switches are on by default. Missing fields in a JSON document fall
/// back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Redirect when only a trailing slash differs from a registered route.
    /// Also lets the fixed-path search add or drop a trailing slash.
    pub redirect_trailing_slash: bool,
    /// Redirect to the cleaned, case-corrected path when one matches
    pub redirect_fixed_path: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            redirect_trailing_slash: true,
            redirect_fixed_path: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse engine configuration")
    }
}
