use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Nesting limit for one resolution; self-referential code hits it.
    pub max_resolve_depth: usize,
    /// Scope-mark the builtin root scope case-insensitive.
    pub case_insensitive_builtins: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_resolve_depth: 128,
            case_insensitive_builtins: true,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|error| Error::custom(format!("invalid settings: {error}")))
    }
}
