//! Engine-wide configuration.

use crate::error::EngineResult;
use crate::generator::GeneratorConfig;
use crate::gesture::GestureConfig;
use crate::pencil::PencilConfig;
use serde::{Deserialize, Serialize};

/// Tunables for every engine component. Missing sections take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub gesture: GestureConfig,
    pub generator: GeneratorConfig,
    pub pencil: PencilConfig,
}

impl EngineConfig {
    /// Parse a config. Out-of-range pencil speeds and pauses are clamped.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.pencil = config.pencil.sanitized();
        Ok(config)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
