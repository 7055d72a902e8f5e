//! Codec configuration
//!
//! Defaults reproduce the source container as closely as possible. A TOML
//! file can override them:
//!
//! ```toml
//! use_recorded_order = true
//! registry_fallback = "sorted"
//! strict = false
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Registry order used when no recorded order is available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryFallback {
    /// Entities and their references in workspace walk order
    #[default]
    Walk,
    /// Ascending TUID
    Sorted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Honour the registry and name orders recorded at extraction
    pub use_recorded_order: bool,
    pub registry_fallback: RegistryFallback,
    /// Treat any collected warning as a failed run
    pub strict: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            use_recorded_order: true,
            registry_fallback: RegistryFallback::Walk,
            strict: false,
        }
    }
}

impl CodecConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Ignore recorded orders and rebuild canonically
    pub fn canonical(mut self) -> Self {
        self.use_recorded_order = false;
        self
    }

    pub fn with_registry_fallback(mut self, fallback: RegistryFallback) -> Self {
        self.registry_fallback = fallback;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CodecConfig::default();
        assert!(config.use_recorded_order);
        assert_eq!(config.registry_fallback, RegistryFallback::Walk);
        assert!(!config.strict);
    }

    #[test]
    fn test_partial_toml() {
        let config = CodecConfig::from_toml_str("registry_fallback = \"sorted\"").unwrap();
        assert_eq!(config.registry_fallback, RegistryFallback::Sorted);
        assert!(config.use_recorded_order);
    }

    #[test]
    fn test_bad_toml() {
        let result = CodecConfig::from_toml_str("registry_fallback = \"random\"");
        assert!(matches!(result, Err(crate::error::IghwError::Config(_))));
    }

    #[test]
    fn test_builder() {
        let config = CodecConfig::new()
            .canonical()
            .with_registry_fallback(RegistryFallback::Sorted)
            .strict(true);
        assert!(!config.use_recorded_order);
        assert!(config.strict);
    }
}
