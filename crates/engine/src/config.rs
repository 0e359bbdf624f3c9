//! Engine configuration.
//!
//! This module defines the tunables of one emulator. It provides:
//! 1. **Defaults:** Baseline constants (page size, block-scan limit).
//! 2. **Structure:** [`EngineConfig`], deserializable with every field optional.
//! 3. **Validation:** Rejection of page sizes and limits the engine cannot honour.
//!
//! Configuration is supplied programmatically, or as JSON via [`EngineConfig::from_json`].

use serde::{Deserialize, Serialize};

use crate::common::ConfigError;
use crate::common::constants::{MAX_BLOCK_INSTRUCTIONS, PAGE_SIZE};

/// Default configuration constants.
mod defaults {
    use super::{MAX_BLOCK_INSTRUCTIONS, PAGE_SIZE};

    /// Mapping granularity (4 KiB).
    pub const PAGE_SIZE_BYTES: u64 = PAGE_SIZE;

    /// Decoded instructions are cached unless disabled.
    pub const DECODE_CACHE: bool = true;

    /// Instructions scanned when estimating a block's size.
    pub const BLOCK_LIMIT: usize = MAX_BLOCK_INSTRUCTIONS;
}

/// Per-emulator configuration.
///
/// # Examples
///
/// ```
/// use emuctl_core::config::EngineConfig;
///
/// let json = r#"{ "page_size": 65536, "trace_instructions": true }"#;
/// let config = EngineConfig::from_json(json).unwrap();
/// assert_eq!(config.page_size, 0x10000);
/// assert!(config.decode_cache);
/// assert_eq!(config.max_mapped_bytes, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Mapping granularity in bytes. Must be a power of two.
    #[serde(default = "EngineConfig::default_page_size")]
    pub page_size: u64,

    /// Upper bound on total mapped bytes (`None` is unlimited).
    #[serde(default)]
    pub max_mapped_bytes: Option<u64>,

    /// Cache decoded instructions between steps.
    #[serde(default = "EngineConfig::default_decode_cache")]
    pub decode_cache: bool,

    /// Instructions scanned when estimating a basic block's size for block hooks.
    #[serde(default = "EngineConfig::default_max_block_instructions")]
    pub max_block_instructions: usize,

    /// Emit a `trace!` event for every executed instruction.
    #[serde(default)]
    pub trace_instructions: bool,
}

impl EngineConfig {
    fn default_page_size() -> u64 {
        defaults::PAGE_SIZE_BYTES
    }

    fn default_decode_cache() -> bool {
        defaults::DECODE_CACHE
    }

    fn default_max_block_instructions() -> usize {
        defaults::BLOCK_LIMIT
    }

    /// Parses a JSON configuration; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` for malformed JSON, or any validation error.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the engine cannot honour.
    ///
    /// # Errors
    ///
    /// `InvalidPageSize` unless `page_size` is a power of two, and
    /// `InvalidBlockLimit` if `max_block_instructions` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.page_size.is_power_of_two() {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }
        if self.max_block_instructions == 0 {
            return Err(ConfigError::InvalidBlockLimit);
        }
        Ok(())
    }

    /// Returns `true` if per-instruction tracing is on, either by
    /// configuration or by the `always-trace` feature.
    pub const fn tracing(&self) -> bool {
        self.trace_instructions || cfg!(feature = "always-trace")
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: defaults::PAGE_SIZE_BYTES,
            max_mapped_bytes: None,
            decode_cache: defaults::DECODE_CACHE,
            max_block_instructions: defaults::BLOCK_LIMIT,
            trace_instructions: false,
        }
    }
}
