//! TOML configuration file loading
//!
//! All fields are optional — the file is a partial overlay on top of
//! environment variables and built-in defaults.

use std::path::Path;

use serde::Deserialize;

use crate::{Config, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct IrisConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Rolling context configuration
    #[serde(default)]
    pub context: ContextFileConfig,

    /// Perceptual cache configuration
    #[serde(default)]
    pub cache: CacheFileConfig,

    /// Frame pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineFileConfig,

    /// Change detection configuration
    #[serde(default)]
    pub diff: DiffFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Requests per minute on `/api` routes
    pub rate_limit_per_minute: Option<u32>,

    /// Maximum concurrently registered sessions
    pub max_sessions: Option<usize>,
}

/// Rolling context configuration
#[derive(Debug, Default, Deserialize)]
pub struct ContextFileConfig {
    pub max_tokens: Option<usize>,
    pub compression_trigger: Option<usize>,
    pub visual_history_size: Option<usize>,
}

/// Perceptual cache configuration
#[derive(Debug, Default, Deserialize)]
pub struct CacheFileConfig {
    pub ttl_seconds: Option<u64>,
    pub max_entries: Option<usize>,
}

/// Frame pipeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct PipelineFileConfig {
    pub max_resolution: Option<u32>,
    pub compression_quality: Option<f32>,
    pub buffer_size: Option<usize>,
}

/// Change detection configuration
#[derive(Debug, Default, Deserialize)]
pub struct DiffFileConfig {
    pub change_threshold: Option<f64>,
    pub region_padding: Option<u32>,
}

impl IrisConfigFile {
    /// Load and parse a TOML config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Apply this overlay onto a resolved configuration
    pub fn apply(self, config: &mut Config) {
        if let Some(port) = self.server.port {
            config.server.port = port;
        }
        if let Some(rpm) = self.server.rate_limit_per_minute {
            config.server.rate_limit_per_minute = rpm;
        }
        if let Some(max) = self.server.max_sessions {
            config.server.max_sessions = max;
        }
        if let Some(v) = self.context.max_tokens {
            config.context.max_tokens = v;
        }
        if let Some(v) = self.context.compression_trigger {
            config.context.compression_trigger = v;
        }
        if let Some(v) = self.context.visual_history_size {
            config.context.visual_history_size = v;
        }
        if let Some(v) = self.cache.ttl_seconds {
            config.cache.ttl_seconds = v;
        }
        if let Some(v) = self.cache.max_entries {
            config.cache.max_entries = v;
        }
        if let Some(v) = self.pipeline.max_resolution {
            config.pipeline.max_resolution = v;
        }
        if let Some(v) = self.pipeline.compression_quality {
            config.pipeline.compression_quality = v;
        }
        if let Some(v) = self.pipeline.buffer_size {
            config.pipeline.buffer_size = v;
        }
        if let Some(v) = self.diff.change_threshold {
            config.diff.change_threshold = v;
        }
        if let Some(v) = self.diff.region_padding {
            config.diff.region_padding = v;
        }
    }
}
