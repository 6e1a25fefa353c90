//! Configuration management for the Iris gateway

pub mod file;

use crate::Result;

/// Iris gateway configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// HTTP/WebSocket server configuration
    pub server: ServerConfig,

    /// Rolling context store configuration
    pub context: ContextConfig,

    /// Perceptual cache configuration
    pub cache: CacheConfig,

    /// Frame pipeline configuration
    pub pipeline: PipelineConfig,

    /// Frame change detection configuration
    pub diff: DiffConfig,

    /// Captioning provider configuration
    pub captioner: CaptionerConfig,

    /// Ephemeral credential minting configuration
    pub credentials: CredentialConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Requests per minute allowed on `/api` routes
    pub rate_limit_per_minute: u32,

    /// Maximum number of concurrently registered sessions
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            rate_limit_per_minute: 60,
            max_sessions: 100,
        }
    }
}

/// Rolling context store configuration
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Hard token budget for the entry log
    pub max_tokens: usize,

    /// Estimated token total at which compaction starts
    pub compression_trigger: usize,

    /// Maximum number of visual entries retained
    pub visual_history_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 128_000,
            compression_trigger: 100_000,
            visual_history_size: 10,
        }
    }
}

/// Perceptual cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for cached descriptions, in seconds
    pub ttl_seconds: u64,

    /// Maximum number of cached descriptions
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 60,
            max_entries: 50,
        }
    }
}

/// Frame pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Longest output dimension after resizing
    pub max_resolution: u32,

    /// JPEG quality in the 0.0–1.0 range
    pub compression_quality: f32,

    /// Capacity of the recent-frames ring buffer and the intake channel
    pub buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_resolution: 1024,
            compression_quality: 0.8,
            buffer_size: 5,
        }
    }
}

/// Frame change detection configuration
#[derive(Debug, Clone)]
pub struct DiffConfig {
    /// Minimum change ratio for a frame to be processed
    pub change_threshold: f64,

    /// Padding in pixels added around the detected active region
    pub region_padding: u32,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            change_threshold: 0.02,
            region_padding: 20,
        }
    }
}

/// Captioning provider configuration
#[derive(Debug, Clone, Default)]
pub struct CaptionerConfig {
    /// Anthropic API key for the vision captioner
    pub api_key: Option<String>,

    /// Model identifier override
    pub model: Option<String>,
}

/// Ephemeral credential minting configuration
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// `OpenAI` API key used to mint realtime session credentials
    pub openai_api_key: Option<String>,

    /// Realtime model requested for minted sessions
    pub realtime_model: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            realtime_model: "gpt-4o-realtime-preview-2024-12-17".to_string(),
        }
    }
}

/// Parse an env var, falling back when unset or unparsable
fn env_parse<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

impl Config {
    /// Build configuration from environment variables with fallback to defaults
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            server: ServerConfig {
                port: env_parse("IRIS_PORT", defaults.server.port),
                rate_limit_per_minute: env_parse(
                    "IRIS_RATE_LIMIT",
                    defaults.server.rate_limit_per_minute,
                ),
                max_sessions: env_parse("IRIS_MAX_SESSIONS", defaults.server.max_sessions),
            },
            context: ContextConfig {
                max_tokens: env_parse("IRIS_MAX_TOKENS", defaults.context.max_tokens),
                compression_trigger: env_parse(
                    "IRIS_COMPRESSION_TRIGGER",
                    defaults.context.compression_trigger,
                ),
                visual_history_size: env_parse(
                    "IRIS_VISUAL_HISTORY",
                    defaults.context.visual_history_size,
                ),
            },
            cache: CacheConfig {
                ttl_seconds: env_parse("IRIS_CACHE_TTL", defaults.cache.ttl_seconds),
                max_entries: env_parse("IRIS_CACHE_ENTRIES", defaults.cache.max_entries),
            },
            pipeline: PipelineConfig {
                max_resolution: env_parse("IRIS_MAX_RESOLUTION", defaults.pipeline.max_resolution),
                compression_quality: env_parse(
                    "IRIS_COMPRESSION_QUALITY",
                    defaults.pipeline.compression_quality,
                ),
                buffer_size: env_parse("IRIS_BUFFER_SIZE", defaults.pipeline.buffer_size),
            },
            diff: DiffConfig {
                change_threshold: env_parse(
                    "IRIS_CHANGE_THRESHOLD",
                    defaults.diff.change_threshold,
                ),
                region_padding: env_parse("IRIS_REGION_PADDING", defaults.diff.region_padding),
            },
            captioner: CaptionerConfig {
                api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                model: std::env::var("IRIS_VISION_MODEL").ok(),
            },
            credentials: CredentialConfig {
                openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
                realtime_model: std::env::var("OPENAI_REALTIME_MODEL")
                    .unwrap_or(defaults.credentials.realtime_model),
            },
        }
    }

    /// Load configuration, layering an optional TOML file over env and defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(config_path: Option<&std::path::Path>) -> Result<Self> {
        let mut config = Self::from_env();

        if let Some(path) = config_path {
            let overlay = file::IrisConfigFile::load(path)?;
            overlay.apply(&mut config);
            tracing::debug!(path = %path.display(), "applied config file overlay");
        }

        Ok(config)
    }
}
