//! Configuration system
//!
//! Engine settings are plain serde structs that can be stored as TOML or
//! RON. The file extension selects the format.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        match extension(path) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Viewport scale override for one render stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageScale {
    /// Index of the render stage in the graph
    pub stage: usize,
    /// Horizontal and vertical scale applied to the window size
    pub scale: [f32; 2],
}

/// # Engine Configuration
///
/// Core engine behavior: logging, entity storage growth, and the
/// render-graph knobs that are not baked into the stage declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Entity slots allocated up front
    pub entity_capacity: usize,
    /// Fixed number of slots added whenever entity storage is full
    pub entity_grow_step: usize,
    /// Requested MSAA sample count for multisampled attachments
    pub msaa_samples: u32,
    /// Prefer push descriptors over persistent descriptor sets
    pub push_descriptors: bool,
    /// Per-stage viewport scale overrides
    pub stages: Vec<StageScale>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            entity_capacity: 64,
            entity_grow_step: 64,
            msaa_samples: 4,
            push_descriptors: false,
            stages: Vec::new(),
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entity_capacity == 0 {
            return Err(ConfigError::Invalid("entity_capacity must be at least 1".into()));
        }
        if self.entity_grow_step == 0 {
            return Err(ConfigError::Invalid("entity_grow_step must be at least 1".into()));
        }
        if !self.msaa_samples.is_power_of_two() || self.msaa_samples > 64 {
            return Err(ConfigError::Invalid(format!(
                "msaa_samples must be a power of two up to 64, got {}",
                self.msaa_samples
            )));
        }
        Ok(())
    }

    /// Start logging with `log_level` as the default filter
    pub fn init_logging(&self) {
        crate::foundation::logging::init(&self.log_level);
    }

    /// Scale override for a stage, if one is configured
    pub fn stage_scale(&self, stage: usize) -> Option<[f32; 2]> {
        self.stages.iter().find(|s| s.stage == stage).map(|s| s.scale)
    }
}
