//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GhostTrailError, GhostTrailResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Frame sampling and trail compositing parameters.
    pub analysis: AnalysisConfig,

    /// Where finished composites go.
    pub output: OutputConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Parameters for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// A pixel whose red, green or blue component exceeds this value is
    /// treated as background and made transparent.
    pub background_threshold: u8,

    /// The decoder is asked for frames no larger than the asset's natural
    /// size divided by this value.
    pub downscale_divisor: u32,

    /// Upper bound on the number of sampled frames per run.
    pub max_samples: usize,

    /// Order in which arriving frames are blended into the composite.
    pub apply_order: ApplyOrder,

    /// What the trail is drawn on top of.
    pub backdrop: Backdrop,

    /// Maximum number of frame extractions a decoder backend runs at once.
    pub decode_concurrency: usize,

    /// Frames that may wait for an earlier sample under [`ApplyOrder::Plan`].
    /// Once exceeded, the waiting frames are applied and the run continues
    /// in arrival order. Zero disables buffering.
    pub plan_buffer_limit: usize,
}

/// Order in which decoded frames are applied to the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOrder {
    /// Buffer early arrivals and apply strictly in sample order.
    /// Progress is monotonic.
    #[default]
    Plan,
    /// Apply each frame as soon as it arrives. Progress may move backwards
    /// when the decoder delivers out of order.
    Arrival,
}

/// Base layer of the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backdrop {
    /// The trail starts from the first cleaned frame.
    #[default]
    Transparent,
    /// The trail is painted over the first sampled frame, uncleaned.
    FirstFrame,
}

/// Output settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// When set, the composite is written here as PNG as soon as a run
    /// completes.
    pub auto_export_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "ghosttrail=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            background_threshold: 50,
            downscale_divisor: 2,
            max_samples: 1500,
            apply_order: ApplyOrder::default(),
            backdrop: Backdrop::default(),
            decode_concurrency: 4,
            plan_buffer_limit: 64,
        }
    }
}

impl AnalysisConfig {
    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> GhostTrailResult<()> {
        if self.downscale_divisor == 0 {
            return Err(GhostTrailError::config("downscale_divisor must be >= 1"));
        }
        if self.decode_concurrency == 0 {
            return Err(GhostTrailError::config("decode_concurrency must be >= 1"));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Config from [`config_file_path`], or defaults when it is missing or
    /// unusable.
    pub fn load() -> Self {
        let path = config_file_path();
        match Self::load_from(&path) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring config file");
                Self::default()
            }
        }
    }

    /// Read `path`. `Ok(None)` when there is no such file.
    pub fn load_from(path: &Path) -> GhostTrailResult<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json_str(&content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Parse and validate a JSON config document.
    pub fn from_json_str(content: &str) -> GhostTrailResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.analysis.validate()?;
        Ok(config)
    }

    /// Write to [`config_file_path`]. Returns the path written.
    pub fn save(&self) -> GhostTrailResult<PathBuf> {
        let path = config_file_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write pretty JSON to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> GhostTrailResult<()> {
        self.analysis.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// `$XDG_CONFIG_HOME/ghosttrail/config.json`, with `~/.config` standing in
/// for an unset `XDG_CONFIG_HOME`.
pub fn config_file_path() -> PathBuf {
    let config_home = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(std::env::temp_dir);
    config_home.join("ghosttrail").join("config.json")
}
