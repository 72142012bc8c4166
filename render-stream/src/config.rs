use crate::error::{RenderStreamError, Result};
use crate::priority::ThreadPriority;
use crate::queue::render_frames::{DEFAULT_RENDER_DELAY_MS, MAX_RENDER_DELAY_MS, MIN_RENDER_DELAY_MS};
use crate::rate::DEFAULT_RATE_WINDOW_MS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 投递线程启动后第一次唤醒的延迟
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 10;
/// 投递线程单次等待上限
pub const DEFAULT_MAX_WAIT_MS: u64 = 100;
pub const DEFAULT_THREAD_NAME: &str = "IncomingVideoStreamThread";

/// Incoming stream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Deliver frames synchronously from `submit` instead of buffering them
    pub disable_prerenderer_smoothing: bool,

    /// Incoming rate statistics window in milliseconds
    pub rate_window_ms: u64,

    /// Initial target render delay applied to the frame queue
    pub render_delay_ms: u32,

    /// Delivery thread settings
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Delay before the first timer wake after start
    pub startup_delay_ms: u64,

    /// Upper bound for a single wait of the delivery loop
    pub max_wait_ms: u64,

    /// Scheduling priority requested for the delivery thread
    pub thread_priority: ThreadPriority,

    /// Delivery thread name
    pub thread_name: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            disable_prerenderer_smoothing: false,
            rate_window_ms: DEFAULT_RATE_WINDOW_MS,
            render_delay_ms: DEFAULT_RENDER_DELAY_MS,
            delivery: DeliveryConfig::default(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: DEFAULT_STARTUP_DELAY_MS,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
            thread_priority: ThreadPriority::Realtime,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl DeliveryConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl StreamConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RenderStreamError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: StreamConfig = toml::from_str(&content).map_err(|e| {
            RenderStreamError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RenderStreamError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rate_window_ms == 0 {
            return Err(RenderStreamError::Config(
                "Rate window must be greater than 0".to_string(),
            ));
        }

        if !(MIN_RENDER_DELAY_MS..=MAX_RENDER_DELAY_MS).contains(&self.render_delay_ms) {
            return Err(RenderStreamError::Config(format!(
                "Render delay must be between {}ms and {}ms",
                MIN_RENDER_DELAY_MS, MAX_RENDER_DELAY_MS
            )));
        }

        if self.delivery.max_wait_ms == 0 {
            return Err(RenderStreamError::Config(
                "Max wait must be greater than 0".to_string(),
            ));
        }

        if self.delivery.startup_delay_ms > self.delivery.max_wait_ms {
            return Err(RenderStreamError::Config(
                "Startup delay cannot exceed max wait".to_string(),
            ));
        }

        if self.delivery.thread_name.is_empty() {
            return Err(RenderStreamError::Config(
                "Delivery thread name cannot be empty".to_string(),
            ));
        }

        if self.delivery.thread_name.contains('\0') {
            return Err(RenderStreamError::Config(
                "Delivery thread name cannot contain NUL bytes".to_string(),
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        use std::env;

        if let Ok(disable) = env::var("RENDER_STREAM_DISABLE_SMOOTHING") {
            self.disable_prerenderer_smoothing = disable.to_lowercase() == "true";
        }
        if let Ok(window) = env::var("RENDER_STREAM_RATE_WINDOW_MS") {
            if let Ok(window) = window.parse::<u64>() {
                self.rate_window_ms = window;
            }
        }
        if let Ok(delay) = env::var("RENDER_STREAM_RENDER_DELAY_MS") {
            if let Ok(delay) = delay.parse::<u32>() {
                self.render_delay_ms = delay;
            }
        }
        if let Ok(wait) = env::var("RENDER_STREAM_MAX_WAIT_MS") {
            if let Ok(wait) = wait.parse::<u64>() {
                self.delivery.max_wait_ms = wait;
            }
        }
    }
}
