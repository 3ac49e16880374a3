//! Configuration structures
//!
//! Loaded from TOML. Every section has defaults, so a partial file (or no
//! file at all) yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::channel::Channel;
use crate::constants::*;
use crate::controller::SwitchPolicy;
use crate::driver::{BufferSizeInfo, SimulatedDriverConfig};
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub driver: DriverConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Platform config location, e.g. `~/.config/asio-buffers/asio-buffers.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "asio-buffers")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Load `path` if given, else the default path if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {}", path.display());
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.driver.validate()?;
        self.session.validate()
    }
}

/// Simulated driver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub name: String,
    pub input_channels: u32,
    pub output_channels: u32,
    pub sample_rate: f64,
    pub min_buffer_frames: usize,
    pub max_buffer_frames: usize,
    pub preferred_buffer_frames: usize,
    /// `-1` for powers of two, otherwise the step between sizes
    pub buffer_granularity: i32,
    /// Channels reported without addressable buffers
    pub unbufferable: Vec<Channel>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: "Simulated ASIO".to_string(),
            input_channels: 2,
            output_channels: 2,
            sample_rate: DEFAULT_SAMPLE_RATE,
            min_buffer_frames: 32,
            max_buffer_frames: 4096,
            preferred_buffer_frames: DEFAULT_HALF_BUFFER_FRAMES,
            buffer_granularity: -1,
            unbufferable: Vec::new(),
        }
    }
}

impl DriverConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate <= 0.0 {
            return Err(Error::Config(format!("invalid sample rate {}", self.sample_rate)));
        }
        if self.min_buffer_frames == 0 || self.min_buffer_frames > self.max_buffer_frames {
            return Err(Error::Config(format!(
                "invalid buffer size range {}..={}",
                self.min_buffer_frames, self.max_buffer_frames
            )));
        }
        Ok(())
    }

    pub fn buffer_size(&self) -> BufferSizeInfo {
        BufferSizeInfo {
            min: self.min_buffer_frames,
            max: self.max_buffer_frames,
            preferred: self.preferred_buffer_frames,
            granularity: self.buffer_granularity,
        }
    }

    pub fn simulated(&self) -> SimulatedDriverConfig {
        let defaults = SimulatedDriverConfig::default();
        let mut supported_rates = defaults.supported_rates;
        if !supported_rates.contains(&self.sample_rate) {
            supported_rates.push(self.sample_rate);
        }
        SimulatedDriverConfig {
            name: self.name.clone(),
            input_channels: self.input_channels,
            output_channels: self.output_channels,
            sample_rate: self.sample_rate,
            supported_rates,
            buffer_size: self.buffer_size(),
            safety_offset: defaults.safety_offset,
            unbufferable: self.unbufferable.clone(),
        }
    }
}

/// Which standard switch policy to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    Loopback,
    CaptureOnly,
}

impl From<PolicyKind> for SwitchPolicy {
    fn from(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Loopback => SwitchPolicy::loopback(),
            PolicyKind::CaptureOnly => SwitchPolicy::capture_only(),
        }
    }
}

/// Buffer session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Half-buffer length; `None` uses the driver's preferred size
    pub half_buffer_frames: Option<usize>,
    pub inputs: Vec<u32>,
    pub outputs: Vec<u32>,
    pub policy: PolicyKind,
    pub fetch_interval_ms: u64,
    /// Stop after this many seconds; run until interrupted when absent
    pub duration_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            half_buffer_frames: None,
            inputs: vec![0],
            outputs: vec![0],
            policy: PolicyKind::Loopback,
            fetch_interval_ms: DEFAULT_FETCH_INTERVAL_MS,
            duration_secs: None,
        }
    }
}

impl SessionConfig {
    /// Channel descriptors in request order: inputs, then outputs
    pub fn channels(&self) -> Vec<Channel> {
        self.inputs
            .iter()
            .map(|&n| Channel::input(n))
            .chain(self.outputs.iter().map(|&n| Channel::output(n)))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() && self.outputs.is_empty() {
            return Err(Error::Config("no channels configured".to_string()));
        }
        if self.half_buffer_frames == Some(0) {
            return Err(Error::Config("half_buffer_frames must be positive".to_string()));
        }
        if self.fetch_interval_ms == 0 {
            return Err(Error::Config("fetch_interval_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.channels(), vec![Channel::input(0), Channel::output(0)]);
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [driver]
            input_channels = 8
            unbufferable = [{ number = 0, direction = "input" }]

            [session]
            half_buffer_frames = 64
            inputs = [1]
            outputs = []
            policy = "capture-only"
            "#,
        )
        .unwrap();

        assert_eq!(config.driver.input_channels, 8);
        assert_eq!(config.driver.output_channels, 2);
        assert_eq!(config.driver.unbufferable, vec![Channel::input(0)]);
        assert_eq!(config.session.half_buffer_frames, Some(64));
        assert_eq!(config.session.policy, PolicyKind::CaptureOnly);
        assert_eq!(config.session.channels(), vec![Channel::input(1)]);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AppConfig::default();
        config.session.duration_secs = Some(5);
        let text = config.to_toml_string().unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            AppConfig::from_toml_str("[session]\ninputs = []\noutputs = []"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[session]\nhalf_buffer_frames = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[driver]\nsample_rate = -1.0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(AppConfig::from_toml_str("session = 3"), Err(Error::Config(_))));
    }

    #[test]
    fn test_simulated_driver_config() {
        let mut driver = DriverConfig::default();
        driver.sample_rate = 22_050.0;
        let simulated = driver.simulated();
        assert_eq!(simulated.sample_rate, 22_050.0);
        assert!(simulated.supported_rates.contains(&22_050.0));
        assert_eq!(simulated.buffer_size.preferred, DEFAULT_HALF_BUFFER_FRAMES);
    }

    #[test]
    fn test_policy_kind_conversion() {
        assert_eq!(SwitchPolicy::from(PolicyKind::Loopback).name(), "loopback");
        assert_eq!(SwitchPolicy::from(PolicyKind::CaptureOnly).name(), "capture-only");
    }
}
