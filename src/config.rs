//! Configuration loading helpers.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::schema::FieldSpec;

/// Errors returned by configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error while reading config files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error.
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Invalid value for a key.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Raw value string.
        value: String,
    },
    /// Unknown configuration key.
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    /// A combination of values that cannot work.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration for a cache instance.
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Starting ring capacity.
    pub initial_size: u64,
    /// Whether the capacity controller is enabled.
    pub auto_resize: bool,
    /// Target mean residency, in minutes.
    pub desired_eject_mins: f64,
    /// Absolute lower capacity bound for automatic resizing.
    pub auto_min_size: u64,
    /// Absolute upper capacity bound for automatic resizing.
    pub auto_max_size: u64,
    /// Length of the controller's monitoring window, in minutes.
    pub monitor_period_mins: f64,
    /// Deadband around the residency target, in percent: deviations
    /// within it trigger no resize.
    pub trigger_adjust_percent: f64,
    /// Per-decision growth cap, in percent of current capacity.
    pub max_adjust_percent_up: f64,
    /// Per-decision shrink cap, in percent of current capacity.
    pub max_adjust_percent_down: f64,
    /// Batch size for transported ejection during shrink and drain.
    pub drain_parallel_items: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            initial_size: 1_000_000,
            auto_resize: false,
            desired_eject_mins: 15.0,
            auto_min_size: 10_000,
            auto_max_size: 10_000_000,
            monitor_period_mins: 10.0,
            trigger_adjust_percent: 20.0,
            max_adjust_percent_up: 25.0,
            max_adjust_percent_down: 10.0,
            drain_parallel_items: 100,
        }
    }
}

impl RingConfig {
    /// Create a configuration with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starting ring capacity.
    pub fn with_initial_size(mut self, size: u64) -> Self {
        self.initial_size = size;
        self
    }

    /// Enable or disable the capacity controller.
    pub fn with_auto_resize(mut self, enabled: bool) -> Self {
        self.auto_resize = enabled;
        self
    }

    /// Set the target mean residency, in minutes.
    pub fn with_desired_eject_mins(mut self, mins: f64) -> Self {
        self.desired_eject_mins = mins;
        self
    }

    /// Set the absolute capacity bounds for automatic resizing.
    pub fn with_auto_bounds(mut self, min: u64, max: u64) -> Self {
        self.auto_min_size = min;
        self.auto_max_size = max;
        self
    }

    /// Set the monitoring window length, in minutes.
    pub fn with_monitor_period_mins(mut self, mins: f64) -> Self {
        self.monitor_period_mins = mins;
        self
    }

    /// Set the deadband around the residency target, in percent.
    pub fn with_trigger_adjust_percent(mut self, percent: f64) -> Self {
        self.trigger_adjust_percent = percent;
        self
    }

    /// Set the asymmetric per-decision slew caps, in percent.
    pub fn with_max_adjust_percent(mut self, up: f64, down: f64) -> Self {
        self.max_adjust_percent_up = up;
        self.max_adjust_percent_down = down;
        self
    }

    /// Set the batch size for transported ejection.
    pub fn with_drain_parallel_items(mut self, items: usize) -> Self {
        self.drain_parallel_items = items;
        self
    }

    /// Check the configuration for impossible combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_size == 0 {
            return Err(ConfigError::Invalid("initial_size must be nonzero".into()));
        }
        if self.auto_min_size == 0 {
            return Err(ConfigError::Invalid("auto_min_size must be nonzero".into()));
        }
        if self.auto_min_size > self.auto_max_size {
            return Err(ConfigError::Invalid(format!(
                "auto_min_size {} exceeds auto_max_size {}",
                self.auto_min_size, self.auto_max_size
            )));
        }
        if self.monitor_period_mins <= 0.0 {
            return Err(ConfigError::Invalid(
                "monitor_period_mins must be positive".into(),
            ));
        }
        if self.desired_eject_mins <= 0.0 {
            return Err(ConfigError::Invalid(
                "desired_eject_mins must be positive".into(),
            ));
        }
        if self.drain_parallel_items == 0 {
            return Err(ConfigError::Invalid(
                "drain_parallel_items must be nonzero".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration schema for file/env loading.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RingdexConfig {
    /// Cache configuration.
    pub cache: Option<CacheSection>,
    /// Capacity-controller configuration.
    pub sizing: Option<SizingSection>,
    /// Record schema.
    pub schema: Option<SchemaSection>,
}

impl RingdexConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration from the `RINGDEX_CONFIG` env var (if set),
    /// then apply `RINGDEX__section__field` overrides.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let config_path = env::var("RINGDEX_CONFIG").ok();
        let mut config = match config_path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment overrides in-place.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        for (key, value) in env::vars() {
            if !key.starts_with("RINGDEX__") {
                continue;
            }
            let path = key["RINGDEX__".len()..].to_ascii_lowercase();
            let parts: Vec<&str> = path.split("__").collect();
            let value = value.trim().to_string();

            match parts.as_slice() {
                ["cache", "initial_size"] => {
                    self.cache_mut().initial_size = Some(parse_value(&key, &value)?);
                }
                ["cache", "drain_parallel_items"] => {
                    self.cache_mut().drain_parallel_items = Some(parse_value(&key, &value)?);
                }
                ["sizing", "auto_resize"] => {
                    self.sizing_mut().auto_resize = Some(parse_value(&key, &value)?);
                }
                ["sizing", "desired_eject_mins"] => {
                    self.sizing_mut().desired_eject_mins = Some(parse_value(&key, &value)?);
                }
                ["sizing", "auto_min_size"] => {
                    self.sizing_mut().auto_min_size = Some(parse_value(&key, &value)?);
                }
                ["sizing", "auto_max_size"] => {
                    self.sizing_mut().auto_max_size = Some(parse_value(&key, &value)?);
                }
                ["sizing", "monitor_period_mins"] => {
                    self.sizing_mut().monitor_period_mins = Some(parse_value(&key, &value)?);
                }
                ["sizing", "trigger_adjust_percent"] => {
                    self.sizing_mut().trigger_adjust_percent = Some(parse_value(&key, &value)?);
                }
                ["sizing", "max_adjust_percent_up"] => {
                    self.sizing_mut().max_adjust_percent_up = Some(parse_value(&key, &value)?);
                }
                ["sizing", "max_adjust_percent_down"] => {
                    self.sizing_mut().max_adjust_percent_down = Some(parse_value(&key, &value)?);
                }
                _ => return Err(ConfigError::UnknownKey(key)),
            }
        }

        Ok(())
    }

    /// Build a [`RingConfig`] using defaults plus overrides.
    pub fn to_ring_config(&self) -> RingConfig {
        let mut config = RingConfig::default();
        if let Some(cache) = &self.cache {
            cache.apply_to(&mut config);
        }
        if let Some(sizing) = &self.sizing {
            sizing.apply_to(&mut config);
        }
        config
    }

    /// Schema field descriptors from the config file, if present.
    pub fn schema_fields(&self) -> Option<&[FieldSpec]> {
        self.schema.as_ref().map(|schema| schema.field.as_slice())
    }

    fn cache_mut(&mut self) -> &mut CacheSection {
        if self.cache.is_none() {
            self.cache = Some(CacheSection::default());
        }
        self.cache.as_mut().expect("cache config")
    }

    fn sizing_mut(&mut self) -> &mut SizingSection {
        if self.sizing.is_none() {
            self.sizing = Some(SizingSection::default());
        }
        self.sizing.as_mut().expect("sizing config")
    }
}

/// Cache configuration overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSection {
    /// Starting ring capacity.
    pub initial_size: Option<u64>,
    /// Batch size for transported ejection.
    pub drain_parallel_items: Option<usize>,
}

impl CacheSection {
    fn apply_to(&self, config: &mut RingConfig) {
        if let Some(value) = self.initial_size {
            config.initial_size = value;
        }
        if let Some(value) = self.drain_parallel_items {
            config.drain_parallel_items = value.max(1);
        }
    }
}

/// Capacity-controller configuration overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SizingSection {
    /// Whether the capacity controller is enabled.
    pub auto_resize: Option<bool>,
    /// Target mean residency, in minutes.
    pub desired_eject_mins: Option<f64>,
    /// Absolute lower capacity bound.
    pub auto_min_size: Option<u64>,
    /// Absolute upper capacity bound.
    pub auto_max_size: Option<u64>,
    /// Monitoring window length, in minutes.
    pub monitor_period_mins: Option<f64>,
    /// Deadband around the residency target, in percent.
    pub trigger_adjust_percent: Option<f64>,
    /// Per-decision growth cap, in percent.
    pub max_adjust_percent_up: Option<f64>,
    /// Per-decision shrink cap, in percent.
    pub max_adjust_percent_down: Option<f64>,
}

impl SizingSection {
    fn apply_to(&self, config: &mut RingConfig) {
        if let Some(value) = self.auto_resize {
            config.auto_resize = value;
        }
        if let Some(value) = self.desired_eject_mins {
            config.desired_eject_mins = value;
        }
        if let Some(value) = self.auto_min_size {
            config.auto_min_size = value;
        }
        if let Some(value) = self.auto_max_size {
            config.auto_max_size = value;
        }
        if let Some(value) = self.monitor_period_mins {
            config.monitor_period_mins = value;
        }
        if let Some(value) = self.trigger_adjust_percent {
            config.trigger_adjust_percent = value;
        }
        if let Some(value) = self.max_adjust_percent_up {
            config.max_adjust_percent_up = value;
        }
        if let Some(value) = self.max_adjust_percent_down {
            config.max_adjust_percent_down = value;
        }
    }
}

/// Record schema from TOML (`[[schema.field]]` entries).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaSection {
    /// Ordered field descriptors.
    #[serde(default)]
    pub field: Vec<FieldSpec>,
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
