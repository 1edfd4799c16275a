//! Generator configuration.
//!
//! Values come from environment variables (see [`GeneratorConfig::from_env`]);
//! anything unset falls back to [`Default`].

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const ENV_TICK_MS: &str = "GENERATOR_TICK_MS";
pub const ENV_TOPIC: &str = "MQTT_TOPIC_GENERATED";
pub const ENV_VIEW_BUFFER: &str = "GENERATOR_VIEW_BUFFER";
pub const ENV_OUTBOX_BUFFER: &str = "GENERATOR_OUTBOX_BUFFER";
pub const ENV_PUBLISH_TIMEOUT_MS: &str = "GENERATOR_PUBLISH_TIMEOUT_MS";
pub const ENV_SEED: &str = "GENERATOR_SEED";

pub const DEFAULT_TOPIC: &str = "fleet/vehicles/generated";

/// Configuration for one generation controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Period between ticks.
    pub tick_interval: Duration,

    /// Bus topic every generated record is published to.
    pub generated_topic: String,

    /// Capacity of the view-update broadcast channel. Slow subscribers
    /// lagging further than this skip messages.
    pub view_buffer_size: usize,

    /// Capacity of the per-run bus outbox. Records are dropped when full.
    pub outbox_buffer_size: usize,

    /// Upper bound on a single bus publish.
    pub publish_timeout: Duration,

    /// Fixed PRNG seed; `None` seeds from OS entropy on every Start.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            generated_topic: DEFAULT_TOPIC.to_string(),
            view_buffer_size: 1024,
            outbox_buffer_size: 4096,
            publish_timeout: Duration::from_millis(2000),
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let tick_ms: Option<u64> = parse_opt(&lookup, ENV_TICK_MS, "milliseconds")?;
        let timeout_ms: Option<u64> = parse_opt(&lookup, ENV_PUBLISH_TIMEOUT_MS, "milliseconds")?;

        let config = Self {
            tick_interval: tick_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            generated_topic: lookup(ENV_TOPIC).unwrap_or(defaults.generated_topic),
            view_buffer_size: parse_opt(&lookup, ENV_VIEW_BUFFER, "integer")?
                .unwrap_or(defaults.view_buffer_size),
            outbox_buffer_size: parse_opt(&lookup, ENV_OUTBOX_BUFFER, "integer")?
                .unwrap_or(defaults.outbox_buffer_size),
            publish_timeout: timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.publish_timeout),
            seed: parse_opt(&lookup, ENV_SEED, "integer")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Zero { key: ENV_TICK_MS });
        }
        if self.generated_topic.trim().is_empty() {
            return Err(ConfigError::Empty { key: ENV_TOPIC });
        }
        if self.view_buffer_size == 0 {
            return Err(ConfigError::Zero {
                key: ENV_VIEW_BUFFER,
            });
        }
        if self.outbox_buffer_size == 0 {
            return Err(ConfigError::Zero {
                key: ENV_OUTBOX_BUFFER,
            });
        }
        if self.publish_timeout.is_zero() {
            return Err(ConfigError::Zero {
                key: ENV_PUBLISH_TIMEOUT_MS,
            });
        }
        Ok(())
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn generated_topic(mut self, topic: impl Into<String>) -> Self {
        self.generated_topic = topic.into();
        self
    }

    pub fn view_buffer_size(mut self, size: usize) -> Self {
        self.view_buffer_size = size;
        self
    }

    pub fn outbox_buffer_size(mut self, size: usize) -> Self {
        self.outbox_buffer_size = size;
        self
    }

    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

fn parse_opt<T, F>(lookup: &F, key: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Parse {
                key,
                value: raw,
                expected,
            }),
    }
}
