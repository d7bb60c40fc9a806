use crate::error::{EngineError, Result};
use locator_geo::geometry::DEFAULT_BUFFER_RADIUS_DEG;
use locator_geo::DEFAULT_GEOCODE_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_ZONE_COLOR: &str = "#FFCA3A";

const ENV_BATCH_SIZE: &str = "LOCATOR_BATCH_SIZE";
const ENV_BATCH_PAUSE_MS: &str = "LOCATOR_BATCH_PAUSE_MS";
const ENV_REMOTE_FALLBACK: &str = "LOCATOR_REMOTE_FALLBACK";
const ENV_GEOCODE_ENDPOINT: &str = "LOCATOR_GEOCODE_ENDPOINT";

/// Configuration for the aggregation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Codes processed per batch
    pub batch_size: usize,

    /// Pause between batches in milliseconds (0 = plain cooperative yield)
    pub batch_pause_ms: u64,

    /// Send postal codes missing from the local tables to the remote geocoder
    pub remote_fallback: bool,

    /// CSV batch geocoding endpoint
    pub geocode_endpoint: String,

    /// Ring radius, in degrees, used to synthesize zone boundaries
    pub buffer_radius_deg: f64,

    /// Display color carried by every zone
    pub zone_color: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause_ms: 0,
            remote_fallback: true,
            geocode_endpoint: DEFAULT_GEOCODE_ENDPOINT.to_string(),
            buffer_radius_deg: DEFAULT_BUFFER_RADIUS_DEG,
            zone_color: DEFAULT_ZONE_COLOR.to_string(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| EngineError::invalid_config(format!("{name}='{raw}' is not a valid value")))
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EngineError::invalid_config(format!(
            "{name}='{raw}' is not a boolean"
        ))),
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `LOCATOR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(ENV_BATCH_SIZE) {
            self.batch_size = parse_env(ENV_BATCH_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BATCH_PAUSE_MS) {
            self.batch_pause_ms = parse_env(ENV_BATCH_PAUSE_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REMOTE_FALLBACK) {
            self.remote_fallback = parse_env_bool(ENV_REMOTE_FALLBACK, &raw)?;
        }
        if let Some(raw) = lookup(ENV_GEOCODE_ENDPOINT) {
            self.geocode_endpoint = raw.trim().to_string();
        }
        self.validate()
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EngineError::invalid_config("batch_size must be > 0"));
        }
        if !self.buffer_radius_deg.is_finite() || self.buffer_radius_deg <= 0.0 {
            return Err(EngineError::invalid_config(format!(
                "buffer_radius_deg must be a positive number, got {}",
                self.buffer_radius_deg
            )));
        }
        if self.remote_fallback && self.geocode_endpoint.trim().is_empty() {
            return Err(EngineError::invalid_config(
                "geocode_endpoint is required when remote_fallback is enabled",
            ));
        }
        Ok(())
    }
}
