use crate::error::{Result, RotationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
	/// Poll loop period
	#[serde(default = "default_tick_interval")]
	pub tick_interval_ms: u64,

	/// Duration used for cameras without a usable `durationSec`
	#[serde(default = "default_duration")]
	pub default_duration_sec: u64,

	/// Floor applied when a camera duration is edited
	#[serde(default = "default_min_duration")]
	pub min_duration_sec: u64,

	/// Buffered store changes per subscriber before the oldest are dropped
	#[serde(default = "default_change_feed_capacity")]
	pub change_feed_capacity: usize,
}

fn default_tick_interval() -> u64 {
	500
}

fn default_duration() -> u64 {
	30
}

fn default_min_duration() -> u64 {
	1
}

fn default_change_feed_capacity() -> usize {
	256
}

impl RotationConfig {
	#[must_use]
	pub fn with_tick_interval(mut self, interval_ms: u64) -> Self {
		self.tick_interval_ms = interval_ms;
		self
	}

	#[must_use]
	pub fn with_default_duration(mut self, duration_sec: u64) -> Self {
		self.default_duration_sec = duration_sec;
		self
	}

	pub fn tick_interval(&self) -> Duration {
		Duration::from_millis(self.tick_interval_ms)
	}

	pub fn validate(&self) -> Result<()> {
		if self.tick_interval_ms == 0 {
			return Err(RotationError::InvalidConfig("tick interval must be positive".into()));
		}
		if self.default_duration_sec == 0 {
			return Err(RotationError::InvalidConfig("default camera duration must be positive".into()));
		}
		if self.min_duration_sec == 0 {
			return Err(RotationError::InvalidConfig("minimum camera duration must be positive".into()));
		}
		if self.change_feed_capacity == 0 {
			return Err(RotationError::InvalidConfig("change feed capacity must be positive".into()));
		}
		Ok(())
	}
}

impl Default for RotationConfig {
	fn default() -> Self {
		Self {
			tick_interval_ms: default_tick_interval(),
			default_duration_sec: default_duration(),
			min_duration_sec: default_min_duration(),
			change_feed_capacity: default_change_feed_capacity(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = RotationConfig::default();
		assert_eq!(config.tick_interval(), Duration::from_millis(500));
		assert_eq!(config.default_duration_sec, 30);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_partial_config_fills_defaults() {
		let config: RotationConfig = serde_json::from_str(r#"{"tick_interval_ms": 250}"#).unwrap();
		assert_eq!(config.tick_interval_ms, 250);
		assert_eq!(config.min_duration_sec, 1);
	}

	#[test]
	fn test_validation() {
		assert!(RotationConfig::default().with_tick_interval(0).validate().is_err());
		assert!(RotationConfig::default().with_default_duration(0).validate().is_err());
	}
}
