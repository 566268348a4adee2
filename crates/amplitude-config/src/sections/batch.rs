// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch (bulk upload) driver configuration section.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_BATCH_ENDPOINT: &str = "https://api2.amplitude.com/batch";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BatchConfigLayer {
	#[serde(default)]
	pub endpoint: Option<String>,
	#[serde(default)]
	pub timeout_secs: Option<u64>,
	#[serde(default)]
	pub batch_size: Option<usize>,
	#[serde(default)]
	pub retry_count: Option<u32>,
	#[serde(default)]
	pub retry_delay_ms: Option<u64>,
	#[serde(default)]
	pub max_in_flight: Option<usize>,
	#[serde(default)]
	pub jitter: Option<bool>,
}

impl BatchConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
		if other.batch_size.is_some() {
			self.batch_size = other.batch_size;
		}
		if other.retry_count.is_some() {
			self.retry_count = other.retry_count;
		}
		if other.retry_delay_ms.is_some() {
			self.retry_delay_ms = other.retry_delay_ms;
		}
		if other.max_in_flight.is_some() {
			self.max_in_flight = other.max_in_flight;
		}
		if other.jitter.is_some() {
			self.jitter = other.jitter;
		}
	}

	pub fn finalize(self) -> BatchConfig {
		let defaults = BatchConfig::default();
		BatchConfig {
			endpoint: self.endpoint.unwrap_or(defaults.endpoint),
			timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
			batch_size: self.batch_size.unwrap_or(defaults.batch_size),
			retry_count: self.retry_count.unwrap_or(defaults.retry_count),
			retry_delay_ms: self.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
			max_in_flight: self.max_in_flight.unwrap_or(defaults.max_in_flight),
			jitter: self.jitter.unwrap_or(defaults.jitter),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
	pub endpoint: String,
	pub timeout_secs: u64,
	pub batch_size: usize,
	pub retry_count: u32,
	pub retry_delay_ms: u64,
	pub max_in_flight: usize,
	pub jitter: bool,
}

impl BatchConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}

	pub fn retry_delay(&self) -> Duration {
		Duration::from_millis(self.retry_delay_ms)
	}
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_BATCH_ENDPOINT.to_string(),
			timeout_secs: 60,
			batch_size: 1000,
			retry_count: 3,
			retry_delay_ms: 2000,
			max_in_flight: 1,
			jitter: false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layer_finalize_defaults() {
		let config = BatchConfigLayer::default().finalize();
		assert_eq!(config, BatchConfig::default());
		assert_eq!(config.timeout(), Duration::from_secs(60));
		assert_eq!(config.retry_delay(), Duration::from_millis(2000));
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let toml_str = r#"
batch_size = 250
jitter = true
"#;
		let layer: BatchConfigLayer = toml::from_str(toml_str).unwrap();
		assert_eq!(layer.batch_size, Some(250));
		assert_eq!(layer.jitter, Some(true));
		assert!(layer.retry_count.is_none());
	}

	#[test]
	fn test_deserialize_rejects_unknown_keys() {
		let result: Result<BatchConfigLayer, _> = toml::from_str("batchsize = 10");
		assert!(result.is_err());
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = BatchConfigLayer {
			batch_size: Some(1000),
			retry_count: Some(3),
			..Default::default()
		};
		base.merge(BatchConfigLayer {
			batch_size: Some(500),
			..Default::default()
		});
		assert_eq!(base.batch_size, Some(500));
		assert_eq!(base.retry_count, Some(3));
	}
}
