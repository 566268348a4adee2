// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Realtime (HTTP API v2) driver configuration section.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_REALTIME_ENDPOINT: &str = "https://api2.amplitude.com/2/httpapi";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfigLayer {
	#[serde(default)]
	pub endpoint: Option<String>,
	#[serde(default)]
	pub timeout_secs: Option<u64>,
	/// Zero disables the `options.min_id_length` request field.
	#[serde(default)]
	pub min_id_length: Option<u32>,
}

impl RealtimeConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
		if other.min_id_length.is_some() {
			self.min_id_length = other.min_id_length;
		}
	}

	pub fn finalize(self) -> RealtimeConfig {
		let defaults = RealtimeConfig::default();
		RealtimeConfig {
			endpoint: self.endpoint.unwrap_or(defaults.endpoint),
			timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
			min_id_length: match self.min_id_length {
				Some(0) => None,
				Some(n) => Some(n),
				None => defaults.min_id_length,
			},
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeConfig {
	pub endpoint: String,
	pub timeout_secs: u64,
	pub min_id_length: Option<u32>,
}

impl RealtimeConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}
}

impl Default for RealtimeConfig {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_REALTIME_ENDPOINT.to_string(),
			timeout_secs: 5,
			min_id_length: Some(5),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layer_finalize_defaults() {
		let config = RealtimeConfigLayer::default().finalize();
		assert_eq!(config.endpoint, DEFAULT_REALTIME_ENDPOINT);
		assert_eq!(config.timeout(), Duration::from_secs(5));
		assert_eq!(config.min_id_length, Some(5));
	}

	#[test]
	fn test_zero_min_id_length_disables_option() {
		let layer = RealtimeConfigLayer {
			min_id_length: Some(0),
			..Default::default()
		};
		assert_eq!(layer.finalize().min_id_length, None);
	}

	#[test]
	fn test_merge_preserves_base_when_none() {
		let mut base = RealtimeConfigLayer {
			endpoint: Some("http://localhost:9000/2/httpapi".to_string()),
			timeout_secs: Some(2),
			min_id_length: None,
		};
		base.merge(RealtimeConfigLayer {
			timeout_secs: Some(10),
			..Default::default()
		});
		assert_eq!(
			base.endpoint.as_deref(),
			Some("http://localhost:9000/2/httpapi")
		);
		assert_eq!(base.timeout_secs, Some(10));
	}
}
