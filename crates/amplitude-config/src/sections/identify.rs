// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identify API configuration section.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_IDENTIFY_ENDPOINT: &str = "https://api2.amplitude.com/identify";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IdentifyConfigLayer {
	#[serde(default)]
	pub endpoint: Option<String>,
	#[serde(default)]
	pub timeout_secs: Option<u64>,
}

impl IdentifyConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	pub fn finalize(self) -> IdentifyConfig {
		IdentifyConfig {
			endpoint: self
				.endpoint
				.unwrap_or_else(|| DEFAULT_IDENTIFY_ENDPOINT.to_string()),
			timeout_secs: self.timeout_secs.unwrap_or(5),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifyConfig {
	pub endpoint: String,
	pub timeout_secs: u64,
}

impl IdentifyConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}
}

impl Default for IdentifyConfig {
	fn default() -> Self {
		IdentifyConfigLayer::default().finalize()
	}
}
