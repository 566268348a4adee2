// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery driver selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Which delivery driver handles event sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DriverKind {
	/// One request for all events, no retries.
	#[default]
	Realtime,
	/// Chunked requests with per-chunk retry.
	Batch,
}

impl DriverKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			DriverKind::Realtime => "realtime",
			DriverKind::Batch => "batch",
		}
	}
}

impl fmt::Display for DriverKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DriverKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"realtime" | "http" => Ok(DriverKind::Realtime),
			"batch" | "backfill" => Ok(DriverKind::Batch),
			other => Err(ConfigError::invalid_value(
				"default_driver",
				format!("unknown driver '{other}' (expected realtime, http, batch or backfill)"),
			)),
		}
	}
}

impl<'de> Deserialize<'de> for DriverKind {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let name = String::deserialize(deserializer)?;
		name.parse().map_err(serde::de::Error::custom)
	}
}
