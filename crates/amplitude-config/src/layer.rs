// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The partial, mergeable form of the delivery configuration.

use amplitude_core::ApiKey;
use serde::Deserialize;

use crate::sections::{
	BatchConfigLayer, DriverKind, IdentifyConfigLayer, LoggingConfigLayer, RealtimeConfigLayer,
};

/// One source's view of the configuration. Every field is optional; later
/// layers win field by field.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfigLayer {
	#[serde(default)]
	pub api_key: Option<ApiKey>,
	#[serde(default)]
	pub default_driver: Option<DriverKind>,
	#[serde(default)]
	pub verify_tls: Option<bool>,
	#[serde(default)]
	pub realtime: Option<RealtimeConfigLayer>,
	#[serde(default)]
	pub batch: Option<BatchConfigLayer>,
	#[serde(default)]
	pub identify: Option<IdentifyConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl DeliveryConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.api_key.is_some() {
			self.api_key = other.api_key;
		}
		if other.default_driver.is_some() {
			self.default_driver = other.default_driver;
		}
		if other.verify_tls.is_some() {
			self.verify_tls = other.verify_tls;
		}
		merge_section(&mut self.realtime, other.realtime, RealtimeConfigLayer::merge);
		merge_section(&mut self.batch, other.batch, BatchConfigLayer::merge);
		merge_section(&mut self.identify, other.identify, IdentifyConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(overlay)) => merge(existing, overlay),
		(None, Some(overlay)) => *base = Some(overlay),
		(_, None) => {}
	}
}
