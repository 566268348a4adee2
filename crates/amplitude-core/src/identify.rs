// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User-property mutations sent through the identify API.
//!
//! An [`IdentityRecord`] groups property updates by operation (`$set`,
//! `$add`, ...). Each builder call merges into that operation's own map, so
//! `set("plan", "pro")` followed by `set("seats", 5)` produces one `$set`
//! with both keys.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DeliveryError, Result};
use crate::event::{non_empty, string_or_number};
use crate::now_millis;
use crate::properties::{Properties, PropertyValue};

/// Value Amplitude expects for every `$unset` key.
pub const UNSET_MARKER: &str = "-";

/// A user-property operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UserPropertyOp {
	Set,
	SetOnce,
	Add,
	Append,
	Prepend,
	Unset,
}

impl UserPropertyOp {
	pub const ALL: [UserPropertyOp; 6] = [
		UserPropertyOp::Set,
		UserPropertyOp::SetOnce,
		UserPropertyOp::Add,
		UserPropertyOp::Append,
		UserPropertyOp::Prepend,
		UserPropertyOp::Unset,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			UserPropertyOp::Set => "$set",
			UserPropertyOp::SetOnce => "$setOnce",
			UserPropertyOp::Add => "$add",
			UserPropertyOp::Append => "$append",
			UserPropertyOp::Prepend => "$prepend",
			UserPropertyOp::Unset => "$unset",
		}
	}
}

impl fmt::Display for UserPropertyOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for UserPropertyOp {
	type Err = DeliveryError;

	fn from_str(s: &str) -> Result<Self> {
		UserPropertyOp::ALL
			.into_iter()
			.find(|op| op.as_str() == s)
			.ok_or_else(|| DeliveryError::validation(format!("unknown user property operation '{s}'")))
	}
}

/// The subset of device and location descriptors the identify API accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifyAttributes {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app_version: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub platform: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub os_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub os_version: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub device_brand: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub device_model: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub carrier: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub country: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub language: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ip: Option<String>,
}

/// One user-property update.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityRecord {
	user_id: Option<String>,
	device_id: Option<String>,
	operations: BTreeMap<UserPropertyOp, Properties>,
	groups: Properties,
	attributes: IdentifyAttributes,
	time: i64,
}

impl IdentityRecord {
	/// Starts an empty update for the given identity.
	///
	/// Fails when both ids are missing or blank.
	pub fn new(user_id: Option<String>, device_id: Option<String>) -> Result<Self> {
		let user_id = non_empty(user_id);
		let device_id = non_empty(device_id);
		if user_id.is_none() && device_id.is_none() {
			return Err(DeliveryError::validation(
				"either user_id or device_id is required",
			));
		}

		Ok(Self {
			user_id,
			device_id,
			operations: BTreeMap::new(),
			groups: Properties::new(),
			attributes: IdentifyAttributes::default(),
			time: now_millis(),
		})
	}

	pub fn for_user(user_id: impl Into<String>) -> Result<Self> {
		Self::new(Some(user_id.into()), None)
	}

	pub fn for_device(device_id: impl Into<String>) -> Result<Self> {
		Self::new(None, Some(device_id.into()))
	}

	/// Builds a record from a flat key/value map.
	///
	/// `user_properties` keys starting with `$` name an operation and must
	/// hold an object; any other key is treated as a plain `$set`. The map
	/// must yield at least one property update.
	pub fn from_map(map: Map<String, Value>) -> Result<Self> {
		let input: IdentifyInput = serde_json::from_value(Value::Object(map))
			.map_err(|e| DeliveryError::validation(format!("invalid identify input: {e}")))?;

		let mut record = Self::new(input.user_id, input.device_id)?;
		if let Some(time) = input.time {
			record = record.with_time(time);
		}
		record.groups = input.groups.unwrap_or_default();
		record.attributes = IdentifyAttributes {
			app_version: input.app_version,
			platform: input.platform,
			os_name: input.os_name,
			os_version: input.os_version,
			device_brand: input.device_brand,
			device_model: input.device_model,
			carrier: input.carrier,
			country: input.country,
			language: input.language,
			ip: input.ip,
		};

		for (key, value) in input.user_properties.unwrap_or_default() {
			if key.starts_with('$') {
				let op: UserPropertyOp = key.parse()?;
				let Value::Object(entries) = value else {
					return Err(DeliveryError::validation(format!(
						"'{key}' must map property names to values"
					)));
				};
				for (property, value) in entries {
					if op == UserPropertyOp::Unset {
						record = record.unset(property);
					} else {
						record = record.apply(op, property, PropertyValue::try_from(value)?);
					}
				}
			} else {
				record = record.set(key, PropertyValue::try_from(value)?);
			}
		}

		record.validate()?;
		Ok(record)
	}

	/// Overwrites a property.
	pub fn set(self, property: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
		self.apply(UserPropertyOp::Set, property.into(), value.into())
	}

	/// Sets a property only if the user does not have it yet.
	pub fn set_once(self, property: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
		self.apply(UserPropertyOp::SetOnce, property.into(), value.into())
	}

	/// Increments a numeric property.
	pub fn add(self, property: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
		self.apply(UserPropertyOp::Add, property.into(), value.into())
	}

	/// Appends to a list property.
	pub fn append(self, property: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
		self.apply(UserPropertyOp::Append, property.into(), value.into())
	}

	/// Prepends to a list property.
	pub fn prepend(self, property: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
		self.apply(UserPropertyOp::Prepend, property.into(), value.into())
	}

	/// Removes a property.
	pub fn unset(self, property: impl Into<String>) -> Self {
		self.apply(UserPropertyOp::Unset, property.into(), UNSET_MARKER.into())
	}

	pub fn with_groups(mut self, groups: Properties) -> Self {
		self.groups = groups;
		self
	}

	pub fn with_attributes(mut self, attributes: IdentifyAttributes) -> Self {
		self.attributes = attributes;
		self
	}

	/// Event time in epoch milliseconds. Zero keeps the construction time;
	/// a negative time is kept so that [`validate`](Self::validate) rejects it.
	pub fn with_time(mut self, time: i64) -> Self {
		if time != 0 {
			self.time = time;
		}
		self
	}

	fn apply(mut self, op: UserPropertyOp, property: String, value: PropertyValue) -> Self {
		self.operations.entry(op).or_default().set(property, value);
		self
	}

	/// Checks the record is ready to send.
	pub fn validate(&self) -> Result<()> {
		if self.time < 0 {
			return Err(DeliveryError::validation(format!(
				"time must be epoch milliseconds, got {}",
				self.time
			)));
		}

		if self.user_properties_empty() {
			return Err(DeliveryError::validation(
				"user_properties is required for identify",
			));
		}

		if let Some(adds) = self.operations.get(&UserPropertyOp::Add) {
			for (key, value) in adds.iter() {
				if !matches!(value, PropertyValue::Integer(_) | PropertyValue::Float(_)) {
					return Err(DeliveryError::validation(format!(
						"$add value for '{key}' must be numeric"
					)));
				}
			}
		}

		self
			.operations
			.values()
			.try_for_each(Properties::ensure_finite)?;
		self.groups.ensure_finite()
	}

	pub fn user_properties_empty(&self) -> bool {
		self.operations.values().all(Properties::is_empty)
	}

	pub fn user_id(&self) -> Option<&str> {
		self.user_id.as_deref()
	}

	pub fn device_id(&self) -> Option<&str> {
		self.device_id.as_deref()
	}

	pub fn operation(&self, op: UserPropertyOp) -> Option<&Properties> {
		self.operations.get(&op)
	}

	/// Non-empty operations in wire order.
	pub fn operations(&self) -> impl Iterator<Item = (UserPropertyOp, &Properties)> {
		self
			.operations
			.iter()
			.filter(|(_, props)| !props.is_empty())
			.map(|(op, props)| (*op, props))
	}

	pub fn groups(&self) -> &Properties {
		&self.groups
	}

	pub fn attributes(&self) -> &IdentifyAttributes {
		&self.attributes
	}

	pub fn time(&self) -> i64 {
		self.time
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct IdentifyInput {
	#[serde(default, alias = "userId", deserialize_with = "string_or_number")]
	user_id: Option<String>,
	#[serde(default, alias = "deviceId", deserialize_with = "string_or_number")]
	device_id: Option<String>,
	#[serde(default, alias = "userProperties")]
	user_properties: Option<Map<String, Value>>,
	#[serde(default)]
	groups: Option<Properties>,
	#[serde(default)]
	time: Option<i64>,
	#[serde(default, alias = "appVersion")]
	app_version: Option<String>,
	#[serde(default)]
	platform: Option<String>,
	#[serde(default, alias = "osName")]
	os_name: Option<String>,
	#[serde(default, alias = "osVersion")]
	os_version: Option<String>,
	#[serde(default, alias = "deviceBrand")]
	device_brand: Option<String>,
	#[serde(default, alias = "deviceModel")]
	device_model: Option<String>,
	#[serde(default)]
	carrier: Option<String>,
	#[serde(default)]
	country: Option<String>,
	#[serde(default)]
	language: Option<String>,
	#[serde(default)]
	ip: Option<String>,
}
