// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed property bags for events and user properties.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DeliveryError;

/// The value kinds Amplitude accepts in a property bag.
///
/// JSON `null` has no counterpart; converting one from untyped JSON fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
	Bool(bool),
	Integer(i64),
	Float(f64),
	String(String),
	Array(Vec<PropertyValue>),
	Map(Properties),
}

impl PropertyValue {
	/// Rejects NaN and infinities anywhere inside the value.
	pub fn ensure_finite(&self, key: &str) -> Result<(), DeliveryError> {
		match self {
			PropertyValue::Float(f) if !f.is_finite() => Err(DeliveryError::validation(format!(
				"property '{key}' is not a finite number"
			))),
			PropertyValue::Array(items) => items.iter().try_for_each(|v| v.ensure_finite(key)),
			PropertyValue::Map(map) => map.ensure_finite(),
			_ => Ok(()),
		}
	}
}

impl TryFrom<Value> for PropertyValue {
	type Error = DeliveryError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Null => Err(DeliveryError::validation("property values cannot be null")),
			Value::Bool(b) => Ok(PropertyValue::Bool(b)),
			Value::Number(n) => match n.as_i64() {
				Some(i) => Ok(PropertyValue::Integer(i)),
				None => n
					.as_f64()
					.map(PropertyValue::Float)
					.ok_or_else(|| DeliveryError::validation(format!("unsupported number {n}"))),
			},
			Value::String(s) => Ok(PropertyValue::String(s)),
			Value::Array(items) => items
				.into_iter()
				.map(PropertyValue::try_from)
				.collect::<Result<Vec<_>, _>>()
				.map(PropertyValue::Array),
			Value::Object(map) => Properties::try_from(Value::Object(map)).map(PropertyValue::Map),
		}
	}
}

impl From<&str> for PropertyValue {
	fn from(value: &str) -> Self {
		PropertyValue::String(value.to_string())
	}
}

impl From<String> for PropertyValue {
	fn from(value: String) -> Self {
		PropertyValue::String(value)
	}
}

impl From<bool> for PropertyValue {
	fn from(value: bool) -> Self {
		PropertyValue::Bool(value)
	}
}

impl From<i64> for PropertyValue {
	fn from(value: i64) -> Self {
		PropertyValue::Integer(value)
	}
}

impl From<i32> for PropertyValue {
	fn from(value: i32) -> Self {
		PropertyValue::Integer(value.into())
	}
}

impl From<u32> for PropertyValue {
	fn from(value: u32) -> Self {
		PropertyValue::Integer(value.into())
	}
}

impl From<f64> for PropertyValue {
	fn from(value: f64) -> Self {
		PropertyValue::Float(value)
	}
}

impl From<Properties> for PropertyValue {
	fn from(value: Properties) -> Self {
		PropertyValue::Map(value)
	}
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
	fn from(values: Vec<T>) -> Self {
		PropertyValue::Array(values.into_iter().map(Into::into).collect())
	}
}

/// A builder for constructing event, user, or group properties.
///
/// Keys are kept sorted so the serialized form is stable.
///
/// # Example
///
/// ```
/// use amplitude_core::Properties;
///
/// let props = Properties::new()
///     .insert("button_name", "checkout")
///     .insert("page", "/cart")
///     .insert("price", 99.99)
///     .insert("is_premium", true);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
	inner: BTreeMap<String, PropertyValue>,
}

impl Properties {
	/// Creates a new empty Properties builder.
	pub fn new() -> Self {
		Self {
			inner: BTreeMap::new(),
		}
	}

	/// Inserts a key-value pair into the properties.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<PropertyValue>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// In-place variant of [`Properties::insert`].
	pub fn set<K, V>(&mut self, key: K, value: V)
	where
		K: Into<String>,
		V: Into<PropertyValue>,
	{
		self.inner.insert(key.into(), value.into());
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&PropertyValue> {
		self.inner.get(key)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
		self.inner.iter()
	}

	pub fn ensure_finite(&self) -> Result<(), DeliveryError> {
		self
			.inner
			.iter()
			.try_for_each(|(key, value)| value.ensure_finite(key))
	}
}

impl TryFrom<Value> for Properties {
	type Error = DeliveryError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Object(map) => map
				.into_iter()
				.map(|(k, v)| PropertyValue::try_from(v).map(|v| (k, v)))
				.collect::<Result<BTreeMap<_, _>, _>>()
				.map(|inner| Self { inner }),
			other => Err(DeliveryError::validation(format!(
				"properties must be an object, got {other}"
			))),
		}
	}
}

impl FromIterator<(String, PropertyValue)> for Properties {
	fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
		Self {
			inner: iter.into_iter().collect(),
		}
	}
}
