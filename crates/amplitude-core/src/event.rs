// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Immutable analytics event records.
//!
//! An [`EventRecord`] is validated once, at construction: it always has a
//! non-empty event type, at least one of user or device id, a timestamp, and
//! an insert id.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{DeliveryError, Result};
use crate::now_millis;
use crate::properties::Properties;

/// Device and application descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
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
	pub device_manufacturer: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub device_model: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub carrier: Option<String>,
}

/// Where the event happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub country: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub city: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub dma: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub language: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ip: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub location_lat: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub location_lng: Option<f64>,
}

impl LocationInfo {
	fn ensure_finite(&self) -> Result<()> {
		ensure_finite("location_lat", self.location_lat)?;
		ensure_finite("location_lng", self.location_lng)
	}
}

/// Monetization fields. Amplitude spells two of these in camel case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Revenue {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub price: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub quantity: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub revenue: Option<f64>,
	#[serde(
		default,
		rename = "productId",
		alias = "product_id",
		skip_serializing_if = "Option::is_none"
	)]
	pub product_id: Option<String>,
	#[serde(
		default,
		rename = "revenueType",
		alias = "revenue_type",
		skip_serializing_if = "Option::is_none"
	)]
	pub revenue_type: Option<String>,
}

impl Revenue {
	fn ensure_finite(&self) -> Result<()> {
		ensure_finite("price", self.price)?;
		ensure_finite("revenue", self.revenue)
	}
}

/// Advertising and platform device identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdIdentifiers {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub idfa: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub idfv: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub adid: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub android_id: Option<String>,
}

/// Tracking plan the event was instrumented against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingPlan {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub branch: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
}

impl TrackingPlan {
	pub fn is_empty(&self) -> bool {
		self.branch.is_none() && self.source.is_none() && self.version.is_none()
	}
}

/// One analytics event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
	user_id: Option<String>,
	device_id: Option<String>,
	event_type: String,
	time: i64,
	insert_id: String,
	event_properties: Properties,
	user_properties: Properties,
	groups: Properties,
	group_properties: Properties,
	device: DeviceInfo,
	location: LocationInfo,
	revenue: Revenue,
	identifiers: AdIdentifiers,
	event_id: Option<i64>,
	session_id: Option<i64>,
	user_agent: Option<String>,
	plan: Option<TrackingPlan>,
}

impl EventRecord {
	/// Starts a builder for an event of the given type.
	pub fn builder(event_type: impl Into<String>) -> EventRecordBuilder {
		EventRecordBuilder {
			event_type: event_type.into(),
			..Default::default()
		}
	}

	/// Builds an event from a flat key/value map.
	///
	/// Keys use the wire names (`user_id`, `event_type`, ...); the camel-case
	/// spellings (`userId`, `eventType`, ...) are accepted too. Unknown keys
	/// are rejected.
	pub fn from_map(map: Map<String, Value>) -> Result<Self> {
		let input: EventInput = serde_json::from_value(Value::Object(map))
			.map_err(|e| DeliveryError::validation(format!("invalid event input: {e}")))?;
		input.into_builder().build()
	}

	pub fn user_id(&self) -> Option<&str> {
		self.user_id.as_deref()
	}

	pub fn device_id(&self) -> Option<&str> {
		self.device_id.as_deref()
	}

	pub fn event_type(&self) -> &str {
		&self.event_type
	}

	/// Milliseconds since the Unix epoch.
	pub fn time(&self) -> i64 {
		self.time
	}

	pub fn insert_id(&self) -> &str {
		&self.insert_id
	}

	pub fn event_properties(&self) -> &Properties {
		&self.event_properties
	}

	pub fn user_properties(&self) -> &Properties {
		&self.user_properties
	}

	pub fn groups(&self) -> &Properties {
		&self.groups
	}

	pub fn group_properties(&self) -> &Properties {
		&self.group_properties
	}

	pub fn device(&self) -> &DeviceInfo {
		&self.device
	}

	pub fn location(&self) -> &LocationInfo {
		&self.location
	}

	pub fn revenue(&self) -> &Revenue {
		&self.revenue
	}

	pub fn identifiers(&self) -> &AdIdentifiers {
		&self.identifiers
	}

	pub fn event_id(&self) -> Option<i64> {
		self.event_id
	}

	pub fn session_id(&self) -> Option<i64> {
		self.session_id
	}

	pub fn user_agent(&self) -> Option<&str> {
		self.user_agent.as_deref()
	}

	pub fn plan(&self) -> Option<&TrackingPlan> {
		self.plan.as_ref()
	}

	/// Checks every float attribute, including nested property values.
	pub(crate) fn ensure_finite(&self) -> Result<()> {
		self.event_properties.ensure_finite()?;
		self.user_properties.ensure_finite()?;
		self.groups.ensure_finite()?;
		self.group_properties.ensure_finite()?;
		self.location.ensure_finite()?;
		self.revenue.ensure_finite()
	}
}

/// Builder for [`EventRecord`].
#[derive(Debug, Clone, Default)]
pub struct EventRecordBuilder {
	event_type: String,
	user_id: Option<String>,
	device_id: Option<String>,
	time: Option<i64>,
	insert_id: Option<String>,
	event_properties: Properties,
	user_properties: Properties,
	groups: Properties,
	group_properties: Properties,
	device: DeviceInfo,
	location: LocationInfo,
	revenue: Revenue,
	identifiers: AdIdentifiers,
	event_id: Option<i64>,
	session_id: Option<i64>,
	user_agent: Option<String>,
	plan: Option<TrackingPlan>,
}

impl EventRecordBuilder {
	pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
		self.device_id = Some(device_id.into());
		self
	}

	/// Event time in epoch milliseconds. Zero means "now".
	pub fn time(mut self, time: i64) -> Self {
		self.time = Some(time);
		self
	}

	pub fn insert_id(mut self, insert_id: impl Into<String>) -> Self {
		self.insert_id = Some(insert_id.into());
		self
	}

	pub fn event_properties(mut self, properties: Properties) -> Self {
		self.event_properties = properties;
		self
	}

	pub fn user_properties(mut self, properties: Properties) -> Self {
		self.user_properties = properties;
		self
	}

	pub fn groups(mut self, groups: Properties) -> Self {
		self.groups = groups;
		self
	}

	pub fn group_properties(mut self, properties: Properties) -> Self {
		self.group_properties = properties;
		self
	}

	pub fn device(mut self, device: DeviceInfo) -> Self {
		self.device = device;
		self
	}

	pub fn location(mut self, location: LocationInfo) -> Self {
		self.location = location;
		self
	}

	pub fn revenue(mut self, revenue: Revenue) -> Self {
		self.revenue = revenue;
		self
	}

	pub fn identifiers(mut self, identifiers: AdIdentifiers) -> Self {
		self.identifiers = identifiers;
		self
	}

	pub fn event_id(mut self, event_id: i64) -> Self {
		self.event_id = Some(event_id);
		self
	}

	pub fn session_id(mut self, session_id: i64) -> Self {
		self.session_id = Some(session_id);
		self
	}

	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());
		self
	}

	pub fn plan(mut self, plan: TrackingPlan) -> Self {
		self.plan = Some(plan);
		self
	}

	/// Validates and freezes the event.
	pub fn build(self) -> Result<EventRecord> {
		let user_id = non_empty(self.user_id);
		let device_id = non_empty(self.device_id);

		if user_id.is_none() && device_id.is_none() {
			return Err(DeliveryError::validation(
				"either user_id or device_id is required",
			));
		}

		let event_type = self.event_type.trim().to_string();
		if event_type.is_empty() {
			return Err(DeliveryError::validation("event_type is required"));
		}

		let time = match self.time {
			Some(t) if t < 0 => {
				return Err(DeliveryError::validation(format!(
					"time must be epoch milliseconds, got {t}"
				)));
			}
			Some(t) if t > 0 => t,
			_ => now_millis(),
		};

		let insert_id = non_empty(self.insert_id).unwrap_or_else(|| {
			generate_insert_id(user_id.as_deref(), device_id.as_deref(), &event_type, time)
		});

		Ok(EventRecord {
			user_id,
			device_id,
			event_type,
			time,
			insert_id,
			event_properties: self.event_properties,
			user_properties: self.user_properties,
			groups: self.groups,
			group_properties: self.group_properties,
			device: self.device,
			location: self.location,
			revenue: self.revenue,
			identifiers: self.identifiers,
			event_id: self.event_id,
			session_id: self.session_id,
			user_agent: non_empty(self.user_agent),
			plan: self.plan.filter(|p| !p.is_empty()),
		})
	}
}

/// SHA-256 over the identifying fields plus a per-call nonce, hex encoded.
///
/// The nonce makes two otherwise identical events distinct.
pub fn generate_insert_id(
	user_id: Option<&str>,
	device_id: Option<&str>,
	event_type: &str,
	time: i64,
) -> String {
	let nonce = Uuid::new_v4();
	let mut hasher = Sha256::new();
	hasher.update(
		format!(
			"{}_{}_{}_{}_{}",
			user_id.unwrap_or_default(),
			device_id.unwrap_or_default(),
			event_type,
			time,
			nonce
		)
		.as_bytes(),
	);
	hex::encode(hasher.finalize())
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|v| !v.trim().is_empty())
}

fn ensure_finite(field: &str, value: Option<f64>) -> Result<()> {
	match value {
		Some(v) if !v.is_finite() => Err(DeliveryError::validation(format!(
			"{field} is not a finite number"
		))),
		_ => Ok(()),
	}
}

/// Accepts identifiers given as strings or integers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Id {
		Text(String),
		Signed(i64),
		Unsigned(u64),
	}

	Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
		Id::Text(s) => s,
		Id::Signed(n) => n.to_string(),
		Id::Unsigned(n) => n.to_string(),
	}))
}

/// Flat input shape accepted by [`EventRecord::from_map`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EventInput {
	#[serde(default, alias = "userId", deserialize_with = "string_or_number")]
	user_id: Option<String>,
	#[serde(default, alias = "deviceId", deserialize_with = "string_or_number")]
	device_id: Option<String>,
	#[serde(default, alias = "eventType")]
	event_type: Option<String>,
	#[serde(default)]
	time: Option<i64>,
	#[serde(default, alias = "insertId")]
	insert_id: Option<String>,
	#[serde(default, alias = "eventProperties")]
	event_properties: Option<Properties>,
	#[serde(default, alias = "userProperties")]
	user_properties: Option<Properties>,
	#[serde(default)]
	groups: Option<Properties>,
	#[serde(default, alias = "groupProperties")]
	group_properties: Option<Properties>,
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
	#[serde(default, alias = "deviceManufacturer")]
	device_manufacturer: Option<String>,
	#[serde(default, alias = "deviceModel")]
	device_model: Option<String>,
	#[serde(default)]
	carrier: Option<String>,
	#[serde(default)]
	country: Option<String>,
	#[serde(default)]
	region: Option<String>,
	#[serde(default)]
	city: Option<String>,
	#[serde(default)]
	dma: Option<String>,
	#[serde(default)]
	language: Option<String>,
	#[serde(default)]
	ip: Option<String>,
	#[serde(default, alias = "locationLat")]
	location_lat: Option<f64>,
	#[serde(default, alias = "locationLng")]
	location_lng: Option<f64>,
	#[serde(default)]
	price: Option<f64>,
	#[serde(default)]
	quantity: Option<i64>,
	#[serde(default)]
	revenue: Option<f64>,
	#[serde(default, alias = "productId")]
	product_id: Option<String>,
	#[serde(default, alias = "revenueType")]
	revenue_type: Option<String>,
	#[serde(default)]
	idfa: Option<String>,
	#[serde(default)]
	idfv: Option<String>,
	#[serde(default)]
	adid: Option<String>,
	#[serde(default, alias = "androidId")]
	android_id: Option<String>,
	#[serde(default, alias = "eventId")]
	event_id: Option<i64>,
	#[serde(default, alias = "sessionId")]
	session_id: Option<i64>,
	#[serde(default, alias = "userAgent")]
	user_agent: Option<String>,
	#[serde(default)]
	plan: Option<TrackingPlan>,
}

impl EventInput {
	fn into_builder(self) -> EventRecordBuilder {
		EventRecordBuilder {
			event_type: self.event_type.unwrap_or_default(),
			user_id: self.user_id,
			device_id: self.device_id,
			time: self.time,
			insert_id: self.insert_id,
			event_properties: self.event_properties.unwrap_or_default(),
			user_properties: self.user_properties.unwrap_or_default(),
			groups: self.groups.unwrap_or_default(),
			group_properties: self.group_properties.unwrap_or_default(),
			device: DeviceInfo {
				app_version: self.app_version,
				platform: self.platform,
				os_name: self.os_name,
				os_version: self.os_version,
				device_brand: self.device_brand,
				device_manufacturer: self.device_manufacturer,
				device_model: self.device_model,
				carrier: self.carrier,
			},
			location: LocationInfo {
				country: self.country,
				region: self.region,
				city: self.city,
				dma: self.dma,
				language: self.language,
				ip: self.ip,
				location_lat: self.location_lat,
				location_lng: self.location_lng,
			},
			revenue: Revenue {
				price: self.price,
				quantity: self.quantity,
				revenue: self.revenue,
				product_id: self.product_id,
				revenue_type: self.revenue_type,
			},
			identifiers: AdIdentifiers {
				idfa: self.idfa,
				idfv: self.idfv,
				adid: self.adid,
				android_id: self.android_id,
			},
			event_id: self.event_id,
			session_id: self.session_id,
			user_agent: self.user_agent,
			plan: self.plan,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	fn map(value: Value) -> Map<String, Value> {
		match value {
			Value::Object(map) => map,
			_ => panic!("expected object"),
		}
	}

	#[test]
	fn test_build_with_user_id() {
		let event = EventRecord::builder("inquiry_submitted")
			.user_id("42")
			.time(1_700_000_000_000)
			.build()
			.unwrap();

		assert_eq!(event.user_id(), Some("42"));
		assert_eq!(event.device_id(), None);
		assert_eq!(event.event_type(), "inquiry_submitted");
		assert_eq!(event.time(), 1_700_000_000_000);
	}

	#[test]
	fn test_build_requires_identity() {
		let result = EventRecord::builder("favorites_add").build();
		assert!(matches!(result, Err(DeliveryError::Validation(_))));

		let result = EventRecord::builder("favorites_add")
			.user_id("")
			.device_id("  ")
			.build();
		assert!(matches!(result, Err(DeliveryError::Validation(_))));
	}

	#[test]
	fn test_build_requires_event_type() {
		let result = EventRecord::builder("").device_id("device-1").build();
		assert!(matches!(result, Err(DeliveryError::Validation(m)) if m.contains("event_type")));
	}

	#[test]
	fn test_zero_time_defaults_to_now() {
		let before = now_millis();
		let event = EventRecord::builder("e").device_id("d").time(0).build().unwrap();
		assert!(event.time() >= before);
	}

	#[test]
	fn test_negative_time_is_rejected() {
		let result = EventRecord::builder("e").device_id("d").time(-1).build();
		assert!(matches!(result, Err(DeliveryError::Validation(_))));
	}

	#[test]
	fn test_explicit_insert_id_is_kept() {
		let event = EventRecord::builder("e")
			.device_id("d")
			.insert_id("dedupe-1")
			.build()
			.unwrap();
		assert_eq!(event.insert_id(), "dedupe-1");
	}

	/// Purpose: two events with identical explicit fields must still get
	/// different insert ids, or the remote side would deduplicate one away.
	#[test]
	fn test_generated_insert_ids_are_unique_hex_digests() {
		let build = || {
			EventRecord::builder("agent_signup_complete")
				.user_id("7")
				.time(1_700_000_000_000)
				.build()
				.unwrap()
		};
		let a = build();
		let b = build();

		assert_ne!(a.insert_id(), b.insert_id());
		for id in [a.insert_id(), b.insert_id()] {
			assert_eq!(id.len(), 64);
			assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
		}
	}

	#[test]
	fn test_from_map_accepts_snake_and_camel_case() {
		let snake = EventRecord::from_map(map(json!({
			"user_id": "u1",
			"event_type": "favorites_add",
			"event_properties": {"house_id": 10},
			"productId": "sku-1"
		})))
		.unwrap();
		assert_eq!(snake.user_id(), Some("u1"));
		assert_eq!(snake.revenue().product_id.as_deref(), Some("sku-1"));

		let camel = EventRecord::from_map(map(json!({
			"userId": 12345,
			"eventType": "favorites_add",
			"eventProperties": {"house_id": 10},
			"osName": "iOS"
		})))
		.unwrap();
		assert_eq!(camel.user_id(), Some("12345"));
		assert_eq!(camel.device().os_name.as_deref(), Some("iOS"));
		assert_eq!(camel.event_properties().len(), 1);
	}

	#[test]
	fn test_from_map_rejects_unknown_keys() {
		let result = EventRecord::from_map(map(json!({
			"user_id": "u1",
			"event_type": "e",
			"evnt_properties": {}
		})));
		assert!(matches!(result, Err(DeliveryError::Validation(_))));
	}

	#[test]
	fn test_from_map_requires_event_type() {
		let result = EventRecord::from_map(map(json!({"device_id": "d"})));
		assert!(matches!(result, Err(DeliveryError::Validation(m)) if m.contains("event_type")));
	}

	#[test]
	fn test_non_finite_revenue_fails_finite_check() {
		let event = EventRecord::builder("purchase")
			.user_id("u")
			.revenue(Revenue {
				price: Some(f64::NAN),
				..Default::default()
			})
			.build()
			.unwrap();
		assert!(event.ensure_finite().is_err());
	}

	#[test]
	fn test_empty_plan_is_dropped() {
		let event = EventRecord::builder("e")
			.device_id("d")
			.plan(TrackingPlan::default())
			.build()
			.unwrap();
		assert!(event.plan().is_none());
	}

	proptest! {
		#[test]
		fn construction_succeeds_with_any_identity(
			user in proptest::option::of("[a-z0-9]{1,16}"),
			device in proptest::option::of("[a-z0-9]{1,16}"),
			event_type in "[a-z_]{1,24}",
		) {
			prop_assume!(user.is_some() || device.is_some());
			let mut builder = EventRecord::builder(event_type.clone());
			if let Some(u) = &user {
				builder = builder.user_id(u.clone());
			}
			if let Some(d) = &device {
				builder = builder.device_id(d.clone());
			}
			let event = builder.build().unwrap();
			prop_assert_eq!(event.event_type(), event_type.as_str());
			prop_assert!(event.time() > 0);
			prop_assert!(!event.insert_id().is_empty());
		}

		#[test]
		fn construction_fails_without_identity(event_type in "[a-z_]{1,24}") {
			let result = EventRecord::builder(event_type).build();
			prop_assert!(matches!(result, Err(DeliveryError::Validation(_))));
		}

		#[test]
		fn construction_fails_without_event_type(user in "[a-z0-9]{1,16}", blank in "[ ]{0,4}") {
			let result = EventRecord::builder(blank).user_id(user).build();
			prop_assert!(matches!(result, Err(DeliveryError::Validation(_))));
		}
	}
}
