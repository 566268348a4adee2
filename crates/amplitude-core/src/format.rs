// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire formatting for events and identify updates.
//!
//! Output is sparse: the identity keys, the event type (or user properties)
//! and the time are always present, everything else only when set. The
//! result is a `serde_json::Value` whose object keys are sorted.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::event::{AdIdentifiers, DeviceInfo, EventRecord, LocationInfo, Revenue, TrackingPlan};
use crate::identify::{IdentifyAttributes, IdentityRecord};
use crate::properties::Properties;

#[derive(Serialize)]
struct EventPayload<'a> {
	user_id: Option<&'a str>,
	device_id: Option<&'a str>,
	event_type: &'a str,
	time: i64,
	insert_id: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	event_properties: Option<&'a Properties>,
	#[serde(skip_serializing_if = "Option::is_none")]
	user_properties: Option<&'a Properties>,
	#[serde(skip_serializing_if = "Option::is_none")]
	groups: Option<&'a Properties>,
	#[serde(skip_serializing_if = "Option::is_none")]
	group_properties: Option<&'a Properties>,
	#[serde(flatten)]
	device: &'a DeviceInfo,
	#[serde(flatten)]
	location: &'a LocationInfo,
	#[serde(flatten)]
	revenue: &'a Revenue,
	#[serde(flatten)]
	identifiers: &'a AdIdentifiers,
	#[serde(skip_serializing_if = "Option::is_none")]
	event_id: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	session_id: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	user_agent: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	plan: Option<&'a TrackingPlan>,
}

#[derive(Serialize)]
struct IdentifyPayload<'a> {
	user_id: Option<&'a str>,
	device_id: Option<&'a str>,
	user_properties: Map<String, Value>,
	time: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	groups: Option<&'a Properties>,
	#[serde(flatten)]
	attributes: &'a IdentifyAttributes,
}

fn present(props: &Properties) -> Option<&Properties> {
	(!props.is_empty()).then_some(props)
}

/// Formats one event for the realtime or batch endpoint.
pub fn format_event(event: &EventRecord) -> Result<Value> {
	event.ensure_finite()?;

	let payload = EventPayload {
		user_id: event.user_id(),
		device_id: event.device_id(),
		event_type: event.event_type(),
		time: event.time(),
		insert_id: event.insert_id(),
		event_properties: present(event.event_properties()),
		user_properties: present(event.user_properties()),
		groups: present(event.groups()),
		group_properties: present(event.group_properties()),
		device: event.device(),
		location: event.location(),
		revenue: event.revenue(),
		identifiers: event.identifiers(),
		event_id: event.event_id(),
		session_id: event.session_id(),
		user_agent: event.user_agent(),
		plan: event.plan(),
	};

	Ok(serde_json::to_value(payload)?)
}

/// Formats an identify update; the result is sent as the JSON-encoded
/// `identification` form field.
pub fn format_identify(record: &IdentityRecord) -> Result<Value> {
	record.validate()?;

	let mut user_properties = Map::new();
	for (op, props) in record.operations() {
		user_properties.insert(op.as_str().to_string(), serde_json::to_value(props)?);
	}

	let payload = IdentifyPayload {
		user_id: record.user_id(),
		device_id: record.device_id(),
		user_properties,
		time: record.time(),
		groups: present(record.groups()),
		attributes: record.attributes(),
	};

	Ok(serde_json::to_value(payload)?)
}
