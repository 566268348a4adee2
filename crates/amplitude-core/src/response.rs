// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Classified outcome of a delivery call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::now_millis;

/// Status codes that the remote side documents as safe to retry.
pub const RETRYABLE_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Status reported when a call failed without any remote status.
pub const NO_RESPONSE_CODE: u16 = 500;

/// The result of one top-level send, aggregated across chunks.
///
/// Field names match the remote response body so a body can be decoded
/// directly with [`ResponseRecord::from_body`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
	pub code: u16,
	#[serde(default)]
	pub events_ingested: u64,
	#[serde(default)]
	pub payload_size_bytes: u64,
	#[serde(default)]
	pub server_upload_time: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub events_with_invalid_fields: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub events_with_missing_fields: Option<Value>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub silenced_devices: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub silenced_events: Vec<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub throttled_devices: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub throttled_users: Option<Value>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub throttled_events: Vec<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub eps_threshold: Option<u64>,
}

impl ResponseRecord {
	/// A successful outcome with the given counters.
	pub fn success(events_ingested: u64, payload_size_bytes: u64, server_upload_time: i64) -> Self {
		Self {
			code: 200,
			events_ingested,
			payload_size_bytes,
			server_upload_time,
			..Self::empty(200)
		}
	}

	/// A non-success outcome carrying only a code and message.
	pub fn failure(code: u16, error: impl Into<String>) -> Self {
		Self {
			error: Some(error.into()),
			..Self::empty(code)
		}
	}

	/// Decodes a remote response body, falling back to `status` when the
	/// body carries no code of its own.
	///
	/// Non-object bodies yield a bare record with `status`. An object whose
	/// fields do not all decode keeps its `code` and `error` when those are
	/// well-typed.
	pub fn from_body(status: u16, body: Option<&Value>) -> Self {
		let mut record = match body.and_then(Value::as_object) {
			Some(map) => {
				let mut map = map.clone();
				map.entry("code").or_insert_with(|| Value::from(status));
				match serde_json::from_value::<ResponseRecord>(Value::Object(map.clone())) {
					Ok(record) => record,
					Err(e) => {
						debug!(error = %e, status, "response body did not match the expected shape");
						Self::diagnostics_only(status, &map)
					}
				}
			}
			None => Self::empty(status),
		};

		if record.server_upload_time == 0 {
			record.server_upload_time = now_millis();
		}
		if record.error.is_none() {
			record.error = body
				.and_then(|b| b.get("missing_field"))
				.and_then(Value::as_str)
				.map(|field| format!("missing field: {field}"));
		}
		record
	}

	fn diagnostics_only(status: u16, map: &serde_json::Map<String, Value>) -> Self {
		let code = map
			.get("code")
			.and_then(Value::as_u64)
			.and_then(|c| u16::try_from(c).ok())
			.unwrap_or(status);
		Self {
			error: map.get("error").and_then(Value::as_str).map(str::to_string),
			..Self::empty(code)
		}
	}

	fn empty(code: u16) -> Self {
		Self {
			code,
			events_ingested: 0,
			payload_size_bytes: 0,
			server_upload_time: now_millis(),
			error: None,
			events_with_invalid_fields: None,
			events_with_missing_fields: None,
			silenced_devices: Vec::new(),
			silenced_events: Vec::new(),
			throttled_devices: None,
			throttled_users: None,
			throttled_events: Vec::new(),
			eps_threshold: None,
		}
	}

	pub fn is_success(&self) -> bool {
		self.code == 200
	}

	pub fn is_throttled(&self) -> bool {
		self.code == 429
			|| non_empty_value(&self.throttled_devices)
			|| non_empty_value(&self.throttled_users)
			|| !self.throttled_events.is_empty()
	}

	pub fn is_silenced(&self) -> bool {
		!self.silenced_devices.is_empty() || !self.silenced_events.is_empty()
	}

	pub fn is_retryable(&self) -> bool {
		RETRYABLE_CODES.contains(&self.code)
	}

	/// Folds another successful chunk into this aggregate.
	pub fn absorb(&mut self, chunk: &ResponseRecord) {
		self.events_ingested += chunk.events_ingested;
		self.payload_size_bytes += chunk.payload_size_bytes;
		self.server_upload_time = chunk.server_upload_time;
	}

	/// A `; `-joined summary of whichever diagnostics are present.
	///
	/// Empty when the response carries no diagnostic detail.
	pub fn error_details(&self) -> String {
		let mut details = Vec::new();

		if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
			details.push(format!("Error: {error}"));
		}
		if let Some(fields) = self.events_with_invalid_fields.as_ref().filter(|v| is_non_empty(v)) {
			details.push(format!("Invalid fields: {fields}"));
		}
		if let Some(fields) = self.events_with_missing_fields.as_ref().filter(|v| is_non_empty(v)) {
			details.push(format!("Missing fields: {fields}"));
		}
		if !self.silenced_devices.is_empty() {
			details.push(format!(
				"Silenced devices: {}",
				self.silenced_devices.join(", ")
			));
		}
		if !self.silenced_events.is_empty() {
			details.push(format!("Silenced events: {:?}", self.silenced_events));
		}
		if let Some(devices) = self.throttled_devices.as_ref().filter(|v| is_non_empty(v)) {
			details.push(format!("Throttled devices: {devices}"));
		}
		if let Some(users) = self.throttled_users.as_ref().filter(|v| is_non_empty(v)) {
			details.push(format!("Throttled users: {users}"));
		}
		if !self.throttled_events.is_empty() {
			details.push(format!("Throttled events: {:?}", self.throttled_events));
		}
		if let Some(eps) = self.eps_threshold {
			details.push(format!("EPS threshold: {eps}"));
		}

		details.join("; ")
	}
}

fn non_empty_value(value: &Option<Value>) -> bool {
	value.as_ref().is_some_and(is_non_empty)
}

fn is_non_empty(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Object(map) => !map.is_empty(),
		Value::Array(items) => !items.is_empty(),
		Value::String(s) => !s.is_empty(),
		_ => true,
	}
}
