// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single-request driver for the HTTP API v2 endpoint.

use std::sync::Arc;
use std::time::Duration;

use amplitude_common_http::{Transport, TransportRequest};
use amplitude_config::{DriverKind, RealtimeConfig};
use amplitude_core::{
	format_event, ApiKey, DeliveryError, EventRecord, ResponseRecord, Result, NO_RESPONSE_CODE,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{status_record, success_record, DeliveryDriver};

/// Posts all events in one request and never retries.
///
/// Only an empty event list produces `Err`; every other failure comes back
/// as a non-success [`ResponseRecord`].
pub struct RealtimeDriver {
	transport: Arc<dyn Transport>,
	api_key: ApiKey,
	endpoint: String,
	timeout: Duration,
	min_id_length: Option<u32>,
}

impl RealtimeDriver {
	pub fn new(transport: Arc<dyn Transport>, api_key: ApiKey, config: &RealtimeConfig) -> Self {
		Self {
			transport,
			api_key,
			endpoint: config.endpoint.clone(),
			timeout: config.timeout(),
			min_id_length: config.min_id_length,
		}
	}

	fn payload(&self, events: &[EventRecord]) -> Result<Value> {
		let formatted = events.iter().map(format_event).collect::<Result<Vec<_>>>()?;

		let mut payload = json!({
			"api_key": self.api_key.expose(),
			"events": formatted,
		});
		if let Some(min_id_length) = self.min_id_length {
			payload["options"] = json!({ "min_id_length": min_id_length });
		}
		Ok(payload)
	}
}

#[async_trait]
impl DeliveryDriver for RealtimeDriver {
	fn kind(&self) -> DriverKind {
		DriverKind::Realtime
	}

	async fn send_events(&self, events: Vec<EventRecord>) -> Result<ResponseRecord> {
		if events.is_empty() {
			return Err(DeliveryError::EmptyBatch);
		}

		let payload = match self.payload(&events) {
			Ok(payload) => payload,
			Err(err) => {
				warn!(error = %err, events = events.len(), "failed to format events");
				return Ok(ResponseRecord::failure(NO_RESPONSE_CODE, err.to_string()));
			}
		};

		debug!(endpoint = %self.endpoint, events = events.len(), "posting events");
		let request = TransportRequest::json(self.endpoint.clone(), payload, self.timeout);

		let record = match self.transport.post(request).await {
			Ok(response) if response.is_ok() => success_record(&response, events.len()),
			Ok(response) => {
				let record = status_record(&response);
				warn!(
					status = response.status,
					details = %record.error_details(),
					"realtime delivery rejected"
				);
				record
			}
			Err(err) => {
				warn!(error = %err, "realtime delivery failed");
				ResponseRecord::failure(NO_RESPONSE_CODE, err.to_string())
			}
		};

		Ok(record)
	}
}
