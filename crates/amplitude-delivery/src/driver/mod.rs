// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event delivery drivers.
//!
//! Both drivers share one contract: `Err` is reserved for problems found
//! before any network I/O and, for the batch driver only, a chunk that could
//! not be delivered. Everything else is reported through the returned
//! [`ResponseRecord`].

mod batch;
mod realtime;

pub use batch::BatchDriver;
pub use realtime::RealtimeDriver;

use amplitude_common_http::TransportResponse;
use amplitude_config::DriverKind;
use amplitude_core::{EventRecord, ResponseRecord, Result};
use async_trait::async_trait;

/// Sends a list of events and produces one aggregated response.
#[async_trait]
pub trait DeliveryDriver: Send + Sync {
	fn kind(&self) -> DriverKind;

	async fn send_events(&self, events: Vec<EventRecord>) -> Result<ResponseRecord>;
}

/// Record for a 200 response. Counters the body omits fall back to the
/// number of events sent and zero bytes.
pub(crate) fn success_record(response: &TransportResponse, events_sent: usize) -> ResponseRecord {
	let mut record = ResponseRecord::from_body(200, response.body.as_ref());
	record.code = 200;
	let reported = response
		.body
		.as_ref()
		.and_then(|b| b.get("events_ingested"))
		.is_some();
	if !reported {
		record.events_ingested = events_sent as u64;
	}
	record
}

/// Record for a completed round trip with a non-200 status.
pub(crate) fn status_record(response: &TransportResponse) -> ResponseRecord {
	let mut record = ResponseRecord::from_body(response.status, response.body.as_ref());
	record.code = response.status;
	if record.error.is_none() {
		let raw = response.raw.trim();
		record.error = Some(if raw.is_empty() || response.body.is_some() {
			format!("unexpected response status {}", response.status)
		} else {
			format!("unexpected response status {}: {raw}", response.status)
		});
	}
	record
}

#[cfg(test)]
pub(crate) mod testing {
	//! In-memory transport for driver tests.

	use std::collections::VecDeque;
	use std::sync::Mutex;

	use amplitude_common_http::{Transport, TransportError, TransportRequest, TransportResponse};
	use async_trait::async_trait;
	use serde_json::{json, Value};

	pub type Reply = Result<TransportResponse, TransportError>;

	/// Replays scripted replies in order and records every request. Once the
	/// script runs out, every call gets `fallback`.
	pub struct MockTransport {
		replies: Mutex<VecDeque<Reply>>,
		fallback: Mutex<Option<Box<dyn Fn(&TransportRequest) -> Reply + Send>>>,
		requests: Mutex<Vec<TransportRequest>>,
	}

	impl MockTransport {
		pub fn new(replies: Vec<Reply>) -> Self {
			Self {
				replies: Mutex::new(replies.into()),
				fallback: Mutex::new(None),
				requests: Mutex::new(Vec::new()),
			}
		}

		/// Answers every request with an ok response echoing the event count.
		pub fn accepting() -> Self {
			Self::new(Vec::new()).with_fallback(|request| Ok(accepted(request)))
		}

		pub fn with_fallback<F>(self, f: F) -> Self
		where
			F: Fn(&TransportRequest) -> Reply + Send + 'static,
		{
			*self.fallback.lock().unwrap() = Some(Box::new(f));
			self
		}

		pub fn requests(&self) -> Vec<TransportRequest> {
			self.requests.lock().unwrap().clone()
		}

		pub fn request_count(&self) -> usize {
			self.requests.lock().unwrap().len()
		}
	}

	#[async_trait]
	impl Transport for MockTransport {
		async fn post(&self, request: TransportRequest) -> Reply {
			self.requests.lock().unwrap().push(request.clone());
			let scripted = self.replies.lock().unwrap().pop_front();
			match scripted {
				Some(reply) => reply,
				None => match self.fallback.lock().unwrap().as_ref() {
					Some(f) => f(&request),
					None => Err(TransportError::Connect("no scripted reply".to_string())),
				},
			}
		}
	}

	pub fn events_in(request: &TransportRequest) -> usize {
		match &request.body {
			amplitude_common_http::RequestBody::Json(body) => body["events"]
				.as_array()
				.map(Vec::len)
				.unwrap_or_default(),
			amplitude_common_http::RequestBody::Form(_) => 1,
		}
	}

	pub fn accepted(request: &TransportRequest) -> TransportResponse {
		let count = events_in(request);
		ok_body(json!({
			"code": 200,
			"events_ingested": count,
			"payload_size_bytes": count * 10,
			"server_upload_time": 1_700_000_000_000_i64 + count as i64
		}))
	}

	pub fn ok_body(body: Value) -> TransportResponse {
		TransportResponse::new(200, body.to_string())
	}

	pub fn status(code: u16, body: Value) -> TransportResponse {
		TransportResponse::new(code, body.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_success_record_falls_back_to_sent_count() {
		let response = TransportResponse::new(200, "success");
		let record = success_record(&response, 3);
		assert!(record.is_success());
		assert_eq!(record.events_ingested, 3);
		assert_eq!(record.payload_size_bytes, 0);
	}

	#[test]
	fn test_success_record_prefers_reported_counters() {
		let response = TransportResponse::new(
			200,
			json!({"code": 200, "events_ingested": 2, "payload_size_bytes": 77}).to_string(),
		);
		let record = success_record(&response, 3);
		assert_eq!(record.events_ingested, 2);
		assert_eq!(record.payload_size_bytes, 77);
	}

	#[test]
	fn test_status_record_keeps_remote_error() {
		let response = TransportResponse::new(
			400,
			json!({"code": 400, "error": "Invalid API key"}).to_string(),
		);
		let record = status_record(&response);
		assert_eq!(record.code, 400);
		assert_eq!(record.error.as_deref(), Some("Invalid API key"));
	}

	#[test]
	fn test_status_record_describes_plain_bodies() {
		let response = TransportResponse::new(502, "Bad Gateway");
		let record = status_record(&response);
		assert_eq!(record.code, 502);
		assert_eq!(
			record.error.as_deref(),
			Some("unexpected response status 502: Bad Gateway")
		);
	}
}
