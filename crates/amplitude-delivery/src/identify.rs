// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identify API delivery.

use std::sync::Arc;
use std::time::Duration;

use amplitude_common_http::{Transport, TransportRequest};
use amplitude_config::IdentifyConfig;
use amplitude_core::{
	format_identify, now_millis, ApiKey, DeliveryError, IdentityRecord, ResponseRecord, Result,
	NO_RESPONSE_CODE,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::driver::status_record;

/// Sends user-property updates as a form-encoded `identification` field.
///
/// The identify endpoint answers with a bare body, so a 200 is reported as
/// one ingested record whose size is the serialized request payload.
pub struct IdentifyDriver {
	transport: Arc<dyn Transport>,
	api_key: ApiKey,
	endpoint: String,
	timeout: Duration,
}

impl IdentifyDriver {
	pub fn new(transport: Arc<dyn Transport>, api_key: ApiKey, config: &IdentifyConfig) -> Self {
		Self {
			transport,
			api_key,
			endpoint: config.endpoint.clone(),
			timeout: config.timeout(),
		}
	}

	/// Fails only when the record carries no property updates.
	pub async fn send_identify(&self, record: &IdentityRecord) -> Result<ResponseRecord> {
		if record.user_properties_empty() {
			return Err(DeliveryError::validation(
				"user_properties is required for identify",
			));
		}

		let identification = match format_identify(record).and_then(|v| Ok(serde_json::to_string(&v)?)) {
			Ok(identification) => identification,
			Err(err) => {
				warn!(error = %err, "failed to format identify");
				return Ok(ResponseRecord::failure(NO_RESPONSE_CODE, err.to_string()));
			}
		};

		let payload_size = json!({
			"api_key": self.api_key.expose(),
			"identification": identification,
		})
		.to_string()
		.len() as u64;

		let fields = vec![
			("api_key".to_string(), self.api_key.expose().to_string()),
			("identification".to_string(), identification),
		];

		debug!(endpoint = %self.endpoint, payload_size, "posting identify");
		let request = TransportRequest::form(self.endpoint.clone(), fields, self.timeout);

		let record = match self.transport.post(request).await {
			Ok(response) if response.is_ok() => ResponseRecord::success(1, payload_size, now_millis()),
			Ok(response) => {
				let record = status_record(&response);
				warn!(
					status = response.status,
					details = %record.error_details(),
					"identify rejected"
				);
				record
			}
			Err(err) => {
				warn!(error = %err, "identify delivery failed");
				ResponseRecord::failure(NO_RESPONSE_CODE, err.to_string())
			}
		};

		Ok(record)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::testing::{status, MockTransport};
	use amplitude_common_http::{RequestBody, TransportError, TransportResponse};
	use serde_json::Value;

	fn driver(transport: Arc<MockTransport>) -> IdentifyDriver {
		IdentifyDriver::new(transport, ApiKey::new("test-key"), &IdentifyConfig::default())
	}

	fn form(transport: &MockTransport) -> Vec<(String, String)> {
		match &transport.requests()[0].body {
			RequestBody::Form(fields) => fields.clone(),
			other => panic!("expected form body, got {other:?}"),
		}
	}

	/// Purpose: a `$set` of `plan=pro` answered with 200 counts as one
	/// ingested record.
	#[tokio::test]
	async fn test_set_plan_success() {
		let transport = Arc::new(MockTransport::new(vec![Ok(TransportResponse::new(
			200, "success",
		))]));
		let record = IdentityRecord::for_user("42").unwrap().set("plan", "pro");

		let response = driver(transport.clone()).send_identify(&record).await.unwrap();

		assert!(response.is_success());
		assert_eq!(response.events_ingested, 1);
		assert!(response.server_upload_time > 0);

		let fields = form(&transport);
		assert_eq!(fields[0], ("api_key".to_string(), "test-key".to_string()));
		assert_eq!(fields[1].0, "identification");
		let identification: Value = serde_json::from_str(&fields[1].1).unwrap();
		assert_eq!(identification["user_properties"]["$set"]["plan"], "pro");
		assert_eq!(identification["user_id"], "42");

		let expected_size = json!({"api_key": "test-key", "identification": fields[1].1})
			.to_string()
			.len() as u64;
		assert_eq!(response.payload_size_bytes, expected_size);
	}

	#[tokio::test]
	async fn test_empty_properties_fail_before_io() {
		let transport = Arc::new(MockTransport::accepting());
		let record = IdentityRecord::for_device("d-1").unwrap();

		let result = driver(transport.clone()).send_identify(&record).await;

		assert!(matches!(result, Err(DeliveryError::Validation(_))));
		assert_eq!(transport.request_count(), 0);
	}

	#[tokio::test]
	async fn test_rejection_becomes_failure_record() {
		let transport = Arc::new(MockTransport::new(vec![Ok(status(
			400,
			json!({"code": 400, "error": "Invalid API key"}),
		))]));
		let record = IdentityRecord::for_user("42").unwrap().add("logins", 1);

		let response = driver(transport).send_identify(&record).await.unwrap();

		assert_eq!(response.code, 400);
		assert_eq!(response.events_ingested, 0);
		assert_eq!(response.error_details(), "Error: Invalid API key");
	}

	#[tokio::test]
	async fn test_transport_failure_becomes_failure_record() {
		let transport = Arc::new(MockTransport::new(vec![Err(TransportError::Connect(
			"refused".to_string(),
		))]));
		let record = IdentityRecord::for_user("42").unwrap().unset("trial");

		let response = driver(transport).send_identify(&record).await.unwrap();

		assert_eq!(response.code, 500);
		assert!(!response.is_success());
	}

	#[tokio::test]
	async fn test_invalid_add_is_reported_not_raised() {
		let transport = Arc::new(MockTransport::accepting());
		let record = IdentityRecord::for_user("42").unwrap().add("logins", "many");

		let response = driver(transport.clone()).send_identify(&record).await.unwrap();

		assert_eq!(response.code, 500);
		assert_eq!(transport.request_count(), 0);
	}
}
