// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Single-round-trip HTTP transport.
//!
//! A [`Transport`] never retries; callers wrap it with [`crate::retry`] so the
//! policy can be swapped or tested without a network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::client::{build_client, ClientOptions};

/// Request body encodings accepted by the remote API.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
	/// Sent as `application/json`.
	Json(Value),
	/// Sent as `application/x-www-form-urlencoded`.
	Form(Vec<(String, String)>),
}

impl RequestBody {
	pub fn content_type(&self) -> &'static str {
		match self {
			RequestBody::Json(_) => "application/json",
			RequestBody::Form(_) => "application/x-www-form-urlencoded",
		}
	}
}

/// One POST to one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
	pub endpoint: String,
	pub body: RequestBody,
	pub timeout: Duration,
}

impl TransportRequest {
	pub fn json(endpoint: impl Into<String>, body: Value, timeout: Duration) -> Self {
		Self {
			endpoint: endpoint.into(),
			body: RequestBody::Json(body),
			timeout,
		}
	}

	pub fn form(endpoint: impl Into<String>, fields: Vec<(String, String)>, timeout: Duration) -> Self {
		Self {
			endpoint: endpoint.into(),
			body: RequestBody::Form(fields),
			timeout,
		}
	}
}

/// Status and body of a completed round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
	pub status: u16,
	/// The body parsed as JSON, when it was JSON.
	pub body: Option<Value>,
	pub raw: String,
}

impl TransportResponse {
	pub fn new(status: u16, raw: impl Into<String>) -> Self {
		let raw = raw.into();
		let body = serde_json::from_str(&raw).ok();
		Self { status, body, raw }
	}

	pub fn is_ok(&self) -> bool {
		self.status == 200
	}
}

/// Network-level failure: no HTTP status was observed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
	#[error("request timed out after {0:?}")]
	Timeout(Duration),

	#[error("connection failed: {0}")]
	Connect(String),

	#[error("HTTP request failed: {0}")]
	Request(String),

	#[error("failed to build HTTP client: {0}")]
	Client(String),
}

impl TransportError {
	fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
		if err.is_timeout() {
			TransportError::Timeout(timeout)
		} else if err.is_connect() {
			TransportError::Connect(err.to_string())
		} else {
			TransportError::Request(err.to_string())
		}
	}
}

/// Performs one HTTP round trip.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
///
/// Construct once per process and share by `Arc`; the client is read-only
/// after construction.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	client: Client,
}

impl HttpTransport {
	pub fn new(options: &ClientOptions) -> Result<Self, TransportError> {
		let client = build_client(options).map_err(|e| TransportError::Client(e.to_string()))?;
		Ok(Self { client })
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
		let TransportRequest {
			endpoint,
			body,
			timeout,
		} = request;

		debug!(
			endpoint = %endpoint,
			content_type = body.content_type(),
			timeout_ms = timeout.as_millis() as u64,
			"posting to Amplitude"
		);

		let builder = self.client.post(&endpoint).timeout(timeout);
		let builder = match &body {
			RequestBody::Json(value) => builder.json(value),
			RequestBody::Form(fields) => builder.form(fields),
		};

		let response = builder
			.send()
			.await
			.map_err(|e| TransportError::from_reqwest(e, timeout))?;

		let status = response.status().as_u16();
		let raw = response
			.text()
			.await
			.map_err(|e| TransportError::from_reqwest(e, timeout))?;

		debug!(endpoint = %endpoint, status, bytes = raw.len(), "Amplitude responded");

		Ok(TransportResponse::new(status, raw))
	}
}
