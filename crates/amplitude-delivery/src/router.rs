// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Driver selection and the caller-facing delivery API.

use std::sync::Arc;

use amplitude_common_http::{ClientOptions, HttpTransport, Transport, TransportError};
use amplitude_config::{DeliveryConfig, DriverKind};
use amplitude_core::{
	DeliveryError, EventRecord, IdentityRecord, ResponseRecord, Result,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::delivery::Delivery;
use crate::driver::{BatchDriver, DeliveryDriver, RealtimeDriver};
use crate::identify::IdentifyDriver;

/// Holds one instance of each driver and routes sends to the default one
/// unless a caller asks for a specific [`DriverKind`].
pub struct DeliveryRouter {
	default_kind: DriverKind,
	realtime: Arc<dyn DeliveryDriver>,
	batch: Arc<dyn DeliveryDriver>,
	identify: IdentifyDriver,
}

impl DeliveryRouter {
	pub fn new(
		default_kind: DriverKind,
		realtime: Arc<dyn DeliveryDriver>,
		batch: Arc<dyn DeliveryDriver>,
		identify: IdentifyDriver,
	) -> Self {
		Self {
			default_kind,
			realtime,
			batch,
			identify,
		}
	}

	/// Builds every driver over one shared [`HttpTransport`].
	pub fn from_config(config: &DeliveryConfig) -> std::result::Result<Self, TransportError> {
		let options = ClientOptions {
			verify_tls: config.verify_tls,
			..Default::default()
		};
		let transport = HttpTransport::new(&options)?;
		Ok(Self::with_transport(config, Arc::new(transport)))
	}

	pub fn with_transport(config: &DeliveryConfig, transport: Arc<dyn Transport>) -> Self {
		let realtime = RealtimeDriver::new(
			Arc::clone(&transport),
			config.api_key.clone(),
			&config.realtime,
		);
		let batch = BatchDriver::new(Arc::clone(&transport), config.api_key.clone(), &config.batch);
		let identify = IdentifyDriver::new(transport, config.api_key.clone(), &config.identify);

		Self::new(
			config.default_driver,
			Arc::new(realtime),
			Arc::new(batch),
			identify,
		)
	}

	pub fn default_kind(&self) -> DriverKind {
		self.default_kind
	}

	pub fn driver(&self, kind: DriverKind) -> &dyn DeliveryDriver {
		match kind {
			DriverKind::Realtime => self.realtime.as_ref(),
			DriverKind::Batch => self.batch.as_ref(),
		}
	}

	pub fn build_event(&self, map: Map<String, Value>) -> Result<EventRecord> {
		EventRecord::from_map(map)
	}

	pub fn build_identify(&self, map: Map<String, Value>) -> Result<IdentityRecord> {
		IdentityRecord::from_map(map)
	}

	pub async fn send_event(&self, event: EventRecord) -> Result<ResponseRecord> {
		self.send_events(vec![event]).await
	}

	pub async fn send_events(&self, events: Vec<EventRecord>) -> Result<ResponseRecord> {
		self.using(self.default_kind, events).await
	}

	/// Sends mixed records through the default driver. Every record must be
	/// an event; the first that is not fails the whole call before any I/O.
	pub async fn send_records(&self, records: Vec<Delivery>) -> Result<ResponseRecord> {
		let mut events = Vec::with_capacity(records.len());
		for (index, record) in records.into_iter().enumerate() {
			match record {
				Delivery::Event(event) => events.push(event),
				other => {
					return Err(DeliveryError::UnsupportedRecord {
						index,
						found: other.kind(),
					})
				}
			}
		}
		self.send_events(events).await
	}

	pub async fn using(&self, kind: DriverKind, events: Vec<EventRecord>) -> Result<ResponseRecord> {
		debug!(driver = %kind, events = events.len(), "routing events");
		self.driver(kind).send_events(events).await
	}

	pub async fn send_identify(&self, record: &IdentityRecord) -> Result<ResponseRecord> {
		self.identify.send_identify(record).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::testing::MockTransport;
	use amplitude_config::{DEFAULT_BATCH_ENDPOINT, DEFAULT_IDENTIFY_ENDPOINT, DEFAULT_REALTIME_ENDPOINT};
	use serde_json::json;

	fn router(kind: DriverKind) -> (DeliveryRouter, Arc<MockTransport>) {
		let transport = Arc::new(MockTransport::accepting());
		let mut config = DeliveryConfig::new("test-key");
		config.default_driver = kind;
		(DeliveryRouter::with_transport(&config, transport.clone()), transport)
	}

	fn event(name: &str) -> EventRecord {
		EventRecord::builder(name).user_id("42").build().unwrap()
	}

	#[tokio::test]
	async fn test_default_driver_is_used() {
		let (router, transport) = router(DriverKind::Batch);
		assert_eq!(router.default_kind(), DriverKind::Batch);

		let record = router.send_event(event("signup")).await.unwrap();

		assert!(record.is_success());
		assert_eq!(transport.requests()[0].endpoint, DEFAULT_BATCH_ENDPOINT);
	}

	#[tokio::test]
	async fn test_using_overrides_default() {
		let (router, transport) = router(DriverKind::Batch);

		router
			.using(DriverKind::Realtime, vec![event("a"), event("b")])
			.await
			.unwrap();

		assert_eq!(transport.requests()[0].endpoint, DEFAULT_REALTIME_ENDPOINT);
		assert_eq!(router.driver(DriverKind::Realtime).kind(), DriverKind::Realtime);
	}

	#[tokio::test]
	async fn test_send_records_rejects_identify() {
		let (router, transport) = router(DriverKind::Realtime);
		let records = vec![
			Delivery::Event(event("a")),
			Delivery::Identify(IdentityRecord::for_user("42").unwrap().set("plan", "pro")),
		];

		let err = router.send_records(records).await.unwrap_err();

		assert!(matches!(
			err,
			DeliveryError::UnsupportedRecord {
				index: 1,
				found: "identify"
			}
		));
		assert_eq!(transport.request_count(), 0);
	}

	#[tokio::test]
	async fn test_send_records_delivers_events() {
		let (router, _transport) = router(DriverKind::Realtime);
		let records = vec![Delivery::Event(event("a")), Delivery::Event(event("b"))];

		let record = router.send_records(records).await.unwrap();

		assert_eq!(record.events_ingested, 2);
	}

	#[tokio::test]
	async fn test_send_identify_uses_identify_endpoint() {
		let (router, transport) = router(DriverKind::Realtime);
		let map = json!({"user_id": "42", "user_properties": {"$set": {"plan": "pro"}}});
		let identity = router
			.build_identify(map.as_object().unwrap().clone())
			.unwrap();

		let record = router.send_identify(&identity).await.unwrap();

		assert!(record.is_success());
		assert_eq!(record.events_ingested, 1);
		assert_eq!(transport.requests()[0].endpoint, DEFAULT_IDENTIFY_ENDPOINT);
	}

	#[test]
	fn test_build_event_validates() {
		let (router, _transport) = router(DriverKind::Realtime);

		let ok = json!({"user_id": "42", "event_type": "signup"});
		assert!(router.build_event(ok.as_object().unwrap().clone()).is_ok());

		let missing = json!({"event_type": "signup"});
		assert!(matches!(
			router.build_event(missing.as_object().unwrap().clone()),
			Err(DeliveryError::Validation(_))
		));

		let unknown = json!({"user_id": "42", "event_type": "signup", "colour": "red"});
		assert!(router
			.build_event(unknown.as_object().unwrap().clone())
			.is_err());
	}
}
