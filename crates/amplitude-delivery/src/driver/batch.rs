// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Chunked driver for the batch upload endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use amplitude_common_http::{retry, RetryPolicy, Transport, TransportRequest};
use amplitude_config::{BatchConfig, DriverKind};
use amplitude_core::{
	format_event, now_millis, ApiKey, BatchProgress, ChunkFailure, DeliveryError, EventRecord,
	ResponseRecord, Result,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::{status_record, success_record, DeliveryDriver};

/// Splits events into chunks and posts each with its own retry budget.
///
/// Chunks go out one at a time unless `max_in_flight > 1`. Once any chunk
/// fails terminally no further chunk is started, and the call returns
/// [`DeliveryError::ChunkFailed`] with the progress made so far.
pub struct BatchDriver {
	transport: Arc<dyn Transport>,
	api_key: ApiKey,
	endpoint: String,
	timeout: Duration,
	batch_size: usize,
	max_in_flight: usize,
	policy: RetryPolicy,
}

enum ChunkOutcome {
	Delivered(ResponseRecord),
	Failed {
		attempts: u32,
		code: Option<u16>,
		message: String,
		response: Option<Value>,
	},
	Skipped,
}

impl BatchDriver {
	pub fn new(transport: Arc<dyn Transport>, api_key: ApiKey, config: &BatchConfig) -> Self {
		Self {
			transport,
			api_key,
			endpoint: config.endpoint.clone(),
			timeout: config.timeout(),
			batch_size: config.batch_size.max(1),
			max_in_flight: config.max_in_flight.max(1),
			policy: RetryPolicy::new(config.retry_count, config.retry_delay()).with_jitter(config.jitter),
		}
	}

	/// Overrides the retry policy built from config.
	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;
		self
	}

	async fn send_chunk(
		&self,
		index: usize,
		chunk_count: usize,
		events: Vec<Value>,
		halted: &AtomicBool,
	) -> ChunkOutcome {
		if halted.load(Ordering::SeqCst) {
			debug!(chunk = index + 1, chunk_count, "skipping chunk after earlier failure");
			return ChunkOutcome::Skipped;
		}

		let count = events.len();
		let payload = json!({
			"api_key": self.api_key.expose(),
			"events": events,
		});

		let retried = retry(&self.policy, |attempt| {
			debug!(
				chunk = index + 1,
				chunk_count,
				events = count,
				attempt = attempt + 1,
				"posting chunk"
			);
			let request = TransportRequest::json(self.endpoint.clone(), payload.clone(), self.timeout);
			self.transport.post(request)
		})
		.await;

		let attempts = retried.attempts;
		match retried.result {
			Ok(response) if retried.succeeded => {
				debug!(chunk = index + 1, attempts, "chunk delivered");
				ChunkOutcome::Delivered(success_record(&response, count))
			}
			Ok(response) => {
				halted.store(true, Ordering::SeqCst);
				let record = status_record(&response);
				ChunkOutcome::Failed {
					attempts,
					code: Some(response.status),
					message: record.error_details(),
					response: response.body,
				}
			}
			Err(err) => {
				halted.store(true, Ordering::SeqCst);
				ChunkOutcome::Failed {
					attempts,
					code: None,
					message: err.to_string(),
					response: None,
				}
			}
		}
	}
}

#[async_trait]
impl DeliveryDriver for BatchDriver {
	fn kind(&self) -> DriverKind {
		DriverKind::Batch
	}

	async fn send_events(&self, events: Vec<EventRecord>) -> Result<ResponseRecord> {
		if events.is_empty() {
			return Err(DeliveryError::EmptyBatch);
		}

		let chunks = events
			.chunks(self.batch_size)
			.map(|chunk| chunk.iter().map(format_event).collect::<Result<Vec<_>>>())
			.collect::<Result<Vec<_>>>()?;
		let chunk_count = chunks.len();

		info!(
			events = events.len(),
			chunk_count,
			batch_size = self.batch_size,
			max_in_flight = self.max_in_flight,
			"sending batch"
		);

		let halted = AtomicBool::new(false);
		let outcomes: Vec<ChunkOutcome> = stream::iter(chunks.into_iter().enumerate())
			.map(|(index, chunk)| self.send_chunk(index, chunk_count, chunk, &halted))
			.buffered(self.max_in_flight)
			.collect()
			.await;

		let mut total = ResponseRecord::success(0, 0, now_millis());
		let mut progress = BatchProgress::default();
		let mut failure: Option<ChunkFailure> = None;

		for (index, outcome) in outcomes.into_iter().enumerate() {
			match outcome {
				ChunkOutcome::Delivered(record) => {
					total.absorb(&record);
					progress.chunks_delivered += 1;
					progress.events_ingested += record.events_ingested;
					progress.payload_size_bytes += record.payload_size_bytes;
				}
				ChunkOutcome::Failed {
					attempts,
					code,
					message,
					response,
				} if failure.is_none() => {
					failure = Some(ChunkFailure {
						chunk_index: index,
						chunk_count,
						attempts,
						code,
						message,
						response,
						progress: BatchProgress::default(),
					});
				}
				ChunkOutcome::Failed { .. } | ChunkOutcome::Skipped => {}
			}
		}

		if let Some(mut failure) = failure {
			failure.progress = progress;
			error!(
				chunk = failure.chunk_index + 1,
				chunk_count,
				attempts = failure.attempts,
				code = ?failure.code,
				events_delivered = progress.events_ingested,
				"batch delivery stopped"
			);
			return Err(DeliveryError::ChunkFailed(Box::new(failure)));
		}

		info!(
			events_ingested = total.events_ingested,
			payload_size_bytes = total.payload_size_bytes,
			"batch delivered"
		);
		Ok(total)
	}
}
