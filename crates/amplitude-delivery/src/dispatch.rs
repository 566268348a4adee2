// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background dispatch so producers never wait on, or fail because of,
//! delivery.
//!
//! Producers push [`Delivery`] items onto a bounded channel. A single worker
//! task routes each item through a [`DeliveryHandler`] and logs the outcome;
//! nothing is propagated back to the producer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use amplitude_core::{ResponseRecord, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::delivery::Delivery;
use crate::router::DeliveryRouter;

/// Errors returned to producers. Delivery failures are never among them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
	#[error("dispatch queue is full")]
	QueueFull,

	#[error("dispatcher has shut down")]
	Closed,
}

/// Configuration for the dispatch queue.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
	/// Items that may wait before `try_enqueue` reports a full queue and
	/// `enqueue` starts waiting.
	pub queue_capacity: usize,
}

impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			queue_capacity: 1000,
		}
	}
}

/// Sends one item.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
	async fn deliver(&self, delivery: Delivery) -> Result<ResponseRecord>;
}

/// Events go to the router's default driver, identify records to the
/// identify endpoint.
#[async_trait]
impl DeliveryHandler for DeliveryRouter {
	async fn deliver(&self, delivery: Delivery) -> Result<ResponseRecord> {
		match delivery {
			Delivery::Event(event) => self.send_event(event).await,
			Delivery::Identify(identity) => self.send_identify(&identity).await,
		}
	}
}

#[derive(Debug)]
enum Command {
	Deliver(Delivery),
	Flush(oneshot::Sender<()>),
	Shutdown(oneshot::Sender<()>),
}

/// Outcome counters since the dispatcher started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
	pub delivered: u64,
	/// Completed with a non-success response.
	pub rejected: u64,
	/// Failed with an error before or during delivery.
	pub errored: u64,
}

#[derive(Default)]
struct Counters {
	delivered: AtomicU64,
	rejected: AtomicU64,
	errored: AtomicU64,
}

impl Counters {
	fn snapshot(&self) -> DispatchStats {
		DispatchStats {
			delivered: self.delivered.load(Ordering::SeqCst),
			rejected: self.rejected.load(Ordering::SeqCst),
			errored: self.errored.load(Ordering::SeqCst),
		}
	}
}

/// Handle to the background worker.
pub struct Dispatcher {
	tx: mpsc::Sender<Command>,
	closed: AtomicBool,
	counters: Arc<Counters>,
	worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
	/// Spawns the worker on the current tokio runtime.
	pub fn spawn(handler: Arc<dyn DeliveryHandler>, config: DispatchConfig) -> Self {
		let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
		let counters = Arc::new(Counters::default());

		info!(
			queue_capacity = config.queue_capacity,
			"Starting delivery dispatcher"
		);
		let worker = tokio::spawn(run(handler, rx, Arc::clone(&counters)));

		Self {
			tx,
			closed: AtomicBool::new(false),
			counters,
			worker: Mutex::new(Some(worker)),
		}
	}

	/// Queues an item, waiting for room when the queue is full.
	pub async fn enqueue(&self, delivery: impl Into<Delivery>) -> std::result::Result<(), DispatchError> {
		if self.is_closed() {
			return Err(DispatchError::Closed);
		}
		self
			.tx
			.send(Command::Deliver(delivery.into()))
			.await
			.map_err(|_| DispatchError::Closed)
	}

	/// Queues an item without waiting.
	pub fn try_enqueue(&self, delivery: impl Into<Delivery>) -> std::result::Result<(), DispatchError> {
		if self.is_closed() {
			return Err(DispatchError::Closed);
		}
		self
			.tx
			.try_send(Command::Deliver(delivery.into()))
			.map_err(|err| match err {
				mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
				mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
			})
	}

	/// Waits until every item queued before this call has been handled.
	pub async fn flush(&self) -> std::result::Result<(), DispatchError> {
		let (ack, done) = oneshot::channel();
		self
			.tx
			.send(Command::Flush(ack))
			.await
			.map_err(|_| DispatchError::Closed)?;
		done.await.map_err(|_| DispatchError::Closed)
	}

	/// Drains the queue, then stops the worker. Later enqueues fail with
	/// [`DispatchError::Closed`]. Calling this twice is a no-op.
	pub async fn shutdown(&self) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}

		let (ack, done) = oneshot::channel();
		if self.tx.send(Command::Shutdown(ack)).await.is_ok() {
			let _ = done.await;
		}

		if let Some(worker) = self.worker.lock().await.take() {
			if let Err(e) = worker.await {
				error!(error = %e, "Delivery dispatcher task failed");
			}
		}
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	pub fn stats(&self) -> DispatchStats {
		self.counters.snapshot()
	}
}

async fn run(
	handler: Arc<dyn DeliveryHandler>,
	mut rx: mpsc::Receiver<Command>,
	counters: Arc<Counters>,
) {
	while let Some(command) = rx.recv().await {
		match command {
			Command::Deliver(delivery) => deliver(handler.as_ref(), delivery, &counters).await,
			Command::Flush(ack) => {
				debug!("dispatch queue flushed");
				let _ = ack.send(());
			}
			Command::Shutdown(ack) => {
				rx.close();
				while let Some(command) = rx.recv().await {
					match command {
						Command::Deliver(delivery) => {
							deliver(handler.as_ref(), delivery, &counters).await
						}
						Command::Flush(ack) | Command::Shutdown(ack) => {
							let _ = ack.send(());
						}
					}
				}
				let _ = ack.send(());
				break;
			}
		}
	}

	let stats = counters.snapshot();
	info!(
		delivered = stats.delivered,
		rejected = stats.rejected,
		errored = stats.errored,
		"Delivery dispatcher stopped"
	);
}

async fn deliver(handler: &dyn DeliveryHandler, delivery: Delivery, counters: &Counters) {
	let label = delivery.describe();
	let kind = delivery.kind();

	match handler.deliver(delivery).await {
		Ok(response) if response.is_success() => {
			counters.delivered.fetch_add(1, Ordering::SeqCst);
			info!(
				kind,
				record = %label,
				events_ingested = response.events_ingested,
				"Delivered to Amplitude"
			);
		}
		Ok(response) => {
			counters.rejected.fetch_add(1, Ordering::SeqCst);
			warn!(
				kind,
				record = %label,
				code = response.code,
				details = %response.error_details(),
				"Amplitude did not accept delivery"
			);
		}
		Err(e) => {
			counters.errored.fetch_add(1, Ordering::SeqCst);
			error!(kind, record = %label, error = %e, "Dropped delivery");
		}
	}
}
