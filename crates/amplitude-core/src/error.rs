// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for Amplitude delivery.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Delivery errors.
///
/// Remote failures on the realtime and identify paths are reported through
/// [`crate::ResponseRecord`] instead; only pre-flight problems and the bulk
/// driver's unrecoverable chunk failures surface here.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// A record failed validation at construction or formatting time.
	#[error("validation failed: {0}")]
	Validation(String),

	/// A send was attempted with no events.
	#[error("no events to send")]
	EmptyBatch,

	/// A bulk send received a record that is not an event.
	#[error("record {index} is an {found} record; all records must be events")]
	UnsupportedRecord { index: usize, found: &'static str },

	/// A payload could not be serialized.
	#[error("serialization error: {0}")]
	Serialization(String),

	/// A bulk chunk failed terminally.
	#[error("{0}")]
	ChunkFailed(Box<ChunkFailure>),
}

impl DeliveryError {
	pub fn validation(message: impl Into<String>) -> Self {
		DeliveryError::Validation(message.into())
	}

	/// The remote status code associated with this error, when one was seen.
	pub fn code(&self) -> Option<u16> {
		match self {
			DeliveryError::ChunkFailed(failure) => failure.code,
			_ => None,
		}
	}

	/// The raw remote response body associated with this error.
	pub fn response_data(&self) -> Option<&Value> {
		match self {
			DeliveryError::ChunkFailed(failure) => failure.response.as_ref(),
			_ => None,
		}
	}

	/// Returns true for errors raised before any network I/O.
	pub fn is_preflight(&self) -> bool {
		!matches!(self, DeliveryError::ChunkFailed(_))
	}
}

impl From<serde_json::Error> for DeliveryError {
	fn from(err: serde_json::Error) -> Self {
		DeliveryError::Serialization(err.to_string())
	}
}

/// Counters for the chunks that were delivered before a bulk send stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
	pub chunks_delivered: usize,
	pub events_ingested: u64,
	pub payload_size_bytes: u64,
}

/// Detail for [`DeliveryError::ChunkFailed`].
#[derive(Debug, Clone)]
pub struct ChunkFailure {
	/// Zero-based index of the failing chunk.
	pub chunk_index: usize,
	pub chunk_count: usize,
	pub attempts: u32,
	/// Last observed status; `None` when the last attempt got no response.
	pub code: Option<u16>,
	pub message: String,
	pub response: Option<Value>,
	pub progress: BatchProgress,
}

impl fmt::Display for ChunkFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"chunk {}/{} failed after {} attempt(s)",
			self.chunk_index + 1,
			self.chunk_count,
			self.attempts
		)?;
		if let Some(code) = self.code {
			write!(f, " (status {code})")?;
		}
		write!(
			f,
			": {}; {} chunk(s) with {} event(s) already delivered",
			self.message, self.progress.chunks_delivered, self.progress.events_ingested
		)
	}
}

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;
