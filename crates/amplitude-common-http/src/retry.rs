// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry decisions for Amplitude HTTP requests.
//!
//! The decision table is fixed:
//!
//! | observed                          | decision                          |
//! |-----------------------------------|-----------------------------------|
//! | 200                               | success                           |
//! | 400, 413                          | fatal                             |
//! | 429                               | wait [`THROTTLE_COOLDOWN`], retry |
//! | 500, 502, 503, 504, no response   | wait `backoff_base`, retry        |
//! | anything else                     | fatal                             |
//!
//! Retries stop being offered once `max_retries` have been spent.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::transport::{TransportError, TransportResponse};

/// Amplitude's throttle window. The 429 cooldown never drops below this.
pub const THROTTLE_COOLDOWN: Duration = Duration::from_secs(30);

const SERVER_ERROR_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// What a single attempt observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Status(u16),
	TransportFailure,
}

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
	Success,
	Fatal,
	Retry(Duration),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
	/// Retries after the initial attempt.
	pub max_retries: u32,
	/// Linear backoff for server errors and transport failures.
	pub backoff_base: Duration,
	/// Wait after a 429. Values below [`THROTTLE_COOLDOWN`] are raised to it.
	pub throttle_cooldown: Duration,
	/// Randomize waits. Backoff varies in `[0.5, 1.5) * base`; the throttle
	/// cooldown only ever grows, by up to 10%.
	pub jitter: bool,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 3,
			backoff_base: Duration::from_millis(2000),
			throttle_cooldown: THROTTLE_COOLDOWN,
			jitter: false,
		}
	}
}

impl RetryPolicy {
	pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
		Self {
			max_retries,
			backoff_base,
			..Self::default()
		}
	}

	pub fn with_jitter(mut self, jitter: bool) -> Self {
		self.jitter = jitter;
		self
	}

	/// Decides what follows attempt `attempt` (zero-based).
	pub fn decide(&self, attempt: u32, outcome: Outcome) -> RetryDecision {
		let has_retries_left = attempt < self.max_retries;

		match outcome {
			Outcome::Status(200) => RetryDecision::Success,
			Outcome::Status(400) | Outcome::Status(413) => RetryDecision::Fatal,
			Outcome::Status(429) if has_retries_left => RetryDecision::Retry(self.cooldown_delay()),
			Outcome::Status(status) if SERVER_ERROR_STATUSES.contains(&status) && has_retries_left => {
				RetryDecision::Retry(self.backoff_delay())
			}
			Outcome::TransportFailure if has_retries_left => RetryDecision::Retry(self.backoff_delay()),
			_ => RetryDecision::Fatal,
		}
	}

	fn cooldown_delay(&self) -> Duration {
		let cooldown = self.throttle_cooldown.max(THROTTLE_COOLDOWN);
		if self.jitter {
			cooldown.mul_f64(1.0 + fastrand::f64() * 0.1)
		} else {
			cooldown
		}
	}

	fn backoff_delay(&self) -> Duration {
		if self.jitter {
			self.backoff_base.mul_f64(0.5 + fastrand::f64())
		} else {
			self.backoff_base
		}
	}
}

/// Anything whose result can be mapped onto an [`Outcome`].
pub trait Classify {
	fn outcome(&self) -> Outcome;
}

impl Classify for Result<TransportResponse, TransportError> {
	fn outcome(&self) -> Outcome {
		match self {
			Ok(response) => Outcome::Status(response.status),
			Err(_) => Outcome::TransportFailure,
		}
	}
}

/// The last attempt's result plus bookkeeping.
#[derive(Debug)]
pub struct Retried<R> {
	pub result: R,
	/// Total attempts made, including the first.
	pub attempts: u32,
	pub succeeded: bool,
}

/// Runs `f` until the policy reports success or a fatal outcome.
///
/// `f` receives the zero-based attempt index. Waits are `tokio::time::sleep`
/// suspensions.
pub async fn retry<F, Fut, R>(policy: &RetryPolicy, mut f: F) -> Retried<R>
where
	F: FnMut(u32) -> Fut,
	Fut: Future<Output = R>,
	R: Classify + Debug,
{
	let mut attempt = 0;

	loop {
		let result = f(attempt).await;
		let outcome = result.outcome();

		match policy.decide(attempt, outcome) {
			RetryDecision::Success => {
				return Retried {
					result,
					attempts: attempt + 1,
					succeeded: true,
				};
			}
			RetryDecision::Fatal => {
				if attempt >= policy.max_retries {
					warn!(
						?outcome,
						attempts = attempt + 1,
						max_retries = policy.max_retries,
						"max retry attempts exhausted"
					);
				} else {
					warn!(?outcome, attempt = attempt + 1, "non-retryable outcome");
				}
				return Retried {
					result,
					attempts: attempt + 1,
					succeeded: false,
				};
			}
			RetryDecision::Retry(delay) => {
				warn!(
					?outcome,
					attempt = attempt + 1,
					max_retries = policy.max_retries,
					delay_ms = delay.as_millis() as u64,
					"retrying after failure"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
		}
	}
}
