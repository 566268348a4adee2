// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Amplitude delivery.
//!
//! This crate provides:
//! - A pre-configured HTTP client with consistent User-Agent header and
//!   opt-out TLS verification
//! - A [`Transport`] abstraction performing exactly one round trip per call
//! - The [`RetryPolicy`] decision table and a [`retry`] loop driven by it

mod client;
mod retry;
mod transport;

pub use client::{build_client, builder, user_agent, ClientOptions};
pub use retry::{retry, Classify, Outcome, Retried, RetryDecision, RetryPolicy, THROTTLE_COOLDOWN};
pub use transport::{
	HttpTransport, RequestBody, Transport, TransportError, TransportRequest, TransportResponse,
};
