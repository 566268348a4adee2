// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use tracing::warn;

const SDK_NAME: &str = "amplitude-delivery";
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Options applied to the pooled HTTP client.
///
/// There is no client-wide timeout; each [`crate::TransportRequest`] carries
/// its own.
#[derive(Debug, Clone)]
pub struct ClientOptions {
	/// Validate server certificates. Disabling this is an explicit operator
	/// opt-out and is logged at construction time.
	pub verify_tls: bool,
	/// Overrides the default `amplitude-delivery/{version}` User-Agent.
	pub user_agent: Option<String>,
}

impl Default for ClientOptions {
	fn default() -> Self {
		Self {
			verify_tls: true,
			user_agent: None,
		}
	}
}

/// Creates a new HTTP client builder with the standard User-Agent header.
///
/// Use this when you need to customize the client further before building.
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Builds the pooled client used by [`crate::HttpTransport`].
pub fn build_client(options: &ClientOptions) -> Result<Client, reqwest::Error> {
	let builder = match &options.user_agent {
		Some(ua) => Client::builder().user_agent(ua.clone()),
		None => builder(),
	};

	if !options.verify_tls {
		warn!("TLS certificate verification is disabled for Amplitude delivery");
	}

	builder
		.danger_accept_invalid_certs(!options.verify_tls)
		.build()
}

/// Returns the standard User-Agent string.
///
/// Format: `amplitude-delivery/{version}`
pub fn user_agent() -> String {
	format!("{SDK_NAME}/{SDK_VERSION}")
}
