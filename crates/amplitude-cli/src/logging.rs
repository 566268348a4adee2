// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use amplitude_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
/// Output goes to stderr so stdout carries only the response.
pub fn init(config: &LoggingConfig) {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(&config.level))
		.unwrap_or_else(|_| EnvFilter::new("info"));

	let output = match config.format {
		LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
		LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
		LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
	};

	tracing_subscriber::registry().with(output).with(filter).init();
}
