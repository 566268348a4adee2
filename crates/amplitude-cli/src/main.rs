// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `amplitude` command-line client.

mod args;
mod logging;

use std::path::Path;
use std::process::ExitCode;

use amplitude_config::load_config_with_overrides;
use amplitude_delivery::{DeliveryRouter, DriverKind, EventRecord, ResponseRecord};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::args::{Cli, Command};

#[tokio::main]
async fn main() -> Result<ExitCode> {
	let cli = Cli::parse();

	let config = load_config_with_overrides(cli.config.clone(), cli.overrides())
		.context("failed to load configuration")?;
	logging::init(&config.logging);

	let router = DeliveryRouter::from_config(&config).context("failed to build HTTP transport")?;

	let response = match &cli.command {
		Command::Send(args) => {
			let map = args.to_map().map_err(|e| anyhow!(e))?;
			let event = router.build_event(map).context("invalid event")?;
			info!(event_type = event.event_type(), driver = %router.default_kind(), "sending event");
			router.send_event(event).await?
		}
		Command::Backfill { file } => {
			let events = read_events(&router, file)?;
			info!(events = events.len(), file = %file.display(), "backfilling events");
			router.using(DriverKind::Batch, events).await?
		}
		Command::Identify(args) => {
			let identity = router
				.build_identify(args.to_map())
				.context("invalid identify")?;
			router.send_identify(&identity).await?
		}
	};

	Ok(if report(&response) {
		ExitCode::SUCCESS
	} else {
		ExitCode::FAILURE
	})
}

/// Parses one event per non-blank line.
fn read_events(router: &DeliveryRouter, path: &Path) -> Result<Vec<EventRecord>> {
	let contents = std::fs::read_to_string(path)
		.with_context(|| format!("failed to read {}", path.display()))?;

	contents
		.lines()
		.enumerate()
		.filter(|(_, line)| !line.trim().is_empty())
		.map(|(number, line)| {
			let map: Map<String, Value> = serde_json::from_str(line)
				.with_context(|| format!("line {}: not a JSON object", number + 1))?;
			router
				.build_event(map)
				.with_context(|| format!("line {}: invalid event", number + 1))
		})
		.collect()
}

/// Prints the response to stdout and returns whether it was a success.
fn report(response: &ResponseRecord) -> bool {
	match serde_json::to_string_pretty(response) {
		Ok(json) => println!("{json}"),
		Err(e) => warn!(error = %e, "failed to render response"),
	}

	if !response.is_success() {
		eprintln!("delivery failed: {}", response.error_details());
	}
	response.is_success()
}
