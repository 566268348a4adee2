// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Command-line arguments and their translation into record maps.

use std::path::PathBuf;

use amplitude_config::{DeliveryConfigLayer, DriverKind, LogFormat, LoggingConfigLayer};
use amplitude_core::{ApiKey, UNSET_MARKER};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};

/// Send analytics events and user-property updates to Amplitude.
#[derive(Parser, Debug)]
#[command(name = "amplitude", about = "Amplitude delivery client", version)]
pub struct Cli {
	/// Path to a TOML config file (defaults to ./amplitude.toml)
	#[arg(long, global = true)]
	pub config: Option<PathBuf>,

	/// Driver for event sends: realtime, http, batch or backfill
	#[arg(long, global = true)]
	pub driver: Option<DriverKind>,

	/// Log output format: pretty, compact or json
	#[arg(long, global = true)]
	pub log_format: Option<LogFormat>,

	/// Log filter directive, e.g. `debug` or `amplitude_delivery=trace`
	#[arg(long, global = true)]
	pub log_level: Option<String>,

	/// API key; prefer AMPLITUDE_API_KEY or AMPLITUDE_API_KEY_FILE
	#[arg(long, global = true)]
	pub api_key: Option<String>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Send one event
	Send(SendArgs),
	/// Send every event in a JSON-lines file through the batch driver
	Backfill {
		/// File with one JSON event object per line
		file: PathBuf,
	},
	/// Update user properties
	Identify(IdentifyArgs),
}

#[derive(Args, Debug, Default)]
pub struct Identity {
	#[arg(long)]
	pub user_id: Option<String>,

	#[arg(long)]
	pub device_id: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct SendArgs {
	#[command(flatten)]
	pub identity: Identity,

	/// Event name
	#[arg(long, short = 'e')]
	pub event_type: Option<String>,

	/// Event property as key=value; values that parse as JSON keep their type
	#[arg(long = "prop", value_parser = parse_assignment)]
	pub props: Vec<(String, Value)>,

	/// A full event as a JSON object; flags override its fields
	#[arg(long)]
	pub json: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct IdentifyArgs {
	#[command(flatten)]
	pub identity: Identity,

	/// Overwrite a property: key=value
	#[arg(long, value_parser = parse_assignment)]
	pub set: Vec<(String, Value)>,

	/// Increment a numeric property: key=number
	#[arg(long, value_parser = parse_number_assignment)]
	pub add: Vec<(String, Value)>,

	/// Append to a list property: key=value
	#[arg(long, value_parser = parse_assignment)]
	pub append: Vec<(String, Value)>,

	/// Remove a property
	#[arg(long)]
	pub unset: Vec<String>,
}

impl Cli {
	/// Flags that override every other configuration source.
	pub fn overrides(&self) -> DeliveryConfigLayer {
		DeliveryConfigLayer {
			api_key: self.api_key.clone().map(ApiKey::new),
			default_driver: self.driver,
			logging: Some(LoggingConfigLayer {
				level: self.log_level.clone(),
				format: self.log_format,
			}),
			..Default::default()
		}
	}
}

impl SendArgs {
	pub fn to_map(&self) -> Result<Map<String, Value>, String> {
		let mut map = match &self.json {
			Some(raw) => match serde_json::from_str(raw) {
				Ok(Value::Object(map)) => map,
				Ok(_) => return Err("--json must be a JSON object".to_string()),
				Err(e) => return Err(format!("--json is not valid JSON: {e}")),
			},
			None => Map::new(),
		};

		self.identity.apply(&mut map);
		if let Some(event_type) = &self.event_type {
			replace_field(&mut map, "event_type", "eventType", Value::String(event_type.clone()));
		}
		if !self.props.is_empty() {
			if let Some(props) = map.remove("eventProperties") {
				map.entry("event_properties").or_insert(props);
			}
			let props = map
				.entry("event_properties")
				.or_insert_with(|| Value::Object(Map::new()));
			let Value::Object(props) = props else {
				return Err("event_properties must be a JSON object".to_string());
			};
			for (key, value) in &self.props {
				props.insert(key.clone(), value.clone());
			}
		}

		Ok(map)
	}
}

impl IdentifyArgs {
	pub fn to_map(&self) -> Map<String, Value> {
		let mut map = Map::new();
		self.identity.apply(&mut map);

		let mut user_properties = Map::new();
		for (op, entries) in [("$set", &self.set), ("$add", &self.add), ("$append", &self.append)] {
			if !entries.is_empty() {
				user_properties.insert(op.to_string(), Value::Object(entries.iter().cloned().collect()));
			}
		}
		if !self.unset.is_empty() {
			let unset = self
				.unset
				.iter()
				.map(|key| (key.clone(), Value::String(UNSET_MARKER.to_string())))
				.collect();
			user_properties.insert("$unset".to_string(), Value::Object(unset));
		}

		map.insert("user_properties".to_string(), Value::Object(user_properties));
		map
	}
}

impl Identity {
	fn apply(&self, map: &mut Map<String, Value>) {
		if let Some(user_id) = &self.user_id {
			replace_field(map, "user_id", "userId", Value::String(user_id.clone()));
		}
		if let Some(device_id) = &self.device_id {
			replace_field(map, "device_id", "deviceId", Value::String(device_id.clone()));
		}
	}
}

/// Sets `key`, dropping its camelCase spelling so the record decoder does
/// not see the field twice.
fn replace_field(map: &mut Map<String, Value>, key: &str, camel: &str, value: Value) {
	map.remove(camel);
	map.insert(key.to_string(), value);
}

/// Parses `key=value`. The value is taken as JSON when it parses, otherwise
/// as a plain string, so `count=3` is a number and `plan=pro` a string.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
	let (key, value) = raw
		.split_once('=')
		.ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
	let key = key.trim();
	if key.is_empty() {
		return Err(format!("missing key in '{raw}'"));
	}
	let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
	Ok((key.to_string(), value))
}

pub fn parse_number_assignment(raw: &str) -> Result<(String, Value), String> {
	let (key, value) = parse_assignment(raw)?;
	if !value.is_number() {
		return Err(format!("'{key}' needs a numeric value, got {value}"));
	}
	Ok((key, value))
}

#[cfg(test)]
mod tests {
	use super::*;
	use amplitude_core::EventRecord;
	use proptest::prelude::*;
	use serde_json::json;

	#[test]
	fn test_assignment_keeps_json_types() {
		assert_eq!(parse_assignment("count=3").unwrap(), ("count".to_string(), json!(3)));
		assert_eq!(parse_assignment("paid=true").unwrap(), ("paid".to_string(), json!(true)));
		assert_eq!(parse_assignment("plan=pro").unwrap(), ("plan".to_string(), json!("pro")));
		assert_eq!(
			parse_assignment("url=https://a.b/?x=1").unwrap(),
			("url".to_string(), json!("https://a.b/?x=1"))
		);
	}

	#[test]
	fn test_assignment_rejects_missing_parts() {
		assert!(parse_assignment("plan").is_err());
		assert!(parse_assignment("=pro").is_err());
		assert!(parse_number_assignment("logins=many").is_err());
		assert!(parse_number_assignment("logins=2").is_ok());
	}

	#[test]
	fn test_cli_parses_global_flags_after_subcommand() {
		let cli = Cli::try_parse_from([
			"amplitude",
			"send",
			"-e",
			"signup",
			"--user-id",
			"42",
			"--prop",
			"plan=pro",
			"--driver",
			"backfill",
			"--log-format",
			"json",
		])
		.unwrap();

		assert_eq!(cli.driver, Some(DriverKind::Batch));
		assert_eq!(cli.log_format, Some(LogFormat::Json));
		let overrides = cli.overrides();
		assert_eq!(overrides.default_driver, Some(DriverKind::Batch));
		assert!(overrides.api_key.is_none());
	}

	#[test]
	fn test_send_map_merges_json_and_flags() {
		let args = SendArgs {
			identity: Identity {
				user_id: Some("42".to_string()),
				device_id: None,
			},
			event_type: None,
			props: vec![("plan".to_string(), json!("pro"))],
			json: Some(r#"{"event_type": "signup", "event_properties": {"source": "ads"}}"#.to_string()),
		};

		let map = args.to_map().unwrap();

		assert_eq!(
			Value::Object(map),
			json!({
				"user_id": "42",
				"event_type": "signup",
				"event_properties": {"source": "ads", "plan": "pro"}
			})
		);
	}

	#[test]
	fn test_flags_replace_camel_case_json_fields() {
		let args = SendArgs {
			identity: Identity {
				user_id: Some("42".to_string()),
				device_id: None,
			},
			event_type: Some("login".to_string()),
			props: vec![("plan".to_string(), json!("pro"))],
			json: Some(
				r#"{"userId": "u", "eventType": "signup", "eventProperties": {"source": "ads"}}"#
					.to_string(),
			),
		};

		let map = args.to_map().unwrap();

		assert_eq!(
			Value::Object(map.clone()),
			json!({
				"user_id": "42",
				"event_type": "login",
				"event_properties": {"source": "ads", "plan": "pro"}
			})
		);
		let event = EventRecord::from_map(map).unwrap();
		assert_eq!(event.user_id(), Some("42"));
		assert_eq!(event.event_type(), "login");
	}

	#[test]
	fn test_send_map_rejects_non_object_json() {
		let args = SendArgs {
			json: Some("[1, 2]".to_string()),
			..Default::default()
		};
		assert!(args.to_map().is_err());
	}

	#[test]
	fn test_identify_map_groups_operations() {
		let cli = Cli::try_parse_from([
			"amplitude",
			"identify",
			"--user-id",
			"42",
			"--set",
			"plan=pro",
			"--add",
			"logins=1",
			"--unset",
			"trial",
			"--append",
			"tags=beta",
		])
		.unwrap();
		let Command::Identify(args) = cli.command else {
			panic!("expected identify");
		};

		assert_eq!(
			Value::Object(args.to_map()),
			json!({
				"user_id": "42",
				"user_properties": {
					"$set": {"plan": "pro"},
					"$add": {"logins": 1},
					"$append": {"tags": "beta"},
					"$unset": {"trial": "-"}
				}
			})
		);
	}

	proptest! {
		#[test]
		fn test_plain_words_stay_strings(key in "[a-z_]{1,12}", value in "[a-z][a-z ]{0,20}") {
			prop_assume!(!matches!(value.as_str(), "true" | "false" | "null"));
			let (parsed_key, parsed_value) = parse_assignment(&format!("{key}={value}")).unwrap();
			prop_assert_eq!(parsed_key, key);
			prop_assert_eq!(parsed_value, Value::String(value));
		}
	}
}
