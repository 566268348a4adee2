// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files, environment variables and
//! command-line overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use amplitude_core::ApiKey;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::DeliveryConfigLayer;
use crate::sections::{
	BatchConfigLayer, IdentifyConfigLayer, LoggingConfigLayer, RealtimeConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
	CommandLine = 100,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<DeliveryConfigLayer, ConfigError>;
}

/// Built-in defaults source.
///
/// Defaults are applied by each section's `finalize`, so this layer is empty.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<DeliveryConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(DeliveryConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `amplitude.toml` in the working directory.
	pub fn local() -> Self {
		Self::new("amplitude.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<DeliveryConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(DeliveryConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = read_file(&self.path)?;

		let layer: DeliveryConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `AMPLITUDE_<FIELD>` for top-level keys and
/// `AMPLITUDE_<SECTION>_<FIELD>` for section keys. The API key may also be
/// read from the file named by `AMPLITUDE_API_KEY_FILE`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<DeliveryConfigLayer, ConfigError> {
		debug!("loading environment variables");
		layer_from_env(&|name| std::env::var(name).ok())
	}
}

/// An already-built layer, typically from command-line flags.
pub struct OverrideSource {
	layer: DeliveryConfigLayer,
}

impl OverrideSource {
	pub fn new(layer: DeliveryConfigLayer) -> Self {
		Self { layer }
	}
}

impl ConfigSource for OverrideSource {
	fn name(&self) -> &'static str {
		"command-line"
	}

	fn precedence(&self) -> Precedence {
		Precedence::CommandLine
	}

	fn load(&self) -> Result<DeliveryConfigLayer, ConfigError> {
		Ok(self.layer.clone())
	}
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(crate) fn layer_from_env(lookup: Lookup<'_>) -> Result<DeliveryConfigLayer, ConfigError> {
	let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

	let api_key = match var("AMPLITUDE_API_KEY") {
		Some(key) => Some(ApiKey::new(key)),
		None => match var("AMPLITUDE_API_KEY_FILE") {
			Some(path) => Some(ApiKey::new(read_file(Path::new(&path))?)),
			None => None,
		},
	};

	let realtime = RealtimeConfigLayer {
		endpoint: var("AMPLITUDE_REALTIME_ENDPOINT"),
		timeout_secs: parse(lookup, "AMPLITUDE_REALTIME_TIMEOUT_SECS")?,
		min_id_length: parse(lookup, "AMPLITUDE_REALTIME_MIN_ID_LENGTH")?,
	};

	let batch = BatchConfigLayer {
		endpoint: var("AMPLITUDE_BATCH_ENDPOINT"),
		timeout_secs: parse(lookup, "AMPLITUDE_BATCH_TIMEOUT_SECS")?,
		batch_size: parse(lookup, "AMPLITUDE_BATCH_SIZE")?,
		retry_count: parse(lookup, "AMPLITUDE_BATCH_RETRY_COUNT")?,
		retry_delay_ms: parse(lookup, "AMPLITUDE_BATCH_RETRY_DELAY_MS")?,
		max_in_flight: parse(lookup, "AMPLITUDE_BATCH_MAX_IN_FLIGHT")?,
		jitter: parse_bool(lookup, "AMPLITUDE_BATCH_JITTER")?,
	};

	let identify = IdentifyConfigLayer {
		endpoint: var("AMPLITUDE_IDENTIFY_ENDPOINT"),
		timeout_secs: parse(lookup, "AMPLITUDE_IDENTIFY_TIMEOUT_SECS")?,
	};

	let logging = LoggingConfigLayer {
		level: var("AMPLITUDE_LOG_LEVEL"),
		format: parse(lookup, "AMPLITUDE_LOG_FORMAT")?,
	};

	Ok(DeliveryConfigLayer {
		api_key,
		default_driver: parse(lookup, "AMPLITUDE_DEFAULT_DRIVER")?,
		verify_tls: parse_bool(lookup, "AMPLITUDE_VERIFY_TLS")?,
		realtime: Some(realtime),
		batch: Some(batch),
		identify: Some(identify),
		logging: Some(logging),
	})
}

fn parse<T>(lookup: Lookup<'_>, name: &str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match lookup(name).filter(|s| !s.is_empty()) {
		Some(v) => v
			.trim()
			.parse()
			.map(Some)
			.map_err(|e| ConfigError::invalid_value(name, format!("'{v}': {e}"))),
		None => Ok(None),
	}
}

fn parse_bool(lookup: Lookup<'_>, name: &str) -> Result<Option<bool>, ConfigError> {
	match lookup(name).filter(|s| !s.is_empty()) {
		Some(v) => match v.trim().to_ascii_lowercase().as_str() {
			"1" | "true" | "yes" | "on" => Ok(Some(true)),
			"0" | "false" | "no" | "off" => Ok(Some(false)),
			_ => Err(ConfigError::invalid_value(
				name,
				format!("invalid boolean value '{v}'"),
			)),
		},
		None => Ok(None),
	}
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
	std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
		path: path.to_path_buf(),
		source: e,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sections::{DriverKind, LogFormat};
	use std::collections::HashMap;
	use std::io::Write;

	fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	fn load(vars: &HashMap<String, String>) -> Result<DeliveryConfigLayer, ConfigError> {
		layer_from_env(&|name| vars.get(name).cloned())
	}

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::CommandLine > Precedence::Environment);
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.api_key.is_none());
		assert!(layer.batch.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/amplitude.toml").load().unwrap();
		assert_eq!(layer, DeliveryConfigLayer::default());
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "batch = 3").unwrap();
		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_env_reads_all_sections() {
		let vars = env(&[
			("AMPLITUDE_API_KEY", "k"),
			("AMPLITUDE_DEFAULT_DRIVER", "backfill"),
			("AMPLITUDE_VERIFY_TLS", "false"),
			("AMPLITUDE_REALTIME_ENDPOINT", "http://localhost/2/httpapi"),
			("AMPLITUDE_BATCH_SIZE", "250"),
			("AMPLITUDE_BATCH_JITTER", "1"),
			("AMPLITUDE_IDENTIFY_TIMEOUT_SECS", "9"),
			("AMPLITUDE_LOG_FORMAT", "json"),
		]);
		let layer = load(&vars).unwrap();

		assert_eq!(layer.api_key.unwrap().expose(), "k");
		assert_eq!(layer.default_driver, Some(DriverKind::Batch));
		assert_eq!(layer.verify_tls, Some(false));
		assert_eq!(
			layer.realtime.unwrap().endpoint.as_deref(),
			Some("http://localhost/2/httpapi")
		);
		let batch = layer.batch.unwrap();
		assert_eq!(batch.batch_size, Some(250));
		assert_eq!(batch.jitter, Some(true));
		assert_eq!(layer.identify.unwrap().timeout_secs, Some(9));
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
	}

	#[test]
	fn test_env_invalid_number_names_the_variable() {
		let vars = env(&[("AMPLITUDE_BATCH_SIZE", "lots")]);
		let err = load(&vars).unwrap_err();
		assert!(
			matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "AMPLITUDE_BATCH_SIZE")
		);
	}

	#[test]
	fn test_env_invalid_bool_is_rejected() {
		let vars = env(&[("AMPLITUDE_VERIFY_TLS", "maybe")]);
		assert!(load(&vars).is_err());
	}

	#[test]
	fn test_env_api_key_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "from-file-key").unwrap();
		let path = file.path().to_string_lossy().to_string();

		let vars = env(&[("AMPLITUDE_API_KEY_FILE", path.as_str())]);
		let layer = load(&vars).unwrap();
		assert_eq!(layer.api_key.unwrap().expose(), "from-file-key");

		let vars = env(&[
			("AMPLITUDE_API_KEY", "direct"),
			("AMPLITUDE_API_KEY_FILE", path.as_str()),
		]);
		assert_eq!(load(&vars).unwrap().api_key.unwrap().expose(), "direct");
	}

	#[test]
	fn test_env_missing_key_file_is_an_error() {
		let vars = env(&[("AMPLITUDE_API_KEY_FILE", "/nonexistent/key")]);
		assert!(matches!(load(&vars), Err(ConfigError::FileRead { .. })));
	}

	#[test]
	fn test_empty_env_yields_empty_sections() {
		let layer = load(&HashMap::new()).unwrap();
		assert!(layer.api_key.is_none());
		assert_eq!(layer.batch.unwrap(), BatchConfigLayer::default());
	}
}
