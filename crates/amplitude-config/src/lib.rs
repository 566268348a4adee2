// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for Amplitude delivery.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file,
//!   environment, command line)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`AMPLITUDE_*`)
//!
//! # Usage
//!
//! ```ignore
//! use amplitude_config::load_config;
//!
//! let config = load_config()?;
//! println!("default driver: {}", config.default_driver);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::DeliveryConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, OverrideSource, Precedence, TomlSource};

use std::path::PathBuf;

use amplitude_core::ApiKey;
use tracing::{debug, info};

/// Fully resolved delivery configuration.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
	pub api_key: ApiKey,
	pub default_driver: DriverKind,
	pub verify_tls: bool,
	pub realtime: RealtimeConfig,
	pub batch: BatchConfig,
	pub identify: IdentifyConfig,
	pub logging: LoggingConfig,
}

impl DeliveryConfig {
	/// Defaults for everything except the key.
	pub fn new(api_key: impl Into<ApiKey>) -> Self {
		Self {
			api_key: api_key.into(),
			default_driver: DriverKind::default(),
			verify_tls: true,
			realtime: RealtimeConfig::default(),
			batch: BatchConfig::default(),
			identify: IdentifyConfig::default(),
			logging: LoggingConfig::default(),
		}
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`AMPLITUDE_*`)
/// 2. Config file (`./amplitude.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<DeliveryConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::local()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path and command-line
/// overrides on top of the environment.
pub fn load_config_with_overrides(
	config_path: Option<PathBuf>,
	overrides: DeliveryConfigLayer,
) -> Result<DeliveryConfig, ConfigError> {
	let toml = match config_path {
		Some(path) => TomlSource::new(path),
		None => TomlSource::local(),
	};

	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(toml),
		Box::new(EnvSource),
		Box::new(OverrideSource::new(overrides)),
	])
}

/// Merge the given sources in precedence order and finalize.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<DeliveryConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = DeliveryConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: DeliveryConfigLayer) -> Result<DeliveryConfig, ConfigError> {
	let api_key = layer
		.api_key
		.filter(|k| !k.is_empty())
		.ok_or_else(|| {
			ConfigError::validation(
				"api_key is required (set AMPLITUDE_API_KEY, AMPLITUDE_API_KEY_FILE or api_key in the config file)",
			)
		})?;

	let config = DeliveryConfig {
		api_key,
		default_driver: layer.default_driver.unwrap_or_default(),
		verify_tls: layer.verify_tls.unwrap_or(true),
		realtime: layer.realtime.unwrap_or_default().finalize(),
		batch: layer.batch.unwrap_or_default().finalize(),
		identify: layer.identify.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		default_driver = %config.default_driver,
		verify_tls = config.verify_tls,
		realtime_endpoint = %config.realtime.endpoint,
		batch_endpoint = %config.batch.endpoint,
		batch_size = config.batch.batch_size,
		max_in_flight = config.batch.max_in_flight,
		identify_endpoint = %config.identify.endpoint,
		"Delivery configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &DeliveryConfig) -> Result<(), ConfigError> {
	if config.batch.batch_size == 0 {
		return Err(ConfigError::validation("batch.batch_size must be at least 1"));
	}
	if config.batch.max_in_flight == 0 {
		return Err(ConfigError::validation(
			"batch.max_in_flight must be at least 1",
		));
	}

	for (name, timeout_secs) in [
		("realtime.timeout_secs", config.realtime.timeout_secs),
		("batch.timeout_secs", config.batch.timeout_secs),
		("identify.timeout_secs", config.identify.timeout_secs),
	] {
		if timeout_secs == 0 {
			return Err(ConfigError::validation(format!("{name} must be at least 1")));
		}
	}

	for (name, endpoint) in [
		("realtime.endpoint", &config.realtime.endpoint),
		("batch.endpoint", &config.batch.endpoint),
		("identify.endpoint", &config.identify.endpoint),
	] {
		if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
			return Err(ConfigError::validation(format!(
				"{name} must be an http(s) URL, got '{endpoint}'"
			)));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn layer_with_key() -> DeliveryConfigLayer {
		DeliveryConfigLayer {
			api_key: Some(ApiKey::new("test-key")),
			..Default::default()
		}
	}

	#[test]
	fn test_finalize_applies_defaults() {
		let config = finalize(layer_with_key()).unwrap();
		assert_eq!(config.default_driver, DriverKind::Realtime);
		assert!(config.verify_tls);
		assert_eq!(config.realtime.endpoint, DEFAULT_REALTIME_ENDPOINT);
		assert_eq!(config.batch.endpoint, DEFAULT_BATCH_ENDPOINT);
		assert_eq!(config.identify.endpoint, DEFAULT_IDENTIFY_ENDPOINT);
		assert_eq!(config.batch.batch_size, 1000);
		assert_eq!(config.realtime.min_id_length, Some(5));
	}

	#[test]
	fn test_missing_api_key_is_rejected() {
		let err = finalize(DeliveryConfigLayer::default()).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));

		let blank = DeliveryConfigLayer {
			api_key: Some(ApiKey::new("   ")),
			..Default::default()
		};
		assert!(finalize(blank).is_err());
	}

	#[test]
	fn test_zero_batch_size_is_rejected() {
		let mut layer = layer_with_key();
		layer.batch = Some(BatchConfigLayer {
			batch_size: Some(0),
			..Default::default()
		});
		assert!(finalize(layer).is_err());
	}

	#[test]
	fn test_zero_timeout_is_rejected() {
		let mut layer = layer_with_key();
		layer.realtime = Some(RealtimeConfigLayer {
			timeout_secs: Some(0),
			..Default::default()
		});
		let err = finalize(layer).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
		assert!(err.to_string().contains("realtime.timeout_secs must be at least 1"));

		let mut layer = layer_with_key();
		layer.batch = Some(BatchConfigLayer {
			timeout_secs: Some(0),
			..Default::default()
		});
		assert!(finalize(layer).unwrap_err().to_string().contains("batch.timeout_secs"));

		let mut layer = layer_with_key();
		layer.identify = Some(IdentifyConfigLayer {
			timeout_secs: Some(0),
			..Default::default()
		});
		assert!(finalize(layer).unwrap_err().to_string().contains("identify.timeout_secs"));
	}

	#[test]
	fn test_zero_max_in_flight_is_rejected() {
		let mut layer = layer_with_key();
		layer.batch = Some(BatchConfigLayer {
			max_in_flight: Some(0),
			..Default::default()
		});
		assert!(finalize(layer).is_err());
	}

	#[test]
	fn test_non_http_endpoint_is_rejected() {
		let mut layer = layer_with_key();
		layer.identify = Some(IdentifyConfigLayer {
			endpoint: Some("ftp://api2.amplitude.com/identify".to_string()),
			..Default::default()
		});
		let err = finalize(layer).unwrap_err();
		assert!(err.to_string().contains("identify.endpoint"));
	}

	#[test]
	fn test_file_then_override_precedence() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
api_key = "file-key"
default_driver = "batch"

[batch]
batch_size = 100
retry_count = 7
"#
		)
		.unwrap();

		let overrides = DeliveryConfigLayer {
			default_driver: Some(DriverKind::Realtime),
			batch: Some(BatchConfigLayer {
				batch_size: Some(10),
				..Default::default()
			}),
			..Default::default()
		};

		let config = load_from_sources(vec![
			Box::new(OverrideSource::new(overrides)),
			Box::new(TomlSource::new(file.path())),
			Box::new(DefaultsSource),
		])
		.unwrap();

		assert_eq!(config.api_key.expose(), "file-key");
		assert_eq!(config.default_driver, DriverKind::Realtime);
		assert_eq!(config.batch.batch_size, 10);
		assert_eq!(config.batch.retry_count, 7);
	}

	#[test]
	fn test_new_uses_defaults() {
		let config = DeliveryConfig::new("k");
		assert_eq!(config.batch, BatchConfig::default());
		assert_eq!(format!("{:?}", config.api_key), "ApiKey(\"[REDACTED]\")");
	}
}
