// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for fire.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`FIRE_*`)
//!
//! # Usage
//!
//! ```ignore
//! use fire_config::load_config;
//!
//! let config = load_config()?;
//! println!("tracking {} repositories", config.repos.len());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::FireConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH};

use fire_naming::TrackedRepository;
use tracing::{debug, info, warn};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct FireConfig {
	pub repos: Vec<TrackedRepository>,
	pub runtime: RuntimeConfig,
	pub github: GitHubConfig,
	pub proxy: ProxyConfig,
	pub certs: CertsConfig,
	pub builds: BuildsConfig,
	pub notify: NotifyConfig,
	pub logging: LoggingConfig,
}

impl FireConfig {
	/// Looks up a tracked repository by its short name.
	pub fn repo(&self, short_name: &str) -> Option<&TrackedRepository> {
		self.repos.iter().find(|r| r.short_name == short_name)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`FIRE_*`)
/// 2. Config file (`/etc/fire/fire.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<FireConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<FireConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<FireConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = FireConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: FireConfigLayer) -> Result<FireConfig, ConfigError> {
	let repos = sections::resolve_repos(layer.repos.unwrap_or_default())?;
	let runtime = layer.runtime.unwrap_or_default().finalize();
	let github = layer.github.unwrap_or_default().finalize();
	let proxy = layer.proxy.unwrap_or_default().finalize();
	let certs = layer.certs.unwrap_or_default().finalize();
	let builds = layer.builds.unwrap_or_default().finalize();
	let notify = layer.notify.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	let config = FireConfig {
		repos,
		runtime,
		github,
		proxy,
		certs,
		builds,
		notify,
		logging,
	};
	validate_config(&config)?;

	if config.repos.is_empty() {
		warn!("no repositories configured, reconciliation will not destroy anything");
	}

	info!(
		repos = config.repos.len(),
		base_template = %config.runtime.base_template,
		domain = %config.proxy.domain,
		github_token = config.github.token.is_some(),
		callback_signing = config.notify.secret.is_some(),
		"configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &FireConfig) -> Result<(), ConfigError> {
	let timeouts = [
		("runtime.address_timeout_secs", config.runtime.address_timeout_secs),
		("runtime.cleanup_interval_secs", config.runtime.cleanup_interval_secs),
		("github.timeout_secs", config.github.timeout_secs),
		("builds.timeout_secs", config.builds.timeout_secs),
		("notify.timeout_secs", config.notify.timeout_secs),
	];
	for (key, value) in timeouts {
		if value == 0 {
			return Err(ConfigError::validation(format!("{key} must be greater than zero")));
		}
	}

	if config.builds.max_concurrent == 0 {
		return Err(ConfigError::validation(
			"builds.max_concurrent must be greater than zero",
		));
	}

	if config.proxy.domain.trim().is_empty() {
		return Err(ConfigError::validation("proxy.domain must not be empty"));
	}

	if config.runtime.base_template == config.runtime.data_template {
		return Err(ConfigError::validation(
			"runtime.base_template and runtime.data_template must differ",
		));
	}

	Ok(())
}
