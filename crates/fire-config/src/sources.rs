// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use fire_common_config::load_secret_env;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::FireConfigLayer;
use crate::sections::{
	parse_repos_env, BuildsConfigLayer, CertsConfigLayer, GitHubConfigLayer, LogFormat,
	LoggingConfigLayer, NotifyConfigLayer, ProxyConfigLayer, RuntimeConfigLayer,
};

/// Default location of the configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/fire/fire.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<FireConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<FireConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(FireConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<FireConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(FireConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: FireConfigLayer =
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
/// Convention: FIRE_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<FireConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(FireConfigLayer {
			repos: env_var("FIRE_REPOS")
				.map(|v| parse_repos_env(&v))
				.transpose()?,
			runtime: Some(load_runtime_from_env()?),
			github: Some(load_github_from_env()?),
			proxy: Some(load_proxy_from_env()),
			certs: Some(load_certs_from_env()),
			builds: Some(load_builds_from_env()?),
			notify: Some(load_notify_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|v| {
		v.split(',')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(String::from)
			.collect()
	})
}

fn env_args(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|v| v.split_whitespace().map(String::from).collect())
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid usize value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_runtime_from_env() -> Result<RuntimeConfigLayer, ConfigError> {
	Ok(RuntimeConfigLayer {
		lxc_path: env_var("FIRE_RUNTIME_LXC_PATH"),
		base_template: env_var("FIRE_RUNTIME_BASE_TEMPLATE"),
		data_template: env_var("FIRE_RUNTIME_DATA_TEMPLATE"),
		data_enabled: env_bool("FIRE_RUNTIME_DATA_ENABLED"),
		backing_store: env_var("FIRE_RUNTIME_BACKING_STORE"),
		create_template: env_var("FIRE_RUNTIME_CREATE_TEMPLATE"),
		create_args: env_args("FIRE_RUNTIME_CREATE_ARGS"),
		snapshot_clones: env_bool("FIRE_RUNTIME_SNAPSHOT_CLONES"),
		cpus: env_var("FIRE_RUNTIME_CPUS"),
		address_timeout_secs: env_u64("FIRE_RUNTIME_ADDRESS_TIMEOUT_SECS")?,
		cleanup_interval_secs: env_u64("FIRE_RUNTIME_CLEANUP_INTERVAL_SECS")?,
		keep: env_list("FIRE_RUNTIME_KEEP"),
	})
}

fn load_github_from_env() -> Result<GitHubConfigLayer, ConfigError> {
	Ok(GitHubConfigLayer {
		api_url: env_var("FIRE_GITHUB_API_URL"),
		token: load_secret_env("FIRE_GITHUB_TOKEN").map_err(|e| ConfigError::Secret(e.to_string()))?,
		status_context: env_var("FIRE_GITHUB_STATUS_CONTEXT"),
		target_url: env_var("FIRE_GITHUB_TARGET_URL"),
		timeout_secs: env_u64("FIRE_GITHUB_TIMEOUT_SECS")?,
	})
}

fn load_proxy_from_env() -> ProxyConfigLayer {
	ProxyConfigLayer {
		routes_path: env_var("FIRE_PROXY_ROUTES_PATH").map(PathBuf::from),
		domain: env_var("FIRE_PROXY_DOMAIN"),
		primary: env_var("FIRE_PROXY_PRIMARY"),
		template_path: env_var("FIRE_PROXY_TEMPLATE_PATH").map(PathBuf::from),
		nginx_path: env_var("FIRE_PROXY_NGINX_PATH"),
	}
}

fn load_certs_from_env() -> CertsConfigLayer {
	CertsConfigLayer {
		certbot_path: env_var("FIRE_CERTS_CERTBOT_PATH"),
		email: env_var("FIRE_CERTS_EMAIL"),
		webroot: env_var("FIRE_CERTS_WEBROOT").map(PathBuf::from),
		staging_server: env_var("FIRE_CERTS_STAGING_SERVER"),
	}
}

fn load_builds_from_env() -> Result<BuildsConfigLayer, ConfigError> {
	Ok(BuildsConfigLayer {
		command: env_var("FIRE_BUILDS_COMMAND"),
		args: env_args("FIRE_BUILDS_ARGS"),
		seed_command: env_var("FIRE_BUILDS_SEED_COMMAND"),
		seed_args: env_args("FIRE_BUILDS_SEED_ARGS"),
		timeout_secs: env_u64("FIRE_BUILDS_TIMEOUT_SECS")?,
		max_concurrent: env_usize("FIRE_BUILDS_MAX_CONCURRENT")?,
		restart_base_url: env_var("FIRE_BUILDS_RESTART_BASE_URL"),
	})
}

fn load_notify_from_env() -> Result<NotifyConfigLayer, ConfigError> {
	Ok(NotifyConfigLayer {
		secret: load_secret_env("FIRE_NOTIFY_SECRET").map_err(|e| ConfigError::Secret(e.to_string()))?,
		timeout_secs: env_u64("FIRE_NOTIFY_TIMEOUT_SECS")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = env_var("FIRE_LOG_FORMAT")
		.map(|v| {
			v.parse::<LogFormat>().map_err(|message| ConfigError::InvalidValue {
				key: "FIRE_LOG_FORMAT".to_string(),
				message,
			})
		})
		.transpose()?;

	Ok(LoggingConfigLayer {
		level: env_var("FIRE_LOG_LEVEL"),
		format,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.repos.is_none());
		assert!(layer.runtime.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/fire.toml").load().unwrap();
		assert!(layer.proxy.is_none());
	}

	#[test]
	fn test_toml_source_parses_sections() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
[[repos]]
short_name = "sd"
remote = "superdesk/superdesk"

[runtime]
keep = ["sd-demo"]
snapshot_clones = false

[proxy]
domain = "preview.example.org"

[logging]
format = "json"
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(layer.repos.as_ref().unwrap()[0].short_name, "sd");
		let runtime = layer.runtime.unwrap();
		assert_eq!(runtime.keep, Some(vec!["sd-demo".to_string()]));
		assert_eq!(runtime.snapshot_clones, Some(false));
		assert_eq!(layer.proxy.unwrap().domain.as_deref(), Some("preview.example.org"));
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "[runtime\nkeep = 1").unwrap();
		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_toml_unknown_log_format_is_rejected() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "[logging]\nformat = \"xml\"\n").unwrap();
		assert!(TomlSource::new(file.path()).load().is_err());
	}
}
