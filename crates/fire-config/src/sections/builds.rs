// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build backend and notification sections.

use fire_common_config::SecretString;
use serde::{Deserialize, Serialize};

/// Build configuration layer (for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildsConfigLayer {
	/// Program run inside the environment for every build target.
	pub command: Option<String>,
	pub args: Option<Vec<String>>,
	/// Program that seeds template environments.
	pub seed_command: Option<String>,
	pub seed_args: Option<Vec<String>>,
	pub timeout_secs: Option<u64>,
	pub max_concurrent: Option<usize>,
	/// Base URL of the web endpoint used by `build --by-url`.
	pub restart_base_url: Option<String>,
}

impl BuildsConfigLayer {
	pub fn merge(&mut self, other: BuildsConfigLayer) {
		if other.command.is_some() {
			self.command = other.command;
		}
		if other.args.is_some() {
			self.args = other.args;
		}
		if other.seed_command.is_some() {
			self.seed_command = other.seed_command;
		}
		if other.seed_args.is_some() {
			self.seed_args = other.seed_args;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
		if other.max_concurrent.is_some() {
			self.max_concurrent = other.max_concurrent;
		}
		if other.restart_base_url.is_some() {
			self.restart_base_url = other.restart_base_url;
		}
	}

	pub fn finalize(self) -> BuildsConfig {
		let defaults = BuildsConfig::default();
		BuildsConfig {
			command: self.command.unwrap_or(defaults.command),
			args: self.args.unwrap_or(defaults.args),
			seed_command: self.seed_command.unwrap_or(defaults.seed_command),
			seed_args: self.seed_args.unwrap_or(defaults.seed_args),
			timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
			max_concurrent: self.max_concurrent.unwrap_or(defaults.max_concurrent),
			restart_base_url: self
				.restart_base_url
				.map(|u| u.trim_end_matches('/').to_string())
				.unwrap_or(defaults.restart_base_url),
		}
	}
}

/// Build configuration (resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildsConfig {
	pub command: String,
	pub args: Vec<String>,
	pub seed_command: String,
	pub seed_args: Vec<String>,
	pub timeout_secs: u64,
	pub max_concurrent: usize,
	pub restart_base_url: String,
}

impl Default for BuildsConfig {
	fn default() -> Self {
		Self {
			command: "/usr/local/bin/fire-build".to_string(),
			args: Vec::new(),
			seed_command: "/usr/local/bin/fire-seed".to_string(),
			seed_args: Vec::new(),
			timeout_secs: 3600,
			max_concurrent: 2,
			restart_base_url: "https://fire.test.superdesk.org".to_string(),
		}
	}
}

/// Callback notification layer (for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfigLayer {
	pub secret: Option<SecretString>,
	pub timeout_secs: Option<u64>,
}

impl NotifyConfigLayer {
	pub fn merge(&mut self, other: NotifyConfigLayer) {
		if other.secret.is_some() {
			self.secret = other.secret;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	pub fn finalize(self) -> NotifyConfig {
		NotifyConfig {
			secret: self.secret,
			timeout_secs: self.timeout_secs.unwrap_or(NotifyConfig::default().timeout_secs),
		}
	}
}

/// Callback notification configuration (resolved).
#[derive(Debug, Clone)]
pub struct NotifyConfig {
	/// HMAC key for the `X-Hub-Signature-256` header on callbacks.
	pub secret: Option<SecretString>,
	pub timeout_secs: u64,
}

impl Default for NotifyConfig {
	fn default() -> Self {
		Self {
			secret: None,
			timeout_secs: 10,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builds_defaults() {
		let config = BuildsConfigLayer::default().finalize();
		assert_eq!(config, BuildsConfig::default());
		assert_eq!(config.timeout_secs, 3600);
	}

	#[test]
	fn restart_url_is_normalized() {
		let config = BuildsConfigLayer {
			restart_base_url: Some("https://fire.example.org/".to_string()),
			..Default::default()
		}
		.finalize();
		assert_eq!(config.restart_base_url, "https://fire.example.org");
	}

	#[test]
	fn notify_merge() {
		let mut base = NotifyConfigLayer {
			timeout_secs: Some(5),
			..Default::default()
		};
		base.merge(NotifyConfigLayer {
			secret: Some(SecretString::new("s".to_string())),
			..Default::default()
		});
		let config = base.finalize();
		assert_eq!(config.timeout_secs, 5);
		assert_eq!(config.secret.unwrap().expose(), "s");
	}
}
