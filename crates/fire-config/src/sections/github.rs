// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub (remote ref source and commit status) section.

use fire_common_config::SecretString;
use serde::{Deserialize, Serialize};

/// GitHub configuration layer (for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubConfigLayer {
	pub api_url: Option<String>,
	pub token: Option<SecretString>,
	pub status_context: Option<String>,
	/// Link attached to commit statuses, `{name}` is replaced by the environment.
	pub target_url: Option<String>,
	pub timeout_secs: Option<u64>,
}

impl GitHubConfigLayer {
	pub fn merge(&mut self, other: GitHubConfigLayer) {
		if other.api_url.is_some() {
			self.api_url = other.api_url;
		}
		if other.token.is_some() {
			self.token = other.token;
		}
		if other.status_context.is_some() {
			self.status_context = other.status_context;
		}
		if other.target_url.is_some() {
			self.target_url = other.target_url;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	pub fn finalize(self) -> GitHubConfig {
		let defaults = GitHubConfig::default();
		GitHubConfig {
			api_url: self
				.api_url
				.map(|u| u.trim_end_matches('/').to_string())
				.unwrap_or(defaults.api_url),
			token: self.token,
			status_context: self.status_context.unwrap_or(defaults.status_context),
			target_url: self.target_url,
			timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
		}
	}
}

/// GitHub configuration (resolved).
#[derive(Debug, Clone)]
pub struct GitHubConfig {
	pub api_url: String,
	pub token: Option<SecretString>,
	pub status_context: String,
	pub target_url: Option<String>,
	pub timeout_secs: u64,
}

impl Default for GitHubConfig {
	fn default() -> Self {
		Self {
			api_url: "https://api.github.com".to_string(),
			token: None,
			status_context: "fire".to_string(),
			target_url: None,
			timeout_secs: 30,
		}
	}
}
