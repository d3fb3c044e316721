// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Container runtime (LXC) section.

use serde::{Deserialize, Serialize};

/// Runtime configuration layer (for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfigLayer {
	pub lxc_path: Option<String>,
	pub base_template: Option<String>,
	pub data_template: Option<String>,
	pub data_enabled: Option<bool>,
	pub backing_store: Option<String>,
	pub create_template: Option<String>,
	pub create_args: Option<Vec<String>>,
	pub snapshot_clones: Option<bool>,
	pub cpus: Option<String>,
	pub address_timeout_secs: Option<u64>,
	pub cleanup_interval_secs: Option<u64>,
	/// Environments the reconciler must never destroy.
	pub keep: Option<Vec<String>>,
}

impl RuntimeConfigLayer {
	/// Merges another layer on top of this one.
	/// Values from `other` take precedence when present.
	pub fn merge(&mut self, other: RuntimeConfigLayer) {
		if other.lxc_path.is_some() {
			self.lxc_path = other.lxc_path;
		}
		if other.base_template.is_some() {
			self.base_template = other.base_template;
		}
		if other.data_template.is_some() {
			self.data_template = other.data_template;
		}
		if other.data_enabled.is_some() {
			self.data_enabled = other.data_enabled;
		}
		if other.backing_store.is_some() {
			self.backing_store = other.backing_store;
		}
		if other.create_template.is_some() {
			self.create_template = other.create_template;
		}
		if other.create_args.is_some() {
			self.create_args = other.create_args;
		}
		if other.snapshot_clones.is_some() {
			self.snapshot_clones = other.snapshot_clones;
		}
		if other.cpus.is_some() {
			self.cpus = other.cpus;
		}
		if other.address_timeout_secs.is_some() {
			self.address_timeout_secs = other.address_timeout_secs;
		}
		if other.cleanup_interval_secs.is_some() {
			self.cleanup_interval_secs = other.cleanup_interval_secs;
		}
		if other.keep.is_some() {
			self.keep = other.keep;
		}
	}

	/// Resolves this layer into a runtime configuration.
	pub fn finalize(self) -> RuntimeConfig {
		let defaults = RuntimeConfig::default();
		RuntimeConfig {
			lxc_path: self.lxc_path,
			base_template: self.base_template.unwrap_or(defaults.base_template),
			data_template: self.data_template.unwrap_or(defaults.data_template),
			data_enabled: self.data_enabled.unwrap_or(defaults.data_enabled),
			backing_store: self.backing_store.or(defaults.backing_store),
			create_template: self.create_template.unwrap_or(defaults.create_template),
			create_args: self.create_args.unwrap_or(defaults.create_args),
			snapshot_clones: self.snapshot_clones.unwrap_or(defaults.snapshot_clones),
			cpus: self.cpus,
			address_timeout_secs: self
				.address_timeout_secs
				.unwrap_or(defaults.address_timeout_secs),
			cleanup_interval_secs: self
				.cleanup_interval_secs
				.unwrap_or(defaults.cleanup_interval_secs),
			keep: self.keep.unwrap_or_default(),
		}
	}
}

/// Runtime configuration (resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
	/// Passed as `-P` to every lxc tool when set.
	pub lxc_path: Option<String>,
	pub base_template: String,
	pub data_template: String,
	/// Build the data template on top of the base and clone from it.
	pub data_enabled: bool,
	pub backing_store: Option<String>,
	pub create_template: String,
	pub create_args: Vec<String>,
	pub snapshot_clones: bool,
	pub cpus: Option<String>,
	pub address_timeout_secs: u64,
	pub cleanup_interval_secs: u64,
	pub keep: Vec<String>,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			lxc_path: None,
			base_template: "fire--base".to_string(),
			data_template: "fire--data".to_string(),
			data_enabled: true,
			backing_store: Some("zfs".to_string()),
			create_template: "download".to_string(),
			create_args: vec![
				"-d".to_string(),
				"ubuntu".to_string(),
				"-r".to_string(),
				"jammy".to_string(),
				"-a".to_string(),
				"amd64".to_string(),
			],
			snapshot_clones: true,
			cpus: None,
			address_timeout_secs: 60,
			cleanup_interval_secs: 1800,
			keep: Vec::new(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_preserves_base_when_overlay_is_none() {
		let mut base = RuntimeConfigLayer {
			base_template: Some("custom--base".to_string()),
			snapshot_clones: Some(false),
			..Default::default()
		};
		base.merge(RuntimeConfigLayer::default());
		assert_eq!(base.base_template.as_deref(), Some("custom--base"));
		assert_eq!(base.snapshot_clones, Some(false));
	}

	#[test]
	fn merge_overrides_individual_fields() {
		let mut base = RuntimeConfigLayer {
			cpus: Some("0-3".to_string()),
			keep: Some(vec!["sd-demo".to_string()]),
			..Default::default()
		};
		base.merge(RuntimeConfigLayer {
			keep: Some(vec![]),
			..Default::default()
		});
		assert_eq!(base.cpus.as_deref(), Some("0-3"));
		assert_eq!(base.keep, Some(vec![]));
	}

	#[test]
	fn finalize_uses_defaults() {
		let config = RuntimeConfigLayer::default().finalize();
		assert_eq!(config, RuntimeConfig::default());
		assert_eq!(config.base_template, "fire--base");
		assert_eq!(config.backing_store.as_deref(), Some("zfs"));
		assert_eq!(config.cleanup_interval_secs, 1800);
	}
}
