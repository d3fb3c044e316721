// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The mergeable top-level configuration layer.

use serde::{Deserialize, Serialize};

use crate::sections::{
	BuildsConfigLayer, CertsConfigLayer, GitHubConfigLayer, LoggingConfigLayer,
	NotifyConfigLayer, ProxyConfigLayer, RepoConfigLayer, RuntimeConfigLayer,
};

/// One configuration source's view of every section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FireConfigLayer {
	pub repos: Option<Vec<RepoConfigLayer>>,
	pub runtime: Option<RuntimeConfigLayer>,
	pub github: Option<GitHubConfigLayer>,
	pub proxy: Option<ProxyConfigLayer>,
	pub certs: Option<CertsConfigLayer>,
	pub builds: Option<BuildsConfigLayer>,
	pub notify: Option<NotifyConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

macro_rules! merge_section {
	($self:ident, $other:ident, $field:ident) => {
		match (&mut $self.$field, $other.$field) {
			(Some(base), Some(overlay)) => base.merge(overlay),
			(None, Some(overlay)) => $self.$field = Some(overlay),
			(_, None) => {}
		}
	};
}

impl FireConfigLayer {
	/// Merges `other` on top of `self`, section by section.
	///
	/// The repository list is replaced as a whole: a source that names
	/// repositories defines the complete tracked set.
	pub fn merge(&mut self, other: FireConfigLayer) {
		if other.repos.is_some() {
			self.repos = other.repos;
		}
		merge_section!(self, other, runtime);
		merge_section!(self, other, github);
		merge_section!(self, other, proxy);
		merge_section!(self, other, certs);
		merge_section!(self, other, builds);
		merge_section!(self, other, notify);
		merge_section!(self, other, logging);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sections_merge_field_by_field() {
		let mut base = FireConfigLayer {
			runtime: Some(RuntimeConfigLayer {
				cpus: Some("0-1".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(FireConfigLayer {
			runtime: Some(RuntimeConfigLayer {
				snapshot_clones: Some(false),
				..Default::default()
			}),
			..Default::default()
		});
		let runtime = base.runtime.unwrap();
		assert_eq!(runtime.cpus.as_deref(), Some("0-1"));
		assert_eq!(runtime.snapshot_clones, Some(false));
	}

	#[test]
	fn repos_are_replaced_whole() {
		let mut base = FireConfigLayer {
			repos: Some(vec![RepoConfigLayer {
				short_name: "sd".to_string(),
				remote: "superdesk/superdesk".to_string(),
			}]),
			..Default::default()
		};
		base.merge(FireConfigLayer {
			repos: Some(vec![RepoConfigLayer {
				short_name: "sds".to_string(),
				remote: "superdesk/superdesk-server".to_string(),
			}]),
			..Default::default()
		});
		let repos = base.repos.unwrap();
		assert_eq!(repos.len(), 1);
		assert_eq!(repos[0].short_name, "sds");
	}

	#[test]
	fn missing_overlay_sections_keep_base() {
		let mut base = FireConfigLayer {
			logging: Some(LoggingConfigLayer {
				level: Some("debug".to_string()),
				format: None,
			}),
			..Default::default()
		};
		base.merge(FireConfigLayer::default());
		assert_eq!(base.logging.unwrap().level.as_deref(), Some("debug"));
	}
}
