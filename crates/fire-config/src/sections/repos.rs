// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracked repositories section.

use std::collections::HashSet;

use fire_naming::TrackedRepository;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One `[[repos]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfigLayer {
	pub short_name: String,
	pub remote: String,
}

/// Parses `FIRE_REPOS` (`sd=superdesk/superdesk,sds=superdesk/superdesk-server`).
pub fn parse_repos_env(value: &str) -> Result<Vec<RepoConfigLayer>, ConfigError> {
	value
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(|entry| {
			let (short_name, remote) =
				entry
					.split_once('=')
					.ok_or_else(|| ConfigError::InvalidValue {
						key: "FIRE_REPOS".to_string(),
						message: format!("expected short=owner/name, got '{entry}'"),
					})?;
			Ok(RepoConfigLayer {
				short_name: short_name.trim().to_string(),
				remote: remote.trim().to_string(),
			})
		})
		.collect()
}

/// Validates repository entries and converts them to domain values.
///
/// Short names must be unique and no short name may equal another's
/// pull-request prefix (`sd` + `pr`), otherwise two repositories would
/// claim the same environments.
pub(crate) fn resolve_repos(
	layers: Vec<RepoConfigLayer>,
) -> Result<Vec<TrackedRepository>, ConfigError> {
	let repos = layers
		.into_iter()
		.map(|l| {
			TrackedRepository::new(l.short_name, l.remote)
				.map_err(|e| ConfigError::validation(e.to_string()))
		})
		.collect::<Result<Vec<_>, _>>()?;

	let mut prefixes = HashSet::new();
	for repo in &repos {
		for prefix in repo.prefixes() {
			if !prefixes.insert(prefix.clone()) {
				return Err(ConfigError::validation(format!(
					"environment prefix '{prefix}' is claimed by more than one repository"
				)));
			}
		}
	}

	Ok(repos)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn layer(short: &str, remote: &str) -> RepoConfigLayer {
		RepoConfigLayer {
			short_name: short.to_string(),
			remote: remote.to_string(),
		}
	}

	#[test]
	fn parses_env_list() {
		let repos = parse_repos_env("sd=superdesk/superdesk, sds=superdesk/superdesk-server,").unwrap();
		assert_eq!(repos.len(), 2);
		assert_eq!(repos[1], layer("sds", "superdesk/superdesk-server"));
	}

	#[test]
	fn env_entry_without_equals_fails() {
		assert!(parse_repos_env("superdesk/superdesk").is_err());
	}

	#[test]
	fn duplicate_short_names_rejected() {
		let result = resolve_repos(vec![layer("sd", "a/b"), layer("sd", "c/d")]);
		assert!(result.is_err());
	}

	#[test]
	fn pr_prefix_clash_rejected() {
		let result = resolve_repos(vec![layer("sd", "a/b"), layer("sdpr", "c/d")]);
		let err = result.unwrap_err().to_string();
		assert!(err.contains("sdpr"));
	}

	#[test]
	fn invalid_short_name_rejected() {
		assert!(resolve_repos(vec![layer("Sd", "a/b")]).is_err());
	}
}
