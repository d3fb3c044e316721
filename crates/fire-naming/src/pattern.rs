// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::name::EnvironmentName;
use crate::types::{Ref, TrackedRepository};

/// An anchored name pattern: matches one exact environment name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pattern(String);

impl Pattern {
	pub fn exact(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	/// Whole-name comparison. `sd-foo` never matches `sd-foobar`.
	pub fn matches(&self, candidate: &str) -> bool {
		self.0 == candidate
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<EnvironmentName> for Pattern {
	fn from(name: EnvironmentName) -> Self {
		Self(name.into_string())
	}
}

impl fmt::Display for Pattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "^{}$", self.0)
	}
}

/// Patterns that keep environments of `refs` alive.
///
/// Each ref contributes its preview name and the build name of its current
/// head. Build environments of older heads match neither and are stale.
pub fn desired_patterns(repo: &TrackedRepository, refs: &[Ref]) -> BTreeSet<Pattern> {
	refs.iter()
		.flat_map(|r| {
			[
				Pattern::from(EnvironmentName::for_ref(repo, r, false)),
				Pattern::from(EnvironmentName::for_ref(repo, r, true)),
			]
		})
		.collect()
}

/// True iff `name` matches none of `patterns`.
pub fn is_stale<'a, I>(name: &str, patterns: I) -> bool
where
	I: IntoIterator<Item = &'a Pattern>,
{
	!patterns.into_iter().any(|p| p.matches(name))
}

/// Distinct refs of one repository that derive the same preview name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCollision {
	pub name: EnvironmentName,
	pub ref_ids: Vec<String>,
}

impl fmt::Display for NameCollision {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} <- {}", self.name, self.ref_ids.join(", "))
	}
}

/// Finds refs whose identifiers sanitize to the same preview name.
///
/// Such refs would share (and overwrite) one environment. They never cause a
/// live environment to be destroyed, since each of them keeps the shared name
/// desired, so callers report them rather than fail.
pub fn detect_collisions(repo: &TrackedRepository, refs: &[Ref]) -> Vec<NameCollision> {
	let mut by_name: BTreeMap<EnvironmentName, BTreeSet<&str>> = BTreeMap::new();
	for r in refs {
		by_name
			.entry(EnvironmentName::for_ref(repo, r, false))
			.or_default()
			.insert(r.id.as_str());
	}

	by_name
		.into_iter()
		.filter(|(_, ids)| ids.len() > 1)
		.map(|(name, ids)| NameCollision {
			name,
			ref_ids: ids.into_iter().map(String::from).collect(),
		})
		.collect()
}
