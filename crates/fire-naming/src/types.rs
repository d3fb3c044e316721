// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NamingError;

/// A repository whose branches and pull requests get preview environments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedRepository {
	/// Environment name prefix, e.g. `sd` or `superdesk`.
	pub short_name: String,
	/// `owner/name` on the source host.
	pub remote: String,
}

impl TrackedRepository {
	pub fn new(short_name: impl Into<String>, remote: impl Into<String>) -> Result<Self, NamingError> {
		let short_name = short_name.into();
		let remote = remote.into();

		if short_name.is_empty()
			|| !short_name
				.chars()
				.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
		{
			return Err(NamingError::InvalidShortName(short_name));
		}

		match remote.split_once('/') {
			Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {}
			_ => return Err(NamingError::InvalidRemote(remote)),
		}

		Ok(Self { short_name, remote })
	}

	/// Name prefix for environments of the given ref kind.
	pub fn prefix_for(&self, kind: RefKind) -> String {
		match kind {
			RefKind::Branch => self.short_name.clone(),
			RefKind::PullRequest => format!("{}pr", self.short_name),
		}
	}

	/// Both prefixes this repository owns.
	pub fn prefixes(&self) -> [String; 2] {
		[
			self.prefix_for(RefKind::Branch),
			self.prefix_for(RefKind::PullRequest),
		]
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
	Branch,
	PullRequest,
}

/// Head commit hash of a ref, normalized to lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
	pub fn new(raw: impl AsRef<str>) -> Result<Self, NamingError> {
		let raw = raw.as_ref().trim();
		if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
			return Err(NamingError::InvalidFingerprint(raw.to_string()));
		}
		Ok(Self(raw.to_ascii_lowercase()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// The first `len` characters (or the whole hash if it is shorter).
	pub fn prefix(&self, len: usize) -> &str {
		&self.0[..self.0.len().min(len)]
	}
}

impl TryFrom<String> for Fingerprint {
	type Error = NamingError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<Fingerprint> for String {
	fn from(value: Fingerprint) -> Self {
		value.0
	}
}

impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// An open branch or pull request, as last reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ref {
	pub kind: RefKind,
	/// Branch name or pull request number.
	pub id: String,
	pub fingerprint: Fingerprint,
}

impl Ref {
	pub fn branch(name: impl Into<String>, fingerprint: Fingerprint) -> Self {
		Self {
			kind: RefKind::Branch,
			id: name.into(),
			fingerprint,
		}
	}

	pub fn pull_request(number: u64, fingerprint: Fingerprint) -> Self {
		Self {
			kind: RefKind::PullRequest,
			id: number.to_string(),
			fingerprint,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn short_name_must_be_lower_alnum() {
		assert!(TrackedRepository::new("sd", "superdesk/superdesk").is_ok());
		assert!(TrackedRepository::new("SD", "superdesk/superdesk").is_err());
		assert!(TrackedRepository::new("s-d", "superdesk/superdesk").is_err());
		assert!(TrackedRepository::new("", "superdesk/superdesk").is_err());
	}

	#[test]
	fn remote_must_be_owner_slash_name() {
		assert!(TrackedRepository::new("sd", "superdesk").is_err());
		assert!(TrackedRepository::new("sd", "a/b/c").is_err());
		assert!(TrackedRepository::new("sd", "/b").is_err());
	}

	#[test]
	fn pull_requests_get_pr_prefix() {
		let repo = TrackedRepository::new("sd", "superdesk/superdesk").unwrap();
		assert_eq!(repo.prefix_for(RefKind::Branch), "sd");
		assert_eq!(repo.prefix_for(RefKind::PullRequest), "sdpr");
	}

	#[test]
	fn fingerprint_normalizes_case() {
		let fp = Fingerprint::new("ABCDEF1234567890").unwrap();
		assert_eq!(fp.as_str(), "abcdef1234567890");
		assert_eq!(fp.prefix(10), "abcdef1234");
	}

	#[test]
	fn short_fingerprint_prefix_is_whole_hash() {
		let fp = Fingerprint::new("abc1234").unwrap();
		assert_eq!(fp.prefix(10), "abc1234");
	}

	#[test]
	fn fingerprint_rejects_non_hex() {
		assert!(Fingerprint::new("not-a-sha").is_err());
		assert!(Fingerprint::new("").is_err());
	}

	#[test]
	fn fingerprint_deserialization_validates() {
		assert!(serde_json::from_str::<Fingerprint>("\"abc123\"").is_ok());
		assert!(serde_json::from_str::<Fingerprint>("\"xyz\"").is_err());
	}
}
