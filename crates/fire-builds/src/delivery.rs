// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stored GitHub webhook deliveries, replayed by `fire gh-build`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fire_naming::{Fingerprint, RefKind, TrackedRepository};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::target::{BuildOverrides, BuildRequest, BuildTarget};

/// File name of a stored delivery inside its directory.
pub const REQUEST_FILE: &str = "request.json";

const EVENT_HEADER: &str = "x-github-event";

#[derive(Error, Debug)]
pub enum DeliveryError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("delivery has no X-GitHub-Event header")]
	MissingEvent,
}

/// A webhook delivery as captured on disk: headers plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDelivery {
	pub headers: BTreeMap<String, String>,
	pub body: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeliveryFile {
	/// `{"headers": {...}, "json": {...}}`
	Object { headers: BTreeMap<String, Value>, json: Value },
	/// `[headers, body]`
	Pair(BTreeMap<String, Value>, Value),
}

impl StoredDelivery {
	/// Reads `<dir>/request.json`. Both the object and the pair layout are
	/// accepted.
	pub fn load(dir: &Path) -> Result<Self, DeliveryError> {
		let path = dir.join(REQUEST_FILE);
		let raw = std::fs::read_to_string(&path).map_err(|source| DeliveryError::Read {
			path: path.clone(),
			source,
		})?;
		Self::parse(&raw).map_err(|source| DeliveryError::Parse { path, source })
	}

	pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
		let (headers, body) = match serde_json::from_str::<DeliveryFile>(raw)? {
			DeliveryFile::Object { headers, json } => (headers, json),
			DeliveryFile::Pair(headers, body) => (headers, body),
		};
		let headers = headers
			.into_iter()
			.map(|(name, value)| {
				let value = match value {
					Value::String(s) => s,
					other => other.to_string(),
				};
				(name, value)
			})
			.collect();
		Ok(Self { headers, body })
	}

	/// Header lookup, ignoring case.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	pub fn event(&self) -> Result<&str, DeliveryError> {
		self.header(EVENT_HEADER).ok_or(DeliveryError::MissingEvent)
	}

	/// Body re-encoded the way it is forwarded: pretty, keys sorted.
	pub fn forward_body(&self) -> Result<Vec<u8>, serde_json::Error> {
		serde_json::to_vec_pretty(&self.body)
	}

	/// Headers to forward, without those that describe the original body.
	pub fn forward_headers(&self) -> Vec<(String, String)> {
		self.headers
			.iter()
			.filter(|(name, _)| {
				let name = name.to_ascii_lowercase();
				!matches!(
					name.as_str(),
					"content-length" | "host" | "x-hub-signature" | "x-hub-signature-256"
				)
			})
			.map(|(name, value)| (name.clone(), value.clone()))
			.collect()
	}

	/// The build this delivery asks for, if any.
	///
	/// Pushes build the pushed branch and pull request events build the
	/// request's head, both with a clean environment. Deleted branches,
	/// closed pull requests, other events and untracked repositories yield
	/// `None`.
	pub fn build_request(&self, repos: &[TrackedRepository]) -> Result<Option<BuildRequest>, DeliveryError> {
		let event = self.event()?;
		let body = &self.body;

		let Some(full_name) = body.pointer("/repository/full_name").and_then(Value::as_str) else {
			return Ok(None);
		};
		let Some(repo) = repos.iter().find(|r| r.remote.eq_ignore_ascii_case(full_name)) else {
			return Ok(None);
		};

		let (kind, ref_id, sha) = match event {
			"push" => {
				if body.get("deleted").and_then(Value::as_bool).unwrap_or(false) {
					return Ok(None);
				}
				let Some(branch) = body
					.get("ref")
					.and_then(Value::as_str)
					.and_then(|r| r.strip_prefix("refs/heads/"))
				else {
					return Ok(None);
				};
				(RefKind::Branch, branch.to_string(), body.get("after").and_then(Value::as_str))
			}
			"pull_request" => {
				let action = body.get("action").and_then(Value::as_str).unwrap_or_default();
				if !matches!(action, "opened" | "reopened" | "synchronize") {
					return Ok(None);
				}
				let Some(number) = body.pointer("/pull_request/number").and_then(Value::as_u64) else {
					return Ok(None);
				};
				(
					RefKind::PullRequest,
					number.to_string(),
					body.pointer("/pull_request/head/sha").and_then(Value::as_str),
				)
			}
			_ => return Ok(None),
		};

		let mut request = BuildRequest::new(repo.clone(), kind, ref_id, BuildTarget::Full).with_overrides(BuildOverrides {
			clean: true,
			statuses: true,
			..Default::default()
		});
		if let Some(fingerprint) = sha.and_then(|s| Fingerprint::new(s).ok()) {
			request = request.with_fingerprint(fingerprint);
		}
		Ok(Some(request))
	}
}
