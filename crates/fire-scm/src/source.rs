// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use async_trait::async_trait;
use fire_naming::{Fingerprint, Ref, RefKind, TrackedRepository};
use serde::{Deserialize, Serialize};

use crate::error::ScmResult;

/// The authority on which refs exist and where they point.
#[async_trait]
pub trait RefSource: Send + Sync {
	async fn list_branches(&self, repo: &TrackedRepository) -> ScmResult<Vec<Ref>>;

	async fn list_open_requests(&self, repo: &TrackedRepository) -> ScmResult<Vec<Ref>>;

	/// Current head of one branch or pull request.
	async fn resolve_head(&self, repo: &TrackedRepository, kind: RefKind, id: &str) -> ScmResult<Fingerprint>;

	/// Branches followed by open pull requests.
	async fn list_refs(&self, repo: &TrackedRepository) -> ScmResult<Vec<Ref>> {
		let mut refs = self.list_branches(repo).await?;
		refs.extend(self.list_open_requests(repo).await?);
		Ok(refs)
	}
}

/// Commit status states understood by the source host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
	Pending,
	Success,
	Failure,
	Error,
}

impl fmt::Display for CommitState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Pending => "pending",
			Self::Success => "success",
			Self::Failure => "failure",
			Self::Error => "error",
		};
		f.write_str(s)
	}
}

/// One commit status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
	pub state: CommitState,
	pub context: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub target_url: Option<String>,
}

/// Receives build progress for a commit.
#[async_trait]
pub trait StatusSink: Send + Sync {
	async fn report(&self, repo: &TrackedRepository, fingerprint: &Fingerprint, status: &StatusReport) -> ScmResult<()>;
}
