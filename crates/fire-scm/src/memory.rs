// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory ref source and status sink for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fire_naming::{Fingerprint, Ref, RefKind, TrackedRepository};

use crate::error::{ScmError, ScmResult};
use crate::source::{RefSource, StatusReport, StatusSink};

#[derive(Debug, Default)]
struct RefState {
	refs: HashMap<String, Vec<Ref>>,
	failing: HashSet<String>,
}

/// Ref source with fixed refs per repository short name.
#[derive(Debug, Clone, Default)]
pub struct StaticRefSource {
	state: Arc<Mutex<RefState>>,
}

impl StaticRefSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_refs(&self, short_name: &str, refs: Vec<Ref>) {
		self.lock().refs.insert(short_name.to_string(), refs);
	}

	/// Every query for `short_name` fails until cleared.
	pub fn set_failing(&self, short_name: &str, failing: bool) {
		let mut state = self.lock();
		if failing {
			state.failing.insert(short_name.to_string());
		} else {
			state.failing.remove(short_name);
		}
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, RefState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn refs_of(&self, repo: &TrackedRepository, kind: RefKind) -> ScmResult<Vec<Ref>> {
		let state = self.lock();
		if state.failing.contains(&repo.short_name) {
			return Err(ScmError::api_error(503, "unavailable"));
		}
		Ok(state
			.refs
			.get(&repo.short_name)
			.map(|refs| refs.iter().filter(|r| r.kind == kind).cloned().collect())
			.unwrap_or_default())
	}
}

#[async_trait]
impl RefSource for StaticRefSource {
	async fn list_branches(&self, repo: &TrackedRepository) -> ScmResult<Vec<Ref>> {
		self.refs_of(repo, RefKind::Branch)
	}

	async fn list_open_requests(&self, repo: &TrackedRepository) -> ScmResult<Vec<Ref>> {
		self.refs_of(repo, RefKind::PullRequest)
	}

	async fn resolve_head(&self, repo: &TrackedRepository, kind: RefKind, id: &str) -> ScmResult<Fingerprint> {
		self.refs_of(repo, kind)?
			.into_iter()
			.find(|r| r.id == id)
			.map(|r| r.fingerprint)
			.ok_or_else(|| ScmError::NotFound(id.to_string()))
	}
}

/// Status sink that records every report.
#[derive(Debug, Clone, Default)]
pub struct RecordingStatusSink {
	reports: Arc<Mutex<Vec<(String, String, StatusReport)>>>,
	fail: Arc<Mutex<bool>>,
}

impl RecordingStatusSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_failing(&self, fail: bool) {
		*self.fail.lock().unwrap_or_else(|e| e.into_inner()) = fail;
	}

	/// `(remote, sha, report)` in arrival order.
	pub fn reports(&self) -> Vec<(String, String, StatusReport)> {
		self.reports.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}
}

#[async_trait]
impl StatusSink for RecordingStatusSink {
	async fn report(&self, repo: &TrackedRepository, fingerprint: &Fingerprint, status: &StatusReport) -> ScmResult<()> {
		if *self.fail.lock().unwrap_or_else(|e| e.into_inner()) {
			return Err(ScmError::api_error(500, "injected failure"));
		}
		self.reports.lock().unwrap_or_else(|e| e.into_inner()).push((
			repo.remote.clone(),
			fingerprint.to_string(),
			status.clone(),
		));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn static_source_filters_by_kind() {
		let source = StaticRefSource::new();
		let fp = Fingerprint::new("abc").unwrap();
		source.set_refs(
			"sd",
			vec![Ref::branch("master", fp.clone()), Ref::pull_request(1, fp.clone())],
		);
		let repo = TrackedRepository::new("sd", "superdesk/superdesk").unwrap();
		assert_eq!(source.list_branches(&repo).await.unwrap().len(), 1);
		assert_eq!(source.list_refs(&repo).await.unwrap().len(), 2);
		assert_eq!(
			source.resolve_head(&repo, RefKind::PullRequest, "1").await.unwrap(),
			fp
		);

		source.set_failing("sd", true);
		assert!(source.list_refs(&repo).await.is_err());
	}
}
