// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Recording build collaborators for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{BuildBackend, RunOptions};
use crate::error::{BuildError, BuildResult, NotifyError};
use crate::notify::{BuildNotification, CallbackNotifier};
use crate::target::{BuildTarget, ExitStatus};

/// One backend invocation: `(environment, target, options)`.
pub type BackendCall = (String, BuildTarget, RunOptions);

#[derive(Debug, Default)]
struct BackendState {
	calls: Vec<BackendCall>,
	exits: HashMap<BuildTarget, i32>,
	delay: Option<Duration>,
	missing: bool,
}

/// Backend fake with scripted exit codes per target.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
	state: Arc<Mutex<BackendState>>,
	in_flight: Arc<AtomicUsize>,
	max_in_flight: Arc<AtomicUsize>,
}

impl RecordingBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_exit(&self, target: BuildTarget, code: i32) {
		self.lock().exits.insert(target, code);
	}

	/// Every run fails as if the build command were not installed.
	pub fn set_missing(&self, missing: bool) {
		self.lock().missing = missing;
	}

	/// Every run sleeps this long before returning.
	pub fn set_delay(&self, delay: Duration) {
		self.lock().delay = Some(delay);
	}

	pub fn calls(&self) -> Vec<BackendCall> {
		self.lock().calls.clone()
	}

	/// Highest number of runs observed at once.
	pub fn max_in_flight(&self) -> usize {
		self.max_in_flight.load(Ordering::SeqCst)
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}
}

#[async_trait]
impl BuildBackend for RecordingBackend {
	async fn run_target(&self, environment: &str, target: BuildTarget, options: &RunOptions) -> BuildResult<ExitStatus> {
		let (delay, code) = {
			let mut state = self.lock();
			state
				.calls
				.push((environment.to_string(), target, options.clone()));
			if state.missing {
				return Err(BuildError::NotInstalled {
					program: "fire-build".to_string(),
				});
			}
			(state.delay, state.exits.get(&target).copied().unwrap_or(0))
		};

		let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.max_in_flight.fetch_max(now, Ordering::SeqCst);
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		self.in_flight.fetch_sub(1, Ordering::SeqCst);

		Ok(ExitStatus(code))
	}
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
	sent: Arc<Mutex<Vec<(String, BuildNotification)>>>,
	fail: Arc<AtomicBool>,
}

impl RecordingNotifier {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_failing(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	pub fn sent(&self) -> Vec<(String, BuildNotification)> {
		self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}
}

#[async_trait]
impl CallbackNotifier for RecordingNotifier {
	async fn notify(&self, url: &str, payload: &BuildNotification) -> Result<(), NotifyError> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(NotifyError::Status {
				url: url.to_string(),
				status: 500,
			});
		}
		self.sent
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push((url.to_string(), payload.clone()));
		Ok(())
	}
}
