// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use fire_naming::{EnvironmentName, Fingerprint, Ref, TrackedRepository};
use fire_provisioner::{Expose, ProvisionRequest, Provisioner};
use fire_proxy::{ProxyConfigurator, RouteSelection};
use fire_runtime::ContainerRuntime;
use fire_scm::{CommitState, RefSource, StatusReport, StatusSink};
use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::backend::{BuildBackend, RunOptions};
use crate::notify::{notification, CallbackNotifier};
use crate::target::{BuildOutcome, BuildRequest, BuildTarget, ExitStatus};

#[derive(Debug, Clone)]
pub struct DispatchSettings {
	/// Ceiling on the time spent in the build backend, per request.
	pub timeout: Duration,
	pub max_concurrent: usize,
	/// Commit status context.
	pub status_context: String,
	pub target_url: Option<String>,
	/// Certificate request for exposed preview environments.
	pub expose: Expose,
}

impl Default for DispatchSettings {
	fn default() -> Self {
		Self {
			timeout: Duration::from_secs(3600),
			max_concurrent: 2,
			status_context: "fire".to_string(),
			target_url: None,
			expose: Expose::Staging,
		}
	}
}

/// Resolves, provisions and runs build requests.
pub struct Dispatcher {
	runtime: Arc<dyn ContainerRuntime>,
	provisioner: Arc<Provisioner>,
	backend: Arc<dyn BuildBackend>,
	refs: Arc<dyn RefSource>,
	statuses: Option<Arc<dyn StatusSink>>,
	notifier: Option<Arc<dyn CallbackNotifier>>,
	proxy: Option<(Arc<ProxyConfigurator>, Vec<TrackedRepository>)>,
	settings: DispatchSettings,
}

/// The backend deadline starts with the first backend call, so template
/// builds do not eat into it.
struct Budget {
	timeout: Duration,
	deadline: Option<Instant>,
}

impl Budget {
	fn deadline(&mut self) -> Instant {
		*self.deadline.get_or_insert_with(|| Instant::now() + self.timeout)
	}
}

impl Dispatcher {
	pub fn new(
		runtime: Arc<dyn ContainerRuntime>,
		provisioner: Arc<Provisioner>,
		backend: Arc<dyn BuildBackend>,
		refs: Arc<dyn RefSource>,
		settings: DispatchSettings,
	) -> Self {
		Self {
			runtime,
			provisioner,
			backend,
			refs,
			statuses: None,
			notifier: None,
			proxy: None,
			settings,
		}
	}

	pub fn with_statuses(mut self, sink: Arc<dyn StatusSink>) -> Self {
		self.statuses = Some(sink);
		self
	}

	pub fn with_notifier(mut self, notifier: Arc<dyn CallbackNotifier>) -> Self {
		self.notifier = Some(notifier);
		self
	}

	/// Re-render routes for `repos` after every successful web build.
	pub fn with_proxy(mut self, proxy: Arc<ProxyConfigurator>, repos: Vec<TrackedRepository>) -> Self {
		self.proxy = Some((proxy, repos));
		self
	}

	/// Runs one request to completion. Never panics on collaborator errors;
	/// every outcome is an [`ExitStatus`].
	pub async fn dispatch(&self, request: &BuildRequest) -> ExitStatus {
		self.dispatch_outcome(request).await.status()
	}

	/// Like [`Dispatcher::dispatch`], keeping why the request ended.
	#[instrument(skip(self, request), fields(repo = %request.repo.short_name, ref_id = %request.ref_id, target = %request.target))]
	pub async fn dispatch_outcome(&self, request: &BuildRequest) -> BuildOutcome {
		let fingerprint = match &request.fingerprint {
			Some(fingerprint) => fingerprint.clone(),
			None => match self
				.refs
				.resolve_head(&request.repo, request.kind, &request.ref_id)
				.await
			{
				Ok(fingerprint) => fingerprint,
				Err(e) => {
					warn!(error = %e, "could not resolve ref head");
					return BuildOutcome::Unresolved;
				}
			},
		};
		let r = Ref {
			kind: request.kind,
			id: request.ref_id.clone(),
			fingerprint: fingerprint.clone(),
		};
		let build_env = EnvironmentName::for_ref(&request.repo, &r, true);
		let preview_env = EnvironmentName::for_ref(&request.repo, &r, false);
		info!(build_env = %build_env, preview_env = %preview_env, sha = %fingerprint, "dispatching build");

		self.report(request, &fingerprint, CommitState::Pending, format!("{} started", request.target))
			.await;

		let (outcome, environment) = self
			.run(request, &fingerprint, build_env.as_str(), preview_env.as_str())
			.await;
		let status = outcome.status();
		info!(%outcome, environment = %environment, "build finished");

		self.report(request, &fingerprint, commit_state(outcome), format!("{} {outcome}", request.target))
			.await;

		if let (Some(url), Some(notifier)) = (&request.overrides.callback, &self.notifier) {
			let payload = notification(
				&request.repo.remote,
				&request.ref_id,
				fingerprint.as_str(),
				request.target,
				&environment,
				status,
			);
			if let Err(e) = notifier.notify(url, &payload).await {
				warn!(url = %url, error = %e, "callback failed");
			}
		}

		outcome
	}

	/// Dispatches `requests` with at most `max_concurrent` in flight.
	/// Statuses come back in request order.
	pub async fn dispatch_all(&self, requests: &[BuildRequest]) -> Vec<ExitStatus> {
		futures::stream::iter(requests.iter().map(|request| self.dispatch(request)))
			.buffered(self.settings.max_concurrent.max(1))
			.collect()
			.await
	}

	async fn run(
		&self,
		request: &BuildRequest,
		fingerprint: &Fingerprint,
		build_env: &str,
		preview_env: &str,
	) -> (BuildOutcome, String) {
		let mut budget = Budget {
			timeout: self.settings.timeout,
			deadline: None,
		};
		let clean = request.overrides.clean;
		let options = |install: bool, host: Option<String>| RunOptions {
			install,
			repo: request.repo.remote.clone(),
			ref_id: request.ref_id.clone(),
			fingerprint: fingerprint.as_str().to_string(),
			host,
			env: request.overrides.env.clone(),
		};

		match request.target {
			BuildTarget::InstallOnly => {
				if let Err(outcome) = self.prepare(build_env, clean, false, None).await {
					return (outcome, build_env.to_string());
				}
				let outcome = self
					.step(&mut budget, build_env, BuildTarget::InstallOnly, options(true, None))
					.await;
				(outcome, build_env.to_string())
			}
			BuildTarget::ChecksOnly => {
				if let Err(outcome) = self.prepare(build_env, clean, true, None).await {
					return (outcome, build_env.to_string());
				}
				let outcome = self
					.step(&mut budget, build_env, BuildTarget::ChecksOnly, options(false, None))
					.await;
				(outcome, build_env.to_string())
			}
			BuildTarget::WebOnly => {
				let outcome = self.web(&mut budget, preview_env, clean, &options).await;
				(outcome, preview_env.to_string())
			}
			BuildTarget::Full => {
				if let Err(outcome) = self.prepare(build_env, clean, false, None).await {
					return (outcome, build_env.to_string());
				}
				let outcome = self
					.step(&mut budget, build_env, BuildTarget::ChecksOnly, options(true, None))
					.await;
				if !outcome.is_success() {
					return (outcome, build_env.to_string());
				}
				let outcome = self.web(&mut budget, preview_env, clean, &options).await;
				(outcome, preview_env.to_string())
			}
		}
	}

	async fn web<F>(&self, budget: &mut Budget, preview_env: &str, clean: bool, options: &F) -> BuildOutcome
	where
		F: Fn(bool, Option<String>) -> RunOptions,
	{
		if let Err(outcome) = self
			.prepare(preview_env, clean, false, Some(self.settings.expose))
			.await
		{
			return outcome;
		}
		let host = format!("{preview_env}.{}", self.provisioner.settings().domain);
		let outcome = self
			.step(budget, preview_env, BuildTarget::WebOnly, options(true, Some(host)))
			.await;
		if outcome.is_success() {
			self.refresh_routes(preview_env).await;
		}
		outcome
	}

	/// Gets `name` ready for the backend. `Err` carries the outcome to
	/// finish with.
	async fn prepare(&self, name: &str, clean: bool, reuse: bool, expose: Option<Expose>) -> Result<(), BuildOutcome> {
		if clean {
			match self.runtime.exists(name).await {
				Ok(false) => {}
				Ok(true) => {
					if let Err(e) = self.runtime.destroy(name).await {
						warn!(name, error = %e, "clean destroy failed");
						return Err(BuildOutcome::ProvisionFailed);
					}
					info!(name, "destroyed for clean build");
				}
				Err(e) => {
					warn!(name, error = %e, "clean lookup failed");
					return Err(BuildOutcome::ProvisionFailed);
				}
			}
		}

		let request = ProvisionRequest {
			reuse_existing: reuse && !clean,
			expose,
			..ProvisionRequest::new(name)
		};
		match self.provisioner.provision(&request).await {
			Ok(done) => {
				debug!(name, reused = done.reused, address = ?done.address, "environment prepared");
				Ok(())
			}
			Err(e) => {
				warn!(error = %e, "provisioning failed");
				Err(BuildOutcome::ProvisionFailed)
			}
		}
	}

	async fn step(&self, budget: &mut Budget, environment: &str, target: BuildTarget, options: RunOptions) -> BuildOutcome {
		let deadline = budget.deadline();
		match tokio::time::timeout_at(deadline, self.backend.run_target(environment, target, &options)).await {
			Ok(Ok(status)) => BuildOutcome::Built(status),
			Ok(Err(e)) => {
				warn!(environment, %target, error = %e, "build backend failed");
				BuildOutcome::BackendFailed
			}
			Err(_) => {
				warn!(environment, %target, timeout_secs = budget.timeout.as_secs(), "build timed out");
				BuildOutcome::TimedOut
			}
		}
	}

	/// Re-renders owned routes. `preview_env` was just built, so it is routed
	/// whatever its name looks like.
	async fn refresh_routes(&self, preview_env: &str) {
		let Some((proxy, repos)) = &self.proxy else {
			return;
		};
		let selection = RouteSelection::owned(repos.clone()).with_previews([preview_env]);
		match proxy.sync(self.runtime.as_ref(), &selection).await {
			Ok(outcome) => debug!(routes = outcome.routes.len(), changed = outcome.changed, "routes refreshed"),
			Err(e) => warn!(error = %e, "route refresh failed"),
		}
	}

	async fn report(&self, request: &BuildRequest, fingerprint: &Fingerprint, state: CommitState, description: String) {
		if !request.overrides.statuses {
			return;
		}
		let Some(sink) = &self.statuses else {
			return;
		};
		let report = StatusReport {
			state,
			context: self.settings.status_context.clone(),
			description: Some(description),
			target_url: self.settings.target_url.clone(),
		};
		if let Err(e) = sink.report(&request.repo, fingerprint, &report).await {
			warn!(state = %state, error = %e, "commit status update failed");
		}
	}
}

/// Infrastructure trouble is `error`; a build that ran and failed is
/// `failure`, whatever code it exited with.
fn commit_state(outcome: BuildOutcome) -> CommitState {
	match outcome {
		BuildOutcome::Built(status) if status.is_success() => CommitState::Success,
		BuildOutcome::Built(_) => CommitState::Failure,
		BuildOutcome::BackendFailed
		| BuildOutcome::TimedOut
		| BuildOutcome::ProvisionFailed
		| BuildOutcome::Unresolved => CommitState::Error,
	}
}
