// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fire_naming::{
	desired_patterns, detect_collisions, is_stale, owner_of, EnvironmentName, NameCollision, Pattern, TrackedRepository,
};
use fire_proxy::{ApplyOutcome, ProxyConfigurator, RouteSelection};
use fire_runtime::ContainerRuntime;
use fire_scm::RefSource;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{CycleFailure, ReconcileError, ReconcileResult, SkippedRepository};

/// What a cycle would do, computed before anything is destroyed.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
	pub desired: BTreeSet<Pattern>,
	/// Preview environment names of every live ref.
	pub previews: BTreeSet<String>,
	/// Owned environments matching no desired pattern, sorted.
	pub stale: Vec<String>,
	/// Owned environments spared because their repository could not be queried.
	pub protected: Vec<String>,
	/// Owned environments spared by the keep list.
	pub kept: Vec<String>,
	pub skipped_repositories: Vec<SkippedRepository>,
	pub collisions: Vec<NameCollision>,
}

/// Outcome of one reconcile cycle.
#[derive(Debug, Default)]
pub struct ReconcileReport {
	pub destroyed: Vec<String>,
	pub protected: Vec<String>,
	pub skipped_repositories: Vec<SkippedRepository>,
	pub collisions: Vec<NameCollision>,
	pub errors: Vec<CycleFailure>,
	/// `None` without a proxy or when the route update failed.
	pub routes: Option<ApplyOutcome>,
}

impl ReconcileReport {
	/// Nothing was skipped and nothing failed.
	pub fn is_clean(&self) -> bool {
		self.skipped_repositories.is_empty() && self.errors.is_empty() && self.certificate_error().is_none()
	}

	fn certificate_error(&self) -> Option<&str> {
		self.routes.as_ref()?.certificate_error.as_deref()
	}

	/// One line per problem that makes the cycle unclean.
	pub fn failures(&self) -> Vec<String> {
		let mut lines: Vec<String> = self
			.skipped_repositories
			.iter()
			.map(|skipped| format!("skipped {skipped}"))
			.collect();
		lines.extend(self.errors.iter().map(ToString::to_string));
		if let Some(e) = self.certificate_error() {
			lines.push(format!("certificate issuance failed: {e}"));
		}
		lines
	}

	/// One line for logs and the CLI.
	pub fn summary(&self) -> String {
		let mut summary = format!(
			"destroyed {}, protected {}, skipped {} repositories, {} collisions, {} errors",
			self.destroyed.len(),
			self.protected.len(),
			self.skipped_repositories.len(),
			self.collisions.len(),
			self.errors.len(),
		);
		if let Some(routes) = &self.routes {
			summary.push_str(&format!(", {} routes", routes.routes.len()));
		}
		summary
	}
}

/// Destroys environments whose ref is gone or has moved on, then re-renders
/// the proxy routes.
pub struct Reconciler {
	repos: Vec<TrackedRepository>,
	refs: Arc<dyn RefSource>,
	runtime: Arc<dyn ContainerRuntime>,
	proxy: Option<Arc<ProxyConfigurator>>,
	keep: BTreeSet<String>,
}

impl Reconciler {
	pub fn new(repos: Vec<TrackedRepository>, refs: Arc<dyn RefSource>, runtime: Arc<dyn ContainerRuntime>) -> Self {
		Self {
			repos,
			refs,
			runtime,
			proxy: None,
			keep: BTreeSet::new(),
		}
	}

	pub fn with_proxy(mut self, proxy: Arc<ProxyConfigurator>) -> Self {
		self.proxy = Some(proxy);
		self
	}

	/// Names that are never destroyed.
	pub fn with_keep<I, S>(mut self, keep: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.keep = keep.into_iter().map(Into::into).collect();
		self
	}

	/// Queries every repository and classifies the existing environments.
	///
	/// A repository whose query fails protects every environment starting
	/// with its short name for this cycle.
	#[instrument(skip(self), fields(repos = self.repos.len()))]
	pub async fn plan(&self) -> ReconcileResult<ReconcilePlan> {
		let results = futures::future::join_all(
			self.repos
				.iter()
				.map(|repo| async move { (repo, self.refs.list_refs(repo).await) }),
		)
		.await;

		let mut plan = ReconcilePlan::default();
		let mut protected_prefixes = Vec::new();
		for (repo, result) in results {
			match result {
				Ok(refs) => {
					debug!(repo = %repo.short_name, refs = refs.len(), "listed refs");
					plan.previews.extend(
						refs.iter()
							.map(|r| EnvironmentName::for_ref(repo, r, false).into_string()),
					);
					plan.desired.extend(desired_patterns(repo, &refs));
					plan.collisions.extend(detect_collisions(repo, &refs));
				}
				Err(e) => {
					warn!(repo = %repo.short_name, error = %e, "ref query failed, protecting its environments");
					protected_prefixes.push(repo.short_name.clone());
					plan.skipped_repositories.push(SkippedRepository {
						short_name: repo.short_name.clone(),
						source: e,
					});
				}
			}
		}
		for collision in &plan.collisions {
			warn!(%collision, "refs share one environment name");
		}

		let mut names = self
			.runtime
			.list()
			.await
			.map_err(ReconcileError::ListEnvironments)?;
		names.sort();
		names.dedup();

		for name in names {
			if owner_of(&name, &self.repos).is_none() {
				continue;
			}
			if protected_prefixes.iter().any(|p| name.starts_with(p.as_str())) {
				plan.protected.push(name);
			} else if self.keep.contains(&name) {
				plan.kept.push(name);
			} else if is_stale(&name, &plan.desired) {
				plan.stale.push(name);
			}
		}

		debug!(
			desired = plan.desired.len(),
			stale = plan.stale.len(),
			protected = plan.protected.len(),
			kept = plan.kept.len(),
			"planned cycle"
		);
		Ok(plan)
	}

	/// One full cycle: plan, destroy stale environments, update routes.
	#[instrument(skip(self))]
	pub async fn reconcile(&self) -> ReconcileResult<ReconcileReport> {
		let plan = self.plan().await?;
		let selection = RouteSelection::owned(self.repos.clone()).with_previews(plan.previews);
		let mut report = ReconcileReport {
			protected: plan.protected,
			skipped_repositories: plan.skipped_repositories,
			collisions: plan.collisions,
			..Default::default()
		};

		for name in plan.stale {
			match self.runtime.destroy(&name).await {
				Ok(()) => {
					info!(name = %name, "destroyed stale environment");
					report.destroyed.push(name);
				}
				Err(e) if e.is_not_found() => {
					debug!(name = %name, "stale environment already gone");
				}
				Err(e) => {
					warn!(name = %name, error = %e, "failed to destroy stale environment");
					report.errors.push(CycleFailure::Destroy { name, source: e });
				}
			}
		}

		if let Some(proxy) = &self.proxy {
			match proxy
				.sync(self.runtime.as_ref(), &selection)
				.await
			{
				Ok(outcome) => report.routes = Some(outcome),
				Err(e) => {
					warn!(error = %e, "route update failed");
					report.errors.push(CycleFailure::Routes(e));
				}
			}
		}

		info!(summary = %report.summary(), "reconcile cycle finished");
		Ok(report)
	}

	/// Reconciles every `interval` until `shutdown` resolves. Returns the
	/// number of cycles run.
	pub async fn run_periodic<F>(&self, interval: Duration, shutdown: F) -> usize
	where
		F: Future<Output = ()>,
	{
		tokio::pin!(shutdown);
		let mut cycles = 0;
		loop {
			cycles += 1;
			if let Err(e) = self.reconcile().await {
				error!(error = %e, cycle = cycles, "reconcile cycle failed");
			}

			tokio::select! {
				_ = tokio::time::sleep(interval) => {}
				_ = &mut shutdown => {
					info!(cycles, "stopping periodic reconcile");
					break;
				}
			}
		}
		cycles
	}
}
