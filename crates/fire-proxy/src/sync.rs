// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Render, write and reload in one step.

use std::collections::BTreeSet;
use std::sync::Arc;

use fire_naming::{route_candidates, TrackedRepository};
use fire_runtime::{running_environments, ContainerRuntime, Environment};
use tracing::{debug, info, instrument, warn};

use crate::certs::CertIssuer;
use crate::control::ProxyControl;
use crate::error::ProxyResult;
use crate::routes::RouteTable;
use crate::template::RouteTemplate;
use crate::writer::RouteWriter;

/// Which running environments get routes.
#[derive(Debug, Clone)]
pub enum RouteSelection {
	/// Preview environments owned by the tracked repositories. Environments
	/// still waiting for an address are skipped.
	Owned {
		repos: Vec<TrackedRepository>,
		/// Names known to be previews, routed whatever their shape.
		previews: BTreeSet<String>,
	},
	/// Exactly these names, where running. Each must have an address.
	Names(Vec<String>),
}

impl RouteSelection {
	pub fn owned(repos: Vec<TrackedRepository>) -> Self {
		Self::Owned {
			repos,
			previews: BTreeSet::new(),
		}
	}

	/// Adds known preview names. No effect on a named selection.
	pub fn with_previews<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		if let Self::Owned { previews, .. } = &mut self {
			previews.extend(names.into_iter().map(Into::into));
		}
		self
	}
}

/// Certificate policy for an apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
	Off,
	Staging,
	Live,
}

/// Result of a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
	pub routes: RouteTable,
	/// The file content differed from what was there before.
	pub changed: bool,
	/// Certificate issuance failed. Routes were still written and reloaded.
	pub certificate_error: Option<String>,
}

/// Keeps the proxy's routes file in sync with running environments.
pub struct ProxyConfigurator {
	writer: RouteWriter,
	template: RouteTemplate,
	domain: String,
	primary: Option<String>,
	control: Arc<dyn ProxyControl>,
	certs: Arc<dyn CertIssuer>,
	tls: TlsMode,
}

impl ProxyConfigurator {
	pub fn new(
		writer: RouteWriter,
		template: RouteTemplate,
		domain: impl Into<String>,
		control: Arc<dyn ProxyControl>,
		certs: Arc<dyn CertIssuer>,
	) -> Self {
		Self {
			writer,
			template,
			domain: domain.into(),
			primary: None,
			control,
			certs,
			tls: TlsMode::Off,
		}
	}

	pub fn with_primary(mut self, primary: Option<String>) -> Self {
		self.primary = primary;
		self
	}

	pub fn with_tls(mut self, tls: TlsMode) -> Self {
		self.tls = tls;
		self
	}

	pub fn domain(&self) -> &str {
		&self.domain
	}

	/// Lists running environments and applies routes for the selected ones,
	/// all under the route lock.
	#[instrument(skip_all)]
	pub async fn sync(&self, runtime: &dyn ContainerRuntime, selection: &RouteSelection) -> ProxyResult<ApplyOutcome> {
		let lock = self.writer.lock().await?;

		let running = running_environments(runtime).await?;
		let selected = select(running, selection);
		self.apply_locked(&lock, &selected).await
	}

	/// Applies routes for exactly `environments`.
	pub async fn apply(&self, environments: &[Environment]) -> ProxyResult<ApplyOutcome> {
		let lock = self.writer.lock().await?;
		self.apply_locked(&lock, environments).await
	}

	async fn apply_locked(
		&self,
		lock: &crate::writer::RouteLock<'_>,
		environments: &[Environment],
	) -> ProxyResult<ApplyOutcome> {
		let routes = RouteTable::build(environments, &self.domain, self.primary.as_deref())?;
		let content = routes.render(&self.template);

		let certificate_error = match self.tls {
			TlsMode::Off => None,
			TlsMode::Staging | TlsMode::Live => {
				match self.certs.issue(&routes.hosts(), self.tls == TlsMode::Staging).await {
					Ok(()) => None,
					Err(e) => {
						warn!(error = %e, "certificate issuance failed, writing routes anyway");
						Some(e.to_string())
					}
				}
			}
		};

		let changed = self.writer.read_current()? != content;
		self.writer.write(lock, &content)?;
		self.control.reload().await?;

		info!(
			routes = routes.len(),
			changed,
			path = %self.writer.path().display(),
			"applied proxy routes"
		);
		Ok(ApplyOutcome {
			routes,
			changed,
			certificate_error,
		})
	}
}

fn select(running: Vec<Environment>, selection: &RouteSelection) -> Vec<Environment> {
	match selection {
		RouteSelection::Owned { repos, previews } => {
			let names: Vec<String> = running.iter().map(|e| e.name.clone()).collect();
			let keep = route_candidates(&names, repos, previews);
			running
				.into_iter()
				.filter(|e| keep.contains(&e.name))
				.filter(|e| {
					let addressed = e.address.as_deref().is_some_and(|a| !a.is_empty());
					if !addressed {
						debug!(name = %e.name, "no address yet, leaving out of routes");
					}
					addressed
				})
				.collect()
		}
		RouteSelection::Names(wanted) => {
			for name in wanted {
				if !running.iter().any(|e| &e.name == name) {
					warn!(name = %name, "requested environment is not running, skipping");
				}
			}
			running.into_iter().filter(|e| wanted.contains(&e.name)).collect()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::{ProxyError, RenderError};
	use crate::memory::{RecordingCertIssuer, RecordingProxyControl};
	use fire_runtime::memory::MemoryRuntime;

	struct Fixture {
		_dir: tempfile::TempDir,
		configurator: ProxyConfigurator,
		control: RecordingProxyControl,
		certs: RecordingCertIssuer,
		path: std::path::PathBuf,
	}

	fn fixture(tls: TlsMode) -> Fixture {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("routes.conf");
		let control = RecordingProxyControl::new();
		let certs = RecordingCertIssuer::new();
		let configurator = ProxyConfigurator::new(
			RouteWriter::new(&path),
			RouteTemplate::parse("{host} {address};\n").unwrap(),
			"x.org",
			Arc::new(control.clone()),
			Arc::new(certs.clone()),
		)
		.with_primary(Some("sd-master".to_string()))
		.with_tls(tls);
		Fixture {
			_dir: dir,
			configurator,
			control,
			certs,
			path,
		}
	}

	fn repos() -> Vec<TrackedRepository> {
		vec![TrackedRepository::new("sd", "superdesk/superdesk").unwrap()]
	}

	#[tokio::test]
	async fn sync_routes_owned_preview_environments() {
		let fx = fixture(TlsMode::Off);
		let runtime = MemoryRuntime::with_running(["sd-a", "sd-master", "sd-a-0123456789", "fire--base", "other"]);

		let outcome = fx
			.configurator
			.sync(&runtime, &RouteSelection::owned(repos()))
			.await
			.unwrap();

		assert_eq!(outcome.routes.hosts(), vec!["sd-master.x.org", "sd-a.x.org"]);
		assert!(outcome.changed);
		let content = std::fs::read_to_string(&fx.path).unwrap();
		assert!(content.starts_with("sd-master.x.org "));
		assert_eq!(fx.control.reloads(), 1);
		assert!(fx.certs.issued().is_empty());
	}

	#[tokio::test]
	async fn second_sync_renders_identical_bytes() {
		let fx = fixture(TlsMode::Off);
		let runtime = MemoryRuntime::with_running(["sd-a", "sd-master"]);
		let selection = RouteSelection::owned(repos());

		fx.configurator.sync(&runtime, &selection).await.unwrap();
		let first = std::fs::read(&fx.path).unwrap();
		let outcome = fx.configurator.sync(&runtime, &selection).await.unwrap();
		let second = std::fs::read(&fx.path).unwrap();

		assert_eq!(first, second);
		assert!(!outcome.changed);
	}

	#[tokio::test]
	async fn certificates_requested_before_reload() {
		let fx = fixture(TlsMode::Staging);
		let runtime = MemoryRuntime::with_running(["sd-a", "sd-master"]);
		fx.configurator
			.sync(&runtime, &RouteSelection::owned(repos()))
			.await
			.unwrap();

		let issued = fx.certs.issued();
		assert_eq!(issued.len(), 1);
		assert_eq!(issued[0].0, vec!["sd-master.x.org", "sd-a.x.org"]);
		assert!(issued[0].1, "staging CA expected");
	}

	#[tokio::test]
	async fn render_error_leaves_file_untouched() {
		let fx = fixture(TlsMode::Live);
		std::fs::write(&fx.path, "previous").unwrap();

		let envs = vec![Environment::running("sd-a", None)];
		assert!(fx.configurator.apply(&envs).await.is_err());

		assert_eq!(std::fs::read_to_string(&fx.path).unwrap(), "previous");
		assert_eq!(fx.control.reloads(), 0);
		assert!(fx.certs.issued().is_empty());
	}

	#[tokio::test]
	async fn failed_issuance_still_writes_routes() {
		let fx = fixture(TlsMode::Live);
		fx.certs.set_failing(true);
		let envs = vec![Environment::running("sd-a", Some("10.0.0.1".to_string()))];

		let outcome = fx.configurator.apply(&envs).await.unwrap();

		assert!(outcome.certificate_error.is_some());
		assert_eq!(std::fs::read_to_string(&fx.path).unwrap(), "sd-a.x.org 10.0.0.1;\n");
		assert_eq!(fx.control.reloads(), 1);
	}

	#[tokio::test]
	async fn environment_without_address_does_not_block_other_routes() {
		let fx = fixture(TlsMode::Off);
		let runtime = MemoryRuntime::with_running(["sd-a", "sd-master"]);
		runtime.insert_without_address("sd-booting");
		runtime.vanish_after_listing("sd-gone");

		let outcome = fx
			.configurator
			.sync(&runtime, &RouteSelection::owned(repos()))
			.await
			.unwrap();

		assert_eq!(outcome.routes.hosts(), vec!["sd-master.x.org", "sd-a.x.org"]);
		assert_eq!(fx.control.reloads(), 1);
	}

	#[tokio::test]
	async fn named_environment_without_address_is_an_error() {
		let fx = fixture(TlsMode::Off);
		let runtime = MemoryRuntime::with_running(["sd-a"]);
		runtime.insert_without_address("sd-booting");

		let err = fx
			.configurator
			.sync(&runtime, &RouteSelection::Names(vec!["sd-booting".to_string()]))
			.await
			.unwrap_err();
		assert!(matches!(err, ProxyError::Render(RenderError::MissingAddress(_))));
		assert!(!fx.path.exists());
	}

	#[tokio::test]
	async fn known_preview_with_hex_looking_name_is_routed() {
		let fx = fixture(TlsMode::Off);
		let runtime = MemoryRuntime::with_running(["sd-fix-deadbeef00", "sd-fix-deadbeef00-0123456789"]);

		let outcome = fx
			.configurator
			.sync(&runtime, &RouteSelection::owned(repos()))
			.await
			.unwrap();
		assert!(outcome.routes.is_empty());

		let selection = RouteSelection::owned(repos()).with_previews(["sd-fix-deadbeef00"]);
		let outcome = fx.configurator.sync(&runtime, &selection).await.unwrap();
		assert_eq!(outcome.routes.hosts(), vec!["sd-fix-deadbeef00.x.org"]);
	}

	#[tokio::test]
	async fn named_selection_skips_stopped() {
		let fx = fixture(TlsMode::Off);
		let runtime = MemoryRuntime::with_running(["sd-a", "sd-b"]);
		runtime.insert("sd-c", false);

		let outcome = fx
			.configurator
			.sync(
				&runtime,
				&RouteSelection::Names(vec!["sd-b".to_string(), "sd-c".to_string()]),
			)
			.await
			.unwrap();
		assert_eq!(outcome.routes.hosts(), vec!["sd-b.x.org"]);
	}
}
