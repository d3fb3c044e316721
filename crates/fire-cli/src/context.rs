// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context as _};
use fire_builds::{
	BuildBackend, CallbackNotifier, ContainerBackend, DispatchSettings, Dispatcher, DryRunBackend, DryRunNotifier,
	HttpNotifier,
};
use fire_config::FireConfig;
use fire_naming::{RefKind, TrackedRepository};
use fire_provisioner::{CommandSeeder, DryRunSeeder, Expose, ProvisionSettings, Provisioner, TemplateSeeder};
use fire_proxy::{
	CertIssuer, CertbotIssuer, DryRunCertIssuer, DryRunProxyControl, NginxControl, ProxyConfigurator, ProxyControl,
	RouteTemplate, RouteWriter, TlsMode, DEFAULT_TEMPLATE,
};
use fire_reconciler::Reconciler;
use fire_runtime::{ContainerRuntime, CreateSpec, DryRunRuntime, LxcRuntime};
use fire_scm::{DryRunStatusSink, GitHubClient, RefSource, StatusSink};

/// Collaborators for one invocation. Under `--dry-run` every mutating
/// adapter is swapped for its logging counterpart; reads stay real.
pub struct Context {
	pub config: FireConfig,
	pub dry_run: bool,
	pub runtime: Arc<dyn ContainerRuntime>,
	pub refs: Arc<dyn RefSource>,
	pub statuses: Arc<dyn StatusSink>,
	pub seeder: Arc<dyn TemplateSeeder>,
	pub certs: Arc<dyn CertIssuer>,
	pub control: Arc<dyn ProxyControl>,
	pub backend: Arc<dyn BuildBackend>,
	pub notifier: Arc<dyn CallbackNotifier>,
}

impl Context {
	pub fn new(config: FireConfig, dry_run: bool) -> anyhow::Result<Self> {
		let mut lxc = LxcRuntime::new();
		if let Some(path) = &config.runtime.lxc_path {
			lxc = lxc.with_lxc_path(path);
		}

		let github = Arc::new(
			GitHubClient::new(&config.github.api_url, Duration::from_secs(config.github.timeout_secs))
				.context("building GitHub client")?
				.with_token(config.github.token.clone()),
		);

		let ctx = if dry_run {
			let runtime: Arc<dyn ContainerRuntime> = Arc::new(DryRunRuntime::new(lxc));
			Self {
				runtime,
				refs: github,
				statuses: Arc::new(DryRunStatusSink),
				seeder: Arc::new(DryRunSeeder),
				certs: Arc::new(DryRunCertIssuer),
				control: Arc::new(DryRunProxyControl),
				backend: Arc::new(DryRunBackend),
				notifier: Arc::new(DryRunNotifier),
				config,
				dry_run,
			}
		} else {
			let runtime: Arc<dyn ContainerRuntime> = Arc::new(lxc);
			let backend = ContainerBackend::new(runtime.clone(), config.builds.command.clone(), config.builds.args.clone());
			let notifier = HttpNotifier::new(Duration::from_secs(config.notify.timeout_secs))
				.with_secret(config.notify.secret.clone());
			let certs = CertbotIssuer {
				program: config.certs.certbot_path.clone(),
				email: config.certs.email.clone(),
				webroot: config.certs.webroot.clone(),
				staging_server: config.certs.staging_server.clone(),
			};
			Self {
				runtime,
				refs: github.clone(),
				statuses: github,
				seeder: Arc::new(CommandSeeder::new(
					config.builds.seed_command.clone(),
					config.builds.seed_args.clone(),
				)),
				certs: Arc::new(certs),
				control: Arc::new(NginxControl::new(config.proxy.nginx_path.clone())),
				backend: Arc::new(backend),
				notifier: Arc::new(notifier),
				config,
				dry_run,
			}
		};
		Ok(ctx)
	}

	pub fn provision_settings(&self) -> ProvisionSettings {
		let runtime = &self.config.runtime;
		ProvisionSettings {
			base_template: runtime.base_template.clone(),
			data_template: runtime.data_enabled.then(|| runtime.data_template.clone()),
			create: CreateSpec {
				template: runtime.create_template.clone(),
				template_args: runtime.create_args.clone(),
				backing_store: runtime.backing_store.clone(),
			},
			backing_store: runtime.backing_store.clone(),
			snapshot_clones: runtime.snapshot_clones,
			cpus: runtime.cpus.clone(),
			address_timeout: Duration::from_secs(runtime.address_timeout_secs),
			domain: self.config.proxy.domain.clone(),
			..ProvisionSettings::default()
		}
	}

	pub fn provisioner(&self) -> Arc<Provisioner> {
		Arc::new(Provisioner::new(
			self.runtime.clone(),
			self.seeder.clone(),
			self.certs.clone(),
			self.provision_settings(),
		))
	}

	/// Route configurator writing to `path` (or `proxy.routes_path`). Under
	/// `--dry-run` the routes file is read but never written or locked.
	pub fn proxy(&self, path: Option<PathBuf>, tls: TlsMode) -> anyhow::Result<Arc<ProxyConfigurator>> {
		let template = match &self.config.proxy.template_path {
			Some(path) => RouteTemplate::from_file(path)?,
			None => RouteTemplate::parse(DEFAULT_TEMPLATE)?,
		};
		let path = path.unwrap_or_else(|| self.config.proxy.routes_path.clone());
		let writer = if self.dry_run {
			RouteWriter::dry_run(path)
		} else {
			RouteWriter::new(path)
		};
		let configurator = ProxyConfigurator::new(
			writer,
			template,
			self.config.proxy.domain.clone(),
			self.control.clone(),
			self.certs.clone(),
		)
		.with_primary(self.config.proxy.primary.clone())
		.with_tls(tls);
		Ok(Arc::new(configurator))
	}

	pub fn reconciler(&self) -> anyhow::Result<Reconciler> {
		Ok(Reconciler::new(self.config.repos.clone(), self.refs.clone(), self.runtime.clone())
			.with_keep(self.config.runtime.keep.iter().cloned())
			.with_proxy(self.proxy(None, TlsMode::Off)?))
	}

	pub fn dispatcher(&self, expose: Expose) -> anyhow::Result<Dispatcher> {
		let settings = DispatchSettings {
			timeout: Duration::from_secs(self.config.builds.timeout_secs),
			max_concurrent: self.config.builds.max_concurrent,
			status_context: self.config.github.status_context.clone(),
			target_url: self.config.github.target_url.clone(),
			expose,
		};
		Ok(Dispatcher::new(
			self.runtime.clone(),
			self.provisioner(),
			self.backend.clone(),
			self.refs.clone(),
			settings,
		)
		.with_statuses(self.statuses.clone())
		.with_notifier(self.notifier.clone())
		.with_proxy(self.proxy(None, TlsMode::Off)?, self.config.repos.clone()))
	}

	/// Resolves `sd` to a branch of `sd` and `sdpr` to a pull request of `sd`.
	pub fn resolve_repo(&self, short_name: &str) -> anyhow::Result<(TrackedRepository, RefKind)> {
		if let Some(repo) = self.config.repo(short_name) {
			return Ok((repo.clone(), RefKind::Branch));
		}
		short_name
			.strip_suffix("pr")
			.and_then(|short| self.config.repo(short))
			.map(|repo| (repo.clone(), RefKind::PullRequest))
			.ok_or_else(|| anyhow!("unknown repository {short_name:?}"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fire_naming::{Fingerprint, Ref};
	use fire_proxy::RouteSelection;
	use fire_runtime::memory::MemoryRuntime;
	use fire_scm::memory::StaticRefSource;

	fn config() -> FireConfig {
		FireConfig {
			repos: vec![
				TrackedRepository::new("sd", "superdesk/superdesk").unwrap(),
				TrackedRepository::new("sds", "superdesk/superdesk-server").unwrap(),
			],
			..FireConfig::default()
		}
	}

	#[test]
	fn resolves_branch_and_pull_request_prefixes() {
		let ctx = Context::new(config(), true).unwrap();
		let (repo, kind) = ctx.resolve_repo("sd").unwrap();
		assert_eq!((repo.short_name.as_str(), kind), ("sd", RefKind::Branch));
		let (repo, kind) = ctx.resolve_repo("sdspr").unwrap();
		assert_eq!((repo.short_name.as_str(), kind), ("sds", RefKind::PullRequest));
		assert!(ctx.resolve_repo("xyz").is_err());
		assert!(ctx.resolve_repo("pr").is_err());
	}

	#[test]
	fn disabled_data_template_clones_from_base() {
		let mut config = config();
		config.runtime.data_enabled = false;
		let ctx = Context::new(config, true).unwrap();
		let settings = ctx.provision_settings();
		assert_eq!(settings.data_template, None);
		assert_eq!(settings.base_template, "fire--base");
	}

	#[test]
	fn provision_settings_follow_config() {
		let mut config = config();
		config.runtime.address_timeout_secs = 5;
		config.runtime.cpus = Some("0-3".to_string());
		config.proxy.domain = "preview.example.com".to_string();
		let ctx = Context::new(config, true).unwrap();
		let settings = ctx.provision_settings();
		assert_eq!(settings.data_template.as_deref(), Some("fire--data"));
		assert_eq!(settings.address_timeout, Duration::from_secs(5));
		assert_eq!(settings.cpus.as_deref(), Some("0-3"));
		assert_eq!(settings.domain, "preview.example.com");
		assert_eq!(settings.create.template, "download");
	}

	#[tokio::test]
	async fn dry_run_leaves_routes_file_alone() {
		let dir = tempfile::tempdir().unwrap();
		let routes_path = dir.path().join("fire.conf");
		std::fs::write(&routes_path, "LIVE CONFIG\n").unwrap();
		let mut config = config();
		config.proxy.routes_path = routes_path.clone();

		let mut ctx = Context::new(config, true).unwrap();
		let memory = MemoryRuntime::with_running(["sd-master", "sd-stale"]);
		ctx.runtime = Arc::new(DryRunRuntime::new(memory.clone()));
		let refs = StaticRefSource::new();
		refs.set_refs("sd", vec![Ref::branch("master", Fingerprint::new("abcdef12").unwrap())]);
		refs.set_refs("sds", vec![]);
		ctx.refs = Arc::new(refs);

		let outcome = ctx
			.proxy(None, TlsMode::Off)
			.unwrap()
			.sync(ctx.runtime.as_ref(), &RouteSelection::owned(ctx.config.repos.clone()))
			.await
			.unwrap();
		assert_eq!(outcome.routes.len(), 2);
		assert!(outcome.changed);

		let report = ctx.reconciler().unwrap().reconcile().await.unwrap();
		assert_eq!(report.destroyed, vec!["sd-stale"]);

		assert_eq!(std::fs::read_to_string(&routes_path).unwrap(), "LIVE CONFIG\n");
		assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
		assert_eq!(memory.names(), vec!["sd-master", "sd-stale"]);
	}

	#[tokio::test]
	async fn builds_every_component() {
		let ctx = Context::new(config(), false).unwrap();
		assert!(ctx.proxy(None, TlsMode::Off).is_ok());
		assert!(ctx.reconciler().is_ok());
		assert!(ctx.dispatcher(Expose::Staging).is_ok());
	}
}
