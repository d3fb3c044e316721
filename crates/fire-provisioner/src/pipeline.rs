// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use fire_proxy::CertIssuer;
use fire_runtime::{CloneOptions, ContainerRuntime, CreateSpec};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{ProvisionError, ProvisionResult, StageError};
use crate::seeder::{SeedAction, TemplateSeeder};
use crate::stage::{ProvisionStage, StageTracker};

/// Suffix of the scratch environment a template is built in.
pub const TMP_SUFFIX: &str = "--tmp";

/// Static provisioning settings.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
	pub base_template: String,
	/// `None` clones build environments straight from the base template.
	pub data_template: Option<String>,
	pub create: CreateSpec,
	pub backing_store: Option<String>,
	pub snapshot_clones: bool,
	pub cpus: Option<String>,
	pub address_timeout: Duration,
	pub poll_interval: Duration,
	/// Suffix for exposed hostnames: `<name>.<domain>`.
	pub domain: String,
}

impl Default for ProvisionSettings {
	fn default() -> Self {
		Self {
			base_template: "fire--base".to_string(),
			data_template: Some("fire--data".to_string()),
			create: CreateSpec::default(),
			backing_store: None,
			snapshot_clones: true,
			cpus: None,
			address_timeout: Duration::from_secs(60),
			poll_interval: Duration::from_secs(1),
			domain: "localhost".to_string(),
		}
	}
}

/// Certificate request made by the expose stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expose {
	/// Staging CA.
	Staging,
	Live,
}

/// One environment to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
	pub name: String,
	/// Rebuild the base template even if it exists.
	pub force_base: bool,
	/// Rebuild the data template even if it exists.
	pub force_data: bool,
	/// Keep an existing environment with this name instead of re-cloning.
	pub reuse_existing: bool,
	pub expose: Option<Expose>,
}

impl ProvisionRequest {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			force_base: false,
			force_data: false,
			reuse_existing: false,
			expose: None,
		}
	}
}

/// A request that reached `ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
	pub name: String,
	pub address: Option<String>,
	pub stages: Vec<ProvisionStage>,
	/// An existing environment was kept.
	pub reused: bool,
}

/// Builds templates and per-build environments.
pub struct Provisioner {
	runtime: Arc<dyn ContainerRuntime>,
	seeder: Arc<dyn TemplateSeeder>,
	certs: Arc<dyn CertIssuer>,
	settings: ProvisionSettings,
	/// Held while a template is checked and built, so concurrent builds
	/// never share a scratch environment.
	templates: Mutex<()>,
}

impl Provisioner {
	pub fn new(
		runtime: Arc<dyn ContainerRuntime>,
		seeder: Arc<dyn TemplateSeeder>,
		certs: Arc<dyn CertIssuer>,
		settings: ProvisionSettings,
	) -> Self {
		Self {
			runtime,
			seeder,
			certs,
			settings,
			templates: Mutex::new(()),
		}
	}

	pub fn settings(&self) -> &ProvisionSettings {
		&self.settings
	}

	/// Runs every stage for `request`.
	#[instrument(skip(self, request), fields(name = %request.name))]
	pub async fn provision(&self, request: &ProvisionRequest) -> ProvisionResult<Provisioned> {
		let mut tracker = StageTracker::new();
		let fail = |tracker: &StageTracker, source: StageError| {
			warn!(name = %request.name, reached = %tracker.current(), error = %source, "provisioning failed");
			ProvisionError {
				name: request.name.clone(),
				reached: tracker.current(),
				source,
			}
		};

		if request.reuse_existing && self.runtime.exists(&request.name).await.map_err(|e| fail(&tracker, e.into()))? {
			self.ensure_running(&request.name)
				.await
				.map_err(|e| fail(&tracker, e))?;
			let address = self
				.wait_for_address(&request.name)
				.await
				.map_err(|e| fail(&tracker, e))?;
			info!(name = %request.name, "reusing existing environment");
			return Ok(Provisioned {
				name: request.name.clone(),
				address: Some(address),
				stages: tracker.history().to_vec(),
				reused: true,
			});
		}

		self.ensure_base(request.force_base)
			.await
			.map_err(|e| fail(&tracker, e))?;
		tracker.advance(ProvisionStage::BaseReady);

		self.ensure_data(request.force_data)
			.await
			.map_err(|e| fail(&tracker, e))?;
		tracker.advance(ProvisionStage::DataReady);

		self.clone_environment(&request.name)
			.await
			.map_err(|e| fail(&tracker, e))?;
		tracker.advance(ProvisionStage::Cloned);

		let address = match request.expose {
			Some(mode) => {
				let address = self
					.expose(&request.name, mode)
					.await
					.map_err(|e| fail(&tracker, e))?;
				tracker.advance(ProvisionStage::Exposed);
				Some(address)
			}
			None => self.runtime.address_of(&request.name).await.ok().flatten(),
		};
		tracker.advance(ProvisionStage::Ready);

		info!(name = %request.name, stages = tracker.history().len(), "environment ready");
		Ok(Provisioned {
			name: request.name.clone(),
			address,
			stages: tracker.history().to_vec(),
			reused: false,
		})
	}

	async fn ensure_running(&self, name: &str) -> Result<(), StageError> {
		if self.runtime.list_running().await?.iter().any(|n| n == name) {
			return Ok(());
		}
		info!(name, "starting stopped environment");
		self.runtime.start(name, self.settings.cpus.as_deref()).await?;
		Ok(())
	}

	/// Creates the base template unless it exists (or `force`).
	#[instrument(skip(self))]
	pub async fn ensure_base(&self, force: bool) -> Result<bool, StageError> {
		let _templates = self.templates.lock().await;
		let name = self.settings.base_template.clone();
		if !force && self.runtime.exists(&name).await? {
			debug!(template = %name, "base template present");
			return Ok(false);
		}
		self.build_template(&name, None, SeedAction::Base).await?;
		Ok(true)
	}

	/// Creates the data template on top of the base unless it exists (or
	/// `force`). A no-op when no data template is configured.
	#[instrument(skip(self))]
	pub async fn ensure_data(&self, force: bool) -> Result<bool, StageError> {
		let Some(name) = self.settings.data_template.clone() else {
			return Ok(false);
		};
		let _templates = self.templates.lock().await;
		if !force && self.runtime.exists(&name).await? {
			debug!(template = %name, "data template present");
			return Ok(false);
		}
		let base = self.settings.base_template.clone();
		if !self.runtime.exists(&base).await? {
			return Err(StageError::MissingTemplate { name: base });
		}
		self.build_template(&name, Some(&base), SeedAction::Data).await?;
		Ok(true)
	}

	/// Builds `name` in `<name>--tmp`, seeds it, copies it into place
	/// without snapshotting and removes the scratch environment.
	async fn build_template(&self, name: &str, source: Option<&str>, action: SeedAction) -> Result<(), StageError> {
		let tmp = format!("{name}{TMP_SUFFIX}");
		info!(template = name, tmp = %tmp, %action, "building template");

		if self.runtime.exists(&tmp).await? {
			self.runtime.destroy(&tmp).await?;
		}

		match source {
			Some(source) => {
				let options = CloneOptions {
					snapshot: false,
					backing_store: self.settings.backing_store.clone(),
				};
				self.runtime.clone_env(source, &tmp, &options).await?;
			}
			None => {
				let mut create = self.settings.create.clone();
				if create.backing_store.is_none() {
					create.backing_store = self.settings.backing_store.clone();
				}
				self.runtime.create(&tmp, &create).await?;
			}
		}

		self.runtime.start(&tmp, None).await?;
		let address = self.wait_for_address(&tmp).await?;
		self.seeder.seed(&tmp, &address, action).await?;
		self.runtime.stop(&tmp).await?;

		if self.runtime.exists(name).await? {
			self.runtime.destroy(name).await?;
		}
		let options = CloneOptions {
			snapshot: false,
			backing_store: self.settings.backing_store.clone(),
		};
		self.runtime.clone_env(&tmp, name, &options).await?;
		self.runtime.destroy(&tmp).await?;

		info!(template = name, "template ready");
		Ok(())
	}

	/// Copy-on-write clone of the newest template into `name`, replacing any
	/// environment already using that name, then starts it.
	#[instrument(skip(self))]
	pub async fn clone_environment(&self, name: &str) -> Result<(), StageError> {
		let source = self.clone_source().await?;

		if self.runtime.exists(name).await? {
			info!(name, "replacing existing environment");
			self.runtime.destroy(name).await?;
		}

		let options = CloneOptions {
			snapshot: self.settings.snapshot_clones,
			backing_store: None,
		};
		self.runtime.clone_env(&source, name, &options).await?;
		self.runtime.start(name, self.settings.cpus.as_deref()).await?;
		Ok(())
	}

	async fn clone_source(&self) -> Result<String, StageError> {
		if let Some(data) = &self.settings.data_template {
			if self.runtime.exists(data).await? {
				return Ok(data.clone());
			}
		}
		let base = &self.settings.base_template;
		if self.runtime.exists(base).await? {
			Ok(base.clone())
		} else {
			Err(StageError::MissingTemplate { name: base.clone() })
		}
	}

	/// Waits for an address, then requests a certificate for `<name>.<domain>`.
	#[instrument(skip(self))]
	pub async fn expose(&self, name: &str, mode: Expose) -> Result<String, StageError> {
		let address = self.wait_for_address(name).await?;
		let host = format!("{name}.{}", self.settings.domain);
		self.certs
			.issue(std::slice::from_ref(&host), mode == Expose::Staging)
			.await?;
		info!(name, host = %host, address = %address, "environment exposed");
		Ok(address)
	}

	/// Polls the runtime until `name` reports an address.
	pub async fn wait_for_address(&self, name: &str) -> Result<String, StageError> {
		let poll = async {
			loop {
				if let Some(address) = self.runtime.address_of(name).await? {
					return Ok::<_, StageError>(address);
				}
				tokio::time::sleep(self.settings.poll_interval).await;
			}
		};
		tokio::time::timeout(self.settings.address_timeout, poll)
			.await
			.map_err(|_| StageError::AddressTimeout {
				name: name.to_string(),
				secs: self.settings.address_timeout.as_secs(),
			})?
	}
}
