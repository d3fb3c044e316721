// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use fire_runtime::ContainerRuntime;
use tracing::{debug, info};

use crate::error::BuildResult;
use crate::target::{BuildTarget, ExitStatus};

/// Everything the backend needs besides the environment and target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
	/// Run the install step before the target.
	pub install: bool,
	pub repo: String,
	pub ref_id: String,
	pub fingerprint: String,
	/// Public hostname of the environment, when exposed.
	pub host: Option<String>,
	pub env: Vec<(String, String)>,
}

impl RunOptions {
	/// `FIRE_*` variables followed by the request's own overrides.
	pub fn environment(&self, environment: &str, target: BuildTarget) -> Vec<(String, String)> {
		let mut vars = vec![
			("FIRE_ENV_NAME".to_string(), environment.to_string()),
			("FIRE_TARGET".to_string(), target.as_str().to_string()),
			("FIRE_INSTALL".to_string(), if self.install { "1" } else { "0" }.to_string()),
			("FIRE_REPO".to_string(), self.repo.clone()),
			("FIRE_REF".to_string(), self.ref_id.clone()),
			("FIRE_SHA".to_string(), self.fingerprint.clone()),
		];
		if let Some(host) = &self.host {
			vars.push(("FIRE_HOST".to_string(), host.clone()));
		}
		vars.extend(self.env.iter().cloned());
		vars
	}
}

/// Runs build steps. Never receives [`BuildTarget::Full`]; the dispatcher
/// splits it into its parts.
#[async_trait]
pub trait BuildBackend: Send + Sync {
	async fn run_target(&self, environment: &str, target: BuildTarget, options: &RunOptions) -> BuildResult<ExitStatus>;
}

/// Runs `<command> <args..> <target>` inside the environment.
pub struct ContainerBackend {
	runtime: Arc<dyn ContainerRuntime>,
	command: String,
	args: Vec<String>,
}

impl ContainerBackend {
	pub fn new(runtime: Arc<dyn ContainerRuntime>, command: impl Into<String>, args: Vec<String>) -> Self {
		Self {
			runtime,
			command: command.into(),
			args,
		}
	}

	fn argv(&self, target: BuildTarget) -> Vec<String> {
		let mut argv = Vec::with_capacity(self.args.len() + 2);
		argv.push(self.command.clone());
		argv.extend(self.args.iter().cloned());
		argv.push(target.as_str().to_string());
		argv
	}
}

#[async_trait]
impl BuildBackend for ContainerBackend {
	async fn run_target(&self, environment: &str, target: BuildTarget, options: &RunOptions) -> BuildResult<ExitStatus> {
		let argv = self.argv(target);
		let env = options.environment(environment, target);
		debug!(environment, %target, install = options.install, "running build target");
		let code = self.runtime.exec(environment, &argv, &env).await?;
		Ok(ExitStatus(code))
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunBackend;

#[async_trait]
impl BuildBackend for DryRunBackend {
	async fn run_target(&self, environment: &str, target: BuildTarget, options: &RunOptions) -> BuildResult<ExitStatus> {
		info!(environment, %target, install = options.install, dry_run = true, "would run build target");
		Ok(ExitStatus::SUCCESS)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fire_runtime::memory::{MemoryRuntime, RuntimeOp};

	#[tokio::test]
	async fn container_backend_execs_target_inside_environment() {
		let runtime = MemoryRuntime::with_running(["sd-master-0123456789"]);
		runtime.set_exec_exit(3);
		let backend = ContainerBackend::new(Arc::new(runtime.clone()), "/usr/local/bin/fire-build", vec!["-v".to_string()]);

		let status = backend
			.run_target("sd-master-0123456789", BuildTarget::ChecksOnly, &RunOptions::default())
			.await
			.unwrap();

		assert_eq!(status, ExitStatus(3));
		assert_eq!(
			runtime.operations(),
			vec![RuntimeOp::Exec {
				name: "sd-master-0123456789".to_string(),
				argv: vec![
					"/usr/local/bin/fire-build".to_string(),
					"-v".to_string(),
					"checks-only".to_string()
				],
			}]
		);
	}

	#[tokio::test]
	async fn missing_environment_is_an_error() {
		let backend = ContainerBackend::new(Arc::new(MemoryRuntime::new()), "build", vec![]);
		assert!(backend
			.run_target("sd-gone", BuildTarget::WebOnly, &RunOptions::default())
			.await
			.is_err());
	}

	#[test]
	fn overrides_come_after_fire_variables() {
		let options = RunOptions {
			install: true,
			repo: "superdesk/superdesk".to_string(),
			ref_id: "master".to_string(),
			fingerprint: "abc".to_string(),
			host: Some("sd-master.x.org".to_string()),
			env: vec![("FIRE_INSTALL".to_string(), "0".to_string())],
		};
		let vars = options.environment("sd-master", BuildTarget::WebOnly);
		assert_eq!(vars[0], ("FIRE_ENV_NAME".to_string(), "sd-master".to_string()));
		assert!(vars.contains(&("FIRE_HOST".to_string(), "sd-master.x.org".to_string())));
		assert_eq!(vars.last(), Some(&("FIRE_INSTALL".to_string(), "0".to_string())));
	}
}
