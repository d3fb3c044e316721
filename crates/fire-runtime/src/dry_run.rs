// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use tracing::info;

use crate::error::RuntimeResult;
use crate::runtime::{CloneOptions, ContainerRuntime, CreateSpec};

/// Address reported for environments that only exist in a dry run
/// (TEST-NET-1, never routable).
pub const DRY_RUN_ADDRESS: &str = "192.0.2.1";

/// Logs mutating operations instead of performing them. Reads pass through.
pub struct DryRunRuntime<R> {
	inner: R,
}

impl<R: ContainerRuntime> DryRunRuntime<R> {
	pub fn new(inner: R) -> Self {
		Self { inner }
	}
}

#[async_trait]
impl<R: ContainerRuntime> ContainerRuntime for DryRunRuntime<R> {
	async fn create(&self, name: &str, spec: &CreateSpec) -> RuntimeResult<()> {
		info!(name, template = %spec.template, dry_run = true, "would create environment");
		Ok(())
	}

	async fn clone_env(&self, source: &str, target: &str, options: &CloneOptions) -> RuntimeResult<()> {
		info!(source, target, snapshot = options.snapshot, dry_run = true, "would clone environment");
		Ok(())
	}

	async fn start(&self, name: &str, cpus: Option<&str>) -> RuntimeResult<()> {
		info!(name, cpus, dry_run = true, "would start environment");
		Ok(())
	}

	async fn stop(&self, name: &str) -> RuntimeResult<()> {
		info!(name, dry_run = true, "would stop environment");
		Ok(())
	}

	async fn destroy(&self, name: &str) -> RuntimeResult<()> {
		info!(name, dry_run = true, "would destroy environment");
		Ok(())
	}

	async fn list(&self) -> RuntimeResult<Vec<String>> {
		self.inner.list().await
	}

	async fn list_running(&self) -> RuntimeResult<Vec<String>> {
		self.inner.list_running().await
	}

	async fn address_of(&self, name: &str) -> RuntimeResult<Option<String>> {
		match self.inner.address_of(name).await {
			Ok(Some(address)) => Ok(Some(address)),
			_ => Ok(Some(DRY_RUN_ADDRESS.to_string())),
		}
	}

	async fn exec(&self, name: &str, argv: &[String], _env: &[(String, String)]) -> RuntimeResult<i32> {
		info!(name, argv = %argv.join(" "), dry_run = true, "would run command in environment");
		Ok(0)
	}

	async fn exists(&self, name: &str) -> RuntimeResult<bool> {
		self.inner.exists(name).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory::MemoryRuntime;

	#[tokio::test]
	async fn mutations_do_not_reach_inner_runtime() {
		let inner = MemoryRuntime::with_running(["sd-master"]);
		let runtime = DryRunRuntime::new(inner.clone());

		runtime.destroy("sd-master").await.unwrap();
		runtime
			.clone_env("sd-master", "sd-copy", &CloneOptions::default())
			.await
			.unwrap();

		assert_eq!(runtime.list().await.unwrap(), vec!["sd-master"]);
		assert!(inner.operations().is_empty());
	}

	#[tokio::test]
	async fn unknown_environments_get_placeholder_address() {
		let runtime = DryRunRuntime::new(MemoryRuntime::new());
		assert_eq!(
			runtime.address_of("sd-new").await.unwrap().as_deref(),
			Some(DRY_RUN_ADDRESS)
		);
	}
}
