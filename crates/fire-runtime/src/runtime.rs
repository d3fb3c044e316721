// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};

/// Lifecycle state of an environment as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentState {
	Provisioning,
	Running,
	Exposed,
	Destroying,
	Absent,
}

impl fmt::Display for EnvironmentState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Provisioning => "provisioning",
			Self::Running => "running",
			Self::Exposed => "exposed",
			Self::Destroying => "destroying",
			Self::Absent => "absent",
		};
		f.write_str(s)
	}
}

/// A named environment and, once running, its network address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
	pub name: String,
	pub state: EnvironmentState,
	pub address: Option<String>,
}

impl Environment {
	pub fn running(name: impl Into<String>, address: Option<String>) -> Self {
		Self {
			name: name.into(),
			state: EnvironmentState::Running,
			address,
		}
	}
}

/// How a fresh environment is created from a distribution image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateSpec {
	/// Image template, e.g. `download`.
	pub template: String,
	/// Arguments passed to the image template.
	pub template_args: Vec<String>,
	pub backing_store: Option<String>,
}

/// How an environment is copied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
	/// Copy-on-write snapshot instead of a full copy.
	pub snapshot: bool,
	pub backing_store: Option<String>,
}

/// Primitives of the container runtime that hosts environments.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
	/// Create a new, stopped environment from an image.
	async fn create(&self, name: &str, spec: &CreateSpec) -> RuntimeResult<()>;

	/// Copy `source` into a new environment `target`.
	async fn clone_env(&self, source: &str, target: &str, options: &CloneOptions) -> RuntimeResult<()>;

	/// Start an environment, optionally pinned to a cpu set.
	async fn start(&self, name: &str, cpus: Option<&str>) -> RuntimeResult<()>;

	/// Stop a running environment. Stopping a stopped one succeeds.
	async fn stop(&self, name: &str) -> RuntimeResult<()>;

	/// Stop (if running) and remove an environment.
	async fn destroy(&self, name: &str) -> RuntimeResult<()>;

	/// Names of all environments.
	async fn list(&self) -> RuntimeResult<Vec<String>>;

	/// Names of running environments.
	async fn list_running(&self) -> RuntimeResult<Vec<String>>;

	/// First address of a running environment, `None` while it has none.
	async fn address_of(&self, name: &str) -> RuntimeResult<Option<String>>;

	/// Run a program inside an environment and return its exit code.
	async fn exec(&self, name: &str, argv: &[String], env: &[(String, String)]) -> RuntimeResult<i32>;

	async fn exists(&self, name: &str) -> RuntimeResult<bool> {
		Ok(self.list().await?.iter().any(|n| n == name))
	}
}

/// Rejects names the runtime tools would misread as options or paths.
pub fn validate_name(name: &str) -> RuntimeResult<()> {
	let valid = !name.is_empty()
		&& !name.starts_with('-')
		&& name
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
	if valid {
		Ok(())
	} else {
		Err(RuntimeError::InvalidName {
			name: name.to_string(),
		})
	}
}

/// Running environments with their addresses. Environments destroyed
/// between the listing and the address query are left out.
pub async fn running_environments(runtime: &dyn ContainerRuntime) -> RuntimeResult<Vec<Environment>> {
	let mut environments = Vec::new();
	for name in runtime.list_running().await? {
		let address = match runtime.address_of(&name).await {
			Ok(address) => address,
			Err(e) if e.is_not_found() => {
				debug!(name = %name, "environment vanished while listing");
				continue;
			}
			Err(e) => return Err(e),
		};
		environments.push(Environment::running(name, address));
	}
	Ok(environments)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn valid_names() {
		assert!(validate_name("sd-master").is_ok());
		assert!(validate_name("sd--base").is_ok());
		assert!(validate_name("sd-1.2_x").is_ok());
	}

	#[test]
	fn invalid_names() {
		assert!(validate_name("").is_err());
		assert!(validate_name("-n").is_err());
		assert!(validate_name("a/b").is_err());
		assert!(validate_name("a b").is_err());
		assert!(validate_name("a;rm").is_err());
	}

	#[test]
	fn state_display() {
		assert_eq!(EnvironmentState::Exposed.to_string(), "exposed");
		assert_eq!(Environment::running("a", None).state, EnvironmentState::Running);
	}

	#[tokio::test]
	async fn running_environments_skip_vanished_names() {
		let runtime = crate::memory::MemoryRuntime::with_running(["sd-a", "sd-c"]);
		runtime.vanish_after_listing("sd-b");

		let names: Vec<String> = running_environments(&runtime)
			.await
			.unwrap()
			.into_iter()
			.map(|e| e.name)
			.collect();
		assert_eq!(names, vec!["sd-a", "sd-c"]);
	}

	proptest! {
		#[test]
		fn prop_slug_names_are_valid(name in "[a-z0-9]{1,8}(-[a-z0-9]{1,8}){0,4}") {
			prop_assert!(validate_name(&name).is_ok());
		}
	}
}
