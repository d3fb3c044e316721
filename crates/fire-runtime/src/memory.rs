// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory runtime for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{RuntimeError, RuntimeResult};
use crate::runtime::{CloneOptions, ContainerRuntime, CreateSpec};

/// A recorded mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeOp {
	Create(String),
	Clone { source: String, target: String, snapshot: bool },
	Start(String),
	Stop(String),
	Destroy(String),
	Exec { name: String, argv: Vec<String> },
}

#[derive(Debug, Clone)]
struct MemoryEnv {
	running: bool,
	address: Option<String>,
}

#[derive(Debug, Default)]
struct State {
	envs: BTreeMap<String, MemoryEnv>,
	ops: Vec<RuntimeOp>,
	fail_destroy: BTreeSet<String>,
	fail_clone: BTreeSet<String>,
	fail_list: bool,
	/// Listed as running but gone when queried.
	vanished: BTreeSet<String>,
	exec_exit: i32,
	next_address: u8,
}

/// Runtime fake. Clones share state, so tests can keep a handle.
#[derive(Debug, Clone, Default)]
pub struct MemoryRuntime {
	state: Arc<Mutex<State>>,
}

impl MemoryRuntime {
	pub fn new() -> Self {
		Self::default()
	}

	/// Pre-populated with running environments that have addresses.
	pub fn with_running<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let runtime = Self::new();
		for name in names {
			runtime.insert(name, true);
		}
		runtime
	}

	pub fn insert(&self, name: impl Into<String>, running: bool) {
		let mut state = self.lock();
		let address = running.then(|| next_address(&mut state));
		state.envs.insert(name.into(), MemoryEnv { running, address });
	}

	/// A running environment whose address has not been assigned yet.
	pub fn insert_without_address(&self, name: impl Into<String>) {
		self.lock().envs.insert(
			name.into(),
			MemoryEnv {
				running: true,
				address: None,
			},
		);
	}

	/// `name` shows up in running listings but no longer exists, as when it
	/// is destroyed between the listing and the address query.
	pub fn vanish_after_listing(&self, name: impl Into<String>) {
		self.lock().vanished.insert(name.into());
	}

	pub fn fail_destroy_of(&self, name: impl Into<String>) {
		self.lock().fail_destroy.insert(name.into());
	}

	pub fn fail_clone_into(&self, name: impl Into<String>) {
		self.lock().fail_clone.insert(name.into());
	}

	pub fn fail_list(&self, fail: bool) {
		self.lock().fail_list = fail;
	}

	pub fn set_exec_exit(&self, code: i32) {
		self.lock().exec_exit = code;
	}

	pub fn names(&self) -> Vec<String> {
		self.lock().envs.keys().cloned().collect()
	}

	pub fn operations(&self) -> Vec<RuntimeOp> {
		self.lock().ops.clone()
	}

	pub fn destroyed(&self) -> Vec<String> {
		self.lock()
			.ops
			.iter()
			.filter_map(|op| match op {
				RuntimeOp::Destroy(name) => Some(name.clone()),
				_ => None,
			})
			.collect()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}
}

fn next_address(state: &mut State) -> String {
	state.next_address = state.next_address.wrapping_add(1);
	format!("10.0.3.{}", state.next_address)
}

fn command_failed(cmd: &str, name: &str) -> RuntimeError {
	RuntimeError::CommandFailed {
		cmd: cmd.to_string(),
		args: vec![name.to_string()],
		code: Some(1),
		stderr: "injected failure".to_string(),
	}
}

#[async_trait]
impl ContainerRuntime for MemoryRuntime {
	async fn create(&self, name: &str, _spec: &CreateSpec) -> RuntimeResult<()> {
		let mut state = self.lock();
		if state.envs.contains_key(name) {
			return Err(RuntimeError::AlreadyExists { name: name.to_string() });
		}
		state.ops.push(RuntimeOp::Create(name.to_string()));
		state.envs.insert(
			name.to_string(),
			MemoryEnv {
				running: false,
				address: None,
			},
		);
		Ok(())
	}

	async fn clone_env(&self, source: &str, target: &str, options: &CloneOptions) -> RuntimeResult<()> {
		let mut state = self.lock();
		if state.fail_clone.contains(target) {
			return Err(command_failed("lxc-copy", target));
		}
		if !state.envs.contains_key(source) {
			return Err(RuntimeError::NotFound { name: source.to_string() });
		}
		if state.envs.contains_key(target) {
			return Err(RuntimeError::AlreadyExists { name: target.to_string() });
		}
		state.ops.push(RuntimeOp::Clone {
			source: source.to_string(),
			target: target.to_string(),
			snapshot: options.snapshot,
		});
		state.envs.insert(
			target.to_string(),
			MemoryEnv {
				running: false,
				address: None,
			},
		);
		Ok(())
	}

	async fn start(&self, name: &str, _cpus: Option<&str>) -> RuntimeResult<()> {
		let mut state = self.lock();
		if !state.envs.contains_key(name) {
			return Err(RuntimeError::NotFound { name: name.to_string() });
		}
		let address = next_address(&mut state);
		state.ops.push(RuntimeOp::Start(name.to_string()));
		if let Some(env) = state.envs.get_mut(name) {
			env.running = true;
			env.address.get_or_insert(address);
		}
		Ok(())
	}

	async fn stop(&self, name: &str) -> RuntimeResult<()> {
		let mut state = self.lock();
		let Some(env) = state.envs.get_mut(name) else {
			return Err(RuntimeError::NotFound { name: name.to_string() });
		};
		env.running = false;
		state.ops.push(RuntimeOp::Stop(name.to_string()));
		Ok(())
	}

	async fn destroy(&self, name: &str) -> RuntimeResult<()> {
		let mut state = self.lock();
		if state.fail_destroy.contains(name) {
			return Err(command_failed("lxc-destroy", name));
		}
		if state.envs.remove(name).is_none() {
			return Err(RuntimeError::NotFound { name: name.to_string() });
		}
		state.ops.push(RuntimeOp::Destroy(name.to_string()));
		Ok(())
	}

	async fn list(&self) -> RuntimeResult<Vec<String>> {
		let state = self.lock();
		if state.fail_list {
			return Err(command_failed("lxc-ls", "-1"));
		}
		Ok(state.envs.keys().cloned().collect())
	}

	async fn list_running(&self) -> RuntimeResult<Vec<String>> {
		let state = self.lock();
		if state.fail_list {
			return Err(command_failed("lxc-ls", "--running"));
		}
		let mut names: Vec<String> = state
			.envs
			.iter()
			.filter(|(_, env)| env.running)
			.map(|(name, _)| name.clone())
			.chain(state.vanished.iter().cloned())
			.collect();
		names.sort();
		names.dedup();
		Ok(names)
	}

	async fn address_of(&self, name: &str) -> RuntimeResult<Option<String>> {
		let state = self.lock();
		match state.envs.get(name) {
			Some(env) if env.running => Ok(env.address.clone()),
			Some(_) => Ok(None),
			None => Err(RuntimeError::NotFound { name: name.to_string() }),
		}
	}

	async fn exec(&self, name: &str, argv: &[String], _env: &[(String, String)]) -> RuntimeResult<i32> {
		let mut state = self.lock();
		if !state.envs.contains_key(name) {
			return Err(RuntimeError::NotFound { name: name.to_string() });
		}
		state.ops.push(RuntimeOp::Exec {
			name: name.to_string(),
			argv: argv.to_vec(),
		});
		Ok(state.exec_exit)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn clone_then_start_assigns_address() {
		let runtime = MemoryRuntime::new();
		runtime.insert("fire--data", false);
		runtime
			.clone_env("fire--data", "sd-master", &CloneOptions::default())
			.await
			.unwrap();
		assert_eq!(runtime.address_of("sd-master").await.unwrap(), None);
		runtime.start("sd-master", None).await.unwrap();
		assert!(runtime.address_of("sd-master").await.unwrap().is_some());
		assert_eq!(runtime.list_running().await.unwrap(), vec!["sd-master"]);
	}

	#[tokio::test]
	async fn injected_destroy_failure() {
		let runtime = MemoryRuntime::with_running(["sd-a"]);
		runtime.fail_destroy_of("sd-a");
		assert!(runtime.destroy("sd-a").await.is_err());
		assert_eq!(runtime.names(), vec!["sd-a"]);
	}

	#[tokio::test]
	async fn clone_onto_existing_name_fails() {
		let runtime = MemoryRuntime::with_running(["base", "sd-a"]);
		let err = runtime
			.clone_env("base", "sd-a", &CloneOptions::default())
			.await
			.unwrap_err();
		assert!(matches!(err, RuntimeError::AlreadyExists { .. }));
	}
}
