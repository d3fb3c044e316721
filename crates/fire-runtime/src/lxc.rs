// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, trace, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::runtime::{validate_name, CloneOptions, ContainerRuntime, CreateSpec};

/// Runtime backed by the `lxc-*` command line tools.
#[derive(Debug, Clone, Default)]
pub struct LxcRuntime {
	/// Alternate container path (`-P`).
	lxc_path: Option<PathBuf>,
	/// Directory holding the tools; `PATH` lookup when unset.
	tool_dir: Option<PathBuf>,
}

impl LxcRuntime {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_lxc_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.lxc_path = Some(path.into());
		self
	}

	pub fn with_tool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.tool_dir = Some(dir.into());
		self
	}

	fn program(&self, tool: &str) -> PathBuf {
		match &self.tool_dir {
			Some(dir) => dir.join(tool),
			None => PathBuf::from(tool),
		}
	}

	fn common_args(&self) -> Vec<String> {
		match &self.lxc_path {
			Some(path) => vec!["-P".to_string(), path.display().to_string()],
			None => Vec::new(),
		}
	}

	fn create_args(&self, name: &str, spec: &CreateSpec) -> Vec<String> {
		let mut args = self.common_args();
		args.extend(["-n".to_string(), name.to_string(), "-t".to_string(), spec.template.clone()]);
		if let Some(bs) = &spec.backing_store {
			args.extend(["-B".to_string(), bs.clone()]);
		}
		if !spec.template_args.is_empty() {
			args.push("--".to_string());
			args.extend(spec.template_args.iter().cloned());
		}
		args
	}

	fn copy_args(&self, source: &str, target: &str, options: &CloneOptions) -> Vec<String> {
		let mut args = self.common_args();
		args.extend([
			"-n".to_string(),
			source.to_string(),
			"-N".to_string(),
			target.to_string(),
		]);
		if options.snapshot {
			args.push("-s".to_string());
		}
		if let Some(bs) = &options.backing_store {
			args.extend(["-B".to_string(), bs.clone()]);
		}
		args
	}

	fn start_args(&self, name: &str, cpus: Option<&str>) -> Vec<String> {
		let mut args = self.common_args();
		args.extend(["-n".to_string(), name.to_string()]);
		if let Some(cpus) = cpus {
			args.extend(["-s".to_string(), format!("lxc.cgroup2.cpuset.cpus={cpus}")]);
		}
		args
	}

	fn attach_args(&self, name: &str, argv: &[String], env: &[(String, String)]) -> Vec<String> {
		let mut args = self.common_args();
		args.extend(["-n".to_string(), name.to_string(), "--clear-env".to_string()]);
		for (key, value) in env {
			args.extend(["-v".to_string(), format!("{key}={value}")]);
		}
		args.push("--".to_string());
		args.extend(argv.iter().cloned());
		args
	}

	async fn run(&self, tool: &str, args: &[String]) -> RuntimeResult<String> {
		let program = self.program(tool);
		trace!(cmd = %format!("{} {}", program.display(), args.join(" ")), "running lxc command");

		let output = Command::new(&program)
			.args(args)
			.stdin(Stdio::null())
			.output()
			.await
			.map_err(|e| map_spawn_error(tool, e))?;

		if output.status.success() {
			Ok(String::from_utf8_lossy(&output.stdout).to_string())
		} else {
			let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
			Err(RuntimeError::CommandFailed {
				cmd: tool.to_string(),
				args: args.to_vec(),
				code: output.status.code(),
				stderr,
			})
		}
	}

	async fn list_with(&self, running: bool) -> RuntimeResult<Vec<String>> {
		let mut args = self.common_args();
		args.push("-1".to_string());
		if running {
			args.push("--running".to_string());
		}
		let stdout = self.run("lxc-ls", &args).await?;
		Ok(parse_names(&stdout))
	}
}

fn map_spawn_error(tool: &str, e: std::io::Error) -> RuntimeError {
	if e.kind() == std::io::ErrorKind::NotFound {
		warn!(tool, "lxc tool not found");
		RuntimeError::NotInstalled {
			tool: tool.to_string(),
		}
	} else {
		RuntimeError::Io(e)
	}
}

/// `lxc-ls -1` output: one name per line.
fn parse_names(stdout: &str) -> Vec<String> {
	stdout
		.split_whitespace()
		.map(String::from)
		.collect()
}

/// `lxc-info -iH` output: one address per line, IPv4 preferred.
fn parse_address(stdout: &str) -> Option<String> {
	let addresses: Vec<&str> = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
	addresses
		.iter()
		.find(|a| !a.contains(':'))
		.or_else(|| addresses.first())
		.map(|a| a.to_string())
}

fn is_missing(stderr: &str) -> bool {
	stderr.contains("does not exist") || stderr.contains("not defined")
}

#[async_trait]
impl ContainerRuntime for LxcRuntime {
	async fn create(&self, name: &str, spec: &CreateSpec) -> RuntimeResult<()> {
		validate_name(name)?;
		let args = self.create_args(name, spec);
		self.run("lxc-create", &args).await?;
		info!(name, template = %spec.template, "created environment");
		Ok(())
	}

	async fn clone_env(&self, source: &str, target: &str, options: &CloneOptions) -> RuntimeResult<()> {
		validate_name(source)?;
		validate_name(target)?;
		let args = self.copy_args(source, target, options);
		self.run("lxc-copy", &args).await.map_err(|e| match e {
			RuntimeError::CommandFailed { ref stderr, .. } if is_missing(stderr) => RuntimeError::NotFound {
				name: source.to_string(),
			},
			other => other,
		})?;
		info!(source, target, snapshot = options.snapshot, "cloned environment");
		Ok(())
	}

	async fn start(&self, name: &str, cpus: Option<&str>) -> RuntimeResult<()> {
		validate_name(name)?;
		let args = self.start_args(name, cpus);
		self.run("lxc-start", &args).await?;
		debug!(name, cpus, "started environment");
		Ok(())
	}

	async fn stop(&self, name: &str) -> RuntimeResult<()> {
		validate_name(name)?;
		let mut args = self.common_args();
		args.extend(["-n".to_string(), name.to_string()]);
		match self.run("lxc-stop", &args).await {
			Ok(_) => {}
			// lxc-stop exits 2 when the container is already stopped.
			Err(RuntimeError::CommandFailed { code: Some(2), .. }) => {}
			Err(RuntimeError::CommandFailed { ref stderr, .. }) if is_missing(stderr) => {
				return Err(RuntimeError::NotFound {
					name: name.to_string(),
				})
			}
			Err(e) => return Err(e),
		}
		debug!(name, "stopped environment");
		Ok(())
	}

	async fn destroy(&self, name: &str) -> RuntimeResult<()> {
		validate_name(name)?;
		let mut args = self.common_args();
		args.extend(["-f".to_string(), "-n".to_string(), name.to_string()]);
		self.run("lxc-destroy", &args).await.map_err(|e| match e {
			RuntimeError::CommandFailed { ref stderr, .. } if is_missing(stderr) => RuntimeError::NotFound {
				name: name.to_string(),
			},
			other => other,
		})?;
		info!(name, "destroyed environment");
		Ok(())
	}

	async fn list(&self) -> RuntimeResult<Vec<String>> {
		self.list_with(false).await
	}

	async fn list_running(&self) -> RuntimeResult<Vec<String>> {
		self.list_with(true).await
	}

	async fn address_of(&self, name: &str) -> RuntimeResult<Option<String>> {
		validate_name(name)?;
		let mut args = self.common_args();
		args.extend(["-n".to_string(), name.to_string(), "-iH".to_string()]);
		let stdout = self.run("lxc-info", &args).await.map_err(|e| match e {
			RuntimeError::CommandFailed { ref stderr, .. } if is_missing(stderr) => RuntimeError::NotFound {
				name: name.to_string(),
			},
			other => other,
		})?;
		Ok(parse_address(&stdout))
	}

	async fn exec(&self, name: &str, argv: &[String], env: &[(String, String)]) -> RuntimeResult<i32> {
		validate_name(name)?;
		let args = self.attach_args(name, argv, env);
		let program = self.program("lxc-attach");
		debug!(name, argv = %argv.join(" "), "running command in environment");

		let status = Command::new(&program)
			.args(&args)
			.stdin(Stdio::null())
			.kill_on_drop(true)
			.status()
			.await
			.map_err(|e| map_spawn_error("lxc-attach", e))?;
		Ok(status.code().unwrap_or(-1))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn strings(items: &[&str]) -> Vec<String> {
		items.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn create_args_pass_template_args_after_separator() {
		let runtime = LxcRuntime::new();
		let spec = CreateSpec {
			template: "download".to_string(),
			template_args: strings(&["-d", "ubuntu"]),
			backing_store: Some("zfs".to_string()),
		};
		assert_eq!(
			runtime.create_args("sd--base--tmp", &spec),
			strings(&["-n", "sd--base--tmp", "-t", "download", "-B", "zfs", "--", "-d", "ubuntu"])
		);
	}

	#[test]
	fn copy_args_snapshot() {
		let runtime = LxcRuntime::new();
		let options = CloneOptions {
			snapshot: true,
			backing_store: None,
		};
		assert_eq!(
			runtime.copy_args("fire--data", "sd-master", &options),
			strings(&["-n", "fire--data", "-N", "sd-master", "-s"])
		);
	}

	#[test]
	fn lxc_path_prefixes_every_command() {
		let runtime = LxcRuntime::new().with_lxc_path("/srv/lxc");
		assert_eq!(
			runtime.start_args("sd-x", Some("0-3")),
			strings(&["-P", "/srv/lxc", "-n", "sd-x", "-s", "lxc.cgroup2.cpuset.cpus=0-3"])
		);
	}

	#[test]
	fn attach_args_clear_env_and_pass_vars() {
		let runtime = LxcRuntime::new();
		let args = runtime.attach_args(
			"sd-x",
			&strings(&["make", "test"]),
			&[("FIRE_TARGET".to_string(), "checks".to_string())],
		);
		assert_eq!(
			args,
			strings(&["-n", "sd-x", "--clear-env", "-v", "FIRE_TARGET=checks", "--", "make", "test"])
		);
	}

	#[test]
	fn parse_names_skips_blank_lines() {
		assert_eq!(parse_names("sd-a\n\nsd-b\n"), strings(&["sd-a", "sd-b"]));
		assert!(parse_names("").is_empty());
	}

	#[test]
	fn parse_address_prefers_ipv4() {
		assert_eq!(
			parse_address("fd42::1\n10.0.3.15\n").as_deref(),
			Some("10.0.3.15")
		);
		assert_eq!(parse_address("fd42::1\n").as_deref(), Some("fd42::1"));
		assert_eq!(parse_address("\n"), None);
	}

	#[tokio::test]
	async fn missing_tool_is_reported() {
		let dir = tempfile::tempdir().unwrap();
		let runtime = LxcRuntime::new().with_tool_dir(dir.path());
		let err = runtime.list().await.unwrap_err();
		assert!(matches!(err, RuntimeError::NotInstalled { ref tool } if tool == "lxc-ls"));
	}

	#[tokio::test]
	async fn invalid_names_never_reach_the_tools() {
		let dir = tempfile::tempdir().unwrap();
		let runtime = LxcRuntime::new().with_tool_dir(dir.path());
		let err = runtime.destroy("-rf").await.unwrap_err();
		assert!(matches!(err, RuntimeError::InvalidName { .. }));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn list_runs_lxc_ls() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempfile::tempdir().unwrap();
		let script = dir.path().join("lxc-ls");
		std::fs::write(&script, "#!/bin/sh\nif [ \"$2\" = \"--running\" ]; then echo sd-a; else printf 'sd-a\\nsd-b\\n'; fi\n").unwrap();
		std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

		let runtime = LxcRuntime::new().with_tool_dir(dir.path());
		assert_eq!(runtime.list().await.unwrap(), strings(&["sd-a", "sd-b"]));
		assert_eq!(runtime.list_running().await.unwrap(), strings(&["sd-a"]));
		assert!(runtime.exists("sd-b").await.unwrap());
		assert!(!runtime.exists("sd-c").await.unwrap());
	}
}
