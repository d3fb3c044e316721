// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, trace};

use crate::error::SeedError;

/// What a template environment is seeded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedAction {
	/// Baseline packages and a reference checkout.
	Base,
	/// Service data such as database fixtures.
	Data,
}

impl SeedAction {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Base => "base",
			Self::Data => "data",
		}
	}
}

impl fmt::Display for SeedAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Fills a freshly started template environment.
#[async_trait]
pub trait TemplateSeeder: Send + Sync {
	async fn seed(&self, environment: &str, address: &str, action: SeedAction) -> Result<(), SeedError>;
}

/// Runs an external program on the host: `<program> <args..> <action>`,
/// with `FIRE_ENV_NAME`, `FIRE_ENV_ADDRESS` and `FIRE_SEED_ACTION` set.
#[derive(Debug, Clone)]
pub struct CommandSeeder {
	program: String,
	args: Vec<String>,
}

impl CommandSeeder {
	pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
		Self {
			program: program.into(),
			args,
		}
	}
}

#[async_trait]
impl TemplateSeeder for CommandSeeder {
	async fn seed(&self, environment: &str, address: &str, action: SeedAction) -> Result<(), SeedError> {
		trace!(program = %self.program, environment, %action, "running seed command");
		let status = Command::new(&self.program)
			.args(&self.args)
			.arg(action.as_str())
			.env("FIRE_ENV_NAME", environment)
			.env("FIRE_ENV_ADDRESS", address)
			.env("FIRE_SEED_ACTION", action.as_str())
			.stdin(Stdio::null())
			.status()
			.await
			.map_err(|e| {
				if e.kind() == std::io::ErrorKind::NotFound {
					SeedError::NotInstalled {
						program: self.program.clone(),
					}
				} else {
					SeedError::Io(e)
				}
			})?;

		if !status.success() {
			return Err(SeedError::Failed {
				name: environment.to_string(),
				action: action.to_string(),
				code: status.code(),
			});
		}
		debug!(environment, %action, "seeded environment");
		Ok(())
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSeeder;

#[async_trait]
impl TemplateSeeder for DryRunSeeder {
	async fn seed(&self, environment: &str, _address: &str, action: SeedAction) -> Result<(), SeedError> {
		info!(environment, %action, dry_run = true, "would seed environment");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn missing_program_is_not_installed() {
		let seeder = CommandSeeder::new("/nonexistent/fire-seed", vec![]);
		let err = seeder.seed("t", "10.0.0.1", SeedAction::Base).await.unwrap_err();
		assert!(matches!(err, SeedError::NotInstalled { .. }));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn exit_status_is_checked() {
		let ok = CommandSeeder::new("sh", vec!["-c".to_string(), "test \"$FIRE_SEED_ACTION\" = \"$0\"".to_string()]);
		ok.seed("t", "10.0.0.1", SeedAction::Data).await.unwrap();

		let failing = CommandSeeder::new("sh", vec!["-c".to_string(), "exit 3".to_string()]);
		let err = failing.seed("t", "10.0.0.1", SeedAction::Base).await.unwrap_err();
		assert!(matches!(err, SeedError::Failed { code: Some(3), .. }));
	}
}
