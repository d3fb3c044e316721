// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::str::FromStr;

use fire_naming::{Fingerprint, RefKind, TrackedRepository};
use serde::{Deserialize, Serialize};

/// What a build request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BuildTarget {
	/// Install and checks in the build environment, then the web preview.
	#[default]
	Full,
	InstallOnly,
	/// Checks in an existing build environment, without installing.
	ChecksOnly,
	/// The web preview in the exposed preview environment.
	WebOnly,
}

impl BuildTarget {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Full => "full",
			Self::InstallOnly => "install-only",
			Self::ChecksOnly => "checks-only",
			Self::WebOnly => "web-only",
		}
	}
}

impl fmt::Display for BuildTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for BuildTarget {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"full" => Ok(Self::Full),
			"install-only" | "install" => Ok(Self::InstallOnly),
			"checks-only" | "checks" => Ok(Self::ChecksOnly),
			"web-only" | "web" => Ok(Self::WebOnly),
			other => Err(format!("unknown build target: {other}")),
		}
	}
}

/// Process-style exit status of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExitStatus(pub i32);

impl ExitStatus {
	pub const SUCCESS: ExitStatus = ExitStatus(0);
	/// Generic failure outside the build itself (unresolvable ref, backend error).
	pub const FAILURE: ExitStatus = ExitStatus(1);
	pub const PROVISION_FAILED: ExitStatus = ExitStatus(2);
	/// The build outlived its timeout.
	pub const TIMEOUT: ExitStatus = ExitStatus(124);

	pub fn code(self) -> i32 {
		self.0
	}

	pub fn is_success(self) -> bool {
		self.0 == 0
	}
}

impl fmt::Display for ExitStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// How a dispatched request ended.
///
/// The reserved codes only shape the process exit. A build that itself exits
/// 1, 2 or 124 is still [`BuildOutcome::Built`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
	/// The backend ran to completion.
	Built(ExitStatus),
	/// The backend could not be started or lost track of the build.
	BackendFailed,
	TimedOut,
	ProvisionFailed,
	/// The ref head could not be resolved.
	Unresolved,
}

impl BuildOutcome {
	pub fn status(self) -> ExitStatus {
		match self {
			Self::Built(status) => status,
			Self::BackendFailed | Self::Unresolved => ExitStatus::FAILURE,
			Self::TimedOut => ExitStatus::TIMEOUT,
			Self::ProvisionFailed => ExitStatus::PROVISION_FAILED,
		}
	}

	pub fn is_success(self) -> bool {
		matches!(self, Self::Built(status) if status.is_success())
	}
}

impl fmt::Display for BuildOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Built(status) => write!(f, "exit {status}"),
			Self::BackendFailed => write!(f, "build backend failed (exit {})", ExitStatus::FAILURE),
			Self::TimedOut => write!(f, "timed out (exit {})", ExitStatus::TIMEOUT),
			Self::ProvisionFailed => write!(f, "provisioning failed (exit {})", ExitStatus::PROVISION_FAILED),
			Self::Unresolved => write!(f, "ref not resolved (exit {})", ExitStatus::FAILURE),
		}
	}
}

impl From<i32> for ExitStatus {
	fn from(code: i32) -> Self {
		Self(code)
	}
}

/// Per-request knobs on top of the dispatcher settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOverrides {
	/// Destroy the target environment before provisioning.
	pub clean: bool,
	/// Extra environment passed to the build backend.
	pub env: Vec<(String, String)>,
	/// Report commit statuses.
	pub statuses: bool,
	/// POST a signed result payload here when done.
	pub callback: Option<String>,
}

/// One build. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
	pub repo: TrackedRepository,
	pub kind: RefKind,
	/// Branch name or pull request number.
	pub ref_id: String,
	/// Resolved from the remote when absent.
	pub fingerprint: Option<Fingerprint>,
	pub target: BuildTarget,
	pub overrides: BuildOverrides,
}

impl BuildRequest {
	pub fn new(repo: TrackedRepository, kind: RefKind, ref_id: impl Into<String>, target: BuildTarget) -> Self {
		Self {
			repo,
			kind,
			ref_id: ref_id.into(),
			fingerprint: None,
			target,
			overrides: BuildOverrides::default(),
		}
	}

	pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
		self.fingerprint = Some(fingerprint);
		self
	}

	pub fn with_overrides(mut self, overrides: BuildOverrides) -> Self {
		self.overrides = overrides;
		self
	}
}

/// Parses `KEY=VALUE` pairs separated by whitespace. Tokens without `=` are
/// rejected.
pub fn parse_env_overrides(raw: &str) -> Result<Vec<(String, String)>, String> {
	raw.split_whitespace()
		.map(|pair| match pair.split_once('=') {
			Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
			_ => Err(format!("expected KEY=VALUE, got {pair:?}")),
		})
		.collect()
}
