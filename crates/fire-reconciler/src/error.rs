// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use fire_proxy::ProxyError;
use fire_runtime::RuntimeError;
use fire_scm::ScmError;
use thiserror::Error;

/// Aborts a whole cycle. Nothing has been destroyed when this is returned.
#[derive(Error, Debug)]
pub enum ReconcileError {
	#[error("failed to list environments: {0}")]
	ListEnvironments(#[source] RuntimeError),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// A repository whose refs could not be queried this cycle.
#[derive(Error, Debug)]
#[error("{short_name}: {source}")]
pub struct SkippedRepository {
	pub short_name: String,
	#[source]
	pub source: ScmError,
}

/// A non-fatal failure recorded in the cycle report.
#[derive(Error, Debug)]
pub enum CycleFailure {
	#[error("failed to destroy {name}: {source}")]
	Destroy {
		name: String,
		#[source]
		source: RuntimeError,
	},

	#[error("failed to update routes: {0}")]
	Routes(#[source] ProxyError),
}
