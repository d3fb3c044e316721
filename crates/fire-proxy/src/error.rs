// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use fire_runtime::RuntimeError;
use thiserror::Error;

/// Result type alias for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Problems found while rendering. Nothing has been written when one occurs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
	#[error("unknown placeholder {{{0}}} in route template")]
	UnknownPlaceholder(String),

	#[error("environment {0} has no address")]
	MissingAddress(String),

	#[error("proxy domain is empty")]
	EmptyDomain,
}

#[derive(Error, Debug)]
pub enum ProxyError {
	#[error("render failed: {0}")]
	Render(#[from] RenderError),

	#[error("failed to read route template {path}: {source}")]
	TemplateRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to write {path}: {source}")]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to lock {path}: {source}")]
	Lock {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("{tool} not found in PATH")]
	NotInstalled { tool: String },

	#[error("{tool} failed (exit {code:?}): {stderr}")]
	CommandFailed {
		tool: String,
		code: Option<i32>,
		stderr: String,
	},

	#[error("listing running environments failed: {0}")]
	Runtime(#[from] RuntimeError),

	#[error("background task failed: {0}")]
	Join(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}
