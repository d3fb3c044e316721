// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors from container runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
	#[error("{tool} not found in PATH")]
	NotInstalled { tool: String },

	#[error("{cmd} {} failed (exit {code:?}): {stderr}", args.join(" "))]
	CommandFailed {
		cmd: String,
		args: Vec<String>,
		code: Option<i32>,
		stderr: String,
	},

	#[error("environment not found: {name}")]
	NotFound { name: String },

	#[error("environment already exists: {name}")]
	AlreadyExists { name: String },

	#[error("invalid environment name: {name:?}")]
	InvalidName { name: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl RuntimeError {
	/// Whether the error means the environment was never there.
	pub fn is_not_found(&self) -> bool {
		matches!(self, RuntimeError::NotFound { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn command_failed_display_includes_args() {
		let err = RuntimeError::CommandFailed {
			cmd: "lxc-destroy".to_string(),
			args: vec!["-f".to_string(), "-n".to_string(), "sd-x".to_string()],
			code: Some(1),
			stderr: "busy".to_string(),
		};
		assert_eq!(err.to_string(), "lxc-destroy -f -n sd-x failed (exit Some(1)): busy");
	}

	#[test]
	fn not_found_predicate() {
		assert!(RuntimeError::NotFound { name: "x".into() }.is_not_found());
		assert!(!RuntimeError::InvalidName { name: "x".into() }.is_not_found());
	}
}
