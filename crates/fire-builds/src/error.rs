// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use fire_common_http::RetryableError;
use fire_runtime::RuntimeError;
use thiserror::Error;

/// The backend could not run a target at all.
#[derive(Error, Debug)]
pub enum BuildError {
	#[error(transparent)]
	Runtime(#[from] RuntimeError),

	#[error("build command {program} not found")]
	NotInstalled { program: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

pub type BuildResult<T> = Result<T, BuildError>;

/// Callback and restart delivery failures. Logged, never fatal to a build.
#[derive(Error, Debug)]
pub enum NotifyError {
	#[error("network error: {0}")]
	Network(#[from] reqwest::Error),

	#[error("{url} answered {status}")]
	Status { url: String, status: u16 },

	#[error("invalid url {0}")]
	InvalidUrl(String),

	#[error("failed to encode payload: {0}")]
	Encode(#[from] serde_json::Error),
}

impl RetryableError for NotifyError {
	fn is_retryable(&self) -> bool {
		match self {
			Self::Network(e) => e.is_retryable(),
			Self::Status { status, .. } => *status >= 500 || *status == 429,
			Self::InvalidUrl(_) | Self::Encode(_) => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn server_errors_are_retryable() {
		let err = NotifyError::Status {
			url: "http://x".to_string(),
			status: 503,
		};
		assert!(err.is_retryable());
		let err = NotifyError::Status {
			url: "http://x".to_string(),
			status: 404,
		};
		assert!(!err.is_retryable());
	}
}
