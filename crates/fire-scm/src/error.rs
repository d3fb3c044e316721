// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the remote ref source.

use fire_common_http::RetryableError;
use thiserror::Error;

/// Result type alias for SCM operations.
pub type ScmResult<T> = Result<T, ScmError>;

/// Errors from querying or updating the remote source host.
#[derive(Debug, Error)]
pub enum ScmError {
	/// Network-level error during HTTP communication.
	#[error("network error: {0}")]
	Network(#[from] reqwest::Error),

	#[error("unauthorized")]
	Unauthorized,

	#[error("rate limit exceeded")]
	RateLimited,

	#[error("not found: {0}")]
	NotFound(String),

	#[error("API error: {status} - {message}")]
	ApiError { status: u16, message: String },

	#[error("invalid response: {0}")]
	InvalidResponse(String),

	#[error("invalid URL: {0}")]
	InvalidUrl(String),
}

impl RetryableError for ScmError {
	fn is_retryable(&self) -> bool {
		match self {
			ScmError::Network(e) => e.is_retryable(),
			ScmError::RateLimited => true,
			ScmError::ApiError { status, .. } => *status >= 500,
			_ => false,
		}
	}
}

impl ScmError {
	pub fn api_error(status: u16, message: impl Into<String>) -> Self {
		Self::ApiError {
			status,
			message: message.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn server_errors_are_retryable() {
		assert!(ScmError::api_error(502, "bad gateway").is_retryable());
		assert!(ScmError::RateLimited.is_retryable());
		assert!(!ScmError::api_error(422, "invalid").is_retryable());
		assert!(!ScmError::Unauthorized.is_retryable());
		assert!(!ScmError::NotFound("x".into()).is_retryable());
	}
}
