// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Errors raised when building naming inputs from untrusted strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamingError {
	#[error("invalid fingerprint '{0}': expected a hexadecimal commit hash")]
	InvalidFingerprint(String),

	#[error("invalid repository short name '{0}': expected [a-z0-9]+")]
	InvalidShortName(String),

	#[error("invalid repository remote '{0}': expected owner/name")]
	InvalidRemote(String),
}
