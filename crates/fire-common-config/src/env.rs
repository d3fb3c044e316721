// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Loading secrets from the environment.

use std::path::PathBuf;

use tracing::debug;

use crate::secret::SecretString;

/// Errors raised while loading a secret from the environment.
#[derive(Debug, thiserror::Error)]
pub enum SecretEnvError {
	#[error("both {name} and {name}_FILE are set; use only one")]
	Ambiguous { name: String },

	#[error("failed to read secret file {path} (from {name}_FILE): {source}")]
	FileRead {
		name: String,
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Loads a secret from `name`, or from the file named by `{name}_FILE`.
///
/// Returns `Ok(None)` when neither variable is set or the value is empty.
/// File contents are trimmed of trailing newlines.
pub fn load_secret_env(name: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let direct = std::env::var(name).ok().filter(|v| !v.is_empty());
	let file_var = format!("{name}_FILE");
	let file = std::env::var(&file_var).ok().filter(|v| !v.is_empty());

	match (direct, file) {
		(Some(_), Some(_)) => Err(SecretEnvError::Ambiguous {
			name: name.to_string(),
		}),
		(Some(value), None) => {
			debug!(var = name, "loaded secret from environment");
			Ok(Some(SecretString::new(value)))
		}
		(None, Some(path)) => {
			let path = PathBuf::from(path);
			let content = std::fs::read_to_string(&path).map_err(|source| SecretEnvError::FileRead {
				name: name.to_string(),
				path: path.clone(),
				source,
			})?;
			debug!(var = %file_var, path = %path.display(), "loaded secret from file");
			let value = content.trim_end_matches(['\n', '\r']).to_string();
			if value.is_empty() {
				Ok(None)
			} else {
				Ok(Some(SecretString::new(value)))
			}
		}
		(None, None) => Ok(None),
	}
}
