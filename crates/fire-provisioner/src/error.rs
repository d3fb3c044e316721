// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use fire_proxy::ProxyError;
use fire_runtime::RuntimeError;
use thiserror::Error;

use crate::stage::ProvisionStage;

/// Errors from the template seeder.
#[derive(Error, Debug)]
pub enum SeedError {
	#[error("seed command {program} not found")]
	NotInstalled { program: String },

	#[error("seeding {name} ({action}) exited with {code:?}")]
	Failed {
		name: String,
		action: String,
		code: Option<i32>,
	},

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// What went wrong inside a stage.
#[derive(Error, Debug)]
pub enum StageError {
	#[error(transparent)]
	Runtime(#[from] RuntimeError),

	#[error(transparent)]
	Seed(#[from] SeedError),

	#[error("certificate issuance failed: {0}")]
	Certificate(#[from] ProxyError),

	#[error("{name} got no address within {secs}s")]
	AddressTimeout { name: String, secs: u64 },

	#[error("template {name} does not exist")]
	MissingTemplate { name: String },
}

/// A provisioning request that ended in `failed`.
#[derive(Error, Debug)]
#[error("provisioning {name} failed after {reached}: {source}")]
pub struct ProvisionError {
	pub name: String,
	/// Last stage completed before the failure.
	pub reached: ProvisionStage,
	#[source]
	pub source: StageError,
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn provision_error_names_stage() {
		let err = ProvisionError {
			name: "sd-x".to_string(),
			reached: ProvisionStage::DataReady,
			source: StageError::MissingTemplate {
				name: "fire--data".to_string(),
			},
		};
		assert_eq!(
			err.to_string(),
			"provisioning sd-x failed after data-ready: template fire--data does not exist"
		);
	}
}
