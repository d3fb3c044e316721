// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment provisioning.
//!
//! Templates are built once in a scratch environment and copied into place.
//! Build environments are copy-on-write clones of the newest template.

mod error;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
mod pipeline;
mod seeder;
mod stage;

pub use error::{ProvisionError, ProvisionResult, SeedError, StageError};
pub use pipeline::{Expose, ProvisionRequest, ProvisionSettings, Provisioned, Provisioner, TMP_SUFFIX};
pub use seeder::{CommandSeeder, DryRunSeeder, SeedAction, TemplateSeeder};
pub use stage::{ProvisionStage, StageTracker};
