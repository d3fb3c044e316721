// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Container runtime abstraction for fire environments.
//!
//! [`ContainerRuntime`] is implemented by [`LxcRuntime`] (the `lxc-*` tools),
//! by [`DryRunRuntime`] which logs mutations instead of performing them, and,
//! behind the `testing` feature, by an in-memory fake.

mod dry_run;
mod error;
mod lxc;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
mod runtime;

pub use dry_run::{DryRunRuntime, DRY_RUN_ADDRESS};
pub use error::{RuntimeError, RuntimeResult};
pub use lxc::LxcRuntime;
pub use runtime::{
	running_environments, validate_name, CloneOptions, ContainerRuntime, CreateSpec, Environment,
	EnvironmentState,
};
