// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build dispatch for fire.
//!
//! A [`Dispatcher`] turns a [`BuildRequest`] into an [`ExitStatus`]: it
//! resolves the ref head, provisions the build or preview environment, runs
//! the target through a [`BuildBackend`] under a timeout and reports the
//! result as a commit status and an optional signed callback.

mod backend;
mod delivery;
mod dispatcher;
mod error;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
mod notify;
mod target;

pub use backend::{BuildBackend, ContainerBackend, DryRunBackend, RunOptions};
pub use delivery::{DeliveryError, StoredDelivery, REQUEST_FILE};
pub use dispatcher::{DispatchSettings, Dispatcher};
pub use error::{BuildError, BuildResult, NotifyError};
pub use notify::{
	notification, request_restart, restart_url, BuildNotification, CallbackNotifier, DryRunNotifier, HttpNotifier,
};
pub use target::{parse_env_overrides, BuildOutcome, BuildOverrides, BuildRequest, BuildTarget, ExitStatus};
