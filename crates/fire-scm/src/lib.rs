// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Remote source host integration for fire.
//!
//! [`RefSource`] answers which branches and pull requests exist and where
//! they point; [`StatusSink`] receives commit statuses. [`GitHubClient`]
//! implements both against the GitHub REST API.

mod dry_run;
mod error;
mod github;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
mod source;

pub use dry_run::DryRunStatusSink;
pub use error::{ScmError, ScmResult};
pub use github::{next_link, GitHubClient};
pub use source::{CommitState, RefSource, StatusReport, StatusSink};
