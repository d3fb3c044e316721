// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use fire_naming::{Fingerprint, TrackedRepository};
use tracing::info;

use crate::error::ScmResult;
use crate::source::{StatusReport, StatusSink};

/// Logs status reports instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunStatusSink;

#[async_trait]
impl StatusSink for DryRunStatusSink {
	async fn report(&self, repo: &TrackedRepository, fingerprint: &Fingerprint, status: &StatusReport) -> ScmResult<()> {
		info!(
			repo = %repo.remote,
			sha = %fingerprint,
			state = %status.state,
			context = %status.context,
			dry_run = true,
			"would report commit status"
		);
		Ok(())
	}
}
