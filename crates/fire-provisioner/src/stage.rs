// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress of one provisioning request.
///
/// `Init -> BaseReady -> DataReady -> Cloned -> (Exposed) -> Ready`, with
/// `Failed` reachable from every non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionStage {
	Init,
	BaseReady,
	DataReady,
	Cloned,
	Exposed,
	Ready,
	Failed,
}

impl ProvisionStage {
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Ready | Self::Failed)
	}

	pub fn can_advance_to(self, next: ProvisionStage) -> bool {
		use ProvisionStage::*;
		match (self, next) {
			(from, Failed) => !from.is_terminal(),
			(Init, BaseReady)
			| (BaseReady, DataReady)
			| (DataReady, Cloned)
			| (Cloned, Exposed)
			| (Cloned, Ready)
			| (Exposed, Ready) => true,
			_ => false,
		}
	}
}

impl fmt::Display for ProvisionStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Init => "init",
			Self::BaseReady => "base-ready",
			Self::DataReady => "data-ready",
			Self::Cloned => "cloned",
			Self::Exposed => "exposed",
			Self::Ready => "ready",
			Self::Failed => "failed",
		};
		f.write_str(s)
	}
}

/// Stage history of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTracker {
	history: Vec<ProvisionStage>,
}

impl StageTracker {
	pub fn new() -> Self {
		Self {
			history: vec![ProvisionStage::Init],
		}
	}

	pub fn current(&self) -> ProvisionStage {
		self.history
			.last()
			.copied()
			.unwrap_or(ProvisionStage::Init)
	}

	/// Moves to `next`. Returns false (and stays put) on an illegal move.
	pub fn advance(&mut self, next: ProvisionStage) -> bool {
		if self.current().can_advance_to(next) {
			self.history.push(next);
			true
		} else {
			false
		}
	}

	pub fn history(&self) -> &[ProvisionStage] {
		&self.history
	}
}

impl Default for StageTracker {
	fn default() -> Self {
		Self::new()
	}
}
