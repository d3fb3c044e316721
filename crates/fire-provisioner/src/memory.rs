// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Recording seeder for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SeedError;
use crate::seeder::{SeedAction, TemplateSeeder};

#[derive(Debug, Clone, Default)]
pub struct RecordingSeeder {
	seeded: Arc<Mutex<Vec<(String, SeedAction)>>>,
	fail: Arc<AtomicBool>,
	delay: Arc<Mutex<Option<Duration>>>,
}

impl RecordingSeeder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_failing(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	/// Every seed sleeps this long first.
	pub fn set_delay(&self, delay: Duration) {
		*self.delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
	}

	/// `(environment, action)` per successful seed.
	pub fn seeded(&self) -> Vec<(String, SeedAction)> {
		self.seeded.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}
}

#[async_trait]
impl TemplateSeeder for RecordingSeeder {
	async fn seed(&self, environment: &str, _address: &str, action: SeedAction) -> Result<(), SeedError> {
		let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		if self.fail.load(Ordering::SeqCst) {
			return Err(SeedError::Failed {
				name: environment.to_string(),
				action: action.to_string(),
				code: Some(1),
			});
		}
		self.seeded
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push((environment.to_string(), action));
		Ok(())
	}
}
