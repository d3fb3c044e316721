// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry with exponential backoff for transient HTTP failures.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

/// Errors that know whether repeating the request could succeed.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		match self.status() {
			Some(status) => status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
			None => self.is_request(),
		}
	}
}

/// Backoff parameters for [`retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total attempts, including the first one.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	/// Adds up to 25% random jitter to every delay.
	pub jitter: bool,
	/// Statuses callers should map to retryable errors.
	pub retryable_statuses: Vec<StatusCode>,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(10),
			backoff_factor: 2.0,
			jitter: true,
			retryable_statuses: vec![
				StatusCode::TOO_MANY_REQUESTS,
				StatusCode::REQUEST_TIMEOUT,
				StatusCode::BAD_GATEWAY,
				StatusCode::SERVICE_UNAVAILABLE,
				StatusCode::GATEWAY_TIMEOUT,
			],
		}
	}
}

impl RetryConfig {
	/// Delay before retry number `attempt` (1-based), without jitter.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let exp = self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
		let delay = self.base_delay.mul_f64(exp);
		delay.min(self.max_delay)
	}

	pub fn is_retryable_status(&self, status: StatusCode) -> bool {
		self.retryable_statuses.contains(&status)
	}
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is exhausted. The last error is returned.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
	E: RetryableError + std::fmt::Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let mut attempt = 1;
	loop {
		match operation().await {
			Ok(value) => return Ok(value),
			Err(err) if attempt < config.max_attempts && err.is_retryable() => {
				let mut delay = config.delay_for(attempt);
				if config.jitter {
					delay += delay.mul_f64(fastrand::f64() * 0.25);
				}
				warn!(
					attempt,
					max_attempts = config.max_attempts,
					delay_ms = delay.as_millis() as u64,
					error = %err,
					"retrying after transient error"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
			Err(err) => {
				debug!(attempt, error = %err, "giving up");
				return Err(err);
			}
		}
	}
}
