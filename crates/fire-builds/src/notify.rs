// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signed build callbacks and controller restart requests.

use std::time::Duration;

use async_trait::async_trait;
use fire_common_config::SecretString;
use fire_common_http::RetryConfig;
use fire_common_webhook::{signature_header_value, SIGNATURE_HEADER};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::NotifyError;
use crate::target::{BuildTarget, ExitStatus};

/// JSON body of a build callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildNotification {
	/// `owner/name` of the repository.
	pub repo: String,
	#[serde(rename = "ref")]
	pub ref_id: String,
	pub sha: String,
	pub target: BuildTarget,
	pub environment: String,
	pub exit_code: i32,
	pub success: bool,
}

#[async_trait]
pub trait CallbackNotifier: Send + Sync {
	async fn notify(&self, url: &str, payload: &BuildNotification) -> Result<(), NotifyError>;
}

/// POSTs callbacks, signed with `X-Hub-Signature-256` when a secret is set.
#[derive(Clone)]
pub struct HttpNotifier {
	http: reqwest::Client,
	secret: Option<SecretString>,
	retry_config: RetryConfig,
}

impl HttpNotifier {
	pub fn new(timeout: Duration) -> Self {
		Self {
			http: fire_common_http::new_client_with_timeout(timeout),
			secret: None,
			retry_config: RetryConfig::default(),
		}
	}

	pub fn with_secret(mut self, secret: Option<SecretString>) -> Self {
		self.secret = secret;
		self
	}

	pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
		self.retry_config = retry_config;
		self
	}

	/// POSTs `body` verbatim, adding the signature header when a secret is set.
	pub async fn post_signed(&self, url: &str, body: Vec<u8>, headers: &[(String, String)]) -> Result<u16, NotifyError> {
		Url::parse(url).map_err(|e| NotifyError::InvalidUrl(format!("{url}: {e}")))?;
		let signature = self
			.secret
			.as_ref()
			.map(|secret| signature_header_value(secret.expose().as_bytes(), &body));

		fire_common_http::retry(&self.retry_config, || async {
			let mut req = self.http.post(url).header(CONTENT_TYPE, "application/json");
			for (name, value) in headers {
				req = req.header(name.as_str(), value.as_str());
			}
			if let Some(signature) = &signature {
				req = req.header(SIGNATURE_HEADER, signature.as_str());
			}
			let response = req.body(body.clone()).send().await?;
			let status = response.status();
			if status.is_success() {
				Ok(status.as_u16())
			} else {
				Err(NotifyError::Status {
					url: url.to_string(),
					status: status.as_u16(),
				})
			}
		})
		.await
	}
}

#[async_trait]
impl CallbackNotifier for HttpNotifier {
	#[instrument(skip(self, payload), fields(environment = %payload.environment))]
	async fn notify(&self, url: &str, payload: &BuildNotification) -> Result<(), NotifyError> {
		let body = serde_json::to_vec(payload)?;
		let status = self.post_signed(url, body, &[]).await?;
		debug!(url, status, "callback delivered");
		Ok(())
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunNotifier;

#[async_trait]
impl CallbackNotifier for DryRunNotifier {
	async fn notify(&self, url: &str, payload: &BuildNotification) -> Result<(), NotifyError> {
		info!(url, environment = %payload.environment, exit_code = payload.exit_code, dry_run = true, "would send callback");
		Ok(())
	}
}

/// `<base>/<short_name>/<ref>/restart`, with the ref escaped as one segment.
pub fn restart_url(base_url: &str, short_name: &str, ref_id: &str) -> Result<Url, NotifyError> {
	let mut url = Url::parse(base_url).map_err(|e| NotifyError::InvalidUrl(format!("{base_url}: {e}")))?;
	url.path_segments_mut()
		.map_err(|_| NotifyError::InvalidUrl(base_url.to_string()))?
		.pop_if_empty()
		.extend([short_name, ref_id, "restart"]);
	Ok(url)
}

/// Asks a running controller to rebuild a ref instead of building locally.
pub async fn request_restart(
	http: &reqwest::Client,
	retry_config: &RetryConfig,
	base_url: &str,
	short_name: &str,
	ref_id: &str,
) -> Result<u16, NotifyError> {
	let url = restart_url(base_url, short_name, ref_id)?;
	info!(url = %url, "requesting rebuild");
	fire_common_http::retry(retry_config, || async {
		let response = http.get(url.clone()).send().await?;
		let status = response.status();
		if status.is_success() {
			Ok(status.as_u16())
		} else {
			Err(NotifyError::Status {
				url: url.to_string(),
				status: status.as_u16(),
			})
		}
	})
	.await
}

/// The callback payload for a finished build.
pub fn notification(
	repo: &str,
	ref_id: &str,
	sha: &str,
	target: BuildTarget,
	environment: &str,
	status: ExitStatus,
) -> BuildNotification {
	BuildNotification {
		repo: repo.to_string(),
		ref_id: ref_id.to_string(),
		sha: sha.to_string(),
		target,
		environment: environment.to_string(),
		exit_code: status.code(),
		success: status.is_success(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fire_common_webhook::verify_signature_header;
	use wiremock::matchers::{header_exists, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn fast_retry() -> RetryConfig {
		RetryConfig {
			max_attempts: 2,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(2),
			jitter: false,
			..Default::default()
		}
	}

	fn payload() -> BuildNotification {
		notification(
			"superdesk/superdesk",
			"master",
			"0123456789abcdef",
			BuildTarget::Full,
			"sd-master",
			ExitStatus::SUCCESS,
		)
	}

	#[tokio::test]
	async fn callback_is_signed() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/hook"))
			.and(header_exists(SIGNATURE_HEADER))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let notifier = HttpNotifier::new(Duration::from_secs(5))
			.with_secret(Some(SecretString::new("s3cret".to_string())))
			.with_retry_config(fast_retry());
		notifier
			.notify(&format!("{}/hook", server.uri()), &payload())
			.await
			.unwrap();

		let requests = server.received_requests().await.unwrap();
		let request = &requests[0];
		let signature = request
			.headers
			.get(SIGNATURE_HEADER)
			.and_then(|v| v.to_str().ok())
			.unwrap();
		assert!(verify_signature_header(b"s3cret", &request.body, signature));
		let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
		assert_eq!(body["ref"], "master");
		assert_eq!(body["target"], "full");
		assert_eq!(body["success"], true);
	}

	#[tokio::test]
	async fn callback_failure_is_reported() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(404))
			.mount(&server)
			.await;

		let notifier = HttpNotifier::new(Duration::from_secs(5)).with_retry_config(fast_retry());
		let err = notifier.notify(&server.uri(), &payload()).await.unwrap_err();
		assert!(matches!(err, NotifyError::Status { status: 404, .. }));
	}

	#[tokio::test]
	async fn invalid_callback_url() {
		let notifier = HttpNotifier::new(Duration::from_secs(5));
		let err = notifier.notify("not a url", &payload()).await.unwrap_err();
		assert!(matches!(err, NotifyError::InvalidUrl(_)));
	}

	#[test]
	fn restart_url_escapes_ref() {
		let url = restart_url("https://fire.test.superdesk.org", "sd", "feature/x").unwrap();
		assert_eq!(url.as_str(), "https://fire.test.superdesk.org/sd/feature%2Fx/restart");

		let url = restart_url("https://fire.example.org/api/", "sdpr", "12").unwrap();
		assert_eq!(url.as_str(), "https://fire.example.org/api/sdpr/12/restart");
	}

	#[tokio::test]
	async fn restart_hits_controller() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/sd/master/restart"))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let status = request_restart(&reqwest::Client::new(), &fast_retry(), &server.uri(), "sd", "master")
			.await
			.unwrap();
		assert_eq!(status, 200);
	}
}
