// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub REST implementation of [`RefSource`] and [`StatusSink`].

use std::time::Duration;

use async_trait::async_trait;
use fire_common_config::SecretString;
use fire_common_http::RetryConfig;
use fire_naming::{Fingerprint, Ref, RefKind, TrackedRepository};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{ScmError, ScmResult};
use crate::source::{RefSource, StatusReport, StatusSink};

const PER_PAGE: &str = "100";
/// Upper bound on followed `next` links per listing.
const MAX_PAGES: usize = 50;

#[derive(Debug, Deserialize)]
struct BranchItem {
	name: String,
	commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
	sha: String,
}

#[derive(Debug, Deserialize)]
struct PullItem {
	number: u64,
	head: CommitRef,
}

/// Client for the GitHub REST API.
#[derive(Clone)]
pub struct GitHubClient {
	http: reqwest::Client,
	api_url: Url,
	token: Option<SecretString>,
	retry_config: RetryConfig,
}

impl GitHubClient {
	pub fn new(api_url: &str, timeout: Duration) -> ScmResult<Self> {
		let api_url = Url::parse(api_url).map_err(|e| ScmError::InvalidUrl(e.to_string()))?;
		Ok(Self {
			http: fire_common_http::new_client_with_timeout(timeout),
			api_url,
			token: None,
			retry_config: RetryConfig::default(),
		})
	}

	pub fn with_token(mut self, token: Option<SecretString>) -> Self {
		self.token = token;
		self
	}

	pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
		self.retry_config = config;
		self
	}

	fn repo_url(&self, repo: &TrackedRepository, segments: &[&str]) -> ScmResult<Url> {
		let (owner, name) = repo
			.remote
			.split_once('/')
			.ok_or_else(|| ScmError::InvalidUrl(repo.remote.clone()))?;
		let mut url = self.api_url.clone();
		url.path_segments_mut()
			.map_err(|_| ScmError::InvalidUrl(self.api_url.to_string()))?
			.pop_if_empty()
			.extend(["repos", owner, name])
			.extend(segments);
		Ok(url)
	}

	fn apply_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
		let req = req
			.header(ACCEPT, "application/vnd.github+json")
			.header("X-GitHub-Api-Version", "2022-11-28");
		match &self.token {
			Some(token) => req.header(AUTHORIZATION, format!("Bearer {}", token.expose())),
			None => req,
		}
	}

	/// Sends a request built by `build`, retrying transient failures, and
	/// maps error statuses.
	async fn send<F>(&self, build: F) -> ScmResult<reqwest::Response>
	where
		F: Fn() -> reqwest::RequestBuilder,
	{
		fire_common_http::retry(&self.retry_config, || async {
			let response = self.apply_headers(build()).send().await?;
			check_status(response).await
		})
		.await
	}

	async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ScmResult<T> {
		let response = self.send(|| self.http.get(url.clone())).await?;
		response
			.json()
			.await
			.map_err(|e| ScmError::InvalidResponse(e.to_string()))
	}

	/// Fetches every page of a listing, following `Link: rel="next"`.
	async fn get_all<T: DeserializeOwned>(&self, mut url: Url) -> ScmResult<Vec<T>> {
		url.query_pairs_mut().append_pair("per_page", PER_PAGE);
		let mut items = Vec::new();
		let mut next = Some(url);
		let mut pages = 0;

		while let Some(url) = next.take() {
			pages += 1;
			if pages > MAX_PAGES {
				return Err(ScmError::InvalidResponse(format!(
					"listing exceeded {MAX_PAGES} pages"
				)));
			}
			let response = self.send(|| self.http.get(url.clone())).await?;
			next = next_link(response.headers())
				.map(|link| Url::parse(&link).map_err(|e| ScmError::InvalidResponse(e.to_string())))
				.transpose()?;
			let page: Vec<T> = response
				.json()
				.await
				.map_err(|e| ScmError::InvalidResponse(e.to_string()))?;
			debug!(url = %url, count = page.len(), "fetched page");
			items.extend(page);
		}

		Ok(items)
	}
}

async fn check_status(response: reqwest::Response) -> ScmResult<reqwest::Response> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}
	let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
		|| (status == StatusCode::FORBIDDEN
			&& response
				.headers()
				.get("x-ratelimit-remaining")
				.is_some_and(|v| v == "0"));
	let message = response.text().await.unwrap_or_default();
	Err(match status {
		_ if rate_limited => ScmError::RateLimited,
		StatusCode::UNAUTHORIZED => ScmError::Unauthorized,
		StatusCode::NOT_FOUND => ScmError::NotFound(message),
		_ => ScmError::api_error(status.as_u16(), message),
	})
}

/// The `rel="next"` target of a `Link` header.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
	let link = headers.get(LINK)?.to_str().ok()?;
	link.split(',').find_map(|part| {
		let (target, params) = part.split_once(';')?;
		let is_next = params
			.split(';')
			.any(|p| p.trim().replace(' ', "") == "rel=\"next\"");
		is_next.then(|| {
			target
				.trim()
				.trim_start_matches('<')
				.trim_end_matches('>')
				.to_string()
		})
	})
}

fn fingerprint(sha: &str) -> ScmResult<Fingerprint> {
	Fingerprint::new(sha).map_err(|e| ScmError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl RefSource for GitHubClient {
	#[instrument(skip(self, repo), fields(repo = %repo.remote))]
	async fn list_branches(&self, repo: &TrackedRepository) -> ScmResult<Vec<Ref>> {
		let url = self.repo_url(repo, &["branches"])?;
		let items: Vec<BranchItem> = self.get_all(url).await?;
		let refs = items
			.into_iter()
			.map(|b| Ok(Ref::branch(b.name, fingerprint(&b.commit.sha)?)))
			.collect::<ScmResult<Vec<_>>>()?;
		debug!(count = refs.len(), "listed branches");
		Ok(refs)
	}

	#[instrument(skip(self, repo), fields(repo = %repo.remote))]
	async fn list_open_requests(&self, repo: &TrackedRepository) -> ScmResult<Vec<Ref>> {
		let mut url = self.repo_url(repo, &["pulls"])?;
		url.query_pairs_mut().append_pair("state", "open");
		let items: Vec<PullItem> = self.get_all(url).await?;
		let refs = items
			.into_iter()
			.map(|p| Ok(Ref::pull_request(p.number, fingerprint(&p.head.sha)?)))
			.collect::<ScmResult<Vec<_>>>()?;
		debug!(count = refs.len(), "listed open pull requests");
		Ok(refs)
	}

	#[instrument(skip(self, repo), fields(repo = %repo.remote))]
	async fn resolve_head(&self, repo: &TrackedRepository, kind: RefKind, id: &str) -> ScmResult<Fingerprint> {
		let sha = match kind {
			RefKind::Branch => {
				let url = self.repo_url(repo, &["branches", id])?;
				let branch: BranchItem = self.get_json(url).await?;
				branch.commit.sha
			}
			RefKind::PullRequest => {
				let url = self.repo_url(repo, &["pulls", id])?;
				let pull: PullItem = self.get_json(url).await?;
				pull.head.sha
			}
		};
		fingerprint(&sha)
	}
}

#[async_trait]
impl StatusSink for GitHubClient {
	#[instrument(skip(self, repo, status), fields(repo = %repo.remote, state = %status.state))]
	async fn report(&self, repo: &TrackedRepository, fingerprint: &Fingerprint, status: &StatusReport) -> ScmResult<()> {
		let url = self.repo_url(repo, &["statuses", fingerprint.as_str()])?;
		self.send(|| self.http.post(url.clone()).json(status)).await?;
		info!(sha = %fingerprint, context = %status.context, "reported commit status");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::source::CommitState;
	use reqwest::header::HeaderValue;
	use serde_json::json;
	use wiremock::matchers::{body_partial_json, header, method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const SHA: &str = "abcdef1234567890abcdef1234567890abcdef12";

	fn repo() -> TrackedRepository {
		TrackedRepository::new("sd", "superdesk/superdesk").unwrap()
	}

	fn client(server: &MockServer) -> GitHubClient {
		GitHubClient::new(&server.uri(), Duration::from_secs(5))
			.unwrap()
			.with_retry_config(RetryConfig {
				max_attempts: 2,
				base_delay: Duration::from_millis(1),
				max_delay: Duration::from_millis(1),
				jitter: false,
				..Default::default()
			})
	}

	#[test]
	fn next_link_parsing() {
		let mut headers = HeaderMap::new();
		headers.insert(
			LINK,
			HeaderValue::from_static(
				r#"<https://api.github.com/x?page=2>; rel="next", <https://api.github.com/x?page=5>; rel="last""#,
			),
		);
		assert_eq!(next_link(&headers).as_deref(), Some("https://api.github.com/x?page=2"));

		headers.insert(LINK, HeaderValue::from_static(r#"<https://api.github.com/x?page=1>; rel="prev""#));
		assert_eq!(next_link(&headers), None);
		assert_eq!(next_link(&HeaderMap::new()), None);
	}

	#[test]
	fn repo_url_keeps_api_prefix_and_escapes_segments() {
		let client = GitHubClient::new("https://ghe.example.com/api/v3", Duration::from_secs(1)).unwrap();
		let url = client.repo_url(&repo(), &["branches", "feature/x"]).unwrap();
		assert_eq!(
			url.as_str(),
			"https://ghe.example.com/api/v3/repos/superdesk/superdesk/branches/feature%2Fx"
		);
	}

	#[tokio::test]
	async fn list_branches_follows_pagination() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/superdesk/superdesk/branches"))
			.and(query_param("per_page", "100"))
			.respond_with(
				ResponseTemplate::new(200)
					.insert_header(
						"link",
						format!("<{}/repos/superdesk/superdesk/branches?page=2>; rel=\"next\"", server.uri()).as_str(),
					)
					.set_body_json(json!([{"name": "master", "commit": {"sha": SHA}}])),
			)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/repos/superdesk/superdesk/branches"))
			.and(query_param("page", "2"))
			.respond_with(
				ResponseTemplate::new(200).set_body_json(json!([{"name": "feature/x", "commit": {"sha": SHA}}])),
			)
			.mount(&server)
			.await;

		let refs = client(&server).list_branches(&repo()).await.unwrap();
		let ids: Vec<&str> = refs.iter().map(|r| r.id.as_str()).collect();
		assert_eq!(ids, vec!["master", "feature/x"]);
		assert!(refs.iter().all(|r| r.kind == RefKind::Branch));
	}

	#[tokio::test]
	async fn list_open_requests_maps_numbers() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/superdesk/superdesk/pulls"))
			.and(query_param("state", "open"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!([{"number": 42, "head": {"sha": SHA}}])))
			.mount(&server)
			.await;

		let refs = client(&server).list_open_requests(&repo()).await.unwrap();
		assert_eq!(refs, vec![Ref::pull_request(42, Fingerprint::new(SHA).unwrap())]);
	}

	#[tokio::test]
	async fn resolve_head_of_branch() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/superdesk/superdesk/branches/feature%2Fx"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "feature/x", "commit": {"sha": SHA}})))
			.mount(&server)
			.await;

		let fp = client(&server)
			.resolve_head(&repo(), RefKind::Branch, "feature/x")
			.await
			.unwrap();
		assert_eq!(fp.as_str(), SHA);
	}

	#[tokio::test]
	async fn server_errors_are_retried_then_reported() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/superdesk/superdesk/branches"))
			.respond_with(ResponseTemplate::new(502))
			.expect(2)
			.mount(&server)
			.await;

		let err = client(&server).list_branches(&repo()).await.unwrap_err();
		assert!(matches!(err, ScmError::ApiError { status: 502, .. }));
	}

	#[tokio::test]
	async fn unauthorized_is_not_retried() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/superdesk/superdesk/pulls"))
			.respond_with(ResponseTemplate::new(401))
			.expect(1)
			.mount(&server)
			.await;

		let err = client(&server).list_open_requests(&repo()).await.unwrap_err();
		assert!(matches!(err, ScmError::Unauthorized));
	}

	#[tokio::test]
	async fn report_posts_status_with_token() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(format!("/repos/superdesk/superdesk/statuses/{SHA}")))
			.and(header("authorization", "Bearer t0ken"))
			.and(body_partial_json(json!({"state": "success", "context": "fire"})))
			.respond_with(ResponseTemplate::new(201))
			.expect(1)
			.mount(&server)
			.await;

		let client = client(&server).with_token(Some(SecretString::new("t0ken".to_string())));
		let report = StatusReport {
			state: CommitState::Success,
			context: "fire".to_string(),
			description: Some("checks passed".to_string()),
			target_url: None,
		};
		client
			.report(&repo(), &Fingerprint::new(SHA).unwrap(), &report)
			.await
			.unwrap();
	}
}
