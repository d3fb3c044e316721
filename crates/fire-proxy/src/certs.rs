// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::command::run;
use crate::error::ProxyResult;

/// Obtains TLS certificates for a set of hostnames.
#[async_trait]
pub trait CertIssuer: Send + Sync {
	/// One certificate covering every domain. `staging` targets a test CA.
	async fn issue(&self, domains: &[String], staging: bool) -> ProxyResult<()>;
}

/// Issues certificates with `certbot certonly --webroot`.
#[derive(Debug, Clone)]
pub struct CertbotIssuer {
	pub program: String,
	pub email: Option<String>,
	pub webroot: PathBuf,
	pub staging_server: String,
}

impl CertbotIssuer {
	pub fn args(&self, domains: &[String], staging: bool) -> Vec<String> {
		let mut args: Vec<String> = ["certonly", "--agree-tos", "--non-interactive", "--expand"]
			.into_iter()
			.map(String::from)
			.collect();
		match &self.email {
			Some(email) => args.extend(["--email".to_string(), email.clone()]),
			None => args.push("--register-unsafely-without-email".to_string()),
		}
		args.extend([
			"--webroot".to_string(),
			"-w".to_string(),
			self.webroot.display().to_string(),
			"-d".to_string(),
			domains.join(","),
		]);
		if staging {
			args.extend(["--server".to_string(), self.staging_server.clone()]);
		}
		args
	}
}

#[async_trait]
impl CertIssuer for CertbotIssuer {
	#[instrument(skip(self, domains), fields(domains = domains.len()))]
	async fn issue(&self, domains: &[String], staging: bool) -> ProxyResult<()> {
		if domains.is_empty() {
			return Ok(());
		}
		run(&self.program, &self.args(domains, staging)).await?;
		info!(first = %domains[0], staging, "issued certificate");
		Ok(())
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunCertIssuer;

#[async_trait]
impl CertIssuer for DryRunCertIssuer {
	async fn issue(&self, domains: &[String], staging: bool) -> ProxyResult<()> {
		info!(domains = %domains.join(","), staging, dry_run = true, "would issue certificate");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn issuer(email: Option<&str>) -> CertbotIssuer {
		CertbotIssuer {
			program: "certbot".to_string(),
			email: email.map(String::from),
			webroot: PathBuf::from("/var/tmp"),
			staging_server: "https://acme-staging.example/directory".to_string(),
		}
	}

	#[test]
	fn live_args_join_domains() {
		let domains = vec!["sd-master.x.org".to_string(), "sd-a.x.org".to_string()];
		let args = issuer(Some("ops@x.org")).args(&domains, false);
		assert_eq!(
			args.join(" "),
			"certonly --agree-tos --non-interactive --expand --email ops@x.org --webroot -w /var/tmp -d sd-master.x.org,sd-a.x.org"
		);
	}

	#[test]
	fn staging_adds_server() {
		let args = issuer(None).args(&["a.x.org".to_string()], true);
		assert!(args.contains(&"--register-unsafely-without-email".to_string()));
		assert_eq!(&args[args.len() - 2..], ["--server", "https://acme-staging.example/directory"]);
	}

	#[tokio::test]
	async fn nothing_to_issue_is_a_noop() {
		let issuer = CertbotIssuer {
			program: "/nonexistent/certbot".to_string(),
			..issuer(None)
		};
		issuer.issue(&[], false).await.unwrap();
	}
}
