// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reverse proxy and certificate sections.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Reverse proxy configuration layer (for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfigLayer {
	pub routes_path: Option<PathBuf>,
	pub domain: Option<String>,
	pub primary: Option<String>,
	pub template_path: Option<PathBuf>,
	pub nginx_path: Option<String>,
}

impl ProxyConfigLayer {
	pub fn merge(&mut self, other: ProxyConfigLayer) {
		if other.routes_path.is_some() {
			self.routes_path = other.routes_path;
		}
		if other.domain.is_some() {
			self.domain = other.domain;
		}
		if other.primary.is_some() {
			self.primary = other.primary;
		}
		if other.template_path.is_some() {
			self.template_path = other.template_path;
		}
		if other.nginx_path.is_some() {
			self.nginx_path = other.nginx_path;
		}
	}

	pub fn finalize(self) -> ProxyConfig {
		let defaults = ProxyConfig::default();
		ProxyConfig {
			routes_path: self.routes_path.unwrap_or(defaults.routes_path),
			domain: self.domain.unwrap_or(defaults.domain),
			primary: match self.primary {
				Some(p) if p.is_empty() => None,
				Some(p) => Some(p),
				None => defaults.primary,
			},
			template_path: self.template_path,
			nginx_path: self.nginx_path.unwrap_or(defaults.nginx_path),
		}
	}
}

/// Reverse proxy configuration (resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
	pub routes_path: PathBuf,
	pub domain: String,
	/// Environment rendered first, so it becomes the proxy's default server.
	pub primary: Option<String>,
	pub template_path: Option<PathBuf>,
	pub nginx_path: String,
}

impl Default for ProxyConfig {
	fn default() -> Self {
		Self {
			routes_path: PathBuf::from("/etc/nginx/conf.d/fire-routes.conf"),
			domain: "test.superdesk.org".to_string(),
			primary: Some("sd-master".to_string()),
			template_path: None,
			nginx_path: "nginx".to_string(),
		}
	}
}

/// Certificate issuance configuration layer (for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertsConfigLayer {
	pub certbot_path: Option<String>,
	pub email: Option<String>,
	pub webroot: Option<PathBuf>,
	pub staging_server: Option<String>,
}

impl CertsConfigLayer {
	pub fn merge(&mut self, other: CertsConfigLayer) {
		if other.certbot_path.is_some() {
			self.certbot_path = other.certbot_path;
		}
		if other.email.is_some() {
			self.email = other.email;
		}
		if other.webroot.is_some() {
			self.webroot = other.webroot;
		}
		if other.staging_server.is_some() {
			self.staging_server = other.staging_server;
		}
	}

	pub fn finalize(self) -> CertsConfig {
		let defaults = CertsConfig::default();
		CertsConfig {
			certbot_path: self.certbot_path.unwrap_or(defaults.certbot_path),
			email: self.email,
			webroot: self.webroot.unwrap_or(defaults.webroot),
			staging_server: self.staging_server.unwrap_or(defaults.staging_server),
		}
	}
}

/// Certificate issuance configuration (resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertsConfig {
	pub certbot_path: String,
	pub email: Option<String>,
	pub webroot: PathBuf,
	pub staging_server: String,
}

impl Default for CertsConfig {
	fn default() -> Self {
		Self {
			certbot_path: "certbot".to_string(),
			email: None,
			webroot: PathBuf::from("/var/tmp"),
			staging_server: "https://acme-staging-v02.api.letsencrypt.org/directory".to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn proxy_defaults() {
		let config = ProxyConfigLayer::default().finalize();
		assert_eq!(config, ProxyConfig::default());
		assert_eq!(config.primary.as_deref(), Some("sd-master"));
	}

	#[test]
	fn proxy_merge_overrides_domain_only() {
		let mut base = ProxyConfigLayer {
			domain: Some("a.example.org".to_string()),
			primary: Some("sd-main".to_string()),
			..Default::default()
		};
		base.merge(ProxyConfigLayer {
			domain: Some("b.example.org".to_string()),
			..Default::default()
		});
		let config = base.finalize();
		assert_eq!(config.domain, "b.example.org");
		assert_eq!(config.primary.as_deref(), Some("sd-main"));
	}

	#[test]
	fn empty_primary_disables_partition() {
		let config = ProxyConfigLayer {
			primary: Some(String::new()),
			..Default::default()
		}
		.finalize();
		assert!(config.primary.is_none());
	}

	#[test]
	fn certs_defaults_use_staging_server() {
		let config = CertsConfigLayer::default().finalize();
		assert!(config.staging_server.contains("acme-staging"));
		assert_eq!(config.webroot, PathBuf::from("/var/tmp"));
		assert!(config.email.is_none());
	}
}
