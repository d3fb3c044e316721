// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Recording proxy collaborators for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::certs::CertIssuer;
use crate::control::ProxyControl;
use crate::error::{ProxyError, ProxyResult};

#[derive(Debug, Clone, Default)]
pub struct RecordingProxyControl {
	reloads: Arc<AtomicUsize>,
}

impl RecordingProxyControl {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn reloads(&self) -> usize {
		self.reloads.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ProxyControl for RecordingProxyControl {
	async fn reload(&self) -> ProxyResult<()> {
		self.reloads.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

#[derive(Debug, Clone, Default)]
pub struct RecordingCertIssuer {
	issued: Arc<Mutex<Vec<(Vec<String>, bool)>>>,
	fail: Arc<AtomicBool>,
}

impl RecordingCertIssuer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_failing(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	/// `(domains, staging)` per request.
	pub fn issued(&self) -> Vec<(Vec<String>, bool)> {
		self.issued.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}
}

#[async_trait]
impl CertIssuer for RecordingCertIssuer {
	async fn issue(&self, domains: &[String], staging: bool) -> ProxyResult<()> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(ProxyError::CommandFailed {
				tool: "certbot".to_string(),
				code: Some(1),
				stderr: "injected failure".to_string(),
			});
		}
		self.issued
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push((domains.to_vec(), staging));
		Ok(())
	}
}
