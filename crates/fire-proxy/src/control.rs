// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use tracing::info;

use crate::command::run;
use crate::error::ProxyResult;

/// Tells the running proxy to pick up a new configuration.
#[async_trait]
pub trait ProxyControl: Send + Sync {
	async fn reload(&self) -> ProxyResult<()>;
}

/// Validates the configuration with `nginx -t`, then `nginx -s reload`.
#[derive(Debug, Clone)]
pub struct NginxControl {
	program: String,
}

impl NginxControl {
	pub fn new(program: impl Into<String>) -> Self {
		Self {
			program: program.into(),
		}
	}
}

impl Default for NginxControl {
	fn default() -> Self {
		Self::new("nginx")
	}
}

#[async_trait]
impl ProxyControl for NginxControl {
	async fn reload(&self) -> ProxyResult<()> {
		run(&self.program, &["-t".to_string()]).await?;
		run(&self.program, &["-s".to_string(), "reload".to_string()]).await?;
		info!("reloaded nginx");
		Ok(())
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunProxyControl;

#[async_trait]
impl ProxyControl for DryRunProxyControl {
	async fn reload(&self) -> ProxyResult<()> {
		info!(dry_run = true, "would reload nginx");
		Ok(())
	}
}
