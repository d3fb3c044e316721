// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::process::Stdio;

use tokio::process::Command;
use tracing::{trace, warn};

use crate::error::{ProxyError, ProxyResult};

/// Runs `program` with `args`, returning stdout on success.
pub(crate) async fn run(program: &str, args: &[String]) -> ProxyResult<String> {
	trace!(cmd = %format!("{program} {}", args.join(" ")), "running command");

	let output = Command::new(program)
		.args(args)
		.stdin(Stdio::null())
		.output()
		.await
		.map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				warn!(program, "command not found");
				ProxyError::NotInstalled {
					tool: program.to_string(),
				}
			} else {
				ProxyError::Io(e)
			}
		})?;

	if output.status.success() {
		Ok(String::from_utf8_lossy(&output.stdout).to_string())
	} else {
		Err(ProxyError::CommandFailed {
			tool: program.to_string(),
			code: output.status.code(),
			stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
		})
	}
}
