// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `fire`: builds branches and pull requests into LXC preview environments,
//! routes them through nginx and cleans up after deleted refs.

mod cli;
mod commands;
mod context;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use fire_config::{load_config, load_config_with_file};

use crate::cli::Cli;
use crate::context::Context;

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	let config = match &cli.config {
		Some(path) => load_config_with_file(path),
		None => load_config(),
	};
	let config = match config {
		Ok(config) => config,
		Err(e) => {
			eprintln!("error: failed to load configuration: {e}");
			return ExitCode::FAILURE;
		}
	};

	logging::init(&config.logging);
	tracing::debug!(dry_run = cli.dry_run, "starting fire");

	let result = match Context::new(config, cli.dry_run) {
		Ok(ctx) => commands::run(&ctx, cli.command).await,
		Err(e) => Err(e),
	};
	match result {
		Ok(code) => code,
		Err(e) => {
			tracing::error!(error = %e, "command failed");
			eprintln!("error: {e:#}");
			ExitCode::FAILURE
		}
	}
}
