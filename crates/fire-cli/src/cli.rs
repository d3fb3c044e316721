// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// fire - preview environments for branches and pull requests.
#[derive(Parser, Debug)]
#[command(name = "fire", version, about = "Preview environment controller")]
pub struct Cli {
	/// Log and skip every mutating action; reads still happen.
	#[arg(long, global = true, env = "FIRE_DRY_RUN")]
	pub dry_run: bool,

	/// Config file (defaults to /etc/fire/fire.toml).
	#[arg(long, global = true, env = "FIRE_CONFIG")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Build a branch or pull request.
	Build(BuildArgs),

	/// Replay a stored GitHub webhook delivery.
	#[command(name = "gh-build")]
	GhBuild {
		/// Directory containing request.json.
		path: PathBuf,
		/// Also forward the delivery, signed, to this URL.
		#[arg(short, long)]
		url: Option<String>,
	},

	/// Remove environments of deleted branches and closed pull requests.
	#[command(name = "gh-clean")]
	GhClean,

	/// Run gh-clean periodically until interrupted.
	Watch {
		/// Seconds between cycles (defaults to runtime.cleanup_interval_secs).
		#[arg(long)]
		interval: Option<u64>,
	},

	/// Regenerate nginx routes for running preview environments.
	Nginx(NginxArgs),

	/// Build the base template.
	#[command(name = "lxc-base")]
	LxcBase {
		/// Rebuild even if it exists.
		#[arg(short, long)]
		force: bool,
	},

	/// Build the data template on top of the base template.
	#[command(name = "lxc-data")]
	LxcData {
		#[arg(short, long)]
		force: bool,
	},

	/// Clone the newest template into NAME and start it.
	#[command(name = "lxc-copy")]
	LxcCopy { name: String },

	/// Request a certificate for NAME.<domain>.
	#[command(name = "lxc-expose")]
	LxcExpose {
		name: String,
		/// Use the live CA instead of staging.
		#[arg(long)]
		live: bool,
	},

	/// Destroy environments.
	#[command(name = "lxc-rm")]
	LxcRm {
		#[arg(required = true)]
		names: Vec<String>,
	},

	/// Destroy every environment starting with PREFIX (default: every
	/// environment owned by a tracked repository), newest name first.
	#[command(name = "lxc-clean")]
	LxcClean {
		#[arg(short, long)]
		prefix: Option<String>,
	},

	/// Wait until NAME has an address and print it.
	#[command(name = "lxc-wait")]
	LxcWait { name: String },
}

#[derive(Args, Debug)]
pub struct BuildArgs {
	/// Repository short name, or its pull request prefix (e.g. `sdpr`).
	pub short_name: String,

	/// Branch name or pull request number.
	#[arg(name = "ref")]
	pub ref_id: String,

	/// Head commit; resolved from GitHub when omitted.
	#[arg(long)]
	pub sha: Option<String>,

	/// Ask the controller's web endpoint to rebuild instead.
	#[arg(short = 'u', long)]
	pub by_url: bool,

	#[arg(short = 'c', long, conflicts_with_all = ["only_web", "install_only"])]
	pub only_checks: bool,

	#[arg(short = 'w', long, conflicts_with = "install_only")]
	pub only_web: bool,

	#[arg(short = 'i', long)]
	pub install_only: bool,

	/// Extra build environment, `KEY=VALUE` separated by spaces.
	#[arg(long, default_value = "")]
	pub env: String,

	/// Destroy the environment before provisioning.
	#[arg(long)]
	pub clean: bool,

	/// Report commit statuses to GitHub.
	#[arg(long)]
	pub statuses: bool,

	/// POST the signed result here.
	#[arg(long)]
	pub callback: Option<String>,

	/// Request live certificates for the preview environment.
	#[arg(long)]
	pub live: bool,
}

#[derive(Args, Debug)]
pub struct NginxArgs {
	/// Routes file (defaults to proxy.routes_path).
	#[arg(short, long)]
	pub path: Option<PathBuf>,

	/// Route only these environments.
	#[arg(short, long = "name")]
	pub names: Vec<String>,

	/// Request certificates for every routed host.
	#[arg(long)]
	pub ssl: bool,

	/// With --ssl, use the live CA.
	#[arg(long, requires = "ssl")]
	pub live: bool,
}
