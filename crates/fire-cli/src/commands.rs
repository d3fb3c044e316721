// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, bail, Context as _};
use fire_builds::{
	parse_env_overrides, request_restart, BuildOverrides, BuildRequest, BuildTarget, ExitStatus, HttpNotifier,
	StoredDelivery,
};
use fire_common_http::{new_client_with_timeout, RetryConfig};
use fire_naming::{owner_of, Fingerprint, TrackedRepository};
use fire_provisioner::Expose;
use fire_proxy::{RouteSelection, TlsMode};
use tracing::{info, warn};

use crate::cli::{BuildArgs, Command, NginxArgs};
use crate::context::Context;

pub async fn run(ctx: &Context, command: Command) -> anyhow::Result<ExitCode> {
	match command {
		Command::Build(args) => build(ctx, args).await,
		Command::GhBuild { path, url } => gh_build(ctx, &path, url.as_deref()).await,
		Command::GhClean => gh_clean(ctx).await,
		Command::Watch { interval } => watch(ctx, interval).await,
		Command::Nginx(args) => nginx(ctx, args).await,
		Command::LxcBase { force } => {
			let built = ctx.provisioner().ensure_base(force).await?;
			report_template(&ctx.config.runtime.base_template, built);
			Ok(ExitCode::SUCCESS)
		}
		Command::LxcData { force } => {
			if !ctx.config.runtime.data_enabled {
				bail!("data template is disabled (runtime.data_enabled = false)");
			}
			let built = ctx.provisioner().ensure_data(force).await?;
			report_template(&ctx.config.runtime.data_template, built);
			Ok(ExitCode::SUCCESS)
		}
		Command::LxcCopy { name } => {
			ctx.provisioner().clone_environment(&name).await?;
			println!("{name}");
			Ok(ExitCode::SUCCESS)
		}
		Command::LxcExpose { name, live } => {
			let mode = if live { Expose::Live } else { Expose::Staging };
			let host = ctx.provisioner().expose(&name, mode).await?;
			println!("{host}");
			Ok(ExitCode::SUCCESS)
		}
		Command::LxcRm { names } => Ok(failures_to_code(remove(ctx, &names).await)),
		Command::LxcClean { prefix } => {
			let names = ctx.runtime.list().await?;
			let selected = clean_selection(&names, prefix.as_deref(), &ctx.config.repos);
			Ok(failures_to_code(remove(ctx, &selected).await))
		}
		Command::LxcWait { name } => {
			let address = ctx.provisioner().wait_for_address(&name).await?;
			println!("{address}");
			Ok(ExitCode::SUCCESS)
		}
	}
}

fn report_template(name: &str, built: bool) {
	if built {
		println!("{name}: built");
	} else {
		println!("{name}: present");
	}
}

/// Process exit byte for a build status. Codes outside `0..=255` become 1.
fn exit_byte(status: ExitStatus) -> u8 {
	u8::try_from(status.code()).unwrap_or(1)
}

fn exit_code(status: ExitStatus) -> ExitCode {
	ExitCode::from(exit_byte(status))
}

fn failures_to_code(failures: usize) -> ExitCode {
	if failures == 0 {
		ExitCode::SUCCESS
	} else {
		ExitCode::FAILURE
	}
}

fn target_of(args: &BuildArgs) -> BuildTarget {
	if args.only_checks {
		BuildTarget::ChecksOnly
	} else if args.only_web {
		BuildTarget::WebOnly
	} else if args.install_only {
		BuildTarget::InstallOnly
	} else {
		BuildTarget::Full
	}
}

async fn build(ctx: &Context, args: BuildArgs) -> anyhow::Result<ExitCode> {
	let (repo, kind) = ctx.resolve_repo(&args.short_name)?;

	if args.by_url {
		let base = &ctx.config.builds.restart_base_url;
		if ctx.dry_run {
			info!(base, repo = %args.short_name, ref_id = %args.ref_id, dry_run = true, "would request rebuild");
			return Ok(ExitCode::SUCCESS);
		}
		let http = new_client_with_timeout(Duration::from_secs(ctx.config.notify.timeout_secs));
		let status = request_restart(&http, &RetryConfig::default(), base, &args.short_name, &args.ref_id).await?;
		println!("rebuild requested ({status})");
		return Ok(ExitCode::SUCCESS);
	}

	let env = parse_env_overrides(&args.env).map_err(|e| anyhow!(e))?;
	let overrides = BuildOverrides {
		clean: args.clean,
		env,
		statuses: args.statuses,
		callback: args.callback.clone(),
	};
	let mut request = BuildRequest::new(repo, kind, args.ref_id.clone(), target_of(&args)).with_overrides(overrides);
	if let Some(sha) = &args.sha {
		request = request.with_fingerprint(Fingerprint::new(sha).context("invalid --sha")?);
	}

	let expose = if args.live { Expose::Live } else { Expose::Staging };
	let outcome = ctx.dispatcher(expose)?.dispatch_outcome(&request).await;
	println!("{} {} {}: {outcome}", args.short_name, args.ref_id, request.target);
	Ok(exit_code(outcome.status()))
}

async fn gh_build(ctx: &Context, path: &Path, url: Option<&str>) -> anyhow::Result<ExitCode> {
	let delivery = StoredDelivery::load(path)?;

	if let Some(url) = url {
		if ctx.dry_run {
			info!(url, event = delivery.event()?, dry_run = true, "would forward delivery");
		} else {
			let forwarder = HttpNotifier::new(Duration::from_secs(ctx.config.notify.timeout_secs))
				.with_secret(ctx.config.notify.secret.clone());
			let body = delivery.forward_body()?;
			let status = forwarder
				.post_signed(url, body, &delivery.forward_headers())
				.await
				.with_context(|| format!("forwarding delivery to {url}"))?;
			info!(url, status, "forwarded delivery");
		}
	}

	let Some(request) = delivery.build_request(&ctx.config.repos)? else {
		info!(event = delivery.event()?, "delivery does not ask for a build");
		return Ok(ExitCode::SUCCESS);
	};
	let outcome = ctx.dispatcher(Expose::Staging)?.dispatch_outcome(&request).await;
	println!("{} {}: {outcome}", request.repo.short_name, request.ref_id);
	Ok(exit_code(outcome.status()))
}

async fn gh_clean(ctx: &Context) -> anyhow::Result<ExitCode> {
	let report = ctx.reconciler()?.reconcile().await?;
	for name in &report.destroyed {
		println!("destroyed {name}");
	}
	for failure in report.failures() {
		eprintln!("{failure}");
	}
	println!("{}", report.summary());
	Ok(if report.is_clean() {
		ExitCode::SUCCESS
	} else {
		ExitCode::FAILURE
	})
}

async fn watch(ctx: &Context, interval: Option<u64>) -> anyhow::Result<ExitCode> {
	let secs = interval.unwrap_or(ctx.config.runtime.cleanup_interval_secs);
	if secs == 0 {
		bail!("--interval must be greater than zero");
	}
	let reconciler = ctx.reconciler()?;
	info!(interval_secs = secs, "watching repositories");
	let cycles = reconciler
		.run_periodic(Duration::from_secs(secs), async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				warn!(error = %e, "failed to listen for ctrl-c");
				std::future::pending::<()>().await;
			}
		})
		.await;
	info!(cycles, "watch stopped");
	Ok(ExitCode::SUCCESS)
}

async fn nginx(ctx: &Context, args: NginxArgs) -> anyhow::Result<ExitCode> {
	let tls = match (args.ssl, args.live) {
		(false, _) => TlsMode::Off,
		(true, false) => TlsMode::Staging,
		(true, true) => TlsMode::Live,
	};
	let selection = if args.names.is_empty() {
		owned_selection(ctx).await?
	} else {
		RouteSelection::Names(args.names)
	};
	let outcome = ctx.proxy(args.path, tls)?.sync(ctx.runtime.as_ref(), &selection).await?;
	for host in outcome.routes.hosts() {
		println!("{host}");
	}
	info!(routes = outcome.routes.len(), changed = outcome.changed, "routes synced");
	if let Some(e) = &outcome.certificate_error {
		eprintln!("certificate issuance failed: {e}");
		return Ok(ExitCode::FAILURE);
	}
	Ok(ExitCode::SUCCESS)
}

/// Owned routes, with the preview names of live refs so a branch whose slug
/// ends in hex characters is still routed. Falls back to name shapes when
/// the refs cannot be listed.
async fn owned_selection(ctx: &Context) -> anyhow::Result<RouteSelection> {
	let selection = RouteSelection::owned(ctx.config.repos.clone());
	match ctx.reconciler()?.plan().await {
		Ok(plan) => Ok(selection.with_previews(plan.previews)),
		Err(e) => {
			warn!(error = %e, "could not list refs, routing by name shape only");
			Ok(selection)
		}
	}
}

/// Destroys every name, continuing past failures, and returns how many
/// failed. Missing environments are not failures.
async fn remove(ctx: &Context, names: &[String]) -> usize {
	let mut failed = 0;
	for name in names {
		match ctx.runtime.destroy(name).await {
			Ok(()) => println!("destroyed {name}"),
			Err(e) if e.is_not_found() => warn!(name = %name, "environment does not exist"),
			Err(e) => {
				failed += 1;
				eprintln!("{name}: {e}");
			}
		}
	}
	failed
}

/// Environments `lxc-clean` removes, reverse-sorted so fingerprinted
/// build environments go before their preview environment.
///
/// Without a prefix only environments owned by a tracked repository are
/// selected, which leaves templates alone.
pub fn clean_selection(names: &[String], prefix: Option<&str>, repos: &[TrackedRepository]) -> Vec<String> {
	let mut selected: Vec<String> = names
		.iter()
		.filter(|name| match prefix {
			Some(prefix) => name.starts_with(prefix),
			None => owner_of(name, repos).is_some(),
		})
		.cloned()
		.collect();
	selected.sort_unstable_by(|a, b| b.cmp(a));
	selected
}
