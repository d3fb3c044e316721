// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each section has an all-optional `*Layer` used for
//! merging sources and a resolved runtime struct with defaults applied.

mod builds;
mod github;
mod logging;
mod proxy;
mod repos;
mod runtime;

pub use builds::{BuildsConfig, BuildsConfigLayer, NotifyConfig, NotifyConfigLayer};
pub use github::{GitHubConfig, GitHubConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use proxy::{CertsConfig, CertsConfigLayer, ProxyConfig, ProxyConfigLayer};
pub use repos::{parse_repos_env, RepoConfigLayer};
pub(crate) use repos::resolve_repos;
pub use runtime::{RuntimeConfig, RuntimeConfigLayer};
