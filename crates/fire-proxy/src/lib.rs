// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reverse proxy configuration for fire.
//!
//! Renders one route block per environment from a template, replaces the
//! routes file atomically under a lock, reloads nginx and optionally
//! requests certificates for every routed hostname.

mod certs;
mod command;
mod control;
mod error;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
mod routes;
mod sync;
mod template;
mod writer;

pub use certs::{CertIssuer, CertbotIssuer, DryRunCertIssuer};
pub use control::{DryRunProxyControl, NginxControl, ProxyControl};
pub use error::{ProxyError, ProxyResult, RenderError};
pub use routes::{render, Route, RouteTable};
pub use sync::{ApplyOutcome, ProxyConfigurator, RouteSelection, TlsMode};
pub use template::{RouteTemplate, DEFAULT_TEMPLATE};
pub use writer::{RouteLock, RouteWriter};
