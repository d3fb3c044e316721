// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment naming and matching for fire.
//!
//! Every preview environment is named after the ref it was built from:
//!
//! ```text
//! <prefix>-<slug>             preview environment of a ref
//! <prefix>-<slug>-<fp10>      build environment of one head commit
//! ```
//!
//! `prefix` is the tracked repository's short name (`<short>pr` for pull
//! requests), `slug` the sanitized branch name or PR number and `fp10` the
//! first ten characters of the head commit hash.
//!
//! Everything here is pure. The reconciler decides what to destroy purely from
//! [`is_stale`] over the patterns returned by [`desired_patterns`], so this
//! crate carries most of the safety-relevant tests.

pub mod error;
pub mod name;
pub mod pattern;
pub mod types;

pub use error::NamingError;
pub use name::{
	derive_name, has_fingerprint_suffix, owner_of, route_candidates, sanitize, EnvironmentName,
	FINGERPRINT_PREFIX_LEN,
};
pub use pattern::{desired_patterns, detect_collisions, is_stale, NameCollision, Pattern};
pub use types::{Fingerprint, Ref, RefKind, TrackedRepository};
