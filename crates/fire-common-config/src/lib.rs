// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Common configuration primitives for fire.
//!
//! This crate provides shared types and helpers for configuration across
//! all fire crates, including:
//!
//! - [`Secret<T>`]: A wrapper type that prevents accidental logging of
//!   sensitive values (GitHub tokens, callback signing keys)
//! - [`load_secret_env`]: Helper for loading secrets from environment variables
//!   with `*_FILE` support

pub mod env;
pub mod secret;

pub use env::{load_secret_env, SecretEnvError};
pub use secret::{Secret, SecretString, REDACTED};
