// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconciliation of desired and existing preview environments.

mod error;
mod reconciler;

pub use error::{CycleFailure, ReconcileError, ReconcileResult, SkippedRepository};
pub use reconciler::{ReconcilePlan, ReconcileReport, Reconciler};
