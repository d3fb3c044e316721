// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Serialized, atomic replacement of the routes file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs4::FileExt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::{ProxyError, ProxyResult};

/// Held while routes are recomputed and written.
///
/// Combines the in-process mutex with an advisory lock on `<routes>.lock`, so
/// overlapping invocations of the binary are serialized as well. A dry-run
/// writer holds only the mutex.
pub struct RouteLock<'a> {
	_guard: MutexGuard<'a, ()>,
	_file: Option<File>,
}

/// Owns the routes file path.
#[derive(Debug, Clone)]
pub struct RouteWriter {
	path: PathBuf,
	mutex: Arc<Mutex<()>>,
	dry_run: bool,
}

impl RouteWriter {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			mutex: Arc::new(Mutex::new(())),
			dry_run: false,
		}
	}

	/// Reads the real file but never creates, locks or replaces anything.
	pub fn dry_run(path: impl Into<PathBuf>) -> Self {
		Self {
			dry_run: true,
			..Self::new(path)
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn lock_path(&self) -> PathBuf {
		let mut name = self
			.path
			.file_name()
			.map(|n| n.to_os_string())
			.unwrap_or_default();
		name.push(".lock");
		self.path.with_file_name(name)
	}

	/// Waits for both locks.
	pub async fn lock(&self) -> ProxyResult<RouteLock<'_>> {
		let guard = self.mutex.lock().await;
		if self.dry_run {
			return Ok(RouteLock {
				_guard: guard,
				_file: None,
			});
		}
		let lock_path = self.lock_path();
		let file = tokio::task::spawn_blocking(move || -> ProxyResult<File> {
			let file = OpenOptions::new()
				.create(true)
				.truncate(false)
				.read(true)
				.write(true)
				.open(&lock_path)
				.map_err(|e| ProxyError::Lock {
					path: lock_path.clone(),
					source: e,
				})?;
			file.lock_exclusive().map_err(|e| ProxyError::Lock {
				path: lock_path.clone(),
				source: e,
			})?;
			Ok(file)
		})
		.await
		.map_err(|e| ProxyError::Join(e.to_string()))??;
		debug!(path = %self.path.display(), "acquired route lock");
		Ok(RouteLock {
			_guard: guard,
			_file: Some(file),
		})
	}

	/// Current contents, empty when the file does not exist yet.
	pub fn read_current(&self) -> ProxyResult<String> {
		match std::fs::read_to_string(&self.path) {
			Ok(content) => Ok(content),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
			Err(e) => Err(ProxyError::Write {
				path: self.path.clone(),
				source: e,
			}),
		}
	}

	/// Writes `content` to a temporary file next to the target and renames it
	/// into place. Requires the route lock.
	pub fn write(&self, _lock: &RouteLock<'_>, content: &str) -> ProxyResult<()> {
		if self.dry_run {
			info!(path = %self.path.display(), bytes = content.len(), dry_run = true, "would write routes file");
			return Ok(());
		}
		let dir = self
			.path
			.parent()
			.filter(|p| !p.as_os_str().is_empty())
			.unwrap_or_else(|| Path::new("."));
		let write_err = |e: std::io::Error| ProxyError::Write {
			path: self.path.clone(),
			source: e,
		};

		let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
		tmp.write_all(content.as_bytes()).map_err(write_err)?;
		tmp.as_file().sync_all().map_err(write_err)?;
		tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

		debug!(path = %self.path.display(), bytes = content.len(), "wrote routes file");
		Ok(())
	}
}
