// Copyright 2026 Octave Online LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::{CgError, Result};
use crate::util;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Mount root of the cgroup virtual filesystem.
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// The named pseudo-controller used by the service manager to track its
/// workloads. On disk this hierarchy lives under `/sys/fs/cgroup/systemd`.
pub const SYSTEMD_CGROUP_CONTROLLER: &str = "name=systemd";

// Result of the one-time mount check. Only set once the check succeeds; a
// missing mount is re-probed on the next call.
static MOUNT_GOOD: OnceLock<()> = OnceLock::new();

/// One location in the cgroup hierarchy: a controller plus a path relative
/// to that controller's root.
///
/// A location with no controller resolves to its path verbatim; callers that
/// want the service manager's private hierarchy use
/// [`SYSTEMD_CGROUP_CONTROLLER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CGroup {
	controller: Option<String>,
	path: String,
}

impl CGroup {
	pub fn new(controller: Option<&str>, path: impl Into<String>) -> Self {
		Self {
			controller: controller.map(str::to_string),
			path: path.into(),
		}
	}

	/// A location in the service manager's private hierarchy.
	pub fn systemd(path: impl Into<String>) -> Self {
		Self::new(Some(SYSTEMD_CGROUP_CONTROLLER), path)
	}

	pub fn controller(&self) -> Option<&str> {
		self.controller.as_deref()
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	/// # Examples
	///
	/// ```
	/// use cg1tools::CGroup;
	///
	/// let cgroup = CGroup::new(Some("cpu"), "/a");
	/// let child = cgroup.child("b");
	/// assert_eq!(child.path(), "/a/b");
	/// ```
	pub fn child(&self, name: &str) -> Self {
		Self {
			controller: self.controller.clone(),
			path: format!("{}/{}", self.path, name),
		}
	}

	/// The parent location, or `None` at the hierarchy root.
	pub fn parent(&self) -> Option<Self> {
		let normalized = util::kill_slashes(&self.path);
		let trimmed = normalized.trim_end_matches('/');
		let idx = trimmed.rfind('/')?;
		let parent = if idx == 0 { "/" } else { &trimmed[..idx] };
		Some(Self {
			controller: self.controller.clone(),
			path: parent.to_string(),
		})
	}

	/// Resolves this location to an absolute filesystem path, optionally with
	/// a trailing file name such as `cgroup.procs`.
	pub fn fs_path(&self, suffix: Option<&str>) -> Result<PathBuf> {
		cgroup_path(self.controller.as_deref(), Some(&self.path), suffix)
	}

	/// Like [`CGroup::fs_path`], but additionally fails with
	/// [`CgError::NotFound`] if the controller root is absent.
	pub fn fs_path_checked(&self, suffix: Option<&str>) -> Result<PathBuf> {
		let controller = self
			.controller
			.as_deref()
			.ok_or_else(|| CgError::InvalidArgument("controller required".to_string()))?;
		cgroup_path_checked(controller, Some(&self.path), suffix)
	}
}

impl fmt::Display for CGroup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.controller {
			Some(c) => write!(f, "{}:{}", c, self.path),
			None => f.write_str(&self.path),
		}
	}
}

/// Strips the naming layer off a controller: the service manager's private
/// controller maps to its on-disk name, and an explicit `name=` prefix is
/// dropped.
pub(crate) fn normalize_controller(controller: &str) -> &str {
	if controller == SYSTEMD_CGROUP_CONTROLLER {
		"systemd"
	} else if let Some(name) = controller.strip_prefix("name=") {
		name
	} else {
		controller
	}
}

fn join_path(controller: Option<&str>, path: Option<&str>, suffix: Option<&str>) -> Result<String> {
	let joined = match (controller, path, suffix) {
		(Some(c), Some(p), Some(s)) => format!("{CGROUP_ROOT}/{c}/{p}/{s}"),
		(Some(c), Some(p), None) => format!("{CGROUP_ROOT}/{c}/{p}"),
		(Some(c), None, Some(s)) => format!("{CGROUP_ROOT}/{c}/{s}"),
		(Some(c), None, None) => format!("{CGROUP_ROOT}/{c}"),
		(None, Some(p), Some(s)) => format!("{p}/{s}"),
		(None, Some(p), None) => p.to_string(),
		(None, None, _) => {
			return Err(CgError::InvalidArgument(
				"need a controller or a path".to_string(),
			))
		}
	};
	Ok(util::kill_slashes(&joined))
}

fn ensure_mounted() -> Result<()> {
	if MOUNT_GOOD.get().is_some() {
		return Ok(());
	}
	if util::path_is_mount_point(CGROUP_ROOT)? {
		// Cache this to save a few stat()s.
		let _ = MOUNT_GOOD.set(());
		Ok(())
	} else {
		Err(CgError::NotFound)
	}
}

/// Resolves (controller, relative path, file name) to an absolute path under
/// the cgroup mount root, verifying once per process that the root is in
/// fact mounted.
pub fn cgroup_path(
	controller: Option<&str>,
	path: Option<&str>,
	suffix: Option<&str>,
) -> Result<PathBuf> {
	ensure_mounted()?;
	let controller = controller.map(normalize_controller);
	Ok(PathBuf::from(join_path(controller, path, suffix)?))
}

/// Like [`cgroup_path`], but requires a controller and fails with
/// [`CgError::NotFound`] unless that controller's root directory exists.
pub fn cgroup_path_checked(
	controller: &str,
	path: Option<&str>,
	suffix: Option<&str>,
) -> Result<PathBuf> {
	if controller.is_empty() {
		return Err(CgError::InvalidArgument("empty controller".to_string()));
	}
	let controller = normalize_controller(controller);
	if !Path::new(CGROUP_ROOT).join(controller).exists() {
		return Err(CgError::NotFound);
	}
	Ok(PathBuf::from(join_path(Some(controller), path, suffix)?))
}

/// Deduplicates a controller list, dropping the private hierarchy names and
/// any controller without a mounted root.
pub fn shorten_controllers(controllers: Vec<String>) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut out = Vec::with_capacity(controllers.len());
	for c in controllers {
		if c == "systemd" || c == SYSTEMD_CGROUP_CONTROLLER {
			continue;
		}
		if !Path::new(CGROUP_ROOT).join(normalize_controller(&c)).exists() {
			log::debug!("Controller {c} is not available, removing from controllers list.");
			continue;
		}
		if seen.insert(c.clone()) {
			out.push(c);
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize_controller() {
		assert_eq!(normalize_controller("cpu"), "cpu");
		assert_eq!(normalize_controller("name=systemd"), "systemd");
		assert_eq!(normalize_controller("name=custom"), "custom");
	}

	#[test]
	fn test_join_path() {
		assert_eq!(
			join_path(Some("cpu"), Some("a/b"), None).unwrap(),
			"/sys/fs/cgroup/cpu/a/b"
		);
		assert_eq!(
			join_path(Some("cpu"), Some("/a//b/"), Some("tasks")).unwrap(),
			"/sys/fs/cgroup/cpu/a/b/tasks"
		);
		assert_eq!(
			join_path(Some("memory"), None, Some("release_agent")).unwrap(),
			"/sys/fs/cgroup/memory/release_agent"
		);
		assert_eq!(join_path(None, Some("/a/b"), None).unwrap(), "/a/b");
		assert!(join_path(None, None, Some("tasks")).is_err());
	}

	#[test]
	fn test_child_and_parent() {
		let cg = CGroup::new(Some("cpu"), "/a/b");
		assert_eq!(cg.child("c").path(), "/a/b/c");
		assert_eq!(cg.parent().unwrap().path(), "/a");
		assert_eq!(cg.parent().unwrap().parent().unwrap().path(), "/");
		assert!(CGroup::new(Some("cpu"), "/").parent().is_none());
	}

	#[test]
	fn test_display() {
		assert_eq!(CGroup::new(Some("cpu"), "/a/b").to_string(), "cpu:/a/b");
		assert_eq!(CGroup::new(None, "/a/b").to_string(), "/a/b");
	}
}
