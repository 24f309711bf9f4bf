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

//! Removal of empty, unprotected control group directories.

use crate::access::file_is_priv_sticky;
use crate::cgroup::CGroup;
use crate::error::{CgError, Result};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

fn is_sticky_protected(dir: &Path) -> bool {
	file_is_priv_sticky(&dir.join("tasks")).unwrap_or(false)
}

/// Depth-first removal pass below `dir`: children before parents, staying on
/// the device `dev`, never following symlinks. Removal failures on non-empty
/// directories are expected here and ignored; only walk errors are recorded,
/// and only the first one.
fn trim_tree(dir: &Path, dev: u64, first_err: &mut Option<CgError>) {
	let entries = match fs::read_dir(dir) {
		Ok(entries) => entries,
		Err(e) => {
			first_err.get_or_insert(e.into());
			return;
		}
	};

	for entry in entries {
		let entry = match entry {
			Ok(entry) => entry,
			Err(e) => {
				first_err.get_or_insert(e.into());
				return;
			}
		};
		match entry.file_type() {
			Ok(t) if t.is_dir() => {}
			_ => continue,
		}
		let path = entry.path();
		match fs::symlink_metadata(&path) {
			Ok(meta) if meta.dev() == dev => {}
			_ => continue,
		}

		trim_tree(&path, dev, first_err);

		if !is_sticky_protected(&path) && fs::remove_dir(&path).is_ok() {
			log::debug!("Trimmed cgroup directory {}", path.display());
		}
	}
}

impl CGroup {
	/// Removes the group's directory, unless `honor_sticky` is set and the
	/// group's `tasks` file carries the sticky protection marker, in which
	/// case the directory is deliberately left in place. A directory that
	/// is already gone counts as removed.
	pub fn rmdir_if_unprotected(&self, honor_sticky: bool) -> Result<()> {
		let path = self.fs_path(None)?;

		if honor_sticky && is_sticky_protected(&path) {
			return Ok(());
		}

		match fs::remove_dir(&path) {
			Ok(()) => Ok(()),
			Err(e) => match CgError::from(e) {
				CgError::NotFound => Ok(()),
				other => Err(other),
			},
		}
	}

	/// Removes every empty, unprotected directory below this group,
	/// children first, without crossing mount boundaries or following
	/// symlinks. With `delete_root` the same protected-removal rule is
	/// applied to the group itself afterwards.
	pub fn trim(&self, delete_root: bool) -> Result<()> {
		let root = self.fs_path(None)?;
		let mut first_err: Option<CgError> = None;

		match fs::symlink_metadata(&root) {
			Ok(meta) => trim_tree(&root, meta.dev(), &mut first_err),
			Err(e) => {
				first_err = Some(e.into());
			}
		}

		if delete_root && !is_sticky_protected(&root) {
			if let Err(e) = fs::remove_dir(&root) {
				if e.kind() != std::io::ErrorKind::NotFound {
					first_err.get_or_insert(e.into());
				}
			}
		}

		match first_err {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_trim_tree_removes_empty_children() {
		let root = tempfile::tempdir().unwrap();
		fs::create_dir_all(root.path().join("a/b/c")).unwrap();
		fs::create_dir_all(root.path().join("d")).unwrap();

		let dev = fs::symlink_metadata(root.path()).unwrap().dev();
		let mut first_err = None;
		trim_tree(root.path(), dev, &mut first_err);
		assert!(first_err.is_none());

		assert!(!root.path().join("a").exists());
		assert!(!root.path().join("d").exists());
		// The root itself is never part of the pass.
		assert!(root.path().exists());
	}

	#[test]
	fn test_trim_tree_keeps_non_empty_directories() {
		let root = tempfile::tempdir().unwrap();
		fs::create_dir_all(root.path().join("a")).unwrap();
		fs::write(root.path().join("a/tasks"), "123\n").unwrap();

		let dev = fs::symlink_metadata(root.path()).unwrap().dev();
		let mut first_err = None;
		trim_tree(root.path(), dev, &mut first_err);
		assert!(first_err.is_none());

		// rmdir on the still-populated directory fails, which is benign.
		assert!(root.path().join("a").exists());
	}

	#[test]
	fn test_trim_tree_honors_sticky_protection() {
		use nix::unistd::Uid;
		use std::os::unix::fs::PermissionsExt;

		if !Uid::effective().is_root() {
			// The marker requires root ownership.
			return;
		}

		let root = tempfile::tempdir().unwrap();
		let keep = root.path().join("keep");
		fs::create_dir_all(&keep).unwrap();
		fs::write(keep.join("tasks"), "").unwrap();
		fs::set_permissions(keep.join("tasks"), fs::Permissions::from_mode(0o1644)).unwrap();

		let dev = fs::symlink_metadata(root.path()).unwrap().dev();
		let mut first_err = None;
		trim_tree(root.path(), dev, &mut first_err);
		assert!(first_err.is_none());

		assert!(keep.exists());
	}
}
