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

//! Ownership, mode and sticky protection on control group directories and
//! their membership files.

use crate::cgroup::CGroup;
use crate::error::Result;
use nix::libc::{mode_t, S_ISVTX};
use nix::sys::stat;
use nix::unistd::{chown, Gid, Uid};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

fn chmod_and_chown(
	path: &Path,
	mode: Option<mode_t>,
	uid: Option<Uid>,
	gid: Option<Gid>,
) -> Result<()> {
	if let Some(mode) = mode {
		fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
	}
	if uid.is_some() || gid.is_some() {
		chown(path, uid, gid)?;
	}
	Ok(())
}

/// Computes the mode to apply to a membership file. When only one of `mode`
/// and `sticky` is given, the missing half is taken from `current`; the
/// sticky bit lives outside the low permission bits and is merged
/// independently.
fn merge_mode(current: mode_t, mode: Option<mode_t>, sticky: Option<bool>) -> Option<mode_t> {
	match (mode, sticky) {
		(Some(m), Some(s)) => Some(m | if s { S_ISVTX } else { 0 }),
		(Some(m), None) => Some((current & !0o777) | m),
		(None, Some(s)) => Some((current & !S_ISVTX) | if s { S_ISVTX } else { 0 }),
		(None, None) => None,
	}
}

impl CGroup {
	/// Changes mode and ownership of the group's own directory. `None`
	/// leaves the respective attribute unchanged; the mode is masked to
	/// the permission bits.
	pub fn set_group_access(
		&self,
		mode: Option<mode_t>,
		uid: Option<Uid>,
		gid: Option<Gid>,
	) -> Result<()> {
		let path = self.fs_path(None)?;
		chmod_and_chown(&path, mode.map(|m| m & 0o777), uid, gid)
	}

	/// Changes mode, ownership and sticky protection of the group's `tasks`
	/// file, mirroring the result onto `cgroup.procs` so the two membership
	/// files stay in sync. With nothing to change this is a no-op.
	pub fn set_task_access(
		&self,
		mode: Option<mode_t>,
		uid: Option<Uid>,
		gid: Option<Gid>,
		sticky: Option<bool>,
	) -> Result<()> {
		if mode.is_none() && uid.is_none() && gid.is_none() && sticky.is_none() {
			return Ok(());
		}

		let mode = mode.map(|m| m & 0o666);
		let tasks = self.fs_path(Some("tasks"))?;

		let current = if mode.is_some() != sticky.is_some() {
			// Only one half given; read the other from the file itself.
			stat::lstat(&tasks)?.st_mode
		} else {
			0
		};
		let mode = merge_mode(current, mode, sticky);

		chmod_and_chown(&tasks, mode, uid, gid)?;

		let procs = self.fs_path(Some("cgroup.procs"))?;
		chmod_and_chown(&procs, mode, uid, gid)
	}
}

/// Whether a file carries the sticky protection marker: owned by root with
/// the sticky bit set. Directories so marked survive automatic cleanup.
pub fn file_is_priv_sticky(path: &Path) -> Result<bool> {
	let st = stat::lstat(path)?;
	Ok(st.st_uid == 0 && (st.st_mode & S_ISVTX) != 0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_mode_both_given() {
		assert_eq!(merge_mode(0, Some(0o644), Some(true)), Some(0o644 | S_ISVTX));
		assert_eq!(merge_mode(0, Some(0o644), Some(false)), Some(0o644));
	}

	#[test]
	fn test_merge_mode_only_mode() {
		// Sticky bit from the current mode survives.
		assert_eq!(
			merge_mode(0o600 | S_ISVTX, Some(0o644), None),
			Some(0o644 | S_ISVTX)
		);
	}

	#[test]
	fn test_merge_mode_only_sticky() {
		assert_eq!(merge_mode(0o644, None, Some(true)), Some(0o644 | S_ISVTX));
		assert_eq!(merge_mode(0o644 | S_ISVTX, None, Some(false)), Some(0o644));
	}

	#[test]
	fn test_merge_mode_neither() {
		assert_eq!(merge_mode(0o644, None, None), None);
	}

	#[test]
	fn test_file_is_priv_sticky() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tasks");
		fs::write(&path, "").unwrap();

		fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
		assert!(!file_is_priv_sticky(&path).unwrap());

		fs::set_permissions(&path, fs::Permissions::from_mode(0o644 | S_ISVTX)).unwrap();
		// Protected only when root also owns the file.
		let expect = Uid::effective().is_root();
		assert_eq!(file_is_priv_sticky(&path).unwrap(), expect);

		assert!(file_is_priv_sticky(&dir.path().join("missing")).is_err());
	}
}
