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

//! Recursive process migration between control groups.

use crate::cgroup::CGroup;
use crate::error::{CgError, Result};
use crate::kill::CgFlags;
use crate::util;
use nix::errno::Errno;
use nix::unistd::{getpid, Pid};
use std::collections::HashSet;

// Attaching reads failures from the destination's point of view: a vanished
// group is NotFound everywhere else in this crate, but here it means the
// write target is missing, which must stay a hard error.
fn classify_attach_error(e: CgError, pid: Pid, dest: &CGroup) -> CgError {
	match e {
		CgError::NotFound => CgError::NoSuchDestination(dest.to_string()),
		CgError::Io(io) if io.raw_os_error() == Some(Errno::ESRCH as i32) => {
			CgError::NoSuchProcess(pid)
		}
		other => other,
	}
}

impl CGroup {
	/// Attaches a process to this group by writing its pid into the group's
	/// `tasks` file. The group and its controller root must exist.
	pub fn attach(&self, pid: Pid) -> Result<()> {
		let path = self
			.fs_path_checked(Some("tasks"))
			.map_err(|e| classify_attach_error(e, pid, self))?;
		util::write_string_file(&path, &format!("{pid}\n"))
			.map_err(|e| classify_attach_error(e, pid, self))?;
		log::debug!("Attached {pid} to {self}");
		Ok(())
	}

	/// Moves every task out of this group into `to`, repeating the
	/// enumerate-and-attach pass until one moves nothing new, so that
	/// processes forking mid-migration are caught as well. Processes that
	/// exit in between are skipped silently.
	///
	/// Returns `true` if at least one process was moved.
	pub fn migrate_to(&self, to: &CGroup, flags: CgFlags) -> Result<bool> {
		let mut visited: HashSet<Pid> = HashSet::new();
		let my_pid = getpid();
		let mut moved = false;
		let mut first_err: Option<CgError> = None;

		'pass: loop {
			let mut done = true;

			let iter = match self.tasks() {
				Ok(iter) => iter,
				Err(CgError::NotFound) => break,
				Err(e) => {
					first_err.get_or_insert(e);
					break;
				}
			};

			for entry in iter {
				let pid = match entry {
					Ok(pid) => pid,
					Err(e) => {
						first_err.get_or_insert(e);
						break 'pass;
					}
				};

				if flags.contains(CgFlags::IGNORE_SELF) && pid == my_pid {
					continue;
				}
				if !visited.insert(pid) {
					continue;
				}

				match to.attach(pid) {
					Ok(()) => moved = true,
					Err(CgError::NoSuchProcess(_)) => {}
					Err(e) => {
						first_err.get_or_insert(e);
					}
				}

				done = false;
			}

			if done {
				break;
			}
		}

		match first_err {
			Some(e) => Err(e),
			None => Ok(moved),
		}
	}

	/// Moves every task in this subtree into the corresponding subgroup of
	/// `to`, reusing each child's own name under the destination. With
	/// [`CgFlags::REMOVE`], emptied source directories are removed on the
	/// way back up, sticky protection permitting.
	///
	/// Partial failures anywhere in the recursion are accumulated and the
	/// first one is returned, but the walk always runs to completion.
	pub fn migrate_recursive_to(&self, to: &CGroup, flags: CgFlags) -> Result<bool> {
		self.migrate_recursive(to, flags, false)
	}

	// With `collapse` set, every level of the subtree lands directly in `to`
	// instead of the child mirroring its own name under it.
	fn migrate_recursive(&self, to: &CGroup, flags: CgFlags, collapse: bool) -> Result<bool> {
		let mut moved = false;
		let mut first_err: Option<CgError> = None;

		match self.migrate_to(to, flags) {
			Ok(m) => moved = m,
			Err(e) => {
				first_err = Some(e);
			}
		}

		let finish = |first_err: Option<CgError>, moved| match first_err {
			Some(e) => Err(e),
			None => Ok(moved),
		};

		let iter = match self.subgroups() {
			Ok(iter) => iter,
			Err(CgError::NotFound) => return finish(first_err, moved),
			Err(e) => {
				first_err.get_or_insert(e);
				return finish(first_err, moved);
			}
		};

		for entry in iter {
			let name = match entry {
				Ok(name) => name,
				Err(e) => {
					first_err.get_or_insert(e);
					return finish(first_err, moved);
				}
			};
			let dest = if collapse { to.clone() } else { to.child(&name) };
			match self.child(&name).migrate_recursive(&dest, flags, collapse) {
				Ok(m) => moved |= m,
				Err(e) => {
					first_err.get_or_insert(e);
				}
			}
		}

		if flags.contains(CgFlags::REMOVE) {
			if let Err(e) = self.rmdir_if_unprotected(true) {
				if !e.is_benign_rmdir() {
					first_err.get_or_insert(e);
				}
			}
		}

		finish(first_err, moved)
	}

	/// Dissolves this group: moves every process in the subtree, whatever its
	/// depth, directly into the parent group and removes the emptied
	/// directories. A group that is already gone counts as deleted.
	pub fn delete(&self) -> Result<()> {
		let parent = self
			.parent()
			.ok_or_else(|| CgError::InvalidArgument("cannot delete the hierarchy root".to_string()))?;
		// NotFound can only come from enumerating the source here; a missing
		// destination surfaces as NoSuchDestination and stays fatal.
		match self.migrate_recursive(&parent, CgFlags::REMOVE, true) {
			Ok(_) | Err(CgError::NotFound) => Ok(()),
			Err(e) => Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io;

	#[test]
	fn test_attach_error_classification() {
		let dest = CGroup::new(Some("cpu"), "/a/c");
		let pid = Pid::from_raw(42);

		// A missing destination must not come back as the benign NotFound
		// that recursive walks and delete() tolerate for vanished sources.
		assert!(matches!(
			classify_attach_error(CgError::NotFound, pid, &dest),
			CgError::NoSuchDestination(d) if d == "cpu:/a/c"
		));

		let esrch = CgError::Io(io::Error::from_raw_os_error(Errno::ESRCH as i32));
		assert!(matches!(
			classify_attach_error(esrch, pid, &dest),
			CgError::NoSuchProcess(p) if p == pid
		));

		let eacces = CgError::Io(io::Error::from_raw_os_error(Errno::EACCES as i32));
		assert!(matches!(classify_attach_error(eacces, pid, &dest), CgError::Io(_)));
	}
}
