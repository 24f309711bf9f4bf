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

//! Recursive signal delivery with retry-until-quiescent semantics.

use crate::cgroup::CGroup;
use crate::error::{CgError, Result};
use bitflags::bitflags;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::{getpid, Pid};
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

bitflags! {
	/// Options for the kill and migrate walks.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct CgFlags: u8 {
		/// Follow every delivered signal with SIGCONT, so that stopped
		/// processes can react and exit.
		const SIGCONT = 1 << 0;
		/// Never signal or migrate the calling process itself.
		const IGNORE_SELF = 1 << 1;
		/// Remove emptied directories afterwards, honoring sticky
		/// protection.
		const REMOVE = 1 << 2;
	}
}

const KILL_ROUNDS: u32 = 15;
const KILL_ROUND_DELAY: Duration = Duration::from_millis(200);

/// Signal schedule for [`CGroup::kill_recursive_and_wait`]: terminate first,
/// poll a while, then get forceful, then poll again.
fn round_signal(round: u32) -> Option<Signal> {
	match round {
		0 => Some(Signal::SIGTERM),
		9 => Some(Signal::SIGKILL),
		_ => None,
	}
}

impl CGroup {
	/// Signals every process in this group, without recursing into children.
	///
	/// The process list is re-read until a pass turns up no process that has
	/// not been signaled yet; processes which fork faster than we can kill
	/// them are caught in a later pass once the parent generation is gone.
	/// Processes already recorded in `visited` are skipped, and every
	/// process handled here is recorded in turn. With `visited` unset a
	/// fresh set is used for just this call.
	///
	/// Returns `true` if at least one process was signaled, `false` if the
	/// group was already empty or absent. Processes that exit between
	/// enumeration and delivery are not an error.
	pub fn kill(
		&self,
		sig: Option<Signal>,
		flags: CgFlags,
		visited: Option<&mut HashSet<Pid>>,
	) -> Result<bool> {
		let mut local;
		let visited = match visited {
			Some(set) => set,
			None => {
				local = HashSet::new();
				&mut local
			}
		};

		let my_pid = getpid();
		let mut signaled = false;
		let mut first_err: Option<CgError> = None;

		'pass: loop {
			let mut done = true;

			let iter = match self.procs() {
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
				if visited.contains(&pid) {
					continue;
				}

				match signal::kill(pid, sig) {
					Ok(()) => {
						log::trace!("Signaled {pid} in {self}");
						if flags.contains(CgFlags::SIGCONT) {
							let _ = signal::kill(pid, Signal::SIGCONT);
						}
						signaled = true;
					}
					// Already gone, somebody else was faster.
					Err(Errno::ESRCH) => {}
					Err(e) => {
						first_err.get_or_insert(e.into());
					}
				}

				done = false;
				visited.insert(pid);
			}

			if done {
				break;
			}
		}

		match first_err {
			Some(e) => Err(e),
			None => Ok(signaled),
		}
	}

	/// Signals every process in this group and all groups below it, sharing
	/// one visited set across the whole walk. With [`CgFlags::REMOVE`],
	/// directories that have emptied out are removed on the way back up;
	/// sticky-protected, vanished or still-busy directories are left alone.
	///
	/// The walk runs to completion even when parts of it fail; the first
	/// fatal error is returned at the end.
	pub fn kill_recursive(
		&self,
		sig: Option<Signal>,
		flags: CgFlags,
		visited: Option<&mut HashSet<Pid>>,
	) -> Result<bool> {
		let mut local;
		let visited = match visited {
			Some(set) => set,
			None => {
				local = HashSet::new();
				&mut local
			}
		};
		self.kill_recursive_inner(sig, flags, visited)
	}

	fn kill_recursive_inner(
		&self,
		sig: Option<Signal>,
		flags: CgFlags,
		visited: &mut HashSet<Pid>,
	) -> Result<bool> {
		let mut signaled = false;
		let mut first_err: Option<CgError> = None;

		match self.kill(sig, flags, Some(visited)) {
			Ok(s) => signaled = s,
			Err(e) => {
				first_err = Some(e);
			}
		}

		let finish = |first_err: Option<CgError>, signaled| match first_err {
			Some(e) => Err(e),
			None => Ok(signaled),
		};

		let iter = match self.subgroups() {
			Ok(iter) => iter,
			Err(CgError::NotFound) => return finish(first_err, signaled),
			Err(e) => {
				first_err.get_or_insert(e);
				return finish(first_err, signaled);
			}
		};

		for entry in iter {
			let name = match entry {
				Ok(name) => name,
				Err(e) => {
					first_err.get_or_insert(e);
					return finish(first_err, signaled);
				}
			};
			match self.child(&name).kill_recursive_inner(sig, flags, visited) {
				Ok(s) => signaled |= s,
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

		finish(first_err, signaled)
	}

	/// Safely empties the whole subtree: sends SIGTERM, polls up to eight
	/// times at 200ms intervals for the subtree to become quiescent, then
	/// sends SIGKILL to whatever is left and polls a few more times.
	/// Returns as soon as a full pass finds nothing to signal.
	pub fn kill_recursive_and_wait(&self, remove: bool) -> Result<()> {
		let mut flags = CgFlags::SIGCONT | CgFlags::IGNORE_SELF;
		if remove {
			flags |= CgFlags::REMOVE;
		}

		for round in 0..KILL_ROUNDS {
			if !self.kill_recursive(round_signal(round), flags, None)? {
				return Ok(());
			}
			thread::sleep(KILL_ROUND_DELAY);
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_round_signal_schedule() {
		assert_eq!(round_signal(0), Some(Signal::SIGTERM));
		for round in 1..9 {
			assert_eq!(round_signal(round), None);
		}
		assert_eq!(round_signal(9), Some(Signal::SIGKILL));
		for round in 10..KILL_ROUNDS {
			assert_eq!(round_signal(round), None);
		}
	}
}
