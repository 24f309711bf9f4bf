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

//! Lazy enumeration of a control group's member processes and child groups.

use crate::cgroup::CGroup;
use crate::error::{CgError, Result};
use nix::unistd::{getpid, Pid};
use std::fs::{File, ReadDir};
use std::io;
use std::io::{BufRead, BufReader, Lines};

/// Iterator over the process IDs listed in a membership file.
///
/// Note that `cgroup.procs` may contain duplicates; callers that care filter
/// through a visited set.
pub struct ProcIter {
	lines: Lines<BufReader<File>>,
}

impl ProcIter {
	pub(crate) fn from_file(file: File) -> Self {
		Self {
			lines: BufReader::new(file).lines(),
		}
	}
}

impl Iterator for ProcIter {
	type Item = Result<Pid>;

	fn next(&mut self) -> Option<Self::Item> {
		let line = match self.lines.next()? {
			Ok(line) => line,
			Err(e) => return Some(Err(e.into())),
		};
		// A pid of zero, or a line that is not a pid at all, means the file
		// is not what we think it is. That is fatal, unlike plain EOF.
		match line.trim().parse::<u32>() {
			Ok(pid) if pid > 0 => Some(Ok(Pid::from_raw(pid as i32))),
			_ => Some(Err(CgError::Io(io::Error::new(
				io::ErrorKind::InvalidData,
				format!("invalid pid line {line:?}"),
			)))),
		}
	}
}

/// Iterator over the names of a control group's immediate children.
pub struct SubgroupIter {
	entries: ReadDir,
}

impl Iterator for SubgroupIter {
	type Item = Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let entry = match self.entries.next()? {
				Ok(entry) => entry,
				Err(e) => return Some(Err(e.into())),
			};
			match entry.file_type() {
				Ok(t) if t.is_dir() => {}
				Ok(_) => continue,
				Err(e) => return Some(Err(e.into())),
			}
			return Some(match entry.file_name().into_string() {
				Ok(name) => Ok(name),
				Err(name) => Err(CgError::Io(io::Error::new(
					io::ErrorKind::InvalidData,
					format!("subgroup name is not unicode: {name:?}"),
				))),
			});
		}
	}
}

impl CGroup {
	/// Opens this group's `cgroup.procs` list.
	pub fn procs(&self) -> Result<ProcIter> {
		let path = self.fs_path(Some("cgroup.procs"))?;
		Ok(ProcIter::from_file(File::open(path)?))
	}

	/// Opens this group's legacy per-thread `tasks` list.
	pub fn tasks(&self) -> Result<ProcIter> {
		let path = self.fs_path(Some("tasks"))?;
		Ok(ProcIter::from_file(File::open(path)?))
	}

	/// Opens this group's immediate child list. This is not recursive.
	pub fn subgroups(&self) -> Result<SubgroupIter> {
		let path = self.fs_path(None)?;
		Ok(SubgroupIter {
			entries: std::fs::read_dir(path)?,
		})
	}

	/// Whether the group itself holds no tasks. A group that does not exist
	/// counts as empty.
	pub fn is_empty(&self, ignore_self: bool) -> Result<bool> {
		let iter = match self.tasks() {
			Ok(iter) => iter,
			Err(CgError::NotFound) => return Ok(true),
			Err(e) => return Err(e),
		};
		let self_pid = getpid();
		for pid in iter {
			let pid = pid?;
			if ignore_self && pid == self_pid {
				continue;
			}
			return Ok(false);
		}
		Ok(true)
	}

	/// Whether the group and all groups below it hold no tasks.
	pub fn is_empty_recursive(&self, ignore_self: bool) -> Result<bool> {
		if !self.is_empty(ignore_self)? {
			return Ok(false);
		}
		let iter = match self.subgroups() {
			Ok(iter) => iter,
			Err(CgError::NotFound) => return Ok(true),
			Err(e) => return Err(e),
		};
		for name in iter {
			if !self.child(&name?).is_empty_recursive(ignore_self)? {
				return Ok(false);
			}
		}
		Ok(true)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Seek, SeekFrom, Write};

	fn proc_iter(contents: &str) -> ProcIter {
		let mut file = tempfile::tempfile().unwrap();
		file.write_all(contents.as_bytes()).unwrap();
		file.seek(SeekFrom::Start(0)).unwrap();
		ProcIter::from_file(file)
	}

	#[test]
	fn test_proc_iter_reads_pids() {
		let pids: Vec<Pid> = proc_iter("10\n20\n10\n").map(|p| p.unwrap()).collect();
		assert_eq!(
			pids,
			vec![Pid::from_raw(10), Pid::from_raw(20), Pid::from_raw(10)]
		);
	}

	#[test]
	fn test_proc_iter_empty_file() {
		assert_eq!(proc_iter("").count(), 0);
	}

	#[test]
	fn test_proc_iter_rejects_zero_and_garbage() {
		let mut iter = proc_iter("0\n");
		assert!(matches!(iter.next(), Some(Err(CgError::Io(_)))));

		let mut iter = proc_iter("12\nnot-a-pid\n");
		assert!(iter.next().unwrap().is_ok());
		assert!(matches!(iter.next(), Some(Err(CgError::Io(_)))));
	}
}
