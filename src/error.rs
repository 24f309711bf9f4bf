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

use nix::errno::Errno;
use nix::unistd::Pid;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CgError>;

/// Errors returned by control group operations.
///
/// Recursive operations swallow [`CgError::NotFound`], [`CgError::Busy`] and
/// [`CgError::NoSuchProcess`] at the item level, since the processes being
/// managed are free to fork, exit and move around while we walk the
/// hierarchy. Everything else is fatal and surfaces as the overall result.
#[derive(Error, Debug)]
pub enum CgError {
	/// The control group, or a file inside it, does not exist.
	#[error("control group or file not found")]
	NotFound,

	/// A directory could not be removed because it is busy or not empty.
	#[error("directory busy or not empty")]
	Busy,

	/// The target process exited before it could be signaled or attached.
	#[error("no such process: {0}")]
	NoSuchProcess(Pid),

	/// The group a process was to be attached to does not exist. Kept apart
	/// from [`CgError::NotFound`] so that a missing destination is never
	/// mistaken for an already-dissolved source.
	#[error("no such destination group: {0}")]
	NoSuchDestination(String),

	/// A release agent is already installed with a different path.
	#[error("conflicting release agent already installed: {current:?}")]
	Conflict { current: String },

	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("not a valid unit name: {0:?}")]
	InvalidUnitName(String),

	/// A kernel file held a value outside its documented vocabulary.
	#[error("unexpected value {value:?} in {}", file.display())]
	UnexpectedValue { file: PathBuf, value: String },

	#[error("i/o error: {0}")]
	Io(io::Error),
}

impl From<io::Error> for CgError {
	fn from(e: io::Error) -> Self {
		if e.kind() == io::ErrorKind::NotFound {
			return CgError::NotFound;
		}
		match e.raw_os_error().map(Errno::from_raw) {
			Some(Errno::EBUSY) | Some(Errno::ENOTEMPTY) => CgError::Busy,
			_ => CgError::Io(e),
		}
	}
}

impl From<Errno> for CgError {
	fn from(e: Errno) -> Self {
		match e {
			Errno::ENOENT => CgError::NotFound,
			Errno::EBUSY | Errno::ENOTEMPTY => CgError::Busy,
			_ => CgError::Io(io::Error::from_raw_os_error(e as i32)),
		}
	}
}

impl CgError {
	/// True for the per-item failures tolerated during subtree removal.
	pub fn is_benign_rmdir(&self) -> bool {
		matches!(self, CgError::NotFound | CgError::Busy)
	}
}
