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

//! Idempotent configuration of a controller's empty-cgroup notification hook.

use crate::cgroup;
use crate::error::{CgError, Result};
use crate::util;
use std::path::Path;

/// What [`install_release_agent`] found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseAgentStatus {
	/// The agent path was written; `false` means it was already in place.
	pub newly_installed: bool,
	/// `notify_on_release` was flipped to 1; `false` means it already was.
	pub newly_enabled: bool,
}

// Writes `agent` into an empty release_agent file. An equal value already
// present is fine; any other value is a conflict.
fn install_agent_file(path: &Path, agent: &str) -> Result<bool> {
	let contents = util::read_one_line_file(path)?;
	let current = contents.trim();

	if current.is_empty() {
		util::write_string_file(path, &format!("{agent}\n"))?;
		Ok(true)
	} else if current == agent {
		Ok(false)
	} else {
		Err(CgError::Conflict {
			current: current.to_string(),
		})
	}
}

// Flips notify_on_release from 0 to 1. Anything but 0 or 1 in the file means
// we are not looking at the controller root we think we are.
fn enable_notify_file(path: &Path) -> Result<bool> {
	let contents = util::read_one_line_file(path)?;
	match contents.trim() {
		"0" => {
			util::write_string_file(path, "1\n")?;
			Ok(true)
		}
		"1" => Ok(false),
		other => Err(CgError::UnexpectedValue {
			file: path.to_path_buf(),
			value: other.to_string(),
		}),
	}
}

/// Installs `agent` as the controller's release agent and enables
/// release notifications. Installing the same agent twice is a no-op;
/// a different agent already installed is a conflict.
pub fn install_release_agent(controller: &str, agent: &str) -> Result<ReleaseAgentStatus> {
	let agent_file = cgroup::cgroup_path(Some(controller), None, Some("release_agent"))?;
	let newly_installed = install_agent_file(&agent_file, agent)?;

	let notify_file = cgroup::cgroup_path(Some(controller), None, Some("notify_on_release"))?;
	let newly_enabled = enable_notify_file(&notify_file)?;

	if newly_installed {
		log::info!("Installed release agent {agent} for controller {controller}");
	}

	Ok(ReleaseAgentStatus {
		newly_installed,
		newly_enabled,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	#[test]
	fn test_install_agent_file_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("release_agent");
		fs::write(&path, "\n").unwrap();

		assert!(install_agent_file(&path, "/usr/lib/agent").unwrap());
		assert_eq!(fs::read_to_string(&path).unwrap(), "/usr/lib/agent\n");

		// Second install with the same path changes nothing.
		assert!(!install_agent_file(&path, "/usr/lib/agent").unwrap());
		assert_eq!(fs::read_to_string(&path).unwrap(), "/usr/lib/agent\n");
	}

	#[test]
	fn test_install_agent_file_conflict() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("release_agent");
		fs::write(&path, "/other/agent\n").unwrap();

		assert!(matches!(
			install_agent_file(&path, "/usr/lib/agent"),
			Err(CgError::Conflict { .. })
		));
		assert_eq!(fs::read_to_string(&path).unwrap(), "/other/agent\n");
	}

	#[test]
	fn test_enable_notify_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("notify_on_release");

		fs::write(&path, "0\n").unwrap();
		assert!(enable_notify_file(&path).unwrap());
		assert_eq!(fs::read_to_string(&path).unwrap(), "1\n");

		assert!(!enable_notify_file(&path).unwrap());

		fs::write(&path, "surprise\n").unwrap();
		assert!(matches!(
			enable_notify_file(&path),
			Err(CgError::UnexpectedValue { .. })
		));
	}
}
