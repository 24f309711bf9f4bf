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

//! The textual "controller:path" addressing syntax, process location lookup
//! through `/proc`, and the mapping between cgroup paths and unit names.

use crate::cgroup::{self, CGroup, CGROUP_ROOT, SYSTEMD_CGROUP_CONTROLLER};
use crate::error::{CgError, Result};
use crate::util;
use nix::unistd::{getpid, Pid};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A parsed textual control group address. Three shapes exist:
///
/// - `cpu:/a/b` — controller and path;
/// - `/a/b` — a bare path, addressed in the private hierarchy;
/// - `cpu` — a bare controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CGroupSpec {
	pub controller: Option<String>,
	pub path: Option<String>,
}

impl CGroupSpec {
	pub fn parse(spec: &str) -> Result<Self> {
		if spec.starts_with('/') {
			if !util::path_is_safe(spec) {
				return Err(CgError::InvalidArgument(format!("unsafe path {spec:?}")));
			}
			return Ok(Self {
				controller: None,
				path: Some(spec.to_string()),
			});
		}

		let Some((controller, path)) = spec.split_once(':') else {
			if !util::filename_is_safe(spec) {
				return Err(CgError::InvalidArgument(format!(
					"unsafe controller name {spec:?}"
				)));
			}
			return Ok(Self {
				controller: Some(spec.to_string()),
				path: None,
			});
		};

		if !util::filename_is_safe(controller) {
			return Err(CgError::InvalidArgument(format!(
				"unsafe controller name {controller:?}"
			)));
		}
		if !path.starts_with('/') || !util::path_is_safe(path) {
			return Err(CgError::InvalidArgument(format!("unsafe path {path:?}")));
		}

		Ok(Self {
			controller: Some(controller.to_string()),
			path: Some(path.to_string()),
		})
	}
}

impl fmt::Display for CGroupSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (&self.controller, &self.path) {
			(Some(c), Some(p)) => write!(f, "{c}:{p}"),
			(Some(c), None) => f.write_str(c),
			(None, Some(p)) => f.write_str(p),
			(None, None) => Ok(()),
		}
	}
}

/// Serializes a (controller, absolute path) pair back into spec syntax, the
/// exact inverse of [`CGroupSpec::parse`] for well-formed input.
pub fn join_spec(controller: &str, path: &str) -> Result<String> {
	if controller.is_empty() || controller.contains(':') || controller.contains('/') {
		return Err(CgError::InvalidArgument(format!(
			"invalid controller {controller:?}"
		)));
	}
	if !path.starts_with('/') {
		return Err(CgError::InvalidArgument(format!(
			"path {path:?} is not absolute"
		)));
	}
	Ok(format!("{controller}:{path}"))
}

impl CGroup {
	/// Builds a location from spec syntax, defaulting the controller to the
	/// private hierarchy and the path to the hierarchy root.
	pub fn from_spec(spec: &str) -> Result<Self> {
		let spec = CGroupSpec::parse(spec)?;
		let path = spec.path.as_deref().unwrap_or("/");
		Ok(match spec.controller {
			Some(c) => CGroup::new(Some(&c), path),
			None => CGroup::systemd(path),
		})
	}
}

/// Whether the subtree addressed by a spec holds no tasks.
pub fn is_empty_by_spec(spec: &str, ignore_self: bool) -> Result<bool> {
	CGroup::from_spec(spec)?.is_empty(ignore_self)
}

/// Turns user input into an absolute cgroup filesystem path: a path that
/// already points below the mount root and exists is taken verbatim,
/// anything else is parsed as a spec and resolved.
pub fn fix_path(input: &str) -> Result<PathBuf> {
	let as_path = Path::new(input);
	if as_path.starts_with(CGROUP_ROOT) && as_path.exists() {
		return Ok(PathBuf::from(input));
	}

	let spec = CGroupSpec::parse(input)?;
	cgroup::cgroup_path(
		Some(spec.controller.as_deref().unwrap_or(SYSTEMD_CGROUP_CONTROLLER)),
		Some(spec.path.as_deref().unwrap_or("/")),
		None,
	)
}

/// Looks up a process's current path in the given controller's hierarchy by
/// reading `/proc/<pid>/cgroup`. Pid 0 means the calling process.
pub fn cgroup_by_pid(controller: &str, pid: Pid) -> Result<String> {
	let pid = if pid.as_raw() == 0 { getpid() } else { pid };

	let file = match File::open(format!("/proc/{pid}/cgroup")) {
		Ok(file) => file,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			return Err(CgError::NoSuchProcess(pid))
		}
		Err(e) => return Err(e.into()),
	};

	for line in BufReader::new(file).lines() {
		let line = line?;
		if let Some(path) = match_cgroup_line(&line, controller) {
			return Ok(path.to_string());
		}
	}

	Err(CgError::NotFound)
}

// Each line of /proc/<pid>/cgroup reads "hierarchy-id:controller-list:path".
// Only an exact controller-list match counts: "cpu" does not match a line
// for the joint "cpu,cpuacct" hierarchy.
fn match_cgroup_line<'a>(line: &'a str, controller: &str) -> Option<&'a str> {
	let (_, rest) = line.split_once(':')?;
	let (list, path) = rest.split_once(':')?;
	(list == controller).then_some(path)
}

// Pid 1 normally lives in ".../system"; the prefix above that is the root
// both the /system and /user trees hang from. Pid 1 at the hierarchy root
// means there is no shared prefix at all.
fn normalize_init_root(mut root: String) -> String {
	if root.ends_with("/system") {
		root.truncate(root.len() - "/system".len());
	} else if root == "/" {
		root.clear();
	}
	root
}

fn init_root() -> Result<String> {
	Ok(normalize_init_root(cgroup_by_pid(
		SYSTEMD_CGROUP_CONTROLLER,
		Pid::from_raw(1),
	)?))
}

/// Resolves a process's location in the private hierarchy, split into the
/// root prefix shared with pid 1 and the remainder below it.
pub fn pid_get_cgroup(pid: Pid) -> Result<(String, String)> {
	let process = cgroup_by_pid(SYSTEMD_CGROUP_CONTROLLER, pid)?;
	let init = init_root()?;

	if let Some(rest) = process.strip_prefix(&*init) {
		Ok((init, rest.to_string()))
	} else {
		Ok((String::new(), process))
	}
}

/// Where to place per-user workloads: pid 1's root with the `/system` suffix
/// replaced by `/user`.
pub fn user_path() -> Result<String> {
	match init_root() {
		Ok(mut root) => {
			root.push_str("/user");
			Ok(root)
		}
		Err(_) => Ok("/user".to_string()),
	}
}

/// Splices a hoisted instance path segment back into its template: in
/// `…/getty@.service/tty1` the segment after the marker directory is the
/// instance, and belongs directly after the `@` of the flat unit name.
fn recombine_instance(cgroup: &str) -> Result<String> {
	let Some(at) = cgroup.find("@.") else {
		return Ok(cgroup.to_string());
	};

	let after_at = &cgroup[at + 1..];
	let Some(slash) = after_at.find('/') else {
		return Err(CgError::InvalidArgument(format!(
			"template {cgroup:?} has no instance segment"
		)));
	};
	let suffix = &after_at[..slash];
	let instance = &after_at[slash + 1..];
	if instance.is_empty() {
		return Err(CgError::InvalidArgument(format!(
			"template {cgroup:?} has an empty instance"
		)));
	}

	Ok(format!("{}{instance}{suffix}", &cgroup[..=at]))
}

/// Converts a cgroup path to the unit name of the workload it tracks: the
/// final path segment, with a hoisted instance segment folded back in.
pub fn cgroup_to_unit(cgroup: &str) -> Result<String> {
	let recombined = recombine_instance(cgroup)?;
	let unit = match recombined.rfind('/') {
		Some(idx) => &recombined[idx + 1..],
		None => &recombined,
	};

	if !util::unit_name_is_valid(unit, true) {
		return Err(CgError::InvalidUnitName(unit.to_string()));
	}
	Ok(unit.to_string())
}

fn pid_get(prefix: &str, pid: Pid) -> Result<String> {
	let (_root, cgroup) = pid_get_cgroup(pid)?;
	if !cgroup.starts_with(prefix) {
		return Err(CgError::NotFound);
	}
	cgroup_to_unit(&cgroup)
}

/// The system unit a process belongs to.
pub fn pid_get_unit(pid: Pid) -> Result<String> {
	pid_get("/system/", pid)
}

/// The user-session unit a process belongs to.
pub fn pid_get_user_unit(pid: Pid) -> Result<String> {
	pid_get("/user/", pid)
}

/// Extracts the controller from an attribute name such as `cpu.shares`.
/// Returns `None` for attribute names without a controller part.
pub fn controller_from_attr(attr: &str) -> Result<Option<String>> {
	if !util::filename_is_safe(attr) {
		return Err(CgError::InvalidArgument(format!(
			"unsafe attribute name {attr:?}"
		)));
	}

	let Some((controller, _)) = attr.split_once('.') else {
		return Ok(None);
	};
	if !util::filename_is_safe(controller) {
		return Err(CgError::InvalidArgument(format!(
			"unsafe controller name {controller:?}"
		)));
	}
	Ok(Some(controller.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_controller_and_path() {
		insta::assert_compact_debug_snapshot!(CGroupSpec::parse("cpu:/a/b").unwrap(), @r#"CGroupSpec { controller: Some("cpu"), path: Some("/a/b") }"#);
	}

	#[test]
	fn test_parse_bare_path() {
		let spec = CGroupSpec::parse("/a/b").unwrap();
		assert_eq!(spec.controller, None);
		assert_eq!(spec.path.as_deref(), Some("/a/b"));
	}

	#[test]
	fn test_parse_bare_controller() {
		let spec = CGroupSpec::parse("cpu").unwrap();
		assert_eq!(spec.controller.as_deref(), Some("cpu"));
		assert_eq!(spec.path, None);
	}

	#[test]
	fn test_parse_rejects_unsafe_input() {
		assert!(CGroupSpec::parse("").is_err());
		assert!(CGroupSpec::parse("/a/../b").is_err());
		assert!(CGroupSpec::parse("c/pu:/a").is_err());
		assert!(CGroupSpec::parse("cpu:a/b").is_err());
		assert!(CGroupSpec::parse("cpu:/a/./b").is_err());
		assert!(CGroupSpec::parse("..").is_err());
	}

	#[test]
	fn test_spec_round_trip() {
		for input in ["cpu:/a/b", "name=systemd:/", "memory:/x"] {
			let spec = CGroupSpec::parse(input).unwrap();
			let joined =
				join_spec(spec.controller.as_deref().unwrap(), spec.path.as_deref().unwrap())
					.unwrap();
			assert_eq!(joined, input);
			assert_eq!(spec.to_string(), input);
		}
	}

	#[test]
	fn test_join_spec_rejects_invalid_halves() {
		assert!(join_spec("", "/a").is_err());
		assert!(join_spec("c:pu", "/a").is_err());
		assert!(join_spec("c/pu", "/a").is_err());
		assert!(join_spec("cpu", "a/b").is_err());
	}

	#[test]
	fn test_recombine_instance() {
		assert_eq!(
			recombine_instance("/system/getty@.service/tty1").unwrap(),
			"/system/getty@tty1.service"
		);
		assert_eq!(recombine_instance("/system/crond.service").unwrap(), "/system/crond.service");
		assert!(recombine_instance("/system/getty@.service").is_err());
		assert!(recombine_instance("/system/getty@.service/").is_err());
	}

	#[test]
	fn test_cgroup_to_unit() {
		assert_eq!(cgroup_to_unit("/system/crond.service").unwrap(), "crond.service");
		assert_eq!(
			cgroup_to_unit("/system/getty@.service/tty1").unwrap(),
			"getty@tty1.service"
		);
		assert!(matches!(
			cgroup_to_unit("/system/not a unit"),
			Err(CgError::InvalidUnitName(_))
		));
	}

	#[test]
	fn test_match_cgroup_line() {
		assert_eq!(match_cgroup_line("3:cpu:/x", "cpu"), Some("/x"));
		assert_eq!(match_cgroup_line("3:cpu,cpuacct:/x", "cpu"), None);
		assert_eq!(match_cgroup_line("3:cpu,cpuacct:/x", "cpuacct"), None);
		assert_eq!(match_cgroup_line("3:cpu,cpuacct:/x", "cpu,cpuacct"), Some("/x"));
		assert_eq!(
			match_cgroup_line("1:name=systemd:/system/crond.service", "name=systemd"),
			Some("/system/crond.service")
		);
		assert_eq!(match_cgroup_line("garbage", "cpu"), None);
		assert_eq!(match_cgroup_line("", "cpu"), None);
	}

	#[test]
	fn test_normalize_init_root() {
		assert_eq!(normalize_init_root("/system".to_string()), "");
		assert_eq!(normalize_init_root("/nested/system".to_string()), "/nested");
		assert_eq!(normalize_init_root("/".to_string()), "");
		assert_eq!(normalize_init_root("/elsewhere".to_string()), "/elsewhere");
	}

	#[test]
	fn test_from_spec_defaults() {
		let cg = CGroup::from_spec("/a/b").unwrap();
		assert_eq!(cg.controller(), Some(SYSTEMD_CGROUP_CONTROLLER));
		assert_eq!(cg.path(), "/a/b");

		let cg = CGroup::from_spec("cpu").unwrap();
		assert_eq!(cg.controller(), Some("cpu"));
		assert_eq!(cg.path(), "/");
	}

	#[test]
	fn test_controller_from_attr() {
		assert_eq!(controller_from_attr("cpu.shares").unwrap().as_deref(), Some("cpu"));
		assert_eq!(controller_from_attr("plain").unwrap(), None);
		assert!(controller_from_attr("a/b.c").is_err());
		assert!(controller_from_attr("").is_err());
	}
}
