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

//! Small path and file helpers shared by the rest of the crate.

use crate::error::Result;
use nix::sys::stat;
use std::fs;
use std::path::Path;

const PATH_MAX: usize = 4096;
const UNIT_NAME_MAX: usize = 255;

/// Collapses runs of slashes into single slashes.
pub(crate) fn kill_slashes(path: &str) -> String {
	let mut out = String::with_capacity(path.len());
	let mut last_slash = false;
	for c in path.chars() {
		if c == '/' {
			if !last_slash {
				out.push(c);
			}
			last_slash = true;
		} else {
			out.push(c);
			last_slash = false;
		}
	}
	out
}

/// A path is safe if it is non-empty, of sane length, and contains no "." or
/// ".." components. Both relative and absolute paths are accepted.
pub(crate) fn path_is_safe(path: &str) -> bool {
	if path.is_empty() || path.len() > PATH_MAX {
		return false;
	}
	path.split('/').all(|c| c != "." && c != "..")
}

/// A filename is safe if it is a single non-trivial path component.
pub(crate) fn filename_is_safe(name: &str) -> bool {
	!name.is_empty() && name.len() <= PATH_MAX && name != "." && name != ".." && !name.contains('/')
}

/// Checks whether `name` is a syntactically valid unit name, such as
/// "crond.service" or, with `allow_instance`, "getty@tty1.service".
pub(crate) fn unit_name_is_valid(name: &str, allow_instance: bool) -> bool {
	if name.is_empty() || name.len() > UNIT_NAME_MAX {
		return false;
	}
	if !name
		.chars()
		.all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | ':' | '-' | '_' | '.' | '\\'))
	{
		return false;
	}
	let Some(dot) = name.rfind('.') else {
		return false;
	};
	if dot == 0 || dot + 1 == name.len() {
		return false;
	}
	if let Some(at) = name.find('@') {
		if !allow_instance || at == 0 || at > dot {
			return false;
		}
	}
	true
}

/// Reads the first line of a file, without the trailing newline.
pub(crate) fn read_one_line_file(path: &Path) -> Result<String> {
	let contents = fs::read_to_string(path)?;
	Ok(contents.lines().next().unwrap_or("").to_string())
}

pub(crate) fn write_string_file(path: &Path, contents: &str) -> Result<()> {
	fs::write(path, contents)?;
	Ok(())
}

/// Checks whether `path` is the root of a mounted filesystem, by comparing
/// the device of the path with the device of its parent directory.
pub(crate) fn path_is_mount_point(path: &str) -> Result<bool> {
	let here = stat::lstat(path)?;
	let parent = stat::lstat(&*format!("{path}/.."))?;
	Ok(here.st_dev != parent.st_dev || here.st_ino == parent.st_ino)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_kill_slashes() {
		assert_eq!(kill_slashes("/a//b///c"), "/a/b/c");
		assert_eq!(kill_slashes("a/b"), "a/b");
		assert_eq!(kill_slashes("//"), "/");
		assert_eq!(kill_slashes(""), "");
	}

	#[test]
	fn test_path_is_safe() {
		assert!(path_is_safe("/a/b"));
		assert!(path_is_safe("a/b"));
		assert!(path_is_safe("/"));
		assert!(!path_is_safe(""));
		assert!(!path_is_safe("/a/../b"));
		assert!(!path_is_safe("./a"));
		assert!(!path_is_safe(".."));
	}

	#[test]
	fn test_filename_is_safe() {
		assert!(filename_is_safe("cpu"));
		assert!(filename_is_safe("name=systemd"));
		assert!(!filename_is_safe(""));
		assert!(!filename_is_safe("."));
		assert!(!filename_is_safe(".."));
		assert!(!filename_is_safe("a/b"));
	}

	#[test]
	fn test_unit_name_is_valid() {
		assert!(unit_name_is_valid("crond.service", false));
		assert!(unit_name_is_valid("getty@tty1.service", true));
		assert!(!unit_name_is_valid("getty@tty1.service", false));
		assert!(!unit_name_is_valid("@tty1.service", true));
		assert!(!unit_name_is_valid("noext", false));
		assert!(!unit_name_is_valid(".service", false));
		assert!(!unit_name_is_valid("bad name.service", false));
		assert!(!unit_name_is_valid("", false));
	}

	#[test]
	fn test_read_one_line_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("value");
		std::fs::write(&path, "hello\nworld\n").unwrap();
		assert_eq!(read_one_line_file(&path).unwrap(), "hello");
		std::fs::write(&path, "").unwrap();
		assert_eq!(read_one_line_file(&path).unwrap(), "");
	}
}
