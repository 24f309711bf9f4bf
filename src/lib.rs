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

//! This package manipulates legacy control group (cgroups v1) hierarchies via the cgroupfs, providing the primitives a service manager needs to place, track, signal and tear down groups of processes.
//!
//! The managed processes are assumed to be uncooperative: they may fork, exit or move between groups at any time. Every multi-pass loop in this crate exists to tolerate those races, not to parallelize anything; all operations are synchronous and blocking.
//!
//! The main entry point is [`CGroup`], a (controller, relative path) address of one cgroup directory. On top of it sit:
//!
//! - recursive signal delivery with retry-until-quiescent semantics ([`CGroup::kill_recursive`], [`CGroup::kill_recursive_and_wait`]);
//! - recursive migration of processes between groups ([`CGroup::migrate_recursive_to`], [`CGroup::delete`]);
//! - trimming of empty, unprotected subtrees ([`CGroup::trim`]);
//! - access control on membership files ([`CGroup::set_task_access`]);
//! - the textual `controller:path` addressing syntax ([`CGroupSpec`]) and the mapping between cgroup paths and unit names ([`cgroup_to_unit`], [`pid_get_unit`]);
//! - idempotent release-agent installation ([`install_release_agent`]).
//!
//! The companion `cg1util` binary exposes the same operations on the command line.

mod access;
mod agent;
mod cgroup;
mod enumerate;
mod error;
mod kill;
mod migrate;
mod spec;
mod trim;
mod util;

pub use access::file_is_priv_sticky;
pub use agent::{install_release_agent, ReleaseAgentStatus};
pub use cgroup::{
	cgroup_path, cgroup_path_checked, shorten_controllers, CGroup, CGROUP_ROOT,
	SYSTEMD_CGROUP_CONTROLLER,
};
pub use enumerate::{ProcIter, SubgroupIter};
pub use error::{CgError, Result};
pub use kill::CgFlags;
pub use spec::{
	cgroup_by_pid, cgroup_to_unit, controller_from_attr, fix_path, is_empty_by_spec, join_spec,
	pid_get_cgroup, pid_get_unit, pid_get_user_unit, user_path, CGroupSpec,
};
