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

use cg1tools::{install_release_agent, CGroup, CgFlags};
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use nix::sys::signal::Signal;

#[derive(Parser, Debug)]
#[command(version, about = "Manipulates legacy control group hierarchies (cgroups v1)")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Args, Debug)]
struct KillCommand {
	/// Control group to empty, as "controller:path", a bare absolute path
	/// (private hierarchy), or a bare controller name.
	#[arg()]
	cgroup: String,

	/// Send one SIGKILL pass instead of the full escalation protocol.
	#[arg(long)]
	now: bool,

	/// Remove emptied directories afterwards.
	#[arg(long)]
	remove: bool,
}

#[derive(Args, Debug)]
struct MigrateCommand {
	/// Source control group.
	#[arg()]
	from: String,

	/// Destination control group.
	#[arg()]
	to: String,

	/// Remove emptied source directories afterwards.
	#[arg(long)]
	remove: bool,
}

#[derive(Args, Debug)]
struct TrimCommand {
	/// Control group whose empty subgroups should be removed.
	#[arg()]
	cgroup: String,

	/// Also remove the group itself, sticky protection permitting.
	#[arg(long)]
	root: bool,
}

#[derive(Args, Debug)]
struct ReleaseAgentCommand {
	/// Controller to configure.
	#[arg()]
	controller: String,

	/// Absolute path of the agent binary the kernel should invoke.
	#[arg()]
	agent: String,
}

#[derive(Args, Debug)]
struct EmptyCommand {
	/// Control group to query.
	#[arg()]
	cgroup: String,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Recursively kills every process in a control group
	Kill(KillCommand),
	/// Recursively moves all processes to a different control group
	Migrate(MigrateCommand),
	/// Removes empty, unprotected subgroup directories
	Trim(TrimCommand),
	/// Installs the empty-cgroup notification agent for a controller
	ReleaseAgent(ReleaseAgentCommand),
	/// Reports whether a control group subtree holds any tasks
	Empty(EmptyCommand),
}

fn run(args: Cli) -> cg1tools::Result<()> {
	match args.command {
		Command::Kill(cmd_args) => {
			let cgroup = CGroup::from_spec(&cmd_args.cgroup)?;
			if cmd_args.now {
				let mut flags = CgFlags::SIGCONT | CgFlags::IGNORE_SELF;
				if cmd_args.remove {
					flags |= CgFlags::REMOVE;
				}
				cgroup.kill_recursive(Some(Signal::SIGKILL), flags, None)?;
			} else {
				cgroup.kill_recursive_and_wait(cmd_args.remove)?;
			}
		}
		Command::Migrate(cmd_args) => {
			let from = CGroup::from_spec(&cmd_args.from)?;
			let to = CGroup::from_spec(&cmd_args.to)?;
			let mut flags = CgFlags::IGNORE_SELF;
			if cmd_args.remove {
				flags |= CgFlags::REMOVE;
			}
			from.migrate_recursive_to(&to, flags)?;
		}
		Command::Trim(cmd_args) => {
			CGroup::from_spec(&cmd_args.cgroup)?.trim(cmd_args.root)?;
		}
		Command::ReleaseAgent(cmd_args) => {
			let status = install_release_agent(&cmd_args.controller, &cmd_args.agent)?;
			if status.newly_installed {
				println!("Installed release agent for {}", cmd_args.controller);
			} else {
				println!("Release agent for {} already installed", cmd_args.controller);
			}
		}
		Command::Empty(cmd_args) => {
			let empty = CGroup::from_spec(&cmd_args.cgroup)?.is_empty_recursive(true)?;
			println!("{}", if empty { "empty" } else { "not empty" });
		}
	}
	Ok(())
}

fn main() {
	env_logger::init();
	let args = Cli::parse();
	if let Err(e) = run(args) {
		eprintln!("cg1util: {e}");
		std::process::exit(1);
	}
}

#[test]
fn test_cli_kill() {
	fn cli(input: &str) -> Result<Cli, String> {
		Cli::try_parse_from(shlex::split(input).unwrap()).map_err(|e| format!("{e}"))
	}
	assert!(cli("cg1util").is_err());
	assert!(cli("cg1util kill").is_err());
	assert!(cli("cg1util kill cpu:/grp").is_ok());
	assert!(cli("cg1util kill /grp --remove").is_ok());
	assert!(cli("cg1util kill --now --remove cpu:/grp").is_ok());
	assert!(cli("cg1util kill cpu:/grp extra").is_err());
	assert!(cli("cg1util --remove kill cpu:/grp").is_err());
}

#[test]
fn test_cli_migrate() {
	fn cli(input: &str) -> Result<Cli, String> {
		Cli::try_parse_from(shlex::split(input).unwrap()).map_err(|e| format!("{e}"))
	}
	assert!(cli("cg1util migrate cpu:/a").is_err());
	assert!(cli("cg1util migrate cpu:/a cpu:/b").is_ok());
	assert!(cli("cg1util migrate cpu:/a cpu:/b --remove").is_ok());
	assert!(cli("cg1util migrate cpu:/a cpu:/b cpu:/c").is_err());
}

#[test]
fn test_cli_trim_and_agent() {
	fn cli(input: &str) -> Result<Cli, String> {
		Cli::try_parse_from(shlex::split(input).unwrap()).map_err(|e| format!("{e}"))
	}
	assert!(cli("cg1util trim /grp").is_ok());
	assert!(cli("cg1util trim /grp --root").is_ok());
	assert!(cli("cg1util release-agent cpu /usr/lib/agent").is_ok());
	assert!(cli("cg1util release-agent cpu").is_err());
	assert!(cli("cg1util empty cpu:/grp").is_ok());
}
