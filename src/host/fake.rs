//! An in-memory stand-in for an Arch system.
//!
//! It keeps just enough state (users, groups, passwords, packages, binaries on
//! `PATH`, GitHub auth) for the step predicates to observe the effect of the
//! step actions, so idempotence can be tested by simply running a phase twice.
//! File system effects (homes, clones, `tee`) happen for real inside the
//! test's temp directory.

use anyhow::{Result, bail};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use super::Host;
use crate::common::shell::display_command;
use crate::error::CommandError;

#[derive(Debug, Clone)]
pub struct Invocation {
    pub line: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub dir: Option<PathBuf>,
    pub input: Option<String>,
}

impl Invocation {
    fn from_command(command: &Command, input: Option<&str>) -> Self {
        let mut program = command.get_program().to_string_lossy().into_owned();
        let mut args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let line = display_command(command);
        if program == "sudo" && !args.is_empty() {
            program = args.remove(0);
        }
        let env = command
            .get_envs()
            .filter_map(|(k, v)| {
                v.map(|v| {
                    (
                        k.to_string_lossy().into_owned(),
                        v.to_string_lossy().into_owned(),
                    )
                })
            })
            .collect();
        Self {
            line,
            program,
            args,
            env,
            dir: command.get_current_dir().map(Path::to_path_buf),
            input: input.map(str::to_string),
        }
    }

    fn last_arg(&self) -> &str {
        self.args.last().map(String::as_str).unwrap_or_default()
    }

    fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    fn positional(&self) -> Vec<&str> {
        self.args
            .iter()
            .filter(|a| !a.starts_with('-'))
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Default, Clone)]
pub struct FakeUser {
    pub groups: BTreeSet<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeSystem {
    pub users: HashMap<String, FakeUser>,
    pub packages: BTreeSet<String>,
    pub binaries: BTreeSet<String>,
    pub gh_authenticated: bool,
    /// Package name to the binaries it puts on PATH
    pub provides: HashMap<String, Vec<String>>,
    /// Command line prefixes that exit with status 1
    pub failing: Vec<String>,
}

pub struct FakeHost {
    system: RefCell<FakeSystem>,
    log: RefCell<Vec<Invocation>>,
    fetched: RefCell<Vec<String>>,
    clones: RefCell<Vec<(String, PathBuf, Option<i32>)>>,
}

fn status(code: i32) -> ExitStatus {
    ExitStatus::from_raw(code << 8)
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    pub fn new() -> Self {
        let mut system = FakeSystem::default();
        for (package, binaries) in [
            ("git", &["git"][..]),
            ("zsh", &["zsh"]),
            ("sudo", &["sudo"]),
            ("stow", &["stow"]),
            ("github-cli", &["gh"]),
            ("win32yank-bin", &["win32yank.exe"]),
        ] {
            system.provides.insert(
                package.to_string(),
                binaries.iter().map(|b| b.to_string()).collect(),
            );
        }
        Self {
            system: RefCell::new(system),
            log: RefCell::new(Vec::new()),
            fetched: RefCell::new(Vec::new()),
            clones: RefCell::new(Vec::new()),
        }
    }

    pub fn with_user(self, name: &str, groups: &[&str], password: Option<&str>) -> Self {
        self.system.borrow_mut().users.insert(
            name.to_string(),
            FakeUser {
                groups: groups.iter().map(|g| g.to_string()).collect(),
                password: password.map(str::to_string),
            },
        );
        self
    }

    pub fn with_binary(self, binary: &str) -> Self {
        self.system.borrow_mut().binaries.insert(binary.to_string());
        self
    }

    pub fn with_gh_auth(self) -> Self {
        self.system.borrow_mut().gh_authenticated = true;
        self
    }

    pub fn failing_on(self, prefix: &str) -> Self {
        self.system.borrow_mut().failing.push(prefix.to_string());
        self
    }

    pub fn system(&self) -> std::cell::Ref<'_, FakeSystem> {
        self.system.borrow()
    }

    /// Every mutating command line, in order
    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().iter().map(|i| i.line.clone()).collect()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.borrow().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter(|i| i.program == program)
            .map(|i| i.line.clone())
            .collect()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    pub fn clones(&self) -> Vec<(String, PathBuf, Option<i32>)> {
        self.clones.borrow().clone()
    }

    fn install(&self, packages: &[&str]) {
        let mut system = self.system.borrow_mut();
        for package in packages {
            system.packages.insert(package.to_string());
            if let Some(binaries) = system.provides.get(*package).cloned() {
                system.binaries.extend(binaries);
            }
        }
    }

    /// Apply the command to the simulated system. Returns the exit code.
    fn execute(&self, inv: &Invocation) -> Result<i32> {
        if self
            .system
            .borrow()
            .failing
            .iter()
            .any(|prefix| inv.line.starts_with(prefix.as_str()))
        {
            return Ok(1);
        }

        match inv.program.as_str() {
            "pacman" if inv.args.iter().any(|a| a == "-S") => {
                self.install(&inv.positional());
            }
            "yay" => {
                self.install(&[inv.last_arg()]);
            }
            "useradd" => {
                let name = inv.last_arg().to_string();
                if self.system.borrow().users.contains_key(&name) {
                    return Ok(9);
                }
                if let Some(home) = inv.flag_value("-d") {
                    fs::create_dir_all(home)?;
                }
                self.system
                    .borrow_mut()
                    .users
                    .insert(name, FakeUser::default());
            }
            "usermod" => {
                let name = inv.last_arg().to_string();
                let groups = inv.flag_value("-aG").unwrap_or_default().to_string();
                let mut system = self.system.borrow_mut();
                let Some(user) = system.users.get_mut(&name) else {
                    return Ok(6);
                };
                user.groups.extend(groups.split(',').map(str::to_string));
            }
            "chpasswd" => {
                let input = inv.input.clone().unwrap_or_default();
                let Some((name, password)) = input.trim().split_once(':') else {
                    return Ok(1);
                };
                let mut system = self.system.borrow_mut();
                let Some(user) = system.users.get_mut(name) else {
                    return Ok(1);
                };
                user.password = Some(password.to_string());
            }
            "tee" => {
                fs::write(inv.last_arg(), inv.input.clone().unwrap_or_default())?;
            }
            "makepkg" => {
                self.system.borrow_mut().binaries.insert("yay".to_string());
            }
            "sh" => {
                // oh-my-zsh installer: creates $ZSH and clobbers the profile
                if let Some(zsh_dir) = inv.env.get("ZSH") {
                    let zsh_dir = PathBuf::from(zsh_dir);
                    fs::create_dir_all(zsh_dir.join("custom/themes"))?;
                    if let Some(home) = zsh_dir.parent() {
                        fs::write(home.join(".zshrc"), "# oh-my-zsh template\n")?;
                    }
                } else {
                    self.system.borrow_mut().binaries.insert("rustup".to_string());
                }
            }
            "gh" if inv.args.first().map(String::as_str) == Some("repo") => {
                let target = inv.last_arg();
                fs::create_dir_all(target)?;
                for package in ["zsh", "nvim", "tmux"] {
                    fs::create_dir_all(Path::new(target).join(package))?;
                }
            }
            _ => {}
        }
        Ok(0)
    }

    fn record_and_execute(&self, command: &Command, input: Option<&str>) -> Result<()> {
        let inv = Invocation::from_command(command, input);
        self.log.borrow_mut().push(inv.clone());
        let code = self.execute(&inv)?;
        if code != 0 {
            return Err(CommandError::Failed {
                command: inv.line,
                status: status(code),
            }
            .into());
        }
        Ok(())
    }

    fn answer(&self, inv: &Invocation) -> Option<String> {
        let system = self.system.borrow();
        match (inv.program.as_str(), inv.args.first().map(String::as_str)) {
            ("getent", Some("passwd")) => system
                .users
                .get(inv.last_arg())
                .map(|_| format!("{}:x:1000:1000::/home/{}:/usr/bin/zsh\n", inv.last_arg(), inv.last_arg())),
            ("passwd", Some("-S")) => system.users.get(inv.last_arg()).map(|u| {
                let state = if u.password.is_some() { "P" } else { "L" };
                format!("{} {} 2026-10-16 0 99999 7 -1\n", inv.last_arg(), state)
            }),
            ("id", Some("-nG")) => system.users.get(inv.last_arg()).map(|u| {
                let mut groups = vec![inv.last_arg().to_string()];
                groups.extend(u.groups.iter().cloned());
                format!("{}\n", groups.join(" "))
            }),
            ("pacman", Some("-T")) => {
                let missing: Vec<&str> = inv.args[1..]
                    .iter()
                    .map(String::as_str)
                    .filter(|p| !system.packages.contains(*p))
                    .collect();
                missing.is_empty().then(String::new)
            }
            ("gh", Some("auth")) => system.gh_authenticated.then(String::new),
            ("visudo", _) => Some(String::new()),
            _ => None,
        }
    }
}

impl Host for FakeHost {
    fn dry_run(&self) -> bool {
        false
    }

    fn run(&self, command: &mut Command) -> Result<()> {
        self.record_and_execute(command, None)
    }

    fn run_with_input(&self, command: &mut Command, input: &str) -> Result<()> {
        self.record_and_execute(command, Some(input))
    }

    fn succeeds(&self, command: &mut Command) -> bool {
        self.capture(command).is_some()
    }

    fn capture(&self, command: &mut Command) -> Option<String> {
        let inv = Invocation::from_command(command, None);
        self.answer(&inv)
    }

    fn resolves(&self, program: &str) -> bool {
        self.system.borrow().binaries.contains(program)
    }

    fn fetch(&self, url: &str) -> Result<String> {
        if !url.starts_with("https://") {
            bail!("refusing to fetch {} over an insecure connection", url);
        }
        self.fetched.borrow_mut().push(url.to_string());
        Ok(format!("#!/bin/sh\n# installer from {}\n", url))
    }

    fn clone_repo(&self, url: &str, target: &Path, depth: Option<i32>) -> Result<()> {
        if target.exists() {
            bail!("destination {} already exists", target.display());
        }
        fs::create_dir_all(target)?;
        fs::write(target.join("README"), url)?;
        self.clones
            .borrow_mut()
            .push((url.to_string(), target.to_path_buf(), depth));
        Ok(())
    }
}
