//! The machine being provisioned.
//!
//! Every side effect the runner has on the system outside of plain file edits
//! goes through [`Host`]: running commands, resolving binaries on `PATH`,
//! fetching installer scripts and cloning repositories. [`RealHost`] does it
//! for real (or prints it in dry-run mode); tests use `FakeHost`.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::common::shell::display_command;
use crate::error::CommandError;

#[cfg(test)]
pub mod fake;

pub trait Host {
    fn dry_run(&self) -> bool;

    /// Run a command attached to the terminal; non-zero exit is an error.
    fn run(&self, command: &mut Command) -> Result<()>;

    /// Run a command with `input` piped to stdin.
    fn run_with_input(&self, command: &mut Command, input: &str) -> Result<()>;

    /// Run a command silently and report whether it succeeded. Used for
    /// "already applied" predicates, so it also runs in dry-run mode.
    fn succeeds(&self, command: &mut Command) -> bool;

    /// Run a command silently and return its stdout, or `None` on failure.
    fn capture(&self, command: &mut Command) -> Option<String>;

    /// Whether `program` resolves on the search path.
    fn resolves(&self, program: &str) -> bool;

    /// Download a script over HTTPS.
    fn fetch(&self, url: &str) -> Result<String>;

    fn clone_repo(&self, url: &str, target: &Path, depth: Option<i32>) -> Result<()>;
}

/// Runs everything against the live system.
pub struct RealHost {
    dry_run: bool,
}

impl RealHost {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    fn print_dry_run(&self, command: &Command, input: Option<&str>) {
        let cmd_str = display_command(command);
        match input {
            Some(input_str) if input_str.contains('\n') => {
                println!("[DRY RUN] --- BEGIN COMMAND ---");
                println!("> {}", cmd_str);
                println!("{}", input_str.trim());
                println!("[DRY RUN] --- END COMMAND ---");
            }
            Some(input_str) => println!("[DRY RUN] echo '{}' | {}", input_str, cmd_str),
            None => println!("[DRY RUN] {}", cmd_str),
        }
    }
}

/// Translate a prepared std command into a duct expression so stdin and
/// output capture can be handled by duct.
fn to_expression(command: &Command) -> duct::Expression {
    let mut expression = duct::cmd(command.get_program(), command.get_args());
    if let Some(dir) = command.get_current_dir() {
        expression = expression.dir(dir);
    }
    for (key, value) in command.get_envs() {
        expression = match value {
            Some(value) => expression.env(key, value),
            None => expression.env_remove(key),
        };
    }
    expression
}

impl Host for RealHost {
    fn dry_run(&self) -> bool {
        self.dry_run
    }

    fn run(&self, command: &mut Command) -> Result<()> {
        if self.dry_run {
            self.print_dry_run(command, None);
            return Ok(());
        }
        let status = command.status().map_err(|source| CommandError::Spawn {
            program: command.get_program().to_string_lossy().into_owned(),
            source,
        })?;
        if !status.success() {
            return Err(CommandError::Failed {
                command: display_command(command),
                status,
            }
            .into());
        }
        Ok(())
    }

    fn run_with_input(&self, command: &mut Command, input: &str) -> Result<()> {
        if self.dry_run {
            self.print_dry_run(command, Some(input));
            return Ok(());
        }
        let output = to_expression(command)
            .stdin_bytes(input.as_bytes().to_vec())
            .stdout_null()
            .unchecked()
            .run()
            .map_err(|source| CommandError::Spawn {
                program: command.get_program().to_string_lossy().into_owned(),
                source,
            })?;
        if !output.status.success() {
            return Err(CommandError::Failed {
                command: display_command(command),
                status: output.status,
            }
            .into());
        }
        Ok(())
    }

    fn succeeds(&self, command: &mut Command) -> bool {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn capture(&self, command: &mut Command) -> Option<String> {
        let output = to_expression(command)
            .stdin_null()
            .stdout_capture()
            .stderr_null()
            .unchecked()
            .run()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn resolves(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn fetch(&self, url: &str) -> Result<String> {
        if self.dry_run {
            println!("[DRY RUN] fetch {}", url);
            return Ok(String::new());
        }
        let client = reqwest::blocking::Client::builder()
            .https_only(true)
            .build()
            .context("building HTTPS client")?;
        let response = client
            .get(url)
            .send()
            .with_context(|| format!("fetching {}", url))?
            .error_for_status()
            .with_context(|| format!("fetching {}", url))?;
        response
            .text()
            .with_context(|| format!("reading response from {}", url))
    }

    fn clone_repo(&self, url: &str, target: &Path, depth: Option<i32>) -> Result<()> {
        if self.dry_run {
            let depth = depth.map(|d| format!(" --depth {}", d)).unwrap_or_default();
            println!("[DRY RUN] git clone{} {} {}", depth, url, target.display());
            return Ok(());
        }
        crate::common::git::clone_repo(url, target, depth)
    }
}

/// Write `script` to a temporary file and run it with `sh`, passing `args`
/// and `env`. The file is removed once the script exits.
pub fn run_script(
    host: &dyn Host,
    script: &str,
    args: &[String],
    env: &[(&str, String)],
) -> Result<()> {
    let mut file = tempfile::Builder::new()
        .prefix("archwsl-installer-")
        .suffix(".sh")
        .tempfile()
        .context("creating temporary installer file")?;
    file.write_all(script.as_bytes())
        .context("writing installer script")?;
    file.flush().context("writing installer script")?;

    let mut cmd = Command::new("sh");
    cmd.arg(file.path()).args(args);
    for (key, value) in env {
        cmd.env(key, value);
    }
    host.run(&mut cmd)
}
