//! Phase 1: system bootstrap as root.

use anyhow::{Context, Result, bail};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::Provisioner;
use crate::common::paths;
use crate::edit;
use crate::error::CommandError;
use crate::ui::prelude::*;

/// useradd: "username already in use"
const USERADD_EXISTS: i32 = 9;

pub(super) fn system_upgrade(p: &Provisioner) -> Result<()> {
    let mut cmd = p.privileged("pacman");
    cmd.args(["-Syu", "--noconfirm"]);
    p.host.run(&mut cmd)
}

pub(super) fn user_exists(p: &Provisioner) -> bool {
    let mut cmd = Command::new("getent");
    cmd.arg("passwd").arg(&p.config.user.name);
    p.host.succeeds(&mut cmd)
}

pub(super) fn create_user(p: &Provisioner) -> Result<()> {
    let user = &p.config.user;
    let mut cmd = p.privileged("useradd");
    cmd.arg("-m")
        .arg("-d")
        .arg(&p.home)
        .arg("-s")
        .arg(&user.shell)
        .arg(&user.name);

    match p.host.run(&mut cmd) {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast_ref::<CommandError>() {
            Some(CommandError::Failed { status, .. }) if status.code() == Some(USERADD_EXISTS) => {
                emit(
                    Level::Warn,
                    "user.exists",
                    &format!(
                        "{} User '{}' already exists, continuing",
                        char::from(NerdFont::Warning),
                        user.name
                    ),
                    None,
                );
                Ok(())
            }
            _ => Err(err),
        },
    }
}

/// `passwd -S` prints `name STATUS ...` where STATUS is P for a usable
/// password, L for locked and NP for none.
pub(super) fn password_set(p: &Provisioner) -> bool {
    let mut cmd = Command::new("passwd");
    cmd.arg("-S").arg(&p.config.user.name);
    p.host
        .capture(&mut cmd)
        .and_then(|out| out.split_whitespace().nth(1).map(|s| s == "P"))
        .unwrap_or(false)
}

pub(super) fn set_password(p: &Provisioner) -> Result<()> {
    let name = &p.config.user.name;
    if p.host.dry_run() {
        println!("[DRY RUN] prompt for a password and pipe it to chpasswd for {}", name);
        return Ok(());
    }

    let password = p
        .prompt
        .new_password(&format!("{} Password for {}", char::from(NerdFont::Key), name))?;
    let mut cmd = p.privileged("chpasswd");
    p.host
        .run_with_input(&mut cmd, &format!("{}:{}\n", name, password))
        .with_context(|| format!("setting password for {}", name))
}

fn user_groups(p: &Provisioner) -> Vec<String> {
    let mut cmd = Command::new("id");
    cmd.arg("-nG").arg(&p.config.user.name);
    p.host
        .capture(&mut cmd)
        .map(|out| out.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn sudoers_rule_active(p: &Provisioner) -> bool {
    p.editor()
        .read(&p.config.paths.sudoers)
        .map(|content| edit::is_uncommented(&content, &p.config.user.sudoers_rule()))
        .unwrap_or(false)
}

pub(super) fn sudo_granted(p: &Provisioner) -> bool {
    user_groups(p).contains(&p.config.user.admin_group) && sudoers_rule_active(p)
}

pub(super) fn grant_sudo(p: &Provisioner) -> Result<()> {
    let user = &p.config.user;
    if !user_groups(p).contains(&user.admin_group) {
        let mut cmd = p.privileged("usermod");
        cmd.arg("-aG").arg(&user.admin_group).arg(&user.name);
        p.host.run(&mut cmd)?;
    }

    let sudoers = &p.config.paths.sudoers;
    let editor = p.editor();
    let content = editor.read(sudoers)?;
    let Some(updated) = edit::ensure_uncommented(&content, &user.sudoers_rule()) else {
        return Ok(());
    };
    validate_sudoers(p, &updated)?;
    editor.write(sudoers, &updated, p.elevation())
}

/// A broken sudoers file locks everyone out of sudo, so every new version is
/// checked with `visudo` before it replaces the old one.
fn validate_sudoers(p: &Provisioner, content: &str) -> Result<()> {
    if p.host.dry_run() {
        return Ok(());
    }
    let mut candidate = tempfile::Builder::new()
        .prefix("archwsl-sudoers-")
        .tempfile()
        .context("creating temporary sudoers file")?;
    candidate
        .write_all(content.as_bytes())
        .context("writing temporary sudoers file")?;
    candidate.flush().context("writing temporary sudoers file")?;

    let mut check = Command::new("visudo");
    check.arg("-c").arg("-f").arg(candidate.path());
    if !p.host.succeeds(&mut check) {
        bail!(
            "refusing to write {}: visudo rejected the updated policy",
            p.config.paths.sudoers.display()
        );
    }
    Ok(())
}

pub(super) fn default_user_set(p: &Provisioner) -> bool {
    p.editor()
        .read_or_empty(&p.config.paths.wsl_conf)
        .ok()
        .and_then(|content| edit::ini_value(&content, "user", "default"))
        .is_some_and(|value| value == p.config.user.name)
}

pub(super) fn set_default_user(p: &Provisioner) -> Result<()> {
    p.editor().ensure_ini_value(
        &p.config.paths.wsl_conf,
        "user",
        "default",
        &p.config.user.name,
        p.elevation(),
    )?;
    Ok(())
}

/// Copy the running binary, and the config it was started with, into the
/// target user's home so the second phase can be started from there.
pub(super) fn stage_runner(p: &Provisioner) -> Result<()> {
    let runner = p.home.join(paths::STAGED_RUNNER);
    stage_file(p, &p.staged.runner, &runner, Some(0o755))?;

    if let Some(config) = &p.staged.config {
        let target = p.home.join(paths::CONFIG_RELATIVE);
        stage_file(p, config, &target, None)?;
    }
    Ok(())
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Directories between `home` and `target` that do not exist yet, outermost first.
fn missing_dirs(home: &Path, target: &Path) -> Vec<PathBuf> {
    let mut missing: Vec<PathBuf> = target
        .ancestors()
        .skip(1)
        .take_while(|dir| dir.starts_with(home) && *dir != home)
        .filter(|dir| !dir.exists())
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    missing
}

fn stage_file(p: &Provisioner, source: &Path, target: &Path, mode: Option<u32>) -> Result<()> {
    if is_same_file(source, target) {
        emit(
            Level::Debug,
            "stage.same_file",
            &format!("{} is already in place", target.display()),
            None,
        );
        return Ok(());
    }

    let created = missing_dirs(&p.home, target);
    if p.host.dry_run() {
        println!("[DRY RUN] copy {} -> {}", source.display(), target.display());
    } else {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::copy(source, target).with_context(|| {
            format!("copying {} to {}", source.display(), target.display())
        })?;
        if let Some(mode) = mode {
            fs::set_permissions(target, fs::Permissions::from_mode(mode))
                .with_context(|| format!("setting permissions on {}", target.display()))?;
        }
    }

    let owner = format!("{0}:{0}", p.config.user.name);
    let mut chown = p.privileged("chown");
    chown.arg(&owner).args(&created).arg(target);
    p.host.run(&mut chown)
}

pub(super) fn print_restart_guidance(p: &Provisioner) {
    let distro = std::env::var("WSL_DISTRO_NAME").unwrap_or_else(|_| "<distro>".to_string());
    let name = &p.config.user.name;
    separator(true);
    emit(
        Level::Success,
        "phase.root.complete",
        &format!(
            "{} Bootstrap complete. The session must be restarted as '{}'.",
            char::from(NerdFont::Check),
            name
        ),
        Some(serde_json::json!({ "user": name, "distro": distro })),
    );
    emit(
        Level::Info,
        "phase.root.restart",
        &format!(
            "{} From Windows run: wsl.exe --terminate {}",
            char::from(NerdFont::Refresh),
            distro
        ),
        None,
    );
    emit(
        Level::Info,
        "phase.root.next",
        &format!(
            "{} Then reopen the distribution and run ~/{} to continue",
            char::from(NerdFont::Rocket),
            paths::STAGED_RUNNER
        ),
        None,
    );
}
