//! Phase 2: the target user's environment.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::Provisioner;
use crate::common::paths;
use crate::edit::{self, Elevation};
use crate::host::run_script;
use crate::ui::prelude::*;

const BACKUP_SUFFIX: &str = "archwsl-backup";

pub(super) fn create_profile(p: &Provisioner) -> Result<()> {
    let profile = p.profile_path();
    if p.host.dry_run() {
        println!("[DRY RUN] touch {}", profile.display());
        return Ok(());
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&profile)
        .with_context(|| format!("creating {}", profile.display()))?;
    Ok(())
}

fn locale_exports(p: &Provisioner) -> [(&'static str, String); 2] {
    let name = &p.config.locale.name;
    [
        ("export LANG=", format!("export LANG={}", name)),
        ("export LC_ALL=", format!("export LC_ALL={}", name)),
    ]
}

fn profile_contents(p: &Provisioner) -> String {
    p.editor().read_or_empty(&p.profile_path()).unwrap_or_default()
}

pub(super) fn locale_configured(p: &Provisioner) -> bool {
    let generated = p
        .editor()
        .read(&p.config.paths.locale_gen)
        .is_ok_and(|content| edit::is_uncommented(&content, &p.config.locale.locale_gen));
    let profile = profile_contents(p);
    generated
        && locale_exports(p)
            .iter()
            .all(|(key, line)| edit::ensure_assignment(&profile, key, line, None).is_none())
}

pub(super) fn configure_locale(p: &Provisioner) -> Result<()> {
    let editor = p.editor();
    editor.ensure_uncommented(
        &p.config.paths.locale_gen,
        &p.config.locale.locale_gen,
        p.elevation(),
    )?;
    p.host.run(&mut p.privileged("locale-gen"))?;

    let profile = p.profile_path();
    for (key, line) in locale_exports(p) {
        editor.ensure_assignment(&profile, key, &line, Elevation::Direct)?;
    }
    Ok(())
}

fn remove_dir(p: &Provisioner, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    if p.host.dry_run() {
        println!("[DRY RUN] rm -rf {}", dir.display());
        return Ok(());
    }
    fs::remove_dir_all(dir).with_context(|| format!("removing {}", dir.display()))
}

pub(super) fn install_aur_helper(p: &Provisioner) -> Result<()> {
    let aur = &p.config.aur;
    let build_dir = paths::expand(&p.config.paths.scratch_dir).join(&aur.helper);

    remove_dir(p, &build_dir)?;
    p.host.clone_repo(&aur.helper_repo, &build_dir, None)?;

    let mut makepkg = Command::new("makepkg");
    makepkg.args(["-si", "--noconfirm"]).current_dir(&build_dir);
    p.host.run(&mut makepkg)?;

    remove_dir(p, &build_dir)
}

pub(super) fn toolchain_present(p: &Provisioner) -> bool {
    let binary = &p.config.toolchain.binary;
    p.host.resolves(binary) || p.home.join(".cargo/bin").join(binary).exists()
}

pub(super) fn install_toolchain(p: &Provisioner) -> Result<()> {
    let toolchain = &p.config.toolchain;
    let script = p.host.fetch(&toolchain.installer_url)?;
    run_script(p.host, &script, &toolchain.args, &[])
}

fn backup_path(profile: &Path) -> PathBuf {
    let mut name = profile
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(BACKUP_SUFFIX);
    profile.with_file_name(name)
}

/// The framework installer replaces the profile with its template even when
/// told to keep it, so the profile is set aside first and put back after.
pub(super) fn install_shell_framework(p: &Provisioner) -> Result<()> {
    let profile = p.profile_path();
    let backup = backup_path(&profile);
    let dry_run = p.host.dry_run();

    let backed_up = profile.exists();
    if backed_up {
        if dry_run {
            println!("[DRY RUN] copy {} -> {}", profile.display(), backup.display());
        } else {
            fs::copy(&profile, &backup)
                .with_context(|| format!("backing up {}", profile.display()))?;
        }
    }

    let script = p.host.fetch(&p.config.shell.framework_installer)?;
    let framework_dir = p.framework_dir();
    run_script(
        p.host,
        &script,
        &["--unattended".to_string()],
        &[
            ("RUNZSH", "no".to_string()),
            ("CHSH", "no".to_string()),
            ("KEEP_ZSHRC", "yes".to_string()),
            ("ZSH", framework_dir.to_string_lossy().into_owned()),
        ],
    )?;

    if backed_up {
        if dry_run {
            println!("[DRY RUN] move {} -> {}", backup.display(), profile.display());
        } else {
            fs::rename(&backup, &profile)
                .with_context(|| format!("restoring {}", profile.display()))?;
        }
    }
    Ok(())
}

pub(super) fn theme_dir(p: &Provisioner) -> PathBuf {
    p.framework_dir()
        .join("custom/themes")
        .join(&p.config.shell.theme)
}

pub(super) fn install_prompt_theme(p: &Provisioner) -> Result<()> {
    let target = theme_dir(p);
    if !p.host.dry_run()
        && let Some(parent) = target.parent()
    {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    p.host.clone_repo(&p.config.shell.theme_repo, &target, Some(1))
}

/// Line of the profile that loads the framework. Settings below it are ignored.
const FRAMEWORK_SOURCE: &str = "oh-my-zsh.sh";

enum Placement {
    /// First line of the file, guarded by a marker substring
    First,
    /// A `key=value` line kept above [`FRAMEWORK_SOURCE`]
    Setting,
    /// Appended, guarded by a marker substring
    Last,
}

/// A profile line together with the text that identifies it.
struct Directive {
    key: String,
    line: String,
    placement: Placement,
}

impl Directive {
    fn new(placement: Placement, key: &str, line: String) -> Self {
        Self {
            key: key.to_string(),
            line,
            placement,
        }
    }

    /// The profile with this directive in place, or `None` if it already is.
    fn edit(&self, content: &str) -> Option<String> {
        match self.placement {
            Placement::First => edit::ensure_line_prepended(content, &self.key, &self.line),
            Placement::Setting => {
                edit::ensure_assignment(content, &self.key, &self.line, Some(FRAMEWORK_SOURCE))
            }
            Placement::Last => edit::ensure_line_present(content, &self.key, &self.line),
        }
    }
}

/// The profile directives in the order they end up in the file.
fn directives(p: &Provisioner) -> Vec<Directive> {
    let shell = &p.config.shell;
    let framework = match paths::home_relative(&shell.framework_dir) {
        Some(rest) => format!("$HOME/{}", rest.display()),
        None => shell.framework_dir.display().to_string(),
    };
    let startup = format!("cd {}", shell.startup_dir);

    vec![
        Directive::new(
            Placement::First,
            "POWERLEVEL9K_INSTANT_PROMPT",
            "typeset -g POWERLEVEL9K_INSTANT_PROMPT=quiet".to_string(),
        ),
        Directive::new(
            Placement::Setting,
            "export ZSH=",
            format!("export ZSH=\"{}\"", framework),
        ),
        Directive::new(
            Placement::Setting,
            "ZSH_THEME=",
            format!("ZSH_THEME=\"{0}/{0}\"", shell.theme),
        ),
        Directive::new(
            Placement::Setting,
            "plugins=(",
            format!("plugins=({})", shell.plugins.join(" ")),
        ),
        Directive::new(
            Placement::Last,
            FRAMEWORK_SOURCE,
            "source $ZSH/oh-my-zsh.sh".to_string(),
        ),
        Directive::new(Placement::Last, &startup, startup.clone()),
    ]
}

fn plugins_dir(p: &Provisioner) -> PathBuf {
    p.framework_dir().join("custom/plugins")
}

/// (link, source) for every system plugin
fn plugin_links(p: &Provisioner) -> Vec<(PathBuf, PathBuf)> {
    let dir = plugins_dir(p);
    p.config
        .shell
        .system_plugins
        .iter()
        .filter_map(|source| source.file_name().map(|name| (dir.join(name), source.clone())))
        .collect()
}

fn link_exists(link: &Path) -> bool {
    fs::symlink_metadata(link).is_ok()
}

pub(super) fn shell_configured(p: &Provisioner) -> bool {
    let profile = profile_contents(p);
    let directives_present = directives(p).iter().all(|d| d.edit(&profile).is_none());
    // a plugin whose package is not installed cannot be linked; don't wait for it
    let links_present = plugin_links(p)
        .iter()
        .all(|(link, source)| link_exists(link) || !source.exists());
    directives_present && links_present
}

fn link_plugin(p: &Provisioner, link: &Path, source: &Path) {
    if link_exists(link) {
        return;
    }
    if !source.exists() {
        emit(
            Level::Warn,
            "shell.plugin.missing",
            &format!(
                "{} {} is not installed, skipping the plugin link",
                char::from(NerdFont::Warning),
                source.display()
            ),
            None,
        );
        return;
    }
    if p.host.dry_run() {
        println!("[DRY RUN] ln -s {} {}", source.display(), link.display());
        return;
    }
    if let Err(e) = std::os::unix::fs::symlink(source, link) {
        emit(
            Level::Warn,
            "shell.plugin.link_failed",
            &format!(
                "{} Could not link {}: {}",
                char::from(NerdFont::Warning),
                link.display(),
                e
            ),
            None,
        );
    }
}

pub(super) fn configure_shell(p: &Provisioner) -> Result<()> {
    let plugins = plugins_dir(p);
    if !p.host.dry_run() {
        fs::create_dir_all(&plugins).with_context(|| format!("creating {}", plugins.display()))?;
    }
    for (link, source) in plugin_links(p) {
        link_plugin(p, &link, &source);
    }

    let editor = p.editor();
    let profile = p.profile_path();
    for directive in directives(p) {
        if editor.update(&profile, Elevation::Direct, |c| directive.edit(c))? {
            emit(
                Level::Debug,
                "shell.profile.line",
                &format!("set `{}` in {}", directive.line, profile.display()),
                None,
            );
        }
    }
    Ok(())
}

pub(super) fn install_aur_utility(p: &Provisioner) -> Result<()> {
    let aur = &p.config.aur;
    let mut cmd = Command::new(&aur.helper);
    cmd.args([
        "-S",
        "--needed",
        "--answerdiff",
        "None",
        "--answerclean",
        "None",
    ])
    .arg(&aur.utility.package);
    p.host.run_with_input(&mut cmd, &aur.utility.answers)
}

pub(super) fn finalize(p: &Provisioner) -> Result<()> {
    let profile = p.profile_path();
    let mut wizard = Command::new(&p.config.user.shell);
    wizard
        .arg("-i")
        .arg("-c")
        .arg(format!("source {}", profile.display()));
    p.host.run(&mut wizard)?;

    separator(true);
    for (code, glyph, message) in [
        (
            "finalize.font",
            NerdFont::Palette,
            "Install a Nerd Font on Windows and select it in your terminal profile",
        ),
        (
            "finalize.prompt",
            NerdFont::Refresh,
            "Run `p10k configure` to redo the prompt setup at any time",
        ),
        (
            "finalize.gh",
            NerdFont::Git,
            "Run `gh auth login` before setting up dotfiles",
        ),
    ] {
        emit(
            Level::Info,
            code,
            &format!("{} {}", char::from(glyph), message),
            None,
        );
    }

    if p.prompt.confirm("Set up dotfiles now?", false)? {
        super::setup_dotfiles(p)?;
    }
    Ok(())
}
