use anyhow::{Context, Result};
use std::fs;
use std::process::Command;

use super::Provisioner;
use crate::common::paths;
use crate::error::DotfilesError;
use crate::ui::prelude::*;

/// Clone the dotfiles repository with the GitHub CLI and stow its packages
/// into the home directory.
///
/// The operator has to authenticate `gh` out of band first. Without that this
/// fails with [`DotfilesError::NotAuthenticated`] before touching anything.
pub fn setup_dotfiles(p: &Provisioner) -> Result<()> {
    let dotfiles = &p.config.dotfiles;
    p.prompt.acknowledge(&format!(
        "{} Authenticate with `gh auth login` in another terminal, then continue",
        char::from(NerdFont::Key)
    ))?;

    let mut auth = Command::new("gh");
    auth.args(["auth", "status"]);
    if !p.host.succeeds(&mut auth) {
        return Err(DotfilesError::NotAuthenticated.into());
    }

    let dir = paths::in_home(&p.home, &dotfiles.dir);
    if dir.exists() {
        emit(
            Level::Warn,
            "dotfiles.exists",
            &format!(
                "{} {} already exists, skipping clone",
                char::from(NerdFont::Warning),
                dir.display()
            ),
            None,
        );
    } else {
        let mut clone = Command::new("gh");
        clone.args(["repo", "clone"]).arg(&dotfiles.repo).arg(&dir);
        p.host.run(&mut clone)?;
    }

    // stow refuses to replace a real file with a link
    let profile = p.profile_path();
    if fs::symlink_metadata(&profile).is_ok_and(|meta| meta.file_type().is_file()) {
        if p.host.dry_run() {
            println!("[DRY RUN] rm {}", profile.display());
        } else {
            fs::remove_file(&profile)
                .with_context(|| format!("removing {}", profile.display()))?;
        }
    }

    let packages: Vec<&String> = if p.host.dry_run() {
        dotfiles.packages.iter().collect()
    } else {
        dotfiles
            .packages
            .iter()
            .filter(|package| {
                let present = dir.join(package.as_str()).is_dir();
                if !present {
                    emit(
                        Level::Warn,
                        "dotfiles.package.missing",
                        &format!(
                            "{} {} has no '{}' package, skipping it",
                            char::from(NerdFont::Warning),
                            dotfiles.repo,
                            package
                        ),
                        None,
                    );
                }
                present
            })
            .collect()
    };
    if packages.is_empty() {
        return Ok(());
    }

    let mut stow = Command::new("stow");
    stow.arg("-R")
        .arg("-d")
        .arg(&dir)
        .arg("-t")
        .arg(&p.home)
        .args(packages);
    p.host.run(&mut stow)?;

    emit(
        Level::Success,
        "dotfiles.done",
        &format!(
            "{} Dotfiles linked from {}",
            char::from(NerdFont::Link),
            dir.display()
        ),
        None,
    );
    Ok(())
}
