//! Phased provisioning.
//!
//! Each [`Step`] pairs an "already applied" predicate with an action. Running
//! a phase walks its steps in order, skipping the satisfied ones, and stops at
//! the first failure. Nothing is recorded between runs; the predicates read
//! the system itself, which is what makes a half-finished run resumable.

mod dotfiles;
mod root;
pub mod status;
mod step;
mod user;


use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::Command;

use crate::common::paths;
use crate::config::ProvisionConfig;
use crate::edit::{Elevation, FileEditor};
use crate::error::ContextError;
use crate::host::Host;
use crate::prompt::Prompter;
use crate::ui::prelude::*;

pub use dotfiles::setup_dotfiles;
pub use step::{Phase, Step, StepOutcome};

/// Files copied into the target user's home at the end of the root phase.
#[derive(Debug, Clone)]
pub struct StagedFiles {
    pub runner: PathBuf,
    pub config: Option<PathBuf>,
}

pub struct Provisioner<'a> {
    pub host: &'a dyn Host,
    pub prompt: &'a dyn Prompter,
    pub config: &'a ProvisionConfig,
    /// Home directory of the target user
    pub home: PathBuf,
    pub phase: Phase,
    pub staged: StagedFiles,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        host: &'a dyn Host,
        prompt: &'a dyn Prompter,
        config: &'a ProvisionConfig,
        phase: Phase,
        home: PathBuf,
        staged: StagedFiles,
    ) -> Self {
        Self {
            host,
            prompt,
            config,
            home,
            phase,
            staged,
        }
    }

    /// Root-owned files are written directly in the root phase and through
    /// sudo in the user phase.
    pub fn elevation(&self) -> Elevation {
        match self.phase {
            Phase::Root => Elevation::Direct,
            Phase::User => Elevation::Sudo,
        }
    }

    pub fn editor(&self) -> FileEditor<'a> {
        FileEditor::new(self.host)
    }

    /// A command that needs root: plain in the root phase, `sudo`-prefixed
    /// in the user phase.
    pub fn privileged(&self, program: &str) -> Command {
        match self.phase {
            Phase::Root => Command::new(program),
            Phase::User => {
                let mut cmd = Command::new("sudo");
                cmd.arg(program);
                cmd
            }
        }
    }

    /// `pacman -S --needed`, which skips anything already installed
    pub fn pacman_install(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut cmd = self.privileged("pacman");
        cmd.args(["-S", "--needed", "--noconfirm"]).args(packages);
        self.host.run(&mut cmd)
    }

    /// `pacman -T` prints the packages that are missing and fails if there are any
    pub fn packages_installed(&self, packages: &[String]) -> bool {
        if packages.is_empty() {
            return true;
        }
        let mut cmd = Command::new("pacman");
        cmd.arg("-T").args(packages);
        self.host.succeeds(&mut cmd)
    }

    pub fn profile_path(&self) -> PathBuf {
        paths::in_home(&self.home, &self.config.shell.profile)
    }

    pub fn framework_dir(&self) -> PathBuf {
        paths::in_home(&self.home, &self.config.shell.framework_dir)
    }

    pub fn is_satisfied(&self, step: Step) -> bool {
        if step.always_runs() {
            return false;
        }
        match step {
            Step::BootstrapPackages => self.packages_installed(&self.config.packages.bootstrap),
            Step::CreateUser => root::user_exists(self),
            Step::SetPassword => root::password_set(self),
            Step::GrantSudo => root::sudo_granted(self),
            Step::DefaultUser => root::default_user_set(self),
            Step::ShellProfile => self.profile_path().exists(),
            Step::Locale => user::locale_configured(self),
            Step::BuildTools => self.packages_installed(&self.config.packages.build),
            Step::AurHelper => self.host.resolves(&self.config.aur.helper),
            Step::Packages => self.packages_installed(&self.config.packages.primary),
            Step::Toolchain => user::toolchain_present(self),
            Step::ShellFramework => self.framework_dir().exists(),
            Step::PromptTheme => user::theme_dir(self).exists(),
            Step::ShellConfig => user::shell_configured(self),
            Step::AurUtility => self.host.resolves(&self.config.aur.utility.binary),
            Step::SystemUpgrade | Step::StageRunner | Step::Finalize => false,
        }
    }

    fn apply(&self, step: Step) -> Result<()> {
        match step {
            Step::SystemUpgrade => root::system_upgrade(self),
            Step::BootstrapPackages => self.pacman_install(&self.config.packages.bootstrap),
            Step::CreateUser => root::create_user(self),
            Step::SetPassword => root::set_password(self),
            Step::GrantSudo => root::grant_sudo(self),
            Step::DefaultUser => root::set_default_user(self),
            Step::StageRunner => root::stage_runner(self),
            Step::ShellProfile => user::create_profile(self),
            Step::Locale => user::configure_locale(self),
            Step::BuildTools => self.pacman_install(&self.config.packages.build),
            Step::AurHelper => user::install_aur_helper(self),
            Step::Packages => self.pacman_install(&self.config.packages.primary),
            Step::Toolchain => user::install_toolchain(self),
            Step::ShellFramework => user::install_shell_framework(self),
            Step::PromptTheme => user::install_prompt_theme(self),
            Step::ShellConfig => user::configure_shell(self),
            Step::AurUtility => user::install_aur_utility(self),
            Step::Finalize => user::finalize(self),
        }
    }

    /// Run one step of this provisioner's phase.
    pub fn run_step(&self, step: Step) -> Result<StepOutcome> {
        if step.phase() != self.phase {
            return Err(ContextError::WrongPhase {
                step: step.id().to_string(),
                phase: step.phase().name(),
            }
            .into());
        }

        if self.is_satisfied(step) {
            emit(
                Level::Info,
                &format!("step.{}.skip", step.id()),
                &format!(
                    "{} {}: already done, skipping",
                    char::from(NerdFont::Skip),
                    step.description()
                ),
                None,
            );
            return Ok(StepOutcome::Skipped);
        }

        emit(
            Level::Info,
            &format!("step.{}.start", step.id()),
            &format!("{} {}...", char::from(NerdFont::Rocket), step.description()),
            None,
        );
        self.apply(step)
            .with_context(|| format!("step '{}' failed", step.id()))?;
        emit(
            Level::Success,
            &format!("step.{}.done", step.id()),
            &format!("{} {}", char::from(NerdFont::Check), step.description()),
            None,
        );
        Ok(StepOutcome::Applied)
    }

    /// Run every step of the phase in order, stopping at the first failure.
    pub fn run_phase(&self) -> Result<Vec<(Step, StepOutcome)>> {
        separator(false);
        emit(
            Level::Info,
            "phase.start",
            &format!(
                "{} Starting {} phase for user '{}'",
                char::from(NerdFont::Terminal),
                self.phase.name(),
                self.config.user.name
            ),
            Some(serde_json::json!({ "phase": self.phase })),
        );
        separator(true);

        let mut outcomes = Vec::new();
        for &step in self.phase.steps() {
            outcomes.push((step, self.run_step(step)?));
        }

        if self.phase == Phase::Root {
            root::print_restart_guidance(self);
        }
        Ok(outcomes)
    }
}
