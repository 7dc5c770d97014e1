use serde::Serialize;

/// The two execution stages. Which one runs is decided by the privilege level
/// of the invoking process; moving from `Root` to `User` requires restarting
/// the WSL session as the target user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Root,
    User,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Root => "root",
            Phase::User => "user",
        }
    }

    /// Steps in execution order
    pub fn steps(self) -> &'static [Step] {
        match self {
            Phase::Root => &[
                Step::SystemUpgrade,
                Step::BootstrapPackages,
                Step::CreateUser,
                Step::SetPassword,
                Step::GrantSudo,
                Step::DefaultUser,
                Step::StageRunner,
            ],
            Phase::User => &[
                Step::ShellProfile,
                Step::Locale,
                Step::BuildTools,
                Step::AurHelper,
                Step::Packages,
                Step::Toolchain,
                Step::ShellFramework,
                Step::PromptTheme,
                Step::ShellConfig,
                Step::AurUtility,
                Step::Finalize,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Sync the package database and upgrade the system
    SystemUpgrade,
    /// Install sudo and the login shell
    BootstrapPackages,
    /// Create the target user
    CreateUser,
    /// Set the target user's password
    SetPassword,
    /// Add the user to the admin group and enable its sudoers rule
    GrantSudo,
    /// Make the user the WSL default login
    DefaultUser,
    /// Copy this binary (and config) into the user's home
    StageRunner,
    /// Create an empty shell profile
    ShellProfile,
    /// Generate the locale and export it from the profile
    Locale,
    /// Install git and the base build toolchain
    BuildTools,
    /// Build and install the AUR helper
    AurHelper,
    /// Install the primary package list
    Packages,
    /// Install the language toolchain manager
    Toolchain,
    /// Install oh-my-zsh
    ShellFramework,
    /// Clone the prompt theme
    PromptTheme,
    /// Link plugins and write the profile directives
    ShellConfig,
    /// Install the extra utility through the AUR helper
    AurUtility,
    /// Run the theme wizard, print follow-ups, offer dotfiles
    Finalize,
}

impl Step {
    pub fn id(self) -> &'static str {
        match self {
            Step::SystemUpgrade => "system-upgrade",
            Step::BootstrapPackages => "bootstrap-packages",
            Step::CreateUser => "create-user",
            Step::SetPassword => "set-password",
            Step::GrantSudo => "grant-sudo",
            Step::DefaultUser => "default-user",
            Step::StageRunner => "stage-runner",
            Step::ShellProfile => "shell-profile",
            Step::Locale => "locale",
            Step::BuildTools => "build-tools",
            Step::AurHelper => "aur-helper",
            Step::Packages => "packages",
            Step::Toolchain => "toolchain",
            Step::ShellFramework => "shell-framework",
            Step::PromptTheme => "prompt-theme",
            Step::ShellConfig => "shell-config",
            Step::AurUtility => "aur-utility",
            Step::Finalize => "finalize",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Step::SystemUpgrade => "Upgrade system packages",
            Step::BootstrapPackages => "Install bootstrap packages",
            Step::CreateUser => "Create user",
            Step::SetPassword => "Set user password",
            Step::GrantSudo => "Grant sudo",
            Step::DefaultUser => "Set WSL default user",
            Step::StageRunner => "Stage runner in user home",
            Step::ShellProfile => "Create shell profile",
            Step::Locale => "Configure locale",
            Step::BuildTools => "Install build tools",
            Step::AurHelper => "Install AUR helper",
            Step::Packages => "Install packages",
            Step::Toolchain => "Install toolchain manager",
            Step::ShellFramework => "Install shell framework",
            Step::PromptTheme => "Install prompt theme",
            Step::ShellConfig => "Configure shell",
            Step::AurUtility => "Install AUR utility",
            Step::Finalize => "Finalize",
        }
    }

    pub fn phase(self) -> Phase {
        if Phase::Root.steps().contains(&self) {
            Phase::Root
        } else {
            Phase::User
        }
    }

    /// Steps without a meaningful "done" state; they are cheap or harmless
    /// to repeat and run every time.
    pub fn always_runs(self) -> bool {
        matches!(
            self,
            Step::SystemUpgrade | Step::StageRunner | Step::Finalize
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    Skipped,
}
