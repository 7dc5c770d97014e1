//! Provisioning configuration.
//!
//! Everything that is data rather than behaviour lives here: package lists,
//! repository URLs, theme and plugin names, and the answers scripted into the
//! AUR helper. A missing config file means "use the defaults"; a present file
//! only needs the keys it wants to override.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvisionConfig {
    pub user: UserConfig,
    pub locale: LocaleConfig,
    pub packages: PackageConfig,
    pub aur: AurConfig,
    pub toolchain: ToolchainConfig,
    pub shell: ShellConfig,
    pub dotfiles: DotfilesConfig,
    pub paths: SystemPaths,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserConfig {
    pub name: String,
    pub shell: String,
    /// Defaults to `/home/<name>`
    pub home: Option<PathBuf>,
    pub admin_group: String,
    pub passwordless_sudo: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: "arch".to_string(),
            shell: "/usr/bin/zsh".to_string(),
            home: None,
            admin_group: "wheel".to_string(),
            passwordless_sudo: false,
        }
    }
}

impl UserConfig {
    pub fn home_dir(&self) -> PathBuf {
        self.home
            .clone()
            .unwrap_or_else(|| PathBuf::from("/home").join(&self.name))
    }

    /// The sudoers line that grants the admin group its privileges.
    pub fn sudoers_rule(&self) -> String {
        if self.passwordless_sudo {
            format!("%{} ALL=(ALL:ALL) NOPASSWD: ALL", self.admin_group)
        } else {
            format!("%{} ALL=(ALL:ALL) ALL", self.admin_group)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocaleConfig {
    /// Value exported as LANG and LC_ALL
    pub name: String,
    /// Entry as it appears in locale.gen
    pub locale_gen: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            name: "en_US.UTF-8".to_string(),
            locale_gen: "en_US.UTF-8 UTF-8".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PackageConfig {
    pub bootstrap: Vec<String>,
    pub build: Vec<String>,
    pub primary: Vec<String>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            bootstrap: strings(&["sudo", "zsh"]),
            build: strings(&["git", "base-devel"]),
            primary: strings(&[
                "neovim",
                "tmux",
                "yazi",
                "stow",
                "github-cli",
                "fzf",
                "ripgrep",
                "fd",
                "bat",
                "eza",
                "zoxide",
                "lazygit",
                "unzip",
                "wget",
                "man-db",
                "htop",
                "zsh-autosuggestions",
                "zsh-syntax-highlighting",
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AurConfig {
    pub helper: String,
    pub helper_repo: String,
    pub utility: AurUtility,
}

impl Default for AurConfig {
    fn default() -> Self {
        Self {
            helper: "yay".to_string(),
            helper_repo: "https://aur.archlinux.org/yay.git".to_string(),
            utility: AurUtility::default(),
        }
    }
}

/// A package installed through the AUR helper. `answers` is piped to the
/// helper verbatim, one line per prompt, so it has to match the menu the
/// helper shows for this package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AurUtility {
    pub package: String,
    pub binary: String,
    pub answers: String,
}

impl Default for AurUtility {
    fn default() -> Self {
        Self {
            package: "win32yank-bin".to_string(),
            binary: "win32yank.exe".to_string(),
            answers: "1\ny\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolchainConfig {
    pub binary: String,
    pub installer_url: String,
    pub args: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            binary: "rustup".to_string(),
            installer_url: "https://sh.rustup.rs".to_string(),
            args: strings(&["-y"]),
        }
    }
}

/// Shell environment. Relative paths are resolved against the target user's home.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    pub profile: PathBuf,
    pub framework_dir: PathBuf,
    pub framework_installer: String,
    pub theme: String,
    pub theme_repo: String,
    pub plugins: Vec<String>,
    pub system_plugins: Vec<PathBuf>,
    pub startup_dir: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            profile: PathBuf::from(".zshrc"),
            framework_dir: PathBuf::from(".oh-my-zsh"),
            framework_installer:
                "https://raw.githubusercontent.com/ohmyzsh/ohmyzsh/master/tools/install.sh"
                    .to_string(),
            theme: "powerlevel10k".to_string(),
            theme_repo: "https://github.com/romkatv/powerlevel10k.git".to_string(),
            plugins: strings(&["git", "zsh-autosuggestions", "zsh-syntax-highlighting"]),
            system_plugins: vec![
                PathBuf::from("/usr/share/zsh/plugins/zsh-autosuggestions"),
                PathBuf::from("/usr/share/zsh/plugins/zsh-syntax-highlighting"),
            ],
            startup_dir: "~".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DotfilesConfig {
    /// `owner/name` or a full URL, passed to `gh repo clone`
    pub repo: String,
    pub dir: PathBuf,
    /// Stow packages linked into the home directory
    pub packages: Vec<String>,
}

impl Default for DotfilesConfig {
    fn default() -> Self {
        Self {
            repo: "dotfiles".to_string(),
            dir: PathBuf::from("dotfiles"),
            packages: strings(&["wezterm", "nvim", "tmux", "yazi", "zsh"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SystemPaths {
    pub sudoers: PathBuf,
    pub locale_gen: PathBuf,
    pub wsl_conf: PathBuf,
    pub scratch_dir: PathBuf,
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self {
            sudoers: PathBuf::from("/etc/sudoers"),
            locale_gen: PathBuf::from("/etc/locale.gen"),
            wsl_conf: PathBuf::from("/etc/wsl.conf"),
            scratch_dir: PathBuf::from("/tmp/archwsl"),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

/// A loaded config together with the file it came from, if any.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ProvisionConfig,
    pub source: Option<PathBuf>,
}

impl ProvisionConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("parsing provisioning config")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing provisioning config")
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("in {}", path.display()))
    }

    /// Load an explicit config path, or the default location if it exists.
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
        if let Some(path) = explicit {
            let path = paths::expand(path);
            let config = Self::load_from_path(&path)?;
            return Ok(LoadedConfig {
                config,
                source: Some(path),
            });
        }

        let default_path = paths::default_config_path()?;
        if default_path.exists() {
            let config = Self::load_from_path(&default_path)?;
            Ok(LoadedConfig {
                config,
                source: Some(default_path),
            })
        } else {
            Ok(LoadedConfig {
                config: Self::default(),
                source: None,
            })
        }
    }
}
