use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Name the runner is staged under in the target user's home.
pub const STAGED_RUNNER: &str = "archwsl";

/// Config location relative to a home directory.
pub const CONFIG_RELATIVE: &str = ".config/archwsl/config.toml";

/// Default config file for the invoking user
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Unable to determine user config directory")?;
    Ok(config_dir.join("archwsl").join("config.toml"))
}

/// Expand a leading `~` and environment variables in a user-supplied path.
pub fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).into_owned()),
    }
}

/// The part of `path` below the home directory: `~/x` and a relative `x`
/// both give `x`. `None` for absolute paths.
pub fn home_relative(path: &Path) -> Option<&Path> {
    match path.strip_prefix("~") {
        Ok(rest) => Some(rest),
        Err(_) if path.is_absolute() => None,
        Err(_) => Some(path),
    }
}

/// Resolve a config path against `home`, the target user's home rather than
/// the invoking user's.
pub fn in_home(home: &Path, path: &Path) -> PathBuf {
    match home_relative(path) {
        Some(rest) => home.join(rest),
        None => path.to_path_buf(),
    }
}
