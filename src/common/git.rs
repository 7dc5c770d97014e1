use anyhow::{Context, Result};
use git2::{FetchOptions, build::RepoBuilder};
use std::path::Path;

use crate::common::progress::{create_spinner, finish_spinner_with_success};

/// Clone a repository with optional shallow depth, showing a spinner while
/// the transfer runs.
pub fn clone_repo(url: &str, target: &Path, depth: Option<i32>) -> Result<()> {
    let mut fetch_options = FetchOptions::new();

    if let Some(depth) = depth {
        fetch_options.depth(depth);
    }

    fetch_options.remote_callbacks(git2::RemoteCallbacks::new());

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options);

    let spinner = create_spinner(format!("Cloning {}", url));
    let result = builder.clone(url, target);
    match result {
        Ok(_) => {
            finish_spinner_with_success(spinner, format!("Cloned {}", url));
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(e).with_context(|| format!("Failed to clone {} into {}", url, target.display()))
        }
    }
}
