use std::process::ExitStatus;
use thiserror::Error;

/// The runner was started in a context no phase may run in.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error(
        "running as '{actual}' but the environment is provisioned for '{expected}'. \
         Restart the WSL session as '{expected}' (wsl.exe --terminate <distro>) and run ~/archwsl again"
    )]
    WrongUser { expected: String, actual: String },
    #[error("could not determine the current user (uid {uid})")]
    UnknownIdentity { uid: u32 },
    #[error("step '{step}' belongs to the {phase} phase and cannot run here")]
    WrongPhase { step: String, phase: &'static str },
}

/// An external command exited unsuccessfully.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command failed ({status}): {command}")]
    Failed { command: String, status: ExitStatus },
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum DotfilesError {
    #[error("GitHub CLI is not authenticated; run `gh auth login` and retry `archwsl dotfiles`")]
    NotAuthenticated,
}
