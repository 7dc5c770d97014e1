//! Execution context detection and phase selection.

use nix::unistd::{Uid, User};
use sudo::RunningAs;

use crate::error::ContextError;
use crate::provision::Phase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub privileged: bool,
    pub identity: String,
}

impl ExecutionContext {
    pub fn detect() -> Result<Self, ContextError> {
        let privileged = matches!(sudo::check(), RunningAs::Root | RunningAs::Suid);
        let uid = Uid::current();
        let identity = match User::from_uid(uid) {
            Ok(Some(user)) => user.name,
            _ => std::env::var("USER")
                .ok()
                .filter(|name| !name.is_empty())
                .ok_or(ContextError::UnknownIdentity { uid: uid.as_raw() })?,
        };
        Ok(Self {
            privileged,
            identity,
        })
    }

    /// Root always gets the bootstrap phase. Anyone else must be the target
    /// user; no step of either phase runs for a stranger.
    pub fn select_phase(&self, target_user: &str) -> Result<Phase, ContextError> {
        if self.privileged {
            return Ok(Phase::Root);
        }
        if self.identity == target_user {
            Ok(Phase::User)
        } else {
            Err(ContextError::WrongUser {
                expected: target_user.to_string(),
                actual: self.identity.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(privileged: bool, identity: &str) -> ExecutionContext {
        ExecutionContext {
            privileged,
            identity: identity.to_string(),
        }
    }

    #[test]
    fn root_selects_bootstrap_phase() {
        assert_eq!(ctx(true, "root").select_phase("arch").unwrap(), Phase::Root);
    }

    #[test]
    fn privilege_wins_over_identity() {
        // `sudo ./archwsl` as the target user still bootstraps
        assert_eq!(ctx(true, "arch").select_phase("arch").unwrap(), Phase::Root);
    }

    #[test]
    fn target_user_selects_user_phase() {
        assert_eq!(ctx(false, "arch").select_phase("arch").unwrap(), Phase::User);
    }

    #[test]
    fn stranger_is_rejected_with_guidance() {
        let err = ctx(false, "guest").select_phase("arch").unwrap_err();
        assert!(matches!(
            &err,
            ContextError::WrongUser { expected, actual } if expected == "arch" && actual == "guest"
        ));
        assert!(err.to_string().contains("Restart the WSL session as 'arch'"));
    }
}
