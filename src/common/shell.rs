//! Shell utility functions
//!
//! Quoting helpers used when a command has to be shown to the operator
//! (dry-run output, error messages) or handed to `sh -c`.

use std::process::Command;

/// Escape a string for use in a shell command
///
/// This function quotes the string only if necessary (i.e., if it contains characters
/// that have special meaning in the shell). It uses single quotes for safety.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }

    if s.chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '=' | '/' | '.' | ':' | ','))
    {
        return s.to_string();
    }

    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Render a command the way an operator would type it, including any
/// explicitly set environment variables.
pub fn display_command(command: &Command) -> String {
    let mut parts: Vec<String> = command
        .get_envs()
        .filter_map(|(key, value)| {
            value.map(|v| {
                format!(
                    "{}={}",
                    key.to_string_lossy(),
                    shell_quote(&v.to_string_lossy())
                )
            })
        })
        .collect();
    parts.push(shell_quote(&command.get_program().to_string_lossy()));
    parts.extend(
        command
            .get_args()
            .map(|a| shell_quote(&a.to_string_lossy())),
    );
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("foo"), "foo");
        assert_eq!(shell_quote("foo bar"), "'foo bar'");
        assert_eq!(shell_quote("foo'bar"), "'foo'\\''bar'");
        assert_eq!(shell_quote("path/to/file"), "path/to/file");
        assert_eq!(shell_quote("--flag=value"), "--flag=value");
    }

    #[test]
    fn test_display_command() {
        let mut cmd = Command::new("sh");
        cmd.env("RUNZSH", "no").arg("/tmp/install.sh").arg("--unattended");
        assert_eq!(display_command(&cmd), "RUNZSH=no sh /tmp/install.sh --unattended");

        let mut cmd = Command::new("zsh");
        cmd.args(["-i", "-c", "source ~/.zshrc"]);
        assert_eq!(display_command(&cmd), "zsh -i -c 'source ~/.zshrc'");
    }
}
