mod common;
mod utils;

use anyhow::Result;
use common::TestEnvironment;

#[test]
fn test_help_lists_subcommands() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = utils::run_archwsl_command(&env, &["--help"])?;
    assert_eq!(output.exit_code, 0, "help failed: {}", output.stderr);
    for subcommand in ["run", "status", "dotfiles", "config"] {
        assert!(
            output.stdout.contains(subcommand),
            "help does not mention {}",
            subcommand
        );
    }
    Ok(())
}

#[test]
fn test_default_config_is_valid_toml() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = utils::run_archwsl_command(&env, &["config", "default"])?;
    assert_eq!(output.exit_code, 0, "config default failed: {}", output.stderr);

    let table: toml::Table = output.stdout.parse()?;
    assert_eq!(table["user"]["name"].as_str(), Some("arch"));
    assert_eq!(table["aur"]["helper"].as_str(), Some("yay"));
    assert_eq!(table["aur"]["utility"]["answers"].as_str(), Some("1\ny\n"));

    // what `config default` prints is accepted back as a config file
    let path = env.write_config("config.toml", &output.stdout)?;
    let output = utils::run_archwsl_command(
        &env,
        &["config", "path", "--config", path.to_str().unwrap()],
    )?;
    assert_eq!(output.exit_code, 0);
    assert_eq!(output.stdout.trim(), path.display().to_string());
    Ok(())
}

#[test]
fn test_missing_explicit_config_fails_before_anything_runs() -> Result<()> {
    let env = TestEnvironment::new()?;
    let missing = env.path().join("missing.toml");
    let output =
        utils::run_archwsl_command(&env, &["--dry-run", "--config", missing.to_str().unwrap()])?;
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains("[FAIL]"));
    assert!(output.stderr.contains("reading config"));
    Ok(())
}

#[test]
fn test_errors_are_json_in_json_mode() -> Result<()> {
    let env = TestEnvironment::new()?;
    let path = env.write_config("bad.toml", "[user]\nname = 42\n")?;
    let output = utils::run_archwsl_command(
        &env,
        &["--format", "json", "status", "--config", path.to_str().unwrap()],
    )?;
    assert_eq!(output.exit_code, 1);

    let line = output
        .stderr
        .lines()
        .find(|l| l.contains("archwsl.failed"))
        .expect("error event");
    let event: serde_json::Value = serde_json::from_str(line)?;
    assert_eq!(event["level"], "error");
    assert!(event["message"].as_str().unwrap().contains("parsing provisioning config"));
    assert!(event["time"].is_string());
    Ok(())
}

#[test]
fn test_unknown_step_is_rejected() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = utils::run_archwsl_command(&env, &["run", "--step", "reticulate-splines"])?;
    assert_eq!(output.exit_code, 2);
    assert!(output.stderr.contains("aur-helper"));
    Ok(())
}

#[test]
fn test_wrong_user_is_refused_without_changes() -> Result<()> {
    if utils::is_root() {
        // root always gets the bootstrap phase
        return Ok(());
    }
    let env = TestEnvironment::new()?;
    let path = env.write_config(
        "config.toml",
        "[user]\nname = \"archwsl-nobody\"\n[paths]\nscratch_dir = \"scratch\"\n",
    )?;
    let output = utils::run_archwsl_command(&env, &["--config", path.to_str().unwrap()])?;
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains("Restart the WSL session as 'archwsl-nobody'"));
    assert!(!env.path().join("scratch").exists());
    Ok(())
}
