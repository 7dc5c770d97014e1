mod common;
mod config;
mod context;
mod edit;
mod error;
mod host;
mod prompt;
mod provision;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::common::paths;
use crate::config::{LoadedConfig, ProvisionConfig};
use crate::context::ExecutionContext;
use crate::error::ContextError;
use crate::host::RealHost;
use crate::prompt::TerminalPrompter;
use crate::provision::{Phase, Provisioner, StagedFiles, Step};
use crate::ui::prelude::*;

/// Provision Arch Linux on WSL in two phases: run once as root, restart the
/// session, then run again as the new user.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print commands and file edits instead of running them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Config file (defaults to ~/.config/archwsl/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the phase for the current user (the default)
    Run {
        /// Run a single step of the phase instead of all of them
        #[arg(long, value_enum)]
        step: Option<Step>,
    },
    /// Show which steps of the current phase are already applied
    Status,
    /// Clone and stow the dotfiles repository
    Dotfiles,
    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the built-in configuration as TOML
    Default,
    /// Print the config file location
    Path,
}

/// Everything a provisioning command needs once the context is known.
struct Session {
    loaded: LoadedConfig,
    phase: Phase,
    home: PathBuf,
    host: RealHost,
    prompt: TerminalPrompter,
}

impl Session {
    /// Load the config and decide the phase. Nothing is changed on the system
    /// before this succeeds.
    fn open(cli: &Cli) -> Result<Self> {
        let loaded = ProvisionConfig::load(cli.config.as_deref())?;
        match &loaded.source {
            Some(path) => emit(
                Level::Debug,
                "config.loaded",
                &format!("Using config {}", path.display()),
                None,
            ),
            None => emit(
                Level::Debug,
                "config.default",
                "No config file found, using built-in defaults",
                None,
            ),
        }

        let ctx = ExecutionContext::detect()?;
        emit(
            Level::Debug,
            "context.detected",
            &format!(
                "Running as '{}' (privileged: {})",
                ctx.identity, ctx.privileged
            ),
            None,
        );
        let phase = ctx.select_phase(&loaded.config.user.name)?;

        let home = match phase {
            Phase::Root => loaded.config.user.home_dir(),
            Phase::User => loaded
                .config
                .user
                .home
                .clone()
                .or_else(dirs::home_dir)
                .context("Unable to determine home directory")?,
        };

        Ok(Self {
            loaded,
            phase,
            home,
            host: RealHost::new(cli.dry_run),
            prompt: TerminalPrompter,
        })
    }

    fn provisioner(&self) -> Result<Provisioner<'_>> {
        let runner = std::env::current_exe().context("locating the running executable")?;
        Ok(Provisioner::new(
            &self.host,
            &self.prompt,
            &self.loaded.config,
            self.phase,
            self.home.clone(),
            StagedFiles {
                runner,
                config: self.loaded.source.clone(),
            },
        ))
    }
}

fn run_provision(cli: &Cli, step: Option<Step>) -> Result<()> {
    if cli.dry_run {
        emit(
            Level::Warn,
            "run.dry_run",
            &format!(
                "{} Dry run: commands and file edits are printed, not executed",
                char::from(NerdFont::Info)
            ),
            None,
        );
    }
    let session = Session::open(cli)?;
    let provisioner = session.provisioner()?;
    match step {
        Some(step) => {
            provisioner.run_step(step)?;
        }
        None => {
            provisioner.run_phase()?;
        }
    }
    Ok(())
}

fn run_dotfiles(cli: &Cli) -> Result<()> {
    let session = Session::open(cli)?;
    if session.phase != Phase::User {
        return Err(ContextError::WrongPhase {
            step: "dotfiles".to_string(),
            phase: Phase::User.name(),
        }
        .into());
    }
    provision::setup_dotfiles(&session.provisioner()?)
}

fn run_config(cli: &Cli, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Default => {
            print!("{}", ProvisionConfig::default().to_toml()?);
        }
        ConfigCommands::Path => {
            let path = match &cli.config {
                Some(path) => paths::expand(path),
                None => paths::default_config_path()?,
            };
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        None => run_provision(cli, None),
        Some(Commands::Run { step }) => run_provision(cli, *step),
        Some(Commands::Status) => {
            let session = Session::open(cli)?;
            provision::status::print_status(&session.provisioner()?);
            Ok(())
        }
        Some(Commands::Dotfiles) => run_dotfiles(cli),
        Some(Commands::Config { command }) => run_config(cli, command),
    }
}

fn main() {
    let cli = Cli::parse();

    ui::set_debug_mode(cli.debug);
    ui::init(cli.format, !cli.no_color && std::io::stdout().is_terminal());

    if let Err(e) = run(&cli) {
        emit(
            Level::Error,
            "archwsl.failed",
            &format!("{} {:#}", char::from(NerdFont::Cross), e),
            None,
        );
        std::process::exit(1);
    }
}
