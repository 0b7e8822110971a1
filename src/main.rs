/*!
 * Outpost CLI
 */

use clap::Parser;
use outpost::{
    controller::{supervise, Controller},
    error::{AgentError, Result, EXIT_SUCCESS},
    logging,
    settings::{LogLevel, RuntimeSettings},
    VERSION,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "outpost")]
#[command(version, about = "Unattended game session agent with config migration and jittered scheduling", long_about = None)]
struct Cli {
    /// Runtime settings file (TOML)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Configuration document to maintain; the backup is kept next to it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Shipped configuration template
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Log at info instead of debug
    #[arg(short, long)]
    quiet: bool,

    /// Write JSON logs to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Stop after this many cycles
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,

    /// Never start the first-run wizard
    #[arg(long)]
    no_interactive: bool,
}

impl Cli {
    fn apply(&self, settings: &mut RuntimeSettings) {
        if let Some(config) = &self.config {
            settings.config_path = config.clone();
            settings.backup_path = config.with_extension("bak");
        }
        if let Some(template) = &self.template {
            settings.template_path = template.clone();
        }
        if self.quiet {
            settings.log_level = LogLevel::Info;
        }
        if let Some(log) = &self.log {
            settings.log_file = Some(log.clone());
        }
        if let Some(cycles) = self.cycles {
            settings.max_cycles = cycles;
        }
        if self.no_interactive {
            settings.interactive = false;
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = guidance(&e) {
                eprintln!("{}", hint);
            }
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => RuntimeSettings::from_file(path)?,
        None => RuntimeSettings::default(),
    };
    cli.apply(&mut settings);

    if let Err(e) = logging::init_logging(&settings) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }
    info!(version = VERSION, config = %settings.config_path.display(), "Starting outpost");

    supervise(settings.max_restarts, || Controller::from_settings(&settings))
}

/// What the user can do about a fatal error
fn guidance(err: &AgentError) -> Option<&'static str> {
    match err {
        AgentError::MissingConfig(_) => Some(
            "Place config.example.json next to the config path and run outpost in a terminal to create a configuration.",
        ),
        AgentError::CorruptConfig { .. } => {
            Some("Fix the file by hand or restore it from the backup (config.bak).")
        }
        AgentError::SessionExpired | AgentError::RestartBudgetExhausted { .. } => {
            Some("Log in with the browser again and update server.cookie in the configuration.")
        }
        _ => None,
    }
}
