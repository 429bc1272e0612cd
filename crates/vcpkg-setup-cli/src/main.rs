//! vcpkg-setup - install and verify a vcpkg package on a CI runner
//!
//! ## Commands
//!
//! - `install` (default): integrate vcpkg, install with retries, verify,
//!   and export `OpenCV_DIR` to the CI environment file
//! - `verify`: check an existing install without running vcpkg
//! - `show-config`: print the effective configuration

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use vcpkg_setup::{
    default_level, init_tracing, provision, InstallVerifier, LogFormat, SetupConfig, SystemRunner,
    ThreadSleeper, Verifier,
};

#[derive(Parser)]
#[command(name = "vcpkg-setup")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Install and verify a vcpkg package in CI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags layered over the defaults and the optional config file
#[derive(Args, Debug, Default)]
struct ConfigOverrides {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// vcpkg root directory
    #[arg(long, global = true, env = "VCPKG_ROOT")]
    vcpkg_root: Option<PathBuf>,

    /// Target triplet, e.g. x64-windows-static
    #[arg(long, global = true, env = "VCPKG_DEFAULT_TRIPLET")]
    triplet: Option<String>,

    /// Port to install
    #[arg(long, global = true)]
    package: Option<String>,

    /// Maximum install attempts
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long, global = true)]
    retry_delay: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Integrate vcpkg, install the package, and verify it (default)
    Install,

    /// Verify an existing installation without running vcpkg
    Verify {
        /// Print the verification report as JSON on stdout
        #[arg(long)]
        report: bool,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

impl ConfigOverrides {
    fn resolve(self) -> Result<SetupConfig> {
        let mut config = match &self.config {
            Some(path) => SetupConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => SetupConfig::default(),
        };

        if let Some(root) = self.vcpkg_root {
            config.vcpkg_root = root;
        }
        if let Some(triplet) = self.triplet {
            config.triplet = triplet;
        }
        if let Some(package) = self.package {
            config.package = package;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(delay) = self.retry_delay {
            config.retry_delay_secs = delay;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(LogFormat::from_json_flag(cli.json), default_level(cli.verbose));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.overrides.resolve()?;

    match cli.command.unwrap_or(Commands::Install) {
        Commands::Install => cmd_install(&config),
        Commands::Verify { report } => cmd_verify(&config, report),
        Commands::ShowConfig => cmd_show_config(&config),
    }
}

fn cmd_install(config: &SetupConfig) -> Result<()> {
    let verifier = Verifier::from_env(config);
    let attempt = provision(config, &SystemRunner, &ThreadSleeper, &verifier)?;
    info!(attempt, "done");
    Ok(())
}

fn cmd_verify(config: &SetupConfig, report: bool) -> Result<()> {
    let verifier = Verifier::from_env(config);

    if !report {
        anyhow::ensure!(verifier.verify(), "verification of {} failed", config.package);
        return Ok(());
    }

    let findings = verifier.inspect()?;
    println!("{}", serde_json::to_string_pretty(&findings)?);
    Ok(())
}

fn cmd_show_config(config: &SetupConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
