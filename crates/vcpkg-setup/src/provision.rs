//! End-to-end provisioning: preconditions, integration, install.

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::installer::{integrate, InstallOutcome, InstallVerifier, Installer, Sleeper};
use crate::runner::CommandRunner;
use crate::Result;
use tracing::{error, info};

/// Install and verify the configured package.
///
/// Returns the attempt number that produced a verified install. Missing
/// root, missing executable, and a failed integration abort before any
/// install attempt is made.
pub fn provision(
    config: &SetupConfig,
    runner: &dyn CommandRunner,
    sleeper: &dyn Sleeper,
    verifier: &dyn InstallVerifier,
) -> Result<u32> {
    info!(
        vcpkg_root = %config.vcpkg_root.display(),
        triplet = %config.triplet,
        "provisioning {}",
        config.package
    );

    if !config.vcpkg_root.is_dir() {
        error!("vcpkg not found at {}", config.vcpkg_root.display());
        return Err(SetupError::RootNotFound(config.vcpkg_root.clone()));
    }

    let executable = config.executable_path();
    if !executable.is_file() {
        error!("{} not found at {}", config.executable, executable.display());
        return Err(SetupError::ExecutableNotFound(executable));
    }

    if !integrate(config, runner) {
        error!("vcpkg integration failed");
        return Err(SetupError::IntegrationFailed);
    }

    match Installer::new(config, runner, sleeper, verifier).run() {
        InstallOutcome::Installed { attempt } => {
            info!(outcome = "success", "all steps completed");
            Ok(attempt)
        }
        InstallOutcome::Failed { attempts } => {
            error!("{} installation failed", config.package);
            Err(SetupError::RetriesExhausted {
                package: config.package.clone(),
                attempts,
            })
        }
    }
}
