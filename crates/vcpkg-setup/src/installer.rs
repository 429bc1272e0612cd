//! vcpkg integration and the bounded install-retry loop.

use crate::config::SetupConfig;
use crate::runner::{run_command, CommandRunner, CommandSpec};
use std::time::Duration;
use tracing::{error, info, warn};

/// Blocking delay between attempts. Tests substitute a recorder.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Post-install check run after every reported-successful install.
pub trait InstallVerifier {
    fn verify(&self) -> bool;
}

/// Why an attempt did not end in a verified install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
    /// `vcpkg install` itself failed
    Install,
    /// Install reported success but the tree did not verify
    Verification,
}

/// States of the install loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Attempting(u32),
    AttemptFailed(u32, AttemptFailure),
    Verified(u32),
    Failed,
}

/// Final result of [`Installer::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Installed and verified on this attempt (1-based)
    Installed { attempt: u32 },
    /// Every attempt failed
    Failed { attempts: u32 },
}

impl InstallOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, InstallOutcome::Installed { .. })
    }
}

/// Run `vcpkg integrate install` once.
///
/// Strict: any failure is final and the caller must abort.
pub fn integrate(config: &SetupConfig, runner: &dyn CommandRunner) -> bool {
    let spec = CommandSpec::new(
        vec![
            config.executable_path().display().to_string(),
            "integrate".to_string(),
            "install".to_string(),
        ],
        "integrate vcpkg",
    )
    .strict();
    run_command(runner, &spec)
}

/// Installs the configured package, retrying on install or verify failure.
pub struct Installer<'a> {
    config: &'a SetupConfig,
    runner: &'a dyn CommandRunner,
    sleeper: &'a dyn Sleeper,
    verifier: &'a dyn InstallVerifier,
}

impl<'a> Installer<'a> {
    pub fn new(
        config: &'a SetupConfig,
        runner: &'a dyn CommandRunner,
        sleeper: &'a dyn Sleeper,
        verifier: &'a dyn InstallVerifier,
    ) -> Self {
        Self {
            config,
            runner,
            sleeper,
            verifier,
        }
    }

    fn install_spec(&self, attempt: u32) -> CommandSpec {
        CommandSpec::new(
            vec![
                self.config.executable_path().display().to_string(),
                "install".to_string(),
                self.config.package_spec(),
            ],
            format!("install {} (attempt {})", self.config.package, attempt),
        )
    }

    /// One attempt: install, then verify if the install reported success.
    fn attempt(&self, attempt: u32) -> AttemptState {
        info!("attempt {}/{}", attempt, self.config.max_retries);

        if !run_command(self.runner, &self.install_spec(attempt)) {
            warn!("install of {} failed (attempt {})", self.config.package, attempt);
            return AttemptState::AttemptFailed(attempt, AttemptFailure::Install);
        }

        if self.verifier.verify() {
            AttemptState::Verified(attempt)
        } else {
            warn!("{} installed but verification failed", self.config.package);
            AttemptState::AttemptFailed(attempt, AttemptFailure::Verification)
        }
    }

    /// Drive the attempt state machine to a terminal state.
    ///
    /// A failed verification re-runs the whole install on the next attempt.
    pub fn run(&self) -> InstallOutcome {
        info!("installing {}", self.config.package_spec());

        let max = self.config.max_retries;
        let mut state = AttemptState::Attempting(1);
        loop {
            state = match state {
                AttemptState::Attempting(n) => self.attempt(n),
                AttemptState::AttemptFailed(n, _) if n < max => {
                    info!("retrying in {} seconds", self.config.retry_delay_secs);
                    self.sleeper.sleep(self.config.retry_delay());
                    AttemptState::Attempting(n + 1)
                }
                AttemptState::AttemptFailed(..) => AttemptState::Failed,
                AttemptState::Verified(attempt) => {
                    info!(outcome = "success", "{} installed and verified", self.config.package);
                    return InstallOutcome::Installed { attempt };
                }
                AttemptState::Failed => {
                    error!("{} install failed after {} attempt(s)", self.config.package, max);
                    return InstallOutcome::Failed { attempts: max };
                }
            };
        }
    }
}
