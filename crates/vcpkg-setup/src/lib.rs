//! vcpkg-setup: install and verify a vcpkg package on a CI runner
//!
//! The flow is strictly sequential:
//!
//! 1. check that the vcpkg root and executable exist
//! 2. run `vcpkg integrate install` once
//! 3. run `vcpkg install <package>:<triplet>` with bounded retries,
//!    verifying the installed tree after every reported success
//! 4. append `OpenCV_DIR=<share dir>` to the CI environment file
//!
//! Every component takes a [`SetupConfig`] by reference, and the process
//! and clock boundaries sit behind the [`CommandRunner`] and [`Sleeper`]
//! traits so the whole flow can be driven from tests.

pub mod config;
pub mod error;
pub mod installer;
pub mod provision;
pub mod runner;
pub mod telemetry;
pub mod verifier;

pub use config::SetupConfig;
pub use error::SetupError;
pub use installer::{
    integrate, AttemptFailure, AttemptState, InstallOutcome, InstallVerifier, Installer, Sleeper,
    ThreadSleeper,
};
pub use provision::provision;
pub use runner::{run_command, CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use telemetry::{default_level, init_tracing, LogFormat};
pub use verifier::{
    export_env, find_matching, Artifact, ArtifactCheck, ArtifactPattern, LinkMode,
    VerificationReport, Verifier, CORE_MODULES,
};

/// Result type for vcpkg-setup operations
pub type Result<T> = std::result::Result<T, SetupError>;
