//! Error types for vcpkg-setup

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while provisioning a vcpkg package
#[derive(Error, Debug)]
pub enum SetupError {
    /// vcpkg root directory is missing
    #[error("vcpkg root not found at: {}", .0.display())]
    RootNotFound(PathBuf),

    /// vcpkg executable is missing inside the root
    #[error("vcpkg executable not found at: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    /// `vcpkg integrate install` failed
    #[error("vcpkg integration failed")]
    IntegrationFailed,

    /// Every install attempt failed or could not be verified
    #[error("installing {package} failed after {attempts} attempt(s)")]
    RetriesExhausted { package: String, attempts: u32 },

    /// Installed tree is missing expected artifacts
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// Command exited with a non-zero status in strict mode
    #[error("command `{command}` failed with exit code {exit_code}")]
    CommandFailed { command: String, exit_code: i32 },

    /// Command could not be started
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
