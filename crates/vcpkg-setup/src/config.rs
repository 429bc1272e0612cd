//! Provisioning configuration
//!
//! A [`SetupConfig`] is built once at startup (defaults, then an optional
//! TOML file, then CLI overrides) and passed by reference to every
//! component. Nothing mutates it afterwards.

use crate::error::SetupError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Subdirectory of `share/` holding the CMake package config
pub const CMAKE_SHARE_SUBDIR: &str = "opencv4";

/// CMake package config file name
pub const CMAKE_CONFIG_FILE: &str = "OpenCVConfig.cmake";

/// Configuration for a single install-and-verify run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// vcpkg checkout root
    pub vcpkg_root: PathBuf,
    /// Executable name inside the root
    pub executable: String,
    /// Port to install
    pub package: String,
    /// Target triplet, e.g. `x64-windows-static`
    pub triplet: String,
    /// Maximum number of install attempts
    pub max_retries: u32,
    /// Delay between attempts, in seconds
    pub retry_delay_secs: u64,
    /// Environment variable naming the CI environment file
    pub env_file_var: String,
    /// Key written to the CI environment file
    pub export_key: String,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            vcpkg_root: PathBuf::from(r"C:\vcpkg"),
            executable: default_executable().to_string(),
            package: "opencv".to_string(),
            triplet: "x64-windows-static".to_string(),
            max_retries: 3,
            retry_delay_secs: 30,
            env_file_var: "GITHUB_ENV".to_string(),
            export_key: "OpenCV_DIR".to_string(),
        }
    }
}

fn default_executable() -> &'static str {
    if cfg!(windows) {
        "vcpkg.exe"
    } else {
        "vcpkg"
    }
}

impl SetupConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SetupConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject configurations that cannot drive an install.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(SetupError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }

        let required = [
            ("package", &self.package),
            ("triplet", &self.triplet),
            ("executable", &self.executable),
            ("export_key", &self.export_key),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SetupError::InvalidConfig(format!("{} must not be empty", name)));
            }
        }

        Ok(())
    }

    pub fn executable_path(&self) -> PathBuf {
        self.vcpkg_root.join(&self.executable)
    }

    /// `<root>/installed/<triplet>`
    pub fn installed_dir(&self) -> PathBuf {
        self.vcpkg_root.join("installed").join(&self.triplet)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.installed_dir().join("bin")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.installed_dir().join("lib")
    }

    /// Directory exported to the CI environment file
    pub fn share_dir(&self) -> PathBuf {
        self.installed_dir().join("share").join(CMAKE_SHARE_SUBDIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.share_dir().join(CMAKE_CONFIG_FILE)
    }

    /// Argument passed to `vcpkg install`
    pub fn package_spec(&self) -> String {
        format!("{}:{}", self.package, self.triplet)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}
