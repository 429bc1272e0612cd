//! Post-install verification of the vcpkg tree
//!
//! Checks run as a short-circuiting chain:
//! 1. libraries: the merged `opencv_world*` artifact, falling back to
//!    per-module artifacts from [`CORE_MODULES`]
//! 2. the CMake package config under `share/opencv4`
//!
//! When both pass, the config directory is appended to the CI environment
//! file as `OpenCV_DIR=<dir>`.

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::installer::InstallVerifier;
use crate::Result;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Module name prefixes accepted when no world library exists.
pub const CORE_MODULES: &[&str] = &[
    "core",
    "imgproc",
    "highgui",
    "imgcodecs",
    "video",
    "videoio",
    "dnn",
    "features2d",
    "calib3d",
    "objdetect",
    "ml",
    "photo",
    "flann",
    "stitching",
];

const LIBRARY_PREFIX: &str = "opencv_";
const WORLD_PREFIX: &str = "opencv_world";

/// How the package was linked, derived from the triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    /// Static archives (`.lib`) under `lib/`
    Static,
    /// Shared libraries (`.dll`) under `bin/`
    Dynamic,
}

impl LinkMode {
    pub fn from_triplet(triplet: &str) -> Self {
        if triplet.contains("static") {
            LinkMode::Static
        } else {
            LinkMode::Dynamic
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            LinkMode::Static => "lib",
            LinkMode::Dynamic => "dll",
        }
    }

    /// Directory the artifacts for this mode are installed into
    pub fn artifact_dir(&self, config: &SetupConfig) -> PathBuf {
        match self {
            LinkMode::Static => config.lib_dir(),
            LinkMode::Dynamic => config.bin_dir(),
        }
    }
}

impl std::fmt::Display for LinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkMode::Static => write!(f, "static"),
            LinkMode::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// File name pattern `<prefix>*.<extension>`
///
/// The stem match is case-sensitive; the extension is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPattern {
    pub prefix: &'static str,
    pub extension: &'static str,
}

impl ArtifactPattern {
    /// The merged world library for a link mode
    pub fn world(mode: LinkMode) -> Self {
        Self {
            prefix: WORLD_PREFIX,
            extension: mode.extension(),
        }
    }

    /// Any per-module library for a link mode
    pub fn modules(mode: LinkMode) -> Self {
        Self {
            prefix: LIBRARY_PREFIX,
            extension: mode.extension(),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(self.extension))
            .unwrap_or(false);

        ext_matches && name.starts_with(self.prefix)
    }
}

/// Whether a library file belongs to one of the [`CORE_MODULES`].
pub fn is_core_module(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix(LIBRARY_PREFIX))
        .map(|module| CORE_MODULES.iter().any(|core| module.starts_with(core)))
        .unwrap_or(false)
}

/// List regular files in `dir` accepted by `predicate`, sorted by path.
///
/// A missing or unreadable directory yields an empty list.
pub fn find_matching<P>(dir: &Path, predicate: P) -> Vec<PathBuf>
where
    P: Fn(&Path) -> bool,
{
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut matches: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && predicate(p))
        .collect();
    matches.sort();
    matches
}

/// Names of every entry in `dir`, sorted, or `None` if it cannot be read.
pub fn directory_listing(dir: &Path) -> Option<Vec<String>> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    Some(names)
}

fn log_directory_listing(dir: &Path) {
    match directory_listing(dir) {
        Some(names) => {
            info!("contents of {}:", dir.display());
            for name in names {
                info!("  - {}", name);
            }
        }
        None => info!("  [{} does not exist]", dir.display()),
    }
}

/// A file found during verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl Artifact {
    fn from_path(path: PathBuf) -> Self {
        let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or_default();
        Self { path, size_bytes }
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Size in MiB (bytes / 1024²)
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.2} MB)", self.name(), self.size_mb())
    }
}

/// Outcome of one check in the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactCheck {
    Found(Vec<Artifact>),
    NotFound(String),
}

impl ArtifactCheck {
    pub fn is_found(&self) -> bool {
        matches!(self, ArtifactCheck::Found(_))
    }

    pub fn into_result(self) -> Result<Vec<Artifact>> {
        match self {
            ArtifactCheck::Found(artifacts) => Ok(artifacts),
            ArtifactCheck::NotFound(reason) => Err(SetupError::VerificationFailed(reason)),
        }
    }
}

/// Everything a successful verification discovered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub link_mode: LinkMode,
    pub artifacts: Vec<Artifact>,
    pub config_file: PathBuf,
    pub config_dir: PathBuf,
    /// Whether the CI environment file was written
    pub exported: bool,
}

/// Append `key=value` to the CI environment file.
///
/// Best effort: failures are logged and reported as `false`.
pub fn export_env(env_file: &Path, key: &str, value: &Path) -> bool {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(env_file)
        .and_then(|mut file| writeln!(file, "{}={}", key, value.display()));

    match result {
        Ok(()) => {
            info!(outcome = "success", "exported {}={}", key, value.display());
            true
        }
        Err(err) => {
            warn!(error = %err, "could not write {} to {}", key, env_file.display());
            false
        }
    }
}

/// Inspects an installed vcpkg tree
#[derive(Debug, Clone)]
pub struct Verifier<'a> {
    config: &'a SetupConfig,
    env_file: Option<PathBuf>,
}

impl<'a> Verifier<'a> {
    /// Build a verifier with an explicit CI environment file (or none).
    pub fn new(config: &'a SetupConfig, env_file: Option<PathBuf>) -> Self {
        Self { config, env_file }
    }

    /// Build a verifier that exports to the file named by
    /// `config.env_file_var`, if that variable is set and non-empty.
    pub fn from_env(config: &'a SetupConfig) -> Self {
        let env_file = std::env::var_os(&config.env_file_var)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::new(config, env_file)
    }

    pub fn link_mode(&self) -> LinkMode {
        LinkMode::from_triplet(&self.config.triplet)
    }

    /// World library first, then allow-listed module libraries.
    pub fn check_libraries(&self) -> ArtifactCheck {
        let mode = self.link_mode();
        let dir = mode.artifact_dir(self.config);
        let world = ArtifactPattern::world(mode);

        let mut found = find_matching(&dir, |p| world.matches(p));
        if found.is_empty() {
            debug!("no {} world library in {}, trying modules", mode, dir.display());
            let modules = ArtifactPattern::modules(mode);
            found = find_matching(&dir, |p| modules.matches(p) && is_core_module(p));
        }

        if found.is_empty() {
            error!("no OpenCV {} libraries found in {}", mode, dir.display());
            log_directory_listing(&dir);
            return ArtifactCheck::NotFound(format!(
                "no OpenCV {} libraries in {}",
                mode,
                dir.display()
            ));
        }

        let artifacts: Vec<Artifact> = found.into_iter().map(Artifact::from_path).collect();
        for artifact in &artifacts {
            info!(outcome = "success", "found OpenCV library: {}", artifact);
        }
        ArtifactCheck::Found(artifacts)
    }

    /// `share/opencv4/OpenCVConfig.cmake` must exist.
    pub fn check_config_file(&self) -> ArtifactCheck {
        let config_file = self.config.config_file();
        if config_file.is_file() {
            info!(outcome = "success", "found {}", config_file.display());
            return ArtifactCheck::Found(vec![Artifact::from_path(config_file)]);
        }

        error!("CMake config not found, expected at {}", config_file.display());
        if let Some(share) = self.config.share_dir().parent() {
            if share.is_dir() {
                log_directory_listing(share);
            }
        }
        ArtifactCheck::NotFound(format!("missing {}", config_file.display()))
    }

    /// Run every check and export the config directory on success.
    pub fn inspect(&self) -> Result<VerificationReport> {
        info!("verifying OpenCV installation in {}", self.config.installed_dir().display());

        let artifacts = self.check_libraries().into_result()?;
        self.check_config_file().into_result()?;

        let config_dir = self.config.share_dir();
        let exported = match &self.env_file {
            Some(path) => export_env(path, &self.config.export_key, &config_dir),
            None => {
                debug!("{} not set, skipping export", self.config.env_file_var);
                false
            }
        };

        Ok(VerificationReport {
            link_mode: self.link_mode(),
            artifacts,
            config_file: self.config.config_file(),
            config_dir,
            exported,
        })
    }
}

impl InstallVerifier for Verifier<'_> {
    fn verify(&self) -> bool {
        self.inspect().is_ok()
    }
}
