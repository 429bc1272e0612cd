//! Integration tests for the full provisioning flow against a temp-dir
//! vcpkg tree and a scripted package manager.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use vcpkg_setup::{
    provision, CommandOutput, CommandRunner, CommandSpec, SetupConfig, SetupError, Sleeper,
    Verifier,
};

/// Fake vcpkg: `integrate` always answers with `integrate_code`; each
/// `install` pops the next scripted exit code and, on success, lays down
/// the files in `on_install`.
struct FakeVcpkg {
    integrate_code: i32,
    install_codes: RefCell<VecDeque<i32>>,
    on_install: Vec<(PathBuf, u64)>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl FakeVcpkg {
    fn new(integrate_code: i32, install_codes: &[i32]) -> Self {
        Self {
            integrate_code,
            install_codes: RefCell::new(install_codes.iter().copied().collect()),
            on_install: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn installs(mut self, files: &[(PathBuf, u64)]) -> Self {
        self.on_install = files.to_vec();
        self
    }

    fn subcommands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|argv| argv[1].clone()).collect()
    }
}

impl CommandRunner for FakeVcpkg {
    fn execute(&self, spec: &CommandSpec) -> vcpkg_setup::Result<CommandOutput> {
        self.calls.borrow_mut().push(spec.argv.clone());

        let exit_code = match spec.argv[1].as_str() {
            "integrate" => self.integrate_code,
            _ => self.install_codes.borrow_mut().pop_front().unwrap_or(1),
        };
        if exit_code == 0 && spec.argv[1] == "install" {
            for (path, size) in &self.on_install {
                touch(path, *size);
            }
        }
        if spec.strict && exit_code != 0 {
            return Err(SetupError::CommandFailed {
                command: spec.display(),
                exit_code,
            });
        }
        Ok(CommandOutput {
            stdout: format!("{} done", spec.argv[1]),
            stderr: String::new(),
            exit_code,
        })
    }
}

#[derive(Default)]
struct CountingSleeper {
    calls: Cell<u32>,
    total: Cell<Duration>,
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, duration: Duration) {
        self.calls.set(self.calls.get() + 1);
        self.total.set(self.total.get() + duration);
    }
}

fn touch(path: &Path, size: u64) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::File::create(path).unwrap().set_len(size).unwrap();
}

/// vcpkg root with the executable present and nothing installed yet.
fn vcpkg_root(triplet: &str) -> (TempDir, SetupConfig) {
    let dir = tempdir().unwrap();
    let config = SetupConfig {
        vcpkg_root: dir.path().to_path_buf(),
        triplet: triplet.to_string(),
        ..SetupConfig::default()
    };
    touch(&config.executable_path(), 0);
    (dir, config)
}

fn opencv_files(config: &SetupConfig) -> Vec<(PathBuf, u64)> {
    vec![
        (config.lib_dir().join("opencv_world455.lib"), 120 * 1024 * 1024),
        (config.config_file(), 2048),
    ]
}

/// Test: first install succeeds, verifies, and exports OpenCV_DIR
#[test]
fn test_successful_provision_exports_config_dir() {
    let (dir, config) = vcpkg_root("x64-windows-static");
    let env_file = dir.path().join("github_env");
    std::fs::write(&env_file, "PATH_ADDED=1\n").unwrap();

    let vcpkg = FakeVcpkg::new(0, &[0]).installs(&opencv_files(&config));
    let sleeper = CountingSleeper::default();
    let verifier = Verifier::new(&config, Some(env_file.clone()));

    let attempt = provision(&config, &vcpkg, &sleeper, &verifier).expect("provision failed");

    assert_eq!(attempt, 1);
    assert_eq!(vcpkg.subcommands(), vec!["integrate", "install"]);
    assert_eq!(sleeper.calls.get(), 0);

    let content = std::fs::read_to_string(&env_file).unwrap();
    assert_eq!(
        content,
        format!("PATH_ADDED=1\nOpenCV_DIR={}\n", config.share_dir().display())
    );
}

/// Test: transient install failures are retried with the configured delay
#[test]
fn test_retries_until_install_succeeds() {
    let (_dir, config) = vcpkg_root("x64-windows-static");
    let vcpkg = FakeVcpkg::new(0, &[1, 0]).installs(&opencv_files(&config));
    let sleeper = CountingSleeper::default();
    let verifier = Verifier::new(&config, None);

    let attempt = provision(&config, &vcpkg, &sleeper, &verifier).expect("provision failed");

    assert_eq!(attempt, 2);
    assert_eq!(sleeper.calls.get(), 1);
    assert_eq!(sleeper.total.get(), Duration::from_secs(30));
}

/// Test: exhausting retries is reported with the attempt count
#[test]
fn test_exhausted_retries() {
    let (_dir, config) = vcpkg_root("x64-windows-static");
    let vcpkg = FakeVcpkg::new(0, &[1, 1, 1]);
    let sleeper = CountingSleeper::default();
    let verifier = Verifier::new(&config, None);

    let err = provision(&config, &vcpkg, &sleeper, &verifier).unwrap_err();

    assert!(matches!(err, SetupError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(sleeper.calls.get(), 2);
    assert_eq!(vcpkg.subcommands(), vec!["integrate", "install", "install", "install"]);
}

/// Test: an install that never produces the CMake config is retried, then fails
#[test]
fn test_missing_cmake_config_exhausts_retries() {
    let (dir, config) = vcpkg_root("x64-windows-static");
    let env_file = dir.path().join("github_env");
    let vcpkg = FakeVcpkg::new(0, &[0, 0, 0])
        .installs(&[(config.lib_dir().join("opencv_world455.lib"), 1024)]);
    let sleeper = CountingSleeper::default();
    let verifier = Verifier::new(&config, Some(env_file.clone()));

    let err = provision(&config, &vcpkg, &sleeper, &verifier).unwrap_err();

    assert!(matches!(err, SetupError::RetriesExhausted { .. }));
    assert_eq!(vcpkg.subcommands().len(), 4);
    assert!(!env_file.exists());
}

/// Test: dynamic triplets are verified against world DLLs in bin/
#[test]
fn test_dynamic_triplet() {
    let (_dir, config) = vcpkg_root("x64-windows");
    let vcpkg = FakeVcpkg::new(0, &[0]).installs(&[
        (config.bin_dir().join("opencv_world455.dll"), 4096),
        (config.config_file(), 128),
    ]);
    let sleeper = CountingSleeper::default();
    let verifier = Verifier::new(&config, None);

    assert_eq!(provision(&config, &vcpkg, &sleeper, &verifier).unwrap(), 1);
    assert_eq!(vcpkg.calls.borrow()[1][2], "opencv:x64-windows");
}

/// Test: missing root aborts before any command runs
#[test]
fn test_missing_root_is_fatal() {
    let dir = tempdir().unwrap();
    let config = SetupConfig {
        vcpkg_root: dir.path().join("no-vcpkg"),
        ..SetupConfig::default()
    };
    let vcpkg = FakeVcpkg::new(0, &[0]);
    let sleeper = CountingSleeper::default();
    let verifier = Verifier::new(&config, None);

    let err = provision(&config, &vcpkg, &sleeper, &verifier).unwrap_err();

    assert!(matches!(err, SetupError::RootNotFound(_)));
    assert!(vcpkg.calls.borrow().is_empty());
}

/// Test: missing executable aborts before any command runs
#[test]
fn test_missing_executable_is_fatal() {
    let dir = tempdir().unwrap();
    let config = SetupConfig {
        vcpkg_root: dir.path().to_path_buf(),
        ..SetupConfig::default()
    };
    let vcpkg = FakeVcpkg::new(0, &[0]);
    let sleeper = CountingSleeper::default();
    let verifier = Verifier::new(&config, None);

    let err = provision(&config, &vcpkg, &sleeper, &verifier).unwrap_err();

    assert!(matches!(err, SetupError::ExecutableNotFound(_)));
    assert!(vcpkg.calls.borrow().is_empty());
}

/// Test: integration failure is fatal and no install is attempted
#[test]
fn test_integration_failure_is_fatal() {
    let (_dir, config) = vcpkg_root("x64-windows-static");
    let vcpkg = FakeVcpkg::new(1, &[0]);
    let sleeper = CountingSleeper::default();
    let verifier = Verifier::new(&config, None);

    let err = provision(&config, &vcpkg, &sleeper, &verifier).unwrap_err();

    assert!(matches!(err, SetupError::IntegrationFailed));
    assert_eq!(vcpkg.subcommands(), vec!["integrate"]);
    assert_eq!(sleeper.calls.get(), 0);
}
