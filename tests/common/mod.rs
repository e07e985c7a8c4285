//! Shared test infrastructure for integration tests.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tempfile::TempDir;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// Captured result of one `vprovision` invocation.
#[derive(Debug)]
pub struct Run {
    pub status: ExitStatus,
    pub stdout: String,
    #[allow(dead_code)]
    pub stderr: String,
}

impl Run {
    /// The outcome token: always the last line of stdout.
    #[allow(dead_code)]
    pub fn last_line(&self) -> &str {
        self.stdout.lines().next_back().unwrap_or_default()
    }
}

/// Scratch area plus environment for running the binary against the
/// scripted backend in `tests/fixtures/fake-mumps.sh`.
pub struct Sandbox {
    pub dir: TempDir,
    envs: Vec<(String, String)>,
}

impl Sandbox {
    pub fn create() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
            envs: Vec::new(),
        }
    }

    #[allow(dead_code)]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.path().join("session.log")
    }

    #[allow(dead_code)]
    pub fn report_path(&self) -> PathBuf {
        self.dir.path().join("report.json")
    }

    /// `--backend-command` value that starts the scripted backend.
    #[allow(dead_code)]
    pub fn fake_backend() -> String {
        let script = manifest_dir().join("tests/fixtures/fake-mumps.sh");
        shell_words::join(["sh".to_string(), script.display().to_string()])
    }

    /// Whether `sh` is available to host the scripted backend.
    #[allow(dead_code)]
    pub fn has_shell() -> bool {
        let found = Command::new("sh")
            .arg("-c")
            .arg("exit 0")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok();
        if !found {
            eprintln!("Skipping: sh not available");
        }
        found
    }

    pub fn run(&self, args: &[&str]) -> Run {
        let mut command = Command::new(env!("CARGO_BIN_EXE_vprovision"));
        command
            .args(args)
            .current_dir(self.dir.path())
            .env_remove("gtm_dist")
            .env_remove("RUST_LOG");
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        let output = command.output().expect("run vprovision");
        Run {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// Run the full provisioning sequence against the scripted backend.
    #[allow(dead_code)]
    pub fn provision(&self) -> Run {
        let log = self.log_path();
        let report = self.report_path();
        let backend = Self::fake_backend();
        self.run(&[
            "run",
            "--settle-secs",
            "0",
            "--log-file",
            path_str(&log),
            "--report",
            path_str(&report),
            "--backend-command",
            &backend,
        ])
    }

    #[allow(dead_code)]
    pub fn report(&self) -> serde_json::Value {
        let text = std::fs::read_to_string(self.report_path()).expect("read report");
        serde_json::from_str(&text).expect("parse report")
    }
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}
