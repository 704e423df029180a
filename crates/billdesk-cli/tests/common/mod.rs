use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;
use wiremock::MockServer;

/// An isolated CLI environment: its own session file and API server.
pub struct CliEnv {
    pub dir: TempDir,
    pub api_url: String,
}

impl CliEnv {
    pub fn new(server: &MockServer) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            api_url: format!("http://127.0.0.1:{}", server.address().port()),
        }
    }

    pub fn session_file(&self) -> PathBuf {
        self.dir.path().join("session.json")
    }

    /// Run the CLI binary with arguments.
    pub fn run(&self, args: &[&str]) -> Output {
        run_cli(args, &self.api_url, &self.session_file(), self.dir.path())
    }

    /// Run the CLI and expect success.
    pub fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// Run the CLI and expect failure, returning stderr.
    pub fn run_failure(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if output.status.success() {
            panic!("CLI command should have failed: {:?}", args);
        }
        String::from_utf8_lossy(&output.stderr).to_string()
    }
}

fn run_cli(args: &[&str], api_url: &str, session_file: &Path, home: &Path) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_billdesk"));
    cmd.args(args);
    cmd.env("BILLDESK_API_URL", api_url);
    cmd.env("BILLDESK_SESSION_FILE", session_file);
    cmd.env("HOME", home);
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("BILLDESK_API_KEY");
    cmd.env_remove("BILLDESK_PASSWORD");
    cmd.env_remove("RUST_LOG");
    cmd.output().expect("Failed to execute CLI")
}
