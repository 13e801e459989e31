#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::time::Duration;

use layerpull_test_utils::FakeFetchTool;

/// Environment variables the binary reads; cleared so the host cannot leak into tests.
const LAYERPULL_ENV: &[&str] = &[
    "LAYERPULL_CONFIG",
    "LAYERPULL_FETCH_TOOL",
    "LAYERPULL_ARCHIVE_TOOL",
    "LAYERPULL_ACCESS_KEY",
    "LAYERPULL_SECRET_KEY",
    "RUST_LOG",
];

pub struct TestContext {
    pub cmd: Command,
    pub work: tempfile::TempDir,
}

impl TestContext {
    /// Fresh command with the same isolated environment.
    pub fn new_cmd(&self) -> Command {
        base_cmd()
    }

    /// Command preconfigured to fetch through `tool`.
    pub fn with_fetch_tool(&self, tool: &FakeFetchTool) -> Command {
        let mut cmd = self.new_cmd();
        cmd.arg("--fetch-tool").arg(tool.path());
        cmd
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.work.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write test file");
        path
    }
}

pub fn layerpull() -> TestContext {
    let work = tempfile::tempdir().expect("Failed to create work directory");
    TestContext {
        cmd: base_cmd(),
        work,
    }
}

fn base_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_layerpull"));
    cmd.timeout(Duration::from_secs(60));
    for var in LAYERPULL_ENV {
        cmd.env_remove(var);
    }
    cmd
}

pub fn exists(root: &Path, rel: &str) -> bool {
    root.join(rel).symlink_metadata().is_ok()
}
