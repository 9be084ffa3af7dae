//! Shared fixtures: a throwaway project with a `.venv` holding fake distributions.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use tempfile::TempDir;

pub struct Project {
    pub dir: TempDir,
}

impl Project {
    /// Empty project root with a `pyproject.toml` and an empty `.venv`.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pyproject.toml"), "[project]\nname = \"demo\"\n").unwrap();
        fs::create_dir_all(dir.path().join(".venv/lib/python3.11/site-packages")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn venv(&self) -> PathBuf {
        self.root().join(".venv")
    }

    pub fn site_packages(&self) -> PathBuf {
        self.venv().join("lib/python3.11/site-packages")
    }

    /// Install a fake wheel: `<name>-<version>.dist-info/METADATA`.
    pub fn install(&self, name: &str, version: &str, license_headers: &[&str]) -> &Self {
        let dist = self.site_packages().join(format!("{name}-{version}.dist-info"));
        fs::create_dir_all(&dist).unwrap();
        let mut metadata = format!("Metadata-Version: 2.1\nName: {name}\nVersion: {version}\n");
        for header in license_headers {
            metadata.push_str(header);
            metadata.push('\n');
        }
        metadata.push_str("\nLong description.\n");
        fs::write(dist.join("METADATA"), metadata).unwrap();
        self
    }

    /// Mark an installed distribution as coming from a VCS checkout.
    pub fn install_from_git(&self, name: &str, version: &str, url: &str, commit: &str) -> &Self {
        self.install(name, version, &["License: MIT"]);
        let dist = self.site_packages().join(format!("{name}-{version}.dist-info"));
        fs::write(
            dist.join("direct_url.json"),
            format!(r#"{{"url": "{url}", "vcs_info": {{"vcs": "git", "commit_id": "{commit}"}}}}"#),
        )
        .unwrap();
        self
    }

    pub fn write_config(&self, content: &str) -> &Self {
        fs::write(self.root().join("licenses-deny.toml"), content).unwrap();
        self
    }

    /// The binary, run from the project root with a clean environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("licenses-deny");
        cmd.current_dir(self.root())
            .env("HOME", self.root())
            .env("NO_COLOR", "1")
            .env_remove("VIRTUAL_ENV")
            .env_remove("RUST_LOG");
        cmd
    }
}
