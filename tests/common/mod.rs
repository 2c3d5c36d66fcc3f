// Shared helpers for integration tests.
//
// Provides a temporary directory holding a manifest and a state file, so each
// integration test can drive `plan`/`apply` against the state-file surface
// without touching a real server.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use winstate_cli::cli::{Cli, Command, GlobalOpts, InfoOpts, ManifestOpts};
use winstate_cli::logging::Logger;

/// A manifest used by several tests: one object of four different kinds.
pub const SITE_MANIFEST: &str = r#"
[[dns_zone]]
name = "corp.example.com"
type = "forwarder"
dns_servers = ["10.0.0.1", "10.0.0.2"]

[[dhcp_scope]]
scope_id = "192.168.100.0"
name = "VLAN10"
start_range = "192.168.100.10"
end_range = "192.168.100.254"
subnet_mask = "255.255.255.0"

[[ou]]
name = "EUC Users"
path = "DC=corp,DC=example,DC=com"
protected = true

[[package]]
id = "Git.Git"
version = "2.44.0"
"#;

/// An isolated workspace backed by a [`tempfile::TempDir`].
pub struct IntegrationTestContext {
    /// Temporary directory containing the manifest and state file.
    pub root: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Create a workspace whose manifest is `content`.
    pub fn with_manifest(content: &str) -> Self {
        let ctx = Self::new();
        ctx.write_manifest(content);
        ctx
    }

    /// Path of the manifest file.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.path().join("winstate.toml")
    }

    /// Path of the state file used as the surface.
    pub fn state_path(&self) -> PathBuf {
        self.root.path().join("state.json")
    }

    /// Overwrite the manifest.
    pub fn write_manifest(&self, content: &str) {
        std::fs::write(self.manifest_path(), content).expect("write manifest");
    }

    /// Overwrite the state file with a recorded snapshot.
    pub fn write_state(&self, content: &str) {
        std::fs::write(self.state_path(), content).expect("write state file");
    }

    /// Parsed state file.
    pub fn state(&self) -> serde_json::Value {
        let text = std::fs::read_to_string(self.state_path()).expect("read state file");
        serde_json::from_str(&text).expect("state file is JSON")
    }

    /// Parse `subcommand` plus `extra` flags with the state-file surface
    /// pointed at this workspace.
    pub fn cli(&self, subcommand: &str, extra: &[&str]) -> (GlobalOpts, ManifestOpts) {
        let cli = self.parse(subcommand, extra, &[]);
        match cli.command {
            Command::Plan(opts) | Command::Apply(opts) => (cli.global, opts),
            other => panic!("unexpected command {other:?}"),
        }
    }

    /// Parse `info` with `extra` global flags and `trailing` info flags.
    pub fn info_cli(&self, extra: &[&str], trailing: &[&str]) -> (GlobalOpts, InfoOpts) {
        let cli = self.parse("info", extra, trailing);
        match cli.command {
            Command::Info(opts) => (cli.global, opts),
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn parse(&self, subcommand: &str, extra: &[&str], trailing: &[&str]) -> Cli {
        let manifest = self.manifest_path();
        let state = self.state_path();
        let mut args: Vec<&str> = vec!["winstate", "--no-parallel", "--surface", "state-file"];
        args.extend(["--state", path_str(&state)]);
        args.extend(extra);
        args.extend([subcommand, path_str(&manifest)]);
        args.extend(trailing);
        Cli::parse_from(args)
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

/// A fresh logger; no subscriber is installed so nothing reaches the console.
pub fn logger() -> Arc<Logger> {
    Arc::new(Logger::new("integration-test").without_progress())
}
