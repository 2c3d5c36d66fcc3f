//! Command-line interface definitions.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level CLI entry point for the reconciliation engine.
#[derive(Parser, Debug)]
#[command(
    name = "winstate",
    about = "Desired-state reconciliation for Windows Server DNS, DHCP, AD and GPO objects",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Flags accepted by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Reconcile objects one at a time (parallel is enabled by default)
    #[arg(long = "no-parallel", global = true, action = clap::ArgAction::SetFalse)]
    pub parallel: bool,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Management surface to reconcile against
    #[arg(long, global = true, value_enum, default_value_t = SurfaceKind::Powershell)]
    pub surface: SurfaceKind,

    /// State file used by `--surface state-file`
    #[arg(long, global = true, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Remote server for the PowerShell cmdlets (defaults to the local machine)
    #[arg(long, global = true, value_name = "HOST")]
    pub server: Option<String>,
}

/// Where current state is read from and changes are sent to.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Windows Server PowerShell modules and winget.
    Powershell,
    /// A JSON snapshot on disk.
    StateFile,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show what `apply` would change
    Plan(ManifestOpts),
    /// Reconcile every object in the manifest
    Apply(ManifestOpts),
    /// Show the live state of the objects in the manifest without changing them
    Info(InfoOpts),
    /// Print the recognized options of one or all object kinds
    Schema(SchemaOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Plan(_) => "plan",
            Self::Apply(_) => "apply",
            Self::Info(_) => "info",
            Self::Schema(_) => "schema",
            Self::Version => "version",
        }
    }
}

/// Options for `plan` and `apply`.
#[derive(Parser, Debug, Clone)]
pub struct ManifestOpts {
    /// Manifest to reconcile
    #[arg(default_value = "winstate.toml")]
    pub manifest: PathBuf,
}

/// Options for the `info` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct InfoOpts {
    /// Manifest naming the objects to look up
    #[arg(default_value = "winstate.toml")]
    pub manifest: PathBuf,

    /// Only show objects of this kind
    #[arg(short, long)]
    pub kind: Option<String>,
}

/// Options for the `schema` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct SchemaOpts {
    /// Object kind (dns_zone, dhcp_scope, dhcp_lease, ou, gpo, package)
    pub kind: Option<String>,
}
