//! Subcommand orchestration.
pub mod apply;
pub mod info;
pub mod schema;
pub mod version;

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, SurfaceKind};
use crate::config::Config;
use crate::exec::SystemExecutor;
use crate::logging::Logger;
use crate::surface::ManagementSurface;
use crate::surface::powershell::PowerShellSurface;
use crate::surface::state_file::StateFileSurface;

static SYSTEM_EXECUTOR: SystemExecutor = SystemExecutor;

/// Shared state produced by the common command setup sequence.
///
/// Encapsulates manifest loading and surface selection so that `plan` and
/// `apply` do not repeat the boilerplate.
pub struct CommandSetup {
    /// Loaded manifest.
    pub config: Config,
    /// Surface selected by `--surface`.
    pub surface: Box<dyn ManagementSurface>,
}

impl std::fmt::Debug for CommandSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSetup")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CommandSetup {
    /// Load the manifest, report its warnings, and open the surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest fails to load or the surface cannot
    /// be opened.
    pub fn init(global: &GlobalOpts, manifest: &Path, log: &Logger) -> Result<Self> {
        log.stage("Loading manifest");
        let config = Config::load(manifest)
            .with_context(|| format!("loading manifest {}", manifest.display()))?;
        log.info(&format!(
            "loaded {} object(s) from {}",
            config.desired.len(),
            config.path.display()
        ));

        if !config.warnings.is_empty() {
            log.warn(&format!(
                "found {} manifest warning(s):",
                config.warnings.len()
            ));
            for warning in &config.warnings {
                log.warn(&format!(
                    "  {} [{}]: {}",
                    warning.source, warning.item, warning.message
                ));
            }
        }

        log.stage("Opening management surface");
        let surface = open_surface(global, log)?;
        Ok(Self { config, surface })
    }
}

/// Build the surface selected on the command line.
///
/// # Errors
///
/// Returns an error if no PowerShell is available, `--state` is missing for
/// the state-file surface, or the state file cannot be read.
pub fn open_surface(global: &GlobalOpts, log: &Logger) -> Result<Box<dyn ManagementSurface>> {
    match global.surface {
        SurfaceKind::Powershell => {
            let surface = PowerShellSurface::detect(&SYSTEM_EXECUTOR, global.server.clone())?;
            log.info(&format!(
                "{} on {}",
                surface.shell(),
                global.server.as_deref().unwrap_or("localhost")
            ));
            Ok(Box::new(surface))
        }
        SurfaceKind::StateFile => {
            let path = global
                .state
                .as_deref()
                .context("--surface state-file requires --state FILE")?;
            let surface = StateFileSurface::open(path)
                .with_context(|| format!("opening state file {}", path.display()))?;
            log.info(&format!("state file {}", path.display()));
            Ok(Box::new(surface))
        }
    }
}
