//! Commands: `plan` and `apply`.
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;

use super::CommandSetup;
use super::version::version;
use crate::cli::{GlobalOpts, ManifestOpts};
use crate::engine::{self, ReconciliationResult, Reconciler};
use crate::error::EngineError;
use crate::logging::Logger;
use crate::model::{DesiredState, Identity};

/// One object's outcome as printed by `--json`.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum JsonOutcome<'a> {
    Reconciled(&'a ReconciliationResult),
    Failed { identity: &'a Identity, error: String },
}

/// Run `plan` (`dry_run` forced) or `apply`.
///
/// # Errors
///
/// Returns an error if the manifest or surface cannot be loaded, or if one
/// or more objects failed to reconcile.
pub fn run(global: &GlobalOpts, opts: &ManifestOpts, dry_run: bool, log: &Arc<Logger>) -> Result<()> {
    let dry_run = dry_run || global.dry_run;
    log.info(&format!("winstate {}", version()));

    let setup = CommandSetup::init(global, &opts.manifest, log)?;
    let reconciler = Reconciler::new(setup.surface.as_ref()).dry_run(dry_run);

    log.stage(if dry_run { "Planning" } else { "Reconciling" });
    let results = engine::reconcile_all(&reconciler, &setup.config.desired, global.parallel, log);

    if global.json {
        let stdout = std::io::stdout();
        write_json(&mut stdout.lock(), &setup.config.desired, &results)
            .context("writing JSON results")?;
    } else {
        log.print_summary();
    }

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} object(s) failed");
    }
    Ok(())
}

/// Write one JSON array entry per desired state, in manifest order.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_json(
    out: &mut impl Write,
    desired: &[DesiredState],
    results: &[Result<ReconciliationResult, EngineError>],
) -> Result<()> {
    let outcomes: Vec<JsonOutcome<'_>> = desired
        .iter()
        .zip(results)
        .map(|(d, r)| match r {
            Ok(result) => JsonOutcome::Reconciled(result),
            Err(e) => JsonOutcome::Failed {
                identity: &d.identity,
                error: e.to_string(),
            },
        })
        .collect();
    serde_json::to_writer_pretty(&mut *out, &outcomes)?;
    writeln!(out)?;
    Ok(())
}
