//! Command: `info`, read-only view of the live objects a manifest names.
use std::collections::BTreeSet;
use std::io::Write;

use anyhow::{Context as _, Result};
use rayon::prelude::*;
use serde::Serialize;

use super::CommandSetup;
use crate::cli::{GlobalOpts, InfoOpts};
use crate::error::ConfigError;
use crate::logging::{Logger, ObjectStatus};
use crate::model::{AttrMap, CurrentState, Identity, ObjectKind};
use crate::surface::{ManagementSurface, SurfaceError};

type Fetched = Result<Option<CurrentState>, SurfaceError>;

/// One object as printed by `info --json`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum InfoEntry<'a> {
    Present {
        identity: &'a Identity,
        #[serde(flatten)]
        state: InfoState<'a>,
    },
    Absent {
        identity: &'a Identity,
    },
    Failed {
        identity: &'a Identity,
        error: String,
    },
}

#[derive(Debug, Serialize)]
struct InfoState<'a> {
    attrs: &'a AttrMap,
    #[serde(skip_serializing_if = "is_empty")]
    unknown: &'a BTreeSet<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_empty(set: &&BTreeSet<String>) -> bool {
    set.is_empty()
}

/// Fetch and print the current state of every manifest object.
///
/// Nothing is ever executed against the surface.
///
/// # Errors
///
/// Returns an error if the manifest or surface cannot be loaded, `--kind`
/// names no object kind, or any fetch failed.
pub fn run(global: &GlobalOpts, opts: &InfoOpts, log: &Logger, out: &mut impl Write) -> Result<()> {
    let kind = opts
        .kind
        .as_deref()
        .map(|name| ObjectKind::parse(name).ok_or_else(|| ConfigError::UnknownKind(name.to_string())))
        .transpose()?;

    let setup = CommandSetup::init(global, &opts.manifest, log)?;
    let identities: Vec<&Identity> = setup
        .config
        .desired
        .iter()
        .map(|d| &d.identity)
        .filter(|id| kind.is_none_or(|k| id.kind() == k))
        .collect();

    log.stage("Fetching current state");
    let fetched = fetch_all(setup.surface.as_ref(), &identities, global.parallel);

    let mut failures = 0usize;
    for (identity, result) in identities.iter().zip(&fetched) {
        let name = identity.to_string();
        match result {
            Ok(_) => log.record_object(&name, ObjectStatus::Unchanged, None),
            Err(e) => {
                failures += 1;
                log.error(&format!("{name}: {e}"));
                log.record_object(&name, ObjectStatus::Failed, Some(&e.to_string()));
            }
        }
    }

    if global.json {
        write_json(out, &identities, &fetched).context("writing JSON results")?;
    } else {
        write_text(out, &identities, &fetched).context("writing results")?;
    }

    if failures > 0 {
        anyhow::bail!("{failures} object(s) could not be fetched");
    }
    Ok(())
}

fn fetch_all(surface: &dyn ManagementSurface, identities: &[&Identity], parallel: bool) -> Vec<Fetched> {
    if parallel {
        identities.par_iter().map(|id| surface.fetch(id)).collect()
    } else {
        identities.iter().map(|id| surface.fetch(id)).collect()
    }
}

/// One block per object: a header line, then one indented line per attribute.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn write_text(out: &mut impl Write, identities: &[&Identity], fetched: &[Fetched]) -> std::io::Result<()> {
    for (identity, result) in identities.iter().zip(fetched) {
        match result {
            Ok(Some(state)) => {
                writeln!(out, "{identity}: present")?;
                let width = state.attrs.keys().map(String::len).max().unwrap_or(0);
                for (name, value) in &state.attrs {
                    writeln!(out, "  {name:<width$}  {value}")?;
                }
                if !state.unknown.is_empty() {
                    let names: Vec<&str> = state.unknown.iter().map(String::as_str).collect();
                    writeln!(out, "  not reported: {}", names.join(", "))?;
                }
            }
            Ok(None) => writeln!(out, "{identity}: absent")?,
            Err(e) => writeln!(out, "{identity}: error: {e}")?,
        }
    }
    Ok(())
}

/// JSON array with one entry per object, in manifest order.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_json(out: &mut impl Write, identities: &[&Identity], fetched: &[Fetched]) -> Result<()> {
    let entries: Vec<InfoEntry<'_>> = identities
        .iter()
        .zip(fetched)
        .map(|(&identity, result)| match result {
            Ok(Some(state)) => InfoEntry::Present {
                identity,
                state: InfoState {
                    attrs: &state.attrs,
                    unknown: &state.unknown,
                },
            },
            Ok(None) => InfoEntry::Absent { identity },
            Err(e) => InfoEntry::Failed {
                identity,
                error: e.to_string(),
            },
        })
        .collect();
    serde_json::to_writer_pretty(&mut *out, &entries)?;
    writeln!(out)?;
    Ok(())
}
