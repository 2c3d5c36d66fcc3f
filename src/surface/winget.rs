//! winget packages.
use super::{ManagementSurface, SurfaceError};
use crate::engine::{Operation, OperationKind};
use crate::exec::{ExecResult, Executor};
use crate::model::{AttrValue, CurrentState, Identity};

const WINGET: &str = "winget";

/// Flags that keep winget from prompting.
const UNATTENDED: [&str; 2] = ["--accept-source-agreements", "--disable-interactivity"];

/// Printed by `winget list` when nothing matches.
const NO_MATCH: &str = "No installed package found";

/// Surface for [`Identity::Package`] objects, driven by the `winget` CLI.
#[derive(Debug, Clone, Copy)]
pub struct WingetSurface<'a> {
    executor: &'a dyn Executor,
}

impl<'a> WingetSurface<'a> {
    /// Create a surface that runs winget through `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn Executor) -> Self {
        Self { executor }
    }

    fn winget(&self, identity: &Identity, args: &[&str]) -> Result<ExecResult, SurfaceError> {
        let mut all: Vec<&str> = args.to_vec();
        all.extend(UNATTENDED);
        self.executor
            .run_unchecked(WINGET, &all)
            .map_err(|e| SurfaceError::Spawn {
                program: WINGET.to_string(),
                message: format!("{e:#} ({identity})"),
            })
    }
}

fn package_id(identity: &Identity) -> Result<&str, SurfaceError> {
    match identity {
        Identity::Package { id } => Ok(id),
        other => Err(SurfaceError::UnsupportedOperation {
            operation: "winget".to_string(),
            resource: other.to_string(),
        }),
    }
}

fn failed(result: &ExecResult) -> SurfaceError {
    // winget reports most failures on stdout.
    let message = if result.stderr.trim().is_empty() {
        result.stdout.trim()
    } else {
        result.stderr.trim()
    };
    SurfaceError::ExecutionFailed {
        program: WINGET.to_string(),
        exit_code: result.code.unwrap_or(-1),
        stderr: message.to_string(),
    }
}

/// Source names are words; versions start with a digit.
fn is_source_name(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_alphabetic())
        && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Parse the row for `id` out of a `winget list` table.
///
/// Columns are `Name Id Version [Available] [Source]`; the name may contain
/// spaces, so the row is located by the id token and read from there.  An
/// installed version with no `Available` entry is the latest one, which is
/// what resetting `version` asks for.
fn parse_list(identity: &Identity, id: &str, stdout: &str) -> Option<CurrentState> {
    stdout.lines().find_map(|line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let at = tokens.iter().position(|t| t.eq_ignore_ascii_case(id))?;
        let rest = tokens.get(at + 1..).unwrap_or_default();
        let mut state = CurrentState::new(identity.clone());
        let (source, columns) = match rest.split_last() {
            Some((last, columns)) if !columns.is_empty() && is_source_name(last) => {
                (Some(*last), columns)
            }
            _ => (None, rest),
        };
        match columns {
            [version] => {
                state.attrs.insert("version".to_string(), AttrValue::from(*version));
                state.at_default.insert("version".to_string());
            }
            [version, ..] => {
                state.attrs.insert("version".to_string(), AttrValue::from(*version));
            }
            [] => {
                state.unknown.insert("version".to_string());
            }
        }
        match source {
            Some(source) => {
                state.attrs.insert("source".to_string(), AttrValue::from(source));
            }
            None => {
                state.unknown.insert("source".to_string());
            }
        }
        Some(state)
    })
}

/// Arguments of an install that pins the requested version and source.
fn install_args<'o>(id: &'o str, op: &'o Operation) -> Vec<&'o str> {
    let mut args = vec!["install", "--id", id, "--exact", "--silent", "--accept-package-agreements"];
    if let Some(version) = op.target_attrs.get("version").and_then(AttrValue::as_text) {
        args.extend(["--version", version]);
    }
    match op.target_attrs.get("source").and_then(AttrValue::as_text) {
        Some(source) => args.extend(["--source", source]),
        None if op.reset_attrs.contains("source") => args.extend(["--source", "winget"]),
        None => {}
    }
    args
}

impl ManagementSurface for WingetSurface<'_> {
    fn fetch(&self, identity: &Identity) -> Result<Option<CurrentState>, SurfaceError> {
        let id = package_id(identity)?;
        let result = self.winget(identity, &["list", "--id", id, "--exact"])?;
        if !result.success {
            return if result.stdout.contains(NO_MATCH) {
                Ok(None)
            } else {
                Err(failed(&result))
            };
        }
        Ok(parse_list(identity, id, &result.stdout))
    }

    fn execute(&self, op: &Operation) -> Result<(), SurfaceError> {
        let id = package_id(&op.identity)?;
        let args = match op.kind {
            OperationKind::Create => install_args(id, op),
            OperationKind::Modify
                if op.target_attrs.is_empty() && op.reset_attrs.contains("version") =>
            {
                vec!["upgrade", "--id", id, "--exact", "--silent", "--accept-package-agreements"]
            }
            OperationKind::Modify => {
                let mut args = install_args(id, op);
                args.push("--force");
                args
            }
            OperationKind::Delete => vec!["uninstall", "--id", id, "--exact", "--silent"],
            OperationKind::Recreate => {
                return Err(SurfaceError::UnsupportedOperation {
                    operation: op.kind.to_string(),
                    resource: op.identity.to_string(),
                });
            }
        };
        let result = self.winget(&op.identity, &args)?;
        if result.success { Ok(()) } else { Err(failed(&result)) }
    }
}
