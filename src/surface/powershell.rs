//! Management surface backed by the Windows Server PowerShell modules.
//!
//! Scripts come from [`scripts::Renderer`] and run through
//! `-EncodedCommand`, so quoting never crosses a command line.  Packages are
//! delegated to [`WingetSurface`].
use std::collections::BTreeSet;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use super::scripts::{self, MISSING, Renderer};
use super::winget::WingetSurface;
use super::{ManagementSurface, SurfaceError};
use crate::engine::Operation;
use crate::exec::Executor;
use crate::model::{AttrMap, CurrentState, Identity};

/// Shells tried in order.
const SHELLS: [&str; 2] = ["pwsh", "powershell"];

/// What a fetch script prints for an existing object.
#[derive(Debug, Deserialize)]
struct FetchedState {
    #[serde(default)]
    attrs: AttrMap,
    #[serde(default)]
    unknown: BTreeSet<String>,
}

/// Surface that runs cmdlets on the local machine or on `server`.
#[derive(Debug)]
pub struct PowerShellSurface<'a> {
    executor: &'a dyn Executor,
    shell: &'static str,
    server: Option<String>,
    winget: WingetSurface<'a>,
}

impl<'a> PowerShellSurface<'a> {
    /// Pick the first available shell (`pwsh`, then Windows PowerShell).
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Spawn`] if neither shell is on `PATH`.
    pub fn detect(executor: &'a dyn Executor, server: Option<String>) -> Result<Self, SurfaceError> {
        let shell = SHELLS
            .into_iter()
            .find(|s| executor.which(s))
            .ok_or_else(|| SurfaceError::Spawn {
                program: SHELLS.join(" or "),
                message: "no PowerShell found on PATH".to_string(),
            })?;
        Ok(Self::with_shell(executor, shell, server))
    }

    /// Use `shell` without probing.
    #[must_use]
    pub const fn with_shell(
        executor: &'a dyn Executor,
        shell: &'static str,
        server: Option<String>,
    ) -> Self {
        Self {
            executor,
            shell,
            server,
            winget: WingetSurface::new(executor),
        }
    }

    /// Shell the scripts run in.
    #[must_use]
    pub const fn shell(&self) -> &'static str {
        self.shell
    }

    fn renderer(&self) -> Renderer<'_> {
        Renderer::new(self.server.as_deref())
    }

    /// Run `script` and return its standard output.
    fn run(&self, identity: &Identity, script: &str) -> Result<String, SurfaceError> {
        let encoded = encode(script);
        let result = self
            .executor
            .run_unchecked(
                self.shell,
                &["-NoProfile", "-NonInteractive", "-EncodedCommand", &encoded],
            )
            .map_err(|e| SurfaceError::Spawn {
                program: self.shell.to_string(),
                message: format!("{e:#}"),
            })?;
        if result.success {
            return Ok(result.stdout);
        }
        let stderr = result.stderr.trim();
        let resource = identity.to_string();
        Err(if stderr.contains("ObjectNotFound") || stderr.contains("Cannot find an object") {
            SurfaceError::NotFound { resource }
        } else if stderr.contains("already exists") || stderr.contains("ResourceExists") {
            SurfaceError::Rejected {
                resource,
                reason: first_line(stderr).to_string(),
            }
        } else {
            SurfaceError::ExecutionFailed {
                program: self.shell.to_string(),
                exit_code: result.code.unwrap_or(-1),
                stderr: stderr.to_string(),
            }
        })
    }
}

/// `-EncodedCommand` takes base64 of the UTF-16LE script.
fn encode(script: &str) -> String {
    let bytes: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    STANDARD.encode(bytes)
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}

/// Interpret the output of a fetch script.
fn parse_fetch(identity: &Identity, stdout: &str) -> Result<Option<CurrentState>, SurfaceError> {
    let invalid = |reason: String| SurfaceError::InvalidResponse {
        resource: identity.to_string(),
        reason,
    };
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| invalid("fetch script printed nothing".to_string()))?;
    if line == MISSING {
        return Ok(None);
    }
    let fetched: FetchedState = serde_json::from_str(line).map_err(|e| invalid(e.to_string()))?;
    Ok(Some(CurrentState {
        identity: identity.clone(),
        attrs: fetched.attrs,
        unknown: fetched.unknown,
        at_default: BTreeSet::new(),
    }))
}

impl ManagementSurface for PowerShellSurface<'_> {
    fn fetch(&self, identity: &Identity) -> Result<Option<CurrentState>, SurfaceError> {
        if !scripts::renders(identity.kind()) {
            return self.winget.fetch(identity);
        }
        let script = self.renderer().fetch(identity)?;
        let stdout = self.run(identity, &script)?;
        parse_fetch(identity, &stdout)
    }

    fn execute(&self, operation: &Operation) -> Result<(), SurfaceError> {
        if !scripts::renders(operation.identity.kind()) {
            return self.winget.execute(operation);
        }
        let script = self.renderer().execute(operation)?;
        self.run(&operation.identity, &script).map(drop)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::engine::{OperationKind, SideEffect};
    use crate::exec::test_helpers::MockExecutor;
    use crate::model::AttrValue;

    fn zone() -> Identity {
        Identity::DnsZone {
            name: "corp.example.com".to_string(),
        }
    }

    fn decode(encoded: &str) -> String {
        let bytes = STANDARD.decode(encoded).unwrap();
        let units: Vec<u16> = bytes
            .chunks(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).unwrap()
    }

    fn delete_zone() -> Operation {
        Operation {
            kind: OperationKind::Delete,
            identity: zone(),
            target_attrs: AttrMap::new(),
            reset_attrs: BTreeSet::new(),
            ordering_rank: 0,
            side_effect: SideEffect::None,
        }
    }

    // ------------------------------------------------------------------
    // Shell selection and encoding
    // ------------------------------------------------------------------

    #[test]
    fn detect_prefers_pwsh() {
        let executor = MockExecutor::ok("").with_program("powershell").with_program("pwsh");
        let surface = PowerShellSurface::detect(&executor, None).unwrap();
        assert_eq!(surface.shell(), "pwsh");
    }

    #[test]
    fn detect_falls_back_to_windows_powershell() {
        let executor = MockExecutor::ok("").with_program("powershell");
        let surface = PowerShellSurface::detect(&executor, None).unwrap();
        assert_eq!(surface.shell(), "powershell");
    }

    #[test]
    fn detect_without_shell_fails() {
        let executor = MockExecutor::ok("");
        assert!(matches!(
            PowerShellSurface::detect(&executor, None),
            Err(SurfaceError::Spawn { .. })
        ));
    }

    #[test]
    fn encoding_survives_quotes_and_unicode() {
        let script = "Write-Output 'Zürich''s zone'";
        assert_eq!(decode(&encode(script)), script);
    }

    #[test]
    fn script_is_passed_encoded() {
        let executor = MockExecutor::ok("null");
        let surface = PowerShellSurface::with_shell(&executor, "pwsh", Some("dc01".to_string()));
        surface.fetch(&zone()).unwrap();
        let call = &executor.calls()[0];
        assert_eq!(call[0], "pwsh");
        assert_eq!(call[3], "-EncodedCommand");
        let script = decode(&call[4]);
        assert!(script.contains("Get-DnsServerZone -Name 'corp.example.com'"));
        assert!(script.contains("-ComputerName 'dc01'"));
    }

    // ------------------------------------------------------------------
    // fetch
    // ------------------------------------------------------------------

    #[test]
    fn null_is_absent() {
        let executor = MockExecutor::ok("WARNING: module loaded\nnull\n");
        let surface = PowerShellSurface::with_shell(&executor, "pwsh", None);
        assert!(surface.fetch(&zone()).unwrap().is_none());
    }

    #[test]
    fn json_becomes_current_state() {
        let executor = MockExecutor::ok(
            r#"{"attrs":{"type":"secondary","replication":"none","dns_servers":["10.0.0.1"]},"unknown":[]}"#,
        );
        let surface = PowerShellSurface::with_shell(&executor, "pwsh", None);
        let state = surface.fetch(&zone()).unwrap().unwrap();
        assert_eq!(state.object_type(), Some("secondary"));
        assert_eq!(state.attrs["dns_servers"], AttrValue::list(["10.0.0.1"]));
        assert!(state.unknown.is_empty());
    }

    #[test]
    fn garbage_is_invalid_response() {
        let executor = MockExecutor::ok("<Objs Version=\"1.1.0.1\">");
        let surface = PowerShellSurface::with_shell(&executor, "pwsh", None);
        assert!(matches!(
            surface.fetch(&zone()),
            Err(SurfaceError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn empty_output_is_invalid_response() {
        let executor = MockExecutor::ok("\n\n");
        let surface = PowerShellSurface::with_shell(&executor, "pwsh", None);
        let err = surface.fetch(&zone()).unwrap_err();
        assert!(err.to_string().contains("printed nothing"));
    }

    #[test]
    fn packages_go_to_winget() {
        let executor = MockExecutor::ok("Git Git.Git 2.44.0 winget\n");
        let surface = PowerShellSurface::with_shell(&executor, "pwsh", None);
        let id = Identity::Package {
            id: "Git.Git".to_string(),
        };
        let state = surface.fetch(&id).unwrap().unwrap();
        assert_eq!(state.attrs["version"], AttrValue::from("2.44.0"));
        assert_eq!(executor.calls()[0][0], "winget");
    }

    // ------------------------------------------------------------------
    // execute
    // ------------------------------------------------------------------

    #[test]
    fn execute_success_ignores_output() {
        let executor = MockExecutor::ok("anything");
        let surface = PowerShellSurface::with_shell(&executor, "pwsh", None);
        surface.execute(&delete_zone()).unwrap();
        assert!(decode(&executor.calls()[0][4]).contains("Remove-DnsServerZone"));
    }

    #[test]
    fn object_not_found_maps_to_not_found() {
        let executor = MockExecutor::fail(
            "Remove-DnsServerZone : The zone corp.example.com was not found.\n+ CategoryInfo : ObjectNotFound",
        );
        let surface = PowerShellSurface::with_shell(&executor, "pwsh", None);
        assert!(matches!(
            surface.execute(&delete_zone()),
            Err(SurfaceError::NotFound { .. })
        ));
    }

    #[test]
    fn already_exists_maps_to_rejected() {
        let executor = MockExecutor::fail("Add-DnsServerPrimaryZone : The zone already exists.\nmore");
        let surface = PowerShellSurface::with_shell(&executor, "pwsh", None);
        let err = surface.execute(&delete_zone()).unwrap_err();
        assert!(matches!(err, SurfaceError::Rejected { .. }));
        assert!(!err.to_string().contains("more"));
    }

    #[test]
    fn other_failures_keep_exit_code_and_stderr() {
        let executor = MockExecutor::fail("Access is denied");
        let surface = PowerShellSurface::with_shell(&executor, "powershell", None);
        let err = surface.execute(&delete_zone()).unwrap_err();
        assert!(matches!(
            err,
            SurfaceError::ExecutionFailed { ref program, exit_code: 1, .. } if program == "powershell"
        ));
    }
}
