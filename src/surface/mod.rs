//! The management-surface collaborator: queries and mutations on the managed host.
//!
//! The engine never talks to Windows directly.  It sees a [`ManagementSurface`]
//! that can fetch the current state of one object and execute one
//! [`Operation`].  Each implementation decides how that happens:
//!
//! - [`memory::InMemorySurface`]: objects in a map, with failure injection.
//! - [`state_file::StateFileSurface`]: the same, persisted to a JSON file.
//! - [`powershell::PowerShellSurface`]: DnsServer, DhcpServer, ActiveDirectory
//!   and GroupPolicy cmdlets plus `winget`, run through an [`Executor`](crate::exec::Executor).
pub mod memory;
pub mod powershell;
pub mod scripts;
pub mod state_file;
pub mod winget;

use thiserror::Error;

use crate::engine::Operation;
use crate::model::{CurrentState, Identity};

/// Errors reported by a management surface.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// A command invoked by the surface failed with a non-zero exit code.
    #[error("command '{program}' failed (exit {exit_code}): {stderr}")]
    ExecutionFailed {
        /// Name of the program that was invoked.
        program: String,
        /// Exit code returned by the process.
        exit_code: i32,
        /// Captured standard error output.
        stderr: String,
    },

    /// The program could not be started at all.
    #[error("could not run '{program}': {message}")]
    Spawn {
        /// Name of the program.
        program: String,
        /// Reason reported by the executor.
        message: String,
    },

    /// The addressed object does not exist.
    #[error("object not found: {resource}")]
    NotFound {
        /// Display form of the identity.
        resource: String,
    },

    /// The surface refused the operation (e.g. creating an object that already exists).
    #[error("rejected operation on '{resource}': {reason}")]
    Rejected {
        /// Display form of the identity.
        resource: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// The host answered with output that could not be interpreted.
    #[error("invalid response for '{resource}': {reason}")]
    InvalidResponse {
        /// Display form of the identity.
        resource: String,
        /// What was wrong with the response.
        reason: String,
    },

    /// The requested operation is not supported for this kind of object.
    #[error("operation '{operation}' is not supported for '{resource}'")]
    UnsupportedOperation {
        /// Name of the unsupported operation (e.g. `"recreate"`).
        operation: String,
        /// Display form of the identity.
        resource: String,
    },

    /// Reading or writing the state file failed.
    #[error("state file {path}: {source}")]
    Io {
        /// State file path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Query and command interface to the managed host.
///
/// Implementations must be usable from several rayon workers at once; the
/// engine reconciles independent objects concurrently.
#[cfg_attr(test, mockall::automock)]
pub trait ManagementSurface: Send + Sync {
    /// Fetch the live configuration of one object.
    ///
    /// Returns `Ok(None)` when the object does not exist.  Attributes the
    /// surface cannot read are listed in [`CurrentState::unknown`].
    ///
    /// # Errors
    ///
    /// Returns a [`SurfaceError`] if the query itself fails.
    fn fetch(&self, identity: &Identity) -> Result<Option<CurrentState>, SurfaceError>;

    /// Execute one operation.  Each call is atomic from the engine's point of view.
    ///
    /// # Errors
    ///
    /// Returns a [`SurfaceError`] describing why the operation failed.
    fn execute(&self, operation: &Operation) -> Result<(), SurfaceError>;
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn execution_failed_display() {
        let e = SurfaceError::ExecutionFailed {
            program: "pwsh".to_string(),
            exit_code: 1,
            stderr: "Access is denied".to_string(),
        };
        assert!(e.to_string().contains("pwsh"));
        assert!(e.to_string().contains("exit 1"));
        assert!(e.to_string().contains("Access is denied"));
    }

    #[test]
    fn not_found_display() {
        let e = SurfaceError::NotFound {
            resource: "dns_zone corp.example.com".to_string(),
        };
        assert_eq!(e.to_string(), "object not found: dns_zone corp.example.com");
    }

    #[test]
    fn unsupported_operation_display() {
        let e = SurfaceError::UnsupportedOperation {
            operation: "recreate".to_string(),
            resource: "package Git.Git".to_string(),
        };
        assert!(e.to_string().contains("recreate"));
        assert!(e.to_string().contains("Git.Git"));
    }

    #[test]
    fn surface_error_converts_to_anyhow() {
        let e = SurfaceError::Rejected {
            resource: "ou OU=X".to_string(),
            reason: "already exists".to_string(),
        };
        let _anyhow_err: anyhow::Error = e.into();
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn surface_error_is_send_sync() {
        assert_send_sync::<SurfaceError>();
    }
}
