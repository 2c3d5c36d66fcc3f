//! Command: print version information.
use std::io::Write;

/// Version embedded by `build.rs`, or the crate version for local builds.
#[must_use]
pub fn version() -> &'static str {
    option_env!("WINSTATE_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the winstate version.
///
/// # Errors
///
/// Returns an error if `out` cannot be written.
pub fn run(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "winstate {}", version())
}
