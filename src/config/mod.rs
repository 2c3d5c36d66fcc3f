//! Manifest loading: TOML parsing, conversion to desired states, and
//! non-fatal validation.
pub mod manifest;
pub mod toml_loader;
pub mod validation;

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::model::DesiredState;

pub use manifest::Manifest;
pub use validation::ValidationWarning;

/// A loaded manifest, ready to reconcile.
#[derive(Debug)]
pub struct Config {
    /// File the manifest was read from.
    pub path: PathBuf,
    /// Desired states in reconciliation order.
    pub desired: Vec<DesiredState>,
    /// Non-fatal findings to show before reconciling.
    pub warnings: Vec<ValidationWarning>,
}

impl Config {
    /// Load and convert the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, an
    /// entry fails validation, or two entries address the same object.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let manifest: Manifest = toml_loader::load_config(path)?;
        let desired = manifest.desired_states()?;
        let warnings = validation::validate_all(&manifest, &desired);
        Ok(Self {
            path: path.to_path_buf(),
            desired,
            warnings,
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn load_collects_desired_and_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");
        std::fs::write(
            &path,
            r#"
[[ou]]
name = "Servers"
path = "DC=corp,DC=example,DC=com"
state = "absent"
description = "old"
"#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.desired.len(), 1);
        assert_eq!(config.warnings.len(), 1);
        assert_eq!(config.path, path);
    }

    #[test]
    fn load_missing_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
