//! Installed winget packages.
use serde::Deserialize;

use super::{DesiredBuilder, KindSchema, Migration, ObjectConfig, OptionSpec, ValueKind};
use crate::error::ValidationError;
use crate::model::{DesiredState, Identity, ObjectKind, Presence};

/// Recognized options for `[[package]]` entries.
pub static SCHEMA: KindSchema = KindSchema {
    kind: ObjectKind::Package,
    version: 2,
    summary: "Package installed with winget",
    identity: "id (winget package identifier, case-insensitive)",
    types: &[],
    default_type: None,
    options: &[
        OptionSpec {
            name: "version",
            value: ValueKind::Text,
            effect: "pinned version; a change reinstalls it, a reset upgrades to the latest",
            default: None,
        },
        OptionSpec {
            name: "source",
            value: ValueKind::Name,
            effect: "winget source to install from",
            default: Some("winget"),
        },
    ],
    dynamic_prefix: None,
    required_on_create: &[],
    recreate_on_change: &[],
    migrations: &[Migration {
        version: 2,
        note: "one entry per package; name accepted as an alias of id",
    }],
};

/// One `[[package]]` manifest entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// winget package identifier (e.g. `Git.Git`).
    #[serde(alias = "name")]
    pub id: String,
    /// Whether the package should be installed.
    #[serde(default)]
    pub state: Presence,
    /// Pinned version.
    pub version: Option<String>,
    /// winget source.
    pub source: Option<String>,
    /// Attributes to reset to platform defaults.
    #[serde(default)]
    pub reset: Vec<String>,
}

impl ObjectConfig for PackageConfig {
    fn identity(&self) -> Result<Identity, ValidationError> {
        super::require_non_blank(ObjectKind::Package, "id", &self.id)?;
        if self.id.trim().contains(char::is_whitespace) {
            return Err(ValidationError::attribute(
                ObjectKind::Package,
                &self.id,
                "id",
                "winget ids cannot contain whitespace",
            ));
        }
        Ok(Identity::Package {
            id: self.id.trim().to_string(),
        })
    }

    fn to_desired(&self) -> Result<DesiredState, ValidationError> {
        let mut b = DesiredBuilder::new(self.identity()?, self.state);
        b.set("version", self.version.as_deref().map(str::trim))
            .set("source", self.source.as_deref().map(str::trim));
        b.finish(&self.reset)
    }
}
