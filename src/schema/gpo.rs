//! Group Policy objects.
use serde::{Deserialize, Serialize};

use super::{DesiredBuilder, KindSchema, ObjectConfig, OptionSpec, ValueKind};
use crate::error::ValidationError;
use crate::model::{DesiredState, GpoKey, Identity, ObjectKind, Presence};

const STATUS: &[&str] = &[
    "all_settings_enabled",
    "user_settings_disabled",
    "computer_settings_disabled",
    "all_settings_disabled",
];

/// Recognized options for `[[gpo]]` entries.
pub static SCHEMA: KindSchema = KindSchema {
    kind: ObjectKind::Gpo,
    version: 1,
    summary: "Group Policy object",
    identity: "guid, or (name, domain); objects addressed by guid cannot be created",
    types: &[],
    default_type: None,
    options: &[
        OptionSpec {
            name: "display_name",
            value: ValueKind::Text,
            effect: "display name (only when addressed by guid)",
            default: None,
        },
        OptionSpec {
            name: "comment",
            value: ValueKind::Text,
            effect: "description shown in the management console",
            default: Some("\"\""),
        },
        OptionSpec {
            name: "status",
            value: ValueKind::Choice(STATUS),
            effect: "which halves of the policy are enabled",
            default: Some("all_settings_enabled"),
        },
    ],
    dynamic_prefix: None,
    required_on_create: &[],
    recreate_on_change: &[],
    migrations: &[],
};

/// GPO status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpoStatus {
    /// Both user and computer settings apply.
    AllSettingsEnabled,
    /// Only computer settings apply.
    UserSettingsDisabled,
    /// Only user settings apply.
    ComputerSettingsDisabled,
    /// Nothing applies.
    AllSettingsDisabled,
}

impl GpoStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::AllSettingsEnabled => "all_settings_enabled",
            Self::UserSettingsDisabled => "user_settings_disabled",
            Self::ComputerSettingsDisabled => "computer_settings_disabled",
            Self::AllSettingsDisabled => "all_settings_disabled",
        }
    }
}

/// One `[[gpo]]` manifest entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpoConfig {
    /// GUID, when addressing an existing GPO directly.
    pub guid: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Owning domain (required with `name` when no `guid` is given).
    pub domain: Option<String>,
    /// Whether the GPO should exist.
    #[serde(default)]
    pub state: Presence,
    /// Comment.
    pub comment: Option<String>,
    /// Status.
    pub status: Option<GpoStatus>,
    /// Attributes to reset to platform defaults.
    #[serde(default)]
    pub reset: Vec<String>,
}

impl ObjectConfig for GpoConfig {
    fn identity(&self) -> Result<Identity, ValidationError> {
        let kind = ObjectKind::Gpo;
        if let Some(guid) = &self.guid {
            if !is_guid(guid) {
                return Err(ValidationError::attribute(
                    kind,
                    guid,
                    "guid",
                    "expected xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx",
                ));
            }
            return Ok(Identity::Gpo {
                key: GpoKey::Guid(guid.trim().trim_matches(['{', '}']).to_ascii_lowercase()),
            });
        }
        match (&self.name, &self.domain) {
            (Some(name), Some(domain)) => {
                super::require_non_blank(kind, "name", name)?;
                super::require_non_blank(kind, "domain", domain)?;
                Ok(Identity::Gpo {
                    key: GpoKey::Name {
                        name: name.trim().to_string(),
                        domain: domain.trim().to_string(),
                    },
                })
            }
            (name, _) => Err(ValidationError::attribute(
                kind,
                name.clone().unwrap_or_default(),
                "domain",
                "a GPO needs either guid or both name and domain",
            )),
        }
    }

    fn to_desired(&self) -> Result<DesiredState, ValidationError> {
        let identity = self.identity()?;
        // With a name key the name is the identity; with a guid key it is mutable.
        let display_name = match identity {
            Identity::Gpo {
                key: GpoKey::Guid(_),
            } => self.name.clone(),
            _ => None,
        };
        let mut b = DesiredBuilder::new(identity, self.state);
        b.set("display_name", display_name)
            .set("comment", self.comment.clone())
            .set("status", self.status.map(GpoStatus::as_str));
        b.finish(&self.reset)
    }
}

/// `true` for a GUID in 8-4-4-4-12 hex form, optionally braced.
fn is_guid(raw: &str) -> bool {
    let inner = raw.trim().trim_start_matches('{').trim_end_matches('}');
    let groups: Vec<&str> = inner.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// `true` when objects with this identity cannot be created (GUIDs are assigned by AD).
#[must_use]
pub const fn is_uncreatable(identity: &Identity) -> bool {
    matches!(
        identity,
        Identity::Gpo {
            key: GpoKey::Guid(_)
        }
    )
}
