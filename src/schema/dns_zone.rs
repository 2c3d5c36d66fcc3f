//! DNS server zones.
use serde::{Deserialize, Serialize};

use super::{DesiredBuilder, KindSchema, Migration, ObjectConfig, OptionSpec, ValueKind};
use crate::error::ValidationError;
use crate::model::{DesiredState, Identity, ObjectKind, Presence};

/// Zone type values.
pub const TYPES: &[&str] = &["primary", "secondary", "stub", "forwarder"];

const DYNAMIC_UPDATE: &[&str] = &["secure", "none", "nonsecureandsecure"];
const REPLICATION: &[&str] = &["forest", "domain", "legacy", "none"];

/// Recognized options for `[[dns_zone]]` entries.
pub static SCHEMA: KindSchema = KindSchema {
    kind: ObjectKind::DnsZone,
    version: 2,
    summary: "Windows DNS server zone",
    identity: "name (case-insensitive, trailing dot ignored)",
    types: TYPES,
    default_type: Some("primary"),
    options: &[
        OptionSpec {
            name: "type",
            value: ValueKind::Choice(TYPES),
            effect: "zone type; conversions follow the transition table",
            default: Some("primary"),
        },
        OptionSpec {
            name: "dynamic_update",
            value: ValueKind::Choice(DYNAMIC_UPDATE),
            effect: "how dynamic DNS updates are accepted",
            default: Some("secure"),
        },
        OptionSpec {
            name: "replication",
            value: ValueKind::Choice(REPLICATION),
            effect: "Active Directory replication scope; none stores the zone in a file",
            default: Some("forest"),
        },
        OptionSpec {
            name: "dns_servers",
            value: ValueKind::List,
            effect: "master servers (secondary, stub) or forwarders (forwarder)",
            default: None,
        },
    ],
    dynamic_prefix: None,
    required_on_create: &[],
    recreate_on_change: &[],
    migrations: &[Migration {
        version: 2,
        note: "zone type moved from a free-form string to the primary|secondary|stub|forwarder choice",
    }],
};

/// Zone type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneType {
    /// Authoritative writable copy.
    Primary,
    /// Read-only copy transferred from masters.
    Secondary,
    /// NS/SOA/glue only, refreshed from masters.
    Stub,
    /// Conditional forwarder.
    Forwarder,
}

impl ZoneType {
    /// Value used in deltas and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Stub => "stub",
            Self::Forwarder => "forwarder",
        }
    }
}

/// Accepted dynamic update modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DynamicUpdate {
    /// Only authenticated updates.
    Secure,
    /// No dynamic updates.
    None,
    /// Both authenticated and anonymous updates.
    NonsecureAndSecure,
}

impl DynamicUpdate {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Secure => "secure",
            Self::None => "none",
            Self::NonsecureAndSecure => "nonsecureandsecure",
        }
    }
}

/// Active Directory replication scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Replication {
    /// All DNS servers in the forest.
    Forest,
    /// All DNS servers in the domain.
    Domain,
    /// All domain controllers in the domain.
    Legacy,
    /// Not AD-integrated; stored in a zone file.
    None,
}

impl Replication {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Forest => "forest",
            Self::Domain => "domain",
            Self::Legacy => "legacy",
            Self::None => "none",
        }
    }
}

/// One `[[dns_zone]]` manifest entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneConfig {
    /// Zone name.
    pub name: String,
    /// Whether the zone should exist.
    #[serde(default)]
    pub state: Presence,
    /// Zone type.
    #[serde(rename = "type")]
    pub zone_type: Option<ZoneType>,
    /// Dynamic update mode.
    pub dynamic_update: Option<DynamicUpdate>,
    /// Replication scope.
    pub replication: Option<Replication>,
    /// Master or forwarder servers.
    pub dns_servers: Option<Vec<String>>,
    /// Attributes to reset to platform defaults.
    #[serde(default)]
    pub reset: Vec<String>,
}

impl ObjectConfig for ZoneConfig {
    fn identity(&self) -> Result<Identity, ValidationError> {
        super::require_non_blank(ObjectKind::DnsZone, "name", &self.name)?;
        if self.name.trim().contains(char::is_whitespace) {
            return Err(ValidationError::attribute(
                ObjectKind::DnsZone,
                &self.name,
                "name",
                "zone names cannot contain whitespace",
            ));
        }
        Ok(Identity::DnsZone {
            name: self.name.trim().to_string(),
        })
    }

    fn to_desired(&self) -> Result<DesiredState, ValidationError> {
        let mut b = DesiredBuilder::new(self.identity()?, self.state);
        let servers = self
            .dns_servers
            .as_deref()
            .map(|s| super::parse_servers(ObjectKind::DnsZone, &b.ident(), "dns_servers", s))
            .transpose()?;
        b.set("type", self.zone_type.map(ZoneType::as_str))
            .set("dynamic_update", self.dynamic_update.map(DynamicUpdate::as_str))
            .set("replication", self.replication.map(Replication::as_str))
            .set("dns_servers", servers);
        b.finish(&self.reset)
    }
}
