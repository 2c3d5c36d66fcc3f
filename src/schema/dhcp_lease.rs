//! DHCP leases and reservations.
use serde::{Deserialize, Serialize};

use super::{DesiredBuilder, KindSchema, ObjectConfig, OptionSpec, ValueKind};
use crate::error::ValidationError;
use crate::model::{DesiredState, Identity, ObjectKind, Presence};

/// Lease type values.
pub const TYPES: &[&str] = &["lease", "reservation"];

/// Recognized options for `[[dhcp_lease]]` entries.
pub static SCHEMA: KindSchema = KindSchema {
    kind: ObjectKind::DhcpLease,
    version: 1,
    summary: "DHCP lease or reservation inside a scope",
    identity: "(scope_id, ip)",
    types: TYPES,
    default_type: Some("lease"),
    options: &[
        OptionSpec {
            name: "type",
            value: ValueKind::Choice(TYPES),
            effect: "lease or reservation; converted in place",
            default: Some("lease"),
        },
        OptionSpec {
            name: "client_id",
            value: ValueKind::Name,
            effect: "client MAC address (aa-bb-cc-dd-ee-ff)",
            default: None,
        },
        OptionSpec {
            name: "hostname",
            value: ValueKind::Name,
            effect: "client host name",
            default: None,
        },
        OptionSpec {
            name: "description",
            value: ValueKind::Text,
            effect: "free-form description",
            default: Some("\"\""),
        },
    ],
    dynamic_prefix: None,
    required_on_create: &["client_id"],
    recreate_on_change: &[],
    migrations: &[],
};

/// Lease type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseType {
    /// Dynamic lease.
    Lease,
    /// Permanent reservation.
    Reservation,
}

impl LeaseType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Lease => "lease",
            Self::Reservation => "reservation",
        }
    }
}

/// One `[[dhcp_lease]]` manifest entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeaseConfig {
    /// Scope the address belongs to.
    pub scope_id: String,
    /// Leased or reserved address.
    pub ip: String,
    /// Whether the lease should exist.
    #[serde(default)]
    pub state: Presence,
    /// Lease or reservation.
    #[serde(rename = "type")]
    pub lease_type: Option<LeaseType>,
    /// Client MAC address.
    #[serde(alias = "mac")]
    pub client_id: Option<String>,
    /// Client host name.
    pub hostname: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Attributes to reset to platform defaults.
    #[serde(default)]
    pub reset: Vec<String>,
}

impl ObjectConfig for LeaseConfig {
    fn identity(&self) -> Result<Identity, ValidationError> {
        let kind = ObjectKind::DhcpLease;
        let scope_id = super::parse_ipv4(kind, &self.ip, "scope_id", &self.scope_id)?;
        let ip = super::parse_ipv4(kind, &self.ip, "ip", &self.ip)?;
        Ok(Identity::DhcpLease { scope_id, ip })
    }

    fn to_desired(&self) -> Result<DesiredState, ValidationError> {
        let mut b = DesiredBuilder::new(self.identity()?, self.state);
        let client_id = self
            .client_id
            .as_deref()
            .map(|raw| {
                normalize_mac(raw).ok_or_else(|| {
                    ValidationError::attribute(
                        ObjectKind::DhcpLease,
                        b.ident(),
                        "client_id",
                        format!("'{raw}' is not a MAC address"),
                    )
                })
            })
            .transpose()?;
        b.set("type", self.lease_type.map(LeaseType::as_str))
            .set("client_id", client_id)
            .set("hostname", self.hostname.clone())
            .set("description", self.description.clone());
        b.finish(&self.reset)
    }
}

/// Normalize a MAC address to lowercase, dash-separated octets.
///
/// Accepts `:`/`-` separators or none at all.
#[must_use]
pub fn normalize_mac(raw: &str) -> Option<String> {
    let hex: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let lower = hex.to_ascii_lowercase();
    let octets: Vec<&str> = (0..6).filter_map(|i| lower.get(i * 2..i * 2 + 2)).collect();
    Some(octets.join("-"))
}
