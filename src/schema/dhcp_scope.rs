//! DHCP server IPv4 scopes.
use std::net::Ipv4Addr;

use serde::Deserialize;

use super::{DesiredBuilder, KindSchema, Migration, ObjectConfig, OptionSpec, ValueKind};
use crate::error::ValidationError;
use crate::model::{DesiredState, Identity, ObjectKind, Presence};

/// Recognized options for `[[dhcp_scope]]` entries.
pub static SCHEMA: KindSchema = KindSchema {
    kind: ObjectKind::DhcpScope,
    version: 3,
    summary: "DHCP server IPv4 scope",
    identity: "scope_id (IPv4 network address)",
    types: &[],
    default_type: None,
    options: &[
        OptionSpec {
            name: "name",
            value: ValueKind::Text,
            effect: "scope display name",
            default: None,
        },
        OptionSpec {
            name: "description",
            value: ValueKind::Text,
            effect: "scope description",
            default: Some("\"\""),
        },
        OptionSpec {
            name: "start_range",
            value: ValueKind::Text,
            effect: "first address handed out",
            default: None,
        },
        OptionSpec {
            name: "end_range",
            value: ValueKind::Text,
            effect: "last address handed out",
            default: None,
        },
        OptionSpec {
            name: "subnet_mask",
            value: ValueKind::Text,
            effect: "subnet mask; changing it recreates the scope",
            default: None,
        },
        OptionSpec {
            name: "active",
            value: ValueKind::Bool,
            effect: "whether the scope answers clients",
            default: Some("true"),
        },
        OptionSpec {
            name: "lease_duration",
            value: ValueKind::Text,
            effect: "lease lifetime as D.HH:MM:SS",
            default: Some("8.00:00:00"),
        },
        OptionSpec {
            name: "router",
            value: ValueKind::List,
            effect: "option 3, default gateways",
            default: None,
        },
        OptionSpec {
            name: "dns_servers",
            value: ValueKind::List,
            effect: "option 6, DNS servers",
            default: None,
        },
        OptionSpec {
            name: "dns_domain",
            value: ValueKind::Name,
            effect: "option 15, DNS domain name",
            default: None,
        },
    ],
    dynamic_prefix: None,
    required_on_create: &["name", "start_range", "end_range", "subnet_mask"],
    recreate_on_change: &["subnet_mask"],
    migrations: &[
        Migration {
            version: 2,
            note: "table renamed from win_dhcp_server_scope; the old name is still accepted",
        },
        Migration {
            version: 3,
            note: "enabled renamed to active; enabled is still accepted, parent_domain renamed to dns_domain",
        },
    ],
};

/// One `[[dhcp_scope]]` manifest entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeConfig {
    /// Network address of the scope.
    pub scope_id: String,
    /// Whether the scope should exist.
    #[serde(default)]
    pub state: Presence,
    /// Scope display name.
    pub name: Option<String>,
    /// Scope description.
    pub description: Option<String>,
    /// First address of the range.
    pub start_range: Option<String>,
    /// Last address of the range.
    pub end_range: Option<String>,
    /// Subnet mask.
    pub subnet_mask: Option<String>,
    /// Whether the scope is active.
    #[serde(alias = "enabled")]
    pub active: Option<bool>,
    /// Lease lifetime (`D.HH:MM:SS` or `HH:MM:SS`).
    pub lease_duration: Option<String>,
    /// Default gateways.
    pub router: Option<Vec<String>>,
    /// DNS servers handed to clients.
    pub dns_servers: Option<Vec<String>>,
    /// DNS domain handed to clients.
    #[serde(alias = "parent_domain")]
    pub dns_domain: Option<String>,
    /// Attributes to reset to platform defaults.
    #[serde(default)]
    pub reset: Vec<String>,
}

impl ScopeConfig {
    /// Parsed `(start, end, mask)` when all three are given.
    ///
    /// Used by manifest validation to warn about ranges outside the subnet.
    #[must_use]
    pub fn range(&self) -> Option<(Ipv4Addr, Ipv4Addr, Ipv4Addr)> {
        let parse = |s: &Option<String>| s.as_deref().and_then(|v| v.trim().parse().ok());
        Some((
            parse(&self.start_range)?,
            parse(&self.end_range)?,
            parse(&self.subnet_mask)?,
        ))
    }
}

impl ObjectConfig for ScopeConfig {
    fn identity(&self) -> Result<Identity, ValidationError> {
        let scope_id =
            super::parse_ipv4(ObjectKind::DhcpScope, &self.scope_id, "scope_id", &self.scope_id)?;
        Ok(Identity::DhcpScope { scope_id })
    }

    fn to_desired(&self) -> Result<DesiredState, ValidationError> {
        let mut b = DesiredBuilder::new(self.identity()?, self.state);
        let ident = b.ident();
        let kind = ObjectKind::DhcpScope;
        let ip = |attr: &str, raw: &Option<String>| {
            raw.as_deref()
                .map(|r| super::parse_ipv4(kind, &ident, attr, r))
                .transpose()
        };
        let start = ip("start_range", &self.start_range)?;
        let end = ip("end_range", &self.end_range)?;
        let mask = ip("subnet_mask", &self.subnet_mask)?;

        if let (Some(s), Some(e)) = (start, end)
            && u32::from(s) > u32::from(e)
        {
            return Err(ValidationError::attribute(
                kind,
                &ident,
                "end_range",
                format!("{e} is before start_range {s}"),
            ));
        }
        if let Some(m) = mask
            && !is_contiguous_mask(m)
        {
            return Err(ValidationError::attribute(
                kind,
                &ident,
                "subnet_mask",
                format!("{m} is not a contiguous subnet mask"),
            ));
        }
        let lease = self
            .lease_duration
            .as_deref()
            .map(|d| {
                normalize_duration(d).ok_or_else(|| {
                    ValidationError::attribute(
                        kind,
                        &ident,
                        "lease_duration",
                        format!("'{d}' is not a D.HH:MM:SS duration"),
                    )
                })
            })
            .transpose()?;
        let router = self
            .router
            .as_deref()
            .map(|r| super::parse_servers(kind, &ident, "router", r))
            .transpose()?;
        let dns = self
            .dns_servers
            .as_deref()
            .map(|r| super::parse_servers(kind, &ident, "dns_servers", r))
            .transpose()?;

        b.set("name", self.name.clone())
            .set("description", self.description.clone())
            .set("start_range", start.map(|a| a.to_string()))
            .set("end_range", end.map(|a| a.to_string()))
            .set("subnet_mask", mask.map(|a| a.to_string()))
            .set("active", self.active)
            .set("lease_duration", lease)
            .set("router", router)
            .set("dns_servers", dns)
            .set("dns_domain", self.dns_domain.clone());
        b.finish(&self.reset)
    }
}

/// `true` when the mask's one-bits are contiguous from the top.
fn is_contiguous_mask(mask: Ipv4Addr) -> bool {
    let bits = u32::from(mask);
    bits.leading_ones() + bits.trailing_zeros() == 32
}

/// Normalize `D.HH:MM:SS` or `HH:MM:SS` to `D.HH:MM:SS`.
fn normalize_duration(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let (days, clock) = match raw.split_once('.') {
        Some((d, rest)) => (d.parse::<u32>().ok()?, rest),
        None => (0, raw),
    };
    let mut parts = clock.split(':').map(|p| p.parse::<u32>().ok());
    let hours = parts.next()??;
    let minutes = parts.next()??;
    let seconds = parts.next()??;
    if parts.next().is_some() || hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }
    Some(format!("{days}.{hours:02}:{minutes:02}:{seconds:02}"))
}

/// `true` when `addr` lies inside the network `scope_id/mask`.
#[must_use]
pub fn in_subnet(scope_id: Ipv4Addr, mask: Ipv4Addr, addr: Ipv4Addr) -> bool {
    let m = u32::from(mask);
    u32::from(scope_id) & m == u32::from(addr) & m
}
