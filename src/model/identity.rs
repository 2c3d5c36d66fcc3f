//! Object kinds and identity keys.
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Kinds of remote-managed objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// DNS server zone.
    DnsZone,
    /// DHCP server IPv4 scope.
    DhcpScope,
    /// DHCP lease or reservation inside a scope.
    DhcpLease,
    /// Active Directory organizational unit.
    Ou,
    /// Group Policy object.
    Gpo,
    /// Installed winget package.
    Package,
}

impl ObjectKind {
    /// Every kind, in manifest order.
    pub const ALL: [Self; 6] = [
        Self::DnsZone,
        Self::DhcpScope,
        Self::DhcpLease,
        Self::Ou,
        Self::Gpo,
        Self::Package,
    ];

    /// Manifest table name for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DnsZone => "dns_zone",
            Self::DhcpScope => "dhcp_scope",
            Self::DhcpLease => "dhcp_lease",
            Self::Ou => "ou",
            Self::Gpo => "gpo",
            Self::Package => "package",
        }
    }

    /// Parse a manifest table name.
    ///
    /// # Examples
    ///
    /// ```
    /// use winstate_cli::model::ObjectKind;
    ///
    /// assert_eq!(ObjectKind::parse("DNS_ZONE"), Some(ObjectKind::DnsZone));
    /// assert_eq!(ObjectKind::parse("printer"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == lower)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a Group Policy object is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpoKey {
    /// By GUID (the display name is then a mutable attribute).
    Guid(String),
    /// By display name within a domain.
    Name {
        /// GPO display name.
        name: String,
        /// DNS name of the owning domain.
        domain: String,
    },
}

/// Identity of one remote object; determines the [`ObjectKind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// DNS zone by name.
    DnsZone {
        /// Fully qualified zone name.
        name: String,
    },
    /// DHCP scope by scope id.
    DhcpScope {
        /// Network address of the scope.
        scope_id: Ipv4Addr,
    },
    /// DHCP lease or reservation by address.
    DhcpLease {
        /// Scope the address belongs to.
        scope_id: Ipv4Addr,
        /// Leased/reserved address.
        ip: Ipv4Addr,
    },
    /// Organizational unit by parent path and name.
    Ou {
        /// X.500 path of the parent container.
        path: String,
        /// OU name.
        name: String,
    },
    /// Group Policy object.
    Gpo {
        /// GUID or (name, domain).
        key: GpoKey,
    },
    /// winget package by id.
    Package {
        /// winget package identifier.
        id: String,
    },
}

impl Identity {
    /// Kind of object this identity addresses.
    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        match self {
            Self::DnsZone { .. } => ObjectKind::DnsZone,
            Self::DhcpScope { .. } => ObjectKind::DhcpScope,
            Self::DhcpLease { .. } => ObjectKind::DhcpLease,
            Self::Ou { .. } => ObjectKind::Ou,
            Self::Gpo { .. } => ObjectKind::Gpo,
            Self::Package { .. } => ObjectKind::Package,
        }
    }

    /// Canonical key used to detect duplicates and to index snapshots.
    ///
    /// Names that the platform treats case-insensitively are folded.
    ///
    /// # Examples
    ///
    /// ```
    /// use winstate_cli::model::Identity;
    ///
    /// let a = Identity::DnsZone { name: "Corp.Example.com.".into() };
    /// let b = Identity::DnsZone { name: "corp.example.com".into() };
    /// assert_eq!(a.canonical_key(), b.canonical_key());
    /// ```
    #[must_use]
    pub fn canonical_key(&self) -> String {
        let fold = |s: &str| {
            let t = s.trim();
            t.strip_suffix('.').unwrap_or(t).to_ascii_lowercase()
        };
        match self {
            Self::DnsZone { name } => format!("dns_zone:{}", fold(name)),
            Self::DhcpScope { scope_id } => format!("dhcp_scope:{scope_id}"),
            Self::DhcpLease { scope_id, ip } => format!("dhcp_lease:{scope_id}/{ip}"),
            Self::Ou { path, name } => format!("ou:ou={},{}", fold(name), fold(path)),
            Self::Gpo {
                key: GpoKey::Guid(guid),
            } => format!("gpo:{}", fold(guid.trim_matches(['{', '}']))),
            Self::Gpo {
                key: GpoKey::Name { name, domain },
            } => format!("gpo:{}@{}", fold(name), fold(domain)),
            Self::Package { id } => format!("package:{}", fold(id)),
        }
    }

    /// Distinguished name of an OU identity (`OU=<name>,<path>`).
    #[must_use]
    pub fn distinguished_name(&self) -> Option<String> {
        match self {
            Self::Ou { path, name } if path.trim().is_empty() => Some(format!("OU={name}")),
            Self::Ou { path, name } => Some(format!("OU={name},{path}")),
            _ => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DnsZone { name } => write!(f, "dns_zone {name}"),
            Self::DhcpScope { scope_id } => write!(f, "dhcp_scope {scope_id}"),
            Self::DhcpLease { scope_id, ip } => write!(f, "dhcp_lease {ip} ({scope_id})"),
            Self::Ou { .. } => write!(
                f,
                "ou {}",
                self.distinguished_name().unwrap_or_default()
            ),
            Self::Gpo {
                key: GpoKey::Guid(guid),
            } => write!(f, "gpo {guid}"),
            Self::Gpo {
                key: GpoKey::Name { name, domain },
            } => write!(f, "gpo {name} ({domain})"),
            Self::Package { id } => write!(f, "package {id}"),
        }
    }
}
