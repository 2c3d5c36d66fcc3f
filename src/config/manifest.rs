//! The desired-state manifest: one array of tables per object kind.
use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::DesiredState;
use crate::schema::ObjectConfig;
use crate::schema::dhcp_lease::LeaseConfig;
use crate::schema::dhcp_scope::ScopeConfig;
use crate::schema::dns_zone::ZoneConfig;
use crate::schema::gpo::GpoConfig;
use crate::schema::ou::OuConfig;
use crate::schema::package::PackageConfig;

/// Parsed manifest, entries kept in file order within each kind.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// `[[dns_zone]]` entries.
    #[serde(default)]
    pub dns_zone: Vec<ZoneConfig>,
    /// `[[dhcp_scope]]` entries.
    #[serde(default, alias = "win_dhcp_server_scope")]
    pub dhcp_scope: Vec<ScopeConfig>,
    /// `[[dhcp_lease]]` entries.
    #[serde(default)]
    pub dhcp_lease: Vec<LeaseConfig>,
    /// `[[ou]]` entries.
    #[serde(default)]
    pub ou: Vec<OuConfig>,
    /// `[[gpo]]` entries.
    #[serde(default)]
    pub gpo: Vec<GpoConfig>,
    /// `[[package]]` entries.
    #[serde(default)]
    pub package: Vec<PackageConfig>,
}

impl Manifest {
    /// Number of entries across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dns_zone.len()
            + self.dhcp_scope.len()
            + self.dhcp_lease.len()
            + self.ou.len()
            + self.gpo.len()
            + self.package.len()
    }

    /// Whether the manifest declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> impl Iterator<Item = &dyn ObjectConfig> {
        fn erase<T: ObjectConfig>(items: &[T]) -> impl Iterator<Item = &dyn ObjectConfig> {
            items.iter().map(|c| c as &dyn ObjectConfig)
        }
        // Scopes before leases, OUs before GPOs: the order a fresh server is built in.
        erase(&self.dns_zone)
            .chain(erase(&self.dhcp_scope))
            .chain(erase(&self.dhcp_lease))
            .chain(erase(&self.ou))
            .chain(erase(&self.gpo))
            .chain(erase(&self.package))
    }

    /// Convert every entry into a validated desired state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first entry that fails
    /// validation, or [`ConfigError::DuplicateIdentity`] when two entries
    /// address the same object.
    pub fn desired_states(&self) -> Result<Vec<DesiredState>, ConfigError> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(self.len());
        for entry in self.entries() {
            let desired = entry.to_desired()?;
            if !seen.insert(desired.identity.canonical_key()) {
                return Err(ConfigError::DuplicateIdentity {
                    identity: desired.identity.to_string(),
                });
            }
            out.push(desired);
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::toml_loader::parse_config;
    use crate::model::{AttrValue, Identity, Presence};

    fn parse(src: &str) -> Manifest {
        parse_config(src, "test.toml").expect("valid manifest")
    }

    #[test]
    fn empty_manifest() {
        let m = parse("");
        assert!(m.is_empty());
        assert!(m.desired_states().unwrap().is_empty());
    }

    #[test]
    fn every_kind_is_read() {
        let m = parse(
            r#"
[[dns_zone]]
name = "corp.example.com"
type = "forwarder"
dns_servers = ["10.0.0.1"]

[[dhcp_scope]]
scope_id = "192.168.100.0"
name = "VLAN10"

[[dhcp_lease]]
scope_id = "192.168.100.0"
ip = "192.168.100.205"
type = "reservation"
client_id = "00-a1-b2-c2-d4-e5"

[[ou]]
name = "EUC Users"
path = "DC=corp,DC=example,DC=com"

[[gpo]]
name = "Baseline"
domain = "corp.example.com"

[[package]]
id = "Git.Git"
state = "absent"
"#,
        );
        assert_eq!(m.len(), 6);
        let desired = m.desired_states().unwrap();
        let kinds: Vec<String> = desired.iter().map(|d| d.identity.kind().to_string()).collect();
        assert_eq!(
            kinds,
            ["dns_zone", "dhcp_scope", "dhcp_lease", "ou", "gpo", "package"]
        );
        assert_eq!(desired[5].presence, Presence::Absent);
        assert_eq!(
            desired[0].attrs["dns_servers"],
            AttrValue::list(["10.0.0.1"])
        );
    }

    #[test]
    fn legacy_scope_table_name() {
        let m = parse(
            r#"
[[win_dhcp_server_scope]]
scope_id = "10.0.0.0"
enabled = true
"#,
        );
        let desired = m.desired_states().unwrap();
        assert_eq!(
            desired[0].identity,
            Identity::DhcpScope {
                scope_id: "10.0.0.0".parse().unwrap()
            }
        );
        assert_eq!(desired[0].attrs["active"], AttrValue::Bool(true));
    }

    #[test]
    fn unknown_table_is_rejected() {
        let err = parse_config::<Manifest>("[[dns_record]]\nname = \"a\"\n", "m.toml").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSyntax { .. }));
    }

    #[test]
    fn duplicate_zone_differing_only_in_case() {
        let m = parse(
            r#"
[[dns_zone]]
name = "corp.example.com"

[[dns_zone]]
name = "CORP.example.com."
"#,
        );
        let err = m.desired_states().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateIdentity { .. }));
    }

    #[test]
    fn invalid_entry_names_attribute() {
        let m = parse(
            r#"
[[dhcp_scope]]
scope_id = "10.0.0.0"
start_range = "10.0.0.300"
"#,
        );
        let err = m.desired_states().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("start_range"), "{err}");
    }
}
