//! Non-fatal manifest checks, reported before reconciliation starts.
use std::net::Ipv4Addr;

use crate::model::{DesiredState, Presence};
use crate::schema::dhcp_lease::LeaseConfig;
use crate::schema::dhcp_scope::{self, ScopeConfig};

use super::manifest::Manifest;

/// A validation warning detected during manifest loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Manifest table the entry came from (e.g. `dhcp_scope`).
    pub source: String,
    /// The entry that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Create a warning.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

/// A check over the loaded manifest.
pub trait ConfigValidator {
    /// Validate and return any warnings found.
    fn validate(&self) -> Vec<ValidationWarning>;

    /// Short name of the validator, used in debug output.
    fn name(&self) -> &'static str;
}

/// Scope ranges that fall outside the scope's own subnet.
#[derive(Debug)]
pub struct ScopeValidator<'a> {
    scopes: &'a [ScopeConfig],
}

impl<'a> ScopeValidator<'a> {
    /// Validate `scopes`.
    #[must_use]
    pub const fn new(scopes: &'a [ScopeConfig]) -> Self {
        Self { scopes }
    }
}

impl ConfigValidator for ScopeValidator<'_> {
    fn validate(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for scope in self.scopes {
            let (Ok(id), Some((start, end, mask))) =
                (scope.scope_id.trim().parse::<Ipv4Addr>(), scope.range())
            else {
                continue;
            };
            if u32::from(id) & u32::from(mask) != u32::from(id) {
                warnings.push(ValidationWarning::new(
                    "dhcp_scope",
                    &scope.scope_id,
                    format!("scope_id is not the network address of {id}/{mask}"),
                ));
            }
            for (attr, addr) in [("start_range", start), ("end_range", end)] {
                if !dhcp_scope::in_subnet(id, mask, addr) {
                    warnings.push(ValidationWarning::new(
                        "dhcp_scope",
                        &scope.scope_id,
                        format!("{attr} {addr} is outside {id}/{mask}"),
                    ));
                }
            }
        }
        warnings
    }

    fn name(&self) -> &'static str {
        "dhcp_scope"
    }
}

/// Leases that point at a scope the manifest removes or whose subnet does
/// not contain them.
#[derive(Debug)]
pub struct LeaseValidator<'a> {
    leases: &'a [LeaseConfig],
    scopes: &'a [ScopeConfig],
}

impl<'a> LeaseValidator<'a> {
    /// Validate `leases` against the declared `scopes`.
    #[must_use]
    pub const fn new(leases: &'a [LeaseConfig], scopes: &'a [ScopeConfig]) -> Self {
        Self { leases, scopes }
    }

    fn scope_for(&self, scope_id: Ipv4Addr) -> Option<&ScopeConfig> {
        self.scopes
            .iter()
            .find(|s| s.scope_id.trim().parse::<Ipv4Addr>().ok() == Some(scope_id))
    }
}

impl ConfigValidator for LeaseValidator<'_> {
    fn validate(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for lease in self.leases.iter().filter(|l| l.state == Presence::Present) {
            let (Ok(scope_id), Ok(ip)) = (
                lease.scope_id.trim().parse::<Ipv4Addr>(),
                lease.ip.trim().parse::<Ipv4Addr>(),
            ) else {
                continue;
            };
            let Some(scope) = self.scope_for(scope_id) else {
                continue;
            };
            if scope.state == Presence::Absent {
                warnings.push(ValidationWarning::new(
                    "dhcp_lease",
                    &lease.ip,
                    format!("scope {scope_id} is declared absent"),
                ));
            } else if let Some((_, _, mask)) = scope.range()
                && !dhcp_scope::in_subnet(scope_id, mask, ip)
            {
                warnings.push(ValidationWarning::new(
                    "dhcp_lease",
                    &lease.ip,
                    format!("{ip} is outside scope {scope_id}/{mask}"),
                ));
            }
        }
        warnings
    }

    fn name(&self) -> &'static str {
        "dhcp_lease"
    }
}

/// Absent entries that still carry attributes, which are ignored.
#[derive(Debug)]
pub struct AbsentValidator<'a> {
    desired: &'a [DesiredState],
}

impl<'a> AbsentValidator<'a> {
    /// Validate absent entries among `desired`.
    #[must_use]
    pub const fn new(desired: &'a [DesiredState]) -> Self {
        Self { desired }
    }
}

impl ConfigValidator for AbsentValidator<'_> {
    fn validate(&self) -> Vec<ValidationWarning> {
        self.desired
            .iter()
            .filter(|d| d.presence == Presence::Absent)
            .filter(|d| !d.attrs.is_empty() || !d.resets.is_empty())
            .map(|d| {
                ValidationWarning::new(
                    d.identity.kind().as_str(),
                    d.identity.to_string(),
                    "attributes of an absent object are ignored",
                )
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "absent"
    }
}

/// Run every validator over the manifest and its desired states.
#[must_use]
pub fn validate_all(manifest: &Manifest, desired: &[DesiredState]) -> Vec<ValidationWarning> {
    let validators: Vec<Box<dyn ConfigValidator + '_>> = vec![
        Box::new(ScopeValidator::new(&manifest.dhcp_scope)),
        Box::new(LeaseValidator::new(&manifest.dhcp_lease, &manifest.dhcp_scope)),
        Box::new(AbsentValidator::new(desired)),
    ];
    validators.iter().flat_map(|v| v.validate()).collect()
}
