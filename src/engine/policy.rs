//! Transition policy: which type changes are legal, how they are carried out,
//! and which attributes each type requires or forbids.
//!
//! The tables are static and finite.  A pair missing from a kind's transition
//! table is a policy violation.
use serde::Serialize;

use super::diff::{AttributeDelta, DeltaKind};
use crate::error::{EngineError, PolicyViolation, ValidationError};
use crate::model::{AttrMap, AttrValue, DesiredState, Identity, ObjectKind, TYPE_ATTR};
use crate::schema::{self, ValueKind};

/// How an allowed transition is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// A single modify.
    InPlace,
    /// Delete followed by create.
    Recreate,
}

/// Observable consequence of a transition beyond the attribute change itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Nothing else happens.
    #[default]
    None,
    /// The object is destroyed and rebuilt.
    Recreate,
    /// The zone's records are replaced by a transfer from its masters.
    ZoneTransfer,
}

/// One row of a kind's transition table.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TransitionRule {
    /// Current type.
    pub from: &'static str,
    /// Requested type.
    pub to: &'static str,
    /// Whether the transition may happen at all.
    pub allowed: bool,
    /// How it is carried out.
    pub strategy: Strategy,
    /// What else it causes.
    pub side_effect: SideEffect,
}

/// Attributes required or forbidden for one type.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TypeRule {
    /// Type value.
    pub object_type: &'static str,
    /// Attributes the desired state must set.
    pub required: &'static [&'static str],
    /// Attributes the desired state must not set.
    pub forbidden: &'static [&'static str],
}

const fn in_place(from: &'static str, to: &'static str, side_effect: SideEffect) -> TransitionRule {
    TransitionRule {
        from,
        to,
        allowed: true,
        strategy: Strategy::InPlace,
        side_effect,
    }
}

const fn recreate(from: &'static str, to: &'static str) -> TransitionRule {
    TransitionRule {
        from,
        to,
        allowed: true,
        strategy: Strategy::Recreate,
        side_effect: SideEffect::Recreate,
    }
}

const fn forbidden(from: &'static str, to: &'static str) -> TransitionRule {
    TransitionRule {
        from,
        to,
        allowed: false,
        strategy: Strategy::InPlace,
        side_effect: SideEffect::None,
    }
}

// primary -> stub/forwarder would discard the authoritative records.
static ZONE_TRANSITIONS: &[TransitionRule] = &[
    in_place("primary", "secondary", SideEffect::ZoneTransfer),
    forbidden("primary", "stub"),
    forbidden("primary", "forwarder"),
    in_place("secondary", "primary", SideEffect::None),
    recreate("secondary", "stub"),
    recreate("secondary", "forwarder"),
    in_place("stub", "primary", SideEffect::None),
    recreate("stub", "secondary"),
    recreate("stub", "forwarder"),
    recreate("forwarder", "primary"),
    recreate("forwarder", "secondary"),
    recreate("forwarder", "stub"),
];

static ZONE_TYPES: &[TypeRule] = &[
    TypeRule {
        object_type: "primary",
        required: &[],
        forbidden: &["dns_servers"],
    },
    TypeRule {
        object_type: "secondary",
        required: &["dns_servers"],
        forbidden: &["replication", "dynamic_update"],
    },
    TypeRule {
        object_type: "stub",
        required: &["dns_servers"],
        forbidden: &["dynamic_update"],
    },
    TypeRule {
        object_type: "forwarder",
        required: &["dns_servers"],
        forbidden: &["dynamic_update"],
    },
];

static LEASE_TRANSITIONS: &[TransitionRule] = &[
    in_place("lease", "reservation", SideEffect::None),
    in_place("reservation", "lease", SideEffect::None),
];

static LEASE_TYPES: &[TypeRule] = &[
    TypeRule {
        object_type: "lease",
        required: &[],
        forbidden: &[],
    },
    TypeRule {
        object_type: "reservation",
        required: &["client_id"],
        forbidden: &[],
    },
];

/// Transition table of a kind (empty for kinds without a type).
#[must_use]
pub fn transitions(kind: ObjectKind) -> &'static [TransitionRule] {
    match kind {
        ObjectKind::DnsZone => ZONE_TRANSITIONS,
        ObjectKind::DhcpLease => LEASE_TRANSITIONS,
        _ => &[],
    }
}

/// Per-type attribute rules of a kind (empty for kinds without a type).
#[must_use]
pub fn type_rules(kind: ObjectKind) -> &'static [TypeRule] {
    match kind {
        ObjectKind::DnsZone => ZONE_TYPES,
        ObjectKind::DhcpLease => LEASE_TYPES,
        _ => &[],
    }
}

fn type_rule(kind: ObjectKind, object_type: &str) -> Option<&'static TypeRule> {
    type_rules(kind)
        .iter()
        .find(|r| r.object_type.eq_ignore_ascii_case(object_type))
}

/// Outcome of evaluating one transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionCheck {
    /// Kind of the object.
    pub kind: ObjectKind,
    /// Display form of the identity.
    pub identity: String,
    /// Effective current type (`None` for untyped kinds or absent objects).
    pub from_type: Option<String>,
    /// Effective target type.
    pub to_type: Option<String>,
    /// Whether the transition is legal.
    pub allowed: bool,
    /// Required attributes the desired state does not set.
    pub required_attrs_missing: Vec<String>,
    /// Forbidden attributes the desired state sets.
    pub forbidden_attrs_present: Vec<String>,
    /// How the change is carried out.
    pub strategy: Strategy,
    /// What else the change causes.
    pub side_effect: SideEffect,
}

impl TransitionCheck {
    /// Check for an object that is going away: nothing to validate.
    #[must_use]
    pub fn removal(identity: &Identity) -> Self {
        Self {
            kind: identity.kind(),
            identity: identity.to_string(),
            from_type: None,
            to_type: None,
            allowed: true,
            required_attrs_missing: Vec::new(),
            forbidden_attrs_present: Vec::new(),
            strategy: Strategy::InPlace,
            side_effect: SideEffect::None,
        }
    }

    /// Escalate to a recreate when a recreate-only attribute changes.
    #[must_use]
    pub fn with_changed_attributes(mut self, deltas: &[AttributeDelta]) -> Self {
        let recreate_only = schema::for_kind(self.kind).recreate_on_change;
        let escalate = deltas.iter().any(|d| {
            d.kind != DeltaKind::Unchanged && recreate_only.contains(&d.name.as_str())
        });
        if escalate && self.allowed {
            self.strategy = Strategy::Recreate;
            self.side_effect = SideEffect::Recreate;
        }
        self
    }

    /// Turn violations into errors.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Policy`] for an illegal transition or forbidden attributes.
    /// - [`EngineError::Validation`] for missing required attributes.
    pub fn into_result(self) -> Result<Self, EngineError> {
        let from = self.from_type.clone().unwrap_or_default();
        let to = self.to_type.clone().unwrap_or_default();
        if !self.allowed {
            return Err(PolicyViolation {
                kind: self.kind,
                identity: self.identity,
                from_type: self.from_type,
                to_type: self.to_type,
                attributes: vec![TYPE_ATTR.to_string()],
                message: format!(
                    "transition {from} -> {to} is not allowed; delete the object explicitly first"
                ),
            }
            .into());
        }
        if let Some(first) = self.required_attrs_missing.first() {
            return Err(ValidationError::attribute(
                self.kind,
                self.identity,
                first,
                format!("required when type is {to}"),
            )
            .into());
        }
        if !self.forbidden_attrs_present.is_empty() {
            return Err(PolicyViolation {
                kind: self.kind,
                message: format!(
                    "attribute(s) {} not allowed when type is {to}",
                    self.forbidden_attrs_present.join(", ")
                ),
                identity: self.identity,
                from_type: self.from_type,
                to_type: self.to_type,
                attributes: self.forbidden_attrs_present,
            }
            .into());
        }
        Ok(self)
    }
}

/// Evaluate the transition from `current_type` to the desired type.
///
/// `creating` is `true` when the object does not exist yet.  Required
/// attributes are checked when the desired state names its type explicitly,
/// when creating, and when the transition recreates the object.  Forbidden
/// attributes are always checked against the target type.
#[must_use]
pub fn validate(
    identity: &Identity,
    current_type: Option<&str>,
    desired_type: Option<&str>,
    desired_attrs: &AttrMap,
    creating: bool,
) -> TransitionCheck {
    let kind = identity.kind();
    let kind_schema = schema::for_kind(kind);
    let mut check = TransitionCheck::removal(identity);

    if kind_schema.is_typed() {
        let from = if creating {
            None
        } else {
            current_type.or(kind_schema.default_type)
        };
        let to = desired_type.or(from).or(kind_schema.default_type);
        check.from_type = from.map(str::to_ascii_lowercase);
        check.to_type = to.map(str::to_ascii_lowercase);

        if let (Some(from), Some(to)) = (check.from_type.clone(), check.to_type.clone())
            && from != to
        {
            match transitions(kind)
                .iter()
                .find(|r| r.from == from.as_str() && r.to == to.as_str())
            {
                Some(rule) => {
                    check.allowed = rule.allowed;
                    check.strategy = rule.strategy;
                    check.side_effect = rule.side_effect;
                }
                None => check.allowed = false,
            }
        }

        let rebuilding = creating || check.strategy == Strategy::Recreate;
        if let Some(rule) = check.to_type.as_deref().and_then(|t| type_rule(kind, t)) {
            if desired_type.is_some() || rebuilding {
                check.required_attrs_missing = missing(rule.required, desired_attrs);
            }
            check.forbidden_attrs_present = rule
                .forbidden
                .iter()
                .filter(|a| desired_attrs.contains_key(**a))
                .map(ToString::to_string)
                .collect();
        }
    }

    if creating {
        for name in missing(kind_schema.required_on_create, desired_attrs) {
            if !check.required_attrs_missing.contains(&name) {
                check.required_attrs_missing.push(name);
            }
        }
    }
    check
}

fn missing(required: &[&str], attrs: &AttrMap) -> Vec<String> {
    required
        .iter()
        .filter(|a| attrs.get(**a).is_none_or(AttrValue::is_empty))
        .map(ToString::to_string)
        .collect()
}

/// Check every desired attribute against the kind's options table and return
/// a copy whose choice values use the table's spelling.
///
/// Manifest records are already typed; this guards desired states built
/// through the library API, where `"Forwarder"` must reach the surface as
/// `"forwarder"`.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the first unrecognized or ill-shaped attribute.
pub fn check_attributes(desired: &DesiredState) -> Result<DesiredState, ValidationError> {
    let kind_schema = schema::for_kind(desired.kind());
    let ident = desired.identity.to_string();
    for name in desired.attrs.keys().chain(desired.resets.iter()) {
        if !kind_schema.recognizes(name) {
            return Err(ValidationError::attribute(
                kind_schema.kind,
                ident,
                name,
                format!("not a recognized {} option", kind_schema.kind),
            ));
        }
    }
    let mut checked = desired.clone();
    for (name, value) in &mut checked.attrs {
        let Some(option) = kind_schema.option(name) else {
            continue;
        };
        let shape_ok = match option.value {
            ValueKind::Bool => matches!(value, AttrValue::Bool(_)),
            ValueKind::List => matches!(value, AttrValue::List(_) | AttrValue::Text(_)),
            ValueKind::Text | ValueKind::Name => matches!(value, AttrValue::Text(_)),
            ValueKind::Choice(_) => {
                let canonical = value.as_text().and_then(|v| option.canonical_choice(v));
                if let Some(canonical) = canonical {
                    *value = AttrValue::from(canonical);
                }
                canonical.is_some()
            }
        };
        if !shape_ok {
            return Err(ValidationError::attribute(
                kind_schema.kind,
                ident,
                name,
                format!("expected {}, got '{value}'", option.value.label()),
            ));
        }
    }
    Ok(checked)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::AttrMap;
    use std::net::Ipv4Addr;

    fn zone() -> Identity {
        Identity::DnsZone {
            name: "corp.example.com".to_string(),
        }
    }

    fn attrs(pairs: &[(&str, AttrValue)]) -> AttrMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn servers() -> AttrValue {
        AttrValue::list(["10.0.0.1"])
    }

    // -----------------------------------------------------------------------
    // Zone transitions
    // -----------------------------------------------------------------------

    #[test]
    fn zone_table_covers_every_ordered_pair() {
        let types = schema::dns_zone::TYPES;
        for from in types {
            for to in types.iter().filter(|t| *t != from) {
                assert!(
                    ZONE_TRANSITIONS.iter().any(|r| r.from == *from && r.to == *to),
                    "missing rule {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn primary_to_secondary_is_in_place_with_zone_transfer() {
        let a = attrs(&[("type", "secondary".into()), ("dns_servers", servers())]);
        let check = validate(&zone(), Some("primary"), Some("secondary"), &a, false);
        assert!(check.allowed);
        assert_eq!(check.strategy, Strategy::InPlace);
        assert_eq!(check.side_effect, SideEffect::ZoneTransfer);
        assert!(check.into_result().is_ok());
    }

    #[test]
    fn primary_to_forwarder_is_a_policy_violation() {
        let a = attrs(&[("type", "forwarder".into()), ("dns_servers", servers())]);
        let err = validate(&zone(), Some("primary"), Some("forwarder"), &a, false)
            .into_result()
            .unwrap_err();
        assert!(matches!(err, EngineError::Policy(_)), "got {err:?}");
        assert!(err.to_string().contains("primary -> forwarder"));
    }

    #[test]
    fn stub_to_forwarder_recreates() {
        let a = attrs(&[("type", "forwarder".into()), ("dns_servers", servers())]);
        let check = validate(&zone(), Some("stub"), Some("forwarder"), &a, false);
        assert_eq!(check.strategy, Strategy::Recreate);
        assert_eq!(check.side_effect, SideEffect::Recreate);
    }

    #[test]
    fn missing_current_type_defaults_to_primary() {
        let a = attrs(&[("type", "stub".into()), ("dns_servers", servers())]);
        let check = validate(&zone(), None, Some("stub"), &a, false);
        assert_eq!(check.from_type.as_deref(), Some("primary"));
        assert!(!check.allowed);
    }

    // -----------------------------------------------------------------------
    // Required / forbidden attributes
    // -----------------------------------------------------------------------

    #[test]
    fn forwarder_without_servers_is_a_validation_error() {
        let a = attrs(&[("type", "forwarder".into())]);
        let err = validate(&zone(), None, Some("forwarder"), &a, true)
            .into_result()
            .unwrap_err();
        match err {
            EngineError::Validation(v) => {
                assert_eq!(v.attribute.as_deref(), Some("dns_servers"));
                assert!(v.message.contains("forwarder"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_server_list_counts_as_missing() {
        let a = attrs(&[
            ("type", "secondary".into()),
            ("dns_servers", AttrValue::list(Vec::<String>::new())),
        ]);
        let check = validate(&zone(), None, Some("secondary"), &a, true);
        assert_eq!(check.required_attrs_missing, vec!["dns_servers"]);
    }

    #[test]
    fn secondary_forbids_replication() {
        let a = attrs(&[
            ("type", "secondary".into()),
            ("dns_servers", servers()),
            ("replication", "forest".into()),
        ]);
        let err = validate(&zone(), Some("secondary"), Some("secondary"), &a, false)
            .into_result()
            .unwrap_err();
        match err {
            EngineError::Policy(p) => assert_eq!(p.attributes, vec!["replication"]),
            other => panic!("expected policy violation, got {other:?}"),
        }
    }

    #[test]
    fn partial_update_without_type_skips_required_check() {
        let a = attrs(&[("replication", "domain".into())]);
        let check = validate(&zone(), Some("stub"), None, &a, false);
        assert!(check.required_attrs_missing.is_empty());
        assert_eq!(check.to_type.as_deref(), Some("stub"));
    }

    #[test]
    fn partial_update_still_checks_forbidden_attributes() {
        let a = attrs(&[("dns_servers", servers())]);
        let err = validate(&zone(), Some("primary"), None, &a, false)
            .into_result()
            .unwrap_err();
        assert!(matches!(err, EngineError::Policy(_)));
    }

    // -----------------------------------------------------------------------
    // Leases and untyped kinds
    // -----------------------------------------------------------------------

    fn lease() -> Identity {
        Identity::DhcpLease {
            scope_id: Ipv4Addr::new(10, 0, 0, 0),
            ip: Ipv4Addr::new(10, 0, 0, 5),
        }
    }

    #[test]
    fn lease_to_reservation_requires_client_id() {
        let a = attrs(&[("type", "reservation".into())]);
        let check = validate(&lease(), Some("lease"), Some("reservation"), &a, false);
        assert!(check.allowed);
        assert_eq!(check.required_attrs_missing, vec!["client_id"]);
    }

    #[test]
    fn reservation_to_lease_is_in_place() {
        let a = attrs(&[("type", "lease".into())]);
        let check = validate(&lease(), Some("reservation"), Some("lease"), &a, false);
        assert_eq!(check.strategy, Strategy::InPlace);
        assert!(check.into_result().is_ok());
    }

    #[test]
    fn creating_scope_requires_create_time_attributes() {
        let scope = Identity::DhcpScope {
            scope_id: Ipv4Addr::new(10, 0, 0, 0),
        };
        let a = attrs(&[("name", "VLAN10".into())]);
        let check = validate(&scope, None, None, &a, true);
        assert_eq!(
            check.required_attrs_missing,
            vec!["start_range", "end_range", "subnet_mask"]
        );
    }

    #[test]
    fn subnet_change_escalates_to_recreate() {
        let scope = Identity::DhcpScope {
            scope_id: Ipv4Addr::new(10, 0, 0, 0),
        };
        let delta = AttributeDelta {
            name: "subnet_mask".to_string(),
            current: Some("255.255.255.0".into()),
            desired: Some("255.255.254.0".into()),
            kind: DeltaKind::Change,
        };
        let check = validate(&scope, None, None, &AttrMap::new(), false)
            .with_changed_attributes(&[delta]);
        assert_eq!(check.strategy, Strategy::Recreate);
    }

    // -----------------------------------------------------------------------
    // Attribute shape checks
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_attribute_is_rejected() {
        let d = DesiredState::present(zone()).with_attr("zone_file", "a.dns");
        let err = check_attributes(&d).unwrap_err();
        assert_eq!(err.attribute.as_deref(), Some("zone_file"));
    }

    #[test]
    fn choice_outside_table_is_rejected() {
        let d = DesiredState::present(zone()).with_attr("type", "master");
        assert!(check_attributes(&d).is_err());
    }

    #[test]
    fn well_formed_attributes_pass() {
        let d = DesiredState::present(zone())
            .with_attr("type", "forwarder")
            .with_attr("dns_servers", servers());
        assert_eq!(check_attributes(&d).unwrap(), d);
    }

    #[test]
    fn choice_values_take_the_table_spelling() {
        let d = DesiredState::present(zone())
            .with_attr("type", "Forwarder")
            .with_attr("replication", " DOMAIN ")
            .with_attr("dns_servers", servers());
        let checked = check_attributes(&d).unwrap();
        assert_eq!(checked.object_type(), Some("forwarder"));
        assert_eq!(checked.attrs["replication"], AttrValue::from("domain"));
        assert_eq!(checked.attrs["dns_servers"], servers());
    }
}
