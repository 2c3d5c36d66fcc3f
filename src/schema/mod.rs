//! Canonical per-kind configuration records and their recognized-options tables.
//!
//! Every object kind has exactly one schema module.  A module provides:
//!
//! - a strongly typed, `serde`-deserializable config record (one manifest entry),
//! - a static [`KindSchema`] describing its options, types, defaults and the
//!   migration notes for earlier revisions of the record,
//! - the conversion from that record into a [`DesiredState`].
pub mod dhcp_lease;
pub mod dhcp_scope;
pub mod dns_zone;
pub mod gpo;
pub mod ou;
pub mod package;

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

use serde::Serialize;

use crate::error::ValidationError;
use crate::model::{AttrMap, AttrValue, Compare, DesiredState, Identity, ObjectKind, Presence};

/// Shape of an option's value, as documented in the options table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Free text compared exactly.
    Text,
    /// A name compared case-insensitively (FQDNs, account names).
    Name,
    /// Boolean flag.
    Bool,
    /// One of a fixed set of values, compared case-insensitively.
    Choice(&'static [&'static str]),
    /// An unordered set of text values.
    List,
}

impl ValueKind {
    /// Comparison mode for values of this shape.
    #[must_use]
    pub const fn compare(self) -> Compare {
        match self {
            Self::Text | Self::Bool => Compare::Exact,
            Self::Name | Self::Choice(_) => Compare::CaseInsensitive,
            Self::List => Compare::Set,
        }
    }

    /// Short label for the options table.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Text => "text".to_string(),
            Self::Name => "name".to_string(),
            Self::Bool => "bool".to_string(),
            Self::List => "list".to_string(),
            Self::Choice(choices) => choices.join("|"),
        }
    }
}

/// One row of a kind's recognized-options table.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OptionSpec {
    /// Attribute name as it appears in the manifest and in deltas.
    pub name: &'static str,
    /// Value shape (also decides the comparison mode).
    pub value: ValueKind,
    /// What setting the option does on the managed object.
    pub effect: &'static str,
    /// Platform default applied at creation when the option is omitted.
    pub default: Option<&'static str>,
}

impl OptionSpec {
    /// Value the platform holds after a reset, when the default is a
    /// concrete value rather than a description.
    ///
    /// `"\"\""` in the table stands for the empty string.
    #[must_use]
    pub fn default_value(&self) -> Option<AttrValue> {
        let default = self.default?;
        Some(match (self.value, default) {
            (ValueKind::Bool, d) => AttrValue::Bool(d == "true"),
            (_, "\"\"") => AttrValue::Text(String::new()),
            (_, d) => AttrValue::Text(d.to_string()),
        })
    }

    /// Value a cleared option reads back as.
    #[must_use]
    pub fn cleared_value(&self) -> AttrValue {
        self.default_value().unwrap_or_else(|| match self.value {
            ValueKind::List => AttrValue::List(Vec::new()),
            _ => AttrValue::Text(String::new()),
        })
    }

    /// Spelling from the choice table for `value`, matched case-insensitively.
    #[must_use]
    pub fn canonical_choice(&self, value: &str) -> Option<&'static str> {
        match self.value {
            ValueKind::Choice(choices) => choices
                .iter()
                .copied()
                .find(|c| c.eq_ignore_ascii_case(value.trim())),
            _ => None,
        }
    }
}

/// A note describing how an earlier revision of the record maps onto this one.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Migration {
    /// Schema version the note applies to (the version that introduced the change).
    pub version: u32,
    /// What changed and how old manifests are handled.
    pub note: &'static str,
}

/// Static description of one object kind.
#[derive(Debug, Serialize)]
pub struct KindSchema {
    /// Kind described by this schema.
    pub kind: ObjectKind,
    /// Current schema version.
    pub version: u32,
    /// One-line description.
    pub summary: &'static str,
    /// How objects of this kind are identified.
    pub identity: &'static str,
    /// Values of the `type` sub-discriminator (empty when the kind has none).
    pub types: &'static [&'static str],
    /// Type assumed when creating without an explicit `type`.
    pub default_type: Option<&'static str>,
    /// Recognized options.
    pub options: &'static [OptionSpec],
    /// Prefix of free-form attributes (e.g. raw LDAP attributes).
    pub dynamic_prefix: Option<&'static str>,
    /// Attributes that must be supplied when the object is created.
    pub required_on_create: &'static [&'static str],
    /// Attributes whose change has no in-place primitive and forces a recreate.
    pub recreate_on_change: &'static [&'static str],
    /// Migration notes, oldest first.
    pub migrations: &'static [Migration],
}

impl KindSchema {
    /// Look up an option row by attribute name.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }

    /// `true` if `name` is a recognized option or falls under the dynamic prefix.
    #[must_use]
    pub fn recognizes(&self, name: &str) -> bool {
        self.option(name).is_some()
            || self
                .dynamic_prefix
                .is_some_and(|prefix| name.starts_with(prefix) && name.len() > prefix.len())
    }

    /// Comparison mode for one attribute.
    ///
    /// Free-form attributes compare as sets when either side is a list and
    /// exactly otherwise.
    #[must_use]
    pub fn compare_for(&self, name: &str, current: &AttrValue, desired: &AttrValue) -> Compare {
        if let Some(spec) = self.option(name) {
            return spec.value.compare();
        }
        if matches!(current, AttrValue::List(_)) || matches!(desired, AttrValue::List(_)) {
            Compare::Set
        } else {
            Compare::Exact
        }
    }

    /// `true` when `current` is what resetting `name` leaves behind.
    ///
    /// Options with a concrete default compare against it under the option's
    /// comparison mode; everything else counts as reset once it is empty.
    #[must_use]
    pub fn is_reset(&self, name: &str, current: &AttrValue) -> bool {
        match self.option(name).and_then(OptionSpec::default_value) {
            Some(default) => self.compare_for(name, current, &default).equal(current, &default),
            None => current.is_empty(),
        }
    }

    /// `true` when the kind has a type sub-discriminator.
    #[must_use]
    pub const fn is_typed(&self) -> bool {
        !self.types.is_empty()
    }
}

/// Every schema, in manifest order.
#[must_use]
pub fn all() -> [&'static KindSchema; 6] {
    [
        &dns_zone::SCHEMA,
        &dhcp_scope::SCHEMA,
        &dhcp_lease::SCHEMA,
        &ou::SCHEMA,
        &gpo::SCHEMA,
        &package::SCHEMA,
    ]
}

/// Schema for one kind.
#[must_use]
pub fn for_kind(kind: ObjectKind) -> &'static KindSchema {
    match kind {
        ObjectKind::DnsZone => &dns_zone::SCHEMA,
        ObjectKind::DhcpScope => &dhcp_scope::SCHEMA,
        ObjectKind::DhcpLease => &dhcp_lease::SCHEMA,
        ObjectKind::Ou => &ou::SCHEMA,
        ObjectKind::Gpo => &gpo::SCHEMA,
        ObjectKind::Package => &package::SCHEMA,
    }
}

/// A manifest entry that can be turned into a desired state.
pub trait ObjectConfig {
    /// Identity of the addressed object.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the identity fields are missing or malformed.
    fn identity(&self) -> Result<Identity, ValidationError>;

    /// Convert into a validated desired state.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the offending attribute.
    fn to_desired(&self) -> Result<DesiredState, ValidationError>;
}

/// Collects attributes for one record and assembles the [`DesiredState`].
///
/// Shared by every schema module so presence and reset handling is uniform.
#[derive(Debug)]
pub(crate) struct DesiredBuilder {
    identity: Identity,
    presence: Presence,
    attrs: AttrMap,
}

impl DesiredBuilder {
    pub(crate) const fn new(identity: Identity, presence: Presence) -> Self {
        Self {
            identity,
            presence,
            attrs: AttrMap::new(),
        }
    }

    pub(crate) fn ident(&self) -> String {
        self.identity.to_string()
    }

    /// Set `name` when `value` is present.
    pub(crate) fn set(&mut self, name: &str, value: Option<impl Into<AttrValue>>) -> &mut Self {
        if let Some(v) = value {
            self.attrs.insert(name.to_string(), v.into());
        }
        self
    }

    /// Validate resets against the schema and build the desired state.
    pub(crate) fn finish(self, resets: &[String]) -> Result<DesiredState, ValidationError> {
        let schema = for_kind(self.identity.kind());
        let ident = self.identity.to_string();
        let mut reset_set = BTreeSet::new();
        for name in resets {
            if name == crate::model::TYPE_ATTR {
                return Err(ValidationError::attribute(
                    schema.kind,
                    ident,
                    name,
                    "the type cannot be reset; set it explicitly",
                ));
            }
            if !schema.recognizes(name) {
                return Err(ValidationError::attribute(
                    schema.kind,
                    ident,
                    name,
                    "unknown attribute in reset list",
                ));
            }
            if self.attrs.contains_key(name) {
                return Err(ValidationError::attribute(
                    schema.kind,
                    ident,
                    name,
                    "attribute is both set and reset",
                ));
            }
            reset_set.insert(name.clone());
        }
        Ok(DesiredState {
            identity: self.identity,
            presence: self.presence,
            attrs: self.attrs,
            resets: reset_set,
        })
    }
}

/// Parse an IPv4 address attribute.
pub(crate) fn parse_ipv4(
    kind: ObjectKind,
    ident: &str,
    attribute: &str,
    raw: &str,
) -> Result<Ipv4Addr, ValidationError> {
    raw.trim().parse::<Ipv4Addr>().map_err(|_| {
        ValidationError::attribute(kind, ident, attribute, format!("'{raw}' is not an IPv4 address"))
    })
}

/// Validate a list of server addresses (IPv4 or IPv6) and return them trimmed.
pub(crate) fn parse_servers(
    kind: ObjectKind,
    ident: &str,
    attribute: &str,
    raw: &[String],
) -> Result<Vec<String>, ValidationError> {
    raw.iter()
        .map(|s| {
            s.trim().parse::<IpAddr>().map(|ip| ip.to_string()).map_err(|_| {
                ValidationError::attribute(
                    kind,
                    ident,
                    attribute,
                    format!("'{s}' is not an IP address"),
                )
            })
        })
        .collect()
}

/// Reject blank identity fields.
pub(crate) fn require_non_blank(
    kind: ObjectKind,
    attribute: &str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::attribute(
            kind,
            value,
            attribute,
            "must not be empty",
        ));
    }
    Ok(())
}
