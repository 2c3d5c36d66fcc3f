//! Desired and current state records.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::identity::{Identity, ObjectKind};
use super::value::{AttrMap, AttrValue};

/// Name of the attribute that carries the type sub-discriminator.
pub const TYPE_ATTR: &str = "type";

/// Whether the object should exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Object must exist with the desired attributes.
    #[default]
    Present,
    /// Object must not exist.
    Absent,
}

/// Caller-declared target configuration for one object.
///
/// # Examples
///
/// ```
/// use winstate_cli::model::{AttrValue, DesiredState, Identity};
///
/// let desired = DesiredState::present(Identity::DnsZone { name: "corp.example.com".into() })
///     .with_attr("type", "forwarder")
///     .with_attr("dns_servers", AttrValue::list(["10.0.0.1"]));
/// assert_eq!(desired.object_type(), Some("forwarder"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredState {
    /// Object identity (encodes the kind).
    pub identity: Identity,
    /// Requested existence.
    pub presence: Presence,
    /// Attributes the caller wants set. Omitted attributes are left untouched.
    pub attrs: AttrMap,
    /// Attributes the caller explicitly wants reset to the platform default.
    pub resets: BTreeSet<String>,
}

impl DesiredState {
    /// Desired presence with no attributes yet.
    #[must_use]
    pub const fn present(identity: Identity) -> Self {
        Self {
            identity,
            presence: Presence::Present,
            attrs: AttrMap::new(),
            resets: BTreeSet::new(),
        }
    }

    /// Desired absence.
    #[must_use]
    pub const fn absent(identity: Identity) -> Self {
        Self {
            identity,
            presence: Presence::Absent,
            attrs: AttrMap::new(),
            resets: BTreeSet::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    /// Builder-style reset request.
    #[must_use]
    pub fn with_reset(mut self, name: &str) -> Self {
        self.resets.insert(name.to_string());
        self
    }

    /// Kind of the target object.
    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        self.identity.kind()
    }

    /// Explicitly requested type, if any.
    #[must_use]
    pub fn object_type(&self) -> Option<&str> {
        self.attrs.get(TYPE_ATTR).and_then(AttrValue::as_text)
    }

    /// `true` when the object should exist.
    #[must_use]
    pub fn wants_present(&self) -> bool {
        self.presence == Presence::Present
    }
}

/// Live configuration fetched from the managed system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentState {
    /// Object identity.
    pub identity: Identity,
    /// Reported attribute values. A missing entry means "platform default".
    pub attrs: AttrMap,
    /// Attributes the collaborator could not report; never diffed.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unknown: BTreeSet<String>,
    /// Attributes the collaborator reports as sitting at their platform
    /// default even though the value itself is not the documented one
    /// (an installed package with no newer version available).
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub at_default: BTreeSet<String>,
}

impl CurrentState {
    /// Snapshot with no attributes.
    #[must_use]
    pub const fn new(identity: Identity) -> Self {
        Self {
            identity,
            attrs: AttrMap::new(),
            unknown: BTreeSet::new(),
            at_default: BTreeSet::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    /// Builder-style unknown-field marker.
    #[must_use]
    pub fn with_unknown(mut self, name: &str) -> Self {
        self.unknown.insert(name.to_string());
        self
    }

    /// Builder-style marker for an attribute already at its default.
    #[must_use]
    pub fn with_at_default(mut self, name: &str) -> Self {
        self.at_default.insert(name.to_string());
        self
    }

    /// Current type, if reported.
    #[must_use]
    pub fn object_type(&self) -> Option<&str> {
        self.attrs.get(TYPE_ATTR).and_then(AttrValue::as_text)
    }
}
