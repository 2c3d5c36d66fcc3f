//! Active Directory organizational units.
use std::collections::BTreeMap;

use serde::Deserialize;

use super::{DesiredBuilder, KindSchema, Migration, ObjectConfig, OptionSpec, ValueKind};
use crate::error::ValidationError;
use crate::model::{AttrValue, DesiredState, Identity, ObjectKind, Presence};

/// Prefix of raw LDAP attributes.
pub const ATTRIBUTE_PREFIX: &str = "attributes.";

/// Recognized options for `[[ou]]` entries.
pub static SCHEMA: KindSchema = KindSchema {
    kind: ObjectKind::Ou,
    version: 2,
    summary: "Active Directory organizational unit",
    identity: "(path, name); an empty path means the domain root",
    types: &[],
    default_type: None,
    options: &[
        OptionSpec {
            name: "description",
            value: ValueKind::Text,
            effect: "description attribute",
            default: None,
        },
        OptionSpec {
            name: "display_name",
            value: ValueKind::Text,
            effect: "displayName attribute",
            default: None,
        },
        OptionSpec {
            name: "managed_by",
            value: ValueKind::Name,
            effect: "managedBy (distinguished name of a user or group)",
            default: None,
        },
        OptionSpec {
            name: "protected",
            value: ValueKind::Bool,
            effect: "ProtectedFromAccidentalDeletion; cleared before delete",
            default: Some("true"),
        },
        OptionSpec {
            name: "location.street_address",
            value: ValueKind::Text,
            effect: "street attribute",
            default: None,
        },
        OptionSpec {
            name: "location.city",
            value: ValueKind::Text,
            effect: "l attribute",
            default: None,
        },
        OptionSpec {
            name: "location.state",
            value: ValueKind::Text,
            effect: "st attribute",
            default: None,
        },
        OptionSpec {
            name: "location.postal_code",
            value: ValueKind::Text,
            effect: "postalCode attribute",
            default: None,
        },
        OptionSpec {
            name: "location.country",
            value: ValueKind::Name,
            effect: "c attribute (ISO 3166 two-letter code)",
            default: None,
        },
    ],
    dynamic_prefix: Some(ATTRIBUTE_PREFIX),
    required_on_create: &[],
    recreate_on_change: &[],
    migrations: &[Migration {
        version: 2,
        note: "other_attributes renamed to attributes; the old key is still accepted",
    }],
};

/// Postal code given as text or as a bare number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PostalCode {
    /// `"30328"`
    Text(String),
    /// `30328`
    Number(u32),
}

impl PostalCode {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Postal location of an OU.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Location {
    /// Street address.
    pub street_address: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or province.
    pub state: Option<String>,
    /// Postal code.
    pub postal_code: Option<PostalCode>,
    /// Two-letter country code.
    pub country: Option<String>,
}

/// A raw LDAP attribute value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LdapValue {
    /// Single-valued attribute.
    One(String),
    /// Integer attribute.
    Int(i64),
    /// Multi-valued attribute.
    Many(Vec<String>),
}

impl From<LdapValue> for AttrValue {
    fn from(value: LdapValue) -> Self {
        match value {
            LdapValue::One(s) => Self::Text(s),
            LdapValue::Int(i) => Self::Int(i),
            LdapValue::Many(items) => Self::List(items),
        }
    }
}

/// One `[[ou]]` manifest entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OuConfig {
    /// OU name.
    pub name: String,
    /// Parent container; omitted means the domain root.
    #[serde(default)]
    pub path: String,
    /// Whether the OU should exist.
    #[serde(default)]
    pub state: Presence,
    /// Description.
    pub description: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Managing principal.
    pub managed_by: Option<String>,
    /// Protection from accidental deletion.
    pub protected: Option<bool>,
    /// Postal location.
    pub location: Option<Location>,
    /// Raw LDAP attributes by LDAP display name.
    #[serde(alias = "other_attributes")]
    pub attributes: Option<BTreeMap<String, LdapValue>>,
    /// Attributes to reset to platform defaults.
    #[serde(default)]
    pub reset: Vec<String>,
}

impl ObjectConfig for OuConfig {
    fn identity(&self) -> Result<Identity, ValidationError> {
        super::require_non_blank(ObjectKind::Ou, "name", &self.name)?;
        if self.name.contains(['=', ',']) {
            return Err(ValidationError::attribute(
                ObjectKind::Ou,
                &self.name,
                "name",
                "the OU name must not contain '=' or ','; use path for the parent",
            ));
        }
        Ok(Identity::Ou {
            path: self.path.trim().to_string(),
            name: self.name.trim().to_string(),
        })
    }

    fn to_desired(&self) -> Result<DesiredState, ValidationError> {
        let mut b = DesiredBuilder::new(self.identity()?, self.state);
        b.set("description", self.description.clone())
            .set("display_name", self.display_name.clone())
            .set("managed_by", self.managed_by.clone())
            .set("protected", self.protected);

        if let Some(loc) = self.location.clone() {
            if let Some(country) = &loc.country
                && !(country.len() == 2 && country.chars().all(|c| c.is_ascii_alphabetic()))
            {
                return Err(ValidationError::attribute(
                    ObjectKind::Ou,
                    b.ident(),
                    "location.country",
                    format!("'{country}' is not a two-letter country code"),
                ));
            }
            b.set("location.street_address", loc.street_address)
                .set("location.city", loc.city)
                .set("location.state", loc.state)
                .set("location.postal_code", loc.postal_code.map(PostalCode::into_text))
                .set("location.country", loc.country.map(|c| c.to_ascii_uppercase()));
        }

        for (ldap_name, value) in self.attributes.clone().unwrap_or_default() {
            if ldap_name.trim().is_empty() || ldap_name.contains('.') {
                return Err(ValidationError::attribute(
                    ObjectKind::Ou,
                    b.ident(),
                    format!("{ATTRIBUTE_PREFIX}{ldap_name}"),
                    "not a valid LDAP attribute name",
                ));
            }
            // LDAP attribute names are case-insensitive; the surface reports them lowercased.
            b.set(
                &format!("{ATTRIBUTE_PREFIX}{}", ldap_name.trim().to_ascii_lowercase()),
                Some(value),
            );
        }
        let resets: Vec<String> = self
            .reset
            .iter()
            .map(|r| match r.strip_prefix(ATTRIBUTE_PREFIX) {
                Some(ldap_name) => format!("{ATTRIBUTE_PREFIX}{}", ldap_name.to_ascii_lowercase()),
                None => r.clone(),
            })
            .collect();
        b.finish(&resets)
    }
}
