//! Attribute differ: current vs desired record to typed deltas.
use serde::Serialize;

use crate::model::{AttrValue, CurrentState, DesiredState};
use crate::schema;

/// Reserved delta name for the object's own existence.
pub const OBJECT_DELTA: &str = "@object";

/// What a delta does to one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    /// Attribute (or object) is missing and will be set.
    Add,
    /// Attribute holds a different value.
    Change,
    /// Attribute (or object) will be removed or reset to its default.
    Remove,
    /// Nothing to do.
    Unchanged,
}

/// One attribute-level difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDelta {
    /// Attribute name, or [`OBJECT_DELTA`].
    pub name: String,
    /// Value reported by the surface.
    pub current: Option<AttrValue>,
    /// Value requested by the caller.
    pub desired: Option<AttrValue>,
    /// Classification.
    pub kind: DeltaKind,
}

impl AttributeDelta {
    fn object(kind: DeltaKind) -> Self {
        Self {
            name: OBJECT_DELTA.to_string(),
            current: None,
            desired: None,
            kind,
        }
    }

    /// `true` for the whole-object delta.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.name == OBJECT_DELTA
    }

    /// One-line description for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        let show = |v: &Option<AttrValue>| v.as_ref().map_or_else(|| "(default)".to_string(), ToString::to_string);
        match (self.is_object(), self.kind) {
            (true, DeltaKind::Add) => "create object".to_string(),
            (true, DeltaKind::Remove) => "remove object".to_string(),
            (_, DeltaKind::Add) => format!("{}: set to {}", self.name, show(&self.desired)),
            (_, DeltaKind::Change) => format!(
                "{}: {} -> {}",
                self.name,
                show(&self.current),
                show(&self.desired)
            ),
            (_, DeltaKind::Remove) => format!("{}: reset from {}", self.name, show(&self.current)),
            (_, DeltaKind::Unchanged) => format!("{}: unchanged", self.name),
        }
    }
}

/// Compare `current` against `desired`.
///
/// Attributes omitted from the desired state never produce a delta.  Attributes
/// the surface reported as unknown are treated as unchanged.  The result is
/// ordered: the whole-object delta first, then attributes by name.
///
/// # Examples
///
/// ```
/// use winstate_cli::engine::{DeltaKind, diff};
/// use winstate_cli::model::{DesiredState, Identity};
///
/// let id = Identity::Package { id: "Git.Git".into() };
/// let deltas = diff(None, &DesiredState::present(id).with_attr("version", "2.44.0"));
/// assert_eq!(deltas[0].name, "@object");
/// assert_eq!(deltas[1].kind, DeltaKind::Add);
/// ```
#[must_use]
pub fn diff(current: Option<&CurrentState>, desired: &DesiredState) -> Vec<AttributeDelta> {
    let Some(current) = current else {
        if !desired.wants_present() {
            return Vec::new();
        }
        let mut deltas = vec![AttributeDelta::object(DeltaKind::Add)];
        deltas.extend(desired.attrs.iter().map(|(name, value)| AttributeDelta {
            name: name.clone(),
            current: None,
            desired: Some(value.clone()),
            kind: DeltaKind::Add,
        }));
        return deltas;
    };

    if !desired.wants_present() {
        return vec![AttributeDelta::object(DeltaKind::Remove)];
    }

    let schema = schema::for_kind(desired.kind());
    let mut deltas: Vec<AttributeDelta> = desired
        .attrs
        .iter()
        .map(|(name, want)| {
            let have = current.attrs.get(name);
            let kind = match have {
                Some(have) if schema.compare_for(name, have, want).equal(have, want) => {
                    DeltaKind::Unchanged
                }
                Some(_) => DeltaKind::Change,
                None if current.unknown.contains(name) => DeltaKind::Unchanged,
                None => DeltaKind::Add,
            };
            AttributeDelta {
                name: name.clone(),
                current: have.cloned(),
                desired: Some(want.clone()),
                kind,
            }
        })
        .collect();

    deltas.extend(desired.resets.iter().map(|name| {
        let have = current.attrs.get(name);
        let kind = match have {
            None => DeltaKind::Unchanged,
            Some(_) if current.at_default.contains(name) => DeltaKind::Unchanged,
            Some(have) if schema.is_reset(name, have) => DeltaKind::Unchanged,
            Some(_) => DeltaKind::Remove,
        };
        AttributeDelta {
            name: name.clone(),
            current: have.cloned(),
            desired: None,
            kind,
        }
    }));
    deltas.sort_by(|a, b| a.name.cmp(&b.name));
    deltas
}

/// `true` when every delta is [`DeltaKind::Unchanged`].
#[must_use]
pub fn is_converged(deltas: &[AttributeDelta]) -> bool {
    deltas.iter().all(|d| d.kind == DeltaKind::Unchanged)
}
