//! Convergence planner: deltas plus a transition check to ordered operations.
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::diff::{AttributeDelta, DeltaKind};
use super::policy::{SideEffect, Strategy, TransitionCheck, type_rules};
use crate::model::{AttrMap, AttrValue, CurrentState, DesiredState, Identity, TYPE_ATTR};
use crate::schema;

/// Kind of a planned operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Create the object with `target_attrs`.
    Create,
    /// Set `target_attrs` and reset `reset_attrs` on an existing object.
    Modify,
    /// Remove the object.
    Delete,
    /// Marker only: always materialized as a delete + create pair.
    Recreate,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
            Self::Recreate => "recreate",
        })
    }
}

/// One planned mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    /// What to do.
    pub kind: OperationKind,
    /// Target object.
    pub identity: Identity,
    /// Attributes to set.
    pub target_attrs: AttrMap,
    /// Attributes to reset to platform defaults.
    pub reset_attrs: BTreeSet<String>,
    /// Position in the plan, starting at 0.
    pub ordering_rank: usize,
    /// Side effect the operation is part of.
    pub side_effect: SideEffect,
}

impl Operation {
    /// Requested type carried by this operation, if any.
    #[must_use]
    pub fn target_type(&self) -> Option<&str> {
        self.target_attrs.get(TYPE_ATTR).and_then(AttrValue::as_text)
    }

    /// One-line description for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut names: Vec<&str> = self.target_attrs.keys().map(String::as_str).collect();
        names.extend(self.reset_attrs.iter().map(String::as_str));
        if names.is_empty() {
            format!("{} {}", self.kind, self.identity)
        } else {
            format!("{} {} [{}]", self.kind, self.identity, names.join(", "))
        }
    }
}

/// Produce the ordered operations that converge `current` onto `desired`.
///
/// At most one `modify` is emitted.  A recreate is always a `delete` followed
/// by a `create`; the create carries the desired attributes plus every current
/// attribute the desired state omits and the target type does not forbid.
#[must_use]
pub fn plan(
    desired: &DesiredState,
    current: Option<&CurrentState>,
    deltas: &[AttributeDelta],
    check: &TransitionCheck,
) -> Vec<Operation> {
    let identity = &desired.identity;
    let op = |kind, target_attrs, reset_attrs, side_effect| Operation {
        kind,
        identity: identity.clone(),
        target_attrs,
        reset_attrs,
        ordering_rank: 0,
        side_effect,
    };

    let mut ops = match (current, desired.wants_present()) {
        (None, false) => Vec::new(),
        (Some(_), false) => vec![op(
            OperationKind::Delete,
            AttrMap::new(),
            BTreeSet::new(),
            SideEffect::None,
        )],
        (None, true) => vec![op(
            OperationKind::Create,
            create_attrs(desired, check, None),
            BTreeSet::new(),
            SideEffect::None,
        )],
        (Some(current), true) if check.strategy == Strategy::Recreate => vec![
            op(
                OperationKind::Delete,
                AttrMap::new(),
                BTreeSet::new(),
                SideEffect::Recreate,
            ),
            op(
                OperationKind::Create,
                create_attrs(desired, check, Some(current)),
                BTreeSet::new(),
                SideEffect::Recreate,
            ),
        ],
        (Some(_), true) => {
            let mut targets = AttrMap::new();
            let mut resets = BTreeSet::new();
            for delta in deltas.iter().filter(|d| !d.is_object()) {
                match (delta.kind, &delta.desired) {
                    (DeltaKind::Add | DeltaKind::Change, Some(value)) => {
                        targets.insert(delta.name.clone(), value.clone());
                    }
                    (DeltaKind::Remove, _) => {
                        resets.insert(delta.name.clone());
                    }
                    _ => {}
                }
            }
            if targets.is_empty() && resets.is_empty() {
                Vec::new()
            } else {
                vec![op(OperationKind::Modify, targets, resets, check.side_effect)]
            }
        }
    };

    for (rank, operation) in ops.iter_mut().enumerate() {
        operation.ordering_rank = rank;
    }
    ops
}

/// Attributes for a create: desired attributes, the default type when the
/// kind is typed, and on recreate the carried-over current attributes.
fn create_attrs(
    desired: &DesiredState,
    check: &TransitionCheck,
    current: Option<&CurrentState>,
) -> AttrMap {
    let mut attrs = desired.attrs.clone();
    if let Some(to) = &check.to_type {
        attrs
            .entry(TYPE_ATTR.to_string())
            .or_insert_with(|| AttrValue::from(to.as_str()));
    }
    let Some(current) = current else {
        return attrs;
    };
    let forbidden: &[&str] = check
        .to_type
        .as_deref()
        .and_then(|t| {
            type_rules(desired.kind())
                .iter()
                .find(|r| r.object_type == t)
        })
        .map(|r| r.forbidden)
        .unwrap_or_default();
    let recognized = schema::for_kind(desired.kind());
    for (name, value) in &current.attrs {
        if attrs.contains_key(name)
            || desired.resets.contains(name)
            || forbidden.contains(&name.as_str())
            || !recognized.recognizes(name)
        {
            continue;
        }
        attrs.insert(name.clone(), value.clone());
    }
    attrs
}
