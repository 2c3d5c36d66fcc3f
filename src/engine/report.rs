//! Result reporter: assembles the outward-facing reconciliation result.
use serde::Serialize;

use super::diff::{AttributeDelta, DeltaKind};
use super::planner::Operation;
use super::policy::{SideEffect, TransitionCheck};
use crate::model::{CurrentState, Identity};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    /// Reconciled object.
    pub identity: Identity,
    /// `true` iff at least one operation was applied (or planned, on a dry run).
    pub changed: bool,
    /// State fetched before planning.
    pub before: Option<CurrentState>,
    /// State fetched after applying; `None` on a dry run or when the object is gone.
    pub after: Option<CurrentState>,
    /// Operations applied, or planned on a dry run.
    pub operations_applied: Vec<Operation>,
    /// Human-readable notes.
    pub diagnostics: Vec<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Assemble a result.  `changed` is derived from the operation list only.
#[must_use]
pub fn report(
    identity: Identity,
    before: Option<CurrentState>,
    after: Option<CurrentState>,
    operations: Vec<Operation>,
    diagnostics: Vec<String>,
    dry_run: bool,
) -> ReconciliationResult {
    ReconciliationResult {
        identity,
        changed: !operations.is_empty(),
        before,
        after,
        operations_applied: operations,
        diagnostics,
        dry_run,
    }
}

/// Diagnostic lines for a planned pass.
#[must_use]
pub fn describe(deltas: &[AttributeDelta], check: &TransitionCheck, dry_run: bool) -> Vec<String> {
    let mut lines: Vec<String> = deltas
        .iter()
        .filter(|d| d.kind != DeltaKind::Unchanged)
        .map(AttributeDelta::describe)
        .collect();
    match check.side_effect {
        SideEffect::None => {}
        SideEffect::Recreate => lines.push(format!(
            "{} -> {}: no in-place conversion, object is deleted and recreated",
            check.from_type.as_deref().unwrap_or("current"),
            check.to_type.as_deref().unwrap_or("desired"),
        )),
        SideEffect::ZoneTransfer => {
            lines.push("zone records will be replaced by a transfer from the masters".to_string());
        }
    }
    if dry_run && !lines.is_empty() {
        lines.push("dry run: nothing was applied".to_string());
    }
    lines
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::engine::policy::Strategy;
    use crate::model::ObjectKind;

    fn zone() -> Identity {
        Identity::DnsZone {
            name: "corp.example.com".to_string(),
        }
    }

    #[test]
    fn changed_follows_operations_not_state() {
        let before = Some(CurrentState::new(zone()));
        let r = report(zone(), before.clone(), before, Vec::new(), Vec::new(), false);
        assert!(!r.changed);
    }

    #[test]
    fn zone_transfer_is_described() {
        let check = TransitionCheck {
            kind: ObjectKind::DnsZone,
            identity: zone().to_string(),
            from_type: Some("primary".to_string()),
            to_type: Some("secondary".to_string()),
            allowed: true,
            required_attrs_missing: Vec::new(),
            forbidden_attrs_present: Vec::new(),
            strategy: Strategy::InPlace,
            side_effect: SideEffect::ZoneTransfer,
        };
        let lines = describe(&[], &check, true);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("transfer"));
        assert!(lines[1].starts_with("dry run"));
    }

    #[test]
    fn converged_pass_has_no_diagnostics() {
        let lines = describe(&[], &TransitionCheck::removal(&zone()), true);
        assert!(lines.is_empty());
    }
}
