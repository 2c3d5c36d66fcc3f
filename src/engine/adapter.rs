//! Execution adapter: runs planned operations against a surface, in order.
use super::planner::{Operation, OperationKind};
use crate::error::{ConvergenceFailure, EngineError, PartialState};
use crate::model::{CurrentState, Identity};
use crate::surface::ManagementSurface;

/// Execute `operations` strictly in order and return the post-apply state.
///
/// After a delete the object must be gone before the next step runs; before
/// a modify it must still exist.  The first failure stops the sequence.  A
/// failed verification query after the last operation is reported with
/// `step` equal to the number of operations.  Nothing is retried.
///
/// # Errors
///
/// - [`EngineError::NotFound`] if a modify targets an object that vanished.
/// - [`EngineError::ConvergenceFailed`] for any other mid-sequence failure,
///   carrying the completed operations and a best-effort re-query.
pub fn apply(
    surface: &dyn ManagementSurface,
    identity: &Identity,
    operations: &[Operation],
) -> Result<Option<CurrentState>, EngineError> {
    let mut applied: Vec<Operation> = Vec::with_capacity(operations.len());
    let fail = |step: usize, kind: OperationKind, reason: String, applied: Vec<Operation>| {
        EngineError::ConvergenceFailed(Box::new(ConvergenceFailure {
            identity: identity.to_string(),
            step,
            operation: kind,
            reason,
            operations_applied: applied,
            state: requery(surface, identity),
        }))
    };

    for (step, op) in operations.iter().enumerate() {
        if op.kind == OperationKind::Recreate {
            return Err(fail(
                step,
                op.kind,
                "recreate must be planned as delete + create".to_string(),
                applied,
            ));
        }
        if op.kind == OperationKind::Modify {
            match surface.fetch(identity) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    return Err(EngineError::NotFound {
                        identity: identity.to_string(),
                        reason: format!(
                            "step {step} (modify) requires an existing object; {} operation(s) completed",
                            applied.len()
                        ),
                    });
                }
                Err(e) => return Err(fail(step, op.kind, e.to_string(), applied)),
            }
        }

        if let Err(e) = surface.execute(op) {
            return Err(fail(step, op.kind, e.to_string(), applied));
        }

        if op.kind == OperationKind::Delete {
            match surface.fetch(identity) {
                Ok(None) => {}
                Ok(Some(_)) => {
                    return Err(fail(
                        step,
                        op.kind,
                        "object still present after delete".to_string(),
                        applied,
                    ));
                }
                Err(e) => return Err(fail(step, op.kind, e.to_string(), applied)),
            }
        }
        applied.push(op.clone());
    }

    surface.fetch(identity).map_err(|e| {
        let last = operations.last().map_or(OperationKind::Modify, |o| o.kind);
        fail(
            operations.len(),
            last,
            format!("post-apply query failed: {e}"),
            applied,
        )
    })
}

fn requery(surface: &dyn ManagementSurface, identity: &Identity) -> PartialState {
    surface
        .fetch(identity)
        .map_or_else(|e| PartialState::Unavailable(e.to_string()), PartialState::Observed)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeSet;

    use mockall::Sequence;
    use mockall::predicate::always;

    use super::*;
    use crate::engine::SideEffect;
    use crate::model::AttrMap;
    use crate::surface::{MockManagementSurface, SurfaceError};

    fn zone() -> Identity {
        Identity::DnsZone {
            name: "corp.example.com".to_string(),
        }
    }

    fn op(kind: OperationKind, rank: usize) -> Operation {
        Operation {
            kind,
            identity: zone(),
            target_attrs: AttrMap::new(),
            reset_attrs: BTreeSet::new(),
            ordering_rank: rank,
            side_effect: SideEffect::Recreate,
        }
    }

    fn present() -> Option<CurrentState> {
        Some(CurrentState::new(zone()).with_attr("type", "forwarder"))
    }

    #[test]
    fn delete_then_create_runs_in_order() {
        let mut surface = MockManagementSurface::new();
        let mut seq = Sequence::new();
        surface
            .expect_execute()
            .withf(|o| o.kind == OperationKind::Delete)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        surface
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        surface
            .expect_execute()
            .withf(|o| o.kind == OperationKind::Create)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        surface
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(present()));

        let ops = vec![op(OperationKind::Delete, 0), op(OperationKind::Create, 1)];
        let after = apply(&surface, &zone(), &ops).unwrap();
        assert_eq!(after, present());
    }

    #[test]
    fn failure_reports_step_and_completed_operations() {
        let mut surface = MockManagementSurface::new();
        let mut seq = Sequence::new();
        surface
            .expect_execute()
            .withf(|o| o.kind == OperationKind::Delete)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        surface
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        surface
            .expect_execute()
            .withf(|o| o.kind == OperationKind::Create)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(SurfaceError::Rejected {
                    resource: "dns_zone corp.example.com".to_string(),
                    reason: "access denied".to_string(),
                })
            });
        // best-effort re-query
        surface
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));

        let ops = vec![op(OperationKind::Delete, 0), op(OperationKind::Create, 1)];
        let err = apply(&surface, &zone(), &ops).unwrap_err();
        let EngineError::ConvergenceFailed(failure) = err else {
            panic!("expected convergence failure, got {err:?}");
        };
        assert_eq!(failure.step, 1);
        assert_eq!(failure.operation, OperationKind::Create);
        assert_eq!(failure.operations_applied.len(), 1);
        assert_eq!(failure.operations_applied[0].kind, OperationKind::Delete);
        assert_eq!(failure.state, PartialState::Observed(None));
        assert!(failure.reason.contains("access denied"));
    }

    #[test]
    fn object_still_present_after_delete_fails_the_step() {
        let mut surface = MockManagementSurface::new();
        surface.expect_execute().times(1).returning(|_| Ok(()));
        surface.expect_fetch().times(2).returning(|_| Ok(present()));

        let ops = vec![op(OperationKind::Delete, 0), op(OperationKind::Create, 1)];
        let err = apply(&surface, &zone(), &ops).unwrap_err();
        let EngineError::ConvergenceFailed(failure) = err else {
            panic!("expected convergence failure");
        };
        assert_eq!(failure.step, 0);
        assert!(failure.operations_applied.is_empty());
        assert!(failure.reason.contains("still present"));
    }

    #[test]
    fn modify_of_vanished_object_is_not_found() {
        let mut surface = MockManagementSurface::new();
        surface.expect_fetch().times(1).returning(|_| Ok(None));
        surface.expect_execute().never();

        let err = apply(&surface, &zone(), &[op(OperationKind::Modify, 0)]).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }), "got {err:?}");
    }

    #[test]
    fn failed_requery_is_reported_as_unavailable() {
        let mut surface = MockManagementSurface::new();
        surface
            .expect_execute()
            .with(always())
            .times(1)
            .returning(|_| {
                Err(SurfaceError::ExecutionFailed {
                    program: "pwsh".to_string(),
                    exit_code: 1,
                    stderr: "boom".to_string(),
                })
            });
        surface.expect_fetch().times(1).returning(|_| {
            Err(SurfaceError::Spawn {
                program: "pwsh".to_string(),
                message: "gone".to_string(),
            })
        });

        let err = apply(&surface, &zone(), &[op(OperationKind::Create, 0)]).unwrap_err();
        let EngineError::ConvergenceFailed(failure) = err else {
            panic!("expected convergence failure");
        };
        assert!(matches!(failure.state, PartialState::Unavailable(ref m) if m.contains("gone")));
    }

    #[test]
    fn recreate_marker_is_never_executed() {
        let mut surface = MockManagementSurface::new();
        surface.expect_execute().never();
        surface.expect_fetch().returning(|_| Ok(present()));

        let err = apply(&surface, &zone(), &[op(OperationKind::Recreate, 0)]).unwrap_err();
        assert!(matches!(err, EngineError::ConvergenceFailed(_)));
    }
}
