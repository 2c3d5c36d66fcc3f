//! Desired-state reconciliation engine.
//!
//! One pass over one object runs leaf-first through five components:
//!
//! - [`diff`]: current vs desired record to typed deltas
//! - [`policy`]: transition legality, strategy and side effects
//! - [`planner`]: deltas plus the transition check to ordered operations
//! - [`adapter`]: runs the operations against the [`ManagementSurface`]
//! - [`report`]: assembles the [`ReconciliationResult`]
//!
//! [`Reconciler`] wires them together; [`reconcile_all`] runs a batch of
//! independent objects, optionally on a rayon pool.
pub mod adapter;
pub mod diff;
pub mod planner;
pub mod policy;
pub mod report;

use std::sync::Arc;

use rayon::prelude::*;

pub use diff::{AttributeDelta, DeltaKind, OBJECT_DELTA, diff};
pub use planner::{Operation, OperationKind, plan};
pub use policy::{SideEffect, Strategy, TransitionCheck, TransitionRule, TypeRule, validate};
pub use report::ReconciliationResult;

use crate::error::EngineError;
use crate::logging::{BufferedLog, Log, Logger, ObjectStatus};
use crate::model::{CurrentState, DesiredState};
use crate::schema::gpo;
use crate::surface::ManagementSurface;

/// Runs single reconciliation passes against one surface.
///
/// Holds no mutable state; one instance may be shared by many threads.
pub struct Reconciler<'a> {
    surface: &'a dyn ManagementSurface,
    dry_run: bool,
}

impl std::fmt::Debug for Reconciler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl<'a> Reconciler<'a> {
    /// Reconciler that applies changes.
    #[must_use]
    pub const fn new(surface: &'a dyn ManagementSurface) -> Self {
        Self {
            surface,
            dry_run: false,
        }
    }

    /// Stop after planning and report the planned operations.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether this reconciler only plans.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Validate, fetch, diff, check, plan, apply and report one object.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] / [`EngineError::Policy`] before any mutation.
    /// - [`EngineError::Query`] if the initial fetch fails.
    /// - [`EngineError::NotFound`] if the object cannot be created by its
    ///   identity or vanished before a modify.
    /// - [`EngineError::ConvergenceFailed`] on a mid-sequence surface failure.
    pub fn reconcile(&self, desired: &DesiredState) -> Result<ReconciliationResult, EngineError> {
        let desired = &policy::check_attributes(desired)?;
        let identity = &desired.identity;

        let before = self
            .surface
            .fetch(identity)
            .map_err(|source| EngineError::Query {
                identity: identity.to_string(),
                source,
            })?;

        if desired.wants_present() && before.is_none() && gpo::is_uncreatable(identity) {
            return Err(EngineError::NotFound {
                identity: identity.to_string(),
                reason: "objects addressed by guid cannot be created; address it by name and domain"
                    .to_string(),
            });
        }

        let deltas = diff(before.as_ref(), desired);
        let check = if desired.wants_present() {
            validate(
                identity,
                before.as_ref().and_then(CurrentState::object_type),
                desired.object_type(),
                &desired.attrs,
                before.is_none(),
            )
            .with_changed_attributes(&deltas)
            .into_result()?
        } else {
            TransitionCheck::removal(identity)
        };

        let operations = plan(desired, before.as_ref(), &deltas, &check);
        let diagnostics = report::describe(&deltas, &check, self.dry_run);

        if self.dry_run {
            return Ok(report::report(
                identity.clone(),
                before,
                None,
                operations,
                diagnostics,
                true,
            ));
        }

        let after = if operations.is_empty() {
            before.clone()
        } else {
            adapter::apply(self.surface, identity, &operations)?
        };
        Ok(report::report(
            identity.clone(),
            before,
            after,
            operations,
            diagnostics,
            false,
        ))
    }
}

/// Reconcile one object and log its outcome.
fn reconcile_logged(
    reconciler: &Reconciler<'_>,
    desired: &DesiredState,
    log: &dyn Log,
) -> Result<ReconciliationResult, EngineError> {
    let name = desired.identity.to_string();
    log.debug(&format!("reconciling {name}"));
    let outcome = reconciler.reconcile(desired);
    match &outcome {
        Ok(result) if result.dry_run && result.changed => {
            for op in &result.operations_applied {
                log.dry_run(&format!("would {}", op.summary()));
            }
            for line in &result.diagnostics {
                log.debug(line);
            }
            log.record_object(&name, ObjectStatus::DryRun, None);
        }
        Ok(result) if result.changed => {
            for line in &result.diagnostics {
                log.info(&format!("{name}: {line}"));
            }
            let count = result.operations_applied.len();
            log.record_object(
                &name,
                ObjectStatus::Changed,
                Some(&format!("{count} operation(s)")),
            );
        }
        Ok(_) => {
            log.debug(&format!("{name}: already converged"));
            log.record_object(&name, ObjectStatus::Unchanged, None);
        }
        Err(e) => {
            log.error(&format!("{name}: {e}"));
            if let EngineError::ConvergenceFailed(failure) = e {
                for op in &failure.operations_applied {
                    log.warn(&format!("{name}: completed before failure: {}", op.summary()));
                }
            }
            log.record_object(&name, ObjectStatus::Failed, Some(&e.to_string()));
        }
    }
    outcome
}

/// Reconcile a batch of independent objects.
///
/// With `parallel` set each object runs on the rayon pool with its own
/// [`BufferedLog`], flushed when the object finishes.  Results are returned in
/// input order either way.
#[must_use]
pub fn reconcile_all(
    reconciler: &Reconciler<'_>,
    desired: &[DesiredState],
    parallel: bool,
    log: &Arc<Logger>,
) -> Vec<Result<ReconciliationResult, EngineError>> {
    if !parallel || desired.len() < 2 {
        return desired
            .iter()
            .map(|d| reconcile_logged(reconciler, d, log.as_ref()))
            .collect();
    }

    desired
        .par_iter()
        .map(|d| {
            let name = d.identity.to_string();
            log.notify_object_start(&name);
            let buffered = BufferedLog::new(Arc::clone(log));
            let outcome = reconcile_logged(reconciler, d, &buffered);
            buffered.flush_and_complete(&name);
            outcome
        })
        .collect()
}
