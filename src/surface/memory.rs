//! In-memory management surface with failure injection.
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ManagementSurface, SurfaceError};
use crate::engine::{Operation, OperationKind};
use crate::model::{AttrValue, CurrentState, Identity, TYPE_ATTR};
use crate::schema;

/// Objects held in a map keyed by canonical identity.
///
/// Used by tests and as the backing store of the state-file surface.
/// Operations behave like their Windows counterparts: creating an existing
/// object is rejected, modifying or deleting a missing one is `NotFound`.
#[derive(Debug, Default)]
pub struct InMemorySurface {
    objects: Mutex<BTreeMap<String, CurrentState>>,
    executed: Mutex<Vec<Operation>>,
    failures: Vec<(OperationKind, String)>,
    fetch_failure: Option<String>,
    ignore_deletes: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemorySurface {
    /// Empty surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface pre-populated with `objects`.
    #[must_use]
    pub fn from_objects(objects: impl IntoIterator<Item = CurrentState>) -> Self {
        let map = objects
            .into_iter()
            .map(|o| (o.identity.canonical_key(), o))
            .collect();
        Self {
            objects: Mutex::new(map),
            ..Self::default()
        }
    }

    /// Add one object.
    #[must_use]
    pub fn with_object(self, object: CurrentState) -> Self {
        lock(&self.objects).insert(object.identity.canonical_key(), object);
        self
    }

    /// Fail every operation of `kind` with `reason`.
    #[must_use]
    pub fn fail_on(mut self, kind: OperationKind, reason: &str) -> Self {
        self.failures.push((kind, reason.to_string()));
        self
    }

    /// Fail every fetch with `reason`.
    #[must_use]
    pub fn fail_fetches(mut self, reason: &str) -> Self {
        self.fetch_failure = Some(reason.to_string());
        self
    }

    /// Report deletes as successful without removing anything.
    #[must_use]
    pub const fn ignore_deletes(mut self) -> Self {
        self.ignore_deletes = true;
        self
    }

    /// Operations executed successfully so far, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<Operation> {
        lock(&self.executed).clone()
    }

    /// Every stored object, ordered by canonical key.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CurrentState> {
        lock(&self.objects).values().cloned().collect()
    }

    fn apply(&self, op: &Operation) -> Result<(), SurfaceError> {
        let key = op.identity.canonical_key();
        let resource = op.identity.to_string();
        let mut objects = lock(&self.objects);
        match op.kind {
            OperationKind::Create => {
                if objects.contains_key(&key) {
                    return Err(SurfaceError::Rejected {
                        resource,
                        reason: "object already exists".to_string(),
                    });
                }
                let mut attrs = op.target_attrs.clone();
                if let Some(default) = schema::for_kind(op.identity.kind()).default_type {
                    attrs
                        .entry(TYPE_ATTR.to_string())
                        .or_insert_with(|| AttrValue::from(default));
                }
                objects.insert(
                    key,
                    CurrentState {
                        attrs,
                        ..CurrentState::new(op.identity.clone())
                    },
                );
            }
            OperationKind::Modify => {
                let object = objects
                    .get_mut(&key)
                    .ok_or(SurfaceError::NotFound { resource })?;
                for (name, value) in &op.target_attrs {
                    object.attrs.insert(name.clone(), value.clone());
                    object.unknown.remove(name);
                    object.at_default.remove(name);
                }
                // A reset leaves the platform default in place, not a gap.
                let kind_schema = schema::for_kind(op.identity.kind());
                for name in &op.reset_attrs {
                    let value = kind_schema
                        .option(name)
                        .map_or_else(|| AttrValue::Text(String::new()), |o| o.cleared_value());
                    object.attrs.insert(name.clone(), value);
                    object.unknown.remove(name);
                }
            }
            OperationKind::Delete => {
                if !objects.contains_key(&key) {
                    return Err(SurfaceError::NotFound { resource });
                }
                if !self.ignore_deletes {
                    objects.remove(&key);
                }
            }
            OperationKind::Recreate => {
                return Err(SurfaceError::UnsupportedOperation {
                    operation: op.kind.to_string(),
                    resource,
                });
            }
        }
        Ok(())
    }
}

impl ManagementSurface for InMemorySurface {
    fn fetch(&self, identity: &Identity) -> Result<Option<CurrentState>, SurfaceError> {
        if let Some(reason) = &self.fetch_failure {
            return Err(SurfaceError::Rejected {
                resource: identity.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(lock(&self.objects).get(&identity.canonical_key()).cloned())
    }

    fn execute(&self, operation: &Operation) -> Result<(), SurfaceError> {
        if let Some((_, reason)) = self.failures.iter().find(|(k, _)| *k == operation.kind) {
            return Err(SurfaceError::Rejected {
                resource: operation.identity.to_string(),
                reason: reason.clone(),
            });
        }
        self.apply(operation)?;
        lock(&self.executed).push(operation.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::engine::SideEffect;
    use crate::model::AttrMap;

    fn pkg() -> Identity {
        Identity::Package {
            id: "Git.Git".to_string(),
        }
    }

    fn op(kind: OperationKind, attrs: &[(&str, &str)]) -> Operation {
        Operation {
            kind,
            identity: pkg(),
            target_attrs: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), AttrValue::from(*v)))
                .collect::<AttrMap>(),
            reset_attrs: BTreeSet::new(),
            ordering_rank: 0,
            side_effect: SideEffect::None,
        }
    }

    #[test]
    fn create_modify_delete_lifecycle() {
        let s = InMemorySurface::new();
        s.execute(&op(OperationKind::Create, &[("version", "1.0")])).unwrap();
        s.execute(&op(OperationKind::Modify, &[("version", "2.0")])).unwrap();
        let c = s.fetch(&pkg()).unwrap().unwrap();
        assert_eq!(c.attrs["version"], AttrValue::from("2.0"));
        s.execute(&op(OperationKind::Delete, &[])).unwrap();
        assert!(s.fetch(&pkg()).unwrap().is_none());
        assert_eq!(s.executed().len(), 3);
    }

    #[test]
    fn create_of_existing_object_is_rejected() {
        let s = InMemorySurface::new().with_object(CurrentState::new(pkg()));
        let err = s.execute(&op(OperationKind::Create, &[])).unwrap_err();
        assert!(matches!(err, SurfaceError::Rejected { .. }));
    }

    #[test]
    fn modify_of_missing_object_is_not_found() {
        let s = InMemorySurface::new();
        let err = s.execute(&op(OperationKind::Modify, &[])).unwrap_err();
        assert!(matches!(err, SurfaceError::NotFound { .. }));
    }

    #[test]
    fn reset_stores_the_platform_default() {
        let s = InMemorySurface::new().with_object(
            CurrentState::new(pkg())
                .with_attr("source", "msstore")
                .with_attr("version", "1.0"),
        );
        let mut reset = op(OperationKind::Modify, &[]);
        reset.reset_attrs.insert("source".to_string());
        reset.reset_attrs.insert("version".to_string());
        s.execute(&reset).unwrap();
        let c = s.fetch(&pkg()).unwrap().unwrap();
        assert_eq!(c.attrs["source"], AttrValue::from("winget"));
        assert_eq!(c.attrs["version"], AttrValue::from(""));
    }

    #[test]
    fn injected_failure_is_not_recorded() {
        let s = InMemorySurface::new().fail_on(OperationKind::Create, "quota exceeded");
        let err = s.execute(&op(OperationKind::Create, &[])).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert!(s.executed().is_empty());
    }

    #[test]
    fn ignored_delete_leaves_object_in_place() {
        let s = InMemorySurface::new()
            .with_object(CurrentState::new(pkg()))
            .ignore_deletes();
        s.execute(&op(OperationKind::Delete, &[])).unwrap();
        assert!(s.fetch(&pkg()).unwrap().is_some());
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let s = InMemorySurface::from_objects([CurrentState::new(Identity::Package {
            id: "git.git".to_string(),
        })]);
        assert!(s.fetch(&pkg()).unwrap().is_some());
    }
}
