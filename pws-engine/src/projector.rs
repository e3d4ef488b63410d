//! Durable writes of the tenant record.
//!
//! Spec and status are separate sub-resources and are written separately,
//! each conditioned on the version the pass last saw. After every write the
//! in-memory record picks up the new version so the next write of the same
//! pass does not conflict with itself.

use pws_core::{Object, ObjectStore, TenantRecord};
use tracing::debug;

use crate::error::{AtStep, ReconcileError, ReconcileResult, Step};
use crate::naming::personal_workspace_name;

pub struct StatusProjector<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> StatusProjector<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Write `tenant.spec`.
    pub async fn persist_spec(&self, tenant: &mut TenantRecord) -> ReconcileResult<()> {
        let expected = tenant.metadata.resource_version;
        let stored = self
            .store
            .update(Object::Tenant(tenant.clone()), expected)
            .await
            .and_then(Object::into_tenant)
            .at(Step::PersistSpec, &tenant.identity)?;

        tenant.metadata.resource_version = stored.metadata.resource_version;
        debug!(
            "Persisted spec of {} at version {}",
            tenant.identity, tenant.metadata.resource_version
        );
        Ok(())
    }

    /// Write `tenant.status`. Refuses a mirror naming anything but the
    /// tenant's own derived workspace.
    pub async fn project_status(&self, tenant: &mut TenantRecord) -> ReconcileResult<()> {
        let mirror = &tenant.status.personal_workspace;
        if mirror.created && mirror.name != personal_workspace_name(&tenant.identity) {
            return Err(ReconcileError::invariant(
                &tenant.identity,
                format!("status names workspace {} which is not the tenant's own", mirror.name),
            ));
        }

        let expected = tenant.metadata.resource_version;
        let stored = self
            .store
            .update_status(Object::Tenant(tenant.clone()), expected)
            .await
            .and_then(Object::into_tenant)
            .at(Step::ProjectStatus, &tenant.identity)?;

        tenant.metadata.resource_version = stored.metadata.resource_version;
        debug!(
            "Projected status of {} at version {}",
            tenant.identity, tenant.metadata.resource_version
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pws_core::{
        MemoryStore, ObjectKey, ObjectKind, Operation, StoreError, TenantIdentity, WorkspaceRole,
    };

    fn seeded(store: &MemoryStore) -> TenantRecord {
        let tenant = TenantRecord::new(TenantIdentity::parse("a.b@c").unwrap());
        store.seed(tenant).into_tenant().unwrap()
    }

    #[tokio::test]
    async fn consecutive_writes_track_the_version() {
        let store = MemoryStore::new();
        let mut tenant = seeded(&store);
        let projector = StatusProjector::new(&store);

        tenant.spec.workspaces.push(pws_core::WorkspaceSubscription::new(
            "personal-a-b@c",
            WorkspaceRole::Manager,
        ));
        projector.persist_spec(&mut tenant).await.unwrap();
        tenant.status.personal_workspace.mark_created("personal-a-b@c");
        projector.project_status(&mut tenant).await.unwrap();

        let stored = store
            .snapshot(&ObjectKey::tenant("a.b@c"))
            .unwrap()
            .into_tenant()
            .unwrap();
        assert_eq!(stored.metadata.resource_version, tenant.metadata.resource_version);
        assert_eq!(stored.spec, tenant.spec);
        assert_eq!(stored.status, tenant.status);
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let store = MemoryStore::new();
        let mut tenant = seeded(&store);
        store.touch(&ObjectKey::tenant("a.b@c"));

        let err = StatusProjector::new(&store)
            .persist_spec(&mut tenant)
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(Step::PersistSpec));
        assert!(err.is_conflict());
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn refuses_foreign_workspace_in_status() {
        let store = MemoryStore::new();
        let mut tenant = seeded(&store);
        tenant.status.personal_workspace.mark_created("personal-someone-else");

        let err = StatusProjector::new(&store)
            .project_status(&mut tenant)
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::InvariantViolation { .. }));
        assert!(store.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn store_failures_carry_the_step() {
        let store = MemoryStore::new();
        let mut tenant = seeded(&store);
        store.fail_next(
            Operation::UpdateStatus,
            ObjectKind::Tenant,
            StoreError::unavailable("api down"),
        );

        let err = StatusProjector::new(&store)
            .project_status(&mut tenant)
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(Step::ProjectStatus));
        assert_eq!(err.store_error(), Some(&StoreError::unavailable("api down")));
    }
}
