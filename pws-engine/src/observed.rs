//! Reads the current state a pass converges from.
//!
//! "Not found" is an observation of absence, never an error; every other
//! store failure is handed back unchanged.

use pws_core::{
    Object, ObjectKey, ObjectStore, PermissionGrant, StoreResult, StoreResultExt, TenantRecord,
    WorkspaceResource, WorkspaceRole, WorkspaceSubscription,
};

use crate::error::{AtStep, ReconcileError, ReconcileResult, Step};

/// Snapshot taken at the start of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedState {
    pub workspace: Option<WorkspaceResource>,
    /// Position and role of the subscription to the personal workspace.
    pub subscription: Option<(usize, WorkspaceRole)>,
}

impl ObservedState {
    pub fn workspace_exists(&self) -> bool {
        self.workspace.is_some()
    }
}

pub async fn read_workspace(
    store: &dyn ObjectStore,
    name: &str,
) -> StoreResult<Option<WorkspaceResource>> {
    store
        .get(&ObjectKey::workspace(name))
        .await
        .found()?
        .map(Object::into_workspace)
        .transpose()
}

pub async fn workspace_exists(store: &dyn ObjectStore, name: &str) -> StoreResult<bool> {
    Ok(read_workspace(store, name).await?.is_some())
}

pub async fn read_grant(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
) -> StoreResult<Option<PermissionGrant>> {
    store
        .get(&ObjectKey::role_binding(namespace, name))
        .await
        .found()?
        .map(Object::into_role_binding)
        .transpose()
}

/// Index and role of the entry named `name`, if any.
pub fn current_role(
    subscriptions: &[WorkspaceSubscription],
    name: &str,
) -> Option<(usize, WorkspaceRole)> {
    subscriptions
        .iter()
        .position(|s| s.name == name)
        .map(|index| (index, subscriptions[index].role))
}

/// Read the workspace and locate the tenant's subscription to it.
pub async fn observe(
    store: &dyn ObjectStore,
    tenant: &TenantRecord,
    name: &str,
) -> ReconcileResult<ObservedState> {
    let duplicates = tenant
        .spec
        .workspaces
        .iter()
        .filter(|s| s.name == name)
        .count();
    if duplicates > 1 {
        return Err(ReconcileError::invariant(
            &tenant.identity,
            format!("{duplicates} subscriptions to {name}, names must be unique"),
        ));
    }

    let workspace = read_workspace(store, name)
        .await
        .at(Step::ReadWorkspace, &tenant.identity)?;

    Ok(ObservedState {
        workspace,
        subscription: current_role(&tenant.spec.workspaces, name),
    })
}
