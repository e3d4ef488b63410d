//! Builds the objects a pass creates, and reasserts fields on ones that
//! already exist.

use pws_core::{
    ObjectMeta, PermissionGrant, RoleRef, Subject, TenantRecord, WorkspaceResource, WorkspaceSpec,
};

use crate::config::{
    EngineConfig, MANAGED_BY_LABEL, MANAGED_BY_TENANT, PERSONAL_WORKSPACE_TYPE,
    WORKSPACE_TYPE_LABEL,
};

/// `"<first name>'s Personal Workspace"`, or the identity when the tenant
/// never gave a first name.
pub fn pretty_name(tenant: &TenantRecord) -> String {
    match tenant.spec.first_name.as_deref().map(str::trim) {
        Some(first) if !first.is_empty() => format!("{first}'s Personal Workspace"),
        _ => tenant.identity.to_string(),
    }
}

pub fn personal_workspace(tenant: &TenantRecord, name: &str, config: &EngineConfig) -> WorkspaceResource {
    let mut metadata = ObjectMeta::named(name)
        .with_label(WORKSPACE_TYPE_LABEL, PERSONAL_WORKSPACE_TYPE)
        .with_label(&config.target_label.key, &config.target_label.value);
    metadata.set_controller(tenant.controller_reference());

    WorkspaceResource {
        metadata,
        spec: WorkspaceSpec {
            pretty_name: pretty_name(tenant),
            quota: config.quota.clone(),
        },
    }
}

/// Grant letting the tenant manage templates in its private namespace.
pub fn manage_templates_grant(
    tenant: &TenantRecord,
    namespace: &str,
    config: &EngineConfig,
) -> PermissionGrant {
    let mut metadata = ObjectMeta::namespaced(namespace, &config.grant_name)
        .with_label(&config.target_label.key, &config.target_label.value)
        .with_label(MANAGED_BY_LABEL, MANAGED_BY_TENANT);
    metadata.set_controller(tenant.controller_reference());

    PermissionGrant {
        metadata,
        subjects: vec![Subject::user(tenant.identity.as_str())],
        role_ref: RoleRef::cluster_role(&config.cluster_role),
    }
}

/// Bring `current` in line with `desired`, leaving labels set by others
/// in place. Returns true if anything changed.
pub fn reassert_grant(current: &mut PermissionGrant, desired: &PermissionGrant) -> bool {
    let mut changed = false;

    for (key, value) in &desired.metadata.labels {
        if current.metadata.labels.get(key) != Some(value) {
            current.metadata.labels.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    if current.subjects != desired.subjects {
        current.subjects = desired.subjects.clone();
        changed = true;
    }
    if current.role_ref != desired.role_ref {
        current.role_ref = desired.role_ref.clone();
        changed = true;
    }
    if let Some(owner) = desired.metadata.controller() {
        if current.metadata.controller() != Some(owner) {
            current.metadata.set_controller(owner.clone());
            changed = true;
        }
    }

    changed
}
