use pws_core::{
    MemoryStore, Object, ObjectKey, ObjectKind, ObjectMeta, ObjectStore, Operation, PermissionGrant,
    Quantity, RoleRef, StoreError, Subject, TenantIdentity, TenantRecord, WorkspaceQuota,
    WorkspaceResource, WorkspaceRole, WorkspaceSpec,
};
use serde_json::json;

/// Test factory functions
fn tenant(identity: &str) -> TenantRecord {
    TenantRecord::new(TenantIdentity::parse(identity).unwrap())
}

fn workspace(name: &str) -> WorkspaceResource {
    WorkspaceResource {
        metadata: ObjectMeta::named(name),
        spec: WorkspaceSpec {
            pretty_name: "Test Workspace".to_string(),
            quota: WorkspaceQuota {
                cpu: Quantity::parse("2").unwrap(),
                memory: Quantity::parse("4Gi").unwrap(),
                instances: 2,
            },
        },
    }
}

fn grant(namespace: &str, subject: &str) -> PermissionGrant {
    PermissionGrant {
        metadata: ObjectMeta::namespaced(namespace, "manage-templates"),
        subjects: vec![Subject::user(subject)],
        role_ref: RoleRef::cluster_role("manage-templates"),
    }
}

/// S1. Absence is reported with the NotFound sentinel
#[tokio::test]
async fn test_get_missing_is_not_found() {
    let store = MemoryStore::new();

    let err = store.get(&ObjectKey::workspace("personal-a")).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err, StoreError::not_found(ObjectKind::Workspace, "personal-a"));
}

/// S2. Duplicate create is reported with the AlreadyExists sentinel
#[tokio::test]
async fn test_duplicate_create_is_already_exists() {
    let store = MemoryStore::new();
    store.create(workspace("personal-a").into()).await.unwrap();

    let err = store.create(workspace("personal-a").into()).await.unwrap_err();

    assert!(err.is_already_exists());
}

/// S3. Created objects get a version and a uid
#[tokio::test]
async fn test_create_assigns_version_and_uid() {
    let store = MemoryStore::new();

    let stored = store.create(workspace("personal-a").into()).await.unwrap();

    assert!(stored.meta().resource_version > 0);
    assert!(!stored.meta().uid.is_empty());
}

/// S4. Stale expected version is a Conflict and leaves the object alone
#[tokio::test]
async fn test_stale_update_conflicts() {
    let store = MemoryStore::new();
    let stored = store.seed(tenant("a"));
    let read_version = stored.meta().resource_version;
    store.touch(&ObjectKey::tenant("a")).unwrap();

    let mut changed = stored.into_tenant().unwrap();
    changed.spec.create_personal_workspace = true;
    let err = store.update(changed.into(), read_version).await.unwrap_err();

    assert!(err.is_conflict());
    let current = store.snapshot(&ObjectKey::tenant("a")).unwrap().into_tenant().unwrap();
    assert!(!current.spec.create_personal_workspace);
}

/// S5. Spec and status are written independently
#[tokio::test]
async fn test_spec_and_status_are_separate_sub_resources() {
    let store = MemoryStore::new();
    let stored = store.seed(tenant("a")).into_tenant().unwrap();

    // A spec update never touches status.
    let mut spec_write = stored.clone();
    spec_write
        .spec
        .workspaces
        .push(pws_core::WorkspaceSubscription::new("ws", WorkspaceRole::Viewer));
    spec_write.status.personal_workspace.created = true;
    let after_spec = store
        .update(spec_write.into(), stored.metadata.resource_version)
        .await
        .unwrap()
        .into_tenant()
        .unwrap();
    assert_eq!(after_spec.spec.workspaces.len(), 1);
    assert!(!after_spec.status.personal_workspace.created);

    // A status update never touches spec.
    let mut status_write = after_spec.clone();
    status_write.spec.workspaces.clear();
    status_write.status.personal_workspace.created = true;
    let after_status = store
        .update_status(status_write.into(), after_spec.metadata.resource_version)
        .await
        .unwrap()
        .into_tenant()
        .unwrap();
    assert_eq!(after_status.spec.workspaces.len(), 1);
    assert!(after_status.status.personal_workspace.created);
    assert!(after_status.metadata.resource_version > after_spec.metadata.resource_version);
}

/// S6. Only tenants have a status sub-resource
#[tokio::test]
async fn test_status_update_on_workspace_is_invalid() {
    let store = MemoryStore::new();
    let stored = store.seed(workspace("personal-a"));
    let version = stored.meta().resource_version;

    let err = store.update_status(stored, version).await.unwrap_err();

    assert!(matches!(err, StoreError::Invalid(_)));
}

/// S7. Deleting an owner garbage collects its controlled dependents
#[tokio::test]
async fn test_delete_owner_collects_dependents() {
    let store = MemoryStore::new();
    let owner = store.seed(tenant("a")).into_tenant().unwrap();

    let mut ws = workspace("personal-a");
    ws.metadata.set_controller(owner.controller_reference());
    store.seed(ws);

    let mut rb = grant("tenant-a", "a");
    rb.metadata.set_controller(owner.controller_reference());
    store.seed(rb);

    store.seed(workspace("shared"));

    store.delete(&ObjectKey::tenant("a")).await.unwrap();

    assert!(!store.contains(&ObjectKey::workspace("personal-a")));
    assert!(!store.contains(&ObjectKey::role_binding("tenant-a", "manage-templates")));
    assert!(store.contains(&ObjectKey::workspace("shared")));
}

/// S8. Deleting a missing object is NotFound
#[tokio::test]
async fn test_delete_missing_is_not_found() {
    let store = MemoryStore::new();

    let err = store
        .delete(&ObjectKey::role_binding("tenant-gone", "manage-templates"))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

/// S9. Injected faults fire once, on the matching call only
#[tokio::test]
async fn test_injected_fault_fires_once() {
    let store = MemoryStore::new();
    store.fail_next(Operation::Get, ObjectKind::Workspace, StoreError::timeout("slow"));

    store.get(&ObjectKey::tenant("a")).await.unwrap_err();
    let err = store.get(&ObjectKey::workspace("personal-a")).await.unwrap_err();
    assert_eq!(err, StoreError::timeout("slow"));

    let err = store.get(&ObjectKey::workspace("personal-a")).await.unwrap_err();
    assert!(err.is_not_found());
}

/// S10. A lost race leaves the winner's object in place
#[tokio::test]
async fn test_race_writes_winner_before_failing() {
    let store = MemoryStore::new();
    store.race_next(
        Operation::Create,
        ObjectKind::Workspace,
        workspace("personal-a"),
        StoreError::already_exists(ObjectKind::Workspace, "personal-a"),
    );

    let err = store.create(workspace("personal-a").into()).await.unwrap_err();

    assert!(err.is_already_exists());
    assert!(store.contains(&ObjectKey::workspace("personal-a")));
}

/// S11. The journal records every call, mutating or not
#[tokio::test]
async fn test_journal_tracks_calls() {
    let store = MemoryStore::new();
    let _ = store.get(&ObjectKey::workspace("personal-a")).await;
    store.create(workspace("personal-a").into()).await.unwrap();
    store.delete(&ObjectKey::workspace("personal-a")).await.unwrap();

    let ops: Vec<Operation> = store.calls().into_iter().map(|c| c.op).collect();
    assert_eq!(ops, vec![Operation::Get, Operation::Create, Operation::Delete]);
    assert_eq!(store.mutating_calls().len(), 2);

    store.clear_journal();
    assert!(store.calls().is_empty());
}

/// S12. Namespaced kinds need a namespace
#[tokio::test]
async fn test_create_checks_scope() {
    let store = MemoryStore::new();
    let mut rb = grant("tenant-a", "a");
    rb.metadata.namespace = None;

    let err = store.create(Object::RoleBinding(rb)).await.unwrap_err();

    assert!(matches!(err, StoreError::Invalid(_)));
}

/// S13. Persisted tenant layout
#[test]
fn test_tenant_serializes_with_persisted_layout() {
    let record = tenant("a.b@c")
        .with_personal_workspace(true)
        .with_subscription("personal-a-b@c", WorkspaceRole::Manager);

    let value = serde_json::to_value(&record).unwrap();

    assert_eq!(value["identity"], json!("a.b@c"));
    assert_eq!(value["spec"]["createPersonalWorkspace"], json!(true));
    assert_eq!(
        value["spec"]["workspaces"][0],
        json!({"name": "personal-a-b@c", "role": "Manager"})
    );
    assert_eq!(
        value["status"]["personalWorkspace"],
        json!({"created": false, "name": ""})
    );
    assert_eq!(
        value["status"]["binding"],
        json!({"created": false, "namespace": ""})
    );
}

/// S14. Invalid identities are rejected on the way in
#[test]
fn test_tenant_rejects_invalid_identity_on_deserialize() {
    let mut value = serde_json::to_value(tenant("a")).unwrap();
    value["identity"] = json!("a-b");

    assert!(serde_json::from_value::<TenantRecord>(value).is_err());
}
