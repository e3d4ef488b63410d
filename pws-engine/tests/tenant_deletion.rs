//! Cleanup once a tenant record is deleted or on its way out.

use std::sync::Arc;

use pws_core::{
    MemoryStore, ObjectKey, ObjectStore, TenantIdentity, TenantRecord, WorkspaceRole,
};
use pws_engine::templates::{manage_templates_grant, personal_workspace};
use pws_engine::{Applied, Direction, EngineConfig, PersonalWorkspaceReconciler};

const GRANT: &str = "pws-manage-templates";

fn identity(raw: &str) -> TenantIdentity {
    TenantIdentity::parse(raw).unwrap()
}

fn reconciler(store: &MemoryStore) -> PersonalWorkspaceReconciler {
    PersonalWorkspaceReconciler::new(Arc::new(store.clone()), EngineConfig::default())
}

async fn enabled_tenant(store: &MemoryStore, raw: &str, namespace: &str) {
    let record = TenantRecord::new(identity(raw))
        .with_personal_workspace(true)
        .with_namespace(namespace);
    store.seed(record);
    reconciler(store).reconcile(&identity(raw)).await.unwrap();
    assert!(store.contains(&ObjectKey::role_binding(namespace, GRANT)));
}

#[tokio::test]
async fn reconcile_enforces_live_tenant() {
    let store = MemoryStore::new();
    store.seed(
        TenantRecord::new(identity("a.b"))
            .with_personal_workspace(true)
            .with_namespace("tenant-a-b")
            .with_subscription("team", WorkspaceRole::Viewer),
    );

    let report = reconciler(&store).reconcile(&identity("a.b")).await.unwrap();

    assert_eq!(report.direction, Direction::Enable);
    assert!(report.contains(&Applied::WorkspaceCreated));
    let stored = store
        .snapshot(&ObjectKey::tenant("a.b"))
        .unwrap()
        .into_tenant()
        .unwrap();
    assert_eq!(stored.spec.workspaces.len(), 2);
    assert_eq!(stored.spec.workspaces[0].name, "team");
    assert_eq!(stored.spec.workspaces[1].name, "personal-a-b");
}

#[tokio::test]
async fn tenant_marked_for_deletion_is_cleaned_up() {
    let store = MemoryStore::new();
    enabled_tenant(&store, "a", "ns-a").await;
    store.mark_for_deletion(&ObjectKey::tenant("a"));
    store.clear_journal();

    let report = reconciler(&store).reconcile(&identity("a")).await.unwrap();

    assert_eq!(report.direction, Direction::Cleanup);
    assert_eq!(report.applied, vec![Applied::WorkspaceDeleted, Applied::GrantDeleted]);
    assert!(!store.contains(&ObjectKey::workspace("personal-a")));
    assert!(!store.contains(&ObjectKey::role_binding("ns-a", GRANT)));
    // The record itself belongs to whoever deletes it.
    assert!(store.contains(&ObjectKey::tenant("a")));
}

#[tokio::test]
async fn deleting_the_record_collects_owned_objects() {
    let store = MemoryStore::new();
    enabled_tenant(&store, "a", "tenant-a").await;

    store.delete(&ObjectKey::tenant("a")).await.unwrap();

    assert!(store.is_empty());
    let report = reconciler(&store).reconcile(&identity("a")).await.unwrap();
    assert_eq!(report.direction, Direction::Cleanup);
    assert!(report.is_noop());
}

#[tokio::test]
async fn leftovers_of_a_vanished_tenant_are_removed() {
    let store = MemoryStore::new();
    let config = EngineConfig::default();
    let ghost = TenantRecord::new(identity("g.h")).with_namespace("tenant-g-h");
    store.seed(personal_workspace(&ghost, "personal-g-h", &config));
    store.seed(manage_templates_grant(&ghost, "tenant-g-h", &config));

    let report = reconciler(&store).reconcile(&identity("g.h")).await.unwrap();

    assert_eq!(report.applied, vec![Applied::WorkspaceDeleted, Applied::GrantDeleted]);
    assert!(store.is_empty());
}

#[tokio::test]
async fn cleanup_honours_an_explicit_namespace() {
    let store = MemoryStore::new();
    let config = EngineConfig::default();
    let ghost = TenantRecord::new(identity("g"));
    store.seed(manage_templates_grant(&ghost, "custom", &config));

    let report = reconciler(&store)
        .cleanup_deleted_tenant(&identity("g"), Some("custom"))
        .await
        .unwrap();

    assert_eq!(report.applied, vec![Applied::GrantDeleted]);
    assert!(store.is_empty());
}
