pub mod memory;

use async_trait::async_trait;

use crate::errors::StoreResult;
use crate::resources::{Object, ObjectKey};

/// Store operations, used for call journals and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Create,
    Update,
    UpdateStatus,
    Delete,
}

impl Operation {
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Operation::Get)
    }
}

/// Contract of the shared object store.
///
/// - `get`           → `NotFound` when absent
/// - `create`        → `AlreadyExists` when the key is taken
/// - `update`        → conditional replace of the object (for tenants: the
///                     spec side only), `Conflict` when `expected_version` is stale
/// - `update_status` → conditional replace of a tenant's status sub-resource
/// - `delete`        → `NotFound` when absent; dependents whose controller
///                     is the deleted object are garbage collected by the store
///
/// Every successful write returns the stored object with its new
/// `resource_version`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> StoreResult<Object>;

    async fn create(&self, object: Object) -> StoreResult<Object>;

    async fn update(&self, object: Object, expected_version: u64) -> StoreResult<Object>;

    async fn update_status(&self, object: Object, expected_version: u64) -> StoreResult<Object>;

    async fn delete(&self, key: &ObjectKey) -> StoreResult<()>;
}
