//! pws-core: store-facing core for personal workspace convergence.
//!
//! Holds the tenant record, the objects a pass manages, the tagged
//! [`StoreError`] every store call reports through, and the
//! [`ObjectStore`] contract with an in-memory implementation.

pub mod config;
pub mod errors;
pub mod resources;
pub mod store;
pub mod tenant;

pub use config::{ConfigError, Settings, SettingsSnapshot};
pub use errors::{ErrorKind, StoreError, StoreResult, StoreResultExt};
pub use resources::{
    Object, ObjectKey, ObjectKind, ObjectMeta, OwnerReference, PermissionGrant, Quantity,
    QuantityError, RoleRef, Subject, WorkspaceQuota, WorkspaceResource, WorkspaceSpec,
};
pub use store::memory::{MemoryStore, StoreCall};
pub use store::{ObjectStore, Operation};
pub use tenant::{
    BindingStatus, IdentityError, NamespaceStatus, PersonalWorkspaceStatus, TenantIdentity,
    TenantRecord, TenantSpec, TenantStatus, WorkspaceRole, WorkspaceSubscription,
};
