//! Objects kept in the store: metadata, owner links, the personal
//! workspace resource and the namespace-scoped permission grant.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{StoreError, StoreResult};
use crate::tenant::TenantRecord;

/// The kinds of object the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Tenant,
    Workspace,
    RoleBinding,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Tenant => "Tenant",
            ObjectKind::Workspace => "Workspace",
            ObjectKind::RoleBinding => "RoleBinding",
        }
    }

    pub fn is_namespaced(&self) -> bool {
        matches!(self, ObjectKind::RoleBinding)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of an object in the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub kind: ObjectKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn tenant(name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Tenant,
            namespace: None,
            name: name.into(),
        }
    }

    pub fn workspace(name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Workspace,
            namespace: None,
            name: name.into(),
        }
    }

    pub fn role_binding(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::RoleBinding,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Link from a dependent object to the object responsible for its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub kind: ObjectKind,
    pub name: String,
    pub uid: String,
    /// At most one owner of an object is its controller.
    pub controller: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Assigned by the store; zero until the object is first persisted.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// The controlling owner, if any.
    pub fn controller(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }

    /// Replace the controller reference, keeping non-controller owners.
    pub fn set_controller(&mut self, owner: OwnerReference) {
        self.owner_references.retain(|r| !r.controller);
        self.owner_references.push(OwnerReference {
            controller: true,
            ..owner
        });
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid quantity {0:?}")]
pub struct QuantityError(pub String);

/// A resource quantity such as `2`, `500m` or `4Gi`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity(String);

const QUANTITY_SUFFIXES: &[&str] = &[
    "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "n", "u", "m", "k", "M", "G", "T", "P", "E",
];

impl Quantity {
    pub fn parse(raw: &str) -> Result<Self, QuantityError> {
        let digits = QUANTITY_SUFFIXES
            .iter()
            .find_map(|suffix| raw.strip_suffix(suffix))
            .unwrap_or(raw);

        let mut parts = digits.splitn(2, '.');
        let whole = parts.next().unwrap_or_default();
        let fraction = parts.next();

        let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        let valid = match fraction {
            None => is_number(whole),
            Some(frac) => is_number(frac) && (whole.is_empty() || is_number(whole)),
        };

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(QuantityError(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Quantity {
    type Error = QuantityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceQuota {
    pub cpu: Quantity,
    pub memory: Quantity,
    pub instances: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSpec {
    pub pretty_name: String,
    pub quota: WorkspaceQuota,
}

/// A cluster-scoped workspace: a bounded allocation a tenant can use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceResource {
    pub metadata: ObjectMeta,
    pub spec: WorkspaceSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub kind: String,
    pub name: String,
}

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: "User".to_string(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub kind: String,
    pub name: String,
}

impl RoleRef {
    pub fn cluster_role(name: impl Into<String>) -> Self {
        Self {
            kind: "ClusterRole".to_string(),
            name: name.into(),
        }
    }
}

/// A namespace-scoped binding of one identity to a fixed role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    pub metadata: ObjectMeta,
    pub subjects: Vec<Subject>,
    pub role_ref: RoleRef,
}

/// Any object the store can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Tenant(TenantRecord),
    Workspace(WorkspaceResource),
    RoleBinding(PermissionGrant),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Tenant(_) => ObjectKind::Tenant,
            Object::Workspace(_) => ObjectKind::Workspace,
            Object::RoleBinding(_) => ObjectKind::RoleBinding,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Object::Tenant(t) => &t.metadata,
            Object::Workspace(w) => &w.metadata,
            Object::RoleBinding(g) => &g.metadata,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Object::Tenant(t) => &mut t.metadata,
            Object::Workspace(w) => &mut w.metadata,
            Object::RoleBinding(g) => &mut g.metadata,
        }
    }

    pub fn key(&self) -> ObjectKey {
        let meta = self.meta();
        ObjectKey {
            kind: self.kind(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
        }
    }

    pub fn into_tenant(self) -> StoreResult<TenantRecord> {
        match self {
            Object::Tenant(t) => Ok(t),
            other => Err(unexpected(ObjectKind::Tenant, &other)),
        }
    }

    pub fn into_workspace(self) -> StoreResult<WorkspaceResource> {
        match self {
            Object::Workspace(w) => Ok(w),
            other => Err(unexpected(ObjectKind::Workspace, &other)),
        }
    }

    pub fn into_role_binding(self) -> StoreResult<PermissionGrant> {
        match self {
            Object::RoleBinding(g) => Ok(g),
            other => Err(unexpected(ObjectKind::RoleBinding, &other)),
        }
    }
}

fn unexpected(wanted: ObjectKind, got: &Object) -> StoreError {
    StoreError::internal(format!("expected a {wanted}, store returned {}", got.key()))
}

impl From<TenantRecord> for Object {
    fn from(t: TenantRecord) -> Self {
        Object::Tenant(t)
    }
}

impl From<WorkspaceResource> for Object {
    fn from(w: WorkspaceResource) -> Self {
        Object::Workspace(w)
    }
}

impl From<PermissionGrant> for Object {
    fn from(g: PermissionGrant) -> Self {
        Object::RoleBinding(g)
    }
}
