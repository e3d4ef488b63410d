//! Tenant records: the unit of work for personal workspace convergence.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::resources::{ObjectKind, ObjectMeta, OwnerReference};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("tenant identity must not be empty")]
    Empty,

    #[error("tenant identity {identity:?} contains {found:?}; allowed are a-z, 0-9, '.', '_' and '@'")]
    InvalidCharacter { identity: String, found: char },
}

/// Globally unique key of a tenant.
///
/// Only lowercase alphanumerics, `.`, `_` and `@` are accepted. `-` is
/// reserved as the separator names are sanitized into, which keeps every
/// name derived from an identity collision-free.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantIdentity(String);

impl TenantIdentity {
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }
        if let Some(found) = raw.chars().find(|c| !Self::is_allowed(*c)) {
            return Err(IdentityError::InvalidCharacter {
                identity: raw,
                found,
            });
        }
        Ok(Self(raw))
    }

    fn is_allowed(c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '@')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TenantIdentity> for String {
    fn from(id: TenantIdentity) -> Self {
        id.0
    }
}

/// Role a tenant holds in a workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkspaceRole {
    #[default]
    None,
    Viewer,
    Manager,
}

/// Links a tenant to a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSubscription {
    pub name: String,
    pub role: WorkspaceRole,
}

impl WorkspaceSubscription {
    pub fn new(name: impl Into<String>, role: WorkspaceRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default)]
    pub create_personal_workspace: bool,
    /// Ordered; names are unique.
    #[serde(default)]
    pub workspaces: Vec<WorkspaceSubscription>,
}

/// Whether the tenant's private namespace exists, set by namespace provisioning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceStatus {
    pub created: bool,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalWorkspaceStatus {
    pub created: bool,
    pub name: String,
}

impl PersonalWorkspaceStatus {
    /// Returns true if the mirror changed.
    pub fn mark_created(&mut self, name: &str) -> bool {
        if self.created && self.name == name {
            return false;
        }
        self.created = true;
        self.name = name.to_string();
        true
    }

    /// Returns true if the mirror changed.
    pub fn clear(&mut self) -> bool {
        if !self.created && self.name.is_empty() {
            return false;
        }
        self.created = false;
        self.name.clear();
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingStatus {
    pub created: bool,
    pub namespace: String,
}

impl BindingStatus {
    pub fn mark_created(&mut self, namespace: &str) -> bool {
        if self.created && self.namespace == namespace {
            return false;
        }
        self.created = true;
        self.namespace = namespace.to_string();
        true
    }

    pub fn clear(&mut self) -> bool {
        if !self.created && self.namespace.is_empty() {
            return false;
        }
        self.created = false;
        self.namespace.clear();
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantStatus {
    #[serde(default)]
    pub personal_namespace: NamespaceStatus,
    #[serde(default)]
    pub personal_workspace: PersonalWorkspaceStatus,
    #[serde(default)]
    pub binding: BindingStatus,
}

/// A tenant as stored: spec and status are separate sub-resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub metadata: ObjectMeta,
    pub identity: TenantIdentity,
    pub spec: TenantSpec,
    pub status: TenantStatus,
}

impl TenantRecord {
    pub fn new(identity: TenantIdentity) -> Self {
        let mut metadata = ObjectMeta::named(identity.as_str());
        metadata.uid = Uuid::new_v4().to_string();
        Self {
            metadata,
            identity,
            spec: TenantSpec::default(),
            status: TenantStatus::default(),
        }
    }

    /// A record carrying nothing but the identity, for cleanup after the
    /// real record is gone.
    pub fn stand_in(identity: TenantIdentity) -> Self {
        Self {
            metadata: ObjectMeta::named(identity.as_str()),
            identity,
            spec: TenantSpec::default(),
            status: TenantStatus::default(),
        }
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.spec.first_name = Some(first_name.into());
        self
    }

    pub fn with_personal_workspace(mut self, wanted: bool) -> Self {
        self.spec.create_personal_workspace = wanted;
        self
    }

    pub fn with_namespace(mut self, name: impl Into<String>) -> Self {
        self.status.personal_namespace = NamespaceStatus {
            created: true,
            name: name.into(),
        };
        self
    }

    pub fn with_subscription(mut self, name: impl Into<String>, role: WorkspaceRole) -> Self {
        self.spec.workspaces.push(WorkspaceSubscription::new(name, role));
        self
    }

    pub fn wants_personal_workspace(&self) -> bool {
        self.spec.create_personal_workspace
    }

    pub fn namespace_precondition(&self) -> bool {
        self.status.personal_namespace.created
    }

    /// Name of the private namespace, when provisioning has recorded one.
    pub fn private_namespace(&self) -> Option<&str> {
        let name = self.status.personal_namespace.name.as_str();
        (!name.is_empty()).then_some(name)
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Controller reference pointing at this tenant.
    pub fn controller_reference(&self) -> OwnerReference {
        OwnerReference {
            kind: ObjectKind::Tenant,
            name: self.identity.to_string(),
            uid: self.metadata.uid.clone(),
            controller: true,
        }
    }

    /// Whether `owner` refers to this tenant.
    pub fn is_referenced_by(&self, owner: &OwnerReference) -> bool {
        owner.kind == ObjectKind::Tenant
            && owner.name == self.identity.as_str()
            && (owner.uid.is_empty() || self.metadata.uid.is_empty() || owner.uid == self.metadata.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> TenantIdentity {
        TenantIdentity::parse(raw).unwrap()
    }

    #[test]
    fn identity_accepts_mail_like_names() {
        assert_eq!(id("a.b@c").as_str(), "a.b@c");
        assert!(TenantIdentity::parse("s123456").is_ok());
        assert!(TenantIdentity::parse("john_doe@polito.it").is_ok());
    }

    #[test]
    fn identity_rejects_separator_and_empty() {
        assert_eq!(TenantIdentity::parse(""), Err(IdentityError::Empty));
        assert!(matches!(
            TenantIdentity::parse("a-b"),
            Err(IdentityError::InvalidCharacter { found: '-', .. })
        ));
        assert!(TenantIdentity::parse("Upper").is_err());
    }

    #[test]
    fn workspace_mirror_reports_changes() {
        let mut status = PersonalWorkspaceStatus::default();
        assert!(!status.clear());
        assert!(status.mark_created("personal-a"));
        assert!(!status.mark_created("personal-a"));
        assert!(status.mark_created("personal-b"));
        assert!(status.clear());
        assert_eq!(status, PersonalWorkspaceStatus::default());
    }

    #[test]
    fn binding_mirror_reports_changes() {
        let mut status = BindingStatus::default();
        assert!(status.mark_created("tenant-a"));
        assert!(!status.mark_created("tenant-a"));
        assert!(status.clear());
        assert!(!status.clear());
    }

    #[test]
    fn private_namespace_is_none_until_recorded() {
        let tenant = TenantRecord::new(id("a"));
        assert_eq!(tenant.private_namespace(), None);
        assert!(!tenant.namespace_precondition());

        let tenant = tenant.with_namespace("tenant-a");
        assert_eq!(tenant.private_namespace(), Some("tenant-a"));
        assert!(tenant.namespace_precondition());
    }

    #[test]
    fn stand_in_carries_only_identity() {
        let tenant = TenantRecord::stand_in(id("a.b"));
        assert_eq!(tenant.metadata.name, "a.b");
        assert!(tenant.metadata.uid.is_empty());
        assert_eq!(tenant.spec, TenantSpec::default());
        assert_eq!(tenant.status, TenantStatus::default());
    }

    #[test]
    fn owner_reference_matching_uses_uid_when_known() {
        let tenant = TenantRecord::new(id("a"));
        let mut owner = tenant.controller_reference();
        assert!(tenant.is_referenced_by(&owner));

        owner.uid = "someone-else".into();
        assert!(!tenant.is_referenced_by(&owner));

        let stand_in = TenantRecord::stand_in(id("a"));
        assert!(stand_in.is_referenced_by(&owner));
    }
}
