use std::fmt;

use pws_core::{ObjectKind, StoreError, StoreResult, TenantIdentity};
use thiserror::Error;

/// The store interaction a pass was performing when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    ReadTenant,
    ReadWorkspace,
    CreateWorkspace,
    DeleteWorkspace,
    PersistSpec,
    ProjectStatus,
    ReadGrant,
    CreateGrant,
    UpdateGrant,
    DeleteGrant,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::ReadTenant => "read tenant",
            Step::ReadWorkspace => "read workspace",
            Step::CreateWorkspace => "create workspace",
            Step::DeleteWorkspace => "delete workspace",
            Step::PersistSpec => "persist spec",
            Step::ProjectStatus => "project status",
            Step::ReadGrant => "read grant",
            Step::CreateGrant => "create grant",
            Step::UpdateGrant => "update grant",
            Step::DeleteGrant => "delete grant",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type for convergence operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Why a convergence pass stopped early.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// A store call failed with something other than the benign
    /// not-found / already-exists outcomes. The caller re-runs the pass.
    #[error("{step} failed for tenant {tenant}: {source}")]
    Store {
        step: Step,
        tenant: TenantIdentity,
        #[source]
        source: StoreError,
    },

    /// An object the pass needs is still being deleted by the store.
    /// Retryable once the deletion completes.
    #[error("{kind} {name} of tenant {tenant} is being deleted")]
    Terminating {
        tenant: TenantIdentity,
        kind: ObjectKind,
        name: String,
    },

    /// State that the engine itself never produces. Not retryable.
    #[error("invariant violated for tenant {tenant}: {message}")]
    InvariantViolation {
        tenant: TenantIdentity,
        message: String,
    },
}

impl ReconcileError {
    pub fn store(step: Step, tenant: &TenantIdentity, source: StoreError) -> Self {
        Self::Store {
            step,
            tenant: tenant.clone(),
            source,
        }
    }

    pub fn invariant(tenant: &TenantIdentity, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            tenant: tenant.clone(),
            message: message.into(),
        }
    }

    pub fn terminating(tenant: &TenantIdentity, kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::Terminating {
            tenant: tenant.clone(),
            kind,
            name: name.into(),
        }
    }

    pub fn tenant(&self) -> &TenantIdentity {
        match self {
            Self::Store { tenant, .. }
            | Self::Terminating { tenant, .. }
            | Self::InvariantViolation { tenant, .. } => tenant,
        }
    }

    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Store { step, .. } => Some(*step),
            Self::Terminating { .. } | Self::InvariantViolation { .. } => None,
        }
    }

    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store { source, .. } => Some(source),
            Self::Terminating { .. } | Self::InvariantViolation { .. } => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.store_error().is_some_and(StoreError::is_conflict)
    }

    /// Whether a later pass can succeed without anyone fixing anything.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store { source, .. } => source.is_retryable(),
            Self::Terminating { .. } => true,
            Self::InvariantViolation { .. } => false,
        }
    }
}

/// Attach the failing step to a store result.
pub(crate) trait AtStep<T> {
    fn at(self, step: Step, tenant: &TenantIdentity) -> ReconcileResult<T>;
}

impl<T> AtStep<T> for StoreResult<T> {
    fn at(self, step: Step, tenant: &TenantIdentity) -> ReconcileResult<T> {
        self.map_err(|source| ReconcileError::store(step, tenant, source))
    }
}
