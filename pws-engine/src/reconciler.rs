//! Entry points for the tenant controller.

use std::sync::Arc;

use async_trait::async_trait;
use pws_core::{Object, ObjectKey, ObjectStore, StoreResultExt, TenantIdentity, TenantRecord};
use tracing::{debug, error, instrument};

use crate::config::EngineConfig;
use crate::engine::{ConvergenceEngine, PassReport};
use crate::error::{AtStep, ReconcileError, ReconcileResult, Step};
use crate::retry::RetryDecision;

/// A per-tenant feature the tenant controller drives once per pass.
#[async_trait]
pub trait TenantFeature: Send + Sync {
    fn name(&self) -> &'static str;

    /// Converge the feature for a live tenant. The record is updated in
    /// place with everything the pass persisted.
    async fn enforce(&self, tenant: &mut TenantRecord) -> ReconcileResult<PassReport>;

    /// Remove the feature's objects after the tenant record is gone.
    async fn cleanup(
        &self,
        identity: &TenantIdentity,
        namespace: Option<&str>,
    ) -> ReconcileResult<PassReport>;
}

/// Keeps every tenant's personal workspace in line with its intent.
///
/// Cheap to clone; clones share the store handle.
#[derive(Clone)]
pub struct PersonalWorkspaceReconciler {
    store: Arc<dyn ObjectStore>,
    config: Arc<EngineConfig>,
}

impl PersonalWorkspaceReconciler {
    pub fn new(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn engine(&self) -> ConvergenceEngine<'_> {
        ConvergenceEngine::new(self.store.as_ref(), &self.config)
    }

    /// Run one pass for a tenant whose namespace precondition is known.
    pub async fn enforce_personal_workspace(
        &self,
        tenant: &mut TenantRecord,
    ) -> ReconcileResult<PassReport> {
        self.engine().converge(tenant).await
    }

    pub async fn cleanup_deleted_tenant(
        &self,
        identity: &TenantIdentity,
        namespace: Option<&str>,
    ) -> ReconcileResult<PassReport> {
        self.engine().cleanup(identity, namespace).await
    }

    /// Fetch the tenant and run whichever pass its state calls for.
    #[instrument(skip(self), fields(tenant = %identity))]
    pub async fn reconcile(&self, identity: &TenantIdentity) -> ReconcileResult<PassReport> {
        let tenant = self
            .store
            .get(&ObjectKey::tenant(identity.as_str()))
            .await
            .found()
            .and_then(|found| found.map(Object::into_tenant).transpose())
            .at(Step::ReadTenant, identity)?;

        match tenant {
            Some(mut tenant) if !tenant.is_being_deleted() => {
                self.enforce_personal_workspace(&mut tenant).await
            }
            Some(tenant) => {
                debug!("Tenant {} is being deleted", identity);
                let namespace = tenant.private_namespace().map(str::to_string);
                self.cleanup_deleted_tenant(identity, namespace.as_deref()).await
            }
            None => {
                debug!("Tenant {} no longer exists", identity);
                self.cleanup_deleted_tenant(identity, None).await
            }
        }
    }

    /// What the caller should do after `attempt` consecutive failures.
    pub fn on_error(&self, err: &ReconcileError, attempt: u32) -> RetryDecision {
        let decision = self.config.retry.decide(err, attempt);
        if decision == RetryDecision::Abandon {
            error!("Giving up on tenant {}: {}", err.tenant(), err);
        } else {
            debug!("Pass for tenant {} failed, {:?}: {}", err.tenant(), decision, err);
        }
        decision
    }
}

#[async_trait]
impl TenantFeature for PersonalWorkspaceReconciler {
    fn name(&self) -> &'static str {
        "personal-workspace"
    }

    async fn enforce(&self, tenant: &mut TenantRecord) -> ReconcileResult<PassReport> {
        self.enforce_personal_workspace(tenant).await
    }

    async fn cleanup(
        &self,
        identity: &TenantIdentity,
        namespace: Option<&str>,
    ) -> ReconcileResult<PassReport> {
        self.cleanup_deleted_tenant(identity, namespace).await
    }
}
