//! The convergence pass.
//!
//! One pass reads the tenant's intent and the current state of the store,
//! then walks a fixed sequence of steps towards either the fully enabled
//! or the fully disabled state. Every step is idempotent, so a pass that
//! stops half way is finished by the next one.

use std::fmt;

use pws_core::{
    ObjectKey, ObjectKind, ObjectStore, PermissionGrant, StoreError, StoreResultExt,
    TenantIdentity, TenantRecord, WorkspaceResource, WorkspaceRole, WorkspaceSubscription,
};
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::desired::DesiredState;
use crate::error::{AtStep, ReconcileError, ReconcileResult, Step};
use crate::naming::{personal_workspace_name, tenant_namespace_name};
use crate::observed::{self, ObservedState};
use crate::projector::StatusProjector;
use crate::templates;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Enable,
    Disable,
    /// Tenant record deleted; only the owned objects are removed.
    Cleanup,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Enable => "enable",
            Direction::Disable => "disable",
            Direction::Cleanup => "cleanup",
        })
    }
}

/// A mutation a pass carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    WorkspaceCreated,
    WorkspaceDeleted,
    SubscriptionAdded,
    SubscriptionPromoted { from: WorkspaceRole },
    SubscriptionRemoved,
    SpecPersisted,
    StatusProjected,
    GrantCreated,
    GrantUpdated,
    GrantDeleted,
}

/// What a successful pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub identity: TenantIdentity,
    pub workspace: String,
    pub direction: Direction,
    pub applied: Vec<Applied>,
}

impl PassReport {
    fn new(identity: &TenantIdentity, workspace: &str, direction: Direction) -> Self {
        Self {
            identity: identity.clone(),
            workspace: workspace.to_string(),
            direction,
            applied: Vec::new(),
        }
    }

    /// True when the pass found everything already converged.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }

    pub fn contains(&self, applied: &Applied) -> bool {
        self.applied.contains(applied)
    }
}

pub struct ConvergenceEngine<'a> {
    store: &'a dyn ObjectStore,
    config: &'a EngineConfig,
}

impl<'a> ConvergenceEngine<'a> {
    pub fn new(store: &'a dyn ObjectStore, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    /// Run one pass for `tenant`.
    ///
    /// On error the remaining steps are skipped; whatever was applied
    /// before stays applied and the next pass picks up from there.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.identity, workspace = tracing::field::Empty))]
    pub async fn converge(&self, tenant: &mut TenantRecord) -> ReconcileResult<PassReport> {
        let name = personal_workspace_name(&tenant.identity);
        tracing::Span::current().record("workspace", name.as_str());

        let desired = DesiredState::of(tenant);
        let observed = observed::observe(self.store, tenant, &name).await?;
        debug!(
            enabled = desired.enabled,
            workspace_exists = observed.workspace_exists(),
            subscribed = observed.subscription.is_some(),
            "Observed state of {}",
            tenant.identity
        );

        let report = if desired.enabled {
            self.enable(tenant, &name, observed).await?
        } else {
            self.disable(tenant, &name, observed).await?
        };

        if report.is_noop() {
            debug!("Personal workspace of {} already converged", tenant.identity);
        } else {
            info!(
                "Converged personal workspace of {} ({}): {} change(s)",
                tenant.identity,
                report.direction,
                report.applied.len()
            );
        }
        Ok(report)
    }

    /// Remove what a deleted tenant left behind. `namespace` is where the
    /// grant lives, if still known.
    #[instrument(skip(self), fields(tenant = %identity))]
    pub async fn cleanup(
        &self,
        identity: &TenantIdentity,
        namespace: Option<&str>,
    ) -> ReconcileResult<PassReport> {
        let mut tenant = TenantRecord::stand_in(identity.clone());
        let name = personal_workspace_name(identity);
        let mut report = PassReport::new(identity, &name, Direction::Cleanup);

        let workspace = observed::read_workspace(self.store, &name)
            .await
            .at(Step::ReadWorkspace, identity)?;
        if let Some(namespace) = namespace {
            tenant.status.personal_namespace.name = namespace.to_string();
        }
        self.remove_workspace(&tenant, &name, workspace, &mut report).await?;
        for namespace in grant_namespaces(&tenant) {
            self.remove_grant(&tenant, &namespace, &mut report).await?;
        }

        info!("Cleaned up after deleted tenant {}", identity);
        Ok(report)
    }

    async fn enable(
        &self,
        tenant: &mut TenantRecord,
        name: &str,
        observed: ObservedState,
    ) -> ReconcileResult<PassReport> {
        let mut report = PassReport::new(&tenant.identity, name, Direction::Enable);
        let projector = StatusProjector::new(self.store);

        // 1. workspace
        match observed.workspace {
            Some(ref workspace) => {
                self.check_owner(tenant, workspace)?;
                if workspace.metadata.deletion_timestamp.is_some() {
                    // Recreated by a later pass once the store lets go of it.
                    return Err(ReconcileError::terminating(
                        &tenant.identity,
                        ObjectKind::Workspace,
                        name,
                    ));
                }
            }
            None => self.create_workspace(tenant, name, &mut report).await?,
        }

        // 2. status mirror, only once the workspace is known to exist
        if tenant.status.personal_workspace.mark_created(name) {
            projector.project_status(tenant).await?;
            report.applied.push(Applied::StatusProjected);
        }

        // 3. subscription, updated in place to keep the list order
        let subscription_changed = match observed.subscription {
            None => {
                tenant
                    .spec
                    .workspaces
                    .push(WorkspaceSubscription::new(name, WorkspaceRole::Manager));
                report.applied.push(Applied::SubscriptionAdded);
                true
            }
            Some((index, role)) if role != WorkspaceRole::Manager => {
                tenant.spec.workspaces[index].role = WorkspaceRole::Manager;
                report.applied.push(Applied::SubscriptionPromoted { from: role });
                true
            }
            Some(_) => false,
        };
        if subscription_changed {
            projector.persist_spec(tenant).await?;
            report.applied.push(Applied::SpecPersisted);
            debug!("Subscribed {} to {} as manager", tenant.identity, name);
        }

        // 4. grant in the current private namespace; one left behind in a
        // namespace the tenant moved away from is removed afterwards
        let namespace = private_namespace(tenant);
        self.ensure_grant(tenant, &namespace, &mut report).await?;
        let recorded = tenant.status.binding.namespace.clone();
        if !recorded.is_empty() && recorded != namespace {
            self.remove_grant(tenant, &recorded, &mut report).await?;
        }
        if tenant.status.binding.mark_created(&namespace) {
            projector.project_status(tenant).await?;
            report.applied.push(Applied::StatusProjected);
        }

        Ok(report)
    }

    async fn disable(
        &self,
        tenant: &mut TenantRecord,
        name: &str,
        observed: ObservedState,
    ) -> ReconcileResult<PassReport> {
        let mut report = PassReport::new(&tenant.identity, name, Direction::Disable);
        let projector = StatusProjector::new(self.store);

        if let Some(ref workspace) = observed.workspace {
            self.check_owner(tenant, workspace)?;
        }
        // Captured before the binding mirror is cleared below.
        let namespaces = grant_namespaces(tenant);

        // The subscription goes first so the tenant never lists a
        // workspace that is already gone.
        if let Some((index, _)) = observed.subscription {
            tenant.spec.workspaces.remove(index);
            report.applied.push(Applied::SubscriptionRemoved);
            projector.persist_spec(tenant).await?;
            report.applied.push(Applied::SpecPersisted);
        }

        // Status is cleared before the deletions so it never claims a
        // workspace that no longer exists.
        let workspace_cleared = tenant.status.personal_workspace.clear();
        let binding_cleared = tenant.status.binding.clear();
        if workspace_cleared || binding_cleared {
            projector.project_status(tenant).await?;
            report.applied.push(Applied::StatusProjected);
        }

        self.remove_workspace(tenant, name, observed.workspace, &mut report).await?;
        for namespace in &namespaces {
            self.remove_grant(tenant, namespace, &mut report).await?;
        }

        Ok(report)
    }

    async fn create_workspace(
        &self,
        tenant: &TenantRecord,
        name: &str,
        report: &mut PassReport,
    ) -> ReconcileResult<()> {
        let workspace = templates::personal_workspace(tenant, name, self.config);
        let created = self
            .store
            .create(workspace.into())
            .await
            .or_existing()
            .at(Step::CreateWorkspace, &tenant.identity)?;

        match created {
            Some(_) => {
                info!("Created personal workspace {}", name);
                report.applied.push(Applied::WorkspaceCreated);
            }
            None => {
                // Lost a race; make sure the winner is not someone else.
                let existing = observed::read_workspace(self.store, name)
                    .await
                    .at(Step::ReadWorkspace, &tenant.identity)?;
                if let Some(ref workspace) = existing {
                    self.check_owner(tenant, workspace)?;
                }
                debug!("Personal workspace {} already exists", name);
            }
        }
        Ok(())
    }

    async fn remove_workspace(
        &self,
        tenant: &TenantRecord,
        name: &str,
        observed: Option<WorkspaceResource>,
        report: &mut PassReport,
    ) -> ReconcileResult<()> {
        let Some(workspace) = observed else {
            return Ok(());
        };
        self.check_owner(tenant, &workspace)?;

        let deleted = self
            .store
            .delete(&ObjectKey::workspace(name))
            .await
            .found()
            .at(Step::DeleteWorkspace, &tenant.identity)?;
        if deleted.is_some() {
            info!("Deleted personal workspace {}", name);
            report.applied.push(Applied::WorkspaceDeleted);
        }
        Ok(())
    }

    async fn ensure_grant(
        &self,
        tenant: &TenantRecord,
        namespace: &str,
        report: &mut PassReport,
    ) -> ReconcileResult<()> {
        let desired = templates::manage_templates_grant(tenant, namespace, self.config);
        let current = observed::read_grant(self.store, namespace, &self.config.grant_name)
            .await
            .at(Step::ReadGrant, &tenant.identity)?;

        let current = match current {
            Some(current) => current,
            None => {
                let created = self
                    .store
                    .create(desired.clone().into())
                    .await
                    .or_existing()
                    .at(Step::CreateGrant, &tenant.identity)?;
                if created.is_some() {
                    info!("Created grant {} in {}", self.config.grant_name, namespace);
                    report.applied.push(Applied::GrantCreated);
                    return Ok(());
                }

                // The winner may already be gone again; report it rather
                // than claim a grant the store does not hold.
                observed::read_grant(self.store, namespace, &self.config.grant_name)
                    .await
                    .and_then(|found| {
                        found.ok_or_else(|| {
                            StoreError::not_found(ObjectKind::RoleBinding, &self.config.grant_name)
                        })
                    })
                    .at(Step::ReadGrant, &tenant.identity)?
            }
        };

        self.reassert_grant(tenant, current, &desired, report).await
    }

    async fn reassert_grant(
        &self,
        tenant: &TenantRecord,
        mut current: PermissionGrant,
        desired: &PermissionGrant,
        report: &mut PassReport,
    ) -> ReconcileResult<()> {
        if !templates::reassert_grant(&mut current, desired) {
            return Ok(());
        }

        let expected = current.metadata.resource_version;
        self.store
            .update(current.into(), expected)
            .await
            .at(Step::UpdateGrant, &tenant.identity)?;
        warn!(
            "Grant {} of {} had drifted and was reasserted",
            self.config.grant_name, tenant.identity
        );
        report.applied.push(Applied::GrantUpdated);
        Ok(())
    }

    async fn remove_grant(
        &self,
        tenant: &TenantRecord,
        namespace: &str,
        report: &mut PassReport,
    ) -> ReconcileResult<()> {
        let present = observed::read_grant(self.store, namespace, &self.config.grant_name)
            .await
            .at(Step::ReadGrant, &tenant.identity)?;
        if present.is_none() {
            return Ok(());
        }

        let deleted = self
            .store
            .delete(&ObjectKey::role_binding(namespace, &self.config.grant_name))
            .await
            .found()
            .at(Step::DeleteGrant, &tenant.identity)?;
        if deleted.is_some() {
            info!("Deleted grant {} in {}", self.config.grant_name, namespace);
            report.applied.push(Applied::GrantDeleted);
        }
        Ok(())
    }

    /// A workspace carrying the tenant's derived name but controlled by
    /// someone else is never adopted nor deleted.
    fn check_owner(&self, tenant: &TenantRecord, workspace: &WorkspaceResource) -> ReconcileResult<()> {
        match workspace.metadata.controller() {
            Some(owner) if !tenant.is_referenced_by(owner) => Err(ReconcileError::invariant(
                &tenant.identity,
                format!(
                    "workspace {} is controlled by {} {}",
                    workspace.metadata.name, owner.kind, owner.name
                ),
            )),
            Some(_) => Ok(()),
            None => {
                warn!(
                    "Workspace {} has no controller, treating it as owned by {}",
                    workspace.metadata.name, tenant.identity
                );
                Ok(())
            }
        }
    }
}

/// The recorded private namespace, else the conventional one.
fn private_namespace(tenant: &TenantRecord) -> String {
    tenant
        .private_namespace()
        .map(str::to_string)
        .unwrap_or_else(|| tenant_namespace_name(&tenant.identity))
}

/// Every namespace a grant of the tenant may still live in: where the
/// last pass put it, then the current private namespace.
fn grant_namespaces(tenant: &TenantRecord) -> Vec<String> {
    let mut namespaces = Vec::with_capacity(2);
    let recorded = &tenant.status.binding.namespace;
    if !recorded.is_empty() {
        namespaces.push(recorded.clone());
    }
    let current = private_namespace(tenant);
    if !namespaces.contains(&current) {
        namespaces.push(current);
    }
    namespaces
}
