use pws_core::TenantRecord;

/// What a pass converges towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesiredState {
    pub enabled: bool,
}

/// A personal workspace is never enabled before the tenant's private
/// namespace exists, whatever the tenant asked for.
pub fn resolve(wants_personal_workspace: bool, namespace_precondition: bool) -> DesiredState {
    DesiredState {
        enabled: wants_personal_workspace && namespace_precondition,
    }
}

impl DesiredState {
    pub fn of(tenant: &TenantRecord) -> Self {
        resolve(tenant.wants_personal_workspace(), tenant.namespace_precondition())
    }
}
